//! # Replication
//!
//! Pull-based mirroring of the in-water sensor's chunked session over the
//! tether link, plus the sync-marker handshake between the two sensors.
//!
//! The remote store is the source of truth; this crate only ever reads its
//! catalog and downloads finalized chunks. Every downloaded chunk is
//! hash-verified before it is renamed into place, and the resumable cursor
//! ([`contracts::MirrorProgress`]) only advances past verified chunks, so a
//! restarted agent picks up exactly where it left off.

mod agent;
mod error;
mod marker;
mod mock;
mod peer;

pub use agent::{load_progress, start_mirror, MirrorConfig, MirrorHandle, PollOutcome};
pub use error::ReplicationError;
pub use marker::SyncMarkerCoordinator;
pub use mock::MockPeerClient;
pub use peer::{HttpPeerClient, LocalPeerClient, MarkerPost, PeerClient};
