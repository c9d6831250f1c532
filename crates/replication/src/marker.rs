//! Sync-marker handshake between the two sensor streams.
//!
//! Markers ride the same CSV schema as data: `mode` carries the reserved
//! marker name and `value` carries the correlation id. The local injection
//! is authoritative; delivery to the peer is best-effort and never fails
//! the recording.

use chrono::Utc;
use tracing::{info, warn};

use contracts::{MarkerType, Reading, SyncId, SYNC_START, SYNC_STOP};
use session_store::{SessionHandle, StoreError};

use crate::peer::PeerClient;

/// Injects paired sync markers locally and posts them to the peer.
pub struct SyncMarkerCoordinator<C> {
    peer: C,
    remote_session_id: String,
}

impl<C: PeerClient> SyncMarkerCoordinator<C> {
    pub fn new(peer: C, remote_session_id: impl Into<String>) -> Self {
        Self {
            peer,
            remote_session_id: remote_session_id.into(),
        }
    }

    /// Inject a SYNC_START marker into the local session and post it to
    /// the peer.
    pub async fn begin(
        &self,
        session: &SessionHandle,
        sync_id: SyncId,
    ) -> Result<(), StoreError> {
        let marker = Reading::marker(Utc::now(), session.sensor_id(), SYNC_START, sync_id);
        session.add_reading(marker).await?;
        info!(sync_id = %sync_id, "Sync start marker injected");

        self.post(sync_id, MarkerType::Start).await;
        Ok(())
    }

    /// Build the SYNC_STOP marker for the local session and post it to the
    /// peer. The caller passes the returned reading into
    /// [`SessionHandle::stop`] so it lands as the final row.
    pub async fn end(&self, session: &SessionHandle, sync_id: SyncId) -> Reading {
        self.post(sync_id, MarkerType::Stop).await;
        info!(sync_id = %sync_id, "Sync stop marker prepared");
        Reading::marker(Utc::now(), session.sensor_id(), SYNC_STOP, sync_id)
    }

    async fn post(&self, sync_id: SyncId, marker_type: MarkerType) {
        if let Err(e) = self
            .peer
            .post_marker(&self.remote_session_id, sync_id, marker_type)
            .await
        {
            // One-sided markers degrade drift estimation, never recording
            warn!(sync_id = %sync_id, error = %e, "Marker delivery to peer failed");
            metrics::counter!("marker_delivery_failures_total").increment(1);
        }
    }
}
