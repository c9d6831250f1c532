//! # Session Store
//!
//! Chunked, integrity-checked persistence for one sensor's recording
//! session, plus the shared sync-metadata document for a session pair.
//!
//! A session accumulates readings into rolling chunk files; each finalized
//! chunk is hashed and recorded in the manifest. At stop, finalized chunks
//! are combined into one continuous session file, verified against the
//! manifest running total, and only then deleted.
//!
//! All mutable session state lives inside a single worker task per session
//! ([`SessionHandle`]); the flush timer and roll check are ticks inside
//! that worker, so no flush can race a combine.

mod combine;
mod csv;
mod error;
mod manifest;
mod store;
mod sync_meta;

pub use combine::{combine_session, CombineOutcome};
pub use csv::{
    count_reading_rows, format_timestamp, parse_row, read_session_file, render_row,
    ParsedSession, CSV_HEADER,
};
pub use error::StoreError;
pub use manifest::{load_manifest, manifest_path, write_manifest};
pub use store::{start_session, SessionConfig, SessionHandle, SessionSummary};
pub use sync_meta::SyncMetadataStore;
