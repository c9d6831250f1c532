//! In-memory peer for tests and serverless demo runs.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use bytes::Bytes;

use contracts::{chunk_file_name, CatalogEntry, MarkerType, SyncId};

use crate::error::ReplicationError;
use crate::peer::PeerClient;

#[derive(Default)]
struct MockState {
    catalog: Vec<CatalogEntry>,
    chunks: HashMap<String, Bytes>,
    corrupted: HashSet<String>,
    markers: Vec<(SyncId, MarkerType)>,
    fail_next_catalog: bool,
    catalog_fetches: u64,
    chunk_fetches: u64,
}

/// In-memory [`PeerClient`] with corruption injection and call counters.
///
/// Clones share state, so a test can keep a handle while the agent owns
/// another.
#[derive(Clone, Default)]
pub struct MockPeerClient {
    state: Arc<Mutex<MockState>>,
}

impl MockPeerClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advertise a chunk with its true hash and serve `content` for it.
    pub fn publish_chunk(&self, index: u64, content: &str) {
        let name = chunk_file_name(index);
        let bytes = Bytes::copy_from_slice(content.as_bytes());
        let mut state = self.state.lock().unwrap();
        state.catalog.push(CatalogEntry {
            index,
            name: name.clone(),
            sha256: integrity::hash_bytes(&bytes),
            size_bytes: bytes.len() as u64,
        });
        state.chunks.insert(name, bytes);
    }

    /// Serve flipped bytes for a chunk while still advertising the
    /// original hash, so every download of it fails verification.
    pub fn corrupt_chunk(&self, index: u64) {
        self.state
            .lock()
            .unwrap()
            .corrupted
            .insert(chunk_file_name(index));
    }

    /// Make the next catalog fetch fail with a transient request error.
    pub fn fail_next_catalog(&self) {
        self.state.lock().unwrap().fail_next_catalog = true;
    }

    pub fn posted_markers(&self) -> Vec<(SyncId, MarkerType)> {
        self.state.lock().unwrap().markers.clone()
    }

    pub fn catalog_fetches(&self) -> u64 {
        self.state.lock().unwrap().catalog_fetches
    }

    pub fn chunk_fetches(&self) -> u64 {
        self.state.lock().unwrap().chunk_fetches
    }
}

impl PeerClient for MockPeerClient {
    async fn fetch_catalog(
        &self,
        _session_id: &str,
    ) -> Result<Vec<CatalogEntry>, ReplicationError> {
        let mut state = self.state.lock().unwrap();
        state.catalog_fetches += 1;
        if state.fail_next_catalog {
            state.fail_next_catalog = false;
            return Err(ReplicationError::request("mock: catalog unavailable"));
        }
        Ok(state.catalog.clone())
    }

    async fn fetch_chunk(&self, _session_id: &str, name: &str) -> Result<Bytes, ReplicationError> {
        let mut state = self.state.lock().unwrap();
        state.chunk_fetches += 1;

        let bytes = state
            .chunks
            .get(name)
            .cloned()
            .ok_or_else(|| ReplicationError::request(format!("mock: unknown chunk '{name}'")))?;

        if state.corrupted.contains(name) {
            let mut flipped = bytes.to_vec();
            if let Some(first) = flipped.first_mut() {
                *first ^= 0xFF;
            }
            return Ok(Bytes::from(flipped));
        }
        Ok(bytes)
    }

    async fn post_marker(
        &self,
        _session_id: &str,
        sync_id: SyncId,
        marker_type: MarkerType,
    ) -> Result<(), ReplicationError> {
        self.state.lock().unwrap().markers.push((sync_id, marker_type));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_corrupted_chunk_fails_hash_check() {
        let peer = MockPeerClient::new();
        peer.publish_chunk(0, "timestamp,sensor_id,mode,value,TempC,Vin\n");
        peer.corrupt_chunk(0);

        let catalog = peer.fetch_catalog("s1").await.unwrap();
        let bytes = peer.fetch_chunk("s1", &catalog[0].name).await.unwrap();
        assert_ne!(integrity::hash_bytes(&bytes), catalog[0].sha256);
    }

    #[tokio::test]
    async fn test_fail_next_catalog_is_one_shot() {
        let peer = MockPeerClient::new();
        peer.fail_next_catalog();
        assert!(peer.fetch_catalog("s1").await.is_err());
        assert!(peer.fetch_catalog("s1").await.is_ok());
        assert_eq!(peer.catalog_fetches(), 2);
    }
}
