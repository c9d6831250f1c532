//! Peer access trait and its HTTP implementation.

use std::time::Duration;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use contracts::{CatalogEntry, MarkerType, SyncId};

use crate::error::ReplicationError;

/// Read-only access to the remote sensor's chunk store.
///
/// The remote store is authoritative; a client may only list the catalog,
/// download finalized chunks and post sync markers. All implementations
/// must be safe to call repeatedly with the same arguments.
#[trait_variant::make(PeerClient: Send)]
pub trait LocalPeerClient {
    /// List the finalized chunks the peer advertises for a session,
    /// ordered by index.
    async fn fetch_catalog(&self, session_id: &str)
        -> Result<Vec<CatalogEntry>, ReplicationError>;

    /// Download one finalized chunk by its advertised name.
    async fn fetch_chunk(&self, session_id: &str, name: &str) -> Result<Bytes, ReplicationError>;

    /// Deliver a sync marker to the peer (best-effort on the caller side).
    async fn post_marker(
        &self,
        session_id: &str,
        sync_id: SyncId,
        marker_type: MarkerType,
    ) -> Result<(), ReplicationError>;
}

/// Wire body for marker delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerPost {
    pub sync_id: SyncId,
    pub marker_type: MarkerType,
}

/// HTTP peer client against the remote sensor's chunk endpoint.
#[derive(Debug, Clone)]
pub struct HttpPeerClient {
    http: reqwest::Client,
    base_url: String,
}

impl HttpPeerClient {
    /// Build a client with a per-request timeout.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ReplicationError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ReplicationError::request(format!("failed to build client: {e}")))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response, ReplicationError> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| ReplicationError::request(format!("GET {url}: {e}")))?;

        if !response.status().is_success() {
            return Err(ReplicationError::request(format!(
                "GET {url}: status {}",
                response.status()
            )));
        }
        Ok(response)
    }
}

impl PeerClient for HttpPeerClient {
    async fn fetch_catalog(
        &self,
        session_id: &str,
    ) -> Result<Vec<CatalogEntry>, ReplicationError> {
        let url = format!("{}/sessions/{session_id}/catalog", self.base_url);
        let response = self.get(&url).await?;
        response
            .json()
            .await
            .map_err(|e| ReplicationError::request(format!("GET {url}: bad catalog body: {e}")))
    }

    async fn fetch_chunk(&self, session_id: &str, name: &str) -> Result<Bytes, ReplicationError> {
        let url = format!("{}/sessions/{session_id}/chunks/{name}", self.base_url);
        let response = self.get(&url).await?;
        response
            .bytes()
            .await
            .map_err(|e| ReplicationError::request(format!("GET {url}: body read failed: {e}")))
    }

    async fn post_marker(
        &self,
        session_id: &str,
        sync_id: SyncId,
        marker_type: MarkerType,
    ) -> Result<(), ReplicationError> {
        let url = format!("{}/sessions/{session_id}/markers", self.base_url);
        let response = self
            .http
            .post(&url)
            .json(&MarkerPost {
                sync_id,
                marker_type,
            })
            .send()
            .await
            .map_err(|e| ReplicationError::request(format!("POST {url}: {e}")))?;

        if !response.status().is_success() {
            return Err(ReplicationError::request(format!(
                "POST {url}: status {}",
                response.status()
            )));
        }
        Ok(())
    }
}
