use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use seeder_chunk::ChunkTree;
use seeder_types::TransactionMeta;
use tracing::debug;

use crate::error::{PeerError, PeerResult};
use crate::transport::{PeerTransport, SubmitStatus};

/// [`PeerTransport`] over the node HTTP API.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> PeerResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PeerError::Client(e.to_string()))?;
        Ok(Self { client })
    }

    async fn get(&self, peer: &str, path: &str, what: &str) -> PeerResult<Response> {
        let response = self
            .client
            .get(peer_url(peer, path))
            .send()
            .await
            .map_err(|e| request_error(peer, e))?;
        check(peer, what, response).await
    }
}

/// Base URL for a peer given as `host:port` or as a URL.
pub fn peer_url(peer: &str, path: &str) -> String {
    let base = peer.trim_end_matches('/');
    if base.starts_with("http://") || base.starts_with("https://") {
        format!("{base}{path}")
    } else {
        format!("http://{base}{path}")
    }
}

fn request_error(peer: &str, source: reqwest::Error) -> PeerError {
    PeerError::Request {
        peer: peer.to_string(),
        source,
    }
}

async fn check(peer: &str, what: &str, response: Response) -> PeerResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::NOT_FOUND {
        return Err(PeerError::NotFound {
            peer: peer.to_string(),
            what: what.to_string(),
        });
    }
    let body = response.text().await.unwrap_or_default();
    Err(PeerError::Status {
        peer: peer.to_string(),
        code: status.as_u16(),
        body,
    })
}

#[async_trait]
impl PeerTransport for HttpTransport {
    async fn submit_transaction_meta(
        &self,
        peer: &str,
        meta: &TransactionMeta,
    ) -> PeerResult<SubmitStatus> {
        let response = self
            .client
            .post(peer_url(peer, "/tx"))
            .json(&meta.without_data())
            .send()
            .await
            .map_err(|e| request_error(peer, e))?;
        let code = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        debug!(peer, tx_id = %meta.id, code, "transaction submitted");
        Ok(SubmitStatus::new(code, body))
    }

    async fn upload_payload(
        &self,
        peer: &str,
        meta: &TransactionMeta,
        payload: &[u8],
    ) -> PeerResult<()> {
        let tree = ChunkTree::build(payload);
        for chunk in tree.to_chunks(payload) {
            let response = self
                .client
                .post(peer_url(peer, "/chunk"))
                .json(&chunk)
                .send()
                .await
                .map_err(|e| request_error(peer, e))?;
            check(peer, "chunk", response).await?;
        }
        debug!(peer, tx_id = %meta.id, chunks = tree.chunks().len(), "payload uploaded");
        Ok(())
    }

    async fn fetch_unconfirmed_tx(&self, peer: &str, tx_id: &str) -> PeerResult<TransactionMeta> {
        let path = format!("/unconfirmed_tx/{tx_id}");
        self.get(peer, &path, "transaction")
            .await?
            .json::<TransactionMeta>()
            .await
            .map_err(|e| PeerError::Decode {
                peer: peer.to_string(),
                reason: e.to_string(),
            })
    }

    async fn fetch_payload(&self, peer: &str, tx_id: &str) -> PeerResult<Vec<u8>> {
        let path = format!("/tx/{tx_id}/data");
        let bytes = self
            .get(peer, &path, "payload")
            .await?
            .bytes()
            .await
            .map_err(|e| request_error(peer, e))?;
        Ok(bytes.to_vec())
    }

    async fn fetch_peers(&self, peer: &str) -> PeerResult<Vec<String>> {
        self.get(peer, "/peers", "peer list")
            .await?
            .json::<Vec<String>>()
            .await
            .map_err(|e| PeerError::Decode {
                peer: peer.to_string(),
                reason: e.to_string(),
            })
    }
}
