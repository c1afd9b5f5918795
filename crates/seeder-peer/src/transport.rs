use async_trait::async_trait;
use seeder_types::TransactionMeta;

use crate::error::PeerResult;

/// Substring a peer uses to report that it already holds a transaction.
const ALREADY_IN_MEMPOOL: &str = "already in the mempool";

/// A peer's answer to a transaction submission.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubmitStatus {
    pub code: u16,
    pub body: String,
}

impl SubmitStatus {
    pub fn new(code: u16, body: impl Into<String>) -> Self {
        Self {
            code,
            body: body.into(),
        }
    }

    /// 200, 208 and "already in the mempool" all mean the peer has the
    /// transaction.
    pub fn is_accepted(&self) -> bool {
        self.code == 200 || self.code == 208 || self.body.contains(ALREADY_IN_MEMPOOL)
    }
}

/// Network access to other nodes.
///
/// Peers are addressed by `host:port` or a full base URL. Implementations
/// apply their own per-request deadlines.
#[async_trait]
pub trait PeerTransport: Send + Sync {
    /// Submit a transaction record. A rejection is reported in the status,
    /// not as an error.
    async fn submit_transaction_meta(
        &self,
        peer: &str,
        meta: &TransactionMeta,
    ) -> PeerResult<SubmitStatus>;

    /// Upload a complete payload, chunk by chunk.
    async fn upload_payload(
        &self,
        peer: &str,
        meta: &TransactionMeta,
        payload: &[u8],
    ) -> PeerResult<()>;

    /// Fetch a transaction record, pending or confirmed.
    async fn fetch_unconfirmed_tx(&self, peer: &str, tx_id: &str) -> PeerResult<TransactionMeta>;

    /// Fetch a transaction's full payload.
    async fn fetch_payload(&self, peer: &str, tx_id: &str) -> PeerResult<Vec<u8>>;

    /// Peers known to `peer`.
    async fn fetch_peers(&self, peer: &str) -> PeerResult<Vec<String>>;
}
