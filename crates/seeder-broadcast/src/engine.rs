use std::sync::Arc;

use seeder_peer::{PeerError, PeerTransport};
use seeder_task::TaskManager;
use seeder_types::{TaskKey, TransactionMeta};
use tracing::{debug, info};

use crate::error::BroadcastResult;
use crate::report::BroadcastReport;

/// What to send to each peer.
#[derive(Clone, Copy, Debug)]
enum Delivery<'a> {
    /// Transaction record only.
    Meta,
    /// Record (unless already posted) followed by the full payload.
    Data { payload: &'a [u8], already_posted: bool },
}

/// Fans a transaction out to an ordered peer list.
///
/// Peers are visited strictly in the given order. A failing peer is counted
/// and skipped. The task's closed flag is checked before and after every
/// peer, so a cancellation takes effect within one peer round-trip. The
/// task is closed once the walk ends, however it ends.
pub struct BroadcastEngine {
    manager: Arc<TaskManager>,
    transport: Arc<dyn PeerTransport>,
}

impl BroadcastEngine {
    pub fn new(manager: Arc<TaskManager>, transport: Arc<dyn PeerTransport>) -> Self {
        Self { manager, transport }
    }

    /// Submit the record (unless `already_posted`) and upload the payload.
    pub async fn broadcast_data(
        &self,
        key: &TaskKey,
        peers: &[String],
        meta: &TransactionMeta,
        payload: &[u8],
        already_posted: bool,
    ) -> BroadcastResult<BroadcastReport> {
        let delivery = Delivery::Data {
            payload,
            already_posted,
        };
        self.fan_out(key, peers, meta, delivery).await
    }

    /// Submit the record only.
    pub async fn broadcast_meta(
        &self,
        key: &TaskKey,
        peers: &[String],
        meta: &TransactionMeta,
    ) -> BroadcastResult<BroadcastReport> {
        self.fan_out(key, peers, meta, Delivery::Meta).await
    }

    async fn fan_out(
        &self,
        key: &TaskKey,
        peers: &[String],
        meta: &TransactionMeta,
        delivery: Delivery<'_>,
    ) -> BroadcastResult<BroadcastReport> {
        self.manager.task_begin_set(key, peers.len())?;
        let mut report = BroadcastReport::default();

        for peer in peers {
            if self.manager.is_closed(key) {
                report.cancelled = true;
                break;
            }
            match self.deliver(peer, meta, delivery).await {
                Ok(()) => {
                    self.manager.inc_succeeded(key);
                    report.succeeded.push(peer.clone());
                }
                Err(e) => {
                    debug!(task = %key, peer = %peer, error = %e, "peer send failed");
                    self.manager.inc_failed(key);
                    report.failed.push(peer.clone());
                }
            }
            if self.manager.is_closed(key) {
                report.cancelled = report.contacted() < peers.len();
                break;
            }
        }

        close_quietly(&self.manager, key);
        info!(
            task = %key,
            peers = peers.len(),
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            cancelled = report.cancelled,
            "fan-out finished"
        );
        Ok(report)
    }

    async fn deliver(&self, peer: &str, meta: &TransactionMeta, delivery: Delivery<'_>) -> Result<(), PeerError> {
        let submit = match delivery {
            Delivery::Meta => true,
            Delivery::Data { already_posted, .. } => !already_posted,
        };
        if submit {
            let status = self.transport.submit_transaction_meta(peer, meta).await?;
            if !status.is_accepted() {
                return Err(PeerError::Status {
                    peer: peer.to_string(),
                    code: status.code,
                    body: status.body,
                });
            }
        }
        if let Delivery::Data { payload, .. } = delivery {
            if !payload.is_empty() {
                self.transport.upload_payload(peer, meta, payload).await?;
            }
        }
        Ok(())
    }
}

/// Close a task that may already have been removed.
pub(crate) fn close_quietly(manager: &TaskManager, key: &TaskKey) {
    if let Err(e) = manager.close_task(key) {
        debug!(task = %key, error = %e, "task gone before close");
    }
}
