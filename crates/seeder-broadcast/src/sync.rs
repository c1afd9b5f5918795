use std::sync::Arc;

use async_trait::async_trait;
use seeder_peer::PeerTransport;
use seeder_task::TaskManager;
use seeder_types::{TaskKey, TransactionMeta};
use tracing::{debug, info};

use crate::engine::close_quietly;
use crate::error::BroadcastResult;
use crate::report::BroadcastReport;

/// Error returned by a [`SyncSink`] that refused fetched data.
pub type IngestError = Box<dyn std::error::Error + Send + Sync>;

/// Receives a transaction fetched from a peer.
#[async_trait]
pub trait SyncSink: Send + Sync {
    /// Verify and store. An error makes the fetcher try the next peer.
    async fn ingest(&self, meta: TransactionMeta, payload: Vec<u8>) -> Result<(), IngestError>;
}

/// Outcome of a sync.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Peer the transaction was taken from, if any.
    pub source: Option<String>,
    pub peers: BroadcastReport,
}

/// Fetches a transaction and its payload from the first peer that can
/// supply both and whose data the sink accepts.
pub struct SyncFetcher {
    manager: Arc<TaskManager>,
    transport: Arc<dyn PeerTransport>,
}

impl SyncFetcher {
    pub fn new(manager: Arc<TaskManager>, transport: Arc<dyn PeerTransport>) -> Self {
        Self { manager, transport }
    }

    /// Walk `peers` in order until one sync succeeds, the peers run out, or
    /// the task is closed. The task is closed on return.
    pub async fn sync(&self, key: &TaskKey, peers: &[String], sink: &dyn SyncSink) -> BroadcastResult<SyncReport> {
        self.manager.task_begin_set(key, peers.len())?;
        let mut report = SyncReport::default();

        for peer in peers {
            if self.manager.is_closed(key) {
                report.peers.cancelled = true;
                break;
            }
            match self.fetch_from(peer, &key.tx_id, sink).await {
                Ok(()) => {
                    self.manager.inc_succeeded(key);
                    report.peers.succeeded.push(peer.clone());
                    report.source = Some(peer.clone());
                    break;
                }
                Err(e) => {
                    debug!(task = %key, peer = %peer, error = %e, "sync attempt failed");
                    self.manager.inc_failed(key);
                    report.peers.failed.push(peer.clone());
                }
            }
        }

        close_quietly(&self.manager, key);
        info!(
            task = %key,
            source = report.source.as_deref().unwrap_or("-"),
            attempts = report.peers.contacted(),
            "sync finished"
        );
        Ok(report)
    }

    async fn fetch_from(&self, peer: &str, tx_id: &str, sink: &dyn SyncSink) -> Result<(), IngestError> {
        let mut meta = self.transport.fetch_unconfirmed_tx(peer, tx_id).await?;
        if meta.id != tx_id {
            return Err(format!("{peer} returned transaction {} for {tx_id}", meta.id).into());
        }
        let payload = if !meta.data.is_empty() {
            std::mem::take(&mut meta.data)
        } else if meta.size()? == 0 {
            Vec::new()
        } else {
            self.transport.fetch_payload(peer, tx_id).await?
        };
        sink.ingest(meta, payload).await
    }
}
