use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use seeder_broadcast::{BroadcastEngine, BroadcastReport, IngestError, SyncFetcher, SyncSink};
use seeder_bundle::{is_bundle, Bundle, BundleItem, ItemMeta, Manifest};
use seeder_chunk::{ChunkStore, OffsetLedger};
use seeder_peer::{PeerRanking, PeerTransport};
use seeder_store::{BatchOp, Bucket, KeyValueStore};
use seeder_task::{Submitted, Task, TaskScheduler};
use seeder_types::{b64_decode, b64_encode, Chunk, TaskKey, TaskType, TransactionMeta};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::NodeConfig;
use crate::error::{NodeError, NodeResult};
use crate::lock::KeyedLock;
use crate::verify::Verifier;

/// Outcome of a transaction submission.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Submission {
    Stored,
    /// Already held; nothing was written.
    AlreadyExists,
}

/// Position of a payload in the global address space.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOffset {
    /// Absolute address of the payload's last byte.
    pub offset: String,
    pub size: String,
}

/// Where a manifest path leads.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestTarget {
    pub manifest_id: String,
    pub path: String,
    pub tx_id: String,
}

/// Node summary for `/v1/info`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeInfo {
    pub gateway: String,
    pub peers: usize,
    pub tasks: usize,
    pub task_capacity: usize,
    pub queued: usize,
    pub data_end_offset: u64,
    pub store: String,
}

/// The seeder node: ingest, reads, jobs and peer upkeep over injected
/// store, transport and verifier.
pub struct Node {
    store: Arc<dyn KeyValueStore>,
    chunks: ChunkStore,
    scheduler: TaskScheduler,
    engine: BroadcastEngine,
    fetcher: SyncFetcher,
    ranking: Arc<PeerRanking>,
    transport: Arc<dyn PeerTransport>,
    verifier: Arc<dyn Verifier>,
    submit_lock: KeyedLock,
    config: NodeConfig,
}

/// Running background work. Dropping it leaves the workers running.
pub struct NodeHandle {
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl NodeHandle {
    /// Stop the workers and the peer refresh loop. A task being worked on
    /// is finished first.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        for task in self.tasks {
            if let Err(e) = task.await {
                error!(error = %e, "background task panicked");
            }
        }
    }
}

impl Node {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        transport: Arc<dyn PeerTransport>,
        verifier: Arc<dyn Verifier>,
        config: NodeConfig,
    ) -> Self {
        let ledger = Arc::new(OffsetLedger::new(Arc::clone(&store)));
        let chunks = ChunkStore::new(Arc::clone(&store), ledger);
        let scheduler = TaskScheduler::new(Arc::clone(&store), config.task_capacity);
        let engine = BroadcastEngine::new(Arc::clone(scheduler.manager()), Arc::clone(&transport));
        let fetcher = SyncFetcher::new(Arc::clone(scheduler.manager()), Arc::clone(&transport));
        let ranking = Arc::new(PeerRanking::new(config.gateway.clone()));
        ranking.add_peers(config.peers.iter().cloned());
        Self {
            store,
            chunks,
            scheduler,
            engine,
            fetcher,
            ranking,
            transport,
            verifier,
            submit_lock: KeyedLock::new(),
            config,
        }
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn scheduler(&self) -> &TaskScheduler {
        &self.scheduler
    }

    pub fn ranking(&self) -> &Arc<PeerRanking> {
        &self.ranking
    }

    pub fn chunks(&self) -> &ChunkStore {
        &self.chunks
    }

    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    // ---- ingest ----

    /// Verify and store a transaction. An inline payload is chunked; a
    /// record without one gets its offset range so chunks can follow.
    pub async fn submit_tx(&self, meta: TransactionMeta) -> NodeResult<Submission> {
        let _guard = self.submit_lock.lock(&meta.id).await;
        self.verifier.verify_transaction(&meta)?;
        if self.has_tx(&meta.id).await? {
            if meta.data.is_empty() || self.has_tx_data(&meta.id).await? {
                debug!(tx_id = %meta.id, "transaction already stored");
                return Ok(Submission::AlreadyExists);
            }
            return self.complete_payload(&meta.id, &meta.data).await;
        }

        let size = meta.size()?;
        if !meta.data.is_empty() {
            self.chunks.split_and_store(&meta, &meta.data).await?;
        } else if size > 0 {
            self.chunks
                .ledger()
                .ensure_offset(&meta.data_root, &meta.data_size)
                .await?;
        }
        self.put_record(Bucket::TxMeta, &meta.id, &meta.without_data()).await?;
        info!(tx_id = %meta.id, size, inline = !meta.data.is_empty(), "transaction stored");

        if is_bundle(&meta) && !meta.data.is_empty() {
            if let Err(e) = self.index_bundle(&meta.id, &meta.data).await {
                warn!(tx_id = %meta.id, error = %e, "bundle not indexed");
            }
        }
        Ok(Submission::Stored)
    }

    /// Fill in the payload of a transaction whose header arrived without
    /// data. The payload is checked against the stored header's data root.
    async fn complete_payload(&self, tx_id: &str, payload: &[u8]) -> NodeResult<Submission> {
        let stored = self.get_tx(tx_id).await?;
        self.chunks.split_and_store(&stored, payload).await?;
        info!(tx_id, size = payload.len(), "payload completed for stored header");
        if is_bundle(&stored) {
            if let Err(e) = self.index_bundle(tx_id, payload).await {
                warn!(tx_id, error = %e, "bundle not indexed");
            }
        }
        Ok(Submission::Stored)
    }

    /// Store one chunk of a payload whose transaction is already known.
    pub async fn submit_chunk(&self, chunk: &Chunk) -> NodeResult<u64> {
        Ok(self.chunks.store_chunk(chunk).await?)
    }

    // ---- reads ----

    pub async fn has_tx(&self, tx_id: &str) -> NodeResult<bool> {
        Ok(self.store.exists(Bucket::TxMeta, tx_id).await?)
    }

    /// Whether both the header and every byte of the payload are held.
    pub async fn has_tx_data(&self, tx_id: &str) -> NodeResult<bool> {
        let meta = match self.get_tx(tx_id).await {
            Ok(meta) => meta,
            Err(e) if e.is_not_found() => return Ok(false),
            Err(e) => return Err(e),
        };
        let size = meta.size()?;
        if size == 0 {
            return Ok(true);
        }
        Ok(self.chunks.has_payload(&meta.data_root, size).await?)
    }

    pub async fn get_tx(&self, tx_id: &str) -> NodeResult<TransactionMeta> {
        self.get_record(Bucket::TxMeta, tx_id).await
    }

    /// Full payload. Fails with not-found while any chunk is missing.
    pub async fn get_tx_data(&self, tx_id: &str) -> NodeResult<Vec<u8>> {
        let meta = self.get_tx(tx_id).await?;
        let size = meta.size()?;
        if size == 0 {
            return Ok(Vec::new());
        }
        Ok(self.chunks.load_payload(&meta.data_root, size).await?)
    }

    pub async fn get_tx_offset(&self, tx_id: &str) -> NodeResult<TxOffset> {
        let meta = self.get_tx(tx_id).await?;
        let size = meta.size()?;
        let end = self.chunks.ledger().end_offset(&meta.data_root, size).await?;
        Ok(TxOffset {
            offset: end.to_string(),
            size: size.to_string(),
        })
    }

    pub async fn get_chunk(&self, offset: u64) -> NodeResult<Chunk> {
        Ok(self.chunks.get_chunk(offset).await?)
    }

    // ---- bundles and manifests ----

    /// Decode a bundle payload and store every item with the bundle's
    /// item list, in one batch.
    pub async fn index_bundle(&self, bundle_id: &str, payload: &[u8]) -> NodeResult<Vec<String>> {
        let bundle = Bundle::decode(payload)?;
        let ids = bundle.ids();
        let mut ops = Vec::with_capacity(bundle.items.len() * 2 + 1);
        for item in &bundle.items {
            let id = item.id();
            ops.push(BatchOp::put(Bucket::BundleItemMeta, id.as_str(), encode(&item.meta(bundle_id))?));
            ops.push(BatchOp::put(Bucket::BundleItemBinary, id, item.encode()));
        }
        ops.push(BatchOp::put(Bucket::BundleItems, bundle_id, encode(&ids)?));
        self.store.write_batch(&ops).await?;
        info!(tx_id = bundle_id, items = ids.len(), "bundle indexed");
        Ok(ids)
    }

    /// Item ids of a bundle. A bundle whose payload arrived as chunks is
    /// indexed on first request.
    pub async fn bundle_items(&self, bundle_id: &str) -> NodeResult<Vec<String>> {
        match self.get_record(Bucket::BundleItems, bundle_id).await {
            Err(e) if e.is_not_found() => {}
            other => return other,
        }
        let meta = self.get_tx(bundle_id).await?;
        if !is_bundle(&meta) {
            return Err(NodeError::NotFound(format!("bundle {bundle_id}")));
        }
        let payload = self.get_tx_data(bundle_id).await?;
        self.index_bundle(bundle_id, &payload).await
    }

    pub async fn get_item(&self, item_id: &str) -> NodeResult<ItemMeta> {
        self.get_record(Bucket::BundleItemMeta, item_id).await
    }

    pub async fn get_item_data(&self, item_id: &str) -> NodeResult<Vec<u8>> {
        let raw = self.store.get(Bucket::BundleItemBinary, item_id).await?;
        Ok(BundleItem::decode(&raw)?.data)
    }

    /// Follow `path` through the manifest stored as `manifest_id`.
    pub async fn resolve_manifest(&self, manifest_id: &str, path: &str) -> NodeResult<ManifestTarget> {
        let manifest = self.load_manifest(manifest_id).await?;
        let tx_id = manifest
            .resolve(path)
            .ok_or_else(|| NodeError::NotFound(format!("{manifest_id}/{path}")))?;
        Ok(ManifestTarget {
            manifest_id: manifest_id.to_string(),
            path: path.to_string(),
            tx_id: tx_id.to_string(),
        })
    }

    async fn load_manifest(&self, manifest_id: &str) -> NodeResult<Manifest> {
        let meta = self.get_tx(manifest_id).await?;
        if !meta.is_manifest() {
            return Err(NodeError::NotManifest(manifest_id.to_string()));
        }
        let data = self.get_tx_data(manifest_id).await?;
        Ok(Manifest::parse(&data)?)
    }

    // ---- jobs ----

    pub async fn submit_task(&self, task_type: TaskType, tx_id: &str) -> NodeResult<Submitted> {
        Ok(self.scheduler.submit(TaskKey::new(tx_id, task_type)).await?)
    }

    pub async fn task_status(&self, key: &TaskKey) -> NodeResult<Task> {
        Ok(self.scheduler.status(key).await?)
    }

    pub fn cancel_task(&self, key: &TaskKey) -> NodeResult<()> {
        Ok(self.scheduler.cancel(key)?)
    }

    /// Execute one queued task to completion, then retire it.
    pub async fn run_task(&self, key: TaskKey) {
        let peers = self.ranking.peers();
        let outcome = match key.task_type {
            TaskType::Sync => self.run_sync(&key, &peers).await,
            TaskType::SyncManifest => self.run_sync_manifest(&key, &peers).await,
            TaskType::Broadcast => self.run_broadcast(&key, &peers).await,
            TaskType::BroadcastMeta => self.run_broadcast_meta(&key, &peers).await,
        };
        match outcome {
            Ok(report) => report.apply_to(&self.ranking),
            Err(e) => warn!(task = %key, error = %e, "task failed"),
        }
        if let Err(e) = self.scheduler.finish(&key).await {
            error!(task = %key, error = %e, "failed to retire task");
        }
    }

    async fn run_sync(&self, key: &TaskKey, peers: &[String]) -> NodeResult<BroadcastReport> {
        if self.has_tx_data(&key.tx_id).await? {
            debug!(task = %key, "already stored, nothing to sync");
            return Ok(BroadcastReport::default());
        }
        Ok(self.fetcher.sync(key, peers, self).await?.peers)
    }

    async fn run_sync_manifest(&self, key: &TaskKey, peers: &[String]) -> NodeResult<BroadcastReport> {
        let report = self.run_sync(key, peers).await?;
        if !self.has_tx_data(&key.tx_id).await? {
            return Ok(report);
        }
        let manifest = self.load_manifest(&key.tx_id).await?;
        let mut scheduled = 0;
        for id in manifest.ids() {
            if self.has_tx_data(id).await? {
                continue;
            }
            match self.submit_task(TaskType::Sync, id).await {
                Ok(Submitted::Queued) => scheduled += 1,
                Ok(Submitted::AlreadyRegistered) => {}
                Err(e) if e.is_overload() => {
                    warn!(task = %key, tx_id = id, "registry full, remaining manifest paths not scheduled");
                    break;
                }
                Err(e) => return Err(e),
            }
        }
        info!(task = %key, scheduled, "manifest paths scheduled");
        Ok(report)
    }

    async fn run_broadcast(&self, key: &TaskKey, peers: &[String]) -> NodeResult<BroadcastReport> {
        let meta = self.get_tx(&key.tx_id).await?;
        let payload = self.get_tx_data(&key.tx_id).await?;
        Ok(self
            .engine
            .broadcast_data(key, peers, &meta, &payload, false)
            .await?)
    }

    async fn run_broadcast_meta(&self, key: &TaskKey, peers: &[String]) -> NodeResult<BroadcastReport> {
        let meta = self.get_tx(&key.tx_id).await?;
        Ok(self.engine.broadcast_meta(key, peers, &meta).await?)
    }

    // ---- peers ----

    /// Load persisted peers and their weights into the ranking.
    pub async fn load_peer_weights(&self) -> NodeResult<usize> {
        let keys = self.store.get_all_keys(Bucket::PeerWeight).await?;
        let mut loaded = 0;
        for key in keys {
            let peer = b64_decode(&key)
                .ok()
                .and_then(|raw| String::from_utf8(raw).ok());
            let raw = self.store.get(Bucket::PeerWeight, &key).await?;
            let weight = std::str::from_utf8(&raw).ok().and_then(|s| s.parse::<u64>().ok());
            match (peer, weight) {
                (Some(peer), Some(weight)) => {
                    self.ranking.set_weight(&peer, weight);
                    self.ranking.add_peers([peer]);
                    loaded += 1;
                }
                _ => warn!(key = %key, "skipping unreadable peer weight"),
            }
        }
        self.ranking.recompute();
        Ok(loaded)
    }

    /// Discover peers through the gateway, re-rank, and persist weights.
    pub async fn refresh_peers(&self) -> NodeResult<Arc<Vec<String>>> {
        self.ranking.add_peers(self.config.peers.iter().cloned());
        match self.transport.fetch_peers(self.ranking.gateway()).await {
            Ok(peers) => self.ranking.add_peers(peers),
            Err(e) => warn!(gateway = %self.ranking.gateway(), error = %e, "peer discovery failed"),
        }
        let ordered = self.ranking.recompute();

        let ops: Vec<BatchOp> = ordered
            .iter()
            .filter(|peer| peer.as_str() != self.ranking.gateway())
            .map(|peer| {
                let weight = self.ranking.weight(peer);
                BatchOp::put(Bucket::PeerWeight, b64_encode(peer.as_bytes()), weight.to_string())
            })
            .collect();
        if !ops.is_empty() {
            self.store.write_batch(&ops).await?;
        }
        debug!(peers = ordered.len(), "peer ranking refreshed");
        Ok(ordered)
    }

    pub async fn info(&self) -> NodeResult<NodeInfo> {
        Ok(NodeInfo {
            gateway: self.ranking.gateway().to_string(),
            peers: self.ranking.peers().len(),
            tasks: self.scheduler.manager().len(),
            task_capacity: self.scheduler.manager().capacity(),
            queued: self.scheduler.queue().len(),
            data_end_offset: self.chunks.ledger().data_end_offset().await?,
            store: self.store.kind().to_string(),
        })
    }

    // ---- lifecycle ----

    /// Start the workers, resume pending tasks and schedule peer refresh.
    pub async fn start(self: &Arc<Self>) -> NodeResult<NodeHandle> {
        self.load_peer_weights().await?;
        let (shutdown, signal) = watch::channel(false);
        let workers = self.config.workers.max(1);
        let mut tasks = Vec::with_capacity(workers + 1);
        for id in 0..workers {
            let node = Arc::clone(self);
            let signal = signal.clone();
            tasks.push(tokio::spawn(async move { node.work(id, signal).await }));
        }

        let recovered = self.scheduler.recover().await?;

        if let Some(interval) = self.config.peer_refresh_interval() {
            let node = Arc::clone(self);
            let mut signal = signal.clone();
            tasks.push(tokio::spawn(async move {
                let mut ticker = tokio::time::interval(interval);
                loop {
                    tokio::select! {
                        _ = signal.changed() => break,
                        _ = ticker.tick() => {
                            if let Err(e) = node.refresh_peers().await {
                                warn!(error = %e, "peer refresh failed");
                            }
                        }
                    }
                }
            }));
        }

        info!(workers, recovered, "node started");
        Ok(NodeHandle { shutdown, tasks })
    }

    async fn work(&self, id: usize, mut signal: watch::Receiver<bool>) {
        loop {
            let key = tokio::select! {
                _ = signal.changed() => break,
                key = self.scheduler.next() => key,
            };
            let Some(key) = key else { break };
            debug!(worker = id, task = %key, "task picked up");
            self.run_task(key).await;
        }
        debug!(worker = id, "worker stopped");
    }

    // ---- records ----

    async fn put_record<T: Serialize>(&self, bucket: Bucket, key: &str, value: &T) -> NodeResult<()> {
        self.store.put(bucket, key, &encode(value)?).await?;
        Ok(())
    }

    async fn get_record<T: for<'de> Deserialize<'de>>(&self, bucket: Bucket, key: &str) -> NodeResult<T> {
        let raw = self.store.get(bucket, key).await?;
        bincode::deserialize(&raw).map_err(|e| NodeError::Serialization(format!("{bucket}/{key}: {e}")))
    }
}

fn encode<T: Serialize + ?Sized>(value: &T) -> NodeResult<Vec<u8>> {
    bincode::serialize(value).map_err(|e| NodeError::Serialization(e.to_string()))
}

#[async_trait]
impl SyncSink for Node {
    async fn ingest(&self, mut meta: TransactionMeta, payload: Vec<u8>) -> Result<(), IngestError> {
        if payload.is_empty() && meta.size()? > 0 {
            return Err(format!("{}: peer sent no payload", meta.id).into());
        }
        meta.data = payload;
        self.submit_tx(meta).await?;
        Ok(())
    }
}
