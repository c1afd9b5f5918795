use std::path::Path as FsPath;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::TryStreamExt;
use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path;
use object_store::{ObjectMeta, ObjectStore, PutPayload};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::bucket::Bucket;
use crate::config::S3Config;
use crate::error::{StoreError, StoreResult};
use crate::journal;
use crate::traits::{BatchOp, KeyValueStore};

const JOURNAL_DIR: &str = "_journal";
const JOURNAL_NAME: &str = "batch";

/// Key/value store on top of object storage.
///
/// Objects live at `{prefix}/{bucket}/{key}`. Object puts
/// are atomic per object but there is no multi-object transaction, so
/// `write_batch` writes a single journal object first, applies the
/// operations, then removes the journal. A journal found on open is replayed.
///
/// A batch that fails after its journal was written leaves the store
/// unsettled. Every later call replays the journal before touching any key,
/// so no reader observes a half-applied batch.
pub struct ObjectKvStore {
    inner: Arc<dyn ObjectStore>,
    root: String,
    batch_lock: Mutex<()>,
    unsettled: AtomicBool,
    closed: AtomicBool,
}

impl ObjectKvStore {
    /// Wrap an arbitrary object store and replay any pending batch.
    pub async fn new(inner: Arc<dyn ObjectStore>, prefix: &str) -> StoreResult<Self> {
        let root = prefix.trim_matches('/').to_string();
        let store = Self {
            inner,
            root,
            batch_lock: Mutex::new(()),
            unsettled: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        };
        store.recover().await?;
        Ok(store)
    }

    /// Store backed by process memory.
    pub async fn in_memory() -> StoreResult<Self> {
        Self::new(Arc::new(InMemory::new()), "").await
    }

    /// Store backed by a directory on the local filesystem.
    pub async fn local(dir: &FsPath) -> StoreResult<Self> {
        std::fs::create_dir_all(dir)?;
        let fs = LocalFileSystem::new_with_prefix(dir)?;
        info!(path = %dir.display(), "opened local object store");
        Self::new(Arc::new(fs), "").await
    }

    /// Store backed by an S3-compatible bucket.
    pub async fn s3(config: &S3Config) -> StoreResult<Self> {
        let mut builder = AmazonS3Builder::new()
            .with_bucket_name(&config.bucket)
            .with_region(&config.region)
            .with_access_key_id(&config.access_key_id)
            .with_secret_access_key(&config.secret_access_key);
        if let Some(endpoint) = &config.endpoint {
            builder = builder.with_endpoint(endpoint).with_allow_http(true);
        }
        let s3 = builder.build()?;
        info!(bucket = %config.bucket, region = %config.region, "opened s3 store");
        Self::new(Arc::new(s3), config.prefix.as_deref().unwrap_or("")).await
    }

    fn bucket_path(&self, bucket: Bucket) -> Path {
        Path::from_iter([self.root.as_str(), bucket.name()])
    }

    fn key_path(&self, bucket: Bucket, key: &str) -> Path {
        Path::from_iter([self.root.as_str(), bucket.name(), key])
    }

    fn journal_path(&self) -> Path {
        Path::from_iter([self.root.as_str(), JOURNAL_DIR, JOURNAL_NAME])
    }

    /// Fails once closed, and finishes any batch a failed `write_batch` left
    /// behind.
    async fn ready(&self) -> StoreResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StoreError::Closed);
        }
        if self.unsettled.load(Ordering::Acquire) {
            let _guard = self.batch_lock.lock().await;
            self.settle().await?;
        }
        Ok(())
    }

    /// Caller holds `batch_lock`.
    async fn settle(&self) -> StoreResult<()> {
        if self.unsettled.load(Ordering::Acquire) {
            self.recover().await?;
            self.unsettled.store(false, Ordering::Release);
        }
        Ok(())
    }

    async fn apply(&self, ops: &[BatchOp]) -> StoreResult<()> {
        for op in ops {
            match op {
                BatchOp::Put { bucket, key, value } => {
                    self.inner
                        .put(&self.key_path(*bucket, key), PutPayload::from(value.clone()))
                        .await?;
                }
                BatchOp::Delete { bucket, key } => {
                    self.delete_path(&self.key_path(*bucket, key)).await?;
                }
            }
        }
        Ok(())
    }

    async fn delete_path(&self, path: &Path) -> StoreResult<()> {
        match self.inner.delete(path).await {
            Ok(()) | Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Replay a batch left behind by a crash between journal write and removal.
    async fn recover(&self) -> StoreResult<()> {
        let path = self.journal_path();
        let raw = match self.inner.get(&path).await {
            Ok(result) => result.bytes().await?,
            Err(object_store::Error::NotFound { .. }) => return Ok(()),
            Err(e) => return Err(e.into()),
        };
        match journal::decode(&raw) {
            Ok(ops) => {
                info!(ops = ops.len(), "replaying pending batch journal");
                self.apply(&ops).await?;
            }
            // A journal that never fully landed means the batch never started applying.
            Err(e) => warn!(error = %e, "discarding unreadable batch journal"),
        }
        self.delete_path(&path).await
    }
}

#[async_trait]
impl KeyValueStore for ObjectKvStore {
    fn kind(&self) -> &'static str {
        "object"
    }

    async fn put(&self, bucket: Bucket, key: &str, value: &[u8]) -> StoreResult<()> {
        self.ready().await?;
        self.inner
            .put(&self.key_path(bucket, key), PutPayload::from(value.to_vec()))
            .await?;
        Ok(())
    }

    async fn get(&self, bucket: Bucket, key: &str) -> StoreResult<Vec<u8>> {
        self.ready().await?;
        match self.inner.get(&self.key_path(bucket, key)).await {
            Ok(result) => Ok(result.bytes().await?.to_vec()),
            Err(object_store::Error::NotFound { .. }) => Err(StoreError::not_exist(bucket, key)),
            Err(e) => Err(e.into()),
        }
    }

    async fn get_all_keys(&self, bucket: Bucket) -> StoreResult<Vec<String>> {
        self.ready().await?;
        let prefix = self.bucket_path(bucket);
        let objects: Vec<ObjectMeta> = self.inner.list(Some(&prefix)).try_collect().await?;
        let mut keys: Vec<String> = objects
            .iter()
            .filter_map(|meta| meta.location.filename().map(str::to_string))
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn delete(&self, bucket: Bucket, key: &str) -> StoreResult<()> {
        self.ready().await?;
        self.delete_path(&self.key_path(bucket, key)).await
    }

    async fn write_batch(&self, ops: &[BatchOp]) -> StoreResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StoreError::Closed);
        }
        let _guard = self.batch_lock.lock().await;
        self.settle().await?;

        let encoded = journal::encode(ops)?;
        let journal_path = self.journal_path();
        self.unsettled.store(true, Ordering::Release);
        self.inner
            .put(&journal_path, PutPayload::from(encoded))
            .await?;
        self.apply(ops).await?;
        self.delete_path(&journal_path).await?;
        self.unsettled.store(false, Ordering::Release);
        debug!(ops = ops.len(), "batch committed");
        Ok(())
    }

    async fn close(&self) -> StoreResult<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

impl std::fmt::Debug for ObjectKvStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectKvStore")
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::conformance;
    use futures_util::stream::BoxStream;
    use object_store::{
        GetOptions, GetResult, ListResult, MultipartUpload, PutMultipartOpts, PutOptions,
        PutResult,
    };

    /// In-memory backend whose puts to one chosen path fail.
    #[derive(Debug, Default)]
    struct FailingPuts {
        inner: InMemory,
        fail_on: std::sync::Mutex<Option<Path>>,
    }

    impl FailingPuts {
        fn fail_on(&self, path: Option<Path>) {
            *self.fail_on.lock().unwrap() = path;
        }
    }

    impl std::fmt::Display for FailingPuts {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "FailingPuts")
        }
    }

    #[async_trait]
    impl ObjectStore for FailingPuts {
        async fn put_opts(
            &self,
            location: &Path,
            payload: PutPayload,
            opts: PutOptions,
        ) -> object_store::Result<PutResult> {
            if self.fail_on.lock().unwrap().as_ref() == Some(location) {
                return Err(object_store::Error::Generic {
                    store: "failing",
                    source: "injected put failure".into(),
                });
            }
            self.inner.put_opts(location, payload, opts).await
        }

        async fn put_multipart_opts(
            &self,
            location: &Path,
            opts: PutMultipartOpts,
        ) -> object_store::Result<Box<dyn MultipartUpload>> {
            self.inner.put_multipart_opts(location, opts).await
        }

        async fn get_opts(
            &self,
            location: &Path,
            options: GetOptions,
        ) -> object_store::Result<GetResult> {
            self.inner.get_opts(location, options).await
        }

        async fn delete(&self, location: &Path) -> object_store::Result<()> {
            self.inner.delete(location).await
        }

        fn list(&self, prefix: Option<&Path>) -> BoxStream<'_, object_store::Result<ObjectMeta>> {
            self.inner.list(prefix)
        }

        async fn list_with_delimiter(
            &self,
            prefix: Option<&Path>,
        ) -> object_store::Result<ListResult> {
            self.inner.list_with_delimiter(prefix).await
        }

        async fn copy(&self, from: &Path, to: &Path) -> object_store::Result<()> {
            self.inner.copy(from, to).await
        }

        async fn copy_if_not_exists(&self, from: &Path, to: &Path) -> object_store::Result<()> {
            self.inner.copy_if_not_exists(from, to).await
        }
    }

    #[tokio::test]
    async fn satisfies_store_contract_in_memory() {
        let store = ObjectKvStore::in_memory().await.unwrap();
        conformance::run(&store).await;
    }

    #[tokio::test]
    async fn satisfies_store_contract_on_local_fs() {
        let dir = tempfile::tempdir().unwrap();
        let store = ObjectKvStore::local(dir.path()).await.unwrap();
        conformance::run(&store).await;
    }

    #[tokio::test]
    async fn pending_journal_is_replayed_on_open() {
        let backend: Arc<dyn ObjectStore> = Arc::new(InMemory::new());
        let store = ObjectKvStore::new(Arc::clone(&backend), "node").await.unwrap();

        // Simulate a crash after the journal landed but before it was applied.
        let ops = vec![
            BatchOp::put(Bucket::Constants, "all-data-end-offset", b"100".to_vec()),
            BatchOp::put(Bucket::TxDataEndOffset, "R-100", b"100".to_vec()),
        ];
        backend
            .put(&store.journal_path(), PutPayload::from(journal::encode(&ops).unwrap()))
            .await
            .unwrap();
        drop(store);

        let store = ObjectKvStore::new(Arc::clone(&backend), "node").await.unwrap();
        assert_eq!(
            store.get(Bucket::Constants, "all-data-end-offset").await.unwrap(),
            b"100".to_vec()
        );
        assert_eq!(
            store.get(Bucket::TxDataEndOffset, "R-100").await.unwrap(),
            b"100".to_vec()
        );
        assert!(matches!(
            backend.get(&store.journal_path()).await,
            Err(object_store::Error::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn failed_batch_is_completed_before_the_next_read() {
        let backend = Arc::new(FailingPuts::default());
        let store = ObjectKvStore::new(backend.clone(), "node").await.unwrap();
        let ops = vec![
            BatchOp::put(Bucket::Constants, "all-data-end-offset", b"100".to_vec()),
            BatchOp::put(Bucket::TxDataEndOffset, "R-100", b"100".to_vec()),
        ];

        // The counter lands, the entry does not.
        backend.fail_on(Some(store.key_path(Bucket::TxDataEndOffset, "R-100")));
        assert!(store.write_batch(&ops).await.is_err());
        backend.fail_on(None);

        assert_eq!(
            store.get(Bucket::TxDataEndOffset, "R-100").await.unwrap(),
            b"100".to_vec()
        );
        assert_eq!(
            store.get(Bucket::Constants, "all-data-end-offset").await.unwrap(),
            b"100".to_vec()
        );
        assert!(matches!(
            backend.get(&store.journal_path()).await,
            Err(object_store::Error::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn failed_batch_keeps_failing_reads_until_it_can_be_completed() {
        let backend = Arc::new(FailingPuts::default());
        let store = ObjectKvStore::new(backend.clone(), "").await.unwrap();
        let entry = store.key_path(Bucket::TxDataEndOffset, "R-100");
        backend.fail_on(Some(entry));
        let ops = vec![
            BatchOp::put(Bucket::Constants, "all-data-end-offset", b"100".to_vec()),
            BatchOp::put(Bucket::TxDataEndOffset, "R-100", b"100".to_vec()),
        ];
        assert!(store.write_batch(&ops).await.is_err());

        // No read may see the advanced counter without its entry.
        assert!(store.get(Bucket::Constants, "all-data-end-offset").await.is_err());

        backend.fail_on(None);
        store
            .write_batch(&[BatchOp::put(Bucket::TxMeta, "tx", b"m".to_vec())])
            .await
            .unwrap();
        assert!(store.exists(Bucket::TxDataEndOffset, "R-100").await.unwrap());
        assert!(store.exists(Bucket::TxMeta, "tx").await.unwrap());
    }

    #[tokio::test]
    async fn unreadable_journal_is_discarded() {
        let backend: Arc<dyn ObjectStore> = Arc::new(InMemory::new());
        let store = ObjectKvStore::new(Arc::clone(&backend), "").await.unwrap();
        backend
            .put(&store.journal_path(), PutPayload::from(vec![0u8, 1, 2]))
            .await
            .unwrap();
        drop(store);

        let store = ObjectKvStore::new(Arc::clone(&backend), "").await.unwrap();
        assert!(store.get_all_keys(Bucket::Constants).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn prefixes_isolate_stores() {
        let backend: Arc<dyn ObjectStore> = Arc::new(InMemory::new());
        let a = ObjectKvStore::new(Arc::clone(&backend), "a").await.unwrap();
        let b = ObjectKvStore::new(Arc::clone(&backend), "b").await.unwrap();
        a.put(Bucket::TxMeta, "tx", b"1").await.unwrap();
        assert!(b.get(Bucket::TxMeta, "tx").await.unwrap_err().is_not_exist());
    }
}
