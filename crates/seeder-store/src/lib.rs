//! Bucketed key/value storage for the seeder node.
//!
//! Every persistent record the node keeps (transaction records, offset
//! ledger entries, chunks, task snapshots, pending-pool markers, bundle
//! items) lives in one [`KeyValueStore`], namespaced by [`Bucket`].
//!
//! # Storage Backends
//!
//! All backends implement the [`KeyValueStore`] trait with identical
//! semantics:
//!
//! - [`InMemoryStore`] -- `HashMap`-based store for tests and embedding
//! - [`SqliteStore`] -- embedded single-file B-tree engine
//! - [`ObjectKvStore`] -- S3-compatible or local-filesystem object storage
//!
//! # Contract
//!
//! 1. `get` on a missing key returns [`StoreError::NotExist`], never an empty value.
//! 2. `delete` of a missing key succeeds.
//! 3. `write_batch` applies all of its operations or none of them.
//! 4. Single-key operations are atomic per key.

pub mod bucket;
pub mod config;
pub mod error;
pub mod factory;
mod journal;
pub mod memory;
pub mod object;
pub mod sqlite;
pub mod traits;

pub use bucket::{ensure_schema, keys, Bucket, SCHEMA_VERSION};
pub use config::{S3Config, StoreBackend, StoreConfig};
pub use error::{StoreError, StoreResult};
pub use factory::open_store;
pub use memory::InMemoryStore;
pub use object::ObjectKvStore;
pub use sqlite::SqliteStore;
pub use traits::{BatchOp, KeyValueStore};
