//! The seeder node.
//!
//! [`Node`] wires the chunk store, offset ledger, task scheduler, fan-out
//! engine and peer ranking over one [`KeyValueStore`](seeder_store::KeyValueStore).
//! HTTP handlers and job workers both go through it.

pub mod config;
pub mod error;
pub mod lock;
pub mod node;
pub mod verify;

pub use config::NodeConfig;
pub use error::{NodeError, NodeResult};
pub use lock::KeyedLock;
pub use node::{ManifestTarget, Node, NodeHandle, NodeInfo, Submission, TxOffset};
pub use verify::{StructuralVerifier, Verifier};
