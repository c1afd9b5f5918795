//! Foundation types for the seeder node.
//!
//! Every other seeder crate depends on `seeder-types`. Nothing in here
//! performs I/O.
//!
//! # Key Types
//!
//! - [`TransactionMeta`] -- verified transaction record with an optional inline payload
//! - [`Chunk`] -- one contiguous slice of a payload together with its proof path
//! - [`TaskType`] / [`TaskKey`] -- identity of a propagation or sync task

pub mod chunk;
pub mod encoding;
pub mod error;
pub mod task;
pub mod transaction;

pub use chunk::Chunk;
pub use encoding::{b64_decode, b64_encode};
pub use error::{TypeError, TypeResult};
pub use task::{TaskKey, TaskType};
pub use transaction::{id_from_signature, parse_size, Tag, TransactionMeta, MANIFEST_CONTENT_TYPE};
