//! Peer fan-out.
//!
//! [`BroadcastEngine`] pushes a transaction (and optionally its payload) to
//! every peer in order; [`SyncFetcher`] pulls one from the first peer that
//! can serve it. Both report per-peer outcomes in the task registry and
//! honour cooperative cancellation.

pub mod engine;
pub mod error;
pub mod report;
pub mod sync;

pub use engine::BroadcastEngine;
pub use error::{BroadcastError, BroadcastResult};
pub use report::BroadcastReport;
pub use sync::{IngestError, SyncFetcher, SyncReport, SyncSink};
