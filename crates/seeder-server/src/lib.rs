//! HTTP surface for the seeder node.
//!
//! The peer-facing endpoints (`POST /tx`, `POST /chunk`,
//! `GET /unconfirmed_tx/:id`, `GET /tx/:id/data`, `GET /peers`) match what
//! [`HttpTransport`](seeder_peer::HttpTransport) calls, so seeders can
//! broadcast to and sync from each other. Handlers only translate; all
//! behaviour lives in [`seeder_node::Node`].

pub mod config;
pub mod error;
pub mod handler;
pub mod router;
pub mod server;

pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use router::build_router;
pub use server::SeederServer;
