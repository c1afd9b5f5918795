//! Peer access: the [`PeerTransport`] seam, its HTTP implementation, and
//! the [`PeerRanking`] that orders peers for fan-out.

pub mod error;
pub mod http;
pub mod ranking;
pub mod transport;

pub use error::{PeerError, PeerResult};
pub use http::{peer_url, HttpTransport};
pub use ranking::PeerRanking;
pub use transport::{PeerTransport, SubmitStatus};
