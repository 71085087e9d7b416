//! Connection management: security modes, streams, and the transport.

mod config;
mod stream;
mod transport;

pub use config::Security;
pub use stream::ServerStream;
pub use transport::{StreamLike, Transport, TransportEvent};
