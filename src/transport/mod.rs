//! Network boundary ports
//!
//! The controller never talks to a socket or HTTP client directly. Concrete
//! transports (TLS, retries, timeouts) live behind these traits.

pub mod request;
pub mod stream;

pub use request::{RequestTransport, TransportRequest};
pub use stream::{handshake_frame, AudioFormatDescriptor, SessionStartMessage, StreamFrame, StreamHandle, StreamTransport};
