// pushline-api: HTTP transport and wire framing for push channels

pub mod client;
pub mod error;
pub mod frame;
pub mod transport;

pub use client::{ByteStream, Endpoints, PushClient};
pub use error::Error;
pub use frame::{EventRecord, FrameParser, parse_chunk};
pub use transport::{TlsMode, TransportConfig};
