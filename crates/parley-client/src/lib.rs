pub mod decode;
pub mod transport;

pub mod mock;

pub use decode::{EventStream, FrameDecoder};
pub use transport::{
    ByteStream, ClientConfig, HttpTransport, MessageStream, SessionInfo, Transport,
    DEFAULT_CONNECT_TIMEOUT, DEFAULT_IDLE_TIMEOUT,
};
