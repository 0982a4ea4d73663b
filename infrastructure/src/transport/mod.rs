//! [`Transport`](nbkernel_application::Transport) implementations.
//!
//! - [`LoopbackTransport`]: in-process, for tests and embedding
//! - `ZmqTransport`: ZeroMQ sockets to a local kernel (feature `zmq`)
//! - `WebSocketTransport`: Jupyter server kernel channels (feature `server`)

pub mod loopback;
#[cfg(feature = "server")]
pub mod websocket;
#[cfg(feature = "zmq")]
pub mod zmq;

pub use loopback::LoopbackTransport;
#[cfg(feature = "server")]
pub use websocket::WebSocketTransport;
#[cfg(feature = "zmq")]
pub use zmq::ZmqTransport;
