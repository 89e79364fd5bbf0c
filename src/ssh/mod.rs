//! SSH 连接与交互式 Stream

pub(crate) mod buffer;
pub mod channel;
pub mod connection;
pub mod handler;
pub mod stream;

pub use channel::{RusshShell, ShellChannel};
pub use connection::Connection;
pub use handler::ClientHandler;
pub use stream::{InteractiveStream, StreamSettings};
