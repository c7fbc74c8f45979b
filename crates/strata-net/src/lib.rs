//! Multiplayer sync: wire protocol, sessions, the relay that routes between
//! them, a TCP/TLS server and a client adapter.
#![forbid(unsafe_code)]

pub mod client;
mod error;
pub mod protocol;
pub mod relay;
pub mod server;
pub mod session;
pub mod tls;

pub use client::{Hello, NetClient, RemoteSync, Welcome};
pub use error::NetError;
pub use protocol::{ClientMessage, ErrorReason, Position, SPAWN, ServerMessage};
pub use relay::Relay;
pub use server::{MAX_FRAME, Server, ServerConfig};
pub use session::{ConnId, MAX_SESSIONS, Session, SessionManager};
pub use tls::{ClientTls, TlsFiles};
