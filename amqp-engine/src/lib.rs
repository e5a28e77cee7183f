#![cfg_attr(docsrs, feature(doc_cfg))]

//! An I/O-free AMQP 1.0 protocol engine with a thin async client facade.
//!
//! The [`engine`] module holds the actual protocol state machines
//! (connection, session, link, delivery) and never touches a socket: feed it
//! bytes with [`Engine::ingest`], drain bytes to write with
//! [`Engine::pending_output`], and call [`Engine::tick`] on a timer. The
//! [`client`] module drives an [`Engine`] against a real
//! [`Transport`](client::Transport) from async code.
//!
//! # Feature flags
//!
//! default: `[]`
//!
//! - `"scram"`: enables the `SCRAM-SHA-256` SASL mechanism alongside the
//!   always-available `ANONYMOUS` and `PLAIN`.
//! - `"tracing"`: emits `tracing` events at the engine's protocol boundaries.
//!
//! # Quick start
//!
//! This crate never dials a socket itself; callers hand in an
//! already-connected [`Transport`](client::Transport) (a `TcpStream`, a TLS
//! stream, or, as below, an in-memory pair for testing against a peer in the
//! same process).
//!
//! ```no_run
//! use amqp_engine::client::Connection;
//!
//! # async fn connect_peer() -> tokio::io::DuplexStream {
//! #     let (a, _b) = tokio::io::duplex(4096);
//! #     a
//! # }
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let transport = connect_peer().await;
//!     let mut connection =
//!         Connection::open_with_transport("connection-1", transport, None, Default::default())
//!             .await?;
//!     let mut session = connection.begin_session().await?;
//!
//!     let mut sender = session.attach_sender("rust-sender-link-1", "q1").await?;
//!     let mut receiver = session.attach_receiver("rust-receiver-link-1", "q1", 100).await?;
//!
//!     sender.send(b"hello AMQP".to_vec()).await?;
//!     let delivery = receiver.recv().await?;
//!     receiver.accept(&delivery).await?;
//!
//!     sender.detach().await?;
//!     receiver.detach().await?;
//!     session.end().await?;
//!     connection.close().await?;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod connection;
pub mod delivery;
pub mod engine;
pub mod error;
pub mod frame;
pub mod link;
pub mod protocol_header;
pub mod sasl;
#[cfg(feature = "scram")]
pub mod scram;
pub mod session;

pub mod types {
    //! Re-exporting `amqp-types`.
    pub use amqp_types::*;
}

pub use engine::Engine;
pub use error::{EngineError, Result};

/// Message bytes carried by a transfer, independent of any higher-level
/// encoding a caller chooses to layer on top.
pub type Payload = bytes::Bytes;
