//! The network façade: the wire contract between nodes, the connection
//! cache and retry policy callers go through to reach a peer, and an
//! in-process loopback double of the same contract for tests.

pub mod client;
pub mod engine;
pub mod error;
pub mod loopback;
pub mod peer;
pub mod server;
pub mod service;

pub use client::{Connector, RemoteClient, TcpConnector};
pub use engine::ChordEngine;
pub use error::{RpcError, RpcResult};
pub use peer::ChordPeer;
pub use service::{ChordService, ChordServiceClient, RpcServer};
