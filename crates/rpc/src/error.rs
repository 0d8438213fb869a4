//! Errors a caller sees when talking to another node over the wire.
//!
//! These map directly onto the three kinds in the protocol's error
//! handling design: a timeout is retried by [`crate::client::RemoteClient`]
//! and only promoted to [`RpcError::Unreachable`] once retries are
//! exhausted; everything the wire protocol itself can't make sense of is
//! [`RpcError::Protocol`].

use thiserror::Error;

pub type RpcResult<T> = Result<T, RpcError>;

#[derive(Error, Debug, Clone)]
pub enum RpcError {
    #[error("rpc to {0} timed out")]
    Timeout(String),

    #[error("peer {0} is unreachable")]
    Unreachable(String),

    #[error("protocol violation talking to {peer}: {message}")]
    Protocol { peer: String, message: String },
}
