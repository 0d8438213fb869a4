//! The listener side: accept connections on the fixed Chord port, spawn
//! one server task per connection, and stop accepting new ones once told
//! to shut down.
//!
//! Modelled on `tarpc`'s standard `BaseChannel`-per-connection pattern,
//! with the stop signal piped through a [`watch`] channel the way the
//! periodic maintenance loop is (see `chord::scheduler`) — one shutdown
//! primitive for the whole process rather than two different ones.

use std::net::SocketAddr;
use std::sync::Arc;

use futures::{future, StreamExt};
use tarpc::server::{self, Channel};
use tarpc::serde_transport::tcp;
use tarpc::tokio_serde::formats::Bincode;
use tokio::sync::watch;

use crate::engine::ChordEngine;
use crate::error::{RpcError, RpcResult};
use crate::service::{ChordService, RpcServer};

/// Binds `bind_addr` and serves `engine` until `shutdown` reports `true`.
/// Connections already being handled are allowed to finish; no new ones
/// are accepted afterwards.
pub async fn serve<E: ChordEngine + 'static>(
    engine: Arc<E>,
    bind_addr: SocketAddr,
    mut shutdown: watch::Receiver<bool>,
) -> RpcResult<()> {
    let mut listener = tcp::listen(bind_addr, Bincode::default)
        .await
        .map_err(|e| RpcError::Unreachable(format!("{bind_addr}: {e}")))?;
    listener.config_mut().max_frame_length(usize::MAX);

    let server = RpcServer::new(engine);

    listener
        .filter_map(|conn| future::ready(conn.ok()))
        .map(server::BaseChannel::with_defaults)
        .map(|channel| {
            let server = server.clone();
            channel.execute(server.serve()).for_each(|fut| async move {
                tokio::spawn(fut);
            })
        })
        .buffer_unordered(64)
        .take_until(async move {
            let _ = shutdown.changed().await;
        })
        .for_each(|()| async {})
        .await;

    Ok(())
}
