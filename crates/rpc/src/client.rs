//! The caller side of the wire: connecting to a peer, caching the
//! connection, retrying on timeout, and short-circuiting to the local
//! engine when a call targets this node's own id.
//!
//! This is the layer every recursive Chord operation (`find_predecessor`'s
//! loop, `stabilize`'s four probes, `fix_fingers`) goes through, so its
//! retry/backoff/self-routing behaviour is shared by all of them rather
//! than reimplemented at each call site.

use std::future::Future;
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use corelib::{identifier, Config, Identifier};
use dashmap::DashMap;
use rand::Rng;
use tarpc::serde_transport::tcp;
use tarpc::tokio_serde::formats::Bincode;
use tokio::time::{sleep, timeout};

use crate::engine::ChordEngine;
use crate::error::{RpcError, RpcResult};
use crate::peer::ChordPeer;
use crate::service::{ChordServiceClient, WireResult};

/// Establishes a connection to the address a peer resolves to. Exists so
/// tests can substitute an in-process registry for real sockets.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, addr: &str) -> RpcResult<Arc<dyn ChordPeer>>;
}

/// Dials real TCP and wraps the resulting `tarpc` client in [`TarpcPeer`].
pub struct TcpConnector;

#[async_trait]
impl Connector for TcpConnector {
    async fn connect(&self, addr: &str) -> RpcResult<Arc<dyn ChordPeer>> {
        let transport = tcp::connect(addr, Bincode::default)
            .await
            .map_err(|e| RpcError::Unreachable(format!("{addr}: {e}")))?;
        let client = ChordServiceClient::new(tarpc::client::Config::default(), transport).spawn();
        Ok(Arc::new(TarpcPeer {
            client,
            addr: addr.to_string(),
        }))
    }
}

/// A live `tarpc` connection to one peer, implementing [`ChordPeer`] by
/// unwrapping both layers of result tarpc gives us: the transport-level
/// `RpcError` and, for the two lookups that can genuinely fail, the
/// [`WireResult`] the remote engine returned.
pub struct TarpcPeer {
    client: ChordServiceClient,
    addr: String,
}

impl TarpcPeer {
    fn unreachable(&self, err: impl std::fmt::Display) -> RpcError {
        RpcError::Unreachable(format!("{}: {err}", self.addr))
    }

    fn unwrap_wire<T>(&self, result: WireResult<T>) -> RpcResult<T> {
        result.map_err(|message| RpcError::Protocol {
            peer: self.addr.clone(),
            message,
        })
    }
}

#[async_trait]
impl ChordPeer for TarpcPeer {
    async fn find_predecessor(&self, target: Identifier) -> RpcResult<Identifier> {
        let reply = self
            .client
            .find_predecessor(tarpc::context::current(), target)
            .await
            .map_err(|e| self.unreachable(e))?;
        self.unwrap_wire(reply)
    }

    async fn find_successor(&self, target: Identifier) -> RpcResult<Identifier> {
        let reply = self
            .client
            .find_successor(tarpc::context::current(), target)
            .await
            .map_err(|e| self.unreachable(e))?;
        self.unwrap_wire(reply)
    }

    async fn get_predecessor(&self) -> RpcResult<Option<Identifier>> {
        self.client
            .get_predecessor(tarpc::context::current())
            .await
            .map_err(|e| self.unreachable(e))
    }

    async fn set_predecessor(&self, id: Option<Identifier>) -> RpcResult<()> {
        self.client
            .set_predecessor(tarpc::context::current(), id)
            .await
            .map_err(|e| self.unreachable(e))
    }

    async fn get_successor(&self) -> RpcResult<Option<Identifier>> {
        self.client
            .get_successor(tarpc::context::current())
            .await
            .map_err(|e| self.unreachable(e))
    }

    async fn set_successor(&self, id: Identifier) -> RpcResult<()> {
        self.client
            .set_successor(tarpc::context::current(), id)
            .await
            .map_err(|e| self.unreachable(e))
    }

    async fn closest_preceding_finger(&self, target: Identifier) -> RpcResult<Identifier> {
        self.client
            .closest_preceding_finger(tarpc::context::current(), target)
            .await
            .map_err(|e| self.unreachable(e))
    }

    async fn notify(&self, candidate: Identifier) -> RpcResult<()> {
        self.client
            .notify(tarpc::context::current(), candidate)
            .await
            .map_err(|e| self.unreachable(e))
    }

    async fn local_put(&self, key: String, value: String) -> RpcResult<()> {
        self.client
            .local_put(tarpc::context::current(), key, value)
            .await
            .map_err(|e| self.unreachable(e))
    }

    async fn local_get(&self, key: String) -> RpcResult<Option<String>> {
        self.client
            .local_get(tarpc::context::current(), key)
            .await
            .map_err(|e| self.unreachable(e))
    }

    async fn display_finger_table(&self) -> RpcResult<Vec<Option<Identifier>>> {
        self.client
            .display_finger_table(tarpc::context::current())
            .await
            .map_err(|e| self.unreachable(e))
    }

    async fn display_data(&self) -> RpcResult<std::collections::HashMap<String, String>> {
        self.client
            .display_data(tarpc::context::current())
            .await
            .map_err(|e| self.unreachable(e))
    }

    async fn display_backup_successors(&self) -> RpcResult<Vec<Identifier>> {
        self.client
            .display_backup_successors(tarpc::context::current())
            .await
            .map_err(|e| self.unreachable(e))
    }
}

fn random_backoff(config: &Config) -> Duration {
    let lo = config.retry_backoff.start().as_millis() as u64;
    let hi = config.retry_backoff.end().as_millis() as u64;
    if hi <= lo {
        return *config.retry_backoff.start();
    }
    Duration::from_millis(rand::thread_rng().gen_range(lo..=hi))
}

/// Caches one [`ChordPeer`] connection per target identifier and retries a
/// call on timeout or transport failure up to `config.conn_retry` times,
/// evicting the cached connection after any failure so the next attempt
/// reconnects rather than reusing a peer that may be dead.
///
/// Holds the owning engine only as a [`Weak`] reference: the engine holds
/// this client to make outbound calls, so a strong reference back would be
/// a cycle neither side could ever free.
pub struct RemoteClient<E> {
    config: Config,
    self_id: Identifier,
    engine: Weak<E>,
    connector: Arc<dyn Connector>,
    cache: DashMap<Identifier, Arc<dyn ChordPeer>>,
}

impl<E: ChordEngine + 'static> RemoteClient<E> {
    pub fn new(config: Config, self_id: Identifier, engine: Weak<E>, connector: Arc<dyn Connector>) -> Self {
        Self {
            config,
            self_id,
            engine,
            connector,
            cache: DashMap::new(),
        }
    }

    fn engine(&self) -> Arc<E> {
        self.engine
            .upgrade()
            .expect("remote client outlived the engine that owns it")
    }

    async fn peer_for(&self, target: &Identifier) -> RpcResult<Arc<dyn ChordPeer>> {
        if let Some(existing) = self.cache.get(target) {
            return Ok(existing.clone());
        }
        let addr = identifier::net_address(&self.config, target);
        let peer = self.connector.connect(&addr).await?;
        self.cache.insert(target.clone(), peer.clone());
        Ok(peer)
    }

    fn evict(&self, target: &Identifier) {
        self.cache.remove(target);
    }

    async fn call<T, F, Fut>(&self, target: &Identifier, op: F) -> RpcResult<T>
    where
        F: Fn(Arc<dyn ChordPeer>) -> Fut,
        Fut: Future<Output = RpcResult<T>>,
    {
        let mut last_err = None;
        for attempt in 0..=self.config.conn_retry {
            let peer = match self.peer_for(target).await {
                Ok(peer) => peer,
                Err(err) => {
                    last_err = Some(err);
                    self.evict(target);
                    if attempt < self.config.conn_retry {
                        sleep(random_backoff(&self.config)).await;
                    }
                    continue;
                }
            };
            match timeout(self.config.rpc_timeout, op(peer)).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(err)) => {
                    self.evict(target);
                    last_err = Some(err);
                }
                Err(_) => {
                    self.evict(target);
                    last_err = Some(RpcError::Timeout(target.to_string()));
                }
            }
            if attempt < self.config.conn_retry {
                sleep(random_backoff(&self.config)).await;
            }
        }
        Err(last_err.unwrap_or_else(|| RpcError::Unreachable(target.to_string())))
    }

    pub async fn find_predecessor(&self, target: &Identifier, query: Identifier) -> RpcResult<Identifier> {
        if target == &self.self_id {
            return self.engine().find_predecessor(query).await;
        }
        self.call(target, move |peer| {
            let query = query.clone();
            async move { peer.find_predecessor(query).await }
        })
        .await
    }

    pub async fn find_successor(&self, target: &Identifier, query: Identifier) -> RpcResult<Identifier> {
        if target == &self.self_id {
            return self.engine().find_successor(query).await;
        }
        self.call(target, move |peer| {
            let query = query.clone();
            async move { peer.find_successor(query).await }
        })
        .await
    }

    pub async fn get_predecessor(&self, target: &Identifier) -> RpcResult<Option<Identifier>> {
        if target == &self.self_id {
            return Ok(self.engine().get_predecessor().await);
        }
        self.call(target, |peer| async move { peer.get_predecessor().await }).await
    }

    pub async fn set_predecessor(&self, target: &Identifier, id: Option<Identifier>) -> RpcResult<()> {
        if target == &self.self_id {
            self.engine().set_predecessor(id).await;
            return Ok(());
        }
        self.call(target, move |peer| {
            let id = id.clone();
            async move { peer.set_predecessor(id).await }
        })
        .await
    }

    pub async fn get_successor(&self, target: &Identifier) -> RpcResult<Option<Identifier>> {
        if target == &self.self_id {
            return Ok(self.engine().get_successor().await);
        }
        self.call(target, |peer| async move { peer.get_successor().await }).await
    }

    pub async fn set_successor(&self, target: &Identifier, id: Identifier) -> RpcResult<()> {
        if target == &self.self_id {
            self.engine().set_successor(id).await;
            return Ok(());
        }
        self.call(target, move |peer| {
            let id = id.clone();
            async move { peer.set_successor(id).await }
        })
        .await
    }

    pub async fn closest_preceding_finger(&self, target: &Identifier, query: Identifier) -> RpcResult<Identifier> {
        if target == &self.self_id {
            return Ok(self.engine().closest_preceding_finger(query).await);
        }
        self.call(target, move |peer| {
            let query = query.clone();
            async move { peer.closest_preceding_finger(query).await }
        })
        .await
    }

    /// The spec's one routing exception: a node must never notify itself.
    /// This is a silent no-op rather than an error — the caller (stabilize)
    /// only ever reaches this when the ring has collapsed to one node.
    pub async fn notify(&self, target: &Identifier, candidate: Identifier) -> RpcResult<()> {
        if target == &self.self_id {
            tracing::debug!(%target, "skipping self-notify");
            return Ok(());
        }
        self.call(target, move |peer| {
            let candidate = candidate.clone();
            async move { peer.notify(candidate).await }
        })
        .await
    }

    pub async fn local_put(&self, target: &Identifier, key: String, value: String) -> RpcResult<()> {
        if target == &self.self_id {
            self.engine().local_put(key, value).await;
            return Ok(());
        }
        self.call(target, move |peer| {
            let key = key.clone();
            let value = value.clone();
            async move { peer.local_put(key, value).await }
        })
        .await
    }

    pub async fn local_get(&self, target: &Identifier, key: String) -> RpcResult<Option<String>> {
        if target == &self.self_id {
            return Ok(self.engine().local_get(key).await);
        }
        self.call(target, move |peer| {
            let key = key.clone();
            async move { peer.local_get(key).await }
        })
        .await
    }

    pub async fn display_finger_table(&self, target: &Identifier) -> RpcResult<Vec<Option<Identifier>>> {
        if target == &self.self_id {
            return Ok(self.engine().display_finger_table().await);
        }
        self.call(target, |peer| async move { peer.display_finger_table().await }).await
    }

    pub async fn display_data(&self, target: &Identifier) -> RpcResult<std::collections::HashMap<String, String>> {
        if target == &self.self_id {
            return Ok(self.engine().display_data().await);
        }
        self.call(target, |peer| async move { peer.display_data().await }).await
    }

    pub async fn display_backup_successors(&self, target: &Identifier) -> RpcResult<Vec<Identifier>> {
        if target == &self.self_id {
            return Ok(self.engine().display_backup_successors().await);
        }
        self.call(target, |peer| async move { peer.display_backup_successors().await })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_backoff_stays_in_range() {
        let config = Config::with_ring_bits(3);
        for _ in 0..50 {
            let d = random_backoff(&config);
            assert!(d >= *config.retry_backoff.start());
            assert!(d <= *config.retry_backoff.end());
        }
    }
}
