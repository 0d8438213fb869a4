//! An in-process stand-in for the network, used by the join/stabilize/
//! failure-drill test suites in `chord`. Every node in a test ring
//! registers its engine here instead of binding a socket; connecting to
//! an address resolves straight to the matching engine, and a node can be
//! flipped "dead" to drive the same fault-recovery paths a real dropped
//! connection would.
//!
//! Mirrors the `MockServer` pattern from the reference test harness this
//! protocol was validated against: a dictionary of node id to live
//! instance, with a kill switch per entry instead of a real socket
//! actually going away.

use std::sync::Arc;

use async_trait::async_trait;
use corelib::{Config, Identifier};
use dashmap::DashMap;

use crate::client::Connector;
use crate::engine::ChordEngine;
use crate::error::{RpcError, RpcResult};
use crate::peer::ChordPeer;

pub struct LoopbackRegistry {
    config: Config,
    nodes: DashMap<Identifier, Arc<dyn ChordEngine>>,
    alive: DashMap<Identifier, bool>,
}

impl LoopbackRegistry {
    pub fn new(config: Config) -> Arc<Self> {
        Arc::new(Self {
            config,
            nodes: DashMap::new(),
            alive: DashMap::new(),
        })
    }

    pub fn register(&self, engine: Arc<dyn ChordEngine>) {
        let id = engine.id();
        self.alive.insert(id.clone(), true);
        self.nodes.insert(id, engine);
    }

    pub fn kill(&self, id: &Identifier) {
        self.alive.insert(id.clone(), false);
    }

    pub fn revive(&self, id: &Identifier) {
        self.alive.insert(id.clone(), true);
    }

    pub fn is_alive(&self, id: &Identifier) -> bool {
        self.alive.get(id).map(|entry| *entry).unwrap_or(false)
    }

    pub fn engine(&self, id: &Identifier) -> Option<Arc<dyn ChordEngine>> {
        self.nodes.get(id).map(|entry| entry.clone())
    }

    pub fn connector(self: &Arc<Self>) -> Arc<dyn Connector> {
        Arc::new(LoopbackConnector {
            registry: self.clone(),
        })
    }

    fn resolve(&self, addr: &str) -> Option<Identifier> {
        let host = addr.rsplit_once(':').map(|(host, _port)| host).unwrap_or(addr);
        let hex = host.strip_prefix(&self.config.host_prefix)?;
        Identifier::parse(&self.config, hex).ok()
    }
}

pub struct LoopbackConnector {
    registry: Arc<LoopbackRegistry>,
}

#[async_trait]
impl Connector for LoopbackConnector {
    async fn connect(&self, addr: &str) -> RpcResult<Arc<dyn ChordPeer>> {
        let id = self
            .registry
            .resolve(addr)
            .ok_or_else(|| RpcError::Unreachable(addr.to_string()))?;
        if !self.registry.is_alive(&id) {
            return Err(RpcError::Unreachable(addr.to_string()));
        }
        let engine = self
            .registry
            .engine(&id)
            .ok_or_else(|| RpcError::Unreachable(addr.to_string()))?;
        Ok(Arc::new(LoopbackPeer {
            registry: self.registry.clone(),
            target: id,
            engine,
        }))
    }
}

pub struct LoopbackPeer {
    registry: Arc<LoopbackRegistry>,
    target: Identifier,
    engine: Arc<dyn ChordEngine>,
}

impl LoopbackPeer {
    fn check_alive(&self) -> RpcResult<()> {
        if self.registry.is_alive(&self.target) {
            Ok(())
        } else {
            Err(RpcError::Unreachable(self.target.to_string()))
        }
    }
}

#[async_trait]
impl ChordPeer for LoopbackPeer {
    async fn find_predecessor(&self, target: Identifier) -> RpcResult<Identifier> {
        self.check_alive()?;
        self.engine.find_predecessor(target).await
    }

    async fn find_successor(&self, target: Identifier) -> RpcResult<Identifier> {
        self.check_alive()?;
        self.engine.find_successor(target).await
    }

    async fn get_predecessor(&self) -> RpcResult<Option<Identifier>> {
        self.check_alive()?;
        Ok(self.engine.get_predecessor().await)
    }

    async fn set_predecessor(&self, id: Option<Identifier>) -> RpcResult<()> {
        self.check_alive()?;
        self.engine.set_predecessor(id).await;
        Ok(())
    }

    async fn get_successor(&self) -> RpcResult<Option<Identifier>> {
        self.check_alive()?;
        Ok(self.engine.get_successor().await)
    }

    async fn set_successor(&self, id: Identifier) -> RpcResult<()> {
        self.check_alive()?;
        self.engine.set_successor(id).await;
        Ok(())
    }

    async fn closest_preceding_finger(&self, target: Identifier) -> RpcResult<Identifier> {
        self.check_alive()?;
        Ok(self.engine.closest_preceding_finger(target).await)
    }

    async fn notify(&self, candidate: Identifier) -> RpcResult<()> {
        self.check_alive()?;
        self.engine.notify(candidate).await;
        Ok(())
    }

    async fn local_put(&self, key: String, value: String) -> RpcResult<()> {
        self.check_alive()?;
        self.engine.local_put(key, value).await;
        Ok(())
    }

    async fn local_get(&self, key: String) -> RpcResult<Option<String>> {
        self.check_alive()?;
        Ok(self.engine.local_get(key).await)
    }

    async fn display_finger_table(&self) -> RpcResult<Vec<Option<Identifier>>> {
        self.check_alive()?;
        Ok(self.engine.display_finger_table().await)
    }

    async fn display_data(&self) -> RpcResult<std::collections::HashMap<String, String>> {
        self.check_alive()?;
        Ok(self.engine.display_data().await)
    }

    async fn display_backup_successors(&self) -> RpcResult<Vec<Identifier>> {
        self.check_alive()?;
        Ok(self.engine.display_backup_successors().await)
    }
}
