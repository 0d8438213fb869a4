//! The live, networked node: local state behind a single lock, plus the
//! RPC client used to reach every other node.
//!
//! Every mutation goes through [`parking_lot::Mutex`] around a single
//! [`Node`], held only long enough to read or write a field — never
//! across an `.await`. The recursive lookups release the lock before
//! issuing a remote call and reacquire it only to read the next piece of
//! state, exactly the "read under lock, call lock-free, commit under
//! lock" discipline the concurrency model requires.

use std::sync::{Arc, Weak};

use async_trait::async_trait;
use corelib::{identifier, Config, Identifier, Node};
use parking_lot::Mutex;
use rpc::{ChordEngine, Connector, RemoteClient, RpcError, RpcResult};
use std::collections::HashMap;

/// The live node. Construct with [`Engine::new`], which ties the engine
/// to its own [`RemoteClient`] without a true reference cycle.
pub struct Engine {
    pub(crate) config: Config,
    pub(crate) node: Mutex<Node>,
    pub(crate) remote: RemoteClient<Engine>,
}

impl Engine {
    pub fn new(config: Config, id: Identifier, connector: Arc<dyn Connector>) -> Arc<Self> {
        Arc::new_cyclic(|weak: &Weak<Self>| Self {
            node: Mutex::new(Node::new(&config, id.clone())),
            remote: RemoteClient::new(config.clone(), id, weak.clone(), connector),
            config,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Snapshot of this node's successor (finger[1]), read under lock.
    pub(crate) fn successor_snapshot(&self) -> Option<Identifier> {
        self.node.lock().get_successor()
    }
}

#[async_trait]
impl ChordEngine for Engine {
    fn id(&self) -> Identifier {
        self.node.lock().id().clone()
    }

    async fn find_predecessor(&self, target: Identifier) -> RpcResult<Identifier> {
        let mut n = self.id();
        let mut succ = self.successor_snapshot();
        while !identifier::in_range_ei(&self.config, Some(&target), Some(&n), succ.as_ref()) {
            let cpt = self.remote.closest_preceding_finger(&n, target.clone()).await?;
            if cpt == n {
                // Mirrors the "mine" fix in the reference implementation:
                // without this the loop never terminates once the closest
                // finger it can find is itself.
                break;
            }
            n = cpt;
            succ = self.remote.get_successor(&n).await?;
        }
        Ok(n)
    }

    async fn find_successor(&self, target: Identifier) -> RpcResult<Identifier> {
        let pred = self.find_predecessor(target).await?;
        self.remote
            .get_successor(&pred)
            .await?
            .ok_or_else(|| RpcError::Protocol {
                peer: pred.to_string(),
                message: "successor is unset".to_string(),
            })
    }

    async fn get_predecessor(&self) -> Option<Identifier> {
        self.node.lock().get_predecessor()
    }

    async fn set_predecessor(&self, id: Option<Identifier>) {
        self.node.lock().set_predecessor(id);
    }

    async fn get_successor(&self) -> Option<Identifier> {
        self.node.lock().get_successor()
    }

    async fn set_successor(&self, id: Identifier) {
        self.node.lock().set_successor(id);
    }

    async fn closest_preceding_finger(&self, target: Identifier) -> Identifier {
        self.node.lock().closest_preceding_finger(&self.config, &target)
    }

    async fn notify(&self, candidate: Identifier) {
        self.node.lock().notify(&self.config, candidate);
    }

    async fn local_put(&self, key: String, value: String) {
        self.node.lock().local_put(key, value);
    }

    async fn local_get(&self, key: String) -> Option<String> {
        self.node.lock().local_get(&key)
    }

    async fn display_finger_table(&self) -> Vec<Option<Identifier>> {
        self.node.lock().display_finger_table()
    }

    async fn display_data(&self) -> HashMap<String, String> {
        self.node.lock().display_data().clone()
    }

    async fn display_backup_successors(&self) -> Vec<Identifier> {
        self.node.lock().backup_successors().to_vec()
    }
}
