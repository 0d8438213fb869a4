//! The operation set a running node exposes — to its own maintenance
//! loop, to the RPC server that fields requests from other nodes, and
//! (through the self-routing shortcut) to its own [`crate::client::RemoteClient`].
//!
//! This trait is the seam between `corelib`'s pure ring arithmetic and the
//! network: every method here may recurse into remote calls, which is why
//! it lives in `rpc` rather than `corelib`. Only [`find_predecessor`] and
//! [`find_successor`] can genuinely fail — they recurse through other
//! peers, and a partitioned ring with no live backup anywhere is a real,
//! if rare, failure. Every other method here is a lock, a read or write,
//! and a lock release; it cannot fail on its own terms.
//!
//! [`find_predecessor`]: ChordEngine::find_predecessor
//! [`find_successor`]: ChordEngine::find_successor

use async_trait::async_trait;
use corelib::Identifier;
use std::collections::HashMap;

use crate::error::RpcResult;

#[async_trait]
pub trait ChordEngine: Send + Sync {
    fn id(&self) -> Identifier;

    /// Recursively resolve the predecessor of `target`, possibly issuing
    /// remote calls along the way.
    async fn find_predecessor(&self, target: Identifier) -> RpcResult<Identifier>;

    /// Recursively resolve the successor of `target`.
    async fn find_successor(&self, target: Identifier) -> RpcResult<Identifier>;

    async fn get_predecessor(&self) -> Option<Identifier>;
    async fn set_predecessor(&self, id: Option<Identifier>);

    async fn get_successor(&self) -> Option<Identifier>;
    async fn set_successor(&self, id: Identifier);

    /// Pure local scan of the finger table; never recurses.
    async fn closest_preceding_finger(&self, target: Identifier) -> Identifier;

    /// `candidate` thinks it might be our predecessor.
    async fn notify(&self, candidate: Identifier);

    async fn local_put(&self, key: String, value: String);
    async fn local_get(&self, key: String) -> Option<String>;

    async fn display_finger_table(&self) -> Vec<Option<Identifier>>;
    async fn display_data(&self) -> HashMap<String, String>;
    async fn display_backup_successors(&self) -> Vec<Identifier>;
}
