//! What [`crate::client::RemoteClient`] needs from a connection to another
//! node — the wire-facing mirror of [`crate::engine::ChordEngine`].
//!
//! Every method here crosses a network (or, for a loopback test double, a
//! channel) and so every one of them can fail with [`crate::error::RpcError`],
//! unlike the local engine where only the two recursive lookups can.
//!
//! Two implementations exist: [`crate::client::TarpcPeer`] talks real TCP
//! via the [`crate::service`] tarpc contract; [`crate::loopback::LoopbackPeer`]
//! dispatches straight into another in-process engine for tests. Both are
//! driven through this trait so the caller never has to know which one it
//! holds.

use async_trait::async_trait;
use corelib::Identifier;
use std::collections::HashMap;

use crate::error::RpcResult;

#[async_trait]
pub trait ChordPeer: Send + Sync {
    async fn find_predecessor(&self, target: Identifier) -> RpcResult<Identifier>;
    async fn find_successor(&self, target: Identifier) -> RpcResult<Identifier>;

    async fn get_predecessor(&self) -> RpcResult<Option<Identifier>>;
    async fn set_predecessor(&self, id: Option<Identifier>) -> RpcResult<()>;

    async fn get_successor(&self) -> RpcResult<Option<Identifier>>;
    async fn set_successor(&self, id: Identifier) -> RpcResult<()>;

    async fn closest_preceding_finger(&self, target: Identifier) -> RpcResult<Identifier>;
    async fn notify(&self, candidate: Identifier) -> RpcResult<()>;

    async fn local_put(&self, key: String, value: String) -> RpcResult<()>;
    async fn local_get(&self, key: String) -> RpcResult<Option<String>>;

    async fn display_finger_table(&self) -> RpcResult<Vec<Option<Identifier>>>;
    async fn display_data(&self) -> RpcResult<HashMap<String, String>>;
    async fn display_backup_successors(&self) -> RpcResult<Vec<Identifier>>;
}
