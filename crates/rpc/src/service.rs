//! The wire contract: a `tarpc` service trait generated into a matching
//! client stub and dispatch trait, plus [`RpcServer`], the thin adapter
//! that turns the server half of that contract into calls on a local
//! [`ChordEngine`].

use std::collections::HashMap;
use std::sync::Arc;

use corelib::Identifier;
use tarpc::context;

use crate::engine::ChordEngine;

/// The two recursive lookups are the only operations that can fail on the
/// wire for a reason the caller should see (the local engine exhausted
/// every backup successor); everything else is a lock and a field access.
pub type WireResult<T> = Result<T, String>;

#[tarpc::service]
pub trait ChordService {
    async fn find_predecessor(target: Identifier) -> WireResult<Identifier>;
    async fn find_successor(target: Identifier) -> WireResult<Identifier>;

    async fn get_predecessor() -> Option<Identifier>;
    async fn set_predecessor(id: Option<Identifier>);

    async fn get_successor() -> Option<Identifier>;
    async fn set_successor(id: Identifier);

    async fn closest_preceding_finger(target: Identifier) -> Identifier;
    async fn notify(candidate: Identifier);

    async fn local_put(key: String, value: String);
    async fn local_get(key: String) -> Option<String>;

    async fn display_finger_table() -> Vec<Option<Identifier>>;
    async fn display_data() -> HashMap<String, String>;
    async fn display_backup_successors() -> Vec<Identifier>;
}

/// Adapts an [`Arc<E>`] into the generated `ChordService` dispatch trait.
///
/// `tarpc`'s server macro clones `Self` per request, so this wrapper stays
/// a thin, cheaply-cloneable handle rather than the engine itself.
#[derive(Clone)]
pub struct RpcServer<E> {
    engine: Arc<E>,
}

impl<E> RpcServer<E> {
    pub fn new(engine: Arc<E>) -> Self {
        Self { engine }
    }
}

#[tarpc::server]
impl<E: ChordEngine + 'static> ChordService for RpcServer<E> {
    async fn find_predecessor(self, _: context::Context, target: Identifier) -> WireResult<Identifier> {
        self.engine.find_predecessor(target).await.map_err(|e| e.to_string())
    }

    async fn find_successor(self, _: context::Context, target: Identifier) -> WireResult<Identifier> {
        self.engine.find_successor(target).await.map_err(|e| e.to_string())
    }

    async fn get_predecessor(self, _: context::Context) -> Option<Identifier> {
        self.engine.get_predecessor().await
    }

    async fn set_predecessor(self, _: context::Context, id: Option<Identifier>) {
        self.engine.set_predecessor(id).await
    }

    async fn get_successor(self, _: context::Context) -> Option<Identifier> {
        self.engine.get_successor().await
    }

    async fn set_successor(self, _: context::Context, id: Identifier) {
        self.engine.set_successor(id).await
    }

    async fn closest_preceding_finger(self, _: context::Context, target: Identifier) -> Identifier {
        self.engine.closest_preceding_finger(target).await
    }

    async fn notify(self, _: context::Context, candidate: Identifier) {
        self.engine.notify(candidate).await
    }

    async fn local_put(self, _: context::Context, key: String, value: String) {
        self.engine.local_put(key, value).await
    }

    async fn local_get(self, _: context::Context, key: String) -> Option<String> {
        self.engine.local_get(key).await
    }

    async fn display_finger_table(self, _: context::Context) -> Vec<Option<Identifier>> {
        self.engine.display_finger_table().await
    }

    async fn display_data(self, _: context::Context) -> HashMap<String, String> {
        self.engine.display_data().await
    }

    async fn display_backup_successors(self, _: context::Context) -> Vec<Identifier> {
        self.engine.display_backup_successors().await
    }
}
