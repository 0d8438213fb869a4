//! Join / bootstrap: the one-time protocol a node runs before the
//! maintenance loop starts. Founding a ring and joining one through a
//! seed are different enough that the source keeps them as one branching
//! method; this does the same rather than splitting into two entry
//! points nothing else would call independently.

use corelib::{identifier, Identifier};
use rpc::{ChordEngine, RpcResult};

use crate::engine::Engine;

impl Engine {
    /// `seed = None`: found a brand-new ring — every finger and backup
    /// successor points at this node, predecessor stays nil.
    ///
    /// `seed = Some(id)`: ask `id` to resolve our own successor, then
    /// seed the backup-successor list by walking `k` steps past it. No
    /// bulk finger-table initialisation happens here — `fix_fingers`
    /// refines every entry over time, the self-stabilising variant's
    /// whole point.
    pub async fn join(&self, seed: Option<Identifier>) -> RpcResult<()> {
        match seed {
            None => {
                tracing::info!(id = %self.id(), "founding a new ring");
                self.node.lock().init_as_founder(&self.config);
                Ok(())
            }
            Some(seed) => {
                tracing::info!(id = %self.id(), %seed, "joining ring via seed");
                self.node.lock().set_predecessor(None);

                let succ = self.remote.find_successor(&seed, self.id()).await?;
                self.node.lock().set_successor(succ.clone());

                // Bootstraps the founder out of its degenerate self-loop:
                // a brand-new ring's only node reports itself as its own
                // successor until someone tells it otherwise. Stabilize
                // rounds on both sides self-correct everything else.
                if self.remote.get_successor(&seed).await?.as_ref() == Some(&seed) {
                    self.remote.set_successor(&seed, self.id()).await?;
                }

                let mut backups = Vec::with_capacity(self.config.backup_successors);
                let mut cursor = succ;
                for _ in 0..self.config.backup_successors {
                    cursor = self.find_successor(identifier::add(&self.config, &cursor, 1)).await?;
                    backups.push(cursor.clone());
                }
                self.node.lock().set_backup_successors(backups);
                Ok(())
            }
        }
    }
}
