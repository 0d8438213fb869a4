//! Periodic maintenance: `stabilize`, `fix_fingers`, and the
//! fault-tolerance primitives neither the paper nor the distilled spec's
//! §4.3/4.4 need but every real deployment does — the backup-successor
//! list, `_remove_dead`, and `_get_alive_backup_successor`.
//!
//! None of this recurses into itself; every method here is one
//! maintenance round's worth of work, called by `chord::scheduler`.

use corelib::{identifier, Identifier};
use rpc::{ChordEngine, RpcError, RpcResult};

use crate::engine::Engine;

impl Engine {
    /// One stabilize round: predecessor liveness, successor recovery,
    /// successor refinement, notify, backup-list refresh — in that
    /// order, matching §4.5.
    pub async fn stabilize(&self) -> RpcResult<()> {
        self.check_predecessor_liveness().await;

        let (x, _succ) = self.recover_successor().await?;

        if let Some(x) = x {
            // Swallow connection errors here: an unreachable x just means
            // no update this round, not a reason to fail the whole round.
            if self.remote.get_successor(&x).await.is_ok() {
                let succ = self.successor_snapshot();
                if identifier::in_range_ee(&self.config, Some(&x), Some(&self.id()), succ.as_ref()) {
                    self.node.lock().set_successor(x);
                }
            }
        }

        let succ = self
            .successor_snapshot()
            .expect("recover_successor leaves a successor set");
        let _ = self.remote.notify(&succ, self.id()).await;

        self.refresh_backup_successors().await;
        Ok(())
    }

    /// If we have a predecessor, probe it; on connection error, fail over
    /// to the first alive backup successor rather than leave a dead
    /// predecessor pointer in place.
    async fn check_predecessor_liveness(&self) {
        let Some(predecessor) = self.node.lock().get_predecessor() else {
            return;
        };
        if self.remote.get_successor(&predecessor).await.is_err() {
            match self.get_alive_backup_successor().await {
                Ok(backup) => {
                    tracing::debug!(
                        id = %self.id(),
                        dead = %predecessor,
                        replacement = %backup,
                        "predecessor unreachable, failing over to backup"
                    );
                    self.node.lock().set_predecessor(Some(backup));
                }
                Err(err) => {
                    tracing::warn!(id = %self.id(), %err, "predecessor unreachable and no backup alive");
                }
            }
        }
    }

    /// Retry `get_predecessor(successor())` until one probe succeeds,
    /// declaring the current successor dead and repairing the finger
    /// table on every connection error along the way (§4.5 step 2).
    async fn recover_successor(&self) -> RpcResult<(Option<Identifier>, Identifier)> {
        loop {
            let succ = self.successor_snapshot().ok_or_else(|| RpcError::Protocol {
                peer: self.id().to_string(),
                message: "successor is unset".to_string(),
            })?;
            match self.remote.get_predecessor(&succ).await {
                Ok(x) => return Ok((x, succ)),
                Err(_) => self.remove_dead(&succ).await?,
            }
        }
    }

    /// fix_fingers(loop): refresh every entry if `loop_all`; otherwise a
    /// single uniformly-random index, per §4.7.
    pub async fn fix_fingers(&self, loop_all: bool) -> RpcResult<()> {
        let bits = self.config.ring_bits as usize;
        if loop_all {
            for i in 1..=bits {
                self.fix_one_finger(i).await?;
            }
        } else {
            use rand::Rng;
            let i = rand::thread_rng().gen_range(1..=bits);
            self.fix_one_finger(i).await?;
        }
        Ok(())
    }

    async fn fix_one_finger(&self, i: usize) -> RpcResult<()> {
        let start = self
            .node
            .lock()
            .finger_start(i)
            .cloned()
            .ok_or_else(|| RpcError::Protocol {
                peer: self.id().to_string(),
                message: format!("finger index {i} out of range"),
            })?;
        let succ = self.find_successor(start).await?;
        let resolved = match self.remote.get_successor(&succ).await {
            Ok(_) => succ,
            Err(_) => self.get_alive_backup_successor().await?,
        };
        self.node.lock().set_finger(i, resolved);
        Ok(())
    }

    /// Walk `k` steps past the current successor, refreshing each backup
    /// slot in turn. A connection error on any step is silently skipped —
    /// that slot is retried, from the same unadvanced cursor, next round.
    pub async fn refresh_backup_successors(&self) {
        let mut backups = self.node.lock().backup_successors().to_vec();
        let Some(mut cursor) = self.successor_snapshot() else {
            return;
        };
        for slot in backups.iter_mut().take(self.config.backup_successors) {
            let candidate = identifier::add(&self.config, &cursor, 1);
            match self.find_successor(candidate).await {
                Ok(next) if self.remote.get_successor(&next).await.is_ok() => {
                    cursor = next.clone();
                    *slot = next;
                }
                _ => continue,
            }
        }
        self.node.lock().set_backup_successors(backups);
    }

    /// Scan the backup list in order for the first node that responds.
    /// No alive backup at all is the one genuinely fatal condition in
    /// this protocol: the node is partitioned from the ring and can only
    /// be repaired by a future `notify` from a live peer (§7).
    pub async fn get_alive_backup_successor(&self) -> RpcResult<Identifier> {
        let backups = self.node.lock().backup_successors().to_vec();
        for backup in backups {
            if self.remote.get_successor(&backup).await.is_ok() {
                return Ok(backup);
            }
        }
        Err(RpcError::Unreachable(format!(
            "{}: no backup successor alive",
            self.id()
        )))
    }

    /// `dead` failed to respond to a probe: replace every finger entry
    /// (the successor slot included) that points at it with a live
    /// backup successor.
    pub async fn remove_dead(&self, dead: &Identifier) -> RpcResult<()> {
        let backup = self.get_alive_backup_successor().await?;
        self.node.lock().replace_dead_in_fingers(&self.config, dead, &backup);
        Ok(())
    }
}
