//! Pure local node state: the finger table, predecessor pointer, backup
//! successor list, and key-value store, plus the handful of operations
//! that never need to leave this node to answer.
//!
//! Everything that requires asking another node a question — the
//! recursive lookup, stabilization, finger-fixing, backup-successor
//! repair — lives one layer up, where a `Node` is wrapped with an RPC
//! client. This split keeps ring arithmetic and local bookkeeping
//! testable without a network in the loop.

use std::collections::HashMap;

use crate::config::Config;
use crate::finger_table::FingerTable;
use crate::identifier::{self, Identifier};

#[derive(Clone, Debug)]
pub struct Node {
    id: Identifier,
    predecessor: Option<Identifier>,
    table: FingerTable,
    backup_successors: Vec<Identifier>,
    data: HashMap<String, String>,
}

impl Node {
    pub fn new(config: &Config, id: Identifier) -> Self {
        Self {
            table: FingerTable::new(config, &id),
            id,
            predecessor: None,
            backup_successors: Vec::new(),
            data: HashMap::new(),
        }
    }

    pub fn id(&self) -> &Identifier {
        &self.id
    }

    /// Seed this node as the sole member of a brand-new ring: every
    /// finger and every backup successor points at itself.
    pub fn init_as_founder(&mut self, config: &Config) {
        self.predecessor = None;
        for i in 1..=config.ring_bits as usize {
            self.table.set_node(i, self.id.clone());
        }
        self.backup_successors = vec![self.id.clone(); config.backup_successors];
    }

    pub fn get_predecessor(&self) -> Option<Identifier> {
        self.predecessor.clone()
    }

    pub fn set_predecessor(&mut self, id: Option<Identifier>) {
        self.predecessor = id;
    }

    /// finger[1].node is the successor by definition.
    pub fn get_successor(&self) -> Option<Identifier> {
        self.table.get_node(1)
    }

    pub fn set_successor(&mut self, id: Identifier) {
        self.table.set_node(1, id);
    }

    pub fn finger_table(&self) -> &FingerTable {
        &self.table
    }

    pub fn finger_start(&self, i: usize) -> Option<&Identifier> {
        self.table.get_start(i)
    }

    pub fn set_finger(&mut self, i: usize, node: Identifier) -> bool {
        self.table.set_node(i, node)
    }

    pub fn backup_successors(&self) -> &[Identifier] {
        &self.backup_successors
    }

    pub fn set_backup_successors(&mut self, backups: Vec<Identifier>) {
        self.backup_successors = backups;
    }

    /// Swap every finger table entry (including the successor slot) that
    /// currently points at `dead` for `replacement`.
    pub fn replace_dead_in_fingers(&mut self, config: &Config, dead: &Identifier, replacement: &Identifier) {
        for i in 1..=config.ring_bits as usize {
            if self.table.get_node(i).as_ref() == Some(dead) {
                self.table.set_node(i, replacement.clone());
            }
        }
    }

    /// Scan the finger table from `m` down to `1` for the closest known
    /// node strictly between this node and `target`. Falls back to this
    /// node itself when nothing qualifies — the recursion in the caller
    /// relies on that as its base case.
    pub fn closest_preceding_finger(&self, config: &Config, target: &Identifier) -> Identifier {
        for i in (1..=config.ring_bits as usize).rev() {
            if let Some(finger) = self.table.get_node(i) {
                if identifier::in_range_ee(config, Some(&finger), Some(&self.id), Some(target)) {
                    return finger;
                }
            }
        }
        self.id.clone()
    }

    /// `remote_node` believes it might be our predecessor. Accept it only
    /// if we have none yet, or it is a tighter fit than what we have.
    pub fn notify(&mut self, config: &Config, candidate: Identifier) {
        let accept = match &self.predecessor {
            None => true,
            Some(current) => {
                identifier::in_range_ee(config, Some(&candidate), Some(current), Some(&self.id))
            }
        };
        if accept {
            self.predecessor = Some(candidate);
        }
    }

    pub fn local_put(&mut self, key: String, value: String) {
        self.data.insert(key, value);
    }

    pub fn local_get(&self, key: &str) -> Option<String> {
        self.data.get(key).cloned()
    }

    pub fn display_data(&self) -> &HashMap<String, String> {
        &self.data
    }

    /// `[predecessor, finger[1], finger[2], ..., finger[m]]`, matching the
    /// layout the admin surface prints.
    pub fn display_finger_table(&self) -> Vec<Option<Identifier>> {
        let mut result = vec![self.predecessor.clone()];
        result.extend(self.table.nodes());
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(config: &Config, v: u32) -> Identifier {
        identifier::format(config, &v.into())
    }

    #[test]
    fn founder_points_every_finger_at_itself() {
        let config = Config::with_ring_bits(3);
        let mut node = Node::new(&config, id(&config, 0));
        node.init_as_founder(&config);
        assert_eq!(node.get_successor(), Some(id(&config, 0)));
        assert!(node.get_predecessor().is_none());
        assert_eq!(node.backup_successors().len(), config.backup_successors);
        assert!(node.backup_successors().iter().all(|b| b == &id(&config, 0)));
    }

    #[test]
    fn closest_preceding_finger_falls_back_to_self() {
        let config = Config::with_ring_bits(3);
        let node = Node::new(&config, id(&config, 0));
        // no fingers populated, every in_range_ee check fails
        assert_eq!(node.closest_preceding_finger(&config, &id(&config, 5)), id(&config, 0));
    }

    #[test]
    fn closest_preceding_finger_picks_highest_qualifying_finger() {
        let config = Config::with_ring_bits(3);
        let mut node = Node::new(&config, id(&config, 0));
        node.set_finger(1, id(&config, 1));
        node.set_finger(2, id(&config, 2));
        node.set_finger(3, id(&config, 4));
        assert_eq!(node.closest_preceding_finger(&config, &id(&config, 6)), id(&config, 4));
        assert_eq!(node.closest_preceding_finger(&config, &id(&config, 2)), id(&config, 1));
    }

    #[test]
    fn notify_accepts_first_predecessor_unconditionally() {
        let config = Config::with_ring_bits(3);
        let mut node = Node::new(&config, id(&config, 0));
        node.notify(&config, id(&config, 5));
        assert_eq!(node.get_predecessor(), Some(id(&config, 5)));
    }

    #[test]
    fn notify_rejects_worse_candidate() {
        let config = Config::with_ring_bits(3);
        let mut node = Node::new(&config, id(&config, 0));
        node.notify(&config, id(&config, 6));
        node.notify(&config, id(&config, 2)); // not in (6, 0)
        assert_eq!(node.get_predecessor(), Some(id(&config, 6)));
    }

    #[test]
    fn notify_accepts_tighter_candidate() {
        let config = Config::with_ring_bits(3);
        let mut node = Node::new(&config, id(&config, 0));
        node.notify(&config, id(&config, 2));
        node.notify(&config, id(&config, 6)); // in (2, 0) wrapping
        assert_eq!(node.get_predecessor(), Some(id(&config, 6)));
    }

    #[test]
    fn replace_dead_in_fingers_swaps_every_matching_slot() {
        let config = Config::with_ring_bits(3);
        let mut node = Node::new(&config, id(&config, 0));
        node.init_as_founder(&config);
        let dead = id(&config, 0);
        let replacement = id(&config, 3);
        node.replace_dead_in_fingers(&config, &dead, &replacement);
        for i in 1..=config.ring_bits as usize {
            assert_eq!(node.finger_table().get_node(i), Some(replacement.clone()));
        }
    }

    #[test]
    fn local_put_get_roundtrips() {
        let config = Config::with_ring_bits(3);
        let mut node = Node::new(&config, id(&config, 0));
        assert!(node.local_get("k").is_none());
        node.local_put("k".to_string(), "v".to_string());
        assert_eq!(node.local_get("k"), Some("v".to_string()));
    }
}
