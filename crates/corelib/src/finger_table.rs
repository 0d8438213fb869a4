//! The finger table: the per-node index of exponentially spaced successor
//! pointers that gives Chord lookup its `O(log N)` hop count.

use num_bigint::{BigInt, Sign};

use crate::config::Config;
use crate::identifier::{self, Identifier};

/// Entry `i` of a finger table. `start` is fixed at construction time;
/// `node` is refined continuously by `fix_fingers`.
#[derive(Clone, Debug)]
struct FingerEntry {
    start: Identifier,
    node: Option<Identifier>,
}

/// Indexed `1..=m`, never sparse: every entry holds *some* identifier once
/// the table has been seeded (the owner itself, until something better is
/// known).
#[derive(Clone, Debug)]
pub struct FingerTable {
    bits: u32,
    // entries[0] is finger index 1; see `slot`.
    entries: Vec<FingerEntry>,
}

impl FingerTable {
    /// Build the table for `owner`. Every `start_i = owner + 2^(i-1)` is
    /// computed up front; every `node_i` starts unset.
    pub fn new(config: &Config, owner: &Identifier) -> Self {
        let entries = (1..=config.ring_bits)
            .map(|i| {
                let offset = identifier::power_of_two(i - 1);
                FingerEntry {
                    start: identifier::add_signed(config, owner, &BigInt::from_biguint(Sign::Plus, offset)),
                    node: None,
                }
            })
            .collect();
        Self {
            bits: config.ring_bits,
            entries,
        }
    }

    fn slot(&self, i: usize) -> Option<usize> {
        if i < 1 || i > self.bits as usize {
            None
        } else {
            Some(i - 1)
        }
    }

    pub fn get_start(&self, i: usize) -> Option<&Identifier> {
        self.slot(i).map(|s| &self.entries[s].start)
    }

    pub fn get_node(&self, i: usize) -> Option<Identifier> {
        self.slot(i).and_then(|s| self.entries[s].node.clone())
    }

    /// Set `finger[i].node`. Returns `false` if `i` is out of `[1, m]`.
    pub fn set_node(&mut self, i: usize, node: Identifier) -> bool {
        match self.slot(i) {
            Some(s) => {
                self.entries[s].node = Some(node);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Snapshot of every finger's current node, in index order (1..=m).
    pub fn nodes(&self) -> Vec<Option<Identifier>> {
        self.entries.iter().map(|e| e.node.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_out_of_range_index() {
        let config = Config::with_ring_bits(3);
        let mut table = FingerTable::new(&config, &identifier::format(&config, &0u32.into()));
        assert!(table.get_start(0).is_none());
        assert!(table.get_start(4).is_none());
        assert!(!table.set_node(0, identifier::format(&config, &0u32.into())));
        assert!(!table.set_node(4, identifier::format(&config, &0u32.into())));
    }

    #[test]
    fn starts_are_exponentially_spaced() {
        let config = Config::with_ring_bits(3);
        let owner = identifier::format(&config, &0u32.into());
        let table = FingerTable::new(&config, &owner);
        assert_eq!(table.get_start(1).unwrap().as_str(), "1");
        assert_eq!(table.get_start(2).unwrap().as_str(), "2");
        assert_eq!(table.get_start(3).unwrap().as_str(), "4");
    }

    #[test]
    fn builds_without_overflow_at_production_ring_width() {
        // 160 bits: the last finger-start offset is 2^159, far past what
        // an i128 shift could hold.
        let config = Config::production();
        let owner = identifier::format(&config, &0u32.into());
        let table = FingerTable::new(&config, &owner);
        assert_eq!(table.len(), config.ring_bits as usize);
        assert!(table.get_start(config.ring_bits as usize).is_some());
    }

    #[test]
    fn table_is_never_sparse_once_seeded() {
        let config = Config::with_ring_bits(3);
        let owner = identifier::format(&config, &0u32.into());
        let mut table = FingerTable::new(&config, &owner);
        for i in 1..=table.len() {
            table.set_node(i, owner.clone());
        }
        assert!(table.nodes().iter().all(Option::is_some));
    }
}
