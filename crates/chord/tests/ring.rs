//! Multi-node integration tests driving real `Engine`s against an
//! in-process `LoopbackRegistry` instead of real sockets — fast and
//! deterministic, exercising exactly the same `join`/`stabilize`/
//! `fix_fingers`/RPC-failure code paths a real ring would.

use std::sync::Arc;

use chord::Engine;
use corelib::{identifier, Config, Identifier};
use num_bigint::{BigInt, Sign};
use rpc::loopback::LoopbackRegistry;
use rpc::ChordEngine;

fn id(config: &Config, v: u32) -> Identifier {
    identifier::format(config, &v.into())
}

/// Runs `rounds` stabilize+fix_fingers passes over every engine, in
/// order. Errors are ignored here the same way the real scheduler
/// swallows them — a single dead peer must never abort the test's
/// settling process, only slow convergence.
async fn settle(engines: &[Arc<Engine>], rounds: usize) {
    for _ in 0..rounds {
        for engine in engines {
            let _ = engine.stabilize().await;
            let _ = engine.fix_fingers(true).await;
        }
    }
}

fn new_member(config: &Config, registry: &Arc<LoopbackRegistry>, v: u32) -> Arc<Engine> {
    let engine = Engine::new(config.clone(), id(config, v), registry.connector());
    registry.register(engine.clone());
    engine
}

#[tokio::test]
async fn founder_is_a_singleton_ring() {
    let config = Config::with_ring_bits(3);
    let registry = LoopbackRegistry::new(config.clone());
    let engine = new_member(&config, &registry, 0);
    engine.join(None).await.unwrap();

    let table = engine.display_finger_table().await;
    assert_eq!(table[0], None, "founder has no predecessor");
    for finger in &table[1..] {
        assert_eq!(finger.as_ref(), Some(&id(&config, 0)));
    }
    assert_eq!(engine.display_backup_successors().await.len(), config.backup_successors);
}

#[tokio::test]
async fn pair_converges_to_mutual_successor_and_predecessor() {
    let config = Config::with_ring_bits(3);
    let registry = LoopbackRegistry::new(config.clone());

    let n0 = new_member(&config, &registry, 0);
    n0.join(None).await.unwrap();

    let n4 = new_member(&config, &registry, 4);
    n4.join(Some(id(&config, 0))).await.unwrap();

    settle(&[n0.clone(), n4.clone()], 10).await;

    assert_eq!(n0.get_successor().await, Some(id(&config, 4)));
    assert_eq!(n4.get_successor().await, Some(id(&config, 0)));
    assert_eq!(n0.get_predecessor().await, Some(id(&config, 4)));
    assert_eq!(n4.get_predecessor().await, Some(id(&config, 0)));
}

/// P3 + P4: after a join sequence and enough settling rounds, every
/// node's predecessor/successor pair is mutually consistent and every
/// finger entry matches a fresh `find_successor` of its start.
#[tokio::test]
async fn join_sequence_reaches_eventual_consistency() {
    let config = Config::with_ring_bits(3);
    let registry = LoopbackRegistry::new(config.clone());

    let mut engines = Vec::new();
    let founder = new_member(&config, &registry, 0);
    founder.join(None).await.unwrap();
    engines.push(founder);

    for &v in &[3u32, 1, 6] {
        let seed = engines[0].id();
        let joiner = new_member(&config, &registry, v);
        joiner.join(Some(seed)).await.unwrap();
        engines.push(joiner);
        settle(&engines, 10).await;
    }
    settle(&engines, 10).await;

    // P3
    for engine in &engines {
        let pred = engine.get_predecessor().await.expect("predecessor set once stable");
        let pred_engine = engines.iter().find(|e| e.id() == pred).expect("predecessor is a live member");
        assert_eq!(
            pred_engine.get_successor().await,
            Some(engine.id()),
            "successor(predecessor({})) should be {0}",
            engine.id()
        );
    }

    // P4
    for engine in &engines {
        let table = engine.display_finger_table().await;
        for i in 1..=config.ring_bits as usize {
            let offset = identifier::power_of_two((i - 1) as u32);
            let start = identifier::add_signed(&config, &engine.id(), &BigInt::from_biguint(Sign::Plus, offset));
            let expected = engine.find_successor(start).await.unwrap();
            assert_eq!(table[i], Some(expected), "finger {i} on node {}", engine.id());
        }
    }
}

/// Scenario 5: put/get round-trip through whichever node the caller
/// happens to route through, after the 3-node ring `{0, 1, 3}` is up.
#[tokio::test]
async fn put_get_round_trips_through_the_owning_node() {
    let config = Config::with_ring_bits(3);
    let registry = LoopbackRegistry::new(config.clone());

    let n0 = new_member(&config, &registry, 0);
    n0.join(None).await.unwrap();
    let n1 = new_member(&config, &registry, 1);
    n1.join(Some(id(&config, 0))).await.unwrap();
    let n3 = new_member(&config, &registry, 3);
    n3.join(Some(id(&config, 0))).await.unwrap();

    let engines = vec![n0.clone(), n1.clone(), n3.clone()];
    settle(&engines, 10).await;

    let key_hash = identifier::hash(&config, "hello");
    let owner_id = n0.find_successor(key_hash).await.unwrap();
    let owner = engines.iter().find(|e| e.id() == owner_id).unwrap();
    owner.local_put("hello".to_string(), "world".to_string()).await;

    for engine in &engines {
        let target_id = engine.find_successor(key_hash).await.unwrap();
        let target = engines.iter().find(|e| e.id() == target_id).unwrap();
        assert_eq!(target.local_get("hello".to_string()).await, Some("world".to_string()));
    }
}

/// Scenario 6: kill the successor of a node in a stable 4-node ring and
/// confirm the ring repairs itself within a bounded number of rounds —
/// the dead id disappears from every live node's finger table and the
/// victim's successor becomes a former backup.
#[tokio::test]
async fn failure_drill_heals_around_a_dead_node() {
    let config = Config::with_ring_bits(3);
    let registry = LoopbackRegistry::new(config.clone());

    let mut engines = Vec::new();
    let founder = new_member(&config, &registry, 0);
    founder.join(None).await.unwrap();
    engines.push(founder);
    for &v in &[3u32, 1, 6] {
        let seed = engines[0].id();
        let joiner = new_member(&config, &registry, v);
        joiner.join(Some(seed)).await.unwrap();
        engines.push(joiner);
        settle(&engines, 10).await;
    }
    settle(&engines, 10).await;

    let victim = engines.iter().find(|e| e.id() == id(&config, 0)).unwrap().clone();
    let dead_id = victim.get_successor().await.expect("stable ring has a successor");
    let former_backups = victim.display_backup_successors().await;

    registry.kill(&dead_id);
    let survivors: Vec<Arc<Engine>> = engines.iter().filter(|e| e.id() != dead_id).cloned().collect();

    settle(&survivors, 10).await;

    assert_ne!(victim.get_successor().await, Some(dead_id.clone()));
    assert!(
        former_backups.contains(&victim.get_successor().await.unwrap()),
        "victim should have failed over to one of its former backups"
    );

    for engine in &survivors {
        let table = engine.display_finger_table().await;
        assert!(
            !table.iter().any(|entry| entry.as_ref() == Some(&dead_id)),
            "node {} still references dead node {dead_id} in its finger table",
            engine.id()
        );
        assert_ne!(engine.get_predecessor().await, Some(dead_id.clone()));
    }
}
