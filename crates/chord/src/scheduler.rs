//! The periodic maintenance worker: stabilize, then `fix_fingers(true)`,
//! then a randomised sleep, repeated until told to stop.
//!
//! Driven by one `tokio::sync::watch<bool>`, the same shutdown primitive
//! `rpc::server::serve` is stopped with — one mechanism for the whole
//! process rather than two unrelated ones.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use rpc::ChordEngine;
use tokio::sync::watch;
use tokio::time::sleep;

use crate::engine::Engine;

/// Runs until `shutdown` reports `true`. A round's error is logged and
/// swallowed — per the protocol's error-handling design, one
/// unreachable peer must never bring the maintenance loop down.
pub async fn run(engine: Arc<Engine>, mut shutdown: watch::Receiver<bool>) {
    loop {
        if let Err(err) = engine.stabilize().await {
            tracing::warn!(id = %engine.id(), %err, "stabilize round failed");
        }
        if let Err(err) = engine.fix_fingers(true).await {
            tracing::warn!(id = %engine.id(), %err, "fix_fingers round failed");
        }

        let interval = random_interval(engine.config());
        tokio::select! {
            _ = sleep(interval) => {}
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    break;
                }
            }
        }
    }
}

fn random_interval(config: &corelib::Config) -> Duration {
    let lo = config.stabilize_interval.start().as_millis() as u64;
    let hi = config.stabilize_interval.end().as_millis() as u64;
    if hi <= lo {
        return *config.stabilize_interval.start();
    }
    Duration::from_millis(rand::thread_rng().gen_range(lo..=hi))
}
