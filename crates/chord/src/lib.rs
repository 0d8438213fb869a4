//! The live Chord node: join/bootstrap, the recursive lookup engine,
//! periodic maintenance, and the scheduler driving it — everything that
//! sits between `corelib`'s pure ring arithmetic and the `rpc` façade.

pub mod engine;
pub mod join;
pub mod maintenance;
pub mod scheduler;

pub use engine::Engine;
