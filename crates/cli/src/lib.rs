//! The `chordctl` binary: launch a Chord node, or poke one that's
//! already running.
//!
//! `serve` implements the protocol's two-positional-argument invocation
//! model (`SELF_ID`, optional seed); `put`/`get`/`fingers`/`data`/
//! `backups` are a thin admin client over the same RPC surface a peer
//! uses to talk to another peer.

pub mod commands;
pub mod config;

pub use commands::{Command, CommandResult};
pub use config::CliConfig;
