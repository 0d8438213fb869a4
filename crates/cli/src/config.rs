//! Top-level argument parsing: the bit-width flag every subcommand
//! shares, plus the subcommand enum itself.

use clap::Parser;

use crate::commands::Command;

#[derive(Parser, Debug)]
#[command(name = "chordctl", version, about = "Run or query a Chord DHT node")]
pub struct CliConfig {
    /// Bit-width of the identifier ring (m). Defaults to the SHA-1-wide
    /// production configuration; narrow it to talk to a local test ring.
    #[arg(long, global = true, default_value_t = corelib::config::SHA1_RING_BITS)]
    pub ring_bits: u32,

    #[command(subcommand)]
    pub command: Command,
}

impl CliConfig {
    pub fn run(self) -> anyhow::Result<()> {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .init();

        let runtime = tokio::runtime::Runtime::new()?;
        runtime.block_on(crate::commands::execute(self.command, self.ring_bits))
    }
}
