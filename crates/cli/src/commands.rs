//! Subcommands. `serve` launches a node process per the protocol's
//! invocation model (`SELF_ID`, optional seed); the rest are a thin
//! admin client exercising the very same RPC surface a peer uses to talk
//! to another peer — there is no separate "admin protocol".

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Subcommand;
use corelib::{identifier, Config, Identifier};
use rpc::{ChordPeer, Connector, TcpConnector};
use tokio::sync::watch;

use chord::{scheduler, Engine};

pub type CommandResult = anyhow::Result<()>;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Launch a node: founds a new ring if no seed is given, otherwise
    /// joins the ring through `seed`.
    Serve {
        /// This node's own identifier.
        self_id: String,
        /// An existing ring member's identifier. Absent means "found a
        /// new ring".
        seed: Option<String>,
        /// Listen address; defaults to `0.0.0.0:<rpc_port>`.
        #[arg(long)]
        bind: Option<SocketAddr>,
    },
    /// Store a value at the node owning `hash(key)`.
    Put { node: String, key: String, value: String },
    /// Fetch a value from the node owning `hash(key)`.
    Get { node: String, key: String },
    /// Print `[predecessor, finger[1], ..., finger[m]]` for `node`.
    Fingers { node: String },
    /// Print `node`'s local key/value store.
    Data { node: String },
    /// Print `node`'s backup-successor list.
    Backups { node: String },
}

pub async fn execute(command: Command, ring_bits: u32) -> CommandResult {
    let config = Config::with_ring_bits(ring_bits);
    match command {
        Command::Serve { self_id, seed, bind } => serve(config, self_id, seed, bind).await,
        Command::Put { node, key, value } => put(config, node, key, value).await,
        Command::Get { node, key } => get(config, node, key).await,
        Command::Fingers { node } => fingers(config, node).await,
        Command::Data { node } => data(config, node).await,
        Command::Backups { node } => backups(config, node).await,
    }
}

async fn serve(config: Config, self_id: String, seed: Option<String>, bind: Option<SocketAddr>) -> CommandResult {
    let id = Identifier::parse(&config, &self_id)?;
    let seed = seed.map(|s| Identifier::parse(&config, &s)).transpose()?;

    let connector: Arc<dyn Connector> = Arc::new(TcpConnector);
    let engine = Engine::new(config.clone(), id.clone(), connector);

    engine.join(seed).await?;

    let bind_addr = bind.unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], config.rpc_port)));
    let (server_shutdown_tx, server_shutdown_rx) = watch::channel(false);
    let (loop_shutdown_tx, loop_shutdown_rx) = watch::channel(false);

    let server_engine = engine.clone();
    let server = tokio::spawn(async move {
        if let Err(err) = rpc::server::serve(server_engine, bind_addr, server_shutdown_rx).await {
            tracing::error!(%err, "rpc server stopped");
        }
    });

    let maintenance_engine = engine.clone();
    let maintenance = tokio::spawn(scheduler::run(maintenance_engine, loop_shutdown_rx));

    tracing::info!(id = %id, %bind_addr, "node is up");
    tokio::signal::ctrl_c().await?;
    tracing::info!(id = %id, "received ctrl-c, shutting down");

    let _ = server_shutdown_tx.send(true);
    let _ = loop_shutdown_tx.send(true);
    let _ = server.await;
    let _ = maintenance.await;
    Ok(())
}

/// Connects to `node` and, if the key hashes to a different node, hops
/// once more to the owner — mirroring the application-layer routing the
/// protocol leaves to the caller (§4.8).
async fn route_to_owner(config: &Config, node: &Identifier, key: &str) -> anyhow::Result<Arc<dyn ChordPeer>> {
    let connector = TcpConnector;
    let entry_addr = identifier::net_address(config, node);
    let entry = connector.connect(&entry_addr).await?;

    let target_hash = identifier::hash(config, key);
    let owner = entry.find_successor(target_hash).await?;
    if &owner == node {
        return Ok(entry);
    }
    let owner_addr = identifier::net_address(config, &owner);
    Ok(connector.connect(&owner_addr).await?)
}

async fn put(config: Config, node: String, key: String, value: String) -> CommandResult {
    let node_id = Identifier::parse(&config, &node)?;
    let owner = route_to_owner(&config, &node_id, &key).await?;
    owner.local_put(key, value).await?;
    Ok(())
}

async fn get(config: Config, node: String, key: String) -> CommandResult {
    let node_id = Identifier::parse(&config, &node)?;
    let owner = route_to_owner(&config, &node_id, &key).await?;
    match owner.local_get(key).await? {
        Some(value) => println!("{value}"),
        None => println!("(nil)"),
    }
    Ok(())
}

async fn connect(config: &Config, node: &str) -> anyhow::Result<Arc<dyn ChordPeer>> {
    let node_id = Identifier::parse(config, node)?;
    let addr = identifier::net_address(config, &node_id);
    Ok(TcpConnector.connect(&addr).await?)
}

async fn fingers(config: Config, node: String) -> CommandResult {
    let peer = connect(&config, &node).await?;
    let table = peer.display_finger_table().await?;
    println!("predecessor: {}", fmt_opt(&table[0]));
    for (i, finger) in table[1..].iter().enumerate() {
        println!("finger[{}]: {}", i + 1, fmt_opt(finger));
    }
    Ok(())
}

async fn data(config: Config, node: String) -> CommandResult {
    let peer = connect(&config, &node).await?;
    let mut entries: Vec<_> = peer.display_data().await?.into_iter().collect();
    entries.sort();
    for (key, value) in entries {
        println!("{key} = {value}");
    }
    Ok(())
}

async fn backups(config: Config, node: String) -> CommandResult {
    let peer = connect(&config, &node).await?;
    for (i, backup) in peer.display_backup_successors().await?.into_iter().enumerate() {
        println!("backup[{i}]: {backup}");
    }
    Ok(())
}

fn fmt_opt(id: &Option<Identifier>) -> String {
    match id {
        Some(id) => id.to_string(),
        None => "(none)".to_string(),
    }
}
