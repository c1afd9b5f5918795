use std::path::Path;

use anyhow::Context;
use colored::Colorize;
use seeder_node::Node;
use seeder_server::{SeederServer, ServerConfig};
use seeder_store::Bucket;
use seeder_types::{TaskKey, TaskType};

use crate::cli::*;

/// Bytes of chunk data shown by `inspect chunk`.
const PREVIEW_BYTES: usize = 32;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(&cli.config)?;
    match cli.command {
        Command::Serve(args) => cmd_serve(config, args),
        Command::Config(args) => cmd_config(config, args, &cli.format),
        Command::Inspect(args) => block_on(cmd_inspect(config, args, &cli.format)),
    }
}

fn load_config(path: &Path) -> anyhow::Result<ServerConfig> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "no config file, using defaults");
        return Ok(ServerConfig::default());
    }
    ServerConfig::load(path).with_context(|| format!("loading {}", path.display()))
}

fn block_on<F: std::future::Future<Output = anyhow::Result<()>>>(f: F) -> anyhow::Result<()> {
    tokio::runtime::Runtime::new()
        .context("starting async runtime")?
        .block_on(f)
}

fn cmd_serve(mut config: ServerConfig, args: ServeArgs) -> anyhow::Result<()> {
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    println!(
        "{} seeder on {} (store: {:?}, gateway: {})",
        "▶".green().bold(),
        config.bind_addr.to_string().bold(),
        config.store.backend,
        config.node.gateway.cyan()
    );
    block_on(async move {
        SeederServer::new(config).serve().await?;
        Ok(())
    })
}

fn cmd_config(config: ServerConfig, args: ConfigArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let config = if args.default { ServerConfig::default() } else { config };
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&config)?),
        OutputFormat::Text => print!("{}", config.to_toml_string()?),
    }
    Ok(())
}

async fn cmd_inspect(config: ServerConfig, args: InspectArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let node = SeederServer::new(config).build_node().await?;
    let result = inspect(&node, args.target, format).await;
    node.store().close().await?;
    result
}

async fn inspect(node: &Node, target: InspectTarget, format: &OutputFormat) -> anyhow::Result<()> {
    match target {
        InspectTarget::Summary => {
            let end = node.chunks().ledger().data_end_offset().await?;
            let mut counts = Vec::with_capacity(Bucket::ALL.len());
            for bucket in Bucket::ALL {
                counts.push((bucket.name(), node.store().get_all_keys(bucket).await?.len()));
            }
            match format {
                OutputFormat::Json => {
                    let counts: serde_json::Map<String, serde_json::Value> =
                        counts.into_iter().map(|(b, n)| (b.to_string(), n.into())).collect();
                    let out = serde_json::json!({ "data_end_offset": end, "buckets": counts });
                    println!("{}", serde_json::to_string_pretty(&out)?);
                }
                OutputFormat::Text => {
                    println!("Store: {}", node.store().kind().bold());
                    println!("Data end offset: {}", end.to_string().yellow());
                    for (bucket, n) in counts {
                        println!("  {:<20} {}", bucket, n);
                    }
                }
            }
        }
        InspectTarget::Tx { id } => {
            let meta = node.get_tx(&id).await?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&meta)?),
                OutputFormat::Text => {
                    println!("Transaction {}", meta.id.yellow().bold());
                    println!("  Size: {} bytes", meta.data_size);
                    println!("  Data root: {}", meta.data_root.cyan());
                    for tag in &meta.tags {
                        println!("  {}: {}", tag.name.bold(), tag.value);
                    }
                    match node.get_tx_offset(&id).await {
                        Ok(offset) => println!("  Offset: {} (last byte)", offset.offset),
                        Err(e) if e.is_not_found() => println!("  Offset: {}", "none".dimmed()),
                        Err(e) => return Err(e.into()),
                    }
                }
            }
        }
        InspectTarget::Task { task_type, id } => {
            let task_type: TaskType = task_type.parse()?;
            let task = node.task_status(&TaskKey::new(id, task_type)).await?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&task)?),
                OutputFormat::Text => {
                    let state = format!("{:?}", task.state);
                    let state = if task.is_closed() { state.green() } else { state.yellow() };
                    println!("Task {} {}", task.key.to_string().bold(), state);
                    println!(
                        "  Peers: {} succeeded, {} failed of {}",
                        task.succeeded.to_string().green(),
                        task.failed.to_string().red(),
                        task.total_peers
                    );
                    println!("  Created: {}", task.created_at.to_rfc3339());
                    if let Some(closed) = task.closed_at {
                        println!("  Closed: {}", closed.to_rfc3339());
                    }
                }
            }
        }
        InspectTarget::Chunk { offset } => {
            let chunk = node.get_chunk(offset).await?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&chunk)?),
                OutputFormat::Text => {
                    let preview = &chunk.chunk[..chunk.chunk.len().min(PREVIEW_BYTES)];
                    println!("Chunk at {}", offset.to_string().yellow().bold());
                    println!("  Data root: {}", chunk.data_root.cyan());
                    println!("  Payload size: {}", chunk.data_size);
                    println!("  Relative end: {}", chunk.offset);
                    println!("  Length: {} bytes, proof {} bytes", chunk.chunk.len(), chunk.data_path.len());
                    println!("  Head: {}", hex::encode(preview).dimmed());
                }
            }
        }
        InspectTarget::Pending => {
            let keys = node.store().get_all_keys(Bucket::PendingPool).await?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&keys)?),
                OutputFormat::Text if keys.is_empty() => println!("No pending tasks."),
                OutputFormat::Text => {
                    for key in keys {
                        println!("  {}", key.yellow());
                    }
                }
            }
        }
    }
    Ok(())
}
