//! `confnode` command line.
//!
//! ```text
//! confnode dump  <file>         print the file as JSON
//! confnode get   <file> <path>  print the value at `path`, e.g. `servers[0].host`
//! confnode watch <file>         print the file again on every change
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};

use confnode::loader::{self, ConfigurationLoader};
use confnode::observability::logging;
use confnode::reference::{ConfigurationReference, ReferenceError};
use confnode::{ConfigNode, NodePath, WatchService};

#[derive(Debug, Parser)]
#[command(name = "confnode", version, about = "Inspect and watch configuration files")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the whole file as JSON
    Dump { file: PathBuf },
    /// Print the value at a path
    Get { file: PathBuf, path: String },
    /// Print the file each time it changes, until interrupted
    Watch { file: PathBuf },
}

fn loader_for(file: &Path) -> Arc<dyn ConfigurationLoader> {
    match file.extension().and_then(|ext| ext.to_str()) {
        Some("json") => Arc::new(loader::json(file)),
        _ => Arc::new(loader::toml(file)),
    }
}

fn print_node(node: &ConfigNode) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(node)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init(logging::DEFAULT_FILTER);
    let cli = Cli::parse();

    match cli.command {
        Command::Dump { file } => {
            let node = loader_for(&file).load()?;
            print_node(&node)?;
        }
        Command::Get { file, path } => {
            let parsed = NodePath::parse(&path).ok_or_else(|| format!("invalid path `{path}`"))?;
            let node = loader_for(&file).load()?;
            match node.child(&parsed).filter(|n| !n.is_virtual()) {
                Some(value) => print_node(value)?,
                None => return Err(format!("no value at `{path}`").into()),
            }
        }
        Command::Watch { file } => {
            let watcher = WatchService::new()?;
            let reference = ConfigurationReference::watching(loader_for(&file), &file, &watcher)?;
            let _errors = reference.errors().subscribe(|e: &ReferenceError| {
                tracing::warn!(phase = %e.phase, error = %e.error, "Reload failed");
            });
            let root = reference.reference_to::<ConfigNode>(NodePath::root())?;
            let _changes = root.subscribe(|node: &Option<ConfigNode>| {
                if let Some(node) = node {
                    if let Err(e) = print_node(node) {
                        tracing::error!(error = %e, "Failed to print configuration");
                    }
                }
            });
            print_node(&reference.snapshot())?;
            tracing::info!(path = %file.display(), "Watching for changes, press Ctrl-C to stop");

            tokio::signal::ctrl_c().await?;
            reference.close();
            watcher.close();
        }
    }
    Ok(())
}
