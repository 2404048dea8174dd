//! `p2p-fetch` command line
//!
//! `get` retrieves content by ID through a fresh embedded node. `serve`
//! adds a file and keeps the node up so other peers can fetch it.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use p2p_fetch::client::{self, Client, ClientOption};
use p2p_fetch::content;

#[derive(Parser, Debug)]
#[command(name = "p2p-fetch", version, about = "Fetch content over an embedded p2p node")]
struct Args {
    /// Directory with a plugins/ subdirectory of plugin manifests
    #[arg(long, global = true)]
    plugin_dir: Option<PathBuf>,

    /// Datastore kind for the repository, built in or from a plugin manifest
    #[arg(long, global = true)]
    datastore: Option<String>,

    /// Bootstrap peer address ending in /p2p/<peer-id> (repeatable)
    #[arg(long = "bootstrap", global = true)]
    bootstrap: Vec<String>,

    /// Skip the public bootstrap peers
    #[arg(long, global = true)]
    no_default_bootstrap: bool,

    /// Swarm listen address (repeatable)
    #[arg(long = "listen", global = true)]
    listen: Vec<String>,

    /// Verbose logging (-v for debug, -vv for trace)
    #[arg(long, short, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Retrieve content and write it to stdout or a file
    Get {
        cid: String,
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Add a file and serve it until interrupted
    Serve { file: PathBuf },
}

impl Args {
    fn client_options(&self) -> Vec<ClientOption> {
        let mut options = Vec::new();
        if let Some(dir) = &self.plugin_dir {
            options.push(client::with_plugin_dir(dir.clone()));
        }
        if let Some(kind) = &self.datastore {
            options.push(client::with_datastore(kind.clone()));
        }

        let mut peers: Vec<String> = if self.no_default_bootstrap {
            Vec::new()
        } else {
            client::DEFAULT_BOOTSTRAP_PEERS.iter().map(|s| s.to_string()).collect()
        };
        peers.extend(self.bootstrap.iter().cloned());
        options.push(client::with_bootstrap_peers(peers));

        if !self.listen.is_empty() {
            options.push(client::with_listen_addrs(self.listen.clone()));
        }
        options
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let cancel = CancellationToken::new();
    let client = Client::new(args.client_options());

    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Interrupted, shutting down");
                cancel.cancel();
            }
        });
    }

    let result = run(&client, &cancel, args.command).await;

    cancel.cancel();
    client.wait_for_cleanup().await;
    result
}

async fn run(client: &Client, cancel: &CancellationToken, command: Command) -> anyhow::Result<()> {
    client
        .start(cancel.clone())
        .await
        .context("failed to start node")?;

    match command {
        Command::Get { cid, output } => {
            let mut reader = client.retrieve(cancel, &cid).await?;
            let written = match output {
                Some(path) => {
                    let mut file = tokio::fs::File::create(&path)
                        .await
                        .with_context(|| format!("failed to create {}", path.display()))?;
                    let n = tokio::io::copy(&mut reader, &mut file).await?;
                    file.flush().await?;
                    n
                }
                None => {
                    let mut stdout = tokio::io::stdout();
                    let n = tokio::io::copy(&mut reader, &mut stdout).await?;
                    stdout.flush().await?;
                    n
                }
            };
            tracing::info!("Retrieved {} bytes", written);
        }
        Command::Serve { file } => {
            let data = tokio::fs::read(&file)
                .await
                .with_context(|| format!("failed to read {}", file.display()))?;
            let node = client.node().context("node not running")?;
            let id = content::add(node.as_ref(), &data).await?;

            println!("{id}");
            for addr in node.listen_addrs().await {
                println!("{}/p2p/{}", addr, node.local_peer_id());
            }
            tracing::info!("Serving {} ({} bytes). Press Ctrl+C to stop.", id, data.len());
            cancel.cancelled().await;
        }
    }
    Ok(())
}

fn init_tracing(verbosity: u8) {
    let mut filter = EnvFilter::from_default_env();

    // Only apply defaults if RUST_LOG is not set
    if std::env::var("RUST_LOG").is_err() {
        let level = match verbosity {
            0 => "info",
            1 => "debug",
            _ => "trace",
        };
        if let Ok(directive) = level.parse() {
            filter = filter.add_directive(directive);
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
