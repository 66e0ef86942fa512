//! wallet-session: connect to an EIP-1193 wallet and follow its account and balance

use std::time::Duration;

use clap::Parser;
use eyre::Result;
use wallet_session_adapters::{config::ENV_PROXY_URL, RuntimeProfile, SessionAdapterConfig};
use wallet_session_core::SessionSnapshot;

mod render;
mod session_bridge;

use session_bridge::SessionBridge;

/// CLI arguments for `wallet-session`.
#[derive(Debug, Parser)]
#[command(name = "wallet-session", version, about)]
struct Args {
    /// JSON-RPC endpoint that forwards EIP-1193 requests to a wallet.
    #[arg(long, env = ENV_PROXY_URL)]
    proxy_url: Option<String>,

    /// Require a real wallet instead of the built-in deterministic one.
    #[arg(long)]
    production: bool,

    /// Keep following account and chain changes until interrupted.
    #[arg(long)]
    watch: bool,

    /// Disconnect after connecting and show the cleared session.
    #[arg(long)]
    disconnect: bool,

    /// Print snapshots as JSON.
    #[arg(long)]
    json: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();
    let mut config = SessionAdapterConfig::from_env();
    if let Some(url) = args.proxy_url.as_deref().map(str::trim).filter(|u| !u.is_empty()) {
        config.eip1193_proxy_url = Some(url.to_owned());
    }
    if args.production {
        config.runtime_profile = RuntimeProfile::Production;
    }

    tracing::info!("Starting wallet-session");

    let bridge = SessionBridge::mount(&config);
    let mut last = bridge.connect().await;
    print_snapshot(&last, args.json)?;

    if args.watch && bridge.has_provider() {
        let mut ticker = tokio::time::interval(Duration::from_millis(config.event_poll_interval_ms));
        let mut updates = bridge.watch();
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);
        loop {
            tokio::select! {
                _ = &mut ctrl_c => break,
                _ = ticker.tick() => {
                    bridge.sync().await;
                }
                changed = updates.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let current = bridge.snapshot();
                    if current != last {
                        print_snapshot(&current, args.json)?;
                        last = current;
                    }
                }
            }
        }
    }

    if args.disconnect {
        print_snapshot(&bridge.disconnect(), args.json)?;
    }

    bridge.unmount();
    Ok(())
}

fn print_snapshot(snapshot: &SessionSnapshot, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(snapshot)?);
    } else {
        println!("{}\n", render::render(snapshot));
    }
    Ok(())
}
