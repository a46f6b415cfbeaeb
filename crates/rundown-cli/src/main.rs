//! Command-line playout client for Motion Design rundowns.
//!
//! Connects to the engine's message-bus WebSocket bridge, discovers the
//! rundown server with a Ping/Pong handshake, loads a rundown, then plays
//! every non-template page in ascending order:
//!
//!   cargo run -p rundown-cli -- --ip localhost --port 30030 --delay 1000

use anyhow::Context;
use clap::Parser;
use rundown_client::{Client, ClientConfig, DEFAULT_SENDER_ID};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "rundown", about = "Play out a Motion Design rundown over the WebSocket bridge")]
struct Args {
    /// Bridge host.
    #[arg(long, env = "RUNDOWN_IP", default_value = "localhost")]
    ip: String,
    /// Bridge port.
    #[arg(long, env = "RUNDOWN_PORT", default_value_t = 30030)]
    port: u16,
    /// Milliseconds to wait between page actions.
    #[arg(long, default_value_t = 1000)]
    delay: u64,
    /// Rundown asset to load.
    #[arg(long, default_value = "/Game/test.test")]
    rundown: String,
    /// Action to run against each page.
    #[arg(long, default_value = "Play")]
    action: String,
    /// Seconds a call may wait for its reply.
    #[arg(long, default_value_t = 3)]
    timeout_secs: u64,
    /// Identity presented to the bridge.
    #[arg(long, default_value = DEFAULT_SENDER_ID)]
    sender_id: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("rundown=info".parse()?)
                .add_directive("rundown_client=info".parse()?),
        )
        .init();

    let args = Args::parse();
    let url = format!("ws://{}:{}", args.ip, args.port);
    let config = ClientConfig {
        sender_id: args.sender_id.clone(),
        reply_timeout_secs: args.timeout_secs,
        ..ClientConfig::default()
    };

    tracing::info!("Connecting to {}...", url);
    let (client, driver) = Client::connect(&url, config)
        .await
        .with_context(|| format!("could not connect to {url}"))?;
    let driver = tokio::spawn(driver.run());
    tracing::info!("Connected");

    client
        .ping()
        .await
        .context("rundown server did not answer the ping")?;

    let text = client.load_rundown(&args.rundown).await?;
    tracing::info!("{}", text);

    let pages = client.list_pages().await?;
    let page_ids = pages.actionable_page_ids();
    tracing::info!(
        "Sending {} commands to {} pages with {}ms delay...",
        args.action,
        page_ids.len(),
        args.delay
    );

    for page_id in page_ids {
        let text = client.page_action(page_id, &args.action).await?;
        tracing::info!("pageId: {} - {}", page_id, text);
        tokio::time::sleep(Duration::from_millis(args.delay)).await;
    }

    drop(client);
    driver.await?.map_err(Into::into)
}
