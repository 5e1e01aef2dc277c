use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};

use alerts::store::JsonFileStore;
use alerts::{AlertRegistry, Owner};
use cli::chat::respond;
use cli::commands::AlertCommands;
use cli::config::AppConfig;
use cli::discord::DiscordWebhookNotifier;
use cli::render::render_alert_list;
use common::logger::init_logger;
use market::DexScreenerClient;
use poller::{AlertPoller, LogNotifier, Notifier, PollerConfig};

#[derive(Debug, Parser)]
#[command(name = "vwap-watch", version)]
#[command(about = "Watches tokens and alerts when the price comes back to a VWAP level")]
struct Cli {
    /// Alert snapshot file (overrides ALERTS_FILE)
    #[arg(long, global = true)]
    alerts_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Poll prices and accept chat commands on stdin (default)
    Run {
        /// Display name credited on alerts added from this console
        #[arg(long, default_value = "console")]
        user: String,

        /// Avatar URL shown next to alerts added from this console
        #[arg(long, default_value = "")]
        avatar: String,
    },
    /// Print the active alerts and exit
    List,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let mut cfg = AppConfig::from_env();
    if let Some(path) = cli.alerts_file {
        cfg.alerts_file = path;
    }

    init_logger("vwap-watch", cfg.json_logs);

    match cli.command.unwrap_or(Command::Run {
        user: "console".to_string(),
        avatar: String::new(),
    }) {
        Command::Run { user, avatar } => run(cfg, Owner::new(user, avatar)).await,
        Command::List => list(cfg).await,
    }
}

/// A snapshot that exists but cannot be read stops startup; it is never
/// replaced with an empty one.
async fn open_registry(cfg: &AppConfig) -> anyhow::Result<Arc<AlertRegistry<JsonFileStore>>> {
    let store = Arc::new(JsonFileStore::new(&cfg.alerts_file));
    let registry = AlertRegistry::open(store)
        .await
        .with_context(|| format!("loading alerts from {}", cfg.alerts_file.display()))?;

    Ok(Arc::new(registry))
}

fn build_notifier(cfg: &AppConfig) -> anyhow::Result<Arc<dyn Notifier>> {
    match &cfg.discord_webhook_url {
        Some(url) => {
            let notifier =
                DiscordWebhookNotifier::new(url.clone(), cfg.alert_role_id.clone(), cfg.http_timeout)
                    .context("building discord webhook client")?;
            info!("alerts will be posted to discord");
            Ok(Arc::new(notifier))
        }
        None => {
            warn!("DISCORD_WEBHOOK_URL not set, alerts will only be logged");
            Ok(Arc::new(LogNotifier))
        }
    }
}

async fn run(cfg: AppConfig, console_user: Owner) -> anyhow::Result<()> {
    let registry = open_registry(&cfg).await?;
    let source = Arc::new(
        DexScreenerClient::new(cfg.dexscreener_url.clone(), cfg.http_timeout)
            .context("building dexscreener client")?,
    );
    let notifier = build_notifier(&cfg)?;

    let poller_cfg = PollerConfig {
        max_concurrent_fetches: cfg.max_concurrent_fetches,
        ..Default::default()
    };
    let band_tolerance = poller_cfg.band_tolerance;

    info!(
        alerts = registry.len().await,
        file = %cfg.alerts_file.display(),
        "starting vwap watcher"
    );

    let poller = Arc::new(AlertPoller::new(
        poller_cfg,
        registry.clone(),
        source.clone(),
        notifier,
    ));
    let poller_task = tokio::spawn(poller.run());

    let commands = AlertCommands::new(registry, source);
    let chat_task = tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if let Some(reply) =
                        respond(&commands, &line, &console_user, band_tolerance).await
                    {
                        println!("{reply}");
                    }
                }
                Ok(None) => {
                    info!("stdin closed, chat commands disabled");
                    break;
                }
                Err(e) => {
                    error!(error = %e, "failed to read chat line");
                    break;
                }
            }
        }
    });

    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;
    info!("shutting down");

    chat_task.abort();
    poller_task.abort();

    Ok(())
}

async fn list(cfg: AppConfig) -> anyhow::Result<()> {
    let registry = open_registry(&cfg).await?;
    println!("{}", render_alert_list(&registry.list().await));
    Ok(())
}
