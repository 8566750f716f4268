//! # StoreWatch CLI
//!
//! Watches a remote record store and announces every newly added entry
//! on Discord, once a day and on demand.
//!
//! Usage:
//!   storewatch run                     # Connect to Discord and watch
//!   storewatch check                   # One check, printed to the terminal
//!   storewatch check --send            # One check, posted to the channel
//!   storewatch next                    # When the next check happens
//!   storewatch config show             # Show configuration

use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use storewatch_channels::discord::GatewayEvent;
use storewatch_channels::{ConsoleChannel, DiscordChannel};
use storewatch_core::WatchConfig;
use storewatch_core::traits::{Channel, SnapshotSource};
use storewatch_scheduler::{CommandRouter, DailySchedule, SchedulerEngine};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "storewatch",
    version,
    about = "🎮 StoreWatch — announces new store entries on Discord"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to Discord, answer commands and check daily
    Run,

    /// Run a single check from an empty state
    Check {
        /// Post to the configured channel instead of printing
        #[arg(long)]
        send: bool,
    },

    /// Show when the next scheduled check happens
    Next,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show the effective configuration (secrets masked)
    Show,
    /// Check that every required value is present
    Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        "storewatch=debug,storewatch_core=debug,storewatch_store=debug,storewatch_channels=debug,storewatch_scheduler=debug"
    } else {
        "storewatch=info,storewatch_core=info,storewatch_store=info,storewatch_channels=info,storewatch_scheduler=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .init();

    // Load config
    let config = if let Some(path) = &cli.config {
        WatchConfig::load_from(std::path::Path::new(path))?
    } else {
        WatchConfig::load()?
    };

    match cli.command {
        Commands::Run => run(config).await?,

        Commands::Check { send } => check(config, send).await?,

        Commands::Next => {
            let schedule = DailySchedule::from_config(&config.schedule)?;
            let now = chrono::Utc::now();
            let next = schedule.next_after(now);
            let wait = next - now;
            println!("⏰ Next check: {}", next.with_timezone(&schedule.timezone()).format("%Y-%m-%d %H:%M %Z"));
            println!("   UTC:  {}", next.format("%Y-%m-%d %H:%M"));
            println!("   In:   {}h {:02}m", wait.num_hours(), wait.num_minutes() % 60);
            println!("   Rule: {}", schedule.describe());
        }

        Commands::Config { action } => match action {
            ConfigAction::Show => {
                println!("{}", config.masked().to_toml()?);
            }
            ConfigAction::Validate => match config.validate() {
                Ok(()) => println!("✅ Configuration is valid."),
                Err(e) => {
                    println!("❌ {e}");
                    std::process::exit(1);
                }
            },
        },
    }

    Ok(())
}

async fn run(config: WatchConfig) -> Result<()> {
    // Fatal before anything is scheduled.
    config.validate()?;

    let source: Arc<dyn SnapshotSource> = Arc::from(storewatch_store::create_source(&config.store)?);

    let mut discord = DiscordChannel::new(config.discord.clone())?;
    discord.connect().await?;
    let mut events = discord.start_gateway();
    let channel: Arc<dyn Channel> = Arc::new(discord);

    let engine = Arc::new(SchedulerEngine::new(source, channel.clone(), &config)?);
    let router = CommandRouter::new(engine.clone(), channel, &config.discord);

    println!("🎮 StoreWatch v{}", env!("CARGO_PKG_VERSION"));
    println!("   Store:    {}", config.store.url);
    println!("   Channel:  {}", config.discord.channel_id);
    println!("   Schedule: {}", engine.schedule().describe());
    println!("\nWatching. Press Ctrl+C to stop.");

    let (ready_tx, mut ready_rx) = tokio::sync::watch::channel(false);

    tokio::spawn(async move {
        use tokio_stream::StreamExt;

        while let Some(event) = events.next().await {
            match event {
                GatewayEvent::Ready { .. } => {
                    ready_tx.send_replace(true);
                }
                GatewayEvent::Message(msg) => {
                    let router = router.clone();
                    tokio::spawn(async move {
                        if let Err(e) = router.handle(&msg).await {
                            tracing::warn!("Command error: {e}");
                        }
                    });
                }
            }
        }
    });

    engine
        .run(
            async move {
                let _ = ready_rx.wait_for(|ready| *ready).await;
            },
            async {
                let _ = tokio::signal::ctrl_c().await;
            },
        )
        .await;

    println!("\n👋 StoreWatch stopped.");
    Ok(())
}

async fn check(config: WatchConfig, send: bool) -> Result<()> {
    if send {
        config.validate()?;
    } else if config.store.url.trim().is_empty() {
        anyhow::bail!("store.url (JSONBIN_URL) is required");
    }

    let source: Arc<dyn SnapshotSource> = Arc::from(storewatch_store::create_source(&config.store)?);
    let channel: Arc<dyn Channel> = if send {
        let mut discord = DiscordChannel::new(config.discord.clone())?;
        discord.connect().await?;
        Arc::new(discord)
    } else {
        let mut console = ConsoleChannel::new();
        console.connect().await?;
        Arc::new(console)
    };

    let engine = SchedulerEngine::new(source, channel, &config)?;
    let report = engine.trigger_now(&config.discord.channel_id).await?;

    println!("✅ {}", report.summary());
    Ok(())
}
