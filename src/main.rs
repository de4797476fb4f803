use anyhow::{bail, Context, Result};
use chrono::{DateTime, FixedOffset, Local};
use clap::{Parser, Subcommand, ValueEnum};
use dash_analytics::{Aggregator, DashboardMetrics, MetricsCache, MetricsInput, ReportGenerator};
use dash_client::DashClient;
use dash_core::config::AppConfig;
use dash_core::refresh::RefreshScheduler;
use dash_core::time::{filter_by_range, parse_range_bound, previous_period};
use dash_core::types::{DateRange, Message};
use dash_store::store::latest_per_group;
use dash_store::MessageStore;
use std::path::PathBuf;
use tokio::sync::{mpsc, watch};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "convo-dash",
    about = "Conversation metrics dashboard and message store service",
    version,
    author
)]
struct Cli {
    /// Path to config file (default: ~/.config/convo-dash/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override the API base URL used by client commands
    #[arg(long, global = true)]
    api_base: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the REST service over the local message store
    Serve {
        /// Bind host
        #[arg(long)]
        host: Option<String>,
        /// Bind port
        #[arg(long)]
        port: Option<u16>,
        /// Store directory
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },

    /// Fetch messages from the API and print dashboard metrics
    Metrics {
        #[command(flatten)]
        window: WindowArgs,
        /// Print JSON instead of the text summary
        #[arg(long)]
        json: bool,
    },

    /// Write a CSV export
    Export {
        kind: ExportKind,
        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Recompute metrics on the refresh schedule until Ctrl-C
    Watch {
        #[command(flatten)]
        window: WindowArgs,
    },

    /// Bulk-load a JSON array of messages into the local store
    Import {
        file: PathBuf,
        /// Store directory
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },

    /// Show or manage configuration
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
}

#[derive(clap::Args, Clone)]
struct WindowArgs {
    /// Window start (YYYY-MM-DD or RFC 3339)
    #[arg(long)]
    from: Option<String>,
    /// Window end, inclusive (YYYY-MM-DD or RFC 3339)
    #[arg(long)]
    to: Option<String>,
    /// Compare against the preceding window of equal length
    #[arg(long)]
    compare: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum ExportKind {
    Conversations,
    Messages,
    Status,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Initialize default configuration file
    Init,
    /// Print config file path
    Path,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new(std::env::var("RUST_LOG").unwrap_or_else(|_| "convo_dash=info,warn".into()))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load()?,
    };
    if let Some(api_base) = &cli.api_base {
        config.client.api_base = api_base.clone();
    }

    match cli.command {
        Commands::Serve {
            host,
            port,
            data_dir,
        } => {
            if let Some(h) = host {
                config.server.host = h;
            }
            if let Some(p) = port {
                config.server.port = p;
            }
            if data_dir.is_some() {
                config.store.data_dir = data_dir;
            }
            dash_server::serve(config).await?;
        }
        Commands::Metrics { window, json } => {
            let now = Local::now().fixed_offset();
            let range = window.range(now.offset())?;
            let aggregator = Aggregator::new(config.analytics.clone())?;
            let client = DashClient::new(&config.client)?;
            let all = client.fetch_all().await;
            tracing::info!("Fetched {} message(s) from {}", all.len(), client.base());

            let mut cache = MetricsCache::new();
            let metrics = window_metrics(&aggregator, &mut cache, &all, &range, window.compare, now);
            if json {
                println!("{}", serde_json::to_string_pretty(metrics)?);
            } else {
                print!("{}", render(metrics, &range, now.offset()));
            }
        }
        Commands::Export { kind, output } => {
            let zone = *Local::now().offset();
            let aggregator = Aggregator::new(config.analytics.clone())?;
            let client = DashClient::new(&config.client)?;
            let all = client.fetch_all().await;
            let csv = match kind {
                ExportKind::Conversations => {
                    let unique = client.fetch_unique().await;
                    ReportGenerator::conversations_csv(&unique, &all, &zone)
                }
                ExportKind::Messages => ReportGenerator::messages_csv(&all),
                ExportKind::Status => ReportGenerator::status_csv(&aggregator, &all, &zone),
            };
            match output {
                Some(path) => {
                    std::fs::write(&path, csv)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    println!("Wrote {}", path.display());
                }
                None => print!("{}", csv),
            }
        }
        Commands::Watch { window } => {
            run_watch(&config, window).await?;
        }
        Commands::Import { file, data_dir } => {
            if data_dir.is_some() {
                config.store.data_dir = data_dir;
            }
            let contents = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let messages: Vec<Message> = serde_json::from_str(&contents)
                .with_context(|| format!("{} is not a JSON array of messages", file.display()))?;
            let total = messages.len();
            let mut store = MessageStore::open(config.store_dir())?;
            let added = store.import(messages)?;
            println!(
                "Imported {} of {} record(s) into {}",
                added,
                total,
                config.store_dir().display()
            );
        }
        Commands::Config { action } => {
            handle_config_command(action, &config)?;
        }
    }

    Ok(())
}

impl WindowArgs {
    fn range(&self, zone: &FixedOffset) -> Result<DateRange> {
        let from = match &self.from {
            Some(raw) => Some(
                parse_range_bound(raw, false, zone)
                    .with_context(|| format!("Unrecognized --from date '{}'", raw))?,
            ),
            None => None,
        };
        let to = match &self.to {
            Some(raw) => Some(
                parse_range_bound(raw, true, zone)
                    .with_context(|| format!("Unrecognized --to date '{}'", raw))?,
            ),
            None => None,
        };
        if let (Some(f), Some(t)) = (from, to) {
            if f > t {
                bail!("--from must not be after --to");
            }
        }
        if self.compare && (from.is_none() || to.is_none()) {
            tracing::warn!("--compare needs both --from and --to; no comparison will be shown");
        }
        Ok(DateRange { from, to })
    }
}

/// Filter `all` to the window (and the preceding one when comparing), then
/// compute through the cache.
fn window_metrics<'c>(
    aggregator: &Aggregator,
    cache: &'c mut MetricsCache,
    all: &[Message],
    range: &DateRange,
    compare: bool,
    now: DateTime<FixedOffset>,
) -> &'c DashboardMetrics {
    let zone = *now.offset();
    let current = filter_by_range(all, range, &zone);
    let unique = latest_per_group(&current);

    let previous = if compare {
        previous_period(range).map(|prev| {
            let messages = filter_by_range(all, &prev, &zone);
            let unique = latest_per_group(&messages);
            (messages, unique)
        })
    } else {
        None
    };

    let mut input = MetricsInput::new(&current, &unique, now).with_all_messages(all);
    if let Some((messages, unique)) = &previous {
        input = input.compare_with(messages, unique);
    }
    cache.get_or_compute(aggregator, &input)
}

fn render(metrics: &DashboardMetrics, range: &DateRange, zone: &FixedOffset) -> String {
    let label = match range.bounds() {
        Some((from, to)) => format!("{} to {}", format_day(from, zone), format_day(to, zone)),
        None => "all time".to_string(),
    };
    format!("Dashboard ({})\n{}", label, ReportGenerator::text_summary(metrics))
}

fn format_day(ms: i64, zone: &FixedOffset) -> String {
    DateTime::from_timestamp_millis(ms)
        .map(|dt| dt.with_timezone(zone).format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| ms.to_string())
}

async fn run_watch(config: &AppConfig, window: WindowArgs) -> Result<()> {
    let aggregator = Aggregator::new(config.analytics.clone())?;
    let client = DashClient::new(&config.client)?;
    let mut cache = MetricsCache::new();

    if !config.refresh.enabled {
        tracing::warn!("Refresh is disabled in config; showing a single snapshot");
        let now = Local::now().fixed_offset();
        let range = window.range(now.offset())?;
        let all = client.fetch_all().await;
        let metrics = window_metrics(&aggregator, &mut cache, &all, &range, window.compare, now);
        print!("{}", render(metrics, &range, now.offset()));
        return Ok(());
    }

    let scheduler = RefreshScheduler::new(&config.refresh)?;
    let (tick_tx, mut tick_rx) = mpsc::unbounded_channel();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(scheduler.run(tick_tx, shutdown_rx));
    tracing::info!("Watching {} on '{}'", client.base(), config.refresh.cron);

    loop {
        tokio::select! {
            tick = tick_rx.recv() => {
                let Some(tick) = tick else { break };
                let now = Local::now().fixed_offset();
                let range = window.range(now.offset())?;
                let all = client.fetch_all().await;

                let (_, misses_before) = cache.stats();
                let metrics = window_metrics(&aggregator, &mut cache, &all, &range, window.compare, now);
                let rendered = render(metrics, &range, now.offset());
                let (_, misses_after) = cache.stats();
                if misses_after > misses_before {
                    println!("[refresh #{} at {}]", tick.seq, tick.fired_at.with_timezone(now.offset()).format("%H:%M:%S"));
                    print!("{}", rendered);
                } else {
                    tracing::debug!("Refresh #{}: no changes", tick.seq);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Stopping watch");
                break;
            }
        }
    }

    let _ = shutdown_tx.send(true);
    let _ = handle.await;
    Ok(())
}

fn handle_config_command(action: Option<ConfigAction>, config: &AppConfig) -> Result<()> {
    match action {
        Some(ConfigAction::Show) | None => {
            let toml_str = toml::to_string_pretty(config)?;
            println!("{}", toml_str);
        }
        Some(ConfigAction::Init) => {
            let path = AppConfig::default_path();
            if path.exists() {
                println!("Config already exists at: {}", path.display());
            } else {
                config.save()?;
                println!("Created default config at: {}", path.display());
            }
        }
        Some(ConfigAction::Path) => {
            println!("{}", AppConfig::default_path().display());
        }
    }
    Ok(())
}
