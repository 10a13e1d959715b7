use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use scribed::{
    aggregation::{sweeper::run_idle_sweeper, AggregationConfig, Aggregator},
    classifier::LlmClassifier,
    config::DaemonConfig,
    finalizer::ReportFinalizer,
    llm::ChatClient,
    rest,
    storage::OwnerStore,
    tracker::TrackerClient,
    trigger::TriggerDetector,
    AppContext,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "scribed",
    about = "scribed — voice-report aggregation daemon",
    version
)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to config.toml (default: <data-dir>/config.toml when present)
    #[arg(long, env = "SCRIBED_CONFIG")]
    config: Option<std::path::PathBuf>,

    /// REST server port
    #[arg(long, env = "SCRIBED_PORT")]
    port: Option<u16>,

    /// Bind address (default: 127.0.0.1; use 0.0.0.0 for LAN access)
    #[arg(long, env = "SCRIBED_BIND")]
    bind_address: Option<String>,

    /// Data directory for the owner database and logs
    #[arg(long, env = "SCRIBED_DATA_DIR")]
    data_dir: Option<std::path::PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "SCRIBED_LOG")]
    log: Option<String>,

    /// Write logs to this file path (rotated daily). Optional.
    #[arg(long, env = "SCRIBED_LOG_FILE")]
    log_file: Option<std::path::PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Start the daemon server (default when no subcommand given).
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut args = Args::parse();

    // Keep the appender guard alive for the life of the process.
    let _log_guard = init_tracing(&args)?;

    match args.command.take() {
        Some(Command::Serve) | None => serve(args).await,
    }
}

async fn serve(args: Args) -> Result<()> {
    let mut config = DaemonConfig::load(args.config.as_deref(), args.data_dir.as_deref())?;
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(bind) = args.bind_address {
        config.bind_address = bind;
    }
    std::fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("creating data dir {}", config.data_dir.display()))?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        data_dir = %config.data_dir.display(),
        "scribed starting"
    );

    let owners = OwnerStore::open(&config.data_dir.join("owners.db")).await?;
    let chat = ChatClient::from_settings(&config.llm);
    let tracker = TrackerClient::new(
        &config.tracker.api_base,
        Duration::from_secs(config.tracker.timeout_secs),
    );

    let classifier = Arc::new(LlmClassifier::new(chat.clone()));
    let finalizer = Arc::new(ReportFinalizer::new(
        chat,
        tracker,
        owners.clone(),
        &config.tracker.footer,
    ));

    let aggregator = Arc::new(Aggregator::new(
        AggregationConfig::from(&config.aggregation),
        TriggerDetector::new(config.aggregation.trigger_phrases.iter().cloned()),
        classifier,
        finalizer,
    ));

    let sweep_period = config.aggregation.sweep_period();
    tokio::spawn(run_idle_sweeper(Arc::clone(&aggregator), sweep_period));
    info!(period_secs = sweep_period.as_secs(), "idle sweeper started");

    let ctx = Arc::new(AppContext {
        config: Arc::new(config),
        owners,
        aggregator,
        started_at: std::time::Instant::now(),
    });

    rest::start_rest_server(ctx).await
}

fn init_tracing(args: &Args) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let filter = EnvFilter::try_new(args.log.as_deref().unwrap_or("info"))
        .context("invalid log filter")?;

    match &args.log_file {
        Some(path) => {
            let dir = path.parent().unwrap_or_else(|| std::path::Path::new("."));
            let file = path
                .file_name()
                .map(|f| f.to_string_lossy().to_string())
                .unwrap_or_else(|| "scribed.log".to_string());
            let appender = tracing_appender::rolling::daily(dir, file);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
            Ok(None)
        }
    }
}
