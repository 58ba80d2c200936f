use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use button_bridge::bus::names::BUS_NAME;
use button_bridge::bus::{BusClient, LocalBus};
use button_bridge::config::{self, DEFAULT_CONFIG_PATH};
use button_bridge::events::EventBus;
use button_bridge::gpio::CdevBackend;
use button_bridge::handler::SignalHandler;
use button_bridge::service::ButtonService;
use button_bridge::state::AppState;
use button_bridge::web;

/// Log level for the application
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Verbose,
    Debug,
    Trace,
}

/// button-bridge command line arguments
#[derive(Parser, Debug)]
#[command(name = "button-bridge")]
#[command(version, about = "Chassis button GPIO event bridge", long_about = None)]
struct CliArgs {
    /// Path to gpio_defs.json
    #[arg(
        short = 'c',
        long,
        value_name = "FILE",
        env = "BUTTON_BRIDGE_CONFIG",
        default_value = DEFAULT_CONFIG_PATH
    )]
    config: PathBuf,

    /// Long-press threshold in milliseconds (overrides config)
    #[arg(long, value_name = "MS")]
    long_press_ms: Option<u64>,

    /// Diagnostic HTTP listen address (overrides config)
    #[arg(short = 'a', long, value_name = "ADDRESS")]
    address: Option<String>,

    /// Diagnostic HTTP port (overrides config)
    #[arg(short = 'p', long, value_name = "PORT")]
    http_port: Option<u16>,

    /// Disable the diagnostic HTTP surface
    #[arg(long)]
    no_web: bool,

    /// Log level (error, warn, info, verbose, debug, trace)
    #[arg(short = 'l', long, value_name = "LEVEL", default_value = "info")]
    log_level: LogLevel,

    /// Increase verbosity (-v for verbose, -vv for debug, -vvv for trace)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();
    init_logging(args.log_level, args.verbose);

    let mut defs = config::load(&args.config).await?;
    if let Some(ms) = args.long_press_ms {
        defs.settings.long_press_ms = ms;
    }
    if let Some(address) = args.address {
        defs.settings.web.bind_address = address;
    }
    if let Some(port) = args.http_port {
        defs.settings.web.http_port = port;
    }
    if args.no_web {
        defs.settings.web.enabled = false;
    }
    let settings = defs.settings.clone();
    tracing::info!(
        "Long press threshold {} ms, sled cycle {}",
        settings.long_press_ms,
        if settings.sled_cycle_enabled { "enabled" } else { "disabled" }
    );

    let events = Arc::new(EventBus::new());
    let bus = Arc::new(LocalBus::new(BUS_NAME, events.clone()));

    let service = match ButtonService::start(
        &defs,
        Arc::new(CdevBackend::new()),
        bus.clone(),
        &settings,
    ) {
        Ok(service) => Arc::new(service),
        Err(e) => {
            tracing::error!("Failed to start button service: {}", e);
            return Err(e.into());
        }
    };

    let cancel = CancellationToken::new();

    // Signal handler sees only the buttons exported above
    let handler = SignalHandler::new(bus.clone(), &settings).await;
    let handler_task = tokio::spawn(handler.run(bus.subscribe(), cancel.clone()));

    let web_task = if settings.web.enabled {
        let state = AppState::new(service.clone(), bus.clone(), events);
        let app = web::create_router(state);
        let listener = tokio::net::TcpListener::bind((
            settings.web.bind_address.as_str(),
            settings.web.http_port,
        ))
        .await?;
        tracing::info!("Starting HTTP server on {}", listener.local_addr()?);

        let token = cancel.clone();
        Some(tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { token.cancelled().await })
                .await
        }))
    } else {
        None
    };

    let result = tokio::select! {
        result = service.run() => result,
        _ = shutdown_signal() => Ok(()),
    };

    cleanup(&service, &cancel, handler_task, web_task).await;

    match result {
        Ok(()) => {
            tracing::info!("Button bridge stopped");
            Ok(())
        }
        Err(e) => {
            tracing::error!("Button bridge terminated: {}", e);
            Err(e.into())
        }
    }
}

/// Initialize logging with tracing
fn init_logging(level: LogLevel, verbose_count: u8) {
    // Verbose count overrides log level
    let effective_level = match verbose_count {
        0 => level,
        1 => LogLevel::Verbose,
        2 => LogLevel::Debug,
        _ => LogLevel::Trace,
    };

    let filter = match effective_level {
        LogLevel::Error => "button_bridge=error,tower_http=error",
        LogLevel::Warn => "button_bridge=warn,tower_http=warn",
        LogLevel::Info => "button_bridge=info,tower_http=info",
        LogLevel::Verbose => "button_bridge=debug,tower_http=info",
        LogLevel::Debug => "button_bridge=debug,tower_http=debug",
        LogLevel::Trace => "button_bridge=trace,tower_http=debug",
    };

    // Environment variable takes highest priority
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into());

    if let Err(err) = tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
    {
        eprintln!("failed to initialize tracing: {}", err);
    }
}

/// Resolves on Ctrl-C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    tracing::info!("Shutdown signal received");
}

/// Release the lines and stop the background tasks
async fn cleanup(
    service: &ButtonService,
    cancel: &CancellationToken,
    handler_task: tokio::task::JoinHandle<()>,
    web_task: Option<tokio::task::JoinHandle<std::io::Result<()>>>,
) {
    service.stop().await;
    cancel.cancel();

    if let Err(e) = handler_task.await {
        tracing::warn!("Signal handler task failed: {}", e);
    }

    if let Some(task) = web_task {
        match task.await {
            Ok(Err(e)) => tracing::warn!("HTTP server error: {}", e),
            Err(e) => tracing::warn!("HTTP server task failed: {}", e),
            Ok(Ok(())) => tracing::info!("HTTP server stopped"),
        }
    }
}
