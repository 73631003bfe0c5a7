use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};

use tether_config::{ConfigManager, LogLevel};
use tether_core::IntentGate;
use tether_observability::{LogManager, MetricsRecorder};
use tether_server::{bridge_config, run_server, status_surface, AppState, ConfigArgs};
use tether_world::WsGameClient;

#[derive(Parser, Debug, Clone)]
#[command(name = "tether")]
#[command(about = "Bridge a controllable presence into a game world")]
#[command(version)]
struct Cli {
    /// Enable debug logging
    #[arg(long, env = "DEBUG", default_value = "false")]
    debug: bool,

    /// Control API port (overrides config)
    #[arg(long, env = "TETHER_PORT")]
    port: Option<u16>,

    /// Game-session adapter URL (overrides config)
    #[arg(long, env = "TETHER_WORLD_URL")]
    world_url: Option<String>,

    /// Log level (overrides config)
    #[arg(long, env = "TETHER_LOG_LEVEL")]
    log_level: Option<String>,

    /// Config file path
    #[arg(long, env = "TETHER_CONFIG", default_value = "~/.tether/config.json")]
    config: String,

    /// Join the world right after startup
    #[arg(long, default_value = "false")]
    auto_join: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
enum Command {
    /// Read or change the config file instead of running the bridge
    Config(ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path =
        tether_config::expand_tilde(&cli.config).unwrap_or_else(|| PathBuf::from(&cli.config));
    let manager = ConfigManager::load(&config_path)
        .await
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    if let Some(Command::Config(args)) = cli.command {
        println!("{}", args.command.run(&manager).await?);
        return Ok(());
    }

    let mut config = manager.snapshot().await;

    // CLI flags win over the config file
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(url) = cli.world_url {
        config.world.url = url;
    }
    if let Some(level) = &cli.log_level {
        config.logging.level = level.parse()?;
    } else if cli.debug {
        config.logging.level = LogLevel::Debug;
    }

    let log_manager = LogManager::init(&config.logging)?;
    tracing::info!("Config loaded from {:?}", config_path);

    let metrics = match MetricsRecorder::install() {
        Ok(recorder) => Some(Arc::new(recorder)),
        Err(e) => {
            tracing::warn!("Metrics disabled: {}", e);
            None
        }
    };

    tracing::info!("Starting tether");
    tracing::info!("  World: {} as {}", config.world.url, config.world.username);
    tracing::info!("  Auth: {}", config.world.auth);
    tracing::info!(
        "  Reconnect: {} attempts, {}ms base delay",
        config.reconnect.max_attempts,
        config.reconnect.base_delay_ms
    );

    let client = Arc::new(WsGameClient::new(config.world.clone()));
    let surface = status_surface(&config.status)?;
    let (gate, bridge) = IntentGate::spawn(bridge_config(&config), client, surface);

    if cli.auto_join {
        let snapshot = gate.join(None).await?;
        tracing::info!("Auto-join requested: {}", snapshot.text);
    }

    let mut state =
        AppState::new(gate.clone(), config.server.api_token.clone()).with_logging(log_manager);
    if let Some(metrics) = metrics {
        state = state.with_metrics(metrics);
    }

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid address: {}", e))?;

    let shutdown = shutdown_signal(gate);
    run_server(state, addr, config.server.cors, shutdown).await?;

    if let Err(e) = bridge.await {
        tracing::error!("Bridge task failed: {}", e);
    }
    tracing::info!("Tether stopped");
    Ok(())
}

async fn shutdown_signal(gate: IntentGate) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl-C: {}", e);
    }
    tracing::info!("Shutting down, leaving the world");
    if let Err(e) = gate.shutdown().await {
        tracing::warn!("Bridge already stopped: {}", e);
    }
}
