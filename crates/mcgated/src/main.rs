// # mcgated - mcgate Daemon
//
// Thin integration layer: reads configuration from the environment, builds
// the store, whitelist, firewall and Telegram transport, and runs the
// GateEngine until SIGTERM/SIGINT. All registration and access logic lives
// in mcgate-core.
//
// ## Configuration
//
// All configuration is done via environment variables:
//
// ### Telegram
// - `MCGATE_BOT_TOKEN`: Bot API token (required)
// - `MCGATE_ADMIN_IDS`: Comma-separated administrator account ids (required)
// - `MCGATE_POLL_TIMEOUT_SECS`: getUpdates long-poll timeout (default 30)
//
// ### Account Store
// - `MCGATE_STORE_TYPE`: sqlite or memory (default sqlite)
// - `MCGATE_DB_PATH`: Database file (default /var/lib/mcgate/accounts.db)
//
// ### Game Whitelist
// - `MCGATE_SCREEN_SESSION`: screen session running the server console
// - `MCGATE_SCREEN_BIN`: screen executable
//
// ### Firewall
// - `MCGATE_UFW_BIN`: ufw executable
// - `MCGATE_GAME_PORT`: port the allow-rules open (default 25565)
// - `MCGATE_FIREWALL_MODE`: live or dry-run (default live)
//
// ### Engine
// - `MCGATE_SESSION_TIMEOUT_SECS`: idle conversation timeout, 0 disables (default 900, at most one week)
// - `MCGATE_LOG_LEVEL`: trace, debug, info, warn, error (default info)
//
// ## Example
//
// ```bash
// export MCGATE_BOT_TOKEN=123456:ABC...
// export MCGATE_ADMIN_IDS=11111111,22222222
// export MCGATE_DB_PATH=/var/lib/mcgate/accounts.db
// export MCGATE_SCREEN_SESSION=minecraft_server
//
// mcgated
// ```

use anyhow::{Context, Result};
use mcgate_core::{GateConfig, GateEngine, GateEvent, StoreConfig};
use mcgate_firewall_ufw::UfwFirewall;
use mcgate_telegram::{TelegramClient, TelegramNotifier, TelegramUpdateSource};
use mcgate_whitelist_screen::{ScreenConsole, ScreenWhitelist};
use std::collections::BTreeSet;
use std::env;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

const DEFAULT_DB_PATH: &str = "/var/lib/mcgate/accounts.db";

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum GateExitCode {
    CleanShutdown = 0,
    ConfigError = 1,
    RuntimeError = 2,
}

impl From<GateExitCode> for ExitCode {
    fn from(code: GateExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Application configuration
struct Config {
    bot_token: String,
    poll_timeout_secs: u64,
    gate: GateConfig,
    log_level: String,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("bot_token", &"<REDACTED>")
            .field("poll_timeout_secs", &self.poll_timeout_secs)
            .field("gate", &self.gate)
            .field("log_level", &self.log_level)
            .finish()
    }
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let bot_token = var("MCGATE_BOT_TOKEN").context("MCGATE_BOT_TOKEN is required")?;
        let admins = parse_admins(&var("MCGATE_ADMIN_IDS").unwrap_or_default())?;

        let mut gate = GateConfig::new(admins);

        gate.store = match var("MCGATE_STORE_TYPE").as_deref().unwrap_or("sqlite") {
            "sqlite" => StoreConfig::Sqlite {
                path: var("MCGATE_DB_PATH").unwrap_or_else(|| DEFAULT_DB_PATH.to_string()),
            },
            "memory" => StoreConfig::Memory,
            other => anyhow::bail!(
                "MCGATE_STORE_TYPE '{}' is not supported. Supported types: sqlite, memory",
                other
            ),
        };

        if let Some(session) = var("MCGATE_SCREEN_SESSION") {
            gate.whitelist.screen_session = session;
        }
        if let Some(binary) = var("MCGATE_SCREEN_BIN") {
            gate.whitelist.screen_binary = binary;
        }

        if let Some(binary) = var("MCGATE_UFW_BIN") {
            gate.firewall.ufw_binary = binary;
        }
        if let Some(port) = var("MCGATE_GAME_PORT") {
            gate.firewall.port = port
                .parse()
                .with_context(|| format!("MCGATE_GAME_PORT must be a port number. Got: {port}"))?;
        }
        gate.firewall.dry_run = match var("MCGATE_FIREWALL_MODE").as_deref().unwrap_or("live") {
            "live" => false,
            "dry-run" => true,
            other => anyhow::bail!(
                "MCGATE_FIREWALL_MODE '{}' is not valid. Valid modes: live, dry-run",
                other
            ),
        };

        if let Some(secs) = var("MCGATE_SESSION_TIMEOUT_SECS") {
            gate.engine.session_timeout_secs = secs
                .parse()
                .with_context(|| format!("MCGATE_SESSION_TIMEOUT_SECS must be a number. Got: {secs}"))?;
        }

        let poll_timeout_secs = match var("MCGATE_POLL_TIMEOUT_SECS") {
            Some(secs) => secs
                .parse()
                .with_context(|| format!("MCGATE_POLL_TIMEOUT_SECS must be a number. Got: {secs}"))?,
            None => mcgate_telegram::DEFAULT_POLL_TIMEOUT_SECS,
        };

        Ok(Self {
            bot_token,
            poll_timeout_secs,
            gate,
            log_level: var("MCGATE_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        if self.bot_token.trim().is_empty() {
            anyhow::bail!(
                "MCGATE_BOT_TOKEN is required. \
                Set it via: export MCGATE_BOT_TOKEN=123456:ABC..."
            );
        }

        // Bot tokens look like <bot id>:<secret>
        if !self
            .bot_token
            .split_once(':')
            .is_some_and(|(id, secret)| !id.is_empty() && id.chars().all(|c| c.is_ascii_digit()) && !secret.is_empty())
        {
            anyhow::bail!(
                "MCGATE_BOT_TOKEN does not look like a bot token (expected <id>:<secret>). \
                Copy it from @BotFather."
            );
        }

        if self.gate.admins.is_empty() {
            anyhow::bail!(
                "MCGATE_ADMIN_IDS must contain at least one account id. \
                Set it via: export MCGATE_ADMIN_IDS=11111111,22222222"
            );
        }

        if !(1..=50).contains(&self.poll_timeout_secs) {
            anyhow::bail!(
                "MCGATE_POLL_TIMEOUT_SECS must be between 1 and 50 seconds. Got: {}",
                self.poll_timeout_secs
            );
        }

        if let StoreConfig::Sqlite { path } = &self.gate.store
            && let Some(parent) = std::path::Path::new(path).parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            anyhow::bail!(
                "MCGATE_DB_PATH parent directory does not exist: {}. \
                    Create it first: sudo mkdir -p {}",
                parent.display(),
                parent.display()
            );
        }

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "MCGATE_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        self.gate.validate()?;
        Ok(())
    }
}

/// Parse `MCGATE_ADMIN_IDS`; any non-numeric entry is an error
fn parse_admins(raw: &str) -> Result<BTreeSet<i64>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse()
                .with_context(|| format!("MCGATE_ADMIN_IDS contains a non-numeric id: '{s}'"))
        })
        .collect()
}

fn main() -> ExitCode {
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return GateExitCode::ConfigError.into();
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {:#}", e);
        return GateExitCode::ConfigError.into();
    }

    let log_level = match config.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return GateExitCode::ConfigError.into();
    }

    info!("Starting mcgated daemon");
    info!(
        admins = config.gate.admins.len(),
        store = config.gate.store.type_name(),
        screen_session = %config.gate.whitelist.screen_session,
        port = config.gate.firewall.port,
        firewall_dry_run = config.gate.firewall.dry_run,
        "Configuration loaded"
    );

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return GateExitCode::RuntimeError.into();
        }
    };

    rt.block_on(async {
        match run_daemon(config).await {
            Ok(()) => GateExitCode::CleanShutdown,
            Err(e) => {
                error!("Daemon error: {:#}", e);
                GateExitCode::RuntimeError
            }
        }
    })
    .into()
}

/// Build the components and run the engine until a shutdown signal
async fn run_daemon(config: Config) -> Result<()> {
    let store = mcgate_core::store::open(&config.gate.store)
        .await
        .context("Failed to open account store")?;

    let console = ScreenConsole::from_config(&config.gate.whitelist);
    let whitelist = Arc::new(ScreenWhitelist::new(console.clone()));
    let console = Arc::new(console);
    let firewall = Arc::new(UfwFirewall::from_config(&config.gate.firewall));
    if firewall.is_dry_run() {
        warn!("Firewall in dry-run mode: rules are logged, not applied");
    }

    let client = Arc::new(TelegramClient::new(config.bot_token, config.poll_timeout_secs)?);
    let source = Box::new(TelegramUpdateSource::new(client.clone()));
    let notifier = Arc::new(TelegramNotifier::new(client));

    let (engine, events) = GateEngine::new(source, store, whitelist, firewall, console, notifier, config.gate)?;
    tokio::spawn(log_events(events));

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    tokio::spawn(async move {
        match wait_for_shutdown().await {
            Ok(signal) => info!("Received shutdown signal: {}", signal),
            Err(e) => error!("Signal handling failed, shutting down: {}", e),
        }
        let _ = shutdown_tx.send(());
    });

    engine.run_with_shutdown(Some(shutdown_rx)).await?;
    info!("Shutdown complete");
    Ok(())
}

/// Surface engine events in the log
async fn log_events(mut events: mpsc::Receiver<GateEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            GateEvent::AccessDrift { account_id, failures } => {
                warn!(?account_id, failures, "Access drift reported");
            }
            GateEvent::PermissionDenied { actor } => {
                warn!(actor, "Administrator action denied");
            }
            other => info!(event = ?other, "Gate event"),
        }
    }
}

/// Wait for SIGTERM or SIGINT
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Wait for CTRL-C
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}
