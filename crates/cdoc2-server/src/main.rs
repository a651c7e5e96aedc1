//! cdoc2-capsule-server: key capsule exchange server
//!
//! Usage:
//!   cdoc2-capsule-server [--config /etc/cdoc2/config.toml] [--mode put|get]
//!
//! Modes:
//!   put  - Accepts capsules from senders (POST /key-capsules) [default]
//!   get  - Releases capsules to mTLS-authenticated recipients (GET /key-capsules/{id})

mod access_log;
mod api;
mod cleanup;
mod identity;
mod metrics;
mod server;

use anyhow::{Context, Result};
use cdoc2_core::config::{Cdoc2Config, ServerMode};
use clap::{Parser, ValueEnum};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "cdoc2-capsule-server", version, about = "cdoc2 key capsule server")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(
        long,
        short = 'c',
        env = "CDOC2_CONFIG",
        default_value = "/etc/cdoc2/config.toml"
    )]
    config: PathBuf,

    /// Which operation this instance serves (overrides server.mode)
    #[arg(long)]
    mode: Option<Mode>,

    /// Log level (trace, debug, info, warn, error); overrides server.log_level
    #[arg(long, env = "CDOC2_LOG")]
    log: Option<String>,

    /// Log format (json, text); overrides server.log_format
    #[arg(long, env = "CDOC2_LOG_FORMAT")]
    log_format: Option<LogFormat>,
}

#[derive(Clone, Copy, Debug, ValueEnum, PartialEq)]
enum Mode {
    /// Store capsules (POST)
    Put,
    /// Fetch capsules (GET)
    Get,
}

impl From<Mode> for ServerMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Put => ServerMode::Put,
            Mode::Get => ServerMode::Get,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogFormat {
    Json,
    Text,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Config is read before logging so the file can pick the level; problems
    // are reported once the subscriber is up.
    let loaded = load_config(&cli.config).await;

    let (level, format) = match &loaded {
        Ok(Some(config)) => (
            cli.log.clone().unwrap_or_else(|| config.server.log_level.clone()),
            cli.log_format
                .unwrap_or_else(|| parse_log_format(&config.server.log_format)),
        ),
        _ => (
            cli.log.clone().unwrap_or_else(|| "info".to_string()),
            cli.log_format.unwrap_or(LogFormat::Json),
        ),
    };
    init_logging(&level, format);

    let mut config = match loaded? {
        Some(config) => config,
        None => {
            tracing::warn!(
                "config file not found: {}  (using defaults)",
                cli.config.display()
            );
            Cdoc2Config::default()
        }
    };
    if let Some(mode) = cli.mode {
        config.server.mode = mode.into();
    }

    info!(
        version = env!("CARGO_PKG_VERSION"),
        mode = %config.server.mode,
        config = %cli.config.display(),
        "cdoc2-capsule-server starting"
    );

    server::run(config).await
}

async fn load_config(path: &Path) -> Result<Option<Cdoc2Config>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading config {}", path.display()))?;
    let config = Cdoc2Config::from_toml_str(&content)
        .with_context(|| format!("parsing config {}", path.display()))?;
    Ok(Some(config))
}

fn parse_log_format(s: &str) -> LogFormat {
    if s.eq_ignore_ascii_case("text") {
        LogFormat::Text
    } else {
        LogFormat::Json
    }
}

fn init_logging(level: &str, format: LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json())
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer())
                .init();
        }
    }
}
