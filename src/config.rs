use anyhow::{Context, Result};
use clap::Parser;
use std::env;

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub storage_dir: String,
    pub database_url: String,
    /// Base URL prefixed onto object keys when building the public file URL.
    pub public_base_url: String,
    /// How often the expiry sweep runs. Zero disables the sweep.
    pub sweep_interval_secs: u64,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Resumable chunked upload relay")]
pub struct Args {
    /// Host to bind to (overrides UPLOAD_RELAY_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides UPLOAD_RELAY_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Directory where parts and assembled objects are stored (overrides UPLOAD_RELAY_STORAGE_DIR)
    #[arg(long)]
    pub storage_dir: Option<String>,

    /// Database URL (overrides UPLOAD_RELAY_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Public base URL for completed objects (overrides UPLOAD_RELAY_PUBLIC_BASE_URL)
    #[arg(long)]
    pub public_base_url: Option<String>,

    /// Expiry sweep interval in seconds, 0 to disable (overrides UPLOAD_RELAY_SWEEP_INTERVAL_SECS)
    #[arg(long)]
    pub sweep_interval_secs: Option<u64>,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig.
    pub fn from_env_and_args() -> Result<Self> {
        // Parse CLI once
        let args = Args::parse();

        // --- Environment fallback ---
        let env_host = env::var("UPLOAD_RELAY_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = match env::var("UPLOAD_RELAY_PORT") {
            Ok(value) => value
                .parse::<u16>()
                .with_context(|| format!("parsing UPLOAD_RELAY_PORT value `{}`", value))?,
            Err(env::VarError::NotPresent) => 3000,
            Err(err) => return Err(err).context("reading UPLOAD_RELAY_PORT"),
        };
        let env_storage =
            env::var("UPLOAD_RELAY_STORAGE_DIR").unwrap_or_else(|_| "./data/objects".into());
        let env_db = env::var("UPLOAD_RELAY_DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://./data/meta/upload_relay.db".into());
        let env_public_base = env::var("UPLOAD_RELAY_PUBLIC_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:3000/files".into());
        let env_sweep = match env::var("UPLOAD_RELAY_SWEEP_INTERVAL_SECS") {
            Ok(value) => value.parse::<u64>().with_context(|| {
                format!("parsing UPLOAD_RELAY_SWEEP_INTERVAL_SECS value `{}`", value)
            })?,
            Err(env::VarError::NotPresent) => 3600,
            Err(err) => return Err(err).context("reading UPLOAD_RELAY_SWEEP_INTERVAL_SECS"),
        };

        // --- Merge ---
        let cfg = Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            storage_dir: args.storage_dir.unwrap_or(env_storage),
            database_url: args.database_url.unwrap_or(env_db),
            public_base_url: args
                .public_base_url
                .unwrap_or(env_public_base)
                .trim_end_matches('/')
                .to_string(),
            sweep_interval_secs: args.sweep_interval_secs.unwrap_or(env_sweep),
        };

        Ok(cfg)
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
