//! Command-line arguments for the `mediascope` binary.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::Parser;
use std::path::PathBuf;

use mediascope_core::config::MediascopeConfig;

/// Mediascope - query-by-example search over crawled images and audio.
#[derive(Parser, Debug)]
#[command(name = "mediascope", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// API server port.
    #[arg(short = 'p', long = "port")]
    pub port: Option<u16>,

    /// SQLite database file.
    #[arg(short = 'd', long = "database")]
    pub database: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,
}

impl CliArgs {
    /// Priority: --config flag > MEDIASCOPE_CONFIG env var > ./mediascope.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("MEDIASCOPE_CONFIG") {
            return PathBuf::from(p);
        }
        PathBuf::from("mediascope.toml")
    }

    /// Priority: --port flag > MEDIASCOPE_PORT env var > config file value.
    pub fn resolve_port(&self, config_port: u16) -> u16 {
        if let Some(p) = self.port {
            return p;
        }
        if let Ok(val) = std::env::var("MEDIASCOPE_PORT") {
            if let Ok(p) = val.parse::<u16>() {
                return p;
            }
        }
        config_port
    }

    /// Fold the command-line overrides into a loaded configuration.
    pub fn apply(&self, config: &mut MediascopeConfig) {
        config.server.port = self.resolve_port(config.server.port);
        if let Some(ref db) = self.database {
            config.storage.database_path = db.to_string_lossy().to_string();
        }
        if let Some(ref level) = self.log_level {
            config.general.log_level = level.clone();
        }
    }
}
