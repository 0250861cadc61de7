pub mod config;
pub mod pid;
pub mod sessions;

use anyhow::Context;
use clap::{Parser, Subcommand};

use sr_domain::config::Config;

/// SessionRelay: a multiplexing session manager for a messaging transport.
#[derive(Debug, Parser)]
#[command(name = "sessionrelay", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the relay server (default when no subcommand is given).
    Serve,
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Inspect persisted session records without starting the server.
    #[command(subcommand)]
    Sessions(SessionsCommand),
    /// Print version information.
    Version,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Parse the config file and report any errors.
    Validate,
    /// Dump the resolved configuration (with defaults) as TOML.
    Show,
}

#[derive(Debug, Subcommand)]
pub enum SessionsCommand {
    /// List persisted session records.
    List {
        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },
}

// ── Config loading helper ─────────────────────────────────────────────

/// Load the configuration from the path in `SR_CONFIG` (or `config.toml`).
/// A missing file yields the defaults. Returns the config and the path used.
pub fn load_config() -> anyhow::Result<(Config, String)> {
    let config_path = std::env::var("SR_CONFIG").unwrap_or_else(|_| "config.toml".into());
    let config = load_config_from(&config_path)?;
    Ok((config, config_path))
}

pub fn load_config_from(path: &str) -> anyhow::Result<Config> {
    if !std::path::Path::new(path).exists() {
        return Ok(Config::default());
    }
    let raw = std::fs::read_to_string(path).with_context(|| format!("reading {path}"))?;
    toml::from_str(&raw).with_context(|| format!("parsing {path}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn missing_file_gives_defaults() {
        let config = load_config_from("/nonexistent/sessionrelay.toml").unwrap();
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn file_values_override_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[server]\nport = 8088\n[sessions]\nsend_pacing_secs = 5\n").unwrap();

        let config = load_config_from(path.to_str().unwrap()).unwrap();
        assert_eq!(config.server.port, 8088);
        assert_eq!(config.sessions.send_pacing_secs, 5);
        assert_eq!(config.sessions.reconnect.max_attempts, 5);
    }

    #[test]
    fn broken_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[server\n").unwrap();
        assert!(load_config_from(path.to_str().unwrap()).is_err());
    }
}
