//! Command-line interface.

use clap::{Parser, Subcommand};

use cr_domain::config::Config;

/// ChatRelay — a chat-agent turn gateway.
#[derive(Debug, Parser)]
#[command(name = "chatrelay", version, about)]
pub struct Cli {
    /// Path to the config file.
    #[arg(long, default_value = "config.toml", global = true)]
    pub config: String,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the gateway server (default when no subcommand is given).
    Serve,
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
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

/// Load the TOML config. A missing file is not an error: every field has a
/// default, so the server can boot bare.
pub fn load_config(path: &str) -> anyhow::Result<Config> {
    match std::fs::read_to_string(path) {
        Ok(raw) => {
            let config: Config = toml::from_str(&raw)
                .map_err(|e| anyhow::anyhow!("parsing {path}: {e}"))?;
            Ok(config)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!(path, "config file not found, using defaults");
            Ok(Config::default())
        }
        Err(e) => Err(anyhow::anyhow!("reading {path}: {e}")),
    }
}

/// `config show` — print the resolved config with defaults applied.
pub fn show_config(config: &Config) -> anyhow::Result<()> {
    println!("{}", toml::to_string_pretty(config)?);
    Ok(())
}
