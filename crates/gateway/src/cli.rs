//! Command-line interface and config loading.

use clap::{Parser, Subcommand};

use vox_domain::config::{Config, ConfigSeverity};

#[derive(Debug, Parser)]
#[command(name = "voxrelay", about = "Voice-chat relay gateway")]
pub struct Cli {
    /// Path to the TOML config file.
    #[arg(long, default_value = "voxrelay.toml")]
    pub config: String,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the gateway server (default).
    Serve,
    /// Inspect or validate configuration.
    Config(ConfigCommand),
    /// Print the version.
    Version,
}

#[derive(Debug, Parser)]
pub struct ConfigCommand {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Check the config file and report issues.
    Validate,
    /// Print the effective config (defaults applied).
    Show,
}

/// Load the config file, falling back to defaults when it does not exist.
pub fn load_config(path: &str) -> anyhow::Result<Config> {
    if !std::path::Path::new(path).exists() {
        tracing::info!(path = %path, "config file not found, using defaults");
        return Ok(Config::default());
    }
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("reading {path}: {e}"))?;
    let config: Config =
        toml::from_str(&raw).map_err(|e| anyhow::anyhow!("parsing {path}: {e}"))?;
    Ok(config)
}

/// `config validate`: print every issue; exit non-zero on errors.
pub fn validate(config: &Config, path: &str) -> bool {
    let issues = config.validate();
    if issues.is_empty() {
        println!("{path}: OK");
        return true;
    }
    for issue in &issues {
        println!("{issue}");
    }
    !issues
        .iter()
        .any(|i| i.severity == ConfigSeverity::Error)
}

/// `config show`: dump the effective config as TOML.
pub fn show(config: &Config) {
    match toml::to_string_pretty(config) {
        Ok(rendered) => println!("{rendered}"),
        Err(e) => eprintln!("failed to render config: {e}"),
    }
}
