mod cli;
mod display;
mod error;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, RunCommand};
use compass::config::Config;
use log::debug;

const DEFAULT_LOGGING_LEVEL: &str = "info";

fn main() -> Result<()> {
    // Set RUST_LOG to `DEFAULT_LOGGING_LEVEL` if not set
    let _ =
        std::env::var("RUST_LOG").map_err(|_| std::env::set_var("RUST_LOG", DEFAULT_LOGGING_LEVEL));
    pretty_env_logger::init_timed();
    let args = Cli::parse();
    debug!("args: {args:?}");
    let config = read_config(args.config.as_deref())?;
    debug!("config: {config:?}");

    if let Some(command) = args.command {
        command.run(config)?;
    }
    Ok(())
}

/// Default config location, e.g. `~/.config/compass/config.toml` on Linux.
fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("compass").join("config.toml"))
}

/// Read the config file, falling back to defaults when the default location has none. An
/// explicitly given file must exist.
fn read_config(explicit: Option<&Path>) -> Result<Config> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => match default_config_path() {
            Some(path) if path.exists() => path,
            _ => return Ok(Config::default()),
        },
    };
    Config::from_toml_file(&path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))
}
