//! Configuration inspection command.

use console::style;

use crate::config::{Config, Settings};

/// Print where configuration came from and the effective settings.
pub fn cmd_config(settings: &Settings, config: &Config) -> anyhow::Result<()> {
    match &config.source_path {
        Some(path) => eprintln!("{} Config file: {}", style("→").cyan(), path.display()),
        None => eprintln!("{} No config file found, using defaults", style("!").yellow()),
    }
    println!("{}", serde_json::to_string_pretty(settings)?);
    Ok(())
}
