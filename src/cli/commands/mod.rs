//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod analyze;
mod config_cmd;
mod scrape;
mod serve;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::{load_settings, Settings};
use crate::error::ScrapeError;

#[derive(Parser)]
#[command(name = "liverates")]
#[command(about = "Live bullion rate extraction")]
#[command(version)]
pub struct Cli {
    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Bind address: port, host, or host:port
        bind: Option<String>,
    },

    /// Scrape rates once and print them
    Scrape {
        /// Page to scrape (defaults to the configured target)
        #[arg(short, long)]
        url: Option<String>,
        /// Skip the cache
        #[arg(long)]
        fresh: bool,
        /// Collect debug output (snippet, table layout, screenshot)
        #[arg(short, long)]
        debug: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Classify a page and list endpoint candidates without rendering it
    Analyze {
        #[arg(short, long)]
        url: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Render a page and dump its DOM structure
    Structure {
        #[arg(short, long)]
        url: Option<String>,
    },

    /// Show effective configuration
    Config,
}

/// Explicit URL, else the configured target.
fn resolve_target(settings: &Settings, url: Option<String>) -> anyhow::Result<String> {
    url.or_else(|| settings.target_url.clone())
        .ok_or_else(|| ScrapeError::MissingTarget.into())
}

/// Run the CLI.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let (settings, config) = load_settings(cli.config.as_deref())
        .await
        .map_err(|e| anyhow::anyhow!(e))?;

    match cli.command {
        Commands::Serve { bind } => {
            serve::cmd_serve(&settings, bind.as_deref().unwrap_or(&settings.bind)).await
        }
        Commands::Scrape {
            url,
            fresh,
            debug,
            json,
        } => {
            let url = resolve_target(&settings, url)?;
            scrape::cmd_scrape(&settings, &url, fresh, debug, json).await
        }
        Commands::Analyze { url, json } => {
            let url = resolve_target(&settings, url)?;
            analyze::cmd_analyze(&settings, &url, json).await
        }
        Commands::Structure { url } => {
            let url = resolve_target(&settings, url)?;
            scrape::cmd_structure(&settings, &url).await
        }
        Commands::Config => config_cmd::cmd_config(&settings, &config),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_scrape_flags_parse() {
        let cli = Cli::try_parse_from([
            "liverates", "-v", "scrape", "--url", "https://rates.example.com/", "--fresh", "--json",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Scrape { url, fresh, debug, json } => {
                assert_eq!(url.as_deref(), Some("https://rates.example.com/"));
                assert!(fresh && json && !debug);
            }
            _ => panic!("expected scrape"),
        }
    }

    #[test]
    fn test_resolve_target_prefers_explicit_url() {
        let settings = Settings {
            target_url: Some("https://configured.example.com/".to_string()),
            ..Default::default()
        };
        assert_eq!(
            resolve_target(&settings, Some("https://cli.example.com/".to_string())).unwrap(),
            "https://cli.example.com/"
        );
        assert_eq!(
            resolve_target(&settings, None).unwrap(),
            "https://configured.example.com/"
        );
        assert!(resolve_target(&Settings::default(), None).is_err());
    }
}
