//! CLI entry point for cgm-link.

pub mod auth;
pub mod readings;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::CgmConfig;
use crate::error::Result;

/// CGM provider CLI
#[derive(Parser, Debug)]
#[command(name = "cgm-link", version, about = "cgm-link — CGM provider credentials and readings")]
pub struct Cli {
    /// TOML config file; environment variables override its values
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Authentication management
    Auth(AuthArgs),
    /// List glucose readings of a recent window
    Readings(ReadingsArgs),
    /// Show the most recent glucose reading
    Latest,
}

/// Arguments for the `auth` subcommand group.
#[derive(Parser, Debug)]
pub struct AuthArgs {
    #[command(subcommand)]
    pub command: AuthCommands,
}

/// Auth subcommands.
#[derive(Subcommand, Debug)]
pub enum AuthCommands {
    /// Print the provider login URL
    Url {
        /// Opaque value echoed back on the redirect
        #[arg(long)]
        state: Option<String>,
    },
    /// Exchange an authorization code for tokens
    Login {
        /// Code delivered to the redirect URI
        code: String,
    },
    /// Show authentication status
    Status,
    /// Forget stored credentials
    Logout,
}

/// Arguments for the `readings` subcommand.
#[derive(Parser, Debug)]
pub struct ReadingsArgs {
    /// Length of the trailing window, in minutes
    #[arg(short, long, default_value_t = 60)]
    pub minutes: u32,
}

impl Cli {
    /// Parse CLI arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Resolve settings from `--config` (if given) and the environment.
    pub fn load_config(&self) -> Result<CgmConfig> {
        let config = match &self.config {
            Some(path) => CgmConfig::from_file_and_env(path)?,
            None => CgmConfig::from_env()?,
        };
        config.validate()?;
        Ok(config)
    }
}
