//! Command-line and environment configuration.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use pharmadir_sync::geocode::NOMINATIM_URL;
use pharmadir_sync::{DEFAULT_CITY_SUFFIX, Pacing};

#[derive(Parser, Debug)]
#[command(name = "pharmadir", version, about = "Pharmacy directory service")]
pub struct Cli {
    /// DuckDB database file
    #[arg(long, env = "PHARMADIR_DB", default_value = "pharmacies.duckdb", global = true)]
    pub db: PathBuf,

    #[command(flatten)]
    pub collect: CollectArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve the REST API
    Serve {
        #[arg(long, env = "PHARMADIR_BIND", default_value = "0.0.0.0:5000")]
        bind: SocketAddr,
    },
    /// Run one collection and print its report
    Collect {
        /// Collect even when the database already has rows
        #[arg(long)]
        force: bool,
    },
    /// Print table statistics
    Stats,
}

/// Settings shared by every command that may run a collection.
#[derive(Args, Debug, Clone)]
pub struct CollectArgs {
    /// Nominatim-compatible geocoder base URL
    #[arg(long, env = "PHARMADIR_GEOCODER_URL", default_value = NOMINATIM_URL, global = true)]
    pub geocoder_url: String,

    #[arg(long, default_value_t = 10, global = true)]
    pub geocoder_timeout_secs: u64,

    /// Appended to every address before geocoding
    #[arg(long, default_value = DEFAULT_CITY_SUFFIX, global = true)]
    pub city_suffix: String,

    /// Lower bound of the pause between sources (0 disables pacing)
    #[arg(long, default_value_t = 0, global = true)]
    pub pause_min_ms: u64,

    #[arg(long, default_value_t = 0, global = true)]
    pub pause_max_ms: u64,
}

impl CollectArgs {
    pub fn geocoder_timeout(&self) -> Duration {
        Duration::from_secs(self.geocoder_timeout_secs)
    }

    pub fn pacing(&self) -> Pacing {
        Pacing::between(
            Duration::from_millis(self.pause_min_ms),
            Duration::from_millis(self.pause_max_ms),
        )
    }
}
