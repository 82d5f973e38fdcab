mod config;

use std::sync::{Arc, Mutex};

use anyhow::{Context, bail};
use clap::Parser;
use pharmadir_api::AppState;
use pharmadir_store::DuckStore;
use pharmadir_sync::{Collector, Geocoder, NominatimGeocoder, default_sources};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::{Cli, CollectArgs, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    info!("pharmadir v{}", env!("CARGO_PKG_VERSION"));

    let store = DuckStore::open_persistent(&cli.db)
        .with_context(|| format!("opening database {}", cli.db.display()))?;

    match cli.command {
        Command::Serve { bind } => {
            let state = AppState::new(store, build_collector(&cli.collect)?);
            pharmadir_api::serve(bind, state)
                .await
                .with_context(|| format!("serving on {bind}"))?;
        }
        Command::Collect { force } => {
            let existing = store.count()?;
            if existing > 0 && !force {
                bail!("{existing} pharmacies already stored; pass --force to collect anyway");
            }
            let collector = build_collector(&cli.collect)?;
            let report = collector.run(Arc::new(Mutex::new(store))).await;
            println!("{}", serde_json::to_string_pretty(&report)?);
            if !report.success {
                bail!(report.error.unwrap_or(report.message));
            }
        }
        Command::Stats => {
            println!("{}", serde_json::to_string_pretty(&store.stats()?)?);
        }
    }
    Ok(())
}

fn build_collector(args: &CollectArgs) -> anyhow::Result<Collector> {
    let backend = NominatimGeocoder::new(&args.geocoder_url, args.geocoder_timeout())
        .context("building geocoder client")?;
    let geocoder = Geocoder::new(Arc::new(backend), args.city_suffix.clone());
    Ok(Collector::new(default_sources(), geocoder).with_pacing(args.pacing()))
}
