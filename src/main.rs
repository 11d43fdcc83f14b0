mod aggregator;
mod bot;
mod coingecko;
mod coinmarketcap;
mod config;
mod poll;
mod providers;
mod resolver;
mod store;
mod telegram;
mod utils;

use anyhow::Result;
use clap::Parser;

use crate::{config::Settings, store::SqliteStore};

#[derive(Debug, Parser)]
#[command(name = "marketbot", version)]
struct Cli {
    /// Override SQLITE_PATH
    #[arg(long)]
    sqlite_path: Option<String>,
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    env_logger::init();

    let cli = Cli::parse();
    let mut settings = Settings::load()?;
    if let Some(p) = cli.sqlite_path {
        settings.sqlite_path = p;
    }

    let store = SqliteStore::new(&settings.sqlite_path)?;
    store.init_db()?;

    log::info!(
        "app.start sqlite={} coingecko={} coinmarketcap={}",
        store.path(),
        settings.coingecko_base_url,
        settings.cmc_base_url
    );

    bot::run(settings, store).await
}
