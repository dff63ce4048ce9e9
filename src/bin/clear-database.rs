use anyhow::Context;
use std::path::PathBuf;
use vehicles_service::config::{Config, DatabaseBackend};
use vehicles_service::storage::SqliteStorage;

fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = Config::load(config_path.as_deref()).context("loading configuration")?;

    if config.database.backend != DatabaseBackend::Sqlite {
        println!("Database backend is not sqlite; nothing to clear.");
        return Ok(());
    }

    println!(
        "WARNING: This will delete ALL catalog data from {}",
        config.database.path.display()
    );
    println!("Press Enter to continue or Ctrl+C to cancel...");
    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;

    let storage = SqliteStorage::open(&config.database.path)?;
    storage.clear_all_data()?;

    println!("Database cleared.");
    Ok(())
}
