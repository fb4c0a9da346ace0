use clap::Subcommand;
use pahm_core::recovery::RecoveryRecord;
use pahm_core::{Config, RecoverySnapshot, RecoveryStore, SqliteStore};

use super::CliResult;

#[derive(Subcommand)]
pub enum RecoveryAction {
    /// Print the saved record as JSON
    Show,
    /// Delete the saved record
    Clear,
}

pub fn run(action: RecoveryAction) -> CliResult {
    let config = Config::load()?;
    let key = config.recovery.storage_key;
    let mut store = SqliteStore::open_default()?;
    match action {
        RecoveryAction::Show => match store.read(&key)? {
            Some(json) => {
                let snapshot = RecoverySnapshot::from_json(&json)?;
                let record = RecoveryRecord::from(&snapshot);
                println!("{}", serde_json::to_string_pretty(&record)?);
            }
            None => println!("no recovery record"),
        },
        RecoveryAction::Clear => {
            store.remove(&key)?;
            println!("ok");
        }
    }
    Ok(())
}
