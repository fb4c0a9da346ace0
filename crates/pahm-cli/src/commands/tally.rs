use clap::Subcommand;
use pahm_core::{AttentionTally, PahmMatrix};
use serde::Serialize;

use super::CliResult;

#[derive(Subcommand)]
pub enum TallyAction {
    /// Project a 9-key JSON tally onto the 3x3 matrix
    Summarize {
        /// e.g. '{"present":8,"likes":2}'
        json: String,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Summary {
    tally: AttentionTally,
    converted: PahmMatrix,
    total: u64,
    present_percentage: Option<u8>,
}

pub fn run(action: TallyAction) -> CliResult {
    match action {
        TallyAction::Summarize { json } => {
            let tally: AttentionTally = serde_json::from_str(&json)?;
            let summary = Summary {
                tally,
                converted: tally.project(),
                total: tally.total(),
                present_percentage: tally.present_percentage(),
            };
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
    }
    Ok(())
}
