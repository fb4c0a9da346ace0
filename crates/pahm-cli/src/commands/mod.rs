pub mod config;
pub mod recovery;
pub mod session;
pub mod tally;

pub type CliResult = Result<(), Box<dyn std::error::Error>>;
