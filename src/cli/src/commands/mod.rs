//! CLI definition and dispatch.

mod lock;

use clap::{ArgAction, Parser};

pub use lock::LockArgs;

/// A3S Lock - pin Dockerfile base images to registry digests.
#[derive(Parser)]
#[command(name = "a3s-lock", version, about)]
pub struct Cli {
    #[command(flatten)]
    pub lock: LockArgs,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

/// Log filter for a `-v` repeat count.
pub fn log_level(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Run the parsed command line.
pub async fn dispatch(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    lock::execute(cli.lock, cli.verbose > 0).await
}
