mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;

use cli::{Cli, Commands};
use commands::{run_enrichment, run_inspect_cache, run_normalize};

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => {
            run_enrichment(args)?;
        }
        Commands::Normalize(args) => {
            run_normalize(args)?;
        }
        Commands::InspectCache(args) => {
            run_inspect_cache(args)?;
        }
    }

    Ok(())
}
