mod archive;
mod cli;
mod deserialise;
mod download;
mod error;
mod parquet;
mod pipeline;
mod raster;
mod zonal;

use anyhow::{Error, Result};
use clap::Parser;
use cli::{command, Cli, Commands};
use env_logger::Env;

#[tokio::main]
async fn main() -> Result<(), Error> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level)).init();

    let result = match cli.command {
        Commands::Export {
            region,
            start,
            end,
            archive,
            folder,
            families,
            output_dir,
            zones,
        } => {
            command::export(command::ExportArgs {
                region,
                start,
                end,
                archive,
                folder,
                families,
                output_dir,
                zones,
            })
            .await
        }
        Commands::Windows { start, end } => command::windows(start, end),
    };

    match result {
        Ok(summary) => println!("{}", summary),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }

    Ok(())
}
