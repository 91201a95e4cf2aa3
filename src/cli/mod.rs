//! Command line interface.

pub mod command;

use std::{path::PathBuf, time::Duration};

use chrono::NaiveDate;
use clap::{builder::PossibleValuesParser, command, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use crate::pipeline::variables::FAMILY_NAMES;

#[derive(Parser)]
#[command(version, about, long_about = None)]
/// Contains the commands
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build and export monthly composites
    Export {
        /// GeoJSON file with the region of interest
        #[arg(short, long)]
        region: PathBuf,

        /// First day of the time span
        #[arg(short, long, default_value = "2022-01-01")]
        start: NaiveDate,

        /// End of the time span, exclusive
        #[arg(short, long, default_value = "2023-12-31")]
        end: NaiveDate,

        /// Scene folder, `.tar.gz` snapshot or snapshot URL
        #[arg(short, long)]
        archive: String,

        /// Folder the exports are written to
        #[arg(short, long, default_value = "GEE_Kinshasa")]
        folder: String,

        /// Variable families to export, all when omitted
        #[arg(long = "family", value_parser = PossibleValuesParser::new(FAMILY_NAMES))]
        families: Vec<String>,

        /// Directory holding the export folder, home when omitted
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// GeoJSON FeatureCollection of zones for zonal statistics
        #[arg(short, long)]
        zones: Option<PathBuf>,
    },
    /// List the month windows of a time span
    Windows {
        #[arg(short, long, default_value = "2022-01-01")]
        start: NaiveDate,

        #[arg(short, long, default_value = "2023-12-31")]
        end: NaiveDate,
    },
}

/// Creates a spinner.
pub fn create_spinner(message: String) -> ProgressBar {
    let bar = ProgressBar::new_spinner().with_message(message);
    bar.enable_steady_tick(Duration::from_millis(100));

    bar
}

/// Creates a progress bar.
pub fn create_progress_bar(size: u64, message: String) -> ProgressBar {
    ProgressBar::new(size).with_message(message).with_style(
        ProgressStyle::with_template("[{eta_precise}] {bar:40.cyan/blue} {msg}")
            .unwrap()
            .progress_chars("##-"),
    )
}

// -- Tests -------------------------------------------------------------------
