//! Print the month windows of a time span.

use anyhow::Result;
use chrono::NaiveDate;

use crate::pipeline::window::{partition, TimeSpan};

pub fn windows(start: NaiveDate, end: NaiveDate) -> Result<String> {
    let span = TimeSpan::from_dates(start, end)?;
    let windows = partition(&span);

    for window in &windows {
        println!(
            "{}  {} .. {}",
            window.label,
            window.start.format("%Y-%m-%d"),
            window.end.format("%Y-%m-%d")
        );
    }

    Ok(format!("{} month windows", windows.len()))
}

// -- Tests -------------------------------------------------------------------
