pub mod export;
pub mod windows;

use std::path::PathBuf;

use anyhow::{anyhow, Result};
pub use export::{export, ExportArgs};
pub use windows::windows;

/// The directory export folders are created in when none is given.
pub fn default_output_dir() -> Result<PathBuf> {
    dirs::home_dir().ok_or_else(|| anyhow!("Could not locate the home directory"))
}
