//! Downloads and unpacks archive snapshots.

use std::{
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::{Error, Result};
use flate2::read::GzDecoder;
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use tar::Archive;

/// Downloads the file at `url` to `file_path`, reporting bytes on `progress_bar`.
pub async fn download_tar(url: &str, file_path: &Path, progress_bar: &ProgressBar) -> Result<()> {
    let response = reqwest::get(url)
        .await
        .map_err(|e| Error::msg(format!("Failed to download file: {}", e)))?;

    if !response.status().is_success() {
        return Err(Error::msg(format!(
            "Failed to download file: {}",
            response.status()
        )));
    }

    // Switch the spinner to a byte counter once the size is known
    let total_size = response.content_length().unwrap_or(0);
    if total_size > 0 {
        progress_bar.set_length(total_size);
        progress_bar.set_style(
            ProgressStyle::with_template(
                "{msg} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({percent}%) {eta}",
            )?
            .progress_chars("=> "),
        );
    }

    let mut file = File::create(file_path)?;
    let mut downloaded = 0u64;
    let mut stream = response.bytes_stream();

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| Error::msg(format!("Error reading chunk: {}", e)))?;
        file.write_all(&chunk)?;
        downloaded += chunk.len() as u64;
        progress_bar.set_position(downloaded);
    }

    Ok(())
}

/// Extracts the tarball at `tar_gz_path` into `working_dir`.
pub async fn extract_tar(tar_gz_path: &Path, working_dir: &Path) -> Result<()> {
    let tar_gz = File::open(tar_gz_path)?;
    let tar = GzDecoder::new(tar_gz);
    let mut archive = Archive::new(tar);

    archive.unpack(working_dir)?;

    Ok(())
}

/// Returns the folder holding the scene files of an extracted snapshot.
///
/// Snapshots either unpack into a single top-level folder or straight into `working_dir`.
pub fn get_extraction_folder(working_dir: &Path) -> Result<PathBuf> {
    let mut folders = Vec::new();
    for entry in fs::read_dir(working_dir)? {
        let path = entry?.path();
        if path.is_dir() {
            folders.push(path);
        }
    }

    match folders.as_slice() {
        [] => Ok(working_dir.to_path_buf()),
        [folder] => Ok(folder.clone()),
        _ => Err(Error::msg(format!(
            "Expected one folder in snapshot, found {}",
            folders.len()
        ))),
    }
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use flate2::{write::GzEncoder, Compression};
    use tempfile::TempDir;

    use super::*;

    fn make_snapshot(dir: &Path) -> PathBuf {
        let path = dir.join("snapshot.tar.gz");
        let encoder = GzEncoder::new(File::create(&path).unwrap(), Compression::default());
        let mut builder = tar::Builder::new(encoder);

        let content = b"SCENE s1 ERA5 2022-01-01T00:00:00Z 1 1 0 1 1 -1\n";
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, "kinshasa/s1.scene", &content[..])
            .unwrap();
        builder.into_inner().unwrap().finish().unwrap();

        path
    }

    #[tokio::test]
    async fn should_extract_snapshot_folder() {
        let temp_dir = TempDir::new().unwrap();
        let snapshot = make_snapshot(temp_dir.path());
        let working_dir = temp_dir.path().join("extract");
        fs::create_dir(&working_dir).unwrap();

        extract_tar(&snapshot, &working_dir).await.unwrap();
        let folder = get_extraction_folder(&working_dir).unwrap();

        assert!(folder.ends_with("kinshasa"));
        assert!(folder.join("s1.scene").is_file());
    }

    #[test]
    fn should_use_working_dir_for_flat_snapshots() {
        let temp_dir = TempDir::new().unwrap();
        let folder = get_extraction_folder(temp_dir.path()).unwrap();
        assert_eq!(folder, temp_dir.path());
    }

    #[test]
    fn should_reject_ambiguous_snapshots() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir(temp_dir.path().join("a")).unwrap();
        fs::create_dir(temp_dir.path().join("b")).unwrap();
        assert!(get_extraction_folder(temp_dir.path()).is_err());
    }
}
