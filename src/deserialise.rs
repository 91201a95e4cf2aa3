//! Loads a folder of scene files into images.

use std::{
    fs::File,
    io::{self, BufRead},
    path::{Path, PathBuf},
};

use anyhow::{Context, Error, Result};
use futures::future::join_all;

use crate::{
    archive::{assemble, SceneRecord},
    cli::create_progress_bar,
    raster::RasterImage,
};

pub const SCENE_EXTENSION: &str = "scene";

/// Parses every `.scene` file in `scene_dir`, one tokio task per file.
///
/// Returns `(dataset, image)` pairs. A malformed file fails the whole load.
pub async fn load_scenes(scene_dir: &Path) -> Result<Vec<(String, RasterImage)>> {
    let mut files: Vec<PathBuf> = scene_dir
        .read_dir()?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<Vec<_>, io::Error>>()?
        .into_iter()
        .filter(|path| path.extension().is_some_and(|ext| ext == SCENE_EXTENSION))
        .collect();
    files.sort();

    let progress_bar = create_progress_bar(files.len() as u64, "Loading scenes".to_string());

    let tasks: Vec<_> = files
        .into_iter()
        .map(|file| {
            let pb = progress_bar.clone();
            tokio::spawn(async move {
                let scene = process_file(&file)
                    .with_context(|| format!("Failed to load scene file {}", file.display()));
                pb.inc(1);
                scene
            })
        })
        .collect();

    let mut scenes = Vec::new();
    for result in join_all(tasks).await {
        match result {
            Ok(scene) => scenes.push(scene?),
            Err(e) => return Err(Error::msg(format!("Task join error: {:?}", e))),
        }
    }
    progress_bar.finish_with_message("Scenes loaded");

    Ok(scenes)
}

fn process_file(file_path: &Path) -> Result<(String, RasterImage)> {
    let file = File::open(file_path)?;
    let reader = io::BufReader::new(file);

    let mut records = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        records.push(SceneRecord::from_line(line)?);
    }

    Ok(assemble(records)?)
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    #[tokio::test]
    async fn should_load_scene_files() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(
            temp_dir.path().join("a.scene"),
            "# MOD11A2 tile\nSCENE a MODIS/061/MOD11A2 2022-01-09T00:00:00Z 2 1 15 -4 0.01 -0.01\nBAND LST_Day_1km 0 15000 -9999\n",
        )
        .unwrap();
        fs::write(
            temp_dir.path().join("b.scene"),
            "SCENE b MODIS/061/MOD11A2 2022-01-17T00:00:00Z 2 1 15 -4 0.01 -0.01\n\nBAND LST_Day_1km 0 15100 15200\n",
        )
        .unwrap();
        fs::write(temp_dir.path().join("README.md"), "not a scene").unwrap();

        let scenes = load_scenes(temp_dir.path()).await.unwrap();

        assert_eq!(scenes.len(), 2);
        assert_eq!(scenes[0].0, "MODIS/061/MOD11A2");
        assert_eq!(scenes[0].1.id, "a");
        assert_eq!(
            scenes[0].1.band("LST_Day_1km").unwrap().values,
            vec![Some(15000.0), None]
        );
    }

    #[tokio::test]
    async fn should_fail_on_malformed_scene() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("bad.scene"), "BAND LST_Day_1km 0 1 2\n").unwrap();

        let err = load_scenes(temp_dir.path()).await.unwrap_err();
        assert!(err.to_string().contains("bad.scene"));
    }
}
