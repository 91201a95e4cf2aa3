//! Build the monthly composites from an archive snapshot and export them.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use log::info;
use tempfile::TempDir;

use crate::{
    archive::SceneArchive,
    cli::create_spinner,
    deserialise::load_scenes,
    download::{download_tar, extract_tar, get_extraction_folder},
    parquet::{save_zonal_stats, ParquetSink},
    pipeline::{
        variables::VariableFamily, window::TimeSpan, Outcome, Pipeline, PipelineConfig,
    },
    raster::Region,
    zonal::{load_zones, ZonalStats},
};

use super::default_output_dir;

pub struct ExportArgs {
    pub region: PathBuf,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub archive: String,
    pub folder: String,
    pub families: Vec<String>,
    pub output_dir: Option<PathBuf>,
    pub zones: Option<PathBuf>,
}

pub async fn export(args: ExportArgs) -> Result<String> {
    let region_json = fs::read_to_string(&args.region)
        .with_context(|| format!("Failed to read region {}", args.region.display()))?;
    let region = Region::from_geojson(&region_json)?;
    let span = TimeSpan::from_dates(args.start, args.end)?;
    let families = select_families(&args.families)?;
    let output_dir = match args.output_dir {
        Some(dir) => dir,
        None => default_output_dir()?,
    };

    let tmp_dir = TempDir::new()?;
    let scene_dir = locate_archive(&args.archive, tmp_dir.path()).await?;
    let archive: SceneArchive = load_scenes(&scene_dir).await?.into_iter().collect();
    for (dataset, count) in archive.datasets() {
        info!("{}: {} scenes", dataset, count);
    }

    let mut stats = match &args.zones {
        Some(path) => {
            let zones_json = fs::read_to_string(path)
                .with_context(|| format!("Failed to read zones {}", path.display()))?;
            Some(ZonalStats::new(load_zones(&zones_json)?, &families))
        }
        None => None,
    };

    let pipeline = Pipeline::new(PipelineConfig {
        region,
        span,
        folder: args.folder.clone(),
    });
    let mut parquet = ParquetSink::new(&output_dir);

    let bar = create_spinner(format!(
        "Compositing {} families over {} windows...",
        families.len(),
        pipeline.windows().len()
    ));
    let report = pipeline.run(&archive, &families, &mut (&mut parquet, &mut stats));
    bar.finish_with_message("Composites built");

    for family in &families {
        let (exported, skipped) = report
            .decisions
            .iter()
            .filter(|d| d.family == family.name)
            .fold((0, 0), |(exported, skipped), d| match d.outcome {
                Outcome::Exported => (exported + 1, skipped),
                Outcome::Skipped(_) => (exported, skipped + 1),
                Outcome::Failed(_) => (exported, skipped),
            });
        info!("{}: {} exported, {} skipped", family.name, exported, skipped);
    }

    let folder = output_dir.join(&args.folder);
    if let Some(stats) = &stats {
        let path = save_zonal_stats(stats, &folder)?;
        info!("Zonal statistics saved to {}", path.display());
    }

    let mut failed: Vec<String> = report
        .failed()
        .map(|d| match &d.outcome {
            Outcome::Failed(reason) => format!("{} {}: {}", d.family, d.label, reason),
            _ => format!("{} {}", d.family, d.label),
        })
        .collect();
    failed.extend(parquet.failures().iter().cloned());
    if !failed.is_empty() {
        return Err(anyhow!(
            "{} exports failed ({} written to `{}`): {}",
            failed.len(),
            parquet.written().len(),
            folder.display(),
            failed.join("; ")
        ));
    }

    Ok(format!(
        "{} exported, {} skipped, files in `{}`",
        report.exported().count(),
        report.skipped().count(),
        folder.display()
    ))
}

fn select_families(names: &[String]) -> Result<Vec<VariableFamily>> {
    if names.is_empty() {
        return Ok(VariableFamily::all());
    }

    let families = names
        .iter()
        .map(|name| VariableFamily::by_name(name))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(families)
}

/// Resolves `archive` to a folder of scene files, downloading or unpacking snapshots into `temp_dir`.
async fn locate_archive(archive: &str, temp_dir: &Path) -> Result<PathBuf> {
    if archive.starts_with("http://") || archive.starts_with("https://") {
        let file_name = archive
            .rsplit('/')
            .next()
            .filter(|name| !name.is_empty())
            .unwrap_or("snapshot.tar.gz");
        let file_path = temp_dir.join(file_name);

        let bar = create_spinner("Downloading archive snapshot...".to_string());
        download_tar(archive, &file_path, &bar).await?;
        bar.finish_with_message("Archive snapshot downloaded");

        return extract_archive(&file_path, temp_dir).await;
    }

    let path = PathBuf::from(archive);
    if path.is_dir() {
        Ok(path)
    } else if path.is_file() {
        extract_archive(&path, temp_dir).await
    } else {
        Err(anyhow!("Archive `{}` not found", archive))
    }
}

async fn extract_archive(snapshot: &Path, temp_dir: &Path) -> Result<PathBuf> {
    let working_dir = temp_dir.join("snapshot");
    fs::create_dir_all(&working_dir)?;

    let bar = create_spinner("Unpacking archive snapshot...".to_string());
    extract_tar(snapshot, &working_dir).await?;
    bar.finish_with_message("Archive snapshot unpacked");

    get_extraction_folder(&working_dir)
}

// -- Tests -------------------------------------------------------------------
