//! The monthly compositing pipeline.
//!
//! For every variable family and every month window: filter the family's collection to the
//! window, correct each scene, reduce to a composite per variable, gate on availability and
//! dispatch what survives. Windows are independent; a failure in one never stops the others.

pub mod derive;
pub mod export;
pub mod gate;
pub mod reduce;
pub mod transform;
pub mod variables;
pub mod window;

use log::{debug, error, info, warn};

use crate::{
    archive::{Collection, ImageArchive},
    error::Result,
    raster::{RasterImage, Region},
};

use export::{dispatch, ExportSink, ExportUnit};
use gate::{Availability, SkipReason};
use reduce::Composite;
use variables::{VariableFamily, VariableSpec};
use window::{partition, MonthWindow, TimeSpan};

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub region: Region,
    pub span: TimeSpan,
    /// Destination folder handed to the sink.
    pub folder: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Exported,
    Skipped(SkipReason),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
/// What happened to one (variable, month) pair.
pub struct Decision {
    pub family: String,
    pub name: String,
    pub label: String,
    pub outcome: Outcome,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct RunReport {
    pub decisions: Vec<Decision>,
}

impl RunReport {
    pub fn exported(&self) -> impl Iterator<Item = &Decision> {
        self.decisions.iter().filter(|d| d.outcome == Outcome::Exported)
    }

    pub fn skipped(&self) -> impl Iterator<Item = &Decision> {
        self.decisions
            .iter()
            .filter(|d| matches!(d.outcome, Outcome::Skipped(_)))
    }

    pub fn failed(&self) -> impl Iterator<Item = &Decision> {
        self.decisions
            .iter()
            .filter(|d| matches!(d.outcome, Outcome::Failed(_)))
    }

    pub fn merge(&mut self, other: RunReport) {
        self.decisions.extend(other.decisions);
    }
}

pub struct Pipeline {
    config: PipelineConfig,
    windows: Vec<MonthWindow>,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        let windows = partition(&config.span);
        Pipeline { config, windows }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn windows(&self) -> &[MonthWindow] {
        &self.windows
    }

    pub fn run<A: ImageArchive, S: ExportSink>(
        &self,
        archive: &A,
        families: &[VariableFamily],
        sink: &mut S,
    ) -> RunReport {
        let mut report = RunReport::default();
        for family in families {
            report.merge(self.run_family(archive, family, sink));
        }

        report
    }

    pub fn run_family<A: ImageArchive, S: ExportSink>(
        &self,
        archive: &A,
        family: &VariableFamily,
        sink: &mut S,
    ) -> RunReport {
        let collection = self.source_collection(archive, family);
        if collection.is_empty() {
            warn!(
                "No {} scenes between {} and {}",
                family.dataset,
                self.config.span.start().date_naive(),
                self.config.span.end().date_naive()
            );
        }

        let mut report = RunReport::default();
        for window in &self.windows {
            let scenes = collection.filter_date(window.start, window.end);

            let corrected = match correct(family, &scenes) {
                Ok(corrected) => corrected,
                Err(e) => {
                    for spec in &family.variables {
                        let name = spec.output_name(&window.label);
                        error!("Failed to correct scenes for {}: {}", name, e);
                        report.decisions.push(decision(family, spec, window, Outcome::Failed(e.to_string())));
                    }
                    continue;
                }
            };
            let window_scenes: Vec<&RasterImage> = match &corrected {
                Some(corrected) => corrected.iter().collect(),
                None => scenes.iter().collect(),
            };

            for spec in &family.variables {
                let outcome = self.composite_variable(spec, window, &window_scenes, sink);
                report.decisions.push(decision(family, spec, window, outcome));
            }
        }

        report
    }

    fn source_collection<'a, A: ImageArchive>(
        &self,
        archive: &'a A,
        family: &VariableFamily,
    ) -> Collection<'a> {
        let mut collection = archive.collection(&family.dataset);
        if family.filter_bounds {
            collection = collection.filter_bounds(&self.config.region);
        }
        for (key, value) in &family.property_filters {
            collection = collection.filter_eq(key, value);
        }

        collection.filter_date(self.config.span.start(), self.config.span.end())
    }

    fn composite_variable<S: ExportSink>(
        &self,
        spec: &VariableSpec,
        window: &MonthWindow,
        scenes: &[&RasterImage],
        sink: &mut S,
    ) -> Outcome {
        let name = spec.output_name(&window.label);

        let mut composite = Composite::new(
            &name,
            window,
            &spec.output_band,
            spec.reducer,
            &self.config.region,
        )
        .with_scenes(scenes.iter().copied());
        if let Some(post) = &spec.post_reduce {
            composite = composite.then(post.clone());
        }

        let materialized = match composite.materialize() {
            Ok(materialized) => materialized,
            Err(e) => {
                error!("Failed to composite {}: {}", name, e);
                return Outcome::Failed(e.to_string());
            }
        };

        debug!(
            "{}: {} scenes, bands {:?}",
            name,
            materialized.source_count,
            materialized.image.band_names()
        );

        match gate::check(&materialized, &spec.output_band) {
            Availability::Available => {
                info!("Exporting: {}", name);
                let unit = ExportUnit {
                    label: window.label.clone(),
                    image: materialized.image,
                    output_name: name,
                };
                dispatch(unit, spec, &self.config, sink);
                Outcome::Exported
            }
            Availability::Unavailable(reason) => {
                warn!("Skipping export for {}: {}", name, reason);
                Outcome::Skipped(reason)
            }
        }
    }
}

/// Applies the family transform to every scene; `None` when the family has no transform.
fn correct(family: &VariableFamily, scenes: &Collection<'_>) -> Result<Option<Vec<RasterImage>>> {
    match &family.transform {
        Some(transform) => {
            debug!(
                "Correcting {} {} scenes into {:?}",
                scenes.len(),
                family.dataset,
                transform.output_bands()
            );
            scenes
                .iter()
                .map(|scene| transform.evaluate(scene))
                .collect::<Result<Vec<_>>>()
                .map(Some)
        }
        None => Ok(None),
    }
}

fn decision(family: &VariableFamily, spec: &VariableSpec, window: &MonthWindow, outcome: Outcome) -> Decision {
    Decision {
        family: family.name.clone(),
        name: spec.output_name(&window.label),
        label: window.label.clone(),
        outcome,
    }
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Utc};

    use super::*;
    use crate::{
        archive::SceneArchive,
        pipeline::{export::MemorySink, variables::*},
        raster::GeoTransform,
    };

    const GRID: (usize, usize) = (2, 2);

    fn config(start: (i32, u32, u32), end: (i32, u32, u32)) -> PipelineConfig {
        PipelineConfig {
            region: Region::rectangle(15.0, -5.0, 16.0, -4.0).unwrap(),
            span: TimeSpan::from_dates(
                NaiveDate::from_ymd_opt(start.0, start.1, start.2).unwrap(),
                NaiveDate::from_ymd_opt(end.0, end.1, end.2).unwrap(),
            )
            .unwrap(),
            folder: "GEE_Kinshasa".to_string(),
        }
    }

    fn scene(id: &str, y: i32, m: u32, d: u32, bands: &[(&str, f64)]) -> RasterImage {
        let t = Utc.with_ymd_and_hms(y, m, d, 10, 0, 0).unwrap();
        let mut image = RasterImage::new(id, t, GRID.0, GRID.1, GeoTransform::new(15.0, -4.0, 0.5, -0.5));
        for (band, value) in bands {
            image = image
                .with_band(band, vec![Some(*value); GRID.0 * GRID.1])
                .unwrap();
        }
        image
    }

    fn landsat(id: &str, m: u32, d: u32, qa: f64) -> (String, RasterImage) {
        (
            LANDSAT_8_L2.to_string(),
            scene(id, 2022, m, d, &[("ST_B10", 44000.0), ("QA_PIXEL", qa)])
                .with_property("PROCESSING_LEVEL", "L2SP"),
        )
    }

    fn names(sink: &MemorySink) -> Vec<String> {
        sink.requests.iter().map(|r| r.file_name_prefix.clone()).collect()
    }

    #[test]
    fn should_export_january_and_skip_february() {
        let archive: SceneArchive = vec![landsat("LC08_a", 1, 14, 0.0)].into_iter().collect();
        let pipeline = Pipeline::new(config((2022, 1, 1), (2022, 3, 1)));
        let mut sink = MemorySink::default();

        let report = pipeline.run(&archive, &[VariableFamily::landsat_lst()], &mut sink);

        assert_eq!(names(&sink), vec!["Landsat_LST_2022_01"]);
        let skipped: Vec<&Decision> = report.skipped().collect();
        assert_eq!(skipped.len(), 1);
        assert_eq!(skipped[0].name, "Landsat_LST_2022_02");
        assert_eq!(skipped[0].outcome, Outcome::Skipped(SkipReason::NoScenes));

        let request = &sink.requests[0];
        assert_eq!(request.image.band_names(), vec!["LST_C"]);
        assert_eq!(request.scale, 30.0);
        assert_eq!(request.folder, "GEE_Kinshasa");
    }

    #[test]
    fn should_skip_month_where_every_pixel_is_cloudy() {
        let archive: SceneArchive = vec![
            landsat("LC08_a", 1, 14, 0b001000 as f64),
            landsat("LC08_b", 1, 30, 0b110000 as f64),
        ]
        .into_iter()
        .collect();
        let pipeline = Pipeline::new(config((2022, 1, 1), (2022, 2, 1)));
        let mut sink = MemorySink::default();

        let report = pipeline.run(&archive, &[VariableFamily::landsat_lst()], &mut sink);

        assert!(sink.requests.is_empty());
        assert_eq!(
            report.decisions[0].outcome,
            Outcome::Skipped(SkipReason::AllMasked)
        );
    }

    #[test]
    fn should_ignore_scenes_that_are_not_l2sp() {
        let (dataset, image) = landsat("LC08_a", 1, 14, 0.0);
        let archive: SceneArchive = vec![(dataset, image.with_property("PROCESSING_LEVEL", "L1TP"))]
            .into_iter()
            .collect();
        let pipeline = Pipeline::new(config((2022, 1, 1), (2022, 2, 1)));
        let mut sink = MemorySink::default();

        pipeline.run(&archive, &[VariableFamily::landsat_lst()], &mut sink);

        assert!(sink.requests.is_empty());
    }

    #[test]
    fn should_gate_sibling_variables_independently() {
        // NIR + SWIR == 0 everywhere, so NDWI is all no-data while NDVI and EVI are fine.
        let bands = [
            ("NDVI", 7000.0),
            ("EVI", 4000.0),
            ("sur_refl_b02", 0.0),
            ("sur_refl_b07", 0.0),
        ];
        let archive: SceneArchive = vec![
            (MODIS_VEGETATION.to_string(), scene("m1", 2022, 1, 1, &bands)),
            (MODIS_VEGETATION.to_string(), scene("m2", 2022, 1, 17, &bands)),
        ]
        .into_iter()
        .collect();
        let pipeline = Pipeline::new(config((2022, 1, 1), (2022, 2, 1)));
        let mut sink = MemorySink::default();

        let report = pipeline.run(&archive, &[VariableFamily::modis_vegetation()], &mut sink);

        assert_eq!(names(&sink), vec!["MODIS_NDVI_2022_01", "MODIS_EVI_2022_01"]);
        let skipped: Vec<&str> = report.skipped().map(|d| d.name.as_str()).collect();
        assert_eq!(skipped, vec!["MODIS_NDWI_2022_01"]);

        let ndvi = &sink.requests[0].image.band("NDVI").unwrap().values;
        assert!(ndvi.iter().all(|v| (v.unwrap() - 0.7).abs() < 1e-9));
    }

    #[test]
    fn should_sum_precipitation_and_convert_temperature() {
        let archive: SceneArchive = vec![
            (
                ERA5_LAND_MONTHLY.to_string(),
                scene("e1", 2022, 1, 1, &[("temperature_2m", 300.0), ("total_precipitation_sum", 0.01)]),
            ),
            (
                ERA5_LAND_MONTHLY.to_string(),
                scene("e2", 2022, 1, 15, &[("temperature_2m", 302.0), ("total_precipitation_sum", 0.02)]),
            ),
        ]
        .into_iter()
        .collect();
        let pipeline = Pipeline::new(config((2022, 1, 1), (2022, 2, 1)));
        let mut sink = MemorySink::default();

        pipeline.run(&archive, &[VariableFamily::era5()], &mut sink);

        assert_eq!(names(&sink), vec!["ERA5_Temp_2022_01", "ERA5_Precip_2022_01"]);
        let temp = &sink.requests[0].image.band("temperature_2m").unwrap().values;
        assert!((temp[0].unwrap() - 27.85).abs() < 1e-9);
        let precip = &sink.requests[1].image.band("total_precipitation_sum").unwrap().values;
        assert!((precip[0].unwrap() - 0.03).abs() < 1e-12);
    }

    #[test]
    fn should_fail_window_loudly_and_continue() {
        let archive: SceneArchive = vec![
            (MODIS_LST.to_string(), scene("bad", 2022, 1, 9, &[("LST_Night_1km", 15000.0)])),
            (MODIS_LST.to_string(), scene("good", 2022, 2, 9, &[("LST_Day_1km", 15000.0)])),
        ]
        .into_iter()
        .collect();
        let pipeline = Pipeline::new(config((2022, 1, 1), (2022, 3, 1)));
        let mut sink = MemorySink::default();

        let report = pipeline.run(&archive, &[VariableFamily::modis_lst()], &mut sink);

        assert_eq!(report.failed().count(), 1);
        assert_eq!(report.failed().next().unwrap().name, "MODIS_LST_2022_01");
        assert_eq!(names(&sink), vec!["MODIS_LST_2022_02"]);
    }

    #[test]
    fn should_never_skip_and_export_the_same_unit() {
        let archive: SceneArchive = vec![landsat("LC08_a", 1, 14, 0.0), landsat("LC08_b", 3, 2, 8.0)]
            .into_iter()
            .collect();
        let pipeline = Pipeline::new(config((2022, 1, 1), (2022, 4, 1)));
        let mut sink = MemorySink::default();

        let report = pipeline.run(&archive, &VariableFamily::all(), &mut sink);

        // 7 variables x 3 months, one decision each.
        assert_eq!(report.decisions.len(), 21);
        let mut names: Vec<&str> = report.decisions.iter().map(|d| d.name.as_str()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), 21);
        assert_eq!(report.exported().count(), sink.requests.len());
    }

    #[test]
    fn should_be_idempotent() {
        let archive: SceneArchive = vec![landsat("LC08_a", 1, 14, 0.0), landsat("LC08_b", 2, 3, 0.0)]
            .into_iter()
            .collect();
        let pipeline = Pipeline::new(config((2022, 1, 1), (2022, 3, 1)));

        let mut first = MemorySink::default();
        let mut second = MemorySink::default();
        let report_a = pipeline.run(&archive, &VariableFamily::all(), &mut first);
        let report_b = pipeline.run(&archive, &VariableFamily::all(), &mut second);

        assert_eq!(report_a, report_b);
        assert_eq!(first.requests, second.requests);
    }
}
