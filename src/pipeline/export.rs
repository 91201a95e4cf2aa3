//! Export units and their hand-off to a delivery sink.

use log::debug;

use crate::raster::{RasterImage, Region};

use super::{
    variables::{VariableSpec, VisParams},
    PipelineConfig,
};

pub const EXPORT_CRS: &str = "EPSG:4326";
/// Pixel ceiling per request, large enough never to truncate a region.
pub const MAX_PIXELS: u64 = 10_000_000_000_000;

#[derive(Debug, Clone, PartialEq)]
/// A composite that passed the availability gate.
pub struct ExportUnit {
    pub label: String,
    pub image: RasterImage,
    pub output_name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExportRequest {
    pub image: RasterImage,
    pub description: String,
    pub file_name_prefix: String,
    pub folder: String,
    pub scale: f64,
    pub region: Region,
    pub crs: &'static str,
    pub max_pixels: u64,
    /// Preview hint, carried along for consumers of the export.
    pub vis: VisParams,
}

/// Delivery mechanism for export requests.
///
/// Submission is fire-and-forget: a sink deals with its own failures.
pub trait ExportSink {
    fn submit(&mut self, request: &ExportRequest);
}

impl<S: ExportSink + ?Sized> ExportSink for &mut S {
    fn submit(&mut self, request: &ExportRequest) {
        (**self).submit(request)
    }
}

impl<A: ExportSink, B: ExportSink> ExportSink for (A, B) {
    fn submit(&mut self, request: &ExportRequest) {
        self.0.submit(request);
        self.1.submit(request);
    }
}

impl<S: ExportSink> ExportSink for Option<S> {
    fn submit(&mut self, request: &ExportRequest) {
        if let Some(sink) = self {
            sink.submit(request);
        }
    }
}

pub fn build_request(unit: ExportUnit, spec: &VariableSpec, config: &PipelineConfig) -> ExportRequest {
    ExportRequest {
        image: unit.image,
        description: unit.output_name.clone(),
        file_name_prefix: unit.output_name,
        folder: config.folder.clone(),
        scale: spec.scale,
        region: config.region.clone(),
        crs: EXPORT_CRS,
        max_pixels: MAX_PIXELS,
        vis: spec.vis.clone(),
    }
}

pub fn dispatch<S: ExportSink>(
    unit: ExportUnit,
    spec: &VariableSpec,
    config: &PipelineConfig,
    sink: &mut S,
) {
    debug!("Submitting {} for window {}", unit.output_name, unit.label);
    let request = build_request(unit, spec, config);
    sink.submit(&request);
}

#[cfg(test)]
#[derive(Debug, Default)]
/// Keeps every request it is given.
pub struct MemorySink {
    pub requests: Vec<ExportRequest>,
}

#[cfg(test)]
impl ExportSink for MemorySink {
    fn submit(&mut self, request: &ExportRequest) {
        self.requests.push(request.clone());
    }
}

// -- Tests -------------------------------------------------------------------
