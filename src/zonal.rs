//! Zonal statistics over exported composites.
//!
//! Each exported raster becomes one column `{zonal prefix}{YYYYMM}` holding the mean of its
//! first band inside every zone.

use std::collections::HashMap;

use geojson::GeoJson;
use log::warn;

use crate::{
    error::{CompositeError, Result},
    pipeline::{
        export::{ExportRequest, ExportSink},
        variables::VariableFamily,
    },
    raster::{RasterImage, Region},
};

#[derive(Debug, Clone)]
pub struct Zone {
    pub name: String,
    pub region: Region,
}

/// Reads zones from a GeoJSON FeatureCollection, named by their `name` or `NAME` property.
pub fn load_zones(geojson_str: &str) -> Result<Vec<Zone>> {
    let fc = match geojson_str.parse::<GeoJson>()? {
        GeoJson::FeatureCollection(fc) => fc,
        _ => {
            return Err(CompositeError::InvalidRegion(
                "zones must be a FeatureCollection".to_string(),
            ))
        }
    };

    let mut zones = Vec::new();
    for (i, feature) in fc.features.iter().enumerate() {
        let Some(geometry) = &feature.geometry else {
            continue;
        };
        let name = feature
            .properties
            .as_ref()
            .and_then(|p| p.get("name").or_else(|| p.get("NAME")))
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .unwrap_or_else(|| format!("zone_{}", i));

        zones.push(Zone {
            name,
            region: Region::from_geometry(geometry)?,
        });
    }

    Ok(zones)
}

/// Mean of the valid pixels of `band` whose centres lie in `zone`.
pub fn zonal_mean(image: &RasterImage, band: &str, zone: &Region) -> Option<f64> {
    let values = &image.band(band)?.values;
    let inside = zone.pixel_mask(image);

    let (sum, count) = values
        .iter()
        .zip(inside)
        .filter_map(|(v, inside)| if inside { *v } else { None })
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));

    (count > 0).then(|| sum / count as f64)
}

/// Splits `Landsat_LST_2022_01` into `("Landsat_LST", "202201")`.
pub fn split_output_name(name: &str) -> Option<(&str, String)> {
    let (rest, month) = name.rsplit_once('_')?;
    let (prefix, year) = rest.rsplit_once('_')?;
    if year.len() != 4 || !year.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let month: u32 = month.parse().ok()?;

    Some((prefix, format!("{}{:02}", year, month)))
}

#[derive(Debug)]
pub struct ZonalStats {
    zones: Vec<Zone>,
    prefixes: HashMap<String, String>,
    columns: Vec<(String, Vec<Option<f64>>)>,
}

impl ZonalStats {
    pub fn new(zones: Vec<Zone>, families: &[VariableFamily]) -> Self {
        let prefixes = families
            .iter()
            .flat_map(|f| f.variables.iter())
            .map(|v| (v.label_prefix.clone(), v.zonal_prefix.clone()))
            .collect();

        ZonalStats {
            zones,
            prefixes,
            columns: Vec::new(),
        }
    }

    pub fn zone_names(&self) -> Vec<&str> {
        self.zones.iter().map(|z| z.name.as_str()).collect()
    }

    pub fn columns(&self) -> &[(String, Vec<Option<f64>>)] {
        &self.columns
    }
}

impl ExportSink for ZonalStats {
    fn submit(&mut self, request: &ExportRequest) {
        let column = split_output_name(&request.file_name_prefix)
            .and_then(|(prefix, date)| self.prefixes.get(prefix).map(|p| format!("{}{}", p, date)));
        let Some(column) = column else {
            warn!("No zonal column for {}", request.file_name_prefix);
            return;
        };
        let Some(band) = request.image.bands().first() else {
            return;
        };

        let means = self
            .zones
            .iter()
            .map(|zone| zonal_mean(&request.image, &band.name, &zone.region))
            .collect();
        self.columns.push((column, means));
    }
}

// -- Tests -------------------------------------------------------------------
