//! In-memory raster images: named bands over a north-up grid, with explicit no-data.

pub mod expr;
pub mod region;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::error::{CompositeError, Result};

pub use expr::{Expr, ImageExpr};
pub use region::Region;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
/// Affine placement of a grid. `pixel_height` is negative for north-up rasters.
pub struct GeoTransform {
    pub origin_x: f64,
    pub origin_y: f64,
    pub pixel_width: f64,
    pub pixel_height: f64,
}

impl GeoTransform {
    pub fn new(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        GeoTransform {
            origin_x,
            origin_y,
            pixel_width,
            pixel_height,
        }
    }

    /// Geographic coordinates `(x, y)` of the centre of a pixel.
    pub fn pixel_centre(&self, row: usize, col: usize) -> (f64, f64) {
        let x = self.origin_x + (col as f64 + 0.5) * self.pixel_width;
        let y = self.origin_y + (row as f64 + 0.5) * self.pixel_height;
        (x, y)
    }

    pub fn bounds(&self, width: usize, height: usize) -> Bounds {
        let x0 = self.origin_x;
        let x1 = self.origin_x + width as f64 * self.pixel_width;
        let y0 = self.origin_y;
        let y1 = self.origin_y + height as f64 * self.pixel_height;

        Bounds {
            min_x: x0.min(x1),
            min_y: y0.min(y1),
            max_x: x0.max(x1),
            max_y: y0.max(y1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Bounds {
    pub fn intersects(&self, other: &Bounds) -> bool {
        self.min_x <= other.max_x
            && other.min_x <= self.max_x
            && self.min_y <= other.max_y
            && other.min_y <= self.max_y
    }
}

#[derive(Debug, Clone, PartialEq)]
/// A single band. `None` marks a no-data pixel.
pub struct Band {
    pub name: String,
    pub values: Vec<Option<f64>>,
}

impl Band {
    pub fn new(name: &str, values: Vec<Option<f64>>) -> Self {
        Band {
            name: name.to_string(),
            values,
        }
    }

    pub fn valid_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_some()).count()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RasterImage {
    pub id: String,
    pub time_start: DateTime<Utc>,
    pub width: usize,
    pub height: usize,
    pub transform: GeoTransform,
    pub properties: BTreeMap<String, String>,
    bands: Vec<Band>,
}

impl RasterImage {
    pub fn new(
        id: &str,
        time_start: DateTime<Utc>,
        width: usize,
        height: usize,
        transform: GeoTransform,
    ) -> Self {
        RasterImage {
            id: id.to_string(),
            time_start,
            width,
            height,
            transform,
            properties: BTreeMap::new(),
            bands: Vec::new(),
        }
    }

    /// An image with the same id, time and grid but no bands or properties.
    pub fn empty_like(&self) -> Self {
        RasterImage::new(
            &self.id,
            self.time_start,
            self.width,
            self.height,
            self.transform,
        )
    }

    pub fn with_band(mut self, name: &str, values: Vec<Option<f64>>) -> Result<Self> {
        self.add_band(Band::new(name, values))?;
        Ok(self)
    }

    pub fn with_property(mut self, key: &str, value: &str) -> Self {
        self.properties.insert(key.to_string(), value.to_string());
        self
    }

    /// Adds a band, replacing any existing band of the same name.
    pub fn add_band(&mut self, band: Band) -> Result<()> {
        if band.values.len() != self.pixel_count() {
            return Err(CompositeError::BandLength {
                band: band.name,
                expected: self.pixel_count(),
                found: band.values.len(),
            });
        }

        match self.bands.iter_mut().find(|b| b.name == band.name) {
            Some(existing) => *existing = band,
            None => self.bands.push(band),
        }

        Ok(())
    }

    pub fn bands(&self) -> &[Band] {
        &self.bands
    }

    pub fn band_names(&self) -> Vec<&str> {
        self.bands.iter().map(|b| b.name.as_str()).collect()
    }

    pub fn band(&self, name: &str) -> Option<&Band> {
        self.bands.iter().find(|b| b.name == name)
    }

    pub fn require_band(&self, name: &str) -> Result<&Band> {
        self.band(name).ok_or_else(|| CompositeError::MissingBand {
            band: name.to_string(),
            image: self.id.clone(),
        })
    }

    /// Keeps only the bands for which `keep` returns true.
    pub fn retain_bands<F: FnMut(&Band) -> bool>(&mut self, keep: F) {
        self.bands.retain(keep);
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(|v| v.as_str())
    }

    pub fn pixel_count(&self) -> usize {
        self.width * self.height
    }

    pub fn bounds(&self) -> Bounds {
        self.transform.bounds(self.width, self.height)
    }

    pub fn same_grid(&self, other: &RasterImage) -> bool {
        self.width == other.width && self.height == other.height && self.transform == other.transform
    }
}

// -- Tests -------------------------------------------------------------------
