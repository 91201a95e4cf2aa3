//! Window reduction: collapsing the scenes of one month into a composite.

use chrono::{DateTime, Utc};

use crate::{
    error::{CompositeError, Result},
    raster::{Band, Expr, GeoTransform, RasterImage, Region},
};

use super::window::MonthWindow;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Per-pixel aggregate over the valid observations at that pixel.
pub enum Reducer {
    Mean,
    Sum,
    Min,
    Max,
    Median,
}

impl Reducer {
    /// `None` when there are no observations.
    pub fn reduce(&self, values: &mut [f64]) -> Option<f64> {
        if values.is_empty() {
            return None;
        }

        let n = values.len();
        let value = match self {
            Reducer::Mean => values.iter().sum::<f64>() / n as f64,
            Reducer::Sum => values.iter().sum(),
            Reducer::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
            Reducer::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            Reducer::Median => {
                values.sort_by(|a, b| a.total_cmp(b));
                if n % 2 == 1 {
                    values[n / 2]
                } else {
                    (values[n / 2 - 1] + values[n / 2]) / 2.0
                }
            }
        };

        Some(value)
    }
}

#[derive(Debug, Clone)]
/// Description of a monthly composite. Nothing is computed until [`Composite::materialize`].
pub struct Composite<'a> {
    id: String,
    time_start: DateTime<Utc>,
    band: String,
    reducer: Reducer,
    region: &'a Region,
    scenes: Vec<&'a RasterImage>,
    post: Option<Expr>,
}

#[derive(Debug, Clone)]
pub struct Materialized {
    pub image: RasterImage,
    /// Number of scenes that went into the composite.
    pub source_count: usize,
}

impl<'a> Composite<'a> {
    pub fn new(
        id: &str,
        window: &MonthWindow,
        band: &str,
        reducer: Reducer,
        region: &'a Region,
    ) -> Self {
        Composite {
            id: id.to_string(),
            time_start: window.start,
            band: band.to_string(),
            reducer,
            region,
            scenes: Vec::new(),
            post: None,
        }
    }

    pub fn with_scenes<I: IntoIterator<Item = &'a RasterImage>>(mut self, scenes: I) -> Self {
        self.scenes.extend(scenes);
        self
    }

    /// Expression applied to the reduced band, referring to it by its own name.
    pub fn then(mut self, post: Expr) -> Self {
        self.post = Some(post);
        self
    }

    /// Reduces, post-processes and clips the composite.
    ///
    /// The result lists the band only if at least one pixel inside the region is valid; a
    /// window without scenes gives an image with no bands at all.
    pub fn materialize(&self) -> Result<Materialized> {
        let first = match self.scenes.first() {
            Some(first) => *first,
            None => {
                let image = RasterImage::new(&self.id, self.time_start, 0, 0, GeoTransform::default())
                    .with_property("month_label", &self.id);
                return Ok(Materialized {
                    image,
                    source_count: 0,
                });
            }
        };

        let mut sources = Vec::with_capacity(self.scenes.len());
        for scene in &self.scenes {
            if !scene.same_grid(first) {
                return Err(CompositeError::GridMismatch {
                    image: scene.id.clone(),
                    width: first.width,
                    height: first.height,
                    found_width: scene.width,
                    found_height: scene.height,
                });
            }
            sources.push(&scene.require_band(&self.band)?.values);
        }

        let mut observations = Vec::with_capacity(sources.len());
        let reduced: Vec<Option<f64>> = (0..first.pixel_count())
            .map(|i| {
                observations.clear();
                observations.extend(sources.iter().filter_map(|values| values[i]));
                self.reducer.reduce(&mut observations)
            })
            .collect();

        let mut composite = RasterImage::new(
            &self.id,
            self.time_start,
            first.width,
            first.height,
            first.transform,
        )
        .with_property("month_label", &self.id)
        .with_band(&self.band, reduced)?;

        if let Some(post) = &self.post {
            let values = post.evaluate(&composite)?;
            composite.add_band(Band::new(&self.band, values))?;
        }

        let mut image = self.region.clip(&composite);
        image.retain_bands(|band| band.valid_count() > 0);

        Ok(Materialized {
            image,
            source_count: self.scenes.len(),
        })
    }
}

// -- Tests -------------------------------------------------------------------
