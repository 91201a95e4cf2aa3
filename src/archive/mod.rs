//! Image archive: scenes grouped by dataset, queried through filterable collections.

pub mod record;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::raster::{RasterImage, Region};

pub use record::{assemble, SceneRecord};

/// Source of image collections, keyed by dataset id.
pub trait ImageArchive {
    /// All scenes of a dataset. Unknown datasets give an empty collection.
    fn collection(&self, dataset: &str) -> Collection<'_>;
}

#[derive(Debug, Default)]
/// An archive snapshot held in memory.
pub struct SceneArchive {
    datasets: BTreeMap<String, Vec<RasterImage>>,
}

impl SceneArchive {
    pub fn new() -> Self {
        SceneArchive::default()
    }

    pub fn insert(&mut self, dataset: &str, image: RasterImage) {
        let scenes = self.datasets.entry(dataset.to_string()).or_default();
        scenes.push(image);
        scenes.sort_by(|a, b| a.time_start.cmp(&b.time_start).then(a.id.cmp(&b.id)));
    }

    pub fn datasets(&self) -> impl Iterator<Item = (&str, usize)> {
        self.datasets.iter().map(|(k, v)| (k.as_str(), v.len()))
    }
}

impl FromIterator<(String, RasterImage)> for SceneArchive {
    fn from_iter<I: IntoIterator<Item = (String, RasterImage)>>(iter: I) -> Self {
        let mut archive = SceneArchive::new();
        for (dataset, image) in iter {
            archive.insert(&dataset, image);
        }
        archive
    }
}

impl ImageArchive for SceneArchive {
    fn collection(&self, dataset: &str) -> Collection<'_> {
        Collection::new(
            self.datasets
                .get(dataset)
                .map(|scenes| scenes.iter().collect())
                .unwrap_or_default(),
        )
    }
}

#[derive(Debug, Clone, Default)]
/// A filtered view over archive scenes. Filters never copy pixel data.
pub struct Collection<'a> {
    images: Vec<&'a RasterImage>,
}

impl<'a> Collection<'a> {
    pub fn new(images: Vec<&'a RasterImage>) -> Self {
        Collection { images }
    }

    /// Scenes acquired in `[start, end)`.
    pub fn filter_date(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.filter(|img| img.time_start >= start && img.time_start < end)
    }

    /// Scenes whose footprint intersects the region's bounding box.
    pub fn filter_bounds(&self, region: &Region) -> Self {
        let bounds = region.bounds();
        self.filter(|img| img.bounds().intersects(&bounds))
    }

    /// Scenes whose property `key` equals `value`.
    pub fn filter_eq(&self, key: &str, value: &str) -> Self {
        self.filter(|img| img.property(key) == Some(value))
    }

    fn filter<F: Fn(&RasterImage) -> bool>(&self, keep: F) -> Self {
        Collection {
            images: self.images.iter().copied().filter(|img| keep(img)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a RasterImage> + '_ {
        self.images.iter().copied()
    }
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::raster::GeoTransform;

    fn scene(id: &str, day: u32, origin_x: f64) -> RasterImage {
        let t = Utc.with_ymd_and_hms(2022, 1, day, 0, 0, 0).unwrap();
        RasterImage::new(id, t, 1, 1, GeoTransform::new(origin_x, 1.0, 1.0, -1.0))
    }

    fn archive() -> SceneArchive {
        vec![
            ("L8".to_string(), scene("b", 20, 0.0).with_property("PROCESSING_LEVEL", "L2SP")),
            ("L8".to_string(), scene("a", 2, 0.0).with_property("PROCESSING_LEVEL", "L2SR")),
            ("L8".to_string(), scene("c", 31, 50.0).with_property("PROCESSING_LEVEL", "L2SP")),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn should_keep_scenes_in_time_order() {
        let archive = archive();
        let ids: Vec<&str> = archive.collection("L8").iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn should_give_empty_collection_for_unknown_dataset() {
        assert!(archive().collection("MODIS").is_empty());
    }

    #[test]
    fn should_filter_half_open_dates() {
        let archive = archive();
        let start = Utc.with_ymd_and_hms(2022, 1, 2, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2022, 1, 20, 0, 0, 0).unwrap();
        let filtered = archive.collection("L8").filter_date(start, end);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered.iter().next().unwrap().id, "a");
    }

    #[test]
    fn should_filter_by_property_and_bounds() {
        let archive = archive();
        let region = Region::rectangle(0.0, 0.0, 1.0, 1.0).unwrap();
        let filtered = archive
            .collection("L8")
            .filter_eq("PROCESSING_LEVEL", "L2SP")
            .filter_bounds(&region);
        let ids: Vec<&str> = filtered.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["b"]);
    }
}
