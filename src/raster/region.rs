//! Region of interest: one or more polygons that every output is clipped to.

use geo_types::{Coord, LineString, Polygon};
use geojson::{GeoJson, Geometry, Value};

use crate::error::{CompositeError, Result};

use super::{Bounds, RasterImage};

#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    polygons: Vec<Polygon<f64>>,
}

impl Region {
    pub fn new(polygons: Vec<Polygon<f64>>) -> Result<Self> {
        if polygons.is_empty() {
            return Err(CompositeError::InvalidRegion(
                "region has no polygons".to_string(),
            ));
        }
        if let Some(p) = polygons.iter().find(|p| p.exterior().0.len() < 4) {
            return Err(CompositeError::InvalidRegion(format!(
                "polygon exterior has {} coordinates, need at least 3 distinct",
                p.exterior().0.len()
            )));
        }

        Ok(Region { polygons })
    }

    /// Axis-aligned rectangle, handy for quick regions.
    pub fn rectangle(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Result<Self> {
        let exterior = LineString::from(vec![
            (min_x, min_y),
            (max_x, min_y),
            (max_x, max_y),
            (min_x, max_y),
            (min_x, min_y),
        ]);
        Region::new(vec![Polygon::new(exterior, vec![])])
    }

    /// Reads a region from GeoJSON. Every polygon of every feature joins the region.
    pub fn from_geojson(geojson_str: &str) -> Result<Self> {
        let geojson: GeoJson = geojson_str.parse()?;

        let mut polygons = Vec::new();
        match geojson {
            GeoJson::FeatureCollection(fc) => {
                for feature in fc.features {
                    if let Some(geometry) = feature.geometry {
                        polygons.extend(convert_geometry(&geometry)?);
                    }
                }
            }
            GeoJson::Feature(f) => {
                if let Some(geometry) = f.geometry {
                    polygons.extend(convert_geometry(&geometry)?);
                }
            }
            GeoJson::Geometry(g) => polygons.extend(convert_geometry(&g)?),
        }

        Region::new(polygons)
    }

    pub fn from_geometry(geometry: &Geometry) -> Result<Self> {
        Region::new(convert_geometry(geometry)?)
    }

    /// Even-odd containment test; points inside a hole are outside the region.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        self.polygons.iter().any(|p| {
            ring_contains(p.exterior(), x, y)
                && !p.interiors().iter().any(|hole| ring_contains(hole, x, y))
        })
    }

    pub fn bounds(&self) -> Bounds {
        let mut bounds = Bounds {
            min_x: f64::INFINITY,
            min_y: f64::INFINITY,
            max_x: f64::NEG_INFINITY,
            max_y: f64::NEG_INFINITY,
        };
        for c in self.polygons.iter().flat_map(|p| p.exterior().0.iter()) {
            bounds.min_x = bounds.min_x.min(c.x);
            bounds.min_y = bounds.min_y.min(c.y);
            bounds.max_x = bounds.max_x.max(c.x);
            bounds.max_y = bounds.max_y.max(c.y);
        }

        bounds
    }

    /// Per-pixel flags, true where the pixel centre lies inside the region.
    pub fn pixel_mask(&self, image: &RasterImage) -> Vec<bool> {
        let mut mask = Vec::with_capacity(image.pixel_count());
        for row in 0..image.height {
            for col in 0..image.width {
                let (x, y) = image.transform.pixel_centre(row, col);
                mask.push(self.contains(x, y));
            }
        }

        mask
    }

    /// Sets every pixel outside the region to no-data, in all bands.
    pub fn clip(&self, image: &RasterImage) -> RasterImage {
        let mask = self.pixel_mask(image);
        let mut clipped = image.clone();
        for band in clipped.bands.iter_mut() {
            for (value, inside) in band.values.iter_mut().zip(&mask) {
                if !inside {
                    *value = None;
                }
            }
        }

        clipped
    }

    pub fn to_geojson(&self) -> String {
        let rings = |p: &Polygon<f64>| {
            std::iter::once(p.exterior())
                .chain(p.interiors())
                .map(|ring| ring.0.iter().map(|c| vec![c.x, c.y]).collect())
                .collect::<Vec<Vec<Vec<f64>>>>()
        };
        let value = Value::MultiPolygon(self.polygons.iter().map(rings).collect());

        GeoJson::Geometry(Geometry::new(value)).to_string()
    }
}

fn convert_geometry(geometry: &Geometry) -> Result<Vec<Polygon<f64>>> {
    match &geometry.value {
        Value::Polygon(rings) => Ok(convert_rings(rings).into_iter().collect()),
        Value::MultiPolygon(polygons) => {
            Ok(polygons.iter().filter_map(|rings| convert_rings(rings)).collect())
        }
        Value::GeometryCollection(geometries) => {
            let mut polygons = Vec::new();
            for g in geometries {
                polygons.extend(convert_geometry(g)?);
            }
            Ok(polygons)
        }
        _ => Err(CompositeError::InvalidRegion(
            "expected Polygon or MultiPolygon geometry".to_string(),
        )),
    }
}

fn convert_rings(rings: &[Vec<Vec<f64>>]) -> Option<Polygon<f64>> {
    let to_line = |ring: &Vec<Vec<f64>>| {
        LineString::new(ring.iter().map(|c| Coord { x: c[0], y: c[1] }).collect())
    };

    let (exterior, holes) = rings.split_first()?;
    Some(Polygon::new(to_line(exterior), holes.iter().map(to_line).collect()))
}

fn ring_contains(ring: &LineString<f64>, x: f64, y: f64) -> bool {
    let pts = &ring.0;
    if pts.len() < 3 {
        return false;
    }

    let mut inside = false;
    let mut j = pts.len() - 1;
    for i in 0..pts.len() {
        let (xi, yi) = (pts[i].x, pts[i].y);
        let (xj, yj) = (pts[j].x, pts[j].y);
        if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }

    inside
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::raster::GeoTransform;

    const TRIANGLE: &str = r#"{
        "type": "FeatureCollection",
        "features": [{
            "type": "Feature",
            "properties": {"name": "roi"},
            "geometry": {"type": "Polygon", "coordinates": [[[0,0],[4,0],[0,4],[0,0]]]}
        }]
    }"#;

    #[test]
    fn should_parse_feature_collection() {
        let region = Region::from_geojson(TRIANGLE).unwrap();
        assert!(region.contains(1.0, 1.0));
        assert!(!region.contains(3.0, 3.0));
    }

    #[test]
    fn should_exclude_holes() {
        let geojson = r#"{"type": "Polygon", "coordinates": [
            [[0,0],[10,0],[10,10],[0,10],[0,0]],
            [[4,4],[6,4],[6,6],[4,6],[4,4]]
        ]}"#;
        let region = Region::from_geojson(geojson).unwrap();
        assert!(region.contains(2.0, 2.0));
        assert!(!region.contains(5.0, 5.0));
    }

    #[test]
    fn should_reject_point_geometry() {
        let err = Region::from_geojson(r#"{"type": "Point", "coordinates": [1, 2]}"#).unwrap_err();
        assert!(matches!(err, CompositeError::InvalidRegion(_)));
    }

    #[test]
    fn should_reject_bad_json() {
        assert!(matches!(
            Region::from_geojson("not json"),
            Err(CompositeError::GeoJson(_))
        ));
    }

    #[test]
    fn should_clip_pixels_outside() {
        let t = Utc.with_ymd_and_hms(2022, 1, 1, 0, 0, 0).unwrap();
        let img = RasterImage::new("img", t, 2, 2, GeoTransform::new(0.0, 2.0, 1.0, -1.0))
            .with_band("B", vec![Some(1.0); 4])
            .unwrap();
        // Only the left column's centres (x = 0.5) fall inside.
        let region = Region::rectangle(0.0, 0.0, 1.0, 2.0).unwrap();

        let clipped = region.clip(&img);
        assert_eq!(
            clipped.band("B").unwrap().values,
            vec![Some(1.0), None, Some(1.0), None]
        );
    }

    #[test]
    fn should_round_trip_through_geojson() {
        let region = Region::rectangle(15.0, -4.6, 15.6, -4.2).unwrap();
        let again = Region::from_geojson(&region.to_geojson()).unwrap();
        assert_eq!(region.bounds(), again.bounds());
    }
}
