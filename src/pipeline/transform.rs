//! Per-dataset corrections: cloud masking and conversion to physical units.

use crate::raster::{Expr, ImageExpr};

/// QA_PIXEL bits that must be clear for a Landsat pixel to be usable.
pub const LANDSAT_CLOUD_BITS: [u8; 3] = [3, 4, 5];

const LANDSAT_ST_SCALE: f64 = 0.00341802;
const LANDSAT_ST_OFFSET: f64 = 149.0;
const MODIS_REFLECTANCE_SCALE: f64 = 0.0001;
const MODIS_LST_SCALE: f64 = 0.02;
pub const KELVIN_OFFSET: f64 = 273.15;

pub fn landsat_clear_sky() -> Expr {
    Expr::band("QA_PIXEL").bits_clear(&LANDSAT_CLOUD_BITS)
}

/// Cloud-masked Landsat 8 land surface temperature, band `LST_C`.
pub fn landsat_lst() -> ImageExpr {
    let st = Expr::band("ST_B10").update_mask(landsat_clear_sky());
    ImageExpr::new().band("LST_C", st * LANDSAT_ST_SCALE + LANDSAT_ST_OFFSET - KELVIN_OFFSET)
}

/// MODIS integer reflectance or index band scaled to its physical range.
pub fn modis_scaled(band: &str) -> Expr {
    Expr::band(band) * MODIS_REFLECTANCE_SCALE
}

/// MOD11A2 daytime land surface temperature, band `LST_C`.
pub fn modis_lst() -> ImageExpr {
    ImageExpr::new().band(
        "LST_C",
        Expr::band("LST_Day_1km") * MODIS_LST_SCALE - KELVIN_OFFSET,
    )
}

pub fn kelvin_to_celsius(band: &str) -> Expr {
    Expr::band(band) - KELVIN_OFFSET
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::raster::{GeoTransform, RasterImage};

    fn landsat_st_to_celsius(raw: f64) -> f64 {
        raw * LANDSAT_ST_SCALE + LANDSAT_ST_OFFSET - KELVIN_OFFSET
    }

    fn celsius_to_landsat_st(celsius: f64) -> f64 {
        (celsius + KELVIN_OFFSET - LANDSAT_ST_OFFSET) / LANDSAT_ST_SCALE
    }

    fn landsat_scene(st: Vec<Option<f64>>, qa: Vec<Option<f64>>) -> RasterImage {
        let t = Utc.with_ymd_and_hms(2022, 1, 10, 9, 0, 0).unwrap();
        RasterImage::new("LC08", t, st.len(), 1, GeoTransform::new(0.0, 0.0, 1.0, -1.0))
            .with_band("ST_B10", st)
            .unwrap()
            .with_band("QA_PIXEL", qa)
            .unwrap()
    }

    #[test]
    fn should_convert_landsat_digital_numbers() {
        assert!((landsat_st_to_celsius(44000.0) - 26.24288).abs() < 1e-9);
        for raw in [0.0, 1.0, 37_000.0, 44_000.0, 65_535.0] {
            let back = celsius_to_landsat_st(landsat_st_to_celsius(raw));
            assert!((back - raw).abs() < 1e-6, "{} -> {}", raw, back);
        }
    }

    #[test]
    fn should_mask_cloudy_landsat_pixels() {
        let scene = landsat_scene(
            vec![Some(44000.0), Some(44000.0), Some(44000.0), Some(44000.0)],
            vec![Some(0b000000 as f64), Some(0b001000 as f64), Some(0b110000 as f64), Some(0b1000000 as f64)],
        );

        let lst = landsat_lst().evaluate(&scene).unwrap();
        let values = &lst.band("LST_C").unwrap().values;

        assert!((values[0].unwrap() - landsat_st_to_celsius(44000.0)).abs() < 1e-9);
        assert_eq!(values[1], None);
        assert_eq!(values[2], None);
        assert!(values[3].is_some());
        assert_eq!(lst.time_start, scene.time_start);
        assert_eq!(lst.band_names(), vec!["LST_C"]);
    }

    #[test]
    fn should_keep_missing_landsat_pixels_missing() {
        let scene = landsat_scene(vec![None, Some(44000.0)], vec![Some(0.0), None]);
        let lst = landsat_lst().evaluate(&scene).unwrap();
        assert_eq!(lst.band("LST_C").unwrap().values, vec![None, None]);
    }

    #[test]
    fn should_convert_modis_lst() {
        let t = Utc.with_ymd_and_hms(2022, 3, 6, 0, 0, 0).unwrap();
        let scene = RasterImage::new("MOD11A2", t, 1, 1, GeoTransform::default())
            .with_band("LST_Day_1km", vec![Some(15000.0)])
            .unwrap();

        let lst = modis_lst().evaluate(&scene).unwrap();
        assert!((lst.band("LST_C").unwrap().values[0].unwrap() - 26.85).abs() < 1e-9);
    }
}
