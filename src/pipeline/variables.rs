//! Exported variables and the source families that feed them.

use crate::{
    error::{CompositeError, Result},
    raster::{Expr, ImageExpr},
};

use super::{
    derive::modis_vegetation,
    reduce::Reducer,
    transform::{kelvin_to_celsius, landsat_lst, modis_lst},
};

pub const LANDSAT_8_L2: &str = "LANDSAT/LC08/C02/T1_L2";
pub const MODIS_VEGETATION: &str = "MODIS/061/MOD13Q1";
pub const MODIS_LST: &str = "MODIS/061/MOD11A2";
pub const ERA5_LAND_MONTHLY: &str = "ECMWF/ERA5_LAND/MONTHLY_AGGR";

#[derive(Debug, Clone, PartialEq)]
/// Display range for previews.
pub struct VisParams {
    pub min: f64,
    pub max: f64,
    pub palette: Vec<String>,
}

impl VisParams {
    pub fn new(min: f64, max: f64, palette: &[&str]) -> Self {
        VisParams {
            min,
            max,
            palette: palette.iter().map(|c| c.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VariableSpec {
    pub output_band: String,
    pub label_prefix: String,
    pub reducer: Reducer,
    /// Ground sample distance in metres.
    pub scale: f64,
    pub vis: VisParams,
    pub post_reduce: Option<Expr>,
    /// Column prefix used for zonal statistics.
    pub zonal_prefix: String,
}

impl VariableSpec {
    fn new(output_band: &str, label_prefix: &str, reducer: Reducer, scale: f64, vis: VisParams) -> Self {
        VariableSpec {
            output_band: output_band.to_string(),
            label_prefix: label_prefix.to_string(),
            reducer,
            scale,
            vis,
            post_reduce: None,
            zonal_prefix: String::new(),
        }
    }

    fn zonal(mut self, prefix: &str) -> Self {
        self.zonal_prefix = prefix.to_string();
        self
    }

    fn then(mut self, post: Expr) -> Self {
        self.post_reduce = Some(post);
        self
    }

    /// `{prefix}_{YYYY_MM}`.
    pub fn output_name(&self, month_label: &str) -> String {
        format!("{}_{}", self.label_prefix, month_label)
    }
}

#[derive(Debug, Clone, PartialEq)]
/// One archive query and the variables composited from it.
pub struct VariableFamily {
    pub name: String,
    pub dataset: String,
    pub property_filters: Vec<(String, String)>,
    pub filter_bounds: bool,
    /// Applied to every scene before reduction. `None` reduces the raw bands.
    pub transform: Option<ImageExpr>,
    pub variables: Vec<VariableSpec>,
}

pub const FAMILY_NAMES: [&str; 4] = ["landsat", "modis", "modis-lst", "era5"];

impl VariableFamily {
    pub fn landsat_lst() -> Self {
        VariableFamily {
            name: "landsat".to_string(),
            dataset: LANDSAT_8_L2.to_string(),
            property_filters: vec![("PROCESSING_LEVEL".to_string(), "L2SP".to_string())],
            filter_bounds: true,
            transform: Some(landsat_lst()),
            variables: vec![VariableSpec::new(
                "LST_C",
                "Landsat_LST",
                Reducer::Mean,
                30.0,
                VisParams::new(20.0, 45.0, &["blue", "green", "yellow", "red"]),
            )
            .zonal("LLST")],
        }
    }

    pub fn modis_vegetation() -> Self {
        VariableFamily {
            name: "modis".to_string(),
            dataset: MODIS_VEGETATION.to_string(),
            property_filters: vec![],
            filter_bounds: false,
            transform: Some(modis_vegetation()),
            variables: vec![
                VariableSpec::new(
                    "NDVI",
                    "MODIS_NDVI",
                    Reducer::Mean,
                    250.0,
                    VisParams::new(0.0, 1.0, &["white", "green"]),
                )
                .zonal("NDVI"),
                VariableSpec::new(
                    "EVI",
                    "MODIS_EVI",
                    Reducer::Mean,
                    250.0,
                    VisParams::new(0.0, 1.0, &["white", "blue"]),
                )
                .zonal("EVI_"),
                VariableSpec::new(
                    "NDWI",
                    "MODIS_NDWI",
                    Reducer::Mean,
                    250.0,
                    VisParams::new(-1.0, 1.0, &["brown", "white", "blue"]),
                )
                .zonal("NDWI"),
            ],
        }
    }

    pub fn modis_lst() -> Self {
        VariableFamily {
            name: "modis-lst".to_string(),
            dataset: MODIS_LST.to_string(),
            property_filters: vec![],
            filter_bounds: false,
            transform: Some(modis_lst()),
            variables: vec![VariableSpec::new(
                "LST_C",
                "MODIS_LST",
                Reducer::Mean,
                1000.0,
                VisParams::new(0.0, 50.0, &["blue", "cyan", "green", "yellow", "red"]),
            )
            .zonal("MLST")],
        }
    }

    pub fn era5() -> Self {
        let temperature_palette = [
            "000080", "0000d9", "4000ff", "8000ff", "0080ff", "00ffff", "00ff80", "80ff00",
            "daff00", "ffff00", "fff500", "ffda00", "ffb000", "ffa400", "ff4f00", "ff2500",
            "ff0a00", "ff00ff",
        ];

        VariableFamily {
            name: "era5".to_string(),
            dataset: ERA5_LAND_MONTHLY.to_string(),
            property_filters: vec![],
            filter_bounds: true,
            transform: None,
            variables: vec![
                VariableSpec::new(
                    "temperature_2m",
                    "ERA5_Temp",
                    Reducer::Mean,
                    1000.0,
                    VisParams::new(0.0, 50.0, &temperature_palette),
                )
                .then(kelvin_to_celsius("temperature_2m"))
                .zonal("Temp"),
                VariableSpec::new(
                    "total_precipitation_sum",
                    "ERA5_Precip",
                    Reducer::Sum,
                    1000.0,
                    VisParams::new(0.0, 1.0, &["ffffff", "87ceeb", "4682b4", "00008b"]),
                )
                .zonal("Prcp"),
            ],
        }
    }

    pub fn by_name(name: &str) -> Result<Self> {
        match name {
            "landsat" => Ok(VariableFamily::landsat_lst()),
            "modis" => Ok(VariableFamily::modis_vegetation()),
            "modis-lst" => Ok(VariableFamily::modis_lst()),
            "era5" => Ok(VariableFamily::era5()),
            _ => Err(CompositeError::UnknownFamily(name.to_string())),
        }
    }

    pub fn all() -> Vec<Self> {
        FAMILY_NAMES
            .iter()
            .filter_map(|name| VariableFamily::by_name(name).ok())
            .collect()
    }
}

// -- Tests -------------------------------------------------------------------
