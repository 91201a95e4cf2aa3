//! Spectral indices derived from corrected reflectance bands.

use crate::raster::{Expr, ImageExpr};

use super::transform::modis_scaled;

/// Normalised difference water index, `(nir - swir) / (nir + swir)`.
///
/// Pixels where `nir + swir == 0` are no-data.
pub fn ndwi(nir: Expr, swir: Expr) -> Expr {
    nir.normalized_difference(swir)
}

/// NDVI, EVI and NDWI from one MOD13Q1 scene, stacked into a single image.
pub fn modis_vegetation() -> ImageExpr {
    let nir = modis_scaled("sur_refl_b02");
    let swir = modis_scaled("sur_refl_b07");

    ImageExpr::new()
        .band("NDVI", modis_scaled("NDVI"))
        .band("EVI", modis_scaled("EVI"))
        .band("NDWI", ndwi(nir, swir))
}

// -- Tests -------------------------------------------------------------------
