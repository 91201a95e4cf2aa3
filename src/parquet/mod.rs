//! Handles serialising and saving data to disk in the _parquet_ file format.

pub mod raster;
pub mod zonal;

pub use raster::ParquetSink;
pub use zonal::save_zonal_stats;
