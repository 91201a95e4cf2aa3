//! Writes export requests to parquet files, one row per valid pixel.

use std::{
    fs::{self, File},
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{anyhow, Result};
use arrow::{
    array::{ArrayRef, Float64Array, UInt32Array},
    datatypes::{DataType, Field, Schema},
    record_batch::RecordBatch,
};
use log::{debug, error};
use parquet::{
    arrow::ArrowWriter,
    file::{metadata::KeyValue, properties::WriterProperties},
};

use crate::pipeline::export::{ExportRequest, ExportSink};

/// Delivers export requests as parquet files under `<output_dir>/<folder>/`.
pub struct ParquetSink {
    output_dir: PathBuf,
    written: Vec<PathBuf>,
    failures: Vec<String>,
}

impl ParquetSink {
    pub fn new(output_dir: &Path) -> Self {
        ParquetSink {
            output_dir: output_dir.to_path_buf(),
            written: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }

    pub fn failures(&self) -> &[String] {
        &self.failures
    }
}

impl ExportSink for ParquetSink {
    fn submit(&mut self, request: &ExportRequest) {
        match save_export(request, &self.output_dir) {
            Ok(path) => {
                debug!("Wrote {}", path.display());
                self.written.push(path);
            }
            Err(e) => {
                error!("Export of {} failed: {}", request.file_name_prefix, e);
                self.failures
                    .push(format!("{}: {}", request.file_name_prefix, e));
            }
        }
    }
}

pub fn save_export(request: &ExportRequest, output_dir: &Path) -> Result<PathBuf> {
    let image = &request.image;
    if image.pixel_count() as u64 > request.max_pixels {
        return Err(anyhow!(
            "{} pixels exceed the ceiling of {}",
            image.pixel_count(),
            request.max_pixels
        ));
    }

    let folder = output_dir.join(&request.folder);
    fs::create_dir_all(&folder)?;
    let file_path = folder.join(format!("{}.parquet", request.file_name_prefix));
    let file = File::create(&file_path)?;

    // Define the schema: pixel position, then one column per band
    let mut fields = vec![
        Field::new("row", DataType::UInt32, false),
        Field::new("col", DataType::UInt32, false),
        Field::new("lon", DataType::Float64, false),
        Field::new("lat", DataType::Float64, false),
    ];
    for band in image.bands() {
        fields.push(Field::new(&band.name, DataType::Float64, true));
    }
    let schema = Arc::new(Schema::new(fields));

    let metadata = vec![
        KeyValue::new("description".to_string(), request.description.clone()),
        KeyValue::new("folder".to_string(), request.folder.clone()),
        KeyValue::new("crs".to_string(), request.crs.to_string()),
        KeyValue::new("scale".to_string(), request.scale.to_string()),
        KeyValue::new("max_pixels".to_string(), request.max_pixels.to_string()),
        KeyValue::new("time_start".to_string(), image.time_start.to_rfc3339()),
        KeyValue::new("region".to_string(), request.region.to_geojson()),
        KeyValue::new("vis_min".to_string(), request.vis.min.to_string()),
        KeyValue::new("vis_max".to_string(), request.vis.max.to_string()),
        KeyValue::new("palette".to_string(), request.vis.palette.join(",")),
    ];
    let props = WriterProperties::builder()
        .set_compression(parquet::basic::Compression::SNAPPY)
        .set_key_value_metadata(Some(metadata))
        .build();

    let mut writer = ArrowWriter::try_new(file, schema.clone(), Some(props))?;

    // Only pixels with at least one valid band are kept
    let pixels: Vec<usize> = (0..image.pixel_count())
        .filter(|&i| image.bands().iter().any(|b| b.values[i].is_some()))
        .collect();

    let mut rows = Vec::with_capacity(pixels.len());
    let mut cols = Vec::with_capacity(pixels.len());
    let mut lons = Vec::with_capacity(pixels.len());
    let mut lats = Vec::with_capacity(pixels.len());
    for &i in &pixels {
        let (row, col) = (i / image.width, i % image.width);
        let (lon, lat) = image.transform.pixel_centre(row, col);
        rows.push(row as u32);
        cols.push(col as u32);
        lons.push(lon);
        lats.push(lat);
    }

    let mut columns: Vec<ArrayRef> = vec![
        Arc::new(UInt32Array::from(rows)),
        Arc::new(UInt32Array::from(cols)),
        Arc::new(Float64Array::from(lons)),
        Arc::new(Float64Array::from(lats)),
    ];
    for band in image.bands() {
        let values: Vec<Option<f64>> = pixels.iter().map(|&i| band.values[i]).collect();
        columns.push(Arc::new(Float64Array::from(values)));
    }

    let batch = RecordBatch::try_new(schema, columns)?;
    writer.write(&batch)?;
    writer.close()?;

    Ok(file_path)
}

// -- Tests -------------------------------------------------------------------
