//! Save the zonal statistics table to a parquet file.

use std::{
    fs::{self, File},
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::Result;
use arrow::{
    array::{ArrayRef, Float64Array, StringArray},
    datatypes::{DataType, Field, Schema},
    record_batch::RecordBatch,
};
use parquet::{arrow::ArrowWriter, file::properties::WriterProperties};

use crate::zonal::ZonalStats;

pub const ZONAL_STATS_FILE: &str = "zonal_stats.parquet";

/// Writes one row per zone and one column per exported composite to `<folder>/zonal_stats.parquet`.
pub fn save_zonal_stats(stats: &ZonalStats, folder: &Path) -> Result<PathBuf> {
    fs::create_dir_all(folder)?;
    let file_path = folder.join(ZONAL_STATS_FILE);
    let file = File::create(&file_path)?;

    // Define the schema for the RecordBatch
    let mut fields = vec![Field::new("zone", DataType::Utf8, false)];
    for (name, _) in stats.columns() {
        fields.push(Field::new(name, DataType::Float64, true));
    }
    let schema = Arc::new(Schema::new(fields));

    let props = WriterProperties::builder()
        .set_compression(parquet::basic::Compression::SNAPPY)
        .build();

    let mut writer = ArrowWriter::try_new(file, schema.clone(), Some(props))?;

    let mut columns: Vec<ArrayRef> = vec![Arc::new(StringArray::from(stats.zone_names()))];
    for (_, means) in stats.columns() {
        columns.push(Arc::new(Float64Array::from(means.clone())));
    }

    let batch = RecordBatch::try_new(schema, columns)?;

    writer.write(&batch)?;

    writer.close()?;

    Ok(file_path)
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use parquet::file::reader::{FileReader, SerializedFileReader};
    use tempfile::TempDir;

    use super::*;
    use crate::{pipeline::variables::VariableFamily, zonal::load_zones};

    #[test]
    fn should_write_one_row_per_zone() {
        let zones = load_zones(
            r#"{"type": "FeatureCollection", "features": [
                {"type": "Feature", "properties": {"name": "Gombe"},
                 "geometry": {"type": "Polygon", "coordinates": [[[0,0],[1,0],[1,1],[0,1],[0,0]]]}},
                {"type": "Feature", "properties": {"name": "Ngaliema"},
                 "geometry": {"type": "Polygon", "coordinates": [[[1,0],[2,0],[2,1],[1,1],[1,0]]]}}
            ]}"#,
        )
        .unwrap();
        let stats = ZonalStats::new(zones, &VariableFamily::all());

        let temp_dir = TempDir::new().unwrap();
        let path = save_zonal_stats(&stats, &temp_dir.path().join("GEE_Kinshasa")).unwrap();

        assert!(path.ends_with("GEE_Kinshasa/zonal_stats.parquet"));
        let reader = SerializedFileReader::new(File::open(&path).unwrap()).unwrap();
        assert_eq!(reader.metadata().file_metadata().num_rows(), 2);
    }
}
