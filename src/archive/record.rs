//! Scene file records.
//!
//! A scene file holds one image as whitespace-separated lines:
//!
//! ```text
//! SCENE <id> <dataset> <time_start> <width> <height> <origin_x> <origin_y> <pixel_width> <pixel_height>
//! PROP  <key> <value>
//! BAND  <name> <row> <v0> <v1> ... <v(width-1)>
//! ```
//!
//! `time_start` is RFC 3339. Pixel values of `-9999` are no-data.

use chrono::{DateTime, Utc};

use crate::{
    error::{CompositeError, Result},
    raster::{Band, GeoTransform, RasterImage},
};

const MISSING: f64 = -9999.0;

#[derive(Debug, Clone, PartialEq)]
pub struct SceneHeader {
    pub id: String,
    pub dataset: String,
    pub time_start: DateTime<Utc>,
    pub width: usize,
    pub height: usize,
    pub transform: GeoTransform,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SceneRecord {
    Header(SceneHeader),
    Property { key: String, value: String },
    BandRow {
        band: String,
        row: usize,
        values: Vec<Option<f64>>,
    },
}

impl SceneRecord {
    pub fn from_line(line: &str) -> Result<Self> {
        let fields: Vec<&str> = line.split_whitespace().collect();

        match fields.first() {
            Some(&"SCENE") if fields.len() == 10 => {
                let time_start = DateTime::parse_from_rfc3339(fields[3])
                    .map_err(|e| malformed(line, &e.to_string()))?
                    .with_timezone(&Utc);

                Ok(SceneRecord::Header(SceneHeader {
                    id: fields[1].to_string(),
                    dataset: fields[2].to_string(),
                    time_start,
                    width: parse_field(line, fields[4])?,
                    height: parse_field(line, fields[5])?,
                    transform: GeoTransform::new(
                        parse_field(line, fields[6])?,
                        parse_field(line, fields[7])?,
                        parse_field(line, fields[8])?,
                        parse_field(line, fields[9])?,
                    ),
                }))
            }
            Some(&"PROP") if fields.len() == 3 => Ok(SceneRecord::Property {
                key: fields[1].to_string(),
                value: fields[2].to_string(),
            }),
            Some(&"BAND") if fields.len() >= 3 => {
                let values = fields[3..]
                    .iter()
                    .map(|f| parse_value(line, f))
                    .collect::<Result<Vec<_>>>()?;

                Ok(SceneRecord::BandRow {
                    band: fields[1].to_string(),
                    row: parse_field(line, fields[2])?,
                    values,
                })
            }
            _ => Err(malformed(line, "unrecognised record")),
        }
    }
}

/// Builds one image from the records of a scene file.
///
/// Returns the dataset id alongside the image. Rows that are never given stay no-data.
pub fn assemble(records: Vec<SceneRecord>) -> Result<(String, RasterImage)> {
    let mut records = records.into_iter();
    let header = match records.next() {
        Some(SceneRecord::Header(header)) => header,
        _ => {
            return Err(CompositeError::MalformedRecord(
                "scene must start with a SCENE record".to_string(),
            ))
        }
    };

    let mut image = RasterImage::new(
        &header.id,
        header.time_start,
        header.width,
        header.height,
        header.transform,
    );
    let mut bands: Vec<Band> = Vec::new();

    for record in records {
        match record {
            SceneRecord::Property { key, value } => {
                image.properties.insert(key, value);
            }
            SceneRecord::BandRow { band, row, values } => {
                if row >= header.height || values.len() != header.width {
                    return Err(CompositeError::MalformedRecord(format!(
                        "row {} of band {} in scene {} does not fit {}x{}",
                        row, band, header.id, header.width, header.height
                    )));
                }
                let index = match bands.iter().position(|b| b.name == band) {
                    Some(index) => index,
                    None => {
                        bands.push(Band::new(&band, vec![None; image.pixel_count()]));
                        bands.len() - 1
                    }
                };
                let start = row * header.width;
                bands[index].values[start..start + header.width].copy_from_slice(&values);
            }
            SceneRecord::Header(h) => {
                return Err(CompositeError::MalformedRecord(format!(
                    "second SCENE record `{}` in scene {}",
                    h.id, header.id
                )))
            }
        }
    }

    for band in bands {
        image.add_band(band)?;
    }

    Ok((header.dataset, image))
}

fn parse_field<T: std::str::FromStr>(line: &str, field: &str) -> Result<T> {
    field
        .parse()
        .map_err(|_| malformed(line, &format!("cannot parse `{}`", field)))
}

fn parse_value(line: &str, field: &str) -> Result<Option<f64>> {
    let v: f64 = parse_field(line, field)?;
    Ok(if v == MISSING { None } else { Some(v) })
}

fn malformed(line: &str, reason: &str) -> CompositeError {
    CompositeError::MalformedRecord(format!("{}: {}", reason, line))
}

// -- Tests -------------------------------------------------------------------
