//! Image manifest parsing.
//!
//! Each manifest line is one `@`-separated pose string, for example
//! `37.7512@549333.42@4178819.17@10@S@...`. The whole line is the image key;
//! selected fields carry the latitude prefix, easting, and northing.

use crate::compute::validation::{validate_coordinate, validate_image_key, validate_latitude};
use crate::config::{Coordinate, ManifestLayout};
use crate::error::{GeocellsError, Result};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// One image of the dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRecord {
    /// Canonical identifier joining records across stages
    pub key: String,
    pub coord: Coordinate,
    /// Latitude read from the key's prefix field, if it had one
    pub latitude: Option<f64>,
}

impl ImageRecord {
    pub fn new(key: impl Into<String>, coord: Coordinate) -> Self {
        Self {
            key: key.into(),
            coord,
            latitude: None,
        }
    }

    pub fn with_latitude(mut self, latitude: f64) -> Self {
        self.latitude = Some(latitude);
        self
    }
}

/// Parses manifest lines into [`ImageRecord`]s.
#[derive(Debug, Clone)]
pub struct ManifestParser {
    layout: ManifestLayout,
    require_latitude: bool,
}

impl ManifestParser {
    pub fn new(layout: ManifestLayout) -> Self {
        Self {
            layout,
            require_latitude: false,
        }
    }

    /// Fail lines whose latitude field carries no number.
    pub fn require_latitude(mut self, required: bool) -> Self {
        self.require_latitude = required;
        self
    }

    pub fn parse_line(&self, line: &str) -> Result<ImageRecord> {
        let key = line.trim();
        validate_image_key(key)?;

        let fields: Vec<&str> = key.split('@').collect();
        let field = |index: usize, name: &str| -> Result<f64> {
            let raw = fields.get(index).ok_or_else(|| {
                GeocellsError::InvalidInput(format!(
                    "missing {} field {} ({} fields present)",
                    name,
                    index,
                    fields.len()
                ))
            })?;
            raw.trim().parse::<f64>().map_err(|_| {
                GeocellsError::InvalidInput(format!("{} field is not a number: {:?}", name, raw))
            })
        };

        let coord = Coordinate::new(
            field(self.layout.easting_field, "easting")?,
            field(self.layout.northing_field, "northing")?,
        );
        validate_coordinate(&coord)?;

        let latitude = match fields.get(self.layout.latitude_field) {
            Some(token) => numeric_suffix(token).map_err(GeocellsError::InvalidInput)?,
            None => None,
        };
        match latitude {
            Some(lat) => validate_latitude(lat)?,
            None if self.require_latitude => {
                return Err(GeocellsError::InvalidInput(format!(
                    "no latitude in field {}",
                    self.layout.latitude_field
                )));
            }
            None => {}
        }

        Ok(ImageRecord {
            key: key.to_string(),
            coord,
            latitude,
        })
    }

    /// Read a whole manifest. Blank lines are ignored; any other bad line
    /// aborts the read with its line number.
    ///
    /// With a sample stride of `n`, only every `n`-th non-blank line is kept,
    /// starting with the first; skipped lines are not parsed.
    pub fn read(&self, path: &Path) -> Result<Vec<ImageRecord>> {
        let reader = BufReader::new(File::open(path)?);
        let stride = self.layout.sample_stride.max(1);
        let mut records = Vec::new();
        let mut position = 0usize;

        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let sampled = position % stride == 0;
            position += 1;
            if !sampled {
                continue;
            }
            let record = self.parse_line(&line).map_err(|e| match e {
                GeocellsError::InvalidInput(reason) => GeocellsError::malformed(path, idx + 1, reason),
                other => other,
            })?;
            records.push(record);
        }

        Ok(records)
    }
}

/// The trailing number of a token, e.g. `37.7512` from `db/37.7512`.
///
/// A `-` directly before the number is its sign only at the start of the
/// token or after a separator; `sf-37.75` is rejected rather than read as a
/// southern latitude.
fn numeric_suffix(token: &str) -> std::result::Result<Option<f64>, String> {
    let Some(mut start) = token
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_digit() || *c == '.')
        .last()
        .map(|(i, _)| i)
    else {
        return Ok(None);
    };

    if let Some(head) = token[..start].strip_suffix('-') {
        if head.chars().last().is_some_and(char::is_alphanumeric) {
            return Err(format!(
                "latitude token {:?} has a hyphen that is not a sign",
                token
            ));
        }
        start -= 1;
    }
    Ok(token[start..].parse().ok())
}
