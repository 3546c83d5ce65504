//! Line formats of the per-bucket stage files.
//!
//! | file | line |
//! |------|------|
//! | centers | `configId, localIndex, easting, northing, radius, radiusSquared` |
//! | images | `easting, northing, imageKey` |
//! | assignments | `configId localIndex imageKey` |
//! | labels | `imageKey (configId localIndex)+` |

use crate::compute::assign::Assignment;
use crate::compute::validation::{validate_coordinate, validate_image_key};
use crate::config::{CellCenter, ClassId, Coordinate};
use crate::error::{GeocellsError, Result};
use crate::manifest::ImageRecord;
use crate::storage::write_atomic;
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

/// One merged label line: an image key and every class it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedLine {
    pub image_key: String,
    pub classes: Vec<ClassId>,
}

impl MergedLine {
    pub fn new(image_key: impl Into<String>, classes: Vec<ClassId>) -> Self {
        Self {
            image_key: image_key.into(),
            classes,
        }
    }

    /// Parse `key c0 i0 c1 i1 ...`. An odd number of values after the key
    /// means the line was corrupted upstream.
    pub fn parse(line: &str) -> std::result::Result<Self, String> {
        let mut tokens = line.split_whitespace();
        let image_key = tokens.next().ok_or("empty line")?;
        let values: Vec<&str> = tokens.collect();
        if values.len() % 2 != 0 {
            return Err(format!(
                "odd number of class values ({}) after image key",
                values.len()
            ));
        }

        let classes = values
            .chunks_exact(2)
            .map(|pair| parse_class(pair[0], pair[1]))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Self::new(image_key, classes))
    }
}

pub fn write_centers(path: &Path, centers: &[CellCenter]) -> Result<()> {
    write_atomic(path, |w| {
        for c in centers {
            writeln!(
                w,
                "{}, {}, {:.2}, {:.2}, {}, {}",
                c.config_id,
                c.local_index,
                c.coord.easting,
                c.coord.northing,
                c.radius,
                c.radius_squared
            )?;
        }
        Ok(())
    })
}

pub fn read_centers(path: &Path) -> Result<Vec<CellCenter>> {
    read_records(path, |line| {
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        let [config_id, local_index, easting, northing, radius, radius_squared] = fields[..]
        else {
            return Err(format!("expected 6 fields, found {}", fields.len()));
        };
        let coord = Coordinate::new(number(easting)?, number(northing)?);
        validate_coordinate(&coord).map_err(|e| e.to_string())?;
        Ok(CellCenter {
            config_id: config_id
                .parse()
                .map_err(|_| format!("bad config id {:?}", config_id))?,
            local_index: local_index
                .parse()
                .map_err(|_| format!("bad center index {:?}", local_index))?,
            coord,
            radius: number(radius)?,
            radius_squared: number(radius_squared)?,
        })
    })
}

pub fn write_images(path: &Path, images: &[ImageRecord]) -> Result<()> {
    write_atomic(path, |w| {
        for image in images {
            writeln!(
                w,
                "{}, {}, {}",
                image.coord.easting, image.coord.northing, image.key
            )?;
        }
        Ok(())
    })
}

pub fn read_images(path: &Path) -> Result<Vec<ImageRecord>> {
    read_records(path, |line| {
        let mut fields = line.splitn(3, ',').map(str::trim);
        let (Some(easting), Some(northing), Some(key)) =
            (fields.next(), fields.next(), fields.next())
        else {
            return Err("expected easting, northing and image key".to_string());
        };
        let coord = Coordinate::new(number(easting)?, number(northing)?);
        validate_coordinate(&coord).map_err(|e| e.to_string())?;
        validate_image_key(key).map_err(|e| e.to_string())?;
        Ok(ImageRecord::new(key, coord))
    })
}

pub fn write_assignments(path: &Path, assignments: &[Assignment<'_>]) -> Result<()> {
    write_atomic(path, |w| {
        for a in assignments {
            writeln!(
                w,
                "{} {} {}",
                a.class_id.config_id, a.class_id.local_index, a.image_key
            )?;
        }
        Ok(())
    })
}

pub fn read_assignments(path: &Path) -> Result<Vec<(ClassId, String)>> {
    read_records(path, parse_assignment)
}

/// Parse `configId localIndex imageKey`; any other token count is an error.
pub fn parse_assignment(line: &str) -> std::result::Result<(ClassId, String), String> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let [config_id, local_index, key] = tokens[..] else {
        return Err(format!(
            "expected configId, centerIndex and image key, found {} values",
            tokens.len()
        ));
    };
    Ok((parse_class(config_id, local_index)?, key.to_string()))
}

pub fn write_merged(path: &Path, lines: &[MergedLine]) -> Result<()> {
    write_atomic(path, |w| {
        for line in lines {
            w.write_all(line.image_key.as_bytes())?;
            for class in &line.classes {
                write!(w, " {} {}", class.config_id, class.local_index)?;
            }
            w.write_all(b"\n")?;
        }
        Ok(())
    })
}

/// Stream a label file line by line without loading it whole.
pub fn for_each_merged<F>(path: &Path, visit: F) -> Result<()>
where
    F: FnMut(MergedLine) -> Result<()>,
{
    for_each_record(path, MergedLine::parse, visit)
}

pub fn read_merged(path: &Path) -> Result<Vec<MergedLine>> {
    read_records(path, MergedLine::parse)
}

fn parse_class(config_id: &str, local_index: &str) -> std::result::Result<ClassId, String> {
    let config_id = config_id
        .parse()
        .map_err(|_| format!("bad config id {:?}", config_id))?;
    let local_index = local_index
        .parse()
        .map_err(|_| format!("bad center index {:?}", local_index))?;
    Ok(ClassId::new(config_id, local_index))
}

fn number(raw: &str) -> std::result::Result<f64, String> {
    raw.parse()
        .map_err(|_| format!("not a number: {:?}", raw))
}

fn read_records<T, P>(path: &Path, parse: P) -> Result<Vec<T>>
where
    P: Fn(&str) -> std::result::Result<T, String>,
{
    let mut records = Vec::new();
    for_each_record(path, parse, |record| {
        records.push(record);
        Ok(())
    })?;
    Ok(records)
}

/// Parse every non-blank line of `path`, reporting failures with their
/// 1-based line number.
pub(crate) fn for_each_record<T, P, V>(path: &Path, parse: P, mut visit: V) -> Result<()>
where
    P: Fn(&str) -> std::result::Result<T, String>,
    V: FnMut(T) -> Result<()>,
{
    let reader = BufReader::new(File::open(path)?);
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record =
            parse(&line).map_err(|reason| GeocellsError::malformed(path, idx + 1, reason))?;
        visit(record)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TilingConfiguration;
    use std::fs;
    use tempfile::TempDir;

    fn expect_malformed(result: Result<impl std::fmt::Debug>, expected_line: usize) {
        match result {
            Err(GeocellsError::MalformedRecord { line, .. }) => assert_eq!(line, expected_line),
            other => panic!("expected malformed record, got {:?}", other),
        }
    }

    #[test]
    fn test_centers_file_layout() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("centers_0.txt");
        let tiling = TilingConfiguration::new(3, 2.0, 15.0, Coordinate::new(10.0, 0.0), 10.0);
        let centers = vec![
            CellCenter::new(&tiling, 0, Coordinate::new(549_333.42, 4_178_819.17)),
            CellCenter::new(&tiling, 1, Coordinate::new(549_373.0, 4_178_819.17)),
        ];

        write_centers(&path, &centers).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(
            text.lines().next().unwrap(),
            "3, 0, 549333.42, 4178819.17, 10, 100"
        );
        assert_eq!(read_centers(&path).unwrap(), centers);
    }

    #[test]
    fn test_centers_wrong_arity() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("centers_0.txt");
        fs::write(&path, "0, 0, 1.0, 2.0, 5, 25\n0, 1, 1.0, 2.0, 5\n").unwrap();
        expect_malformed(read_centers(&path), 2);
    }

    #[test]
    fn test_images_keep_commas_in_key() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("images_0.txt");
        let images = vec![ImageRecord::new("37.75@1.5@2.5@a,b", Coordinate::new(1.5, 2.5))];
        write_images(&path, &images).unwrap();
        assert_eq!(read_images(&path).unwrap(), images);
    }

    #[test]
    fn test_images_reject_bad_coordinate() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("images_0.txt");
        fs::write(&path, "1.0, north, key\n").unwrap();
        expect_malformed(read_images(&path), 1);
    }

    #[test]
    fn test_assignment_lines() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("assignments_0.txt");
        let assignments = vec![
            Assignment {
                class_id: ClassId::new(0, 3),
                image_key: "k1",
            },
            Assignment {
                class_id: ClassId::new(12, 40),
                image_key: "k2",
            },
        ];
        write_assignments(&path, &assignments).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "0 3 k1\n12 40 k2\n");
        assert_eq!(
            read_assignments(&path).unwrap(),
            vec![
                (ClassId::new(0, 3), "k1".to_string()),
                (ClassId::new(12, 40), "k2".to_string())
            ]
        );
    }

    #[test]
    fn test_assignment_line_with_extra_value_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("assignments_0.txt");
        fs::write(&path, "0 3 k1\n0 3 4 k1\n").unwrap();
        expect_malformed(read_assignments(&path), 2);
    }

    #[test]
    fn test_merged_line_parse() {
        let line = MergedLine::parse("key 0 3 1 7").unwrap();
        assert_eq!(line.image_key, "key");
        assert_eq!(line.classes, vec![ClassId::new(0, 3), ClassId::new(1, 7)]);
        assert!(MergedLine::parse("key 0 3 1").is_err());
        assert!(MergedLine::parse("key 0 x").is_err());
    }

    #[test]
    fn test_merged_roundtrip_and_odd_length() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("labels_0.txt");
        let lines = vec![
            MergedLine::new("a", vec![ClassId::new(0, 3), ClassId::new(8, 1)]),
            MergedLine::new("b", vec![ClassId::new(0, 3)]),
        ];
        write_merged(&path, &lines).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "a 0 3 8 1\nb 0 3\n");
        assert_eq!(read_merged(&path).unwrap(), lines);

        fs::write(&path, "a 0 3 8\n").unwrap();
        expect_malformed(read_merged(&path), 1);
    }
}
