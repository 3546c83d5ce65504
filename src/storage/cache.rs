//! The class cache artifact consumed by training.
//!
//! The binary form is a magic header, a version byte, the payload length and a
//! bincode payload, written through a temporary file and renamed into place.
//! A pretty JSON export exists for inspection.

use crate::config::ClassId;
use crate::error::{GeocellsError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

#[cfg(feature = "snapshot")]
pub use binary::CacheFile;

/// Retained classes, grouped per configuration, with their image lists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassCache {
    /// Threshold the cache was built with
    pub min_images_per_class: usize,
    /// Retained classes, indexed by configuration id
    pub classes_per_config: Vec<Vec<ClassId>>,
    /// Image keys of every retained class, in first-seen order
    pub images_per_class: BTreeMap<ClassId, Vec<String>>,
}

impl ClassCache {
    pub fn config_count(&self) -> usize {
        self.classes_per_config.len()
    }

    pub fn class_count(&self) -> usize {
        self.images_per_class.len()
    }

    pub fn classes_of(&self, config_id: u16) -> &[ClassId] {
        self.classes_per_config
            .get(config_id as usize)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn images_of(&self, class_id: &ClassId) -> Option<&[String]> {
        self.images_per_class.get(class_id).map(Vec::as_slice)
    }

    /// Total image entries over all retained classes.
    pub fn image_entries(&self) -> usize {
        self.images_per_class.values().map(Vec::len).sum()
    }

    /// Check the two indexes agree with each other and with the threshold.
    pub fn verify(&self) -> Result<()> {
        let mut listed = 0;
        for (config_id, classes) in self.classes_per_config.iter().enumerate() {
            if classes.is_empty() {
                return Err(GeocellsError::EmptyConfiguration(config_id as u16));
            }
            for class_id in classes {
                if class_id.config_id as usize != config_id {
                    return Err(GeocellsError::InvalidInput(format!(
                        "class {} listed under configuration {}",
                        class_id, config_id
                    )));
                }
                let images = self.images_of(class_id).ok_or_else(|| {
                    GeocellsError::InvalidInput(format!("class {} has no image list", class_id))
                })?;
                if images.len() < self.min_images_per_class {
                    return Err(GeocellsError::InvalidInput(format!(
                        "class {} has {} images, below the threshold of {}",
                        class_id,
                        images.len(),
                        self.min_images_per_class
                    )));
                }
            }
            listed += classes.len();
        }

        if listed != self.images_per_class.len() {
            return Err(GeocellsError::InvalidInput(format!(
                "{} classes have image lists but {} are listed per configuration",
                self.images_per_class.len(),
                listed
            )));
        }
        Ok(())
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn save_json(&self, path: &Path) -> Result<()> {
        crate::storage::write_atomic(path, |w| {
            serde_json::to_writer_pretty(&mut *w, self)?;
            Ok(())
        })
    }

    pub fn load_json(path: &Path) -> Result<Self> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }
}

#[cfg(feature = "snapshot")]
mod binary {
    use super::ClassCache;
    use crate::error::{GeocellsError, Result};
    use crate::storage::write_atomic;
    use std::fs::File;
    use std::io::{BufReader, Read, Write};
    use std::path::{Path, PathBuf};

    const CACHE_MAGIC: &[u8] = b"GEOCELLS_CACHE";
    const CACHE_VERSION: u8 = 1;
    /// Magic, version byte and payload length.
    const HEADER_LEN: u64 = CACHE_MAGIC.len() as u64 + 1 + 8;

    /// Binary cache artifact on disk.
    pub struct CacheFile {
        path: PathBuf,
    }

    impl CacheFile {
        pub fn new<P: AsRef<Path>>(path: P) -> Self {
            Self {
                path: path.as_ref().to_path_buf(),
            }
        }

        pub fn path(&self) -> &Path {
            &self.path
        }

        pub fn exists(&self) -> bool {
            self.path.exists()
        }

        pub fn save(&self, cache: &ClassCache) -> Result<()> {
            let payload = bincode::serialize(cache)?;

            write_atomic(&self.path, |w| {
                w.write_all(CACHE_MAGIC)?;
                w.write_all(&[CACHE_VERSION])?;
                w.write_all(&(payload.len() as u64).to_le_bytes())?;
                w.write_all(&payload)?;
                Ok(())
            })?;
            self.sync_parent_dir()
        }

        pub fn load(&self) -> Result<ClassCache> {
            let file = File::open(&self.path)?;
            let file_len = file.metadata()?.len();
            let mut reader = BufReader::new(file);

            let mut magic = vec![0u8; CACHE_MAGIC.len()];
            read_header(&mut reader, &mut magic)?;
            if magic != CACHE_MAGIC {
                return Err(GeocellsError::InvalidFormat);
            }

            let mut version = [0u8; 1];
            read_header(&mut reader, &mut version)?;
            if version[0] != CACHE_VERSION {
                return Err(GeocellsError::InvalidFormat);
            }

            let mut len = [0u8; 8];
            read_header(&mut reader, &mut len)?;
            let len = u64::from_le_bytes(len);
            if len > file_len.saturating_sub(HEADER_LEN) {
                return Err(GeocellsError::InvalidFormat);
            }

            let mut payload = Vec::new();
            reader.take(len).read_to_end(&mut payload)?;
            if payload.len() as u64 != len {
                return Err(GeocellsError::InvalidFormat);
            }

            Ok(bincode::deserialize(&payload)?)
        }

        fn sync_parent_dir(&self) -> Result<()> {
            if let Some(parent) = self.path.parent()
                && !parent.as_os_str().is_empty()
            {
                let dir = File::open(parent)?;
                dir.sync_all()?;
            }
            Ok(())
        }
    }

    /// A header cut short is a format error, not an I/O failure.
    fn read_header<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<()> {
        reader.read_exact(buf).map_err(|e| match e.kind() {
            std::io::ErrorKind::UnexpectedEof => GeocellsError::InvalidFormat,
            _ => GeocellsError::Io(e),
        })
    }
}
