//! Stage files and the final cache artifact.
//!
//! Every pipeline stage writes one text file per region bucket into its own
//! directory under the work directory; the class cache builder writes a
//! single artifact at the end.

use crate::compute::bucket::RegionBucket;
use crate::error::Result;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

pub mod cache;
pub mod records;

pub use cache::ClassCache;
#[cfg(feature = "snapshot")]
pub use cache::CacheFile;
pub use records::MergedLine;

/// Output directory of one stage, holding `<prefix>_<bucket>.txt` files.
#[derive(Debug, Clone)]
pub struct StageDir {
    dir: PathBuf,
    prefix: &'static str,
}

impl StageDir {
    pub fn new<P: AsRef<Path>>(dir: P, prefix: &'static str) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            prefix,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, bucket: RegionBucket) -> PathBuf {
        self.dir.join(format!("{}_{}.txt", self.prefix, bucket))
    }

    /// Create the directory if needed and delete this stage's previous
    /// outputs, so a rerun never mixes old and new buckets.
    pub fn reset(&self) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        for path in self.files()?.into_values() {
            fs::remove_file(path)?;
        }
        Ok(())
    }

    /// Existing stage files keyed by bucket, in bucket order.
    ///
    /// A missing directory yields no files.
    pub fn files(&self) -> Result<BTreeMap<RegionBucket, PathBuf>> {
        let mut files = BTreeMap::new();
        if !self.dir.is_dir() {
            return Ok(files);
        }

        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            let Some(bucket) = self.bucket_of(&path) else {
                continue;
            };
            files.insert(bucket, path);
        }
        Ok(files)
    }

    fn bucket_of(&self, path: &Path) -> Option<RegionBucket> {
        let name = path.file_name()?.to_str()?;
        let stem = name.strip_suffix(".txt")?;
        let key = stem.strip_prefix(self.prefix)?.strip_prefix('_')?;
        key.parse().ok()
    }
}

/// Write a file through a temporary sibling and rename it into place.
pub(crate) fn write_atomic<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<()>,
{
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let temp_path = temp_path(path);

    let mut writer = BufWriter::new(File::create(&temp_path)?);
    write(&mut writer)?;
    writer.flush()?;
    let file = writer.into_inner().map_err(|e| e.into_error())?;
    file.sync_all()?;
    drop(file);

    fs::rename(&temp_path, path)?;
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut temp = path.to_path_buf();
    if let Some(name) = temp.file_name() {
        let mut new_name = name.to_string_lossy().into_owned();
        new_name.push_str(".tmp");
        temp.set_file_name(new_name);
    }
    temp
}
