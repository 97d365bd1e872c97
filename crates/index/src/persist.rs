use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use finlens_core::{FinError, Result};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::jsonl::{read_records, JsonlWriter};
use crate::{IndexEntry, MetadataEntry};

/// The two artifacts of one index: `<base>.idx` and `<base>.meta`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexPaths {
    pub index: PathBuf,
    pub metadata: PathBuf,
}

impl IndexPaths {
    pub fn from_base<P: AsRef<Path>>(base: P) -> Self {
        Self {
            index: with_suffix(base.as_ref(), ".idx"),
            metadata: with_suffix(base.as_ref(), ".meta"),
        }
    }
}

fn with_suffix(base: &Path, suffix: &str) -> PathBuf {
    let mut raw: OsString = base.as_os_str().to_os_string();
    raw.push(suffix);
    PathBuf::from(raw)
}

#[derive(Debug, Serialize, Deserialize)]
struct FlatIndexFile {
    model: String,
    dimension: u64,
    count: u64,
    vectors: Vec<f32>,
}

/// Writes both artifacts through temporary files renamed into place.
pub(crate) fn save(
    paths: &IndexPaths,
    dimension: usize,
    model: &str,
    entries: &[IndexEntry],
) -> Result<()> {
    let meta_tmp = staged(&paths.metadata, |file| {
        let mut writer = JsonlWriter::new(BufWriter::new(file));
        for entry in entries {
            writer.write_record(&entry.metadata)?;
        }
        writer.into_inner().flush()?;
        Ok(())
    })?;

    let mut vectors = Vec::with_capacity(entries.len() * dimension);
    for entry in entries {
        vectors.extend_from_slice(&entry.vector);
    }
    let flat = FlatIndexFile {
        model: model.to_string(),
        dimension: dimension as u64,
        count: entries.len() as u64,
        vectors,
    };
    let index_tmp = staged(&paths.index, |file| {
        let mut writer = BufWriter::new(file);
        bincode::serialize_into(&mut writer, &flat)?;
        writer.flush()?;
        Ok(())
    })?;

    meta_tmp.persist(&paths.metadata).map_err(|e| e.error)?;
    index_tmp.persist(&paths.index).map_err(|e| e.error)?;
    Ok(())
}

fn staged<F>(target: &Path, write: F) -> Result<NamedTempFile>
where
    F: FnOnce(&mut File) -> Result<()>,
{
    let dir = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir)?;
    let mut tmp = NamedTempFile::new_in(&dir)?;
    write(tmp.as_file_mut())?;
    tmp.as_file().sync_all()?;
    Ok(tmp)
}

/// Loads both artifacts. `Ok(None)` when neither exists. The stored vectors
/// must come from `model` with the given `dimension`.
pub(crate) fn load(
    paths: &IndexPaths,
    dimension: usize,
    model: &str,
) -> Result<Option<Vec<IndexEntry>>> {
    match (paths.index.exists(), paths.metadata.exists()) {
        (false, false) => return Ok(None),
        (true, false) => {
            return Err(FinError::consistency(format!(
                "index file {} has no metadata file {}",
                paths.index.display(),
                paths.metadata.display()
            )))
        }
        (false, true) => {
            return Err(FinError::consistency(format!(
                "metadata file {} has no index file {}",
                paths.metadata.display(),
                paths.index.display()
            )))
        }
        (true, true) => {}
    }

    let flat: FlatIndexFile =
        bincode::deserialize_from(BufReader::new(File::open(&paths.index)?))?;
    if flat.dimension as usize != dimension {
        return Err(FinError::consistency(format!(
            "stored index dimension {} does not match embedder dimension {}",
            flat.dimension, dimension
        )));
    }
    if flat.model != model {
        return Err(FinError::consistency(format!(
            "index was built with embedding model {}, current model is {}",
            flat.model, model
        )));
    }
    let expected_floats = usize::try_from(flat.count)
        .ok()
        .and_then(|count| count.checked_mul(dimension))
        .ok_or_else(|| {
            FinError::consistency(format!(
                "index header claims {} vectors of dimension {dimension}",
                flat.count
            ))
        })?;
    if flat.vectors.len() != expected_floats {
        return Err(FinError::consistency(format!(
            "index file holds {} floats, expected {} vectors of dimension {}",
            flat.vectors.len(),
            flat.count,
            dimension
        )));
    }

    let metadata: Vec<MetadataEntry> =
        read_records(BufReader::new(File::open(&paths.metadata)?))?;
    if metadata.len() != flat.count as usize {
        return Err(FinError::consistency(format!(
            "index holds {} vectors but metadata holds {} entries",
            flat.count,
            metadata.len()
        )));
    }

    let entries = flat
        .vectors
        .chunks(dimension.max(1))
        .zip(metadata)
        .map(|(vector, metadata)| IndexEntry {
            vector: vector.to_vec(),
            metadata,
        })
        .collect();
    Ok(Some(entries))
}
