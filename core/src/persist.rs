use crate::error::{IndexError, Result};
use crate::index::{InvertedIndex, Postings};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, create_dir_all, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

pub const FORMAT_VERSION: u32 = 2;

/// One contiguous, sorted term range of a shard.
pub type Chunk = BTreeMap<String, Postings>;

/// (last term in chunk, chunk id), sorted by term.
pub type ChunkLookup = Vec<(String, u32)>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaFile {
    pub num_docs: u64,
    pub unique_terms: u64,
    pub created_at: String,
    pub version: u32,
}

#[derive(Debug, Clone)]
pub struct IndexPaths {
    pub root: PathBuf,
    partials: PathBuf,
}

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        let root = root.as_ref().to_path_buf();
        let partials = root.join("partials");
        Self { root, partials }
    }

    /// Spill partial indexes somewhere other than the index root.
    pub fn with_partials_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.partials = dir.as_ref().to_path_buf();
        self
    }

    pub fn partials_dir(&self) -> &Path { &self.partials }
    pub fn shards_dir(&self) -> PathBuf { self.root.join("shards") }
    pub fn meta(&self) -> PathBuf { self.root.join("meta.json") }
    pub fn partial(&self, seq: u32) -> PathBuf { self.partials.join(format!("partial_{seq:05}.bin")) }
    pub fn chunk(&self, key: &str, chunk: u32) -> PathBuf { self.shards_dir().join(format!("terms_{key}_{chunk:03}.bin")) }
    pub fn lookup(&self, key: &str) -> PathBuf { self.shards_dir().join(format!("lookup_{key}.bin")) }
}

fn write_bincode<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<u64> {
    if let Some(dir) = path.parent() {
        create_dir_all(dir).map_err(|e| IndexError::io(dir, e))?;
    }
    let bytes = bincode::serialize(value).map_err(|source| IndexError::Corrupt { path: path.to_path_buf(), source })?;
    let mut f = BufWriter::new(File::create(path).map_err(|e| IndexError::io(path, e))?);
    f.write_all(&bytes).map_err(|e| IndexError::io(path, e))?;
    f.flush().map_err(|e| IndexError::io(path, e))?;
    Ok(bytes.len() as u64)
}

fn read_bincode<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let mut f = File::open(path).map_err(|e| IndexError::io(path, e))?;
    let mut buf = Vec::new();
    f.read_to_end(&mut buf).map_err(|e| IndexError::io(path, e))?;
    bincode::deserialize(&buf).map_err(|source| IndexError::Corrupt { path: path.to_path_buf(), source })
}

pub fn save_partial(paths: &IndexPaths, seq: u32, index: &InvertedIndex) -> Result<u64> {
    write_bincode(&paths.partial(seq), index)
}

pub fn load_partial(paths: &IndexPaths, seq: u32) -> Result<InvertedIndex> {
    let path = paths.partial(seq);
    read_bincode(&path).map_err(|err| match err {
        IndexError::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound => {
            IndexError::MissingPartial { seq, path: path.clone() }
        }
        IndexError::Corrupt { source, .. } => IndexError::CorruptPartial { seq, path: path.clone(), source },
        other => other,
    })
}

/// Deletes spilled partial files; the directory itself goes only if left empty.
pub fn remove_partials(paths: &IndexPaths) -> Result<()> {
    let dir = paths.partials_dir();
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(IndexError::io(dir, e)),
    };
    for entry in entries {
        let path = entry.map_err(|e| IndexError::io(dir, e))?.path();
        let is_partial = path
            .file_name()
            .and_then(|n| n.to_str())
            .map_or(false, |n| n.starts_with("partial_") && n.ends_with(".bin"));
        if is_partial {
            fs::remove_file(&path).map_err(|e| IndexError::io(&path, e))?;
        }
    }
    let _ = fs::remove_dir(dir);
    Ok(())
}

pub fn save_chunk(paths: &IndexPaths, key: &str, id: u32, chunk: &Chunk) -> Result<u64> {
    write_bincode(&paths.chunk(key, id), chunk)
}

pub fn load_chunk(paths: &IndexPaths, key: &str, id: u32) -> Result<Chunk> {
    read_bincode(&paths.chunk(key, id))
}

pub fn save_lookup(paths: &IndexPaths, key: &str, lookup: &ChunkLookup) -> Result<u64> {
    write_bincode(&paths.lookup(key), lookup)
}

pub fn load_lookup(paths: &IndexPaths, key: &str) -> Result<ChunkLookup> {
    read_bincode(&paths.lookup(key))
}

/// Drop shard artifacts of an earlier build so stale letters cannot answer queries.
pub fn clear_shards(paths: &IndexPaths) -> Result<()> {
    let dir = paths.shards_dir();
    match fs::remove_dir_all(&dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(IndexError::io(dir, e)),
    }
}

pub fn save_meta(paths: &IndexPaths, meta: &MetaFile) -> Result<u64> {
    create_dir_all(&paths.root).map_err(|e| IndexError::io(&paths.root, e))?;
    let path = paths.meta();
    let json = serde_json::to_string_pretty(meta).map_err(|source| IndexError::Meta { path: path.clone(), source })?;
    fs::write(&path, json.as_bytes()).map_err(|e| IndexError::io(&path, e))?;
    Ok(json.len() as u64)
}

/// Removes `meta.json` so a half-rewritten index cannot be opened.
pub fn remove_meta(paths: &IndexPaths) -> Result<()> {
    let path = paths.meta();
    match fs::remove_file(&path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(IndexError::io(path, e)),
    }
}

pub fn load_meta(paths: &IndexPaths) -> Result<MetaFile> {
    let path = paths.meta();
    let f = File::open(&path).map_err(|e| IndexError::io(&path, e))?;
    serde_json::from_reader(BufReader::new(f)).map_err(|source| IndexError::Meta { path, source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn partial_round_trip_and_missing() {
        let dir = tempdir().unwrap();
        let paths = IndexPaths::new(dir.path());
        let mut idx = InvertedIndex::new();
        idx.add("cat", "d1", 2);
        save_partial(&paths, 0, &idx).unwrap();
        assert_eq!(load_partial(&paths, 0).unwrap(), idx);

        let err = load_partial(&paths, 1).unwrap_err();
        assert!(matches!(err, IndexError::MissingPartial { seq: 1, .. }));
    }

    #[test]
    fn corrupt_partial_reports_sequence() {
        let dir = tempdir().unwrap();
        let paths = IndexPaths::new(dir.path());
        create_dir_all(paths.partials_dir()).unwrap();
        fs::write(paths.partial(3), b"\xff\xff\xff\xff\xff\xff\xff\xff\xff").unwrap();
        let err = load_partial(&paths, 3).unwrap_err();
        assert!(matches!(err, IndexError::CorruptPartial { seq: 3, .. }), "{err}");
    }

    #[test]
    fn removing_partials_spares_other_files() {
        let dir = tempdir().unwrap();
        let paths = IndexPaths::new(dir.path()).with_partials_dir(dir.path().join("tmp"));
        save_partial(&paths, 0, &InvertedIndex::new()).unwrap();
        fs::write(paths.partials_dir().join("keep.txt"), "x").unwrap();
        remove_partials(&paths).unwrap();
        assert!(!paths.partial(0).exists());
        assert!(paths.partials_dir().join("keep.txt").exists());
    }

    #[test]
    fn chunk_file_names_are_keyed_by_letter() {
        let paths = IndexPaths::new("/idx");
        assert_eq!(paths.chunk("C", 2), PathBuf::from("/idx/shards/terms_C_002.bin"));
        assert_eq!(paths.lookup("_"), PathBuf::from("/idx/shards/lookup__.bin"));
        assert_eq!(paths.partial(12), PathBuf::from("/idx/partials/partial_00012.bin"));
    }

    #[test]
    fn missing_lookup_is_not_found() {
        let dir = tempdir().unwrap();
        let paths = IndexPaths::new(dir.path());
        assert!(load_lookup(&paths, "Q").unwrap_err().is_not_found());
    }
}
