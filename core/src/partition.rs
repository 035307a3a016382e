//! Alphabetic sharding of the merged index.
//!
//! Terms are grouped by their upper-cased leading character into one shard
//! per ASCII letter, plus a `_` shard for every other alphanumeric lead.
//! A shard larger than the chunk threshold is cut into contiguous,
//! lexicographically ordered chunks, and each shard gets a lookup table of
//! `(last term in chunk, chunk id)` so a reader only has to open one chunk
//! per term.

use crate::error::{IndexError, Result};
use crate::index::{MergedIndex, Postings};
use crate::persist::{save_chunk, save_lookup, Chunk, ChunkLookup, IndexPaths};
use std::collections::BTreeMap;
use std::fmt;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ShardKey {
    Letter(char),
    Other,
}

impl ShardKey {
    pub fn for_term(term: &str) -> Result<ShardKey> {
        match term.chars().next() {
            Some(c) if c.is_ascii_alphabetic() => Ok(ShardKey::Letter(c.to_ascii_uppercase())),
            Some(c) if c.is_alphanumeric() => Ok(ShardKey::Other),
            _ => Err(IndexError::InvalidTerm { term: term.to_string() }),
        }
    }

    /// File-name component of the shard.
    pub fn as_str(&self) -> String {
        match self {
            ShardKey::Letter(c) => c.to_string(),
            ShardKey::Other => "_".to_string(),
        }
    }
}

impl fmt::Display for ShardKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shard {
    pub key: ShardKey,
    pub chunks: Vec<Chunk>,
}

impl Shard {
    pub fn lookup(&self) -> ChunkLookup {
        self.chunks
            .iter()
            .enumerate()
            .filter_map(|(id, chunk)| chunk.keys().next_back().map(|last| (last.clone(), id as u32)))
            .collect()
    }
}

/// Index of the chunk holding `term`: the first boundary >= term.
pub fn find_chunk(lookup: &ChunkLookup, term: &str) -> Option<u32> {
    let idx = lookup.partition_point(|(last, _)| last.as_str() < term);
    lookup.get(idx).map(|(_, id)| *id)
}

#[derive(Debug, Clone, Default)]
pub struct PartitionReport {
    pub shards: usize,
    pub chunks: usize,
    pub bytes: u64,
}

/// Splits the merged index into shards, moving every posting list into its
/// chunk. Pure and deterministic.
pub fn partition(index: MergedIndex, chunk_bytes: u64) -> Result<Vec<Shard>> {
    let mut grouped: BTreeMap<ShardKey, Vec<(String, Postings)>> = BTreeMap::new();
    for (term, postings) in index.into_terms() {
        let key = ShardKey::for_term(&term)?;
        grouped.entry(key).or_default().push((term, postings));
    }

    let mut shards = Vec::with_capacity(grouped.len());
    for (key, terms) in grouped {
        let mut chunks: Vec<Chunk> = Vec::new();
        let mut current = Chunk::new();
        let mut current_bytes = 0u64;
        for (term, postings) in terms {
            let size = entry_size(&term, &postings);
            if !current.is_empty() && current_bytes + size > chunk_bytes {
                chunks.push(std::mem::take(&mut current));
                current_bytes = 0;
            }
            current.insert(term, postings);
            current_bytes += size;
        }
        if !current.is_empty() {
            chunks.push(current);
        }
        shards.push(Shard { key, chunks });
    }
    Ok(shards)
}

fn entry_size(term: &str, postings: &Postings) -> u64 {
    bincode::serialized_size(&(term, postings)).unwrap_or(u64::MAX / 2)
}

/// Writes every chunk and per-shard lookup table.
pub fn write_shards(paths: &IndexPaths, shards: &[Shard]) -> Result<PartitionReport> {
    let mut report = PartitionReport::default();
    for shard in shards {
        let key = shard.key.as_str();
        for (id, chunk) in shard.chunks.iter().enumerate() {
            report.bytes += save_chunk(paths, &key, id as u32, chunk)?;
            report.chunks += 1;
        }
        report.bytes += save_lookup(paths, &key, &shard.lookup())?;
        report.shards += 1;
        info!(shard = %shard.key, chunks = shard.chunks.len(), "persisted shard");
    }
    Ok(report)
}
