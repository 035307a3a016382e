//! Batched external-memory index construction.
//!
//! Documents are folded into an in-memory [`PartialIndex`] which is spilled
//! to disk every `batch_size` documents (or earlier, when it grows past
//! `max_batch_postings`). [`IndexBuilder::finalize`] streams the spilled
//! partials back and sums them into one [`MergedIndex`]. Peak memory during
//! accumulation is bounded by the batch, never by the corpus.

use crate::error::Result;
use crate::index::{MergedIndex, PartialIndex, TermFrequencies};
use crate::persist::{load_partial, save_partial, IndexPaths};
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Documents per partial index.
    pub batch_size: usize,
    /// Extra checkpoint once a batch holds this many postings.
    pub max_batch_postings: usize,
    /// Serialized size above which a shard is split into chunks.
    pub chunk_bytes: u64,
    /// Process each batch's documents on the rayon pool.
    pub parallel: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            max_batch_postings: 5_000_000,
            chunk_bytes: 1024 * 1024,
            parallel: true,
        }
    }
}

pub struct IndexBuilder {
    paths: IndexPaths,
    batch_size: usize,
    max_batch_postings: usize,
    partial: PartialIndex,
    batch_postings: usize,
    docs_in_batch: usize,
    documents: u64,
    partials_written: u32,
    partial_bytes: u64,
}

impl IndexBuilder {
    /// Starts a fresh build; partials of an earlier, aborted build are removed.
    pub fn new(paths: IndexPaths, config: &BuildConfig) -> Result<Self> {
        crate::persist::remove_partials(&paths)?;
        Ok(Self {
            paths,
            batch_size: config.batch_size.max(1),
            max_batch_postings: config.max_batch_postings.max(1),
            partial: PartialIndex::new(),
            batch_postings: 0,
            docs_in_batch: 0,
            documents: 0,
            partials_written: 0,
            partial_bytes: 0,
        })
    }

    /// Adds one document's weighted terms, checkpointing when the batch is full.
    pub fn accumulate(&mut self, doc: &str, freqs: &TermFrequencies) -> Result<()> {
        self.batch_postings += self.partial.add_document(doc, freqs);
        self.docs_in_batch += 1;
        self.documents += 1;

        if self.docs_in_batch >= self.batch_size {
            self.checkpoint()?;
        } else if self.batch_postings >= self.max_batch_postings {
            debug!(postings = self.batch_postings, "batch over posting budget");
            self.checkpoint()?;
        }
        Ok(())
    }

    /// Persists the current partial index and starts an empty one.
    pub fn checkpoint(&mut self) -> Result<()> {
        self.docs_in_batch = 0;
        self.batch_postings = 0;
        if self.partial.is_empty() {
            return Ok(());
        }
        let seq = self.partials_written;
        let partial = std::mem::take(&mut self.partial);
        let bytes = save_partial(&self.paths, seq, &partial)?;
        self.partials_written += 1;
        self.partial_bytes += bytes;
        info!(seq, path = %self.paths.partial(seq).display(), terms = partial.unique_terms(), bytes, "saved partial index");
        Ok(())
    }

    pub fn partials_written(&self) -> u32 {
        self.partials_written
    }

    /// Flushes the trailing batch and sums every partial into one index.
    ///
    /// Any missing or corrupt partial aborts the whole merge.
    pub fn finalize(mut self) -> Result<(MergedIndex, u64)> {
        self.checkpoint()?;
        info!(partials = self.partials_written, bytes = self.partial_bytes, "merging partial indexes");

        let mut merged = MergedIndex::new();
        for seq in 0..self.partials_written {
            let partial = load_partial(&self.paths, seq)?;
            merged.merge(partial);
            debug!(seq, terms = merged.unique_terms(), "merged partial index");
        }
        Ok((merged, self.documents))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::IndexError;
    use tempfile::tempdir;

    fn freqs(pairs: &[(&str, u32)]) -> TermFrequencies {
        pairs.iter().map(|(t, c)| (t.to_string(), *c)).collect()
    }

    fn config(batch_size: usize) -> BuildConfig {
        BuildConfig { batch_size, ..BuildConfig::default() }
    }

    #[test]
    fn checkpoints_every_batch() {
        let dir = tempdir().unwrap();
        let mut b = IndexBuilder::new(IndexPaths::new(dir.path()), &config(2)).unwrap();
        for i in 0..5 {
            b.accumulate(&format!("d{i}"), &freqs(&[("cat", 1)])).unwrap();
        }
        assert_eq!(b.partials_written(), 2);
        let (merged, docs) = b.finalize().unwrap();
        assert_eq!(docs, 5);
        assert_eq!(merged.get("cat").unwrap().len(), 5);
    }

    #[test]
    fn batch_size_does_not_change_the_result() {
        let docs: Vec<(String, TermFrequencies)> = (0..7)
            .map(|i| (format!("d{}", i % 3), freqs(&[("cat", 1 + i), ("dog", 2)])))
            .collect();

        let mut results = Vec::new();
        for batch in [1, 3, 100] {
            let dir = tempdir().unwrap();
            let mut b = IndexBuilder::new(IndexPaths::new(dir.path()), &config(batch)).unwrap();
            for (doc, f) in &docs {
                b.accumulate(doc, f).unwrap();
            }
            results.push(b.finalize().unwrap());
        }
        assert_eq!(results[0], results[1]);
        assert_eq!(results[1], results[2]);
        assert_eq!(results[0].0.get("dog").unwrap()["d0"], 6);
    }

    #[test]
    fn posting_budget_forces_extra_checkpoint() {
        let dir = tempdir().unwrap();
        let cfg = BuildConfig { batch_size: 100, max_batch_postings: 3, ..BuildConfig::default() };
        let mut b = IndexBuilder::new(IndexPaths::new(dir.path()), &cfg).unwrap();
        b.accumulate("d1", &freqs(&[("a", 1), ("b", 1)])).unwrap();
        assert_eq!(b.partials_written(), 0);
        b.accumulate("d2", &freqs(&[("a", 1)])).unwrap();
        assert_eq!(b.partials_written(), 1);
    }

    #[test]
    fn empty_documents_count_but_write_nothing() {
        let dir = tempdir().unwrap();
        let mut b = IndexBuilder::new(IndexPaths::new(dir.path()), &config(1)).unwrap();
        b.accumulate("d1", &TermFrequencies::new()).unwrap();
        assert_eq!(b.partials_written(), 0);
        let (merged, docs) = b.finalize().unwrap();
        assert!(merged.is_empty());
        assert_eq!(docs, 1);
    }

    #[test]
    fn missing_partial_fails_the_merge() {
        let dir = tempdir().unwrap();
        let paths = IndexPaths::new(dir.path());
        let mut b = IndexBuilder::new(paths.clone(), &config(1)).unwrap();
        b.accumulate("d1", &freqs(&[("cat", 1)])).unwrap();
        b.accumulate("d2", &freqs(&[("cat", 1)])).unwrap();
        std::fs::remove_file(paths.partial(1)).unwrap();

        match b.finalize() {
            Err(IndexError::MissingPartial { seq, .. }) => assert_eq!(seq, 1),
            other => panic!("expected missing partial, got {other:?}"),
        }
    }
}
