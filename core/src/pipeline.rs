use crate::builder::{BuildConfig, IndexBuilder};
use crate::corpus::RawDocument;
use crate::document::{canonical_url, DocumentProcessor};
use crate::error::Result;
use crate::index::TermFrequencies;
use crate::partition::{partition, write_shards};
use crate::persist::{clear_shards, remove_meta, remove_partials, save_meta, IndexPaths, MetaFile, FORMAT_VERSION};
use rayon::prelude::*;
use serde::Serialize;
use std::time::Instant;
use time::format_description::well_known::Rfc3339;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildReport {
    pub documents_indexed: u64,
    pub unique_term_count: u64,
    pub on_disk_bytes: u64,
}

/// Builds a complete on-disk index from `corpus` and returns the corpus size.
///
/// Documents are pulled `batch_size` at a time, processed (in parallel unless
/// disabled) and accumulated in corpus order.
pub fn build_index<I, P>(corpus: I, processor: &P, config: &BuildConfig, paths: &IndexPaths) -> Result<(u64, BuildReport)>
where
    I: IntoIterator<Item = RawDocument>,
    P: DocumentProcessor + ?Sized,
{
    let start = Instant::now();
    let mut builder = IndexBuilder::new(paths.clone(), config)?;
    let batch_size = config.batch_size.max(1);

    let mut docs = corpus.into_iter();
    loop {
        let batch: Vec<RawDocument> = docs.by_ref().take(batch_size).collect();
        if batch.is_empty() {
            break;
        }
        for (url, freqs) in process_batch(&batch, processor, config.parallel) {
            builder.accumulate(&url, &freqs)?;
        }
    }

    let (merged, num_docs) = builder.finalize()?;
    let unique_terms = merged.unique_terms() as u64;
    info!(num_docs, unique_terms, "merged index");

    let shards = partition(merged, config.chunk_bytes)?;

    // meta.json is written last and marks the index as complete
    remove_meta(paths)?;
    clear_shards(paths)?;
    let written = write_shards(paths, &shards)?;
    let meta = MetaFile {
        num_docs,
        unique_terms,
        created_at: time::OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default(),
        version: FORMAT_VERSION,
    };
    let meta_bytes = save_meta(paths, &meta)?;
    remove_partials(paths)?;

    let report = BuildReport {
        documents_indexed: num_docs,
        unique_term_count: unique_terms,
        on_disk_bytes: written.bytes + meta_bytes,
    };
    info!(
        root = %paths.root.display(),
        shards = written.shards,
        chunks = written.chunks,
        bytes = report.on_disk_bytes,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "index build complete"
    );
    Ok((num_docs, report))
}

fn process_batch<P>(batch: &[RawDocument], processor: &P, parallel: bool) -> Vec<(String, TermFrequencies)>
where
    P: DocumentProcessor + ?Sized,
{
    let process = |doc: &RawDocument| {
        let url = canonical_url(&doc.url);
        let freqs = processor.process(&doc.content, &url);
        (url, freqs)
    };
    if parallel {
        batch.par_iter().map(process).collect()
    } else {
        batch.iter().map(process).collect()
    }
}
