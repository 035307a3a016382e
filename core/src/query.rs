//! Query evaluation over the sharded on-disk index.
//!
//! A raw query containing the literal separator `" AND "` is evaluated as a
//! conjunction of clauses (OR within a clause, AND between clauses); anything
//! else is free text. Both modes score with
//! `1 + ln(tf) * ln(N / df)` summed over the query terms.

use crate::error::Result;
use crate::index::{DocId, Postings};
use crate::partition::{find_chunk, ShardKey};
use crate::persist::{load_chunk, load_lookup, load_meta, Chunk, ChunkLookup, IndexPaths};
use crate::rank::top_k;
use crate::tokenizer::{Normalizer, StemmingNormalizer};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::debug;

pub const DEFAULT_TOP_K: usize = 5;
pub const AND_SEPARATOR: &str = " AND ";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub url: DocId,
    pub score: f64,
}

/// Storage reads performed by one query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueryStats {
    pub lookups_loaded: usize,
    pub chunks_loaded: usize,
}

/// Score contribution of one term in one document.
pub fn term_weight(tf: f64, df: f64, n: f64) -> f64 {
    1.0 + tf.ln() * (n / df).ln()
}

pub struct QueryEngine<N = StemmingNormalizer> {
    paths: IndexPaths,
    num_docs: u64,
    top_k: usize,
    normalizer: N,
}

impl QueryEngine<StemmingNormalizer> {
    pub fn open(paths: IndexPaths) -> Result<Self> {
        Self::with_normalizer(paths, StemmingNormalizer)
    }
}

impl<N: Normalizer> QueryEngine<N> {
    /// Opens a built index; fails if the corpus-size artifact is missing or invalid.
    pub fn with_normalizer(paths: IndexPaths, normalizer: N) -> Result<Self> {
        let meta = load_meta(&paths)?;
        Ok(Self { paths, num_docs: meta.num_docs, top_k: DEFAULT_TOP_K, normalizer })
    }

    pub fn with_top_k(mut self, k: usize) -> Self {
        self.top_k = k;
        self
    }

    pub fn num_docs(&self) -> u64 {
        self.num_docs
    }

    pub fn search(&self, raw: &str) -> Result<Vec<SearchHit>> {
        self.search_top_k(raw, self.top_k)
    }

    pub fn search_top_k(&self, raw: &str, k: usize) -> Result<Vec<SearchHit>> {
        self.search_with_stats(raw, k).map(|(hits, _)| hits)
    }

    pub fn search_with_stats(&self, raw: &str, k: usize) -> Result<(Vec<SearchHit>, QueryStats)> {
        let mut ctx = QueryContext::new(&self.paths);
        let scores = if raw.contains(AND_SEPARATOR) {
            self.boolean_scores(raw, &mut ctx)?
        } else {
            self.free_text_scores(raw, &mut ctx)?
        };
        let hits = top_k(scores, k)
            .into_iter()
            .map(|(url, score)| SearchHit { url, score })
            .collect();
        Ok((hits, ctx.stats))
    }

    fn free_text_scores(&self, raw: &str, ctx: &mut QueryContext<'_>) -> Result<BTreeMap<DocId, f64>> {
        let terms = self.normalizer.normalize(raw, true);
        let mut scores: BTreeMap<DocId, f64> = BTreeMap::new();
        let n = self.num_docs as f64;
        for term in &terms {
            let Some(postings) = ctx.resolve(term)? else { continue };
            let df = postings.len() as f64;
            if df == 0.0 {
                continue;
            }
            for (doc, &tf) in postings {
                *scores.entry(doc.clone()).or_insert(0.0) += term_weight(tf as f64, df, n);
            }
        }
        Ok(scores)
    }

    fn boolean_scores(&self, raw: &str, ctx: &mut QueryContext<'_>) -> Result<BTreeMap<DocId, f64>> {
        let clauses: Vec<Vec<String>> = raw
            .split(AND_SEPARATOR)
            .map(|part| self.normalizer.normalize(part, true))
            .filter(|terms| !terms.is_empty())
            .collect();
        if clauses.is_empty() {
            return Ok(BTreeMap::new());
        }

        let mut candidates: Option<BTreeSet<DocId>> = None;
        for clause in &clauses {
            let mut clause_docs: BTreeSet<DocId> = BTreeSet::new();
            for term in clause {
                if let Some(postings) = ctx.resolve(term)? {
                    clause_docs.extend(postings.keys().cloned());
                }
            }
            let running = match candidates.take() {
                None => clause_docs,
                Some(prev) => prev.intersection(&clause_docs).cloned().collect(),
            };
            if running.is_empty() {
                return Ok(BTreeMap::new());
            }
            candidates = Some(running);
        }
        let candidates = candidates.unwrap_or_default();

        let mut scores: BTreeMap<DocId, f64> = BTreeMap::new();
        let n = self.num_docs as f64;
        for term in clauses.iter().flatten() {
            let Some(postings) = ctx.resolve(term)? else { continue };
            let df = postings.len() as f64;
            if df == 0.0 {
                continue;
            }
            for doc in &candidates {
                if let Some(&tf) = postings.get(doc) {
                    *scores.entry(doc.clone()).or_insert(0.0) += term_weight(tf as f64, df, n);
                }
            }
        }
        Ok(scores)
    }
}

type ChunkId = (ShardKey, u32);

/// Artifacts loaded while evaluating one query. Each lookup table and chunk
/// is read from storage at most once, then dropped with the query.
struct QueryContext<'a> {
    paths: &'a IndexPaths,
    lookups: HashMap<ShardKey, Option<ChunkLookup>>,
    chunks: HashMap<ChunkId, Option<Chunk>>,
    stats: QueryStats,
}

impl<'a> QueryContext<'a> {
    fn new(paths: &'a IndexPaths) -> Self {
        Self { paths, lookups: HashMap::new(), chunks: HashMap::new(), stats: QueryStats::default() }
    }

    /// Postings of `term`, or `None` when no shard/chunk holds it.
    fn resolve(&mut self, term: &str) -> Result<Option<&Postings>> {
        let Some(id) = self.locate(term)? else { return Ok(None) };
        if !self.chunks.contains_key(&id) {
            let key = id.0.as_str();
            let chunk = missing_as_none(load_chunk(self.paths, &key, id.1))?;
            self.stats.chunks_loaded += 1;
            debug!(shard = %key, chunk = id.1, found = chunk.is_some(), "loaded chunk");
            self.chunks.insert(id, chunk);
        }
        Ok(self.chunks.get(&id).and_then(|c| c.as_ref()).and_then(|c| c.get(term)))
    }

    fn locate(&mut self, term: &str) -> Result<Option<ChunkId>> {
        let Ok(key) = ShardKey::for_term(term) else { return Ok(None) };
        if !self.lookups.contains_key(&key) {
            let lookup = missing_as_none(load_lookup(self.paths, &key.as_str()))?;
            self.stats.lookups_loaded += 1;
            self.lookups.insert(key, lookup);
        }
        let chunk = self
            .lookups
            .get(&key)
            .and_then(|l| l.as_ref())
            .and_then(|l| find_chunk(l, term));
        Ok(chunk.map(|c| (key, c)))
    }
}

/// A shard that was never written simply has no matching documents.
fn missing_as_none<T>(res: Result<T>) -> Result<Option<T>> {
    match res {
        Ok(v) => Ok(Some(v)),
        Err(err) if err.is_not_found() => Ok(None),
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weight_of_single_occurrence_is_one() {
        assert_eq!(term_weight(1.0, 2.0, 3.0), 1.0);
        assert_eq!(term_weight(1.0, 1.0, 1000.0), 1.0);
    }

    #[test]
    fn weight_with_unit_logs_is_two() {
        let n = 100.0;
        let df = n / std::f64::consts::E;
        let w = term_weight(std::f64::consts::E, df, n);
        assert!((w - 2.0).abs() < 1e-12, "{w}");
    }

    #[test]
    fn term_in_every_document_weighs_one() {
        assert_eq!(term_weight(7.0, 4.0, 4.0), 1.0);
    }
}
