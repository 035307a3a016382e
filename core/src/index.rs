use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Documents are keyed by their canonical URL.
pub type DocId = String;

/// Weighted occurrence counts of each term within a single document.
pub type TermFrequencies = HashMap<String, u32>;

/// Per-term postings, document -> weighted count. Every stored count is > 0.
pub type Postings = BTreeMap<DocId, u32>;

/// Term -> postings. Ordered maps keep serialization byte-stable across builds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InvertedIndex {
    terms: BTreeMap<String, Postings>,
}

/// Batch-scoped index, spilled once per checkpoint.
pub type PartialIndex = InvertedIndex;

/// Additive sum of every partial index of a build.
pub type MergedIndex = InvertedIndex;

impl InvertedIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one document's weighted terms in. Repeated contributions add up.
    /// Returns how many new (term, document) postings were created.
    pub fn add_document(&mut self, doc: &str, freqs: &TermFrequencies) -> usize {
        let mut created = 0;
        for (term, &count) in freqs {
            if self.add(term, doc, count) {
                created += 1;
            }
        }
        created
    }

    /// Returns true when the posting did not exist before.
    pub fn add(&mut self, term: &str, doc: &str, count: u32) -> bool {
        if count == 0 {
            return false;
        }
        let postings = match self.terms.get_mut(term) {
            Some(p) => p,
            None => self.terms.entry(term.to_string()).or_default(),
        };
        match postings.get_mut(doc) {
            Some(n) => {
                *n += count;
                false
            }
            None => {
                postings.insert(doc.to_string(), count);
                true
            }
        }
    }

    /// Additive merge. Commutative and associative, so batch order never matters.
    pub fn merge(&mut self, other: InvertedIndex) {
        for (term, postings) in other.terms {
            let target = self.terms.entry(term).or_default();
            for (doc, count) in postings {
                if count > 0 {
                    *target.entry(doc).or_insert(0) += count;
                }
            }
        }
    }

    pub fn get(&self, term: &str) -> Option<&Postings> {
        self.terms.get(term)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Postings)> {
        self.terms.iter()
    }

    pub fn unique_terms(&self) -> usize {
        self.terms.len()
    }

    /// Number of (term, document) pairs held.
    pub fn posting_count(&self) -> usize {
        self.terms.values().map(|p| p.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Consumes the index, yielding terms in sorted order.
    pub fn into_terms(self) -> BTreeMap<String, Postings> {
        self.terms
    }
}
