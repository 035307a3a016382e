pub mod builder;
pub mod corpus;
pub mod document;
pub mod error;
pub mod index;
pub mod partition;
pub mod persist;
pub mod pipeline;
pub mod query;
pub mod rank;
pub mod tokenizer;

pub use builder::{BuildConfig, IndexBuilder};
pub use corpus::{read_corpus, RawDocument};
pub use document::{canonical_url, DocumentProcessor, HtmlProcessor};
pub use error::{IndexError, Result};
pub use index::{DocId, InvertedIndex, MergedIndex, PartialIndex, Postings, TermFrequencies};
pub use partition::{partition, ShardKey};
pub use persist::IndexPaths;
pub use pipeline::{build_index, BuildReport};
pub use query::{QueryEngine, QueryStats, SearchHit, DEFAULT_TOP_K};
pub use tokenizer::{Normalizer, StemmingNormalizer};
