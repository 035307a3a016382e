use lazy_static::lazy_static;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use std::collections::HashSet;
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    static ref RE: Regex = Regex::new(r"[\p{L}\p{N}]+").expect("valid regex");
    static ref STEMMER: Stemmer = Stemmer::create(Algorithm::English);
    static ref STOPWORDS: HashSet<&'static str> = {
        let words: &[&str] = &[
            "a","about","above","after","again","against","all","am","an","and","any","are","as","at",
            "be","because","been","before","being","below","between","both","but","by",
            "could","did","do","does","doing","down","during",
            "each","few","for","from","further",
            "had","has","have","having","he","her","here","hers","herself","him","himself","his","how",
            "i","if","in","into","is","it","its","itself","just",
            "me","more","most","my","myself",
            "no","nor","not","of","off","on","once","only","or","other","our","ours","ourselves","out","over","own",
            "s","same","she","should","so","some","such",
            "t","than","that","the","their","theirs","them","themselves","then","there","these","they","this","those","through","to","too",
            "under","until","up","very",
            "was","we","were","what","when","where","which","while","who","whom","why","will","with",
            "you","your","yours","yourself","yourselves"
        ];
        words.iter().copied().collect()
    };
}

/// Turns free text into the ordered sequence of index terms.
///
/// The same normalizer must be used at build and query time, otherwise term
/// identity diverges between the two phases.
pub trait Normalizer: Send + Sync {
    fn normalize(&self, text: &str, remove_stopwords: bool) -> Vec<String>;
}

/// NFKC + lowercase + alphanumeric runs + Snowball English stemming.
#[derive(Debug, Clone, Copy, Default)]
pub struct StemmingNormalizer;

impl Normalizer for StemmingNormalizer {
    fn normalize(&self, text: &str, remove_stopwords: bool) -> Vec<String> {
        normalize(text, remove_stopwords)
    }
}

pub fn is_stopword(token: &str) -> bool {
    STOPWORDS.contains(token)
}

pub fn normalize(text: &str, remove_stopwords: bool) -> Vec<String> {
    let lowered = text.nfkc().collect::<String>().to_lowercase();
    RE.find_iter(&lowered)
        .map(|m| m.as_str())
        .filter(|token| !(remove_stopwords && is_stopword(token)))
        .map(|token| STEMMER.stem(token).into_owned())
        .filter(|term| !term.is_empty())
        .collect()
}
