//! Turns crawled pages into weighted term-frequency maps.
//!
//! Every body occurrence counts 1. Text inside `b`/`strong` adds 3 per
//! occurrence, `h1`..`h3` adds 5 and the page `title` adds 10.

use crate::index::TermFrequencies;
use crate::tokenizer::Normalizer;
use lazy_static::lazy_static;
use scraper::{Html, Selector};
use url::Url;

pub const BODY_WEIGHT: u32 = 1;
pub const EMPHASIS_WEIGHT: u32 = 3;
pub const HEADING_WEIGHT: u32 = 5;
pub const TITLE_WEIGHT: u32 = 10;

lazy_static! {
    static ref SEL_EMPHASIS: Selector = Selector::parse("b, strong").expect("valid selector");
    static ref SEL_HEADING: Selector = Selector::parse("h1, h2, h3").expect("valid selector");
    static ref SEL_TITLE: Selector = Selector::parse("title").expect("valid selector");
}

/// Produces the weighted term map for one raw document.
///
/// Malformed or empty content yields an empty map; it is never an error.
pub trait DocumentProcessor: Send + Sync {
    fn process(&self, content: &str, url: &str) -> TermFrequencies;
}

pub struct HtmlProcessor<N> {
    normalizer: N,
}

impl<N: Normalizer> HtmlProcessor<N> {
    pub fn new(normalizer: N) -> Self {
        Self { normalizer }
    }

    fn add_terms(&self, freqs: &mut TermFrequencies, text: &str, weight: u32) {
        for term in self.normalizer.normalize(text, false) {
            *freqs.entry(term).or_insert(0) += weight;
        }
    }
}

impl<N: Normalizer> DocumentProcessor for HtmlProcessor<N> {
    fn process(&self, content: &str, url: &str) -> TermFrequencies {
        let mut freqs = TermFrequencies::new();
        if content.trim().is_empty() {
            return freqs;
        }
        let doc = Html::parse_document(content);

        self.add_terms(&mut freqs, &visible_text(&doc), BODY_WEIGHT);
        for el in doc.select(&SEL_EMPHASIS) {
            self.add_terms(&mut freqs, &el.text().collect::<Vec<_>>().join(" "), EMPHASIS_WEIGHT);
        }
        for el in doc.select(&SEL_HEADING) {
            self.add_terms(&mut freqs, &el.text().collect::<Vec<_>>().join(" "), HEADING_WEIGHT);
        }
        if let Some(title) = doc.select(&SEL_TITLE).next() {
            self.add_terms(&mut freqs, &title.text().collect::<String>(), TITLE_WEIGHT);
        }

        tracing::trace!(url, terms = freqs.len(), "processed document");
        freqs
    }
}

/// All text nodes outside of script/style, space separated.
fn visible_text(doc: &Html) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for node in doc.root_element().descendants() {
        let Some(text) = node.value().as_text() else { continue };
        let hidden = node
            .parent()
            .and_then(|p| p.value().as_element().map(|e| matches!(e.name(), "script" | "style")))
            .unwrap_or(false);
        if !hidden {
            parts.push(&**text);
        }
    }
    parts.join(" ")
}

/// Document identity: the URL without its fragment.
pub fn canonical_url(raw: &str) -> String {
    match Url::parse(raw.trim()) {
        Ok(mut u) => {
            u.set_fragment(None);
            u.to_string()
        }
        Err(_) => raw.trim().split('#').next().unwrap_or_default().to_string(),
    }
}
