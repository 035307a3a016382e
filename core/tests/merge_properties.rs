//! Property tests for merge order independence and shard coverage.

use alphadex_core::partition::{find_chunk, partition, ShardKey};
use alphadex_core::{InvertedIndex, TermFrequencies};
use proptest::prelude::*;

fn term_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z0-9][a-z0-9]{0,6}").unwrap()
}

fn doc_strategy() -> impl Strategy<Value = (String, TermFrequencies)> {
    (
        prop::sample::select(vec!["http://a/", "http://b/", "http://c/", "http://d/", "http://e/"]),
        prop::collection::hash_map(term_strategy(), 1u32..20, 1..8),
    )
        .prop_map(|(url, freqs)| (url.to_string(), freqs))
}

/// A corpus plus the sizes of the batches it is cut into.
fn batched_corpus() -> impl Strategy<Value = (Vec<(String, TermFrequencies)>, Vec<usize>)> {
    prop::collection::vec(doc_strategy(), 1..30).prop_flat_map(|docs| {
        let n = docs.len();
        (Just(docs), prop::collection::vec(1..=n, 1..6))
    })
}

fn into_partials(docs: &[(String, TermFrequencies)], cuts: &[usize]) -> Vec<InvertedIndex> {
    let mut partials = Vec::new();
    let mut rest = docs;
    let mut sizes = cuts.iter().cycle();
    while !rest.is_empty() {
        let take = (*sizes.next().unwrap()).min(rest.len());
        let (batch, tail) = rest.split_at(take);
        let mut partial = InvertedIndex::new();
        for (doc, freqs) in batch {
            partial.add_document(doc, freqs);
        }
        partials.push(partial);
        rest = tail;
    }
    partials
}

fn fold(partials: impl IntoIterator<Item = InvertedIndex>) -> InvertedIndex {
    let mut merged = InvertedIndex::new();
    for p in partials {
        merged.merge(p);
    }
    merged
}

proptest! {
    #[test]
    fn merge_order_never_matters((docs, cuts) in batched_corpus(), seed in any::<u64>()) {
        let partials = into_partials(&docs, &cuts);
        let forward = fold(partials.clone());
        let reversed = fold(partials.iter().rev().cloned());

        let mut shuffled = partials.clone();
        let len = shuffled.len();
        for i in (1..len).rev() {
            let j = (seed.wrapping_mul(6364136223846793005).wrapping_add(i as u64) % (i as u64 + 1)) as usize;
            shuffled.swap(i, j);
        }
        let permuted = fold(shuffled);

        prop_assert_eq!(&forward, &reversed);
        prop_assert_eq!(&forward, &permuted);
    }

    #[test]
    fn batching_matches_single_pass((docs, cuts) in batched_corpus()) {
        let batched = fold(into_partials(&docs, &cuts));
        let mut single = InvertedIndex::new();
        for (doc, freqs) in &docs {
            single.add_document(doc, freqs);
        }
        prop_assert_eq!(batched, single);
    }

    #[test]
    fn merge_is_associative(a in doc_strategy(), b in doc_strategy(), c in doc_strategy()) {
        let one = |(doc, f): &(String, TermFrequencies)| {
            let mut idx = InvertedIndex::new();
            idx.add_document(doc, f);
            idx
        };
        let mut left = one(&a);
        left.merge(one(&b));
        left.merge(one(&c));

        let mut bc = one(&b);
        bc.merge(one(&c));
        let mut right = one(&a);
        right.merge(bc);

        prop_assert_eq!(left, right);
    }

    #[test]
    fn every_term_maps_to_exactly_one_chunk(docs in prop::collection::vec(doc_strategy(), 1..20), chunk_bytes in 16u64..2048) {
        let mut index = InvertedIndex::new();
        for (doc, freqs) in &docs {
            index.add_document(doc, freqs);
        }
        let shards = partition(index.clone(), chunk_bytes).unwrap();

        for (term, postings) in index.iter() {
            let key = ShardKey::for_term(term).unwrap();
            let holders: Vec<_> = shards
                .iter()
                .flat_map(|s| s.chunks.iter().enumerate().map(move |(id, c)| (s.key, id, c)))
                .filter(|(_, _, c)| c.contains_key(term))
                .collect();
            prop_assert_eq!(holders.len(), 1);
            let (shard_key, id, chunk) = holders[0];
            prop_assert_eq!(shard_key, key);
            prop_assert_eq!(&chunk[term], postings);

            let shard = shards.iter().find(|s| s.key == key).unwrap();
            prop_assert_eq!(find_chunk(&shard.lookup(), term), Some(id as u32));
        }
    }
}
