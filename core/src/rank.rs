use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

/// Heap entry: higher score wins, then the earlier candidate.
#[derive(Debug)]
struct Ranked<T> {
    score: f64,
    seq: usize,
    item: T,
}

impl<T> PartialEq for Ranked<T> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<T> Eq for Ranked<T> {}

impl<T> PartialOrd for Ranked<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Ranked<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .total_cmp(&other.score)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Keeps the `k` best `(item, score)` pairs without sorting the whole input.
///
/// Output is descending by score; equal scores keep their input order.
pub fn top_k<T, I>(candidates: I, k: usize) -> Vec<(T, f64)>
where
    I: IntoIterator<Item = (T, f64)>,
{
    if k == 0 {
        return Vec::new();
    }
    let mut heap: BinaryHeap<Reverse<Ranked<T>>> = BinaryHeap::with_capacity(k + 1);

    for (seq, (item, score)) in candidates.into_iter().enumerate() {
        let entry = Ranked { score, seq, item };
        if heap.len() < k {
            heap.push(Reverse(entry));
        } else if let Some(Reverse(worst)) = heap.peek() {
            if entry > *worst {
                heap.pop();
                heap.push(Reverse(entry));
            }
        }
    }

    let mut best: Vec<Ranked<T>> = heap.into_iter().map(|Reverse(r)| r).collect();
    best.sort_by(|a, b| b.cmp(a));
    best.into_iter().map(|r| (r.item, r.score)).collect()
}
