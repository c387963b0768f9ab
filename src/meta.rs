//! Categorical meta-data bags.
//!
//! A [`MetaCollection`] maps category tags to cumulative weights and knows
//! how to evaluate the Shannon entropy of its weight distribution. Entries
//! are kept sorted by tag in a small inline vector, so bags of a handful of
//! categories never allocate and merging two bags is a linear two-pointer
//! walk.

use crate::infomath::plogp;
use smallvec::SmallVec;

/// Weight below which an entry counts as removed.
const WEIGHT_EPSILON: f64 = 1e-15;

/// A bag of categorical tags with cumulative weights.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MetaCollection {
    /// `(tag, weight)` entries, sorted by tag, weights all positive.
    entries: SmallVec<[(u32, f64); 4]>,
}

impl MetaCollection {
    /// An empty bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Does the bag contain no categories?
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of distinct categories.
    pub fn num_categories(&self) -> usize {
        self.entries.len()
    }

    /// Total weight over all categories.
    pub fn total_weight(&self) -> f64 {
        self.entries.iter().map(|&(_, w)| w).sum()
    }

    /// The weight of `tag`, or zero.
    pub fn weight(&self, tag: u32) -> f64 {
        match self.entries.binary_search_by_key(&tag, |&(t, _)| t) {
            Ok(i) => self.entries[i].1,
            Err(_) => 0.0,
        }
    }

    /// Add `weight` to `tag`.
    pub fn add(&mut self, tag: u32, weight: f64) {
        debug_assert!(weight >= 0.0, "negative meta weight {weight}");
        match self.entries.binary_search_by_key(&tag, |&(t, _)| t) {
            Ok(i) => self.entries[i].1 += weight,
            Err(i) => self.entries.insert(i, (tag, weight)),
        }
    }

    /// Add every entry of `other` into this bag.
    pub fn add_all(&mut self, other: &MetaCollection) {
        for &(tag, weight) in &other.entries {
            self.add(tag, weight);
        }
    }

    /// Remove every entry of `other` from this bag; the inverse of
    /// [`add_all`](Self::add_all) for the same argument.
    ///
    /// Entries whose weight returns to zero are dropped. Removing weight that
    /// was never added is a caller bug.
    pub fn remove_all(&mut self, other: &MetaCollection) {
        for &(tag, weight) in &other.entries {
            match self.entries.binary_search_by_key(&tag, |&(t, _)| t) {
                Ok(i) => {
                    self.entries[i].1 -= weight;
                    debug_assert!(
                        self.entries[i].1 > -WEIGHT_EPSILON,
                        "meta weight for tag {tag} went negative"
                    );
                    if self.entries[i].1 <= WEIGHT_EPSILON {
                        self.entries.remove(i);
                    }
                }
                Err(_) => {
                    debug_assert!(false, "removing tag {tag} that is not in the bag");
                }
            }
        }
    }

    /// Shannon entropy of the weight distribution:
    /// `sum -(w_i/W) * log2(w_i/W)` with `W` the total weight.
    pub fn entropy(&self) -> f64 {
        entropy_of_terms(self.entries.iter().map(|&(_, w)| w))
    }

    /// Entropy this bag would have with `other` added, without mutating
    /// either bag.
    pub fn entropy_with(&self, other: &MetaCollection) -> f64 {
        entropy_of_terms(merge_weights(&self.entries, &other.entries, 1.0))
    }

    /// Entropy this bag would have with `other` removed, without mutating
    /// either bag.
    pub fn entropy_without(&self, other: &MetaCollection) -> f64 {
        entropy_of_terms(merge_weights(&self.entries, &other.entries, -1.0))
    }

    /// Iterate over `(tag, weight)` entries in tag order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, f64)> + '_ {
        self.entries.iter().copied()
    }
}

/// Entropy of an unnormalized weight sequence.
///
/// With `W = sum w_i`: `H = (plogp(W) - sum plogp(w_i)) / W`, which equals
/// `sum -(w_i/W) log2(w_i/W)`. Weights at or below the drop threshold
/// contribute nothing.
fn entropy_of_terms(weights: impl Iterator<Item = f64>) -> f64 {
    let mut total = 0.0;
    let mut sum_plogp = 0.0;
    for w in weights {
        if w > WEIGHT_EPSILON {
            total += w;
            sum_plogp += plogp(w);
        }
    }
    if total > 0.0 {
        (plogp(total) - sum_plogp) / total
    } else {
        0.0
    }
}

/// Two-pointer merge of sorted `(tag, weight)` slices, yielding the weights
/// of `a + sign * b` per tag.
fn merge_weights<'a>(
    a: &'a [(u32, f64)],
    b: &'a [(u32, f64)],
    sign: f64,
) -> impl Iterator<Item = f64> + 'a {
    let mut i = 0;
    let mut j = 0;
    core::iter::from_fn(move || loop {
        match (a.get(i), b.get(j)) {
            (Some(&(ta, wa)), Some(&(tb, wb))) => {
                if ta < tb {
                    i += 1;
                    return Some(wa);
                } else if tb < ta {
                    j += 1;
                    return Some(sign * wb);
                } else {
                    i += 1;
                    j += 1;
                    return Some(wa + sign * wb);
                }
            }
            (Some(&(_, wa)), None) => {
                i += 1;
                return Some(wa);
            }
            (None, Some(&(_, wb))) => {
                j += 1;
                return Some(sign * wb);
            }
            (None, None) => return None,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infomath::is_approx_eq;

    fn bag(entries: &[(u32, f64)]) -> MetaCollection {
        let mut c = MetaCollection::new();
        for &(t, w) in entries {
            c.add(t, w);
        }
        c
    }

    #[test]
    fn entropy_of_two_to_one_split() {
        // Tags {A, A, B} with unit weights: H = -(2/3)log2(2/3) - (1/3)log2(1/3)
        let c = bag(&[(0, 1.0), (0, 1.0), (1, 1.0)]);
        assert!(is_approx_eq(c.entropy(), 0.9182958340544896, 1e-12));
    }

    #[test]
    fn entropy_edge_cases() {
        assert_eq!(MetaCollection::new().entropy(), 0.0);
        assert_eq!(bag(&[(3, 2.5)]).entropy(), 0.0);
        assert!(is_approx_eq(bag(&[(0, 1.0), (1, 1.0)]).entropy(), 1.0, 1e-12));
    }

    #[test]
    fn add_then_remove_is_inverse() {
        let mut c = bag(&[(0, 0.4), (1, 0.6)]);
        let before = c.clone();
        let d = bag(&[(0, 0.1), (2, 0.3)]);
        c.add_all(&d);
        c.remove_all(&d);
        assert_eq!(c.num_categories(), before.num_categories());
        for (tag, w) in before.iter() {
            assert!(is_approx_eq(c.weight(tag), w, 1e-12));
        }
    }

    #[test]
    fn merge_entropy_matches_mutation() {
        let a = bag(&[(0, 0.4), (1, 0.6), (5, 0.2)]);
        let b = bag(&[(1, 0.3), (7, 0.1)]);

        let mut merged = a.clone();
        merged.add_all(&b);
        assert!(is_approx_eq(a.entropy_with(&b), merged.entropy(), 1e-12));

        let mut removed = merged.clone();
        removed.remove_all(&b);
        assert!(is_approx_eq(merged.entropy_without(&b), removed.entropy(), 1e-12));
        // And the with/without pair is a fixpoint on the original bag.
        assert!(is_approx_eq(merged.entropy_without(&b), a.entropy(), 1e-12));
    }

    #[test]
    fn removing_everything_leaves_empty_bag() {
        let a = bag(&[(2, 0.5)]);
        let mut c = a.clone();
        c.remove_all(&a);
        assert!(c.is_empty());
        assert_eq!(c.entropy(), 0.0);
    }
}
