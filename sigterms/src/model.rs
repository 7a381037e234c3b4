//! Buckets and partial results
//!
//! A [`PartialResult`] is what one shard (or one reduce step) knows about a
//! significant terms aggregation: the subset/superset totals it saw, the
//! aggregation settings, and one [`Bucket`] per term. Buckets are kept in a
//! dense vector; a term to position index is built only when a lookup by key
//! is requested and is dropped whenever the bucket set changes.

use crate::error::{DecodeError, EncodeError, Result};
use crate::format::DocValueFormat;
use crate::heuristic::{Heuristic, SignificanceHeuristic};
use crate::key::{Term, TermKey};
use crate::stream::{WireReader, WireWriter};
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;

/// Contract for the nested aggregation tree hanging off each bucket.
///
/// The reduce engine never looks inside; it only merges the trees of buckets
/// that share a key, renders them next to the bucket fields, and moves them
/// across the wire.
pub trait SubAggregations: Clone + fmt::Debug + Send + Sync + 'static {
    /// Smallest possible encoding, used to bound bucket counts on decode
    const MIN_ENCODED_LEN: usize = 1;

    /// Folds `other` into `self`. Must be associative.
    fn merge(&mut self, other: Self) -> Result<()>;

    /// Fields appended to the rendered bucket
    fn render(&self) -> Map<String, Value>;

    /// Fails for content the matching `read` would reject.
    fn write(&self, out: &mut WireWriter) -> std::result::Result<(), EncodeError>;

    fn read(input: &mut WireReader<'_>) -> std::result::Result<Self, DecodeError>;
}

/// Buckets without nested aggregations. Encoded as an empty aggregation list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoSubAggregations;

impl SubAggregations for NoSubAggregations {
    fn merge(&mut self, _other: Self) -> Result<()> {
        Ok(())
    }

    fn render(&self) -> Map<String, Value> {
        Map::new()
    }

    fn write(&self, out: &mut WireWriter) -> std::result::Result<(), EncodeError> {
        out.write_vint(0);
        Ok(())
    }

    fn read(input: &mut WireReader<'_>) -> std::result::Result<Self, DecodeError> {
        match input.read_vint("bucket.aggregations")? {
            0 => Ok(NoSubAggregations),
            n => Err(DecodeError::new(
                "bucket.aggregations",
                format!("expected no sub-aggregations, found {}", n),
            )),
        }
    }
}

/// Statistics for one term.
#[derive(Debug, Clone, PartialEq)]
pub struct Bucket<K = Term, A = NoSubAggregations> {
    pub key: K,
    /// Documents in the subset containing the term
    pub subset_df: u64,
    /// Documents in the background containing the term
    pub superset_df: u64,
    /// Derived from the counts; recomputed after every merge
    pub score: f64,
    pub aggregations: A,
}

impl<K: TermKey, A: SubAggregations> Bucket<K, A> {
    pub fn new(key: impl Into<K>, subset_df: u64, superset_df: u64, aggregations: A) -> Self {
        Self {
            key: key.into(),
            subset_df,
            superset_df,
            score: 0.0,
            aggregations,
        }
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.score = score;
        self
    }

    pub fn doc_count(&self) -> u64 {
        self.subset_df
    }

    pub fn update_score(
        &mut self,
        heuristic: &SignificanceHeuristic,
        subset_size: u64,
        superset_size: u64,
    ) {
        self.score = heuristic.score(self.subset_df, subset_size, self.superset_df, superset_size);
    }
}

impl<K: TermKey> Bucket<K, NoSubAggregations> {
    pub fn leaf(key: impl Into<K>, subset_df: u64, superset_df: u64) -> Self {
        Self::new(key, subset_df, superset_df, NoSubAggregations)
    }
}

/// Settings every partial of one aggregation must agree on, plus the display format.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AggregationSettings {
    /// Maximum buckets kept after a reduce; 0 keeps all
    pub required_size: usize,
    /// Buckets below this subset frequency are not rendered
    pub min_doc_count: u64,
    pub heuristic: SignificanceHeuristic,
    pub format: DocValueFormat,
}

impl Default for AggregationSettings {
    fn default() -> Self {
        Self {
            required_size: 10,
            min_doc_count: 3,
            heuristic: SignificanceHeuristic::default(),
            format: DocValueFormat::Raw,
        }
    }
}

/// Lazily built key to position map. Never part of a result's identity.
struct TermIndex<K> {
    positions: RwLock<Option<HashMap<K, usize>>>,
}

impl<K: TermKey> TermIndex<K> {
    fn new() -> Self {
        Self {
            positions: RwLock::new(None),
        }
    }

    fn invalidate(&mut self) {
        *self.positions.get_mut() = None;
    }

    fn is_built(&self) -> bool {
        self.positions.read().is_some()
    }

    fn position<A>(&self, buckets: &[Bucket<K, A>], key: &K) -> Option<usize> {
        {
            let guard = self.positions.read();
            if let Some(map) = guard.as_ref() {
                return map.get(key).copied();
            }
        }
        let mut guard = self.positions.write();
        let map = guard.get_or_insert_with(|| {
            buckets
                .iter()
                .enumerate()
                .map(|(pos, bucket)| (bucket.key.clone(), pos))
                .collect()
        });
        map.get(key).copied()
    }
}

impl<K> fmt::Debug for TermIndex<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TermIndex")
            .field("built", &self.positions.read().is_some())
            .finish()
    }
}

/// One shard's (or one reduce step's) significant terms.
///
/// Terms are unique within a result; keeping them unique is the producer's
/// job. Bucket order is only meaningful after a reduce, which sorts by score
/// descending and key ascending.
#[derive(Debug)]
pub struct PartialResult<K = Term, A = NoSubAggregations> {
    name: String,
    settings: AggregationSettings,
    subset_size: u64,
    superset_size: u64,
    buckets: Vec<Bucket<K, A>>,
    index: TermIndex<K>,
}

impl<K: TermKey, A: SubAggregations> PartialResult<K, A> {
    pub fn new(
        name: impl Into<String>,
        settings: AggregationSettings,
        subset_size: u64,
        superset_size: u64,
        buckets: Vec<Bucket<K, A>>,
    ) -> Self {
        Self {
            name: name.into(),
            settings,
            subset_size,
            superset_size,
            buckets,
            index: TermIndex::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn settings(&self) -> &AggregationSettings {
        &self.settings
    }

    pub fn required_size(&self) -> usize {
        self.settings.required_size
    }

    pub fn min_doc_count(&self) -> u64 {
        self.settings.min_doc_count
    }

    pub fn heuristic(&self) -> &SignificanceHeuristic {
        &self.settings.heuristic
    }

    pub fn format(&self) -> DocValueFormat {
        self.settings.format
    }

    pub fn subset_size(&self) -> u64 {
        self.subset_size
    }

    pub fn superset_size(&self) -> u64 {
        self.superset_size
    }

    pub fn buckets(&self) -> &[Bucket<K, A>] {
        &self.buckets
    }

    pub fn into_buckets(self) -> Vec<Bucket<K, A>> {
        self.buckets
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Looks up a bucket by key, building the term index on first use.
    pub fn bucket(&self, key: &K) -> Option<&Bucket<K, A>> {
        self.index
            .position(&self.buckets, key)
            .and_then(|pos| self.buckets.get(pos))
    }

    pub fn is_indexed(&self) -> bool {
        self.index.is_built()
    }

    pub fn set_buckets(&mut self, buckets: Vec<Bucket<K, A>>) {
        self.buckets = buckets;
        self.index.invalidate();
    }

    pub fn push_bucket(&mut self, bucket: Bucket<K, A>) {
        self.buckets.push(bucket);
        self.index.invalidate();
    }

    /// Recomputes every bucket score from its counts and this result's totals.
    pub fn rescore(&mut self) {
        let heuristic = self.settings.heuristic;
        for bucket in &mut self.buckets {
            bucket.update_score(&heuristic, self.subset_size, self.superset_size);
        }
    }

    /// Buckets that pass `min_doc_count`, in stored order.
    pub fn visible_buckets(&self) -> impl Iterator<Item = &Bucket<K, A>> {
        let min_doc_count = self.settings.min_doc_count;
        self.buckets
            .iter()
            .filter(move |bucket| bucket.subset_df >= min_doc_count)
    }
}

impl<K: TermKey, A: SubAggregations> Clone for PartialResult<K, A> {
    fn clone(&self) -> Self {
        Self::new(
            self.name.clone(),
            self.settings,
            self.subset_size,
            self.superset_size,
            self.buckets.clone(),
        )
    }
}

impl<K: TermKey, A: SubAggregations + PartialEq> PartialEq for PartialResult<K, A> {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.settings == other.settings
            && self.subset_size == other.subset_size
            && self.superset_size == other.superset_size
            && self.buckets == other.buckets
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> PartialResult {
        PartialResult::new(
            "tags",
            AggregationSettings::default(),
            10,
            100,
            vec![Bucket::leaf("foo", 3, 5), Bucket::leaf("bar", 1, 1)],
        )
    }

    #[test]
    fn test_lookup_builds_index_lazily() {
        let partial = sample();
        assert!(!partial.is_indexed());

        let foo = partial.bucket(&Term::from("foo")).unwrap();
        assert_eq!(foo.subset_df, 3);
        assert!(partial.is_indexed());
        assert!(partial.bucket(&Term::from("baz")).is_none());
    }

    #[test]
    fn test_mutation_invalidates_index() {
        let mut partial = sample();
        assert!(partial.bucket(&Term::from("foo")).is_some());

        partial.push_bucket(Bucket::leaf("baz", 2, 2));
        assert!(!partial.is_indexed());
        assert_eq!(partial.bucket(&Term::from("baz")).unwrap().superset_df, 2);

        partial.set_buckets(vec![Bucket::leaf("qux", 4, 8)]);
        assert!(!partial.is_indexed());
        assert!(partial.bucket(&Term::from("foo")).is_none());
        assert!(partial.bucket(&Term::from("qux")).is_some());
    }

    #[test]
    fn test_index_is_not_part_of_identity() {
        let indexed = sample();
        indexed.bucket(&Term::from("foo"));
        let fresh = sample();
        assert_eq!(indexed, fresh);

        let cloned = indexed.clone();
        assert!(!cloned.is_indexed());
        assert_eq!(cloned, indexed);
    }

    #[test]
    fn test_rescore_uses_result_totals() {
        let mut partial = sample();
        partial.rescore();
        let heuristic = SignificanceHeuristic::default();
        assert_eq!(partial.buckets()[0].score, heuristic.score(3, 10, 5, 100));
        assert_eq!(partial.buckets()[1].score, heuristic.score(1, 10, 1, 100));
    }

    #[test]
    fn test_visible_buckets_apply_min_doc_count() {
        let partial = sample();
        let visible: Vec<_> = partial.visible_buckets().map(|b| b.key.clone()).collect();
        assert_eq!(visible, vec![Term::from("foo")]);
    }

    #[test]
    fn test_no_sub_aggregations_wire() {
        let mut out = WireWriter::new();
        NoSubAggregations.write(&mut out).unwrap();
        let bytes = out.freeze();
        assert_eq!(bytes.as_ref(), &[0]);
        NoSubAggregations::read(&mut WireReader::new(&bytes)).unwrap();

        let err = NoSubAggregations::read(&mut WireReader::new(&[2])).unwrap_err();
        assert_eq!(err.field, "bucket.aggregations");
    }
}
