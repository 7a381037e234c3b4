//! Reduction of partial results
//!
//! Implements the coordinator side of a significant terms aggregation:
//!
//! ```text
//! [Shard 1, Shard 2, ...] → sum totals → merge buckets by key → rescore → sort → truncate
//! ```
//!
//! Summing totals and per-key counts is associative and commutative, so any
//! grouping of the same inputs gives the same counts. Only truncation depends
//! on grouping: a term cut at an intermediate level can no longer reach the
//! final top `required_size`. [`ReducePhase::Intermediate`] keeps a larger
//! candidate set to make that less likely; it is not eliminated.
//!
//! `min_doc_count` is never applied here. A bucket below the threshold on one
//! branch of a reduction tree may pass it once merged further up, so the
//! threshold is enforced at render time.

use crate::error::{Error, Result};
use crate::heuristic::Heuristic;
use crate::key::TermKey;
use crate::metrics;
use crate::model::{AggregationSettings, Bucket, PartialResult, SubAggregations};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::time::Instant;
use tracing::debug;

/// Where a reduce sits in the reduction tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReducePhase {
    /// Below the root: keep `max(required_size, retain)` buckets, 0 keeps all
    Intermediate { retain: usize },
    /// The root: keep `required_size` buckets
    #[default]
    Final,
}

impl ReducePhase {
    pub fn name(&self) -> &'static str {
        match self {
            ReducePhase::Intermediate { .. } => "intermediate",
            ReducePhase::Final => "final",
        }
    }

    fn limit(&self, required_size: usize) -> usize {
        match *self {
            ReducePhase::Final => required_size,
            ReducePhase::Intermediate { retain } => {
                if required_size == 0 || retain == 0 {
                    0
                } else {
                    required_size.max(retain)
                }
            }
        }
    }
}

/// Shape of a tree reduction
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReduceOptions {
    /// Partials combined by one node of the tree
    #[serde(default = "default_fan_in")]
    pub fan_in: usize,

    /// Buckets kept by intermediate nodes (0 = keep everything)
    #[serde(default)]
    pub intermediate_size: usize,
}

fn default_fan_in() -> usize {
    8
}

impl Default for ReduceOptions {
    fn default() -> Self {
        Self {
            fan_in: default_fan_in(),
            intermediate_size: 0,
        }
    }
}

/// Score descending, then key ascending. Total, so output order never
/// depends on input order.
pub fn bucket_order<K: Ord, A>(a: &Bucket<K, A>, b: &Bucket<K, A>) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.key.cmp(&b.key))
}

/// Final reduction of all partials of one aggregation.
pub fn reduce<K, A>(inputs: Vec<PartialResult<K, A>>) -> Result<PartialResult<K, A>>
where
    K: TermKey,
    A: SubAggregations,
{
    reduce_with(inputs, ReducePhase::Final)
}

pub fn reduce_with<K, A>(
    inputs: Vec<PartialResult<K, A>>,
    phase: ReducePhase,
) -> Result<PartialResult<K, A>>
where
    K: TermKey,
    A: SubAggregations,
{
    let start = Instant::now();
    let input_count = inputs.len();

    let result = merge_partials(inputs, phase);
    match &result {
        Ok(merged) => {
            debug!(
                "Reduced {} partials of '{}' ({} phase): {} buckets, subset_size={}, superset_size={}",
                input_count,
                merged.name(),
                phase.name(),
                merged.len(),
                merged.subset_size(),
                merged.superset_size()
            );
            metrics::record_reduce(phase.name(), input_count, merged.len(), start.elapsed());
        }
        Err(e) => metrics::record_reduce_error(phase.name(), e.error_type()),
    }
    result
}

fn add_count(acc: u64, value: u64, field: &'static str) -> Result<u64> {
    acc.checked_add(value).ok_or(Error::CountOverflow { field })
}

fn sum_counts(mut counts: impl Iterator<Item = u64>, field: &'static str) -> Result<u64> {
    counts.try_fold(0u64, |acc, count| add_count(acc, count, field))
}

fn merge_partials<K, A>(
    inputs: Vec<PartialResult<K, A>>,
    phase: ReducePhase,
) -> Result<PartialResult<K, A>>
where
    K: TermKey,
    A: SubAggregations,
{
    let first = inputs.first().ok_or(Error::EmptyReduce)?;
    let name = first.name().to_string();
    let mut settings = *first.settings();
    for input in &inputs[1..] {
        check_compatible(&settings, input.settings())?;
        if settings.format.is_default() && !input.format().is_default() {
            settings.format = input.format();
        }
    }

    let subset_size = sum_counts(inputs.iter().map(|p| p.subset_size()), "subset_size")?;
    let superset_size = sum_counts(inputs.iter().map(|p| p.superset_size()), "superset_size")?;

    let mut positions: HashMap<K, usize> = HashMap::new();
    let mut buckets: Vec<Bucket<K, A>> = Vec::new();
    for input in inputs {
        for bucket in input.into_buckets() {
            match positions.get(&bucket.key) {
                Some(&pos) => {
                    let acc = &mut buckets[pos];
                    acc.subset_df =
                        add_count(acc.subset_df, bucket.subset_df, "bucket.subset_df")?;
                    acc.superset_df =
                        add_count(acc.superset_df, bucket.superset_df, "bucket.superset_df")?;
                    acc.aggregations.merge(bucket.aggregations)?;
                }
                None => {
                    positions.insert(bucket.key.clone(), buckets.len());
                    buckets.push(bucket);
                }
            }
        }
    }

    // scores from the inputs were computed against their own totals
    for bucket in &mut buckets {
        bucket.score = settings.heuristic.score(
            bucket.subset_df,
            subset_size,
            bucket.superset_df,
            superset_size,
        );
    }

    buckets.sort_by(bucket_order);

    let limit = phase.limit(settings.required_size);
    if limit > 0 {
        buckets.truncate(limit);
    }

    Ok(PartialResult::new(
        name,
        settings,
        subset_size,
        superset_size,
        buckets,
    ))
}

fn check_compatible(expected: &AggregationSettings, found: &AggregationSettings) -> Result<()> {
    if expected.required_size != found.required_size {
        return Err(Error::mismatch(
            "required_size",
            expected.required_size,
            found.required_size,
        ));
    }
    if expected.min_doc_count != found.min_doc_count {
        return Err(Error::mismatch(
            "min_doc_count",
            expected.min_doc_count,
            found.min_doc_count,
        ));
    }
    if expected.heuristic != found.heuristic {
        return Err(Error::mismatch(
            "heuristic",
            expected.heuristic,
            found.heuristic,
        ));
    }
    Ok(())
}

/// Reduces in a balanced tree of `fan_in` partials per node, running the
/// nodes of each level in parallel. Intermediate nodes keep
/// `intermediate_size` buckets; the root is a final reduce.
pub fn reduce_tree<K, A>(
    inputs: Vec<PartialResult<K, A>>,
    options: &ReduceOptions,
) -> Result<PartialResult<K, A>>
where
    K: TermKey,
    A: SubAggregations,
{
    if inputs.is_empty() {
        return Err(Error::EmptyReduce);
    }
    let fan_in = options.fan_in.max(2);
    let phase = ReducePhase::Intermediate {
        retain: options.intermediate_size,
    };

    let mut level = inputs;
    let mut depth = 0;
    while level.len() > fan_in {
        depth += 1;
        debug!(
            "Tree reduce level {}: {} partials, fan_in={}",
            depth,
            level.len(),
            fan_in
        );
        level = reduce_level(level, fan_in, phase)?;
    }
    reduce(level)
}

fn reduce_level<K, A>(
    level: Vec<PartialResult<K, A>>,
    fan_in: usize,
    phase: ReducePhase,
) -> Result<Vec<PartialResult<K, A>>>
where
    K: TermKey,
    A: SubAggregations,
{
    let mut groups: Vec<Vec<PartialResult<K, A>>> = Vec::with_capacity(level.len() / fan_in + 1);
    let mut iter = level.into_iter().peekable();
    while iter.peek().is_some() {
        groups.push(iter.by_ref().take(fan_in).collect());
    }

    groups
        .into_par_iter()
        .map(|group| reduce_with(group, phase))
        .collect()
}
