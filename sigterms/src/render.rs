//! Output document for a finished significant terms aggregation
//!
//! Mirrors the Elasticsearch response shape:
//!
//! ```json
//! {
//!   "doc_count": 30,
//!   "bg_count": 300,
//!   "buckets": [
//!     { "key": "foo", "doc_count": 5, "score": 0.76, "bg_count": 9 }
//!   ]
//! }
//! ```
//!
//! `min_doc_count` is applied here, on every path, including results that
//! never went through a reduce.

use crate::error::Result;
use crate::key::TermKey;
use crate::metrics;
use crate::model::{PartialResult, SubAggregations};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::trace;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignificantTermsOutput {
    /// Subset size
    pub doc_count: u64,
    /// Background (superset) size
    pub bg_count: u64,
    pub buckets: Vec<RenderedBucket>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedBucket {
    pub key: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_as_string: Option<String>,
    pub doc_count: u64,
    pub score: f64,
    pub bg_count: u64,
    #[serde(flatten)]
    pub sub_aggs: Map<String, Value>,
}

/// Renders the buckets that pass `min_doc_count`, in stored order.
pub fn render<K, A>(partial: &PartialResult<K, A>) -> SignificantTermsOutput
where
    K: TermKey,
    A: SubAggregations,
{
    let format = partial.format();
    let buckets: Vec<RenderedBucket> = partial
        .visible_buckets()
        .map(|bucket| {
            let (key, key_as_string) = bucket.key.render_key(format);
            RenderedBucket {
                key,
                key_as_string,
                doc_count: bucket.subset_df,
                score: bucket.score,
                bg_count: bucket.superset_df,
                sub_aggs: bucket.aggregations.render(),
            }
        })
        .collect();

    let filtered = partial.len() - buckets.len();
    trace!(
        "Rendered '{}': {} buckets, {} below min_doc_count",
        partial.name(),
        buckets.len(),
        filtered
    );
    metrics::record_render(buckets.len(), filtered);

    SignificantTermsOutput {
        doc_count: partial.subset_size(),
        bg_count: partial.superset_size(),
        buckets,
    }
}

/// Renders under the aggregation name: `{ "<name>": { ... } }`.
pub fn render_named<K, A>(partial: &PartialResult<K, A>) -> Result<Value>
where
    K: TermKey,
    A: SubAggregations,
{
    let body = serde_json::to_value(render(partial))?;
    let mut named = Map::new();
    named.insert(partial.name().to_string(), body);
    Ok(Value::Object(named))
}
