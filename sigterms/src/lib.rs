//! Significant terms reduce engine
//!
//! Shards each produce a [`PartialResult`] of per-term counts. The coordinator
//! decodes them ([`codec`]), merges them into one result with scores
//! recomputed by the configured heuristic ([`reduce`]), and turns the final
//! result into an output document ([`render`]).

pub mod codec;
pub mod config;
pub mod error;
pub mod format;
pub mod heuristic;
pub mod key;
pub mod metrics;
pub mod model;
pub mod reduce;
pub mod render;
pub mod stream;

pub use config::SignificantTermsConfig;
pub use error::{DecodeError, EncodeError, Error, Result};
pub use format::DocValueFormat;
pub use heuristic::{Heuristic, SignificanceHeuristic};
pub use key::{Term, TermKey};
pub use model::{AggregationSettings, Bucket, NoSubAggregations, PartialResult, SubAggregations};
pub use reduce::{reduce, reduce_tree, reduce_with, ReduceOptions, ReducePhase};
pub use render::{render, render_named, SignificantTermsOutput};
