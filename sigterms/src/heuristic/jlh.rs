use super::{Heuristic, TermFrequencies};
use crate::error::DecodeError;
use crate::stream::{WireReader, WireWriter};
use serde::{Deserialize, Serialize};

/// Blend of absolute and relative probability change.
///
/// Absolute change alone favours very common words, relative change alone
/// favours rare ones such as misspellings; their product lands on
/// medium-rare terms. Terms that are not more frequent in the subset score 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jlh {}

impl Jlh {
    pub const NAME: &'static str = "jlh";

    pub(super) fn read_params(_input: &mut WireReader<'_>) -> Result<Self, DecodeError> {
        Ok(Jlh {})
    }
}

impl Heuristic for Jlh {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn raw_score(&self, freqs: TermFrequencies) -> f64 {
        let subset_probability = freqs.subset_df as f64 / freqs.subset_size as f64;
        let superset_probability = freqs.superset_df as f64 / freqs.superset_size as f64;

        let absolute_change = subset_probability - superset_probability;
        if absolute_change <= 0.0 {
            return 0.0;
        }
        let relative_change = subset_probability / superset_probability;
        absolute_change * relative_change
    }

    fn write_params(&self, _out: &mut WireWriter) {}
}
