use super::{Heuristic, TermFrequencies};
use crate::error::DecodeError;
use crate::stream::{WireReader, WireWriter};
use serde::{Deserialize, Serialize};

/// Fraction of a term's background documents that fall in the subset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PercentageScore {}

impl PercentageScore {
    pub const NAME: &'static str = "percentage";

    pub(super) fn read_params(_input: &mut WireReader<'_>) -> Result<Self, DecodeError> {
        Ok(PercentageScore {})
    }
}

impl Heuristic for PercentageScore {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn raw_score(&self, freqs: TermFrequencies) -> f64 {
        if freqs.superset_df == 0 {
            return 0.0;
        }
        freqs.subset_df as f64 / freqs.superset_df as f64
    }

    fn write_params(&self, _out: &mut WireWriter) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentage_score() {
        assert_eq!(PercentageScore {}.score(3, 10, 4, 100), 0.75);
        assert_eq!(PercentageScore {}.score(4, 10, 4, 100), 1.0);
    }

    #[test]
    fn test_percentage_zero_background_df() {
        assert_eq!(PercentageScore {}.score(0, 10, 0, 100), 0.0);
    }
}
