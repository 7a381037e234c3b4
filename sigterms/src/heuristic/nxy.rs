//! Heuristics built on the 2x2 contingency table of term presence versus
//! subset membership.

use super::{Heuristic, TermFrequencies};
use crate::error::DecodeError;
use crate::stream::{WireReader, WireWriter};
use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

/// Contingency table. First index: term present, second: document in subset.
/// `_` marks a marginal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(super) struct Frequencies {
    pub n00: f64,
    pub n01: f64,
    pub n10: f64,
    pub n11: f64,
    pub n0_: f64,
    pub n1_: f64,
    pub n_0: f64,
    pub n_1: f64,
    pub n: f64,
}

impl Frequencies {
    pub(super) fn compute(freqs: TermFrequencies, background_is_superset: bool) -> Self {
        let subset_df = freqs.subset_df as f64;
        let subset_size = freqs.subset_size as f64;
        let superset_df = freqs.superset_df as f64;
        let superset_size = freqs.superset_size as f64;

        if background_is_superset {
            Frequencies {
                n00: superset_size - superset_df - (subset_size - subset_df),
                n01: subset_size - subset_df,
                n10: superset_df - subset_df,
                n11: subset_df,
                n0_: superset_size - superset_df,
                n1_: superset_df,
                n_0: superset_size - subset_size,
                n_1: subset_size,
                n: superset_size,
            }
        } else {
            Frequencies {
                n00: superset_size - superset_df,
                n01: subset_size - subset_df,
                n10: superset_df,
                n11: subset_df,
                n0_: superset_size - superset_df + subset_size - subset_df,
                n1_: superset_df + subset_df,
                n_0: superset_size,
                n_1: subset_size,
                n: superset_size + subset_size,
            }
        }
    }

    /// Term is rarer in the subset than in the rest of the background
    fn is_negative(&self) -> bool {
        self.n11 / self.n_1 < self.n10 / self.n_0
    }
}

fn read_flags(input: &mut WireReader<'_>) -> Result<(bool, bool), DecodeError> {
    let include_negatives = input.read_bool("heuristic.include_negatives")?;
    let background_is_superset = input.read_bool("heuristic.background_is_superset")?;
    Ok((include_negatives, background_is_superset))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutualInformation {
    #[serde(default)]
    pub include_negatives: bool,
    #[serde(default = "default_true")]
    pub background_is_superset: bool,
}

impl Default for MutualInformation {
    fn default() -> Self {
        Self {
            include_negatives: false,
            background_is_superset: true,
        }
    }
}

impl MutualInformation {
    pub const NAME: &'static str = "mutual_information";

    pub(super) fn read_params(input: &mut WireReader<'_>) -> Result<Self, DecodeError> {
        let (include_negatives, background_is_superset) = read_flags(input)?;
        Ok(Self {
            include_negatives,
            background_is_superset,
        })
    }

    fn term(nxy: f64, nx_: f64, n_y: f64, n: f64) -> f64 {
        let numerator = (n * nxy).abs();
        let denominator = (nx_ * n_y).abs();
        let factor = (nxy / n).abs();
        if numerator < 1e-7 && factor < 1e-7 {
            0.0
        } else {
            factor * (numerator / denominator).ln()
        }
    }
}

impl Heuristic for MutualInformation {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn raw_score(&self, freqs: TermFrequencies) -> f64 {
        let f = Frequencies::compute(freqs, self.background_is_superset);
        if !self.include_negatives && f.is_negative() {
            return 0.0;
        }
        (Self::term(f.n00, f.n0_, f.n_0, f.n)
            + Self::term(f.n01, f.n0_, f.n_1, f.n)
            + Self::term(f.n10, f.n1_, f.n_0, f.n)
            + Self::term(f.n11, f.n1_, f.n_1, f.n))
            / std::f64::consts::LN_2
    }

    fn write_params(&self, out: &mut WireWriter) {
        out.write_bool(self.include_negatives);
        out.write_bool(self.background_is_superset);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChiSquare {
    #[serde(default)]
    pub include_negatives: bool,
    #[serde(default = "default_true")]
    pub background_is_superset: bool,
}

impl Default for ChiSquare {
    fn default() -> Self {
        Self {
            include_negatives: false,
            background_is_superset: true,
        }
    }
}

impl ChiSquare {
    pub const NAME: &'static str = "chi_square";

    pub(super) fn read_params(input: &mut WireReader<'_>) -> Result<Self, DecodeError> {
        let (include_negatives, background_is_superset) = read_flags(input)?;
        Ok(Self {
            include_negatives,
            background_is_superset,
        })
    }
}

impl Heuristic for ChiSquare {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn raw_score(&self, freqs: TermFrequencies) -> f64 {
        let f = Frequencies::compute(freqs, self.background_is_superset);
        if !self.include_negatives && f.is_negative() {
            return 0.0;
        }
        f.n * (f.n11 * f.n00 - f.n01 * f.n10).powi(2) / (f.n_1 * f.n1_ * f.n0_ * f.n_0)
    }

    fn write_params(&self, out: &mut WireWriter) {
        out.write_bool(self.include_negatives);
        out.write_bool(self.background_is_superset);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn freqs(
        subset_df: u64,
        subset_size: u64,
        superset_df: u64,
        superset_size: u64,
    ) -> TermFrequencies {
        TermFrequencies {
            subset_df,
            subset_size,
            superset_df,
            superset_size,
        }
    }

    #[test]
    fn test_contingency_table_superset_background() {
        let f = Frequencies::compute(freqs(2, 10, 4, 100), true);
        assert_eq!(f.n00, 88.0);
        assert_eq!(f.n01, 8.0);
        assert_eq!(f.n10, 2.0);
        assert_eq!(f.n11, 2.0);
        assert_eq!(f.n0_, 96.0);
        assert_eq!(f.n1_, 4.0);
        assert_eq!(f.n_0, 90.0);
        assert_eq!(f.n_1, 10.0);
        assert_eq!(f.n, 100.0);
    }

    #[test]
    fn test_contingency_table_separate_background() {
        let f = Frequencies::compute(freqs(2, 10, 4, 100), false);
        assert_eq!(f.n00, 96.0);
        assert_eq!(f.n1_, 6.0);
        assert_eq!(f.n, 110.0);
    }

    #[test]
    fn test_chi_square_score() {
        // 100 * (2*88 - 8*2)^2 / (10 * 4 * 96 * 90)
        let score = ChiSquare::default().score(2, 10, 4, 100);
        assert!((score - 7.407_407_407).abs() < 1e-6);
    }

    #[test]
    fn test_negatives_excluded_unless_requested() {
        // 1 in 10 in the subset versus 50 in 90 elsewhere
        let excluded = ChiSquare::default().score(1, 10, 51, 100);
        assert_eq!(excluded, 0.0);

        let included = ChiSquare {
            include_negatives: true,
            background_is_superset: true,
        }
        .score(1, 10, 51, 100);
        assert!(included > 0.0);

        assert_eq!(MutualInformation::default().score(1, 10, 51, 100), 0.0);
    }

    #[test]
    fn test_mutual_information_positive_for_overrepresented_term() {
        let score = MutualInformation::default().score(8, 10, 10, 1000);
        assert!((score - 0.052_788_812).abs() < 1e-6);

        // stronger association scores higher
        let weaker = MutualInformation::default().score(3, 10, 10, 1000);
        assert!(score > weaker);
    }

    #[test]
    fn test_wire_params_order() {
        let mut out = WireWriter::new();
        MutualInformation {
            include_negatives: true,
            background_is_superset: false,
        }
        .write_params(&mut out);
        assert_eq!(out.freeze().to_vec(), vec![1, 0]);
    }
}
