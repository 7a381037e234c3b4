//! Significance heuristics
//!
//! A heuristic scores how much more common a term is in the subset than in
//! the background superset. Scores are pure functions of four counts and are
//! recomputed after every merge, never summed.
//!
//! # Degenerate input
//!
//! [`Heuristic::score`] returns `0.0` when either total is zero, when a
//! document frequency exceeds its total, and whenever the underlying formula
//! is not finite. Implementations only provide [`Heuristic::raw_score`] for
//! well-formed, non-degenerate counts.
//!
//! # Wire identity
//!
//! Heuristics travel by name followed by their parameters. The name to
//! decoder mapping lives in [`HeuristicRegistry`] and must be identical on
//! every node.

mod gnd;
mod jlh;
mod nxy;
mod percentage;

pub use gnd::Gnd;
pub use jlh::Jlh;
pub use nxy::{ChiSquare, MutualInformation};
pub use percentage::PercentageScore;

use crate::error::DecodeError;
use crate::stream::{WireReader, WireWriter};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The four counts a heuristic is evaluated on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TermFrequencies {
    pub subset_df: u64,
    pub subset_size: u64,
    pub superset_df: u64,
    pub superset_size: u64,
}

impl TermFrequencies {
    /// Totals are zero or a frequency exceeds its total
    pub fn is_degenerate(&self) -> bool {
        self.subset_size == 0
            || self.superset_size == 0
            || self.subset_df > self.subset_size
            || self.superset_df > self.superset_size
    }
}

pub trait Heuristic: fmt::Debug + Send + Sync {
    /// Stable identifier used on the wire and in configuration
    fn name(&self) -> &'static str;

    /// Formula for non-degenerate counts. May return non-finite values.
    fn raw_score(&self, freqs: TermFrequencies) -> f64;

    fn write_params(&self, out: &mut WireWriter);

    fn score(&self, subset_df: u64, subset_size: u64, superset_df: u64, superset_size: u64) -> f64 {
        let freqs = TermFrequencies {
            subset_df,
            subset_size,
            superset_df,
            superset_size,
        };
        if freqs.is_degenerate() {
            return 0.0;
        }
        let score = self.raw_score(freqs);
        if score.is_finite() {
            score
        } else {
            0.0
        }
    }
}

/// The configured heuristic carried by every partial result.
///
/// Deserializes from the search request shape, e.g.
/// `{"chi_square": {"include_negatives": true}}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignificanceHeuristic {
    Jlh(Jlh),
    MutualInformation(MutualInformation),
    ChiSquare(ChiSquare),
    Gnd(Gnd),
    Percentage(PercentageScore),
}

impl Default for SignificanceHeuristic {
    fn default() -> Self {
        SignificanceHeuristic::Jlh(Jlh::default())
    }
}

impl SignificanceHeuristic {
    fn inner(&self) -> &dyn Heuristic {
        match self {
            SignificanceHeuristic::Jlh(h) => h,
            SignificanceHeuristic::MutualInformation(h) => h,
            SignificanceHeuristic::ChiSquare(h) => h,
            SignificanceHeuristic::Gnd(h) => h,
            SignificanceHeuristic::Percentage(h) => h,
        }
    }

    /// Writes the name followed by the parameter blob.
    pub fn write(&self, out: &mut WireWriter) {
        out.write_str(self.name());
        self.write_params(out);
    }

    pub fn read(input: &mut WireReader<'_>) -> Result<Self, DecodeError> {
        let name = input.read_str("heuristic")?;
        let reader = HeuristicRegistry::lookup(name).ok_or_else(|| {
            DecodeError::new("heuristic", format!("unknown heuristic '{}'", name))
        })?;
        reader(input)
    }
}

impl Heuristic for SignificanceHeuristic {
    fn name(&self) -> &'static str {
        self.inner().name()
    }

    fn raw_score(&self, freqs: TermFrequencies) -> f64 {
        self.inner().raw_score(freqs)
    }

    fn write_params(&self, out: &mut WireWriter) {
        self.inner().write_params(out)
    }
}

impl fmt::Display for SignificanceHeuristic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignificanceHeuristic::MutualInformation(h) => write!(
                f,
                "{}(include_negatives={}, background_is_superset={})",
                self.name(),
                h.include_negatives,
                h.background_is_superset
            ),
            SignificanceHeuristic::ChiSquare(h) => write!(
                f,
                "{}(include_negatives={}, background_is_superset={})",
                self.name(),
                h.include_negatives,
                h.background_is_superset
            ),
            SignificanceHeuristic::Gnd(h) => write!(
                f,
                "{}(background_is_superset={})",
                self.name(),
                h.background_is_superset
            ),
            SignificanceHeuristic::Jlh(_) | SignificanceHeuristic::Percentage(_) => {
                f.write_str(self.name())
            }
        }
    }
}

/// Decodes the parameter blob that follows a heuristic name.
pub type ParamReader = fn(&mut WireReader<'_>) -> Result<SignificanceHeuristic, DecodeError>;

/// Name to decoder mapping shared by every node in a cluster.
pub struct HeuristicRegistry;

impl HeuristicRegistry {
    const ENTRIES: [(&'static str, ParamReader); 5] = [
        (Jlh::NAME, read_jlh),
        (MutualInformation::NAME, read_mutual_information),
        (ChiSquare::NAME, read_chi_square),
        (Gnd::NAME, read_gnd),
        (PercentageScore::NAME, read_percentage),
    ];

    pub fn lookup(name: &str) -> Option<ParamReader> {
        Self::ENTRIES
            .iter()
            .find(|(entry, _)| *entry == name)
            .map(|(_, reader)| *reader)
    }

    pub fn names() -> impl Iterator<Item = &'static str> {
        Self::ENTRIES.iter().map(|(name, _)| *name)
    }
}

fn read_jlh(input: &mut WireReader<'_>) -> Result<SignificanceHeuristic, DecodeError> {
    Ok(SignificanceHeuristic::Jlh(Jlh::read_params(input)?))
}

fn read_mutual_information(
    input: &mut WireReader<'_>,
) -> Result<SignificanceHeuristic, DecodeError> {
    Ok(SignificanceHeuristic::MutualInformation(
        MutualInformation::read_params(input)?,
    ))
}

fn read_chi_square(input: &mut WireReader<'_>) -> Result<SignificanceHeuristic, DecodeError> {
    Ok(SignificanceHeuristic::ChiSquare(ChiSquare::read_params(input)?))
}

fn read_gnd(input: &mut WireReader<'_>) -> Result<SignificanceHeuristic, DecodeError> {
    Ok(SignificanceHeuristic::Gnd(Gnd::read_params(input)?))
}

fn read_percentage(input: &mut WireReader<'_>) -> Result<SignificanceHeuristic, DecodeError> {
    Ok(SignificanceHeuristic::Percentage(PercentageScore::read_params(input)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all() -> Vec<SignificanceHeuristic> {
        vec![
            SignificanceHeuristic::Jlh(Jlh::default()),
            SignificanceHeuristic::MutualInformation(MutualInformation {
                include_negatives: true,
                background_is_superset: false,
            }),
            SignificanceHeuristic::ChiSquare(ChiSquare::default()),
            SignificanceHeuristic::Gnd(Gnd {
                background_is_superset: false,
            }),
            SignificanceHeuristic::Percentage(PercentageScore::default()),
        ]
    }

    #[test]
    fn test_registry_knows_every_variant() {
        for heuristic in all() {
            assert!(HeuristicRegistry::lookup(heuristic.name()).is_some());
        }
        assert_eq!(HeuristicRegistry::names().count(), 5);
        assert!(HeuristicRegistry::lookup("script_heuristic").is_none());
    }

    #[test]
    fn test_degenerate_totals_score_zero() {
        for heuristic in all() {
            assert_eq!(heuristic.score(0, 0, 5, 100), 0.0, "{}", heuristic);
            assert_eq!(heuristic.score(3, 10, 0, 0), 0.0, "{}", heuristic);
            assert_eq!(heuristic.score(0, 0, 0, 0), 0.0, "{}", heuristic);
            // frequency above its total
            assert_eq!(heuristic.score(11, 10, 20, 100), 0.0, "{}", heuristic);
        }
    }

    #[test]
    fn test_scores_are_finite_on_edges() {
        let edges = [
            (0, 10, 0, 100),
            (10, 10, 10, 100),
            (10, 10, 100, 100),
            (1, 1, 1, 1),
            (5, 10, 0, 100),
            (0, 10, 100, 100),
        ];
        for heuristic in all() {
            for (sdf, ss, bdf, bs) in edges {
                let score = heuristic.score(sdf, ss, bdf, bs);
                let counts = (sdf, ss, bdf, bs);
                assert!(score.is_finite(), "{} on {:?} gave {}", heuristic, counts, score);
            }
        }
    }

    #[test]
    fn test_scores_are_deterministic() {
        for heuristic in all() {
            let a = heuristic.score(5, 30, 9, 300);
            let b = heuristic.score(5, 30, 9, 300);
            assert_eq!(a.to_bits(), b.to_bits());
        }
    }

    #[test]
    fn test_wire_identity() {
        for heuristic in all() {
            let mut out = WireWriter::new();
            heuristic.write(&mut out);
            let bytes = out.freeze();
            let mut input = WireReader::new(&bytes);
            assert_eq!(SignificanceHeuristic::read(&mut input).unwrap(), heuristic);
            input.finish("heuristic").unwrap();
        }
    }

    #[test]
    fn test_unknown_heuristic_rejected() {
        let mut out = WireWriter::new();
        out.write_str("scripted");
        let bytes = out.freeze();
        let err = SignificanceHeuristic::read(&mut WireReader::new(&bytes)).unwrap_err();
        assert_eq!(err.field, "heuristic");
    }

    #[test]
    fn test_request_shape_deserialization() {
        let parsed: SignificanceHeuristic =
            serde_json::from_str(r#"{"chi_square": {"include_negatives": true}}"#).unwrap();
        assert_eq!(
            parsed,
            SignificanceHeuristic::ChiSquare(ChiSquare {
                include_negatives: true,
                background_is_superset: true,
            })
        );

        let parsed: SignificanceHeuristic = serde_json::from_str(r#"{"jlh": {}}"#).unwrap();
        assert_eq!(parsed, SignificanceHeuristic::default());

        let parsed: SignificanceHeuristic =
            serde_json::from_str(r#"{"gnd": {"background_is_superset": false}}"#).unwrap();
        assert_eq!(parsed.to_string(), "gnd(background_is_superset=false)");
    }
}
