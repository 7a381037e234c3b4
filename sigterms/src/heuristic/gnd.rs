use super::nxy::Frequencies;
use super::{Heuristic, TermFrequencies};
use crate::error::DecodeError;
use crate::stream::{WireReader, WireWriter};
use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

/// Google normalized distance between the term and the subset, inverted so
/// that strongly co-occurring terms score close to 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gnd {
    #[serde(default = "default_true")]
    pub background_is_superset: bool,
}

impl Default for Gnd {
    fn default() -> Self {
        Self {
            background_is_superset: true,
        }
    }
}

impl Gnd {
    pub const NAME: &'static str = "gnd";

    pub(super) fn read_params(input: &mut WireReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            background_is_superset: input.read_bool("heuristic.background_is_superset")?,
        })
    }
}

impl Heuristic for Gnd {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn raw_score(&self, freqs: TermFrequencies) -> f64 {
        let f = Frequencies::compute(freqs, self.background_is_superset);
        let fx = f.n1_;
        let fy = f.n_1;
        let fxy = f.n11;

        if fxy == 0.0 {
            return 0.0;
        }
        if fx == fy && fx == fxy {
            return 1.0;
        }

        let distance = (fx.ln().max(fy.ln()) - fxy.ln()) / (f.n.ln() - fx.ln().min(fy.ln()));
        (-distance).exp()
    }

    fn write_params(&self, out: &mut WireWriter) {
        out.write_bool(self.background_is_superset);
    }
}
