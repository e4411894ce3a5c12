use rand::Rng;

use crate::error::{PsimError, PsimResult};

/// Tolerance on the final cumulative probability of a table.
pub const CUMULATIVE_TOL: f64 = 1e-9;

/// One row of a sampling table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TableEntry {
    pub value: f64,
    pub cumulative: f64,
}

/// Discrete distribution stored as `(value, cumulative probability)` rows
/// for inverse-CDF sampling.
///
/// Cumulative probabilities are non-decreasing and the last one is exactly 1.0.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplingTable {
    entries: Vec<TableEntry>,
}

impl SamplingTable {
    /// Builds a table from `(value, cumulative)` pairs.
    ///
    /// The last cumulative probability must be within [`CUMULATIVE_TOL`] of 1.0
    /// and is snapped to exactly 1.0.
    pub fn new(pairs: Vec<(f64, f64)>) -> PsimResult<Self> {
        if pairs.is_empty() {
            return Err(PsimError::InvalidTable("table is empty".to_string()));
        }

        let mut prev = 0.0;
        for (i, &(value, cumulative)) in pairs.iter().enumerate() {
            if !value.is_finite() || !cumulative.is_finite() {
                return Err(PsimError::InvalidTable(format!(
                    "entry {i} is not finite ({value}, {cumulative})"
                )));
            }
            if cumulative < 0.0 || cumulative < prev {
                return Err(PsimError::InvalidTable(format!(
                    "cumulative probability decreases at entry {i} ({prev} -> {cumulative})"
                )));
            }
            prev = cumulative;
        }
        if (prev - 1.0).abs() > CUMULATIVE_TOL {
            return Err(PsimError::InvalidTable(format!(
                "cumulative probability ends at {prev}, expected 1.0"
            )));
        }

        let mut entries: Vec<TableEntry> = pairs
            .into_iter()
            .map(|(value, cumulative)| TableEntry { value, cumulative })
            .collect();
        if let Some(last) = entries.last_mut() {
            last.cumulative = 1.0;
        }
        Ok(Self { entries })
    }

    /// Builds a table from values and non-negative (unnormalized) weights.
    pub fn from_weights(values: &[f64], weights: &[f64]) -> PsimResult<Self> {
        if values.len() != weights.len() {
            return Err(PsimError::InvalidTable(format!(
                "{} values but {} weights",
                values.len(),
                weights.len()
            )));
        }
        if let Some(w) = weights.iter().find(|w| !w.is_finite() || **w < 0.0) {
            return Err(PsimError::InvalidTable(format!("invalid weight {w}")));
        }
        let total: f64 = weights.iter().sum();
        if total <= 0.0 {
            return Err(PsimError::InvalidTable("weights sum to zero".to_string()));
        }

        let mut acc = 0.0;
        let pairs = values
            .iter()
            .zip(weights)
            .map(|(&v, &w)| {
                acc += w;
                (v, acc / total)
            })
            .collect();
        Self::new(pairs)
    }

    pub fn entries(&self) -> &[TableEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Inverse-CDF lookup: index of the first entry whose cumulative
    /// probability exceeds `u`.
    ///
    /// Entries with zero probability are never returned for `u` in [0, 1).
    pub fn sample_index(&self, u: f64) -> usize {
        let idx = self.entries.partition_point(|e| e.cumulative <= u);
        idx.min(self.entries.len() - 1)
    }

    /// Inverse-CDF lookup returning the tabulated value.
    pub fn sample(&self, u: f64) -> f64 {
        self.entries[self.sample_index(u)].value
    }

    /// Draws an index using a uniform number from `rng`.
    pub fn draw_index<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        self.sample_index(rng.r#gen::<f64>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    #[test]
    fn test_new_snaps_last_entry() {
        let t = SamplingTable::new(vec![(1.0, 0.25), (2.0, 0.999_999_999_9)]).unwrap();
        assert_eq!(t.entries().last().unwrap().cumulative, 1.0);
    }

    #[test]
    fn test_new_rejects_decreasing() {
        let err = SamplingTable::new(vec![(1.0, 0.6), (2.0, 0.4), (3.0, 1.0)]).unwrap_err();
        assert!(matches!(err, PsimError::InvalidTable(_)));
    }

    #[test]
    fn test_new_rejects_incomplete() {
        assert!(SamplingTable::new(vec![(1.0, 0.5), (2.0, 0.9)]).is_err());
        assert!(SamplingTable::new(vec![]).is_err());
    }

    #[test]
    fn test_from_weights_cumulative() {
        let t = SamplingTable::from_weights(&[10.0, 20.0, 30.0], &[1.0, 1.0, 2.0]).unwrap();
        let c: Vec<f64> = t.entries().iter().map(|e| e.cumulative).collect();
        assert!((c[0] - 0.25).abs() < 1e-12);
        assert!((c[1] - 0.5).abs() < 1e-12);
        assert_eq!(c[2], 1.0);
    }

    #[test]
    fn test_from_weights_rejects_zero_total() {
        assert!(SamplingTable::from_weights(&[1.0, 2.0], &[0.0, 0.0]).is_err());
        assert!(SamplingTable::from_weights(&[1.0, 2.0], &[1.0, -1.0]).is_err());
        assert!(SamplingTable::from_weights(&[1.0], &[1.0, 1.0]).is_err());
    }

    #[test]
    fn test_sample_boundaries() {
        let t = SamplingTable::from_weights(&[10.0, 20.0, 30.0], &[1.0, 1.0, 2.0]).unwrap();
        assert_eq!(t.sample(0.0), 10.0);
        assert_eq!(t.sample(0.2499), 10.0);
        assert_eq!(t.sample(0.25), 20.0);
        assert_eq!(t.sample(0.75), 30.0);
        assert_eq!(t.sample(0.999_999), 30.0);
        assert_eq!(t.sample(1.0), 30.0);
    }

    #[test]
    fn test_zero_weight_entries_never_sampled() {
        let t = SamplingTable::from_weights(&[1.0, 2.0, 3.0], &[0.0, 1.0, 0.0]).unwrap();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(7);
        for _ in 0..1000 {
            assert_eq!(t.draw_index(&mut rng), 1);
        }
    }

    #[test]
    fn test_random_draws_stay_in_table() {
        let t = SamplingTable::from_weights(&[1.0, 2.0, 3.0, 4.0], &[1.0; 4]).unwrap();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(42);
        let mut counts = [0usize; 4];
        for _ in 0..8000 {
            counts[t.draw_index(&mut rng)] += 1;
        }
        for c in counts {
            assert!((c as f64 / 8000.0 - 0.25).abs() < 0.03, "counts {counts:?}");
        }
    }
}
