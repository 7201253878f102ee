use rand::distr::weighted::WeightedIndex;
use rand::distr::Distribution;
use rand::rngs::StdRng;
use rand::SeedableRng;

use super::dataset::ActionDataset;
use crate::error::DataError;

/// Draws dataset indices with probability inversely proportional to the
/// frequency of each index's label, with replacement.
///
/// Every class carries the same total weight, so rare actions are drawn as
/// often as common ones.
pub struct ImbalancedSampler {
    weights: Vec<f64>,
    distribution: WeightedIndex<f64>,
    rng: StdRng,
}

impl ImbalancedSampler {
    pub fn from_labels(labels: &[usize], seed: u64) -> Result<Self, DataError> {
        if labels.is_empty() {
            return Err(DataError::EmptyDataset);
        }
        let counts = class_counts(labels);
        let weights: Vec<f64> = labels
            .iter()
            .map(|&label| 1.0 / counts[label] as f64)
            .collect();
        let distribution = WeightedIndex::new(&weights)
            .map_err(|e| DataError::InvalidWeights(e.to_string()))?;

        Ok(ImbalancedSampler {
            weights,
            distribution,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    pub fn from_dataset(dataset: &dyn ActionDataset, seed: u64) -> Result<Self, DataError> {
        Self::from_labels(&dataset.labels(), seed)
    }

    /// Per-index draw weight.
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// Draw `count` indices.
    pub fn draw(&mut self, count: usize) -> Vec<usize> {
        (0..count)
            .map(|_| self.distribution.sample(&mut self.rng))
            .collect()
    }

    /// Draw one epoch's worth of indices (as many as the dataset holds).
    pub fn epoch_order(&mut self) -> Vec<usize> {
        self.draw(self.weights.len())
    }
}

/// Number of occurrences of each label, indexed by label.
pub fn class_counts(labels: &[usize]) -> Vec<usize> {
    let num_classes = labels.iter().max().map_or(0, |&m| m + 1);
    let mut counts = vec![0usize; num_classes];
    for &label in labels {
        counts[label] += 1;
    }
    counts
}
