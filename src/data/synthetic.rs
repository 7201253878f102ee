use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::dataset::{ActionDataset, ActionSample, DataFields, DatasetProvider, InMemoryDataset};
use crate::error::DataError;
use crate::model::networks::encoder::STACK_DEPTH;

/// Provider of seeded random frame stacks, for smoke runs and tests.
///
/// Labels are skewed towards low action ids so the imbalanced sampler has
/// something to correct.
#[derive(Debug, Clone)]
pub struct SyntheticProvider {
    pub num_samples: usize,
    pub num_actions: usize,
    pub input_shape: [usize; 2],
    pub seed: u64,
}

impl SyntheticProvider {
    pub fn new(num_samples: usize, num_actions: usize, input_shape: [usize; 2], seed: u64) -> Self {
        SyntheticProvider {
            num_samples,
            num_actions,
            input_shape,
            seed,
        }
    }

    /// Generate a dataset directly, with or without fused gazes.
    pub fn generate(&self, split_seed: u64, with_gazes: bool) -> Result<InMemoryDataset, DataError> {
        let mut rng = StdRng::seed_from_u64(self.seed ^ split_seed);
        let stack_len = STACK_DEPTH * self.input_shape[0] * self.input_shape[1];
        let num_actions = self.num_actions.max(1);

        let samples = (0..self.num_samples)
            .map(|_| {
                let frames: Vec<f32> = (0..stack_len).map(|_| rng.random::<f32>()).collect();
                let gaze = with_gazes
                    .then(|| (0..stack_len).map(|_| rng.random::<f32>()).collect::<Vec<f32>>());
                // min of two uniform draws skews towards 0
                let action = rng
                    .random_range(0..num_actions)
                    .min(rng.random_range(0..num_actions));
                ActionSample {
                    frames,
                    action,
                    gaze,
                }
            })
            .collect();
        InMemoryDataset::new(samples, self.input_shape)
    }
}

impl DatasetProvider for SyntheticProvider {
    fn open(
        &self,
        game: &str,
        split: &str,
        fields: DataFields,
    ) -> Result<Box<dyn ActionDataset>, DataError> {
        if !fields.frames || !fields.actions {
            return Err(DataError::Unavailable {
                game: game.to_string(),
                split: split.to_string(),
                reason: "frames and actions are always required".to_string(),
            });
        }
        let split_seed = split
            .bytes()
            .chain(game.bytes())
            .fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64));
        let dataset = self.generate(split_seed, fields.fused_gazes)?;
        Ok(Box::new(dataset))
    }
}
