use std::path::PathBuf;

use burn::prelude::*;
use serde::{Deserialize, Serialize};

use crate::checkpoint::CheckpointMetadata;
use crate::data::{batch_indices, collate, ActionBatch, ActionDataset, DataFields};
use crate::error::TrainingError;
use crate::model::networks::encoder::STACK_DEPTH;
use crate::{BackendDevice, InferBackend, TrainBackend};

/// The two classifier variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelVariant {
    /// Frames only.
    SingleStream,
    /// Frames plus a gaze map, fused by averaging.
    DualStream,
}

impl ModelVariant {
    /// Name used for checkpoint and run directories.
    pub fn class_name(self) -> &'static str {
        match self {
            ModelVariant::SingleStream => "ACTION_SL",
            ModelVariant::DualStream => "GAZED_ACTION_SL",
        }
    }
}

impl std::str::FromStr for ModelVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "action" | "action_sl" | "single" => Ok(ModelVariant::SingleStream),
            "gazed" | "gazed_action_sl" | "dual" => Ok(ModelVariant::DualStream),
            other => Err(format!(
                "unknown model '{}' (expected 'action' or 'gazed')",
                other
            )),
        }
    }
}

impl std::fmt::Display for ModelVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.class_name())
    }
}

/// Hyperparameters shared by both variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub num_actions: usize,
    pub input_shape: [usize; 2],
    pub dropout: f64,
    pub learning_rate: f64,
    pub seed: u64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        ClassifierConfig {
            num_actions: 18,
            input_shape: [84, 84],
            dropout: 0.5,
            learning_rate: 1e-4,
            seed: 42,
        }
    }
}

/// Result of one optimizer step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutput {
    pub loss: f32,
    /// Argmax of the logits the loss was computed from.
    pub predictions: Vec<usize>,
}

/// Common lifecycle of the single- and dual-stream classifiers.
///
/// Implementors own their network, optimizer and loss; the trainer only
/// drives them batch by batch.
pub trait Classifier {
    fn variant(&self) -> ModelVariant;

    fn config(&self) -> &ClassifierConfig;

    fn device(&self) -> &BackendDevice;

    /// Fields to request from the dataset collaborator.
    fn data_fields(&self) -> DataFields;

    /// Run directory for metrics, relative to the runs root.
    fn runs_subdir(&self) -> PathBuf;

    /// Epoch restored at construction when built in load mode.
    fn load_epoch(&self) -> Option<usize>;

    /// Forward, loss, backward and one optimizer step.
    fn train_batch(&mut self, batch: &ActionBatch<TrainBackend>) -> Result<StepOutput, TrainingError>;

    /// Argmax actions for a batch of frame stacks, using the inference copy
    /// of the network. `gazes` is only read by the dual-stream variant.
    fn predict(
        &self,
        frames: Tensor<InferBackend, 4>,
        gazes: Option<Tensor<InferBackend, 4>>,
    ) -> Result<Vec<usize>, TrainingError>;

    /// Persist model and optimizer state as the record for `epoch`.
    fn save_checkpoint(&self, epoch: usize, loss: f32) -> Result<PathBuf, TrainingError>;

    /// Replace model and optimizer state with the record for `epoch`.
    fn load_checkpoint(&mut self, epoch: usize) -> Result<CheckpointMetadata, TrainingError>;

    /// Variant-specific dataset checks run by [`Classifier::preflight`].
    fn check_gaze_source(&self, _dataset: &dyn ActionDataset) -> Result<(), TrainingError> {
        Ok(())
    }

    /// Reject a training dataset before the first step.
    fn preflight(&self, dataset: &dyn ActionDataset) -> Result<(), TrainingError> {
        if dataset.is_empty() {
            return Err(TrainingError::EmptyTrainingSet);
        }
        let expected = self.config().input_shape;
        let actual = dataset.input_shape();
        if actual != expected {
            return Err(TrainingError::ShapeMismatch {
                what: "dataset frame size",
                expected: expected.to_vec(),
                actual: actual.to_vec(),
            });
        }
        check_labels(&dataset.labels(), self.config().num_actions)?;
        self.check_gaze_source(dataset)
    }

    /// Reject a validation dataset that [`Classifier::accuracy`] could not
    /// evaluate. An empty set passes; accuracy reports it separately.
    fn check_validation(&self, dataset: &dyn ActionDataset) -> Result<(), TrainingError> {
        if dataset.is_empty() {
            return Ok(());
        }
        let expected = self.config().input_shape;
        let actual = dataset.input_shape();
        if actual != expected {
            return Err(TrainingError::ShapeMismatch {
                what: "validation frame size",
                expected: expected.to_vec(),
                actual: actual.to_vec(),
            });
        }
        self.check_gaze_source(dataset)
    }

    /// Epoch training starts from: the loaded epoch in load mode, else 0.
    fn resume(&self) -> usize {
        self.load_epoch().unwrap_or(0)
    }

    /// Fraction of `validation` whose predicted action matches its label.
    fn accuracy(
        &self,
        validation: &dyn ActionDataset,
        batch_size: usize,
    ) -> Result<f32, TrainingError> {
        if validation.is_empty() {
            return Err(TrainingError::EmptyValidationSet);
        }
        let with_gazes = self.data_fields().fused_gazes;
        let order: Vec<usize> = (0..validation.len()).collect();

        let mut correct = 0usize;
        for indices in batch_indices(&order, batch_size) {
            let batch = collate::<InferBackend>(validation, indices, with_gazes, self.device())?;
            let predictions = self.predict(batch.frames, batch.gazes)?;
            correct += predictions
                .iter()
                .zip(&batch.labels)
                .filter(|(predicted, label)| predicted == label)
                .count();
        }
        Ok(correct as f32 / validation.len() as f32)
    }

    /// Predict actions with the weights saved at `epoch`.
    ///
    /// A classifier constructed in load mode keeps its loaded weights and
    /// skips the disk read.
    fn infer(
        &mut self,
        epoch: usize,
        frames: Tensor<InferBackend, 4>,
        gazes: Option<Tensor<InferBackend, 4>>,
    ) -> Result<Vec<usize>, TrainingError> {
        if self.load_epoch().is_none() {
            self.load_checkpoint(epoch)?;
        }
        self.predict(frames, gazes)
    }
}

/// Fail unless `dims` is `[batch, 4, H, W]` with `[H, W] == input_shape`.
pub fn check_frames(
    what: &'static str,
    dims: [usize; 4],
    input_shape: [usize; 2],
) -> Result<(), TrainingError> {
    let expected = [dims[0], STACK_DEPTH, input_shape[0], input_shape[1]];
    if dims != expected {
        return Err(TrainingError::ShapeMismatch {
            what,
            expected: expected.to_vec(),
            actual: dims.to_vec(),
        });
    }
    Ok(())
}

/// Fail on the first label outside `[0, num_actions)`.
pub fn check_labels(labels: &[usize], num_actions: usize) -> Result<(), TrainingError> {
    match labels.iter().find(|&&label| label >= num_actions) {
        Some(&label) => Err(TrainingError::LabelOutOfRange { label, num_actions }),
        None => Ok(()),
    }
}

/// Row-wise argmax of a logits batch.
pub fn argmax_actions<B: Backend>(logits: Tensor<B, 2>) -> Vec<usize> {
    logits
        .argmax(1)
        .into_data()
        .iter::<i64>()
        .map(|action| action as usize)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::tensor::TensorData;

    #[test]
    fn test_class_names() {
        assert_eq!(ModelVariant::SingleStream.class_name(), "ACTION_SL");
        assert_eq!(ModelVariant::DualStream.to_string(), "GAZED_ACTION_SL");
    }

    #[test]
    fn test_parse_variant() {
        assert_eq!("gazed".parse(), Ok(ModelVariant::DualStream));
        assert_eq!("ACTION_SL".parse(), Ok(ModelVariant::SingleStream));
        assert!("dqn".parse::<ModelVariant>().is_err());
    }

    #[test]
    fn test_check_frames() {
        assert!(check_frames("frames", [2, 4, 84, 84], [84, 84]).is_ok());
        let err = check_frames("frames", [2, 3, 84, 84], [84, 84]).unwrap_err();
        assert!(matches!(err, TrainingError::ShapeMismatch { .. }));
        assert!(check_frames("frames", [2, 4, 80, 84], [84, 84]).is_err());
    }

    #[test]
    fn test_check_labels() {
        assert!(check_labels(&[0, 17], 18).is_ok());
        assert!(matches!(
            check_labels(&[3, 18, 20], 18),
            Err(TrainingError::LabelOutOfRange {
                label: 18,
                num_actions: 18
            })
        ));
    }

    #[test]
    fn test_argmax_actions() {
        let device = Default::default();
        let logits = Tensor::<InferBackend, 2>::from_data(
            TensorData::new(vec![0.1f32, 0.9, 0.0, 2.0, -1.0, 1.0], [2, 3]),
            &device,
        );
        assert_eq!(argmax_actions(logits), vec![1, 0]);
    }
}
