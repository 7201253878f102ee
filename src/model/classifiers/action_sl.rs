use std::path::PathBuf;

use burn::prelude::*;

use super::train_state::TrainState;
use crate::checkpoint::{CheckpointKey, CheckpointManager, CheckpointMetadata, CheckpointScope};
use crate::data::{ActionBatch, DataFields};
use crate::error::TrainingError;
use crate::model::classifier::{
    argmax_actions, check_frames, Classifier, ClassifierConfig, ModelVariant, StepOutput,
};
use crate::model::networks::{ActionNetwork, ActionNetworkConfig, Mode};
use crate::{BackendDevice, InferBackend, TrainBackend};

/// Single-stream action classifier (`ACTION_SL`): frame stacks only.
///
/// Checkpoints live directly under the checkpoint root as
/// `ACTION_SL_Epoch_{epoch}`.
pub struct ActionClassifier {
    state: TrainState<ActionNetwork<TrainBackend>>,
}

impl ActionClassifier {
    /// Build a fresh classifier, or with `load_epoch` restore the record for
    /// that epoch right away.
    ///
    /// `config.seed` seeds the training backend, which is process-wide:
    /// constructing another classifier reseeds this one's RNG stream too.
    pub fn new(
        config: ClassifierConfig,
        checkpoints: CheckpointManager,
        load_epoch: Option<usize>,
    ) -> Result<Self, TrainingError> {
        let device = BackendDevice::default();
        TrainBackend::seed(config.seed);

        let network = ActionNetworkConfig::new()
            .with_num_actions(config.num_actions)
            .with_input_shape(config.input_shape)
            .with_dropout(config.dropout)
            .init::<TrainBackend>(&device)
            .ok_or_else(|| too_small(config.input_shape))?;

        let key = CheckpointKey::new(ModelVariant::SingleStream, CheckpointScope::Global, 0);
        let mut classifier = ActionClassifier {
            state: TrainState::new(network, config, checkpoints, key, device),
        };
        if let Some(epoch) = load_epoch {
            classifier.state.enter_load_mode(epoch)?;
        }
        Ok(classifier)
    }

    /// Logits from the training network, with dropout active.
    pub fn forward(&self, frames: Tensor<TrainBackend, 4>) -> Tensor<TrainBackend, 2> {
        self.state.network.forward(frames, Mode::Train)
    }

    #[cfg(test)]
    pub(crate) fn network(&self) -> &ActionNetwork<TrainBackend> {
        &self.state.network
    }
}

impl Classifier for ActionClassifier {
    fn variant(&self) -> ModelVariant {
        ModelVariant::SingleStream
    }

    fn config(&self) -> &ClassifierConfig {
        &self.state.config
    }

    fn device(&self) -> &BackendDevice {
        &self.state.device
    }

    fn data_fields(&self) -> DataFields {
        DataFields::FRAMES_ACTIONS
    }

    fn runs_subdir(&self) -> PathBuf {
        PathBuf::from(self.variant().class_name())
    }

    fn load_epoch(&self) -> Option<usize> {
        self.state.load_epoch
    }

    fn train_batch(&mut self, batch: &ActionBatch<TrainBackend>) -> Result<StepOutput, TrainingError> {
        check_frames("frame batch", batch.frames.dims(), self.state.config.input_shape)?;
        let logits = self.forward(batch.frames.clone());
        self.state.step(logits, batch)
    }

    fn predict(
        &self,
        frames: Tensor<InferBackend, 4>,
        _gazes: Option<Tensor<InferBackend, 4>>,
    ) -> Result<Vec<usize>, TrainingError> {
        check_frames("frame batch", frames.dims(), self.state.config.input_shape)?;
        let logits = self
            .state
            .with_inference(|network| network.forward(frames, Mode::Eval));
        Ok(argmax_actions(logits))
    }

    fn save_checkpoint(&self, epoch: usize, loss: f32) -> Result<PathBuf, TrainingError> {
        self.state.save(epoch, loss)
    }

    fn load_checkpoint(&mut self, epoch: usize) -> Result<CheckpointMetadata, TrainingError> {
        self.state.load(epoch)
    }
}

pub(crate) fn too_small(input_shape: [usize; 2]) -> TrainingError {
    TrainingError::ShapeMismatch {
        what: "input shape too small for the encoder",
        expected: vec![36, 36],
        actual: input_shape.to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{collate, ActionDataset, ActionSample, InMemoryDataset, SyntheticProvider};
    use crate::error::CheckpointError;
    use burn::tensor::Distribution;

    fn config() -> ClassifierConfig {
        ClassifierConfig {
            dropout: 0.0,
            ..ClassifierConfig::default()
        }
    }

    #[test]
    fn test_one_step_on_random_stacks() {
        let dir = tempfile::tempdir().unwrap();
        let mut classifier =
            ActionClassifier::new(config(), CheckpointManager::new(dir.path()), None).unwrap();

        let dataset = SyntheticProvider::new(4, 18, [84, 84], 7)
            .generate(0, false)
            .unwrap();
        let batch =
            collate::<TrainBackend>(&dataset, &[0, 1, 2, 3], false, classifier.device()).unwrap();

        let before = classifier.network().head.output_weights();
        let output = classifier.train_batch(&batch).unwrap();
        let after = classifier.network().head.output_weights();

        assert!(output.loss.is_finite());
        assert!(output.loss >= 0.0);
        assert_eq!(output.predictions.len(), 4);
        assert!(output.predictions.iter().all(|&a| a < 18));
        assert_ne!(before, after, "parameters should change after a step");
    }

    #[test]
    fn test_label_out_of_range_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut classifier = ActionClassifier::new(
            ClassifierConfig {
                num_actions: 4,
                ..config()
            },
            CheckpointManager::new(dir.path()),
            None,
        )
        .unwrap();

        let samples = vec![ActionSample {
            frames: vec![0.0; 4 * 84 * 84],
            action: 9,
            gaze: None,
        }];
        let dataset = InMemoryDataset::new(samples, [84, 84]).unwrap();
        assert!(matches!(
            classifier.preflight(&dataset),
            Err(TrainingError::LabelOutOfRange { label: 9, .. })
        ));

        let batch = collate::<TrainBackend>(&dataset, &[0], false, classifier.device()).unwrap();
        assert!(matches!(
            classifier.train_batch(&batch),
            Err(TrainingError::LabelOutOfRange { .. })
        ));
    }

    #[test]
    fn test_wrong_frame_size_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let classifier =
            ActionClassifier::new(config(), CheckpointManager::new(dir.path()), None).unwrap();

        let dataset = SyntheticProvider::new(2, 18, [64, 64], 1)
            .generate(0, false)
            .unwrap();
        assert!(matches!(
            classifier.preflight(&dataset),
            Err(TrainingError::ShapeMismatch { .. })
        ));

        let frames = Tensor::<InferBackend, 4>::zeros([1, 4, 64, 64], classifier.device());
        assert!(classifier.predict(frames, None).is_err());
    }

    #[test]
    fn test_empty_training_set_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let classifier =
            ActionClassifier::new(config(), CheckpointManager::new(dir.path()), None).unwrap();
        let dataset = InMemoryDataset::new(Vec::new(), [84, 84]).unwrap();
        assert!(matches!(
            classifier.preflight(&dataset),
            Err(TrainingError::EmptyTrainingSet)
        ));
    }

    #[test]
    fn test_accuracy_bounds() {
        let dir = tempfile::tempdir().unwrap();
        let classifier =
            ActionClassifier::new(config(), CheckpointManager::new(dir.path()), None).unwrap();

        let dataset = SyntheticProvider::new(5, 18, [84, 84], 3)
            .generate(1, false)
            .unwrap();
        let accuracy = classifier.accuracy(&dataset, 2).unwrap();
        assert!((0.0..=1.0).contains(&accuracy));

        let empty = InMemoryDataset::new(Vec::new(), [84, 84]).unwrap();
        assert!(matches!(
            classifier.accuracy(&empty, 2),
            Err(TrainingError::EmptyValidationSet)
        ));
    }

    #[test]
    fn test_accuracy_matches_predictions() {
        let dir = tempfile::tempdir().unwrap();
        let classifier =
            ActionClassifier::new(config(), CheckpointManager::new(dir.path()), None).unwrap();
        let device = classifier.device().clone();

        // Label every sample with the action the network already predicts.
        let frames = Tensor::<InferBackend, 4>::random([3, 4, 84, 84], Distribution::Default, &device);
        let predicted = classifier.predict(frames.clone(), None).unwrap();
        let values: Vec<f32> = frames.into_data().to_vec().unwrap();
        let samples = predicted
            .iter()
            .enumerate()
            .map(|(i, &action)| ActionSample {
                frames: values[i * 4 * 84 * 84..(i + 1) * 4 * 84 * 84].to_vec(),
                action,
                gaze: None,
            })
            .collect();
        let dataset = InMemoryDataset::new(samples, [84, 84]).unwrap();

        assert_eq!(dataset.len(), 3);
        assert_eq!(classifier.accuracy(&dataset, 3).unwrap(), 1.0);
    }

    #[test]
    fn test_load_mode_missing_checkpoint_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let result = ActionClassifier::new(config(), CheckpointManager::new(dir.path()), Some(30));
        assert!(matches!(
            result,
            Err(TrainingError::Checkpoint(CheckpointError::Missing(_)))
        ));
    }

    #[test]
    fn test_infer_loads_requested_epoch() {
        let dir = tempfile::tempdir().unwrap();
        let checkpoints = CheckpointManager::new(dir.path());
        let saved = ActionClassifier::new(config(), checkpoints.clone(), None).unwrap();
        saved.save_checkpoint(10, 1.5).unwrap();
        assert!(dir.path().join("ACTION_SL_Epoch_10").exists());

        let device = saved.device().clone();
        let frames = Tensor::<InferBackend, 4>::random([2, 4, 84, 84], Distribution::Default, &device);
        let expected = saved.predict(frames.clone(), None).unwrap();

        let mut fresh = ActionClassifier::new(
            ClassifierConfig {
                seed: 1234,
                ..config()
            },
            checkpoints.clone(),
            None,
        )
        .unwrap();
        assert_eq!(fresh.infer(10, frames.clone(), None).unwrap(), expected);
        assert_eq!(fresh.load_epoch(), None);

        let mut loaded = ActionClassifier::new(config(), checkpoints, Some(10)).unwrap();
        assert_eq!(loaded.resume(), 10);
        // Load mode never reads another epoch from disk.
        assert_eq!(loaded.infer(20, frames, None).unwrap(), expected);
    }
}
