use std::path::PathBuf;

use burn::prelude::*;

use super::action_sl::too_small;
use super::train_state::TrainState;
use super::checkpoint_scope;
use crate::checkpoint::{CheckpointKey, CheckpointManager, CheckpointMetadata};
use crate::data::{ActionBatch, ActionDataset, DataFields, DatasetSplits};
use crate::error::{DataError, TrainingError};
use crate::model::classifier::{
    argmax_actions, check_frames, Classifier, ClassifierConfig, ModelVariant, StepOutput,
};
use crate::model::gaze::{synthesize_gaze, GazePredictor};
use crate::model::networks::{GazedActionNetwork, GazedActionNetworkConfig, Mode};
use crate::{BackendDevice, InferBackend, TrainBackend};

/// Dual-stream action classifier (`GAZED_ACTION_SL`).
///
/// Frames and gaze maps run through one shared encoder and are averaged
/// before the head. When the data does not carry fused gazes the gaze batch
/// is synthesized by `teacher`, outside the autodiff graph.
///
/// Checkpoints live under `{root}/{game}/{dataset_train}`.
pub struct GazedActionClassifier {
    state: TrainState<GazedActionNetwork<TrainBackend>>,
    splits: DatasetSplits,
    teacher: Option<Box<dyn GazePredictor>>,
}

impl GazedActionClassifier {
    /// Build a fresh classifier, or with `load_epoch` restore the record for
    /// that epoch right away.
    ///
    /// `config.seed` seeds the training backend, which is process-wide:
    /// constructing another classifier reseeds this one's RNG stream too.
    pub fn new(
        config: ClassifierConfig,
        splits: DatasetSplits,
        checkpoints: CheckpointManager,
        teacher: Option<Box<dyn GazePredictor>>,
        load_epoch: Option<usize>,
    ) -> Result<Self, TrainingError> {
        let device = BackendDevice::default();
        TrainBackend::seed(config.seed);

        let network = GazedActionNetworkConfig::new()
            .with_num_actions(config.num_actions)
            .with_input_shape(config.input_shape)
            .with_dropout(config.dropout)
            .init::<TrainBackend>(&device)
            .ok_or_else(|| too_small(config.input_shape))?;

        let scope = checkpoint_scope(ModelVariant::DualStream, &splits);
        let key = CheckpointKey::new(ModelVariant::DualStream, scope, 0);
        let mut classifier = GazedActionClassifier {
            state: TrainState::new(network, config, checkpoints, key, device),
            splits,
            teacher,
        };
        if let Some(epoch) = load_epoch {
            classifier.state.enter_load_mode(epoch)?;
        }
        Ok(classifier)
    }

    pub fn splits(&self) -> &DatasetSplits {
        &self.splits
    }

    /// Logits from the training network, with dropout active.
    pub fn forward(
        &self,
        frames: Tensor<TrainBackend, 4>,
        gaze: Tensor<TrainBackend, 4>,
    ) -> Tensor<TrainBackend, 2> {
        self.state.network.forward(frames, gaze, Mode::Train)
    }

    fn teacher(&self) -> Result<&dyn GazePredictor, TrainingError> {
        self.teacher.as_deref().ok_or(TrainingError::GazeUnavailable)
    }

    fn training_gaze(
        &self,
        batch: &ActionBatch<TrainBackend>,
    ) -> Result<Tensor<TrainBackend, 4>, TrainingError> {
        let gaze = match &batch.gazes {
            Some(gaze) => gaze.clone(),
            None => {
                let synthesized = synthesize_gaze(self.teacher()?, batch.frames.clone().inner())?;
                Tensor::from_inner(synthesized)
            }
        };
        check_gaze(batch.frames.dims(), gaze.dims())?;
        Ok(gaze)
    }

    fn inference_gaze(
        &self,
        frames: &Tensor<InferBackend, 4>,
        gazes: Option<Tensor<InferBackend, 4>>,
    ) -> Result<Tensor<InferBackend, 4>, TrainingError> {
        let gaze = match gazes {
            Some(gaze) => gaze,
            None => synthesize_gaze(self.teacher()?, frames.clone())?,
        };
        check_gaze(frames.dims(), gaze.dims())?;
        Ok(gaze)
    }

    #[cfg(test)]
    pub(crate) fn network(&self) -> &GazedActionNetwork<TrainBackend> {
        &self.state.network
    }
}

fn check_gaze(frames: [usize; 4], gaze: [usize; 4]) -> Result<(), TrainingError> {
    if frames != gaze {
        return Err(TrainingError::ShapeMismatch {
            what: "gaze batch",
            expected: frames.to_vec(),
            actual: gaze.to_vec(),
        });
    }
    Ok(())
}

impl Classifier for GazedActionClassifier {
    fn variant(&self) -> ModelVariant {
        ModelVariant::DualStream
    }

    fn config(&self) -> &ClassifierConfig {
        &self.state.config
    }

    fn device(&self) -> &BackendDevice {
        &self.state.device
    }

    fn data_fields(&self) -> DataFields {
        self.splits.fields()
    }

    fn runs_subdir(&self) -> PathBuf {
        PathBuf::from(&self.splits.game).join(format!(
            "{}_{}",
            self.splits.dataset_train,
            self.variant().class_name()
        ))
    }

    fn load_epoch(&self) -> Option<usize> {
        self.state.load_epoch
    }

    fn check_gaze_source(&self, dataset: &dyn ActionDataset) -> Result<(), TrainingError> {
        if !self.splits.fused_gazes {
            self.teacher()?;
            return Ok(());
        }
        if dataset.has_fused_gazes() {
            return Ok(());
        }
        let missing = (0..dataset.len())
            .find(|&index| dataset.sample(index).map_or(true, |s| s.gaze.is_none()))
            .unwrap_or(0);
        Err(DataError::MissingGaze { index: missing }.into())
    }

    fn train_batch(&mut self, batch: &ActionBatch<TrainBackend>) -> Result<StepOutput, TrainingError> {
        check_frames("frame batch", batch.frames.dims(), self.state.config.input_shape)?;
        let gaze = self.training_gaze(batch)?;
        let logits = self.forward(batch.frames.clone(), gaze);
        self.state.step(logits, batch)
    }

    fn predict(
        &self,
        frames: Tensor<InferBackend, 4>,
        gazes: Option<Tensor<InferBackend, 4>>,
    ) -> Result<Vec<usize>, TrainingError> {
        check_frames("frame batch", frames.dims(), self.state.config.input_shape)?;
        let gaze = self.inference_gaze(&frames, gazes)?;
        let logits = self
            .state
            .with_inference(|network| network.forward(frames, gaze, Mode::Eval));
        Ok(argmax_actions(logits))
    }

    fn save_checkpoint(&self, epoch: usize, loss: f32) -> Result<PathBuf, TrainingError> {
        self.state.save(epoch, loss)
    }

    fn load_checkpoint(&mut self, epoch: usize) -> Result<CheckpointMetadata, TrainingError> {
        self.state.load(epoch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{collate, SyntheticProvider};
    use crate::model::gaze::MeanIntensityGaze;
    use burn::tensor::Distribution;

    fn config() -> ClassifierConfig {
        ClassifierConfig {
            dropout: 0.0,
            ..ClassifierConfig::default()
        }
    }

    fn splits(fused_gazes: bool) -> DatasetSplits {
        DatasetSplits {
            fused_gazes,
            ..DatasetSplits::default()
        }
    }

    #[test]
    fn test_step_with_fused_gazes() {
        let dir = tempfile::tempdir().unwrap();
        let mut classifier = GazedActionClassifier::new(
            config(),
            splits(true),
            CheckpointManager::new(dir.path()),
            None,
            None,
        )
        .unwrap();

        let dataset = SyntheticProvider::new(3, 18, [84, 84], 5)
            .generate(0, true)
            .unwrap();
        classifier.preflight(&dataset).unwrap();
        let batch = collate::<TrainBackend>(&dataset, &[0, 1, 2], true, classifier.device()).unwrap();

        let before = classifier.network().head.output_weights();
        let output = classifier.train_batch(&batch).unwrap();
        assert!(output.loss.is_finite() && output.loss >= 0.0);
        assert_ne!(before, classifier.network().head.output_weights());
    }

    #[test]
    fn test_step_with_teacher_gaze() {
        let dir = tempfile::tempdir().unwrap();
        let mut classifier = GazedActionClassifier::new(
            config(),
            splits(false),
            CheckpointManager::new(dir.path()),
            Some(Box::new(MeanIntensityGaze)),
            None,
        )
        .unwrap();
        assert_eq!(classifier.data_fields(), DataFields::FRAMES_ACTIONS);

        let dataset = SyntheticProvider::new(2, 18, [84, 84], 5)
            .generate(0, false)
            .unwrap();
        classifier.preflight(&dataset).unwrap();
        let batch = collate::<TrainBackend>(&dataset, &[0, 1], false, classifier.device()).unwrap();
        assert!(batch.gazes.is_none());

        let output = classifier.train_batch(&batch).unwrap();
        assert!(output.loss.is_finite());

        let accuracy = classifier.accuracy(&dataset, 2).unwrap();
        assert!((0.0..=1.0).contains(&accuracy));
    }

    #[test]
    fn test_missing_teacher_is_gaze_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let classifier = GazedActionClassifier::new(
            config(),
            splits(false),
            CheckpointManager::new(dir.path()),
            None,
            None,
        )
        .unwrap();

        let dataset = SyntheticProvider::new(2, 18, [84, 84], 5)
            .generate(0, false)
            .unwrap();
        assert!(matches!(
            classifier.preflight(&dataset),
            Err(TrainingError::GazeUnavailable)
        ));

        let frames = Tensor::<InferBackend, 4>::zeros([1, 4, 84, 84], classifier.device());
        assert!(matches!(
            classifier.predict(frames, None),
            Err(TrainingError::GazeUnavailable)
        ));
    }

    #[test]
    fn test_requested_gazes_missing_from_data() {
        let dir = tempfile::tempdir().unwrap();
        let classifier = GazedActionClassifier::new(
            config(),
            splits(true),
            CheckpointManager::new(dir.path()),
            None,
            None,
        )
        .unwrap();

        let dataset = SyntheticProvider::new(2, 18, [84, 84], 5)
            .generate(0, false)
            .unwrap();
        assert!(matches!(
            classifier.preflight(&dataset),
            Err(TrainingError::Data(DataError::MissingGaze { index: 0 }))
        ));
    }

    #[test]
    fn test_mismatched_gaze_batch_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let classifier = GazedActionClassifier::new(
            config(),
            splits(true),
            CheckpointManager::new(dir.path()),
            None,
            None,
        )
        .unwrap();

        let device = classifier.device().clone();
        let frames = Tensor::<InferBackend, 4>::zeros([2, 4, 84, 84], &device);
        let gaze = Tensor::<InferBackend, 4>::zeros([1, 4, 84, 84], &device);
        assert!(matches!(
            classifier.predict(frames, Some(gaze)),
            Err(TrainingError::ShapeMismatch {
                what: "gaze batch",
                ..
            })
        ));
    }

    #[test]
    fn test_checkpoint_and_run_locations() {
        let dir = tempfile::tempdir().unwrap();
        let checkpoints = CheckpointManager::new(dir.path());
        let classifier = GazedActionClassifier::new(
            config(),
            splits(true),
            checkpoints.clone(),
            None,
            None,
        )
        .unwrap();

        let path = classifier.save_checkpoint(10, 2.0).unwrap();
        assert_eq!(
            path,
            dir.path().join("breakout/combined/GAZED_ACTION_SL_Epoch_10")
        );
        assert_eq!(
            classifier.runs_subdir(),
            PathBuf::from("breakout/combined_GAZED_ACTION_SL")
        );

        let device = classifier.device().clone();
        let frames = Tensor::<InferBackend, 4>::random([2, 4, 84, 84], Distribution::Default, &device);
        let gaze = Tensor::<InferBackend, 4>::random([2, 4, 84, 84], Distribution::Default, &device);
        let expected = classifier
            .predict(frames.clone(), Some(gaze.clone()))
            .unwrap();

        let loaded =
            GazedActionClassifier::new(config(), splits(true), checkpoints, None, Some(10)).unwrap();
        assert_eq!(loaded.resume(), 10);
        assert_eq!(loaded.predict(frames, Some(gaze)).unwrap(), expected);
    }
}
