mod action_sl;
mod gazed_action_sl;
mod train_state;

pub use action_sl::ActionClassifier;
pub use gazed_action_sl::GazedActionClassifier;

use crate::checkpoint::{CheckpointManager, CheckpointScope};
use crate::data::DatasetSplits;
use crate::error::TrainingError;
use crate::model::classifier::{Classifier, ClassifierConfig, ModelVariant};
use crate::model::gaze::GazePredictor;

/// Where `variant` keeps its checkpoints.
pub fn checkpoint_scope(variant: ModelVariant, splits: &DatasetSplits) -> CheckpointScope {
    match variant {
        ModelVariant::SingleStream => CheckpointScope::Global,
        ModelVariant::DualStream => CheckpointScope::dataset(&splits.game, &splits.dataset_train),
    }
}

/// Construct either variant behind the common trait.
///
/// `splits` and `teacher` are only used by the dual-stream variant.
pub fn build_classifier(
    variant: ModelVariant,
    config: ClassifierConfig,
    splits: DatasetSplits,
    checkpoints: CheckpointManager,
    teacher: Option<Box<dyn GazePredictor>>,
    load_epoch: Option<usize>,
) -> Result<Box<dyn Classifier>, TrainingError> {
    Ok(match variant {
        ModelVariant::SingleStream => {
            Box::new(ActionClassifier::new(config, checkpoints, load_epoch)?)
        }
        ModelVariant::DualStream => Box::new(GazedActionClassifier::new(
            config,
            splits,
            checkpoints,
            teacher,
            load_epoch,
        )?),
    })
}
