//! Networks, the classifier lifecycle and gaze synthesis.

mod classifier;
pub mod classifiers;
pub mod gaze;
pub mod networks;
pub mod shape;

pub use classifier::{
    argmax_actions, check_frames, check_labels, Classifier, ClassifierConfig, ModelVariant,
    StepOutput,
};
pub use classifiers::{build_classifier, checkpoint_scope, ActionClassifier, GazedActionClassifier};
pub use gaze::{GazeEstimate, GazePredictor, MeanIntensityGaze};
