use serde::{Deserialize, Serialize};

use crate::model::ModelVariant;

/// Hyperparameters recorded in checkpoint metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointHyperparameters {
    pub learning_rate: f64,
    pub num_actions: usize,
    pub input_shape: [usize; 2],
    pub dropout: f64,
    pub seed: u64,
}

/// Top-level checkpoint metadata written to metadata.json.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointMetadata {
    pub epoch: usize,
    pub loss: f32,
    pub variant: ModelVariant,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset: Option<String>,
    pub timestamp: u64,
    pub hyperparameters: CheckpointHyperparameters,
}
