use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::model::ModelVariant;

/// Where in the checkpoint tree a model's records live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CheckpointScope {
    /// Directly under the checkpoint root.
    Global,
    /// Under `{root}/{game}/{dataset}`.
    Dataset { game: String, dataset: String },
}

impl CheckpointScope {
    pub fn dataset(game: impl Into<String>, dataset: impl Into<String>) -> Self {
        CheckpointScope::Dataset {
            game: game.into(),
            dataset: dataset.into(),
        }
    }

    pub fn dir(&self, root: &Path) -> PathBuf {
        match self {
            CheckpointScope::Global => root.to_path_buf(),
            CheckpointScope::Dataset { game, dataset } => root.join(game).join(dataset),
        }
    }

    pub fn game(&self) -> Option<&str> {
        match self {
            CheckpointScope::Global => None,
            CheckpointScope::Dataset { game, .. } => Some(game),
        }
    }

    pub fn dataset_name(&self) -> Option<&str> {
        match self {
            CheckpointScope::Global => None,
            CheckpointScope::Dataset { dataset, .. } => Some(dataset),
        }
    }
}

/// Identity of one checkpoint record: model variant, scope and epoch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointKey {
    pub variant: ModelVariant,
    pub scope: CheckpointScope,
    pub epoch: usize,
}

impl CheckpointKey {
    pub fn new(variant: ModelVariant, scope: CheckpointScope, epoch: usize) -> Self {
        CheckpointKey {
            variant,
            scope,
            epoch,
        }
    }

    /// Same variant and scope, different epoch.
    pub fn at_epoch(&self, epoch: usize) -> Self {
        CheckpointKey {
            epoch,
            ..self.clone()
        }
    }

    /// Prefix shared by every record of this variant: `{ClassName}_Epoch_`.
    pub fn name_prefix(variant: ModelVariant) -> String {
        format!("{}_Epoch_", variant.class_name())
    }

    /// `{ClassName}_Epoch_{epoch}`
    pub fn dir_name(&self) -> String {
        format!("{}{}", Self::name_prefix(self.variant), self.epoch)
    }

    /// Directory holding this record under `root`.
    pub fn location(&self, root: &Path) -> PathBuf {
        self.scope.dir(root).join(self.dir_name())
    }
}
