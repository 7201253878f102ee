use std::fs;
use std::path::{Path, PathBuf};

use burn::module::AutodiffModule;
use burn::optim::Optimizer;
use burn::record::{DefaultRecorder, Recorder};

use crate::checkpoint::key::{CheckpointKey, CheckpointScope};
use crate::checkpoint::metadata::CheckpointMetadata;
use crate::error::CheckpointError;
use crate::model::ModelVariant;
use crate::TrainBackend;

const MODEL_FILE: &str = "model";
const OPTIMIZER_FILE: &str = "optimizer";
const METADATA_FILE: &str = "metadata.json";

/// Model and optimizer restored from a checkpoint, with its metadata.
pub struct LoadedCheckpoint<M, O> {
    pub path: PathBuf,
    pub model: M,
    pub optimizer: O,
    pub metadata: CheckpointMetadata,
}

/// Saves, loads and lists checkpoint records under a root directory.
///
/// Each record is a directory holding the model parameters, the optimizer
/// state and a JSON metadata file. Records are never pruned.
#[derive(Debug, Clone)]
pub struct CheckpointManager {
    root: PathBuf,
}

impl CheckpointManager {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        CheckpointManager { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn location(&self, key: &CheckpointKey) -> PathBuf {
        key.location(&self.root)
    }

    pub fn exists(&self, key: &CheckpointKey) -> bool {
        self.location(key).join(METADATA_FILE).exists()
    }

    /// Write model, optimizer and metadata for `key`, replacing any record
    /// already saved there.
    pub fn save<M, O>(
        &self,
        key: &CheckpointKey,
        model: &M,
        optimizer: &O,
        metadata: &CheckpointMetadata,
    ) -> Result<PathBuf, CheckpointError>
    where
        M: AutodiffModule<TrainBackend>,
        O: Optimizer<M, TrainBackend>,
    {
        let final_dir = self.location(key);
        let scope_dir = key.scope.dir(&self.root);
        let tmp_dir = scope_dir.join(format!("{}.tmp", key.dir_name()));

        if tmp_dir.exists() {
            fs::remove_dir_all(&tmp_dir)?;
        }
        fs::create_dir_all(&tmp_dir)?;

        let recorder = DefaultRecorder::default();
        model
            .clone()
            .save_file(tmp_dir.join(MODEL_FILE), &recorder)
            .map_err(|e| CheckpointError::RecordSave {
                what: "model",
                reason: e.to_string(),
            })?;
        Recorder::<TrainBackend>::record(
            &recorder,
            optimizer.to_record(),
            tmp_dir.join(OPTIMIZER_FILE),
        )
        .map_err(|e| CheckpointError::RecordSave {
            what: "optimizer",
            reason: e.to_string(),
        })?;

        let meta_json = serde_json::to_string_pretty(metadata)?;
        fs::write(tmp_dir.join(METADATA_FILE), meta_json)?;

        // Atomic rename
        if final_dir.exists() {
            fs::remove_dir_all(&final_dir)?;
        }
        fs::rename(&tmp_dir, &final_dir)?;

        log::debug!("saved checkpoint {}", final_dir.display());
        Ok(final_dir)
    }

    /// Restore `model` and `optimizer` from the record at `key`.
    ///
    /// The passed-in model and optimizer only provide structure; every
    /// parameter and moment is replaced by the saved values.
    pub fn load<M, O>(
        &self,
        key: &CheckpointKey,
        model: M,
        optimizer: O,
        device: &<TrainBackend as burn::tensor::backend::Backend>::Device,
    ) -> Result<LoadedCheckpoint<M, O>, CheckpointError>
    where
        M: AutodiffModule<TrainBackend>,
        O: Optimizer<M, TrainBackend>,
    {
        let dir = self.location(key);
        if !dir.join(METADATA_FILE).exists() {
            return Err(CheckpointError::Missing(dir));
        }
        let metadata = Self::read_metadata(&dir)?;

        let recorder = DefaultRecorder::default();
        let model = model
            .load_file(dir.join(MODEL_FILE), &recorder, device)
            .map_err(|e| CheckpointError::RecordLoad {
                what: "model",
                reason: e.to_string(),
            })?;
        let record = Recorder::<TrainBackend>::load(&recorder, dir.join(OPTIMIZER_FILE), device)
            .map_err(|e| CheckpointError::RecordLoad {
                what: "optimizer",
                reason: e.to_string(),
            })?;
        let optimizer = optimizer.load_record(record);

        Ok(LoadedCheckpoint {
            path: dir,
            model,
            optimizer,
            metadata,
        })
    }

    /// Read the metadata of a record directory.
    pub fn read_metadata(dir: &Path) -> Result<CheckpointMetadata, CheckpointError> {
        let meta_path = dir.join(METADATA_FILE);
        let meta_json =
            fs::read_to_string(&meta_path).map_err(|e| CheckpointError::MetadataRead {
                path: meta_path.clone(),
                source: e,
            })?;
        serde_json::from_str(&meta_json).map_err(|e| CheckpointError::MetadataParse {
            path: meta_path,
            source: e,
        })
    }

    /// List every record of `variant` within `scope`, sorted by epoch (ascending).
    pub fn list(
        &self,
        variant: ModelVariant,
        scope: &CheckpointScope,
    ) -> Result<Vec<(PathBuf, CheckpointMetadata)>, CheckpointError> {
        let scope_dir = scope.dir(&self.root);
        if !scope_dir.exists() {
            return Ok(Vec::new());
        }

        let prefix = CheckpointKey::name_prefix(variant);
        let mut results = Vec::new();
        for entry in fs::read_dir(&scope_dir)? {
            let entry = entry?;
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let name = entry.file_name();
            let name_str = name.to_string_lossy();
            if !name_str.starts_with(&prefix) || name_str.ends_with(".tmp") {
                continue;
            }
            if path.join(METADATA_FILE).exists() {
                let metadata = Self::read_metadata(&path)?;
                results.push((path, metadata));
            }
        }
        results.sort_by_key(|(_, m)| m.epoch);
        Ok(results)
    }

    /// Highest saved epoch of `variant` within `scope`.
    pub fn latest_epoch(
        &self,
        variant: ModelVariant,
        scope: &CheckpointScope,
    ) -> Result<Option<usize>, CheckpointError> {
        Ok(self
            .list(variant, scope)?
            .last()
            .map(|(_, metadata)| metadata.epoch))
    }
}
