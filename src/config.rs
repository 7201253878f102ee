use std::path::{Path, PathBuf};

use crate::data::DatasetSplits;
use crate::error::ConfigError;
use crate::model::networks::encoder::flattened_width;
use crate::model::ClassifierConfig;
use crate::training::TrainerConfig;

/// Epoch loop settings (`[training]` table).
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct TrainingSection {
    pub max_epochs: usize,
    pub checkpoint_interval: usize,
    pub log_interval: usize,
}

impl Default for TrainingSection {
    fn default() -> Self {
        let trainer = TrainerConfig::default();
        TrainingSection {
            max_epochs: trainer.max_epochs,
            checkpoint_interval: trainer.checkpoint_interval,
            log_interval: trainer.log_interval,
        }
    }
}

/// Top-level application configuration, loadable from TOML.
///
/// The three top-level keys keep their upper-case names; lower-case
/// spellings are accepted too.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Checkpoint root.
    #[serde(rename = "MODEL_SAVE_DIR", alias = "model_save_dir")]
    pub model_save_dir: PathBuf,
    /// Metrics root.
    #[serde(rename = "RUNS_DIR", alias = "runs_dir")]
    pub runs_dir: PathBuf,
    #[serde(rename = "BATCH_SIZE", alias = "batch_size")]
    pub batch_size: usize,
    pub model: ClassifierConfig,
    pub data: DatasetSplits,
    pub training: TrainingSection,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            model_save_dir: PathBuf::from("models"),
            runs_dir: PathBuf::from("runs"),
            batch_size: TrainerConfig::default().batch_size,
            model: ClassifierConfig::default(),
            data: DatasetSplits::default(),
            training: TrainingSection::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config: AppConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the file
    /// does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            log::warn!("config file '{}' not found, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::Validation("BATCH_SIZE must be > 0".into()));
        }
        if self.model.num_actions == 0 {
            return Err(ConfigError::Validation(
                "model.num_actions must be > 0".into(),
            ));
        }
        if self.model.learning_rate <= 0.0 {
            return Err(ConfigError::Validation(
                "model.learning_rate must be > 0".into(),
            ));
        }
        if !(0.0..1.0).contains(&self.model.dropout) {
            return Err(ConfigError::Validation(
                "model.dropout must be in [0, 1)".into(),
            ));
        }
        if flattened_width(self.model.input_shape).is_none() {
            return Err(ConfigError::Validation(format!(
                "model.input_shape {:?} is too small for the encoder",
                self.model.input_shape
            )));
        }
        if self.data.game.is_empty() || self.data.dataset_train.is_empty() {
            return Err(ConfigError::Validation(
                "data.game and data.dataset_train must be set".into(),
            ));
        }
        if self.training.max_epochs == 0 {
            return Err(ConfigError::Validation(
                "training.max_epochs must be > 0".into(),
            ));
        }
        if self.training.checkpoint_interval == 0 {
            return Err(ConfigError::Validation(
                "training.checkpoint_interval must be > 0".into(),
            ));
        }
        if self.training.log_interval == 0 {
            return Err(ConfigError::Validation(
                "training.log_interval must be > 0".into(),
            ));
        }
        Ok(())
    }

    /// Trainer settings drawn from `[training]`, `BATCH_SIZE` and the model seed.
    pub fn trainer_config(&self) -> TrainerConfig {
        TrainerConfig {
            max_epochs: self.training.max_epochs,
            checkpoint_interval: self.training.checkpoint_interval,
            log_interval: self.training.log_interval,
            batch_size: self.batch_size,
            seed: self.model.seed,
        }
    }

    /// Generate a TOML string with all default values (useful for creating
    /// example config files).
    pub fn default_toml() -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(&AppConfig::default())?)
    }
}
