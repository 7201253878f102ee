use std::path::PathBuf;

/// Errors that can occur during checkpoint operations.
#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    #[error("no checkpoint saved at {0}")]
    Missing(PathBuf),

    #[error("failed to read metadata from {path}: {source}")]
    MetadataRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse metadata from {path}: {source}")]
    MetadataParse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("failed to save {what}: {reason}")]
    RecordSave { what: &'static str, reason: String },

    #[error("failed to load {what}: {reason}")]
    RecordLoad { what: &'static str, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors raised while reading or batching dataset samples.
#[derive(Debug, thiserror::Error)]
pub enum DataError {
    #[error("{what} has {actual} values, expected {expected}")]
    SampleSize {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("sample {index} has no fused gaze map")]
    MissingGaze { index: usize },

    #[error("sample index {index} out of range for dataset of {len}")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("cannot build a sampler over an empty dataset")]
    EmptyDataset,

    #[error("invalid sampler weights: {0}")]
    InvalidWeights(String),

    #[error("dataset {game}/{split} is unavailable: {reason}")]
    Unavailable {
        game: String,
        split: String,
        reason: String,
    },
}

/// Errors raised by the metrics sink.
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    #[error("failed to write metrics to {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to encode metrics: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Errors that can occur during training, evaluation and inference.
#[derive(Debug, thiserror::Error)]
pub enum TrainingError {
    #[error("shape mismatch in {what}: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        what: &'static str,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("action label {label} out of range for {num_actions} actions")]
    LabelOutOfRange { label: usize, num_actions: usize },

    #[error("validation set is empty")]
    EmptyValidationSet,

    #[error("training dataset is empty")]
    EmptyTrainingSet,

    #[error("fused gazes are not part of the data and no gaze teacher was supplied")]
    GazeUnavailable,

    #[error("checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    #[error("data error: {0}")]
    Data(#[from] DataError),

    #[error("metrics error: {0}")]
    Metrics(#[from] MetricsError),
}

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("failed to serialize TOML: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("config validation error: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_checkpoint_display() {
        let err = CheckpointError::Missing(PathBuf::from("models/ACTION_SL_Epoch_10"));
        assert_eq!(
            err.to_string(),
            "no checkpoint saved at models/ACTION_SL_Epoch_10"
        );
    }

    #[test]
    fn test_shape_mismatch_display() {
        let err = TrainingError::ShapeMismatch {
            what: "frame batch",
            expected: vec![4, 84, 84],
            actual: vec![3, 84, 84],
        };
        assert_eq!(
            err.to_string(),
            "shape mismatch in frame batch: expected [4, 84, 84], got [3, 84, 84]"
        );
    }

    #[test]
    fn test_checkpoint_error_converts_into_training_error() {
        let err: TrainingError = CheckpointError::Missing(PathBuf::from("x")).into();
        assert!(matches!(
            err,
            TrainingError::Checkpoint(CheckpointError::Missing(_))
        ));
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::Validation("BATCH_SIZE must be > 0".to_string());
        assert_eq!(
            err.to_string(),
            "config validation error: BATCH_SIZE must be > 0"
        );
    }
}
