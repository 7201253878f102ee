mod key;
mod manager;
mod metadata;

pub use key::{CheckpointKey, CheckpointScope};
pub use manager::{CheckpointManager, LoadedCheckpoint};
pub use metadata::{CheckpointHyperparameters, CheckpointMetadata};
