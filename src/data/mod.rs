//! Dataset interface, batching and class-balanced sampling.

mod batch;
mod dataset;
mod sampler;
mod synthetic;

pub use batch::{batch_indices, collate, ActionBatch};
pub use dataset::{
    ActionDataset, ActionSample, DataFields, DatasetProvider, DatasetSplits, InMemoryDataset,
};
pub use sampler::{class_counts, ImbalancedSampler};
pub use synthetic::SyntheticProvider;
