//! Epoch loop, rolling metrics and metrics sinks.

pub mod metrics;
pub mod trainer;

pub use metrics::{EpochRecord, JsonlMetricsWriter, MemorySink, MetricsSink, TrainingMetrics};
pub use trainer::{Trainer, TrainerConfig, TrainingSummary};
