use std::path::PathBuf;

use crate::data::{batch_indices, collate, ActionDataset, ImbalancedSampler};
use crate::error::TrainingError;
use crate::model::Classifier;
use crate::training::metrics::{EpochRecord, MetricsSink, TrainingMetrics};
use crate::util::unix_timestamp;
use crate::TrainBackend;

/// Trainer configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainerConfig {
    /// Epoch ceiling; training stops once this many epochs are complete.
    pub max_epochs: usize,
    pub checkpoint_interval: usize,
    pub log_interval: usize,
    pub batch_size: usize,
    /// Seed of the imbalanced sampler.
    pub seed: u64,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        TrainerConfig {
            max_epochs: 20_000,
            checkpoint_interval: 10,
            log_interval: 1,
            batch_size: 32,
            seed: 42,
        }
    }
}

/// What a call to [`Trainer::train`] did.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TrainingSummary {
    /// Epoch training started from (the resumed epoch, or 0).
    pub start_epoch: usize,
    /// Number of completed epochs when training stopped.
    pub end_epoch: usize,
    /// Mean batch loss of the last epoch.
    pub last_loss: Option<f32>,
    pub last_accuracy: Option<f32>,
    pub last_checkpoint: Option<PathBuf>,
}

impl TrainingSummary {
    pub fn epochs_run(&self) -> usize {
        self.end_epoch - self.start_epoch
    }
}

/// Epoch loop driving a [`Classifier`] over class-balanced batches.
///
/// Epoch numbers count completed epochs: the record saved after the tenth
/// epoch is `Epoch_10`, and resuming from it runs the eleventh next.
pub struct Trainer {
    config: TrainerConfig,
}

impl Trainer {
    pub fn new(config: TrainerConfig) -> Self {
        Trainer { config }
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    /// Run the training loop from the classifier's resume epoch up to the
    /// epoch ceiling.
    ///
    /// Without a `validation` set, accuracy is measured on `train`.
    pub fn train(
        &self,
        classifier: &mut dyn Classifier,
        train: &dyn ActionDataset,
        validation: Option<&dyn ActionDataset>,
        sink: &mut dyn MetricsSink,
    ) -> Result<TrainingSummary, TrainingError> {
        classifier.preflight(train)?;
        if let Some(validation) = validation {
            classifier.check_validation(validation)?;
        }

        let start_epoch = classifier.resume();
        let mut summary = TrainingSummary {
            start_epoch,
            end_epoch: start_epoch,
            ..TrainingSummary::default()
        };
        if start_epoch >= self.config.max_epochs {
            log::info!(
                "{} already at epoch {} of {}, nothing to train",
                classifier.variant(),
                start_epoch,
                self.config.max_epochs
            );
            return Ok(summary);
        }

        let validation = match validation {
            Some(validation) => validation,
            None => {
                log::warn!("no validation split supplied, reporting accuracy on the training set");
                train
            }
        };

        let mut sampler = ImbalancedSampler::from_dataset(train, self.config.seed)?;
        let with_gazes = classifier.data_fields().fused_gazes;
        let batch_size = self.config.batch_size.max(1);
        let log_interval = self.config.log_interval.max(1);
        let checkpoint_interval = self.config.checkpoint_interval.max(1);
        let mut metrics = TrainingMetrics::new(classifier.config().num_actions);

        log::info!(
            "training {} on {} samples, epochs {}..{}, batch size {}",
            classifier.variant(),
            train.len(),
            start_epoch + 1,
            self.config.max_epochs,
            batch_size
        );

        for epoch in start_epoch..self.config.max_epochs {
            let order = sampler.epoch_order();
            let mut epoch_loss = 0.0f32;
            let mut batches = 0usize;

            for indices in batch_indices(&order, batch_size) {
                let batch = collate::<TrainBackend>(train, indices, with_gazes, classifier.device())?;
                let output = classifier.train_batch(&batch)?;
                metrics.record_update(output.loss);
                metrics.record_batch(&batch.labels, &output.predictions);
                epoch_loss += output.loss;
                batches += 1;
            }

            let completed = epoch + 1;
            let loss = epoch_loss / batches.max(1) as f32;
            summary.end_epoch = completed;
            summary.last_loss = Some(loss);

            if completed % log_interval == 0 {
                log::info!(
                    "epoch {}/{} | loss: {:.4} | avg_loss({}): {:.4}",
                    completed,
                    self.config.max_epochs,
                    loss,
                    log_interval * batches,
                    metrics.average_loss(log_interval * batches),
                );
            }

            if completed % checkpoint_interval == 0 {
                let path = classifier.save_checkpoint(completed, loss)?;
                summary.last_checkpoint = Some(path.clone());

                let accuracy = match classifier.accuracy(validation, batch_size) {
                    Ok(accuracy) => Some(accuracy),
                    Err(TrainingError::EmptyValidationSet) => {
                        log::warn!("validation set is empty, accuracy not recorded");
                        None
                    }
                    Err(e) => return Err(e),
                };
                summary.last_accuracy = accuracy;
                log::info!(
                    "  >> checkpoint saved: {} (accuracy: {})",
                    path.display(),
                    accuracy.map_or_else(|| "n/a".to_string(), |a| format!("{:.1}%", a * 100.0))
                );

                sink.record(&EpochRecord {
                    epoch: completed,
                    loss,
                    accuracy,
                    action_histogram: metrics.action_histogram().to_vec(),
                    prediction_histogram: metrics.prediction_histogram().to_vec(),
                    timestamp: unix_timestamp(),
                })?;
                metrics.reset_histograms();
            }
        }

        log::info!(
            "training complete at epoch {} ({} updates)",
            summary.end_epoch,
            metrics.total_updates()
        );
        Ok(summary)
    }
}
