use std::collections::VecDeque;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::MetricsError;

/// Training metrics tracker: rolling loss window plus label and prediction
/// histograms since the last emission.
pub struct TrainingMetrics {
    update_losses: VecDeque<f32>,
    capacity: usize,
    total_updates: usize, // lifetime count, never capped
    action_counts: Vec<usize>,
    prediction_counts: Vec<usize>,
}

impl TrainingMetrics {
    pub fn with_capacity(capacity: usize, num_actions: usize) -> Self {
        TrainingMetrics {
            update_losses: VecDeque::with_capacity(capacity),
            capacity,
            total_updates: 0,
            action_counts: vec![0; num_actions],
            prediction_counts: vec![0; num_actions],
        }
    }

    pub fn new(num_actions: usize) -> Self {
        Self::with_capacity(100, num_actions)
    }

    pub fn record_update(&mut self, loss: f32) {
        self.total_updates += 1;
        self.update_losses.push_back(loss);
        if self.update_losses.len() > self.capacity {
            self.update_losses.pop_front();
        }
    }

    /// Count the labels of a batch and the actions predicted for it.
    pub fn record_batch(&mut self, labels: &[usize], predictions: &[usize]) {
        for &label in labels {
            if let Some(count) = self.action_counts.get_mut(label) {
                *count += 1;
            }
        }
        for &action in predictions {
            if let Some(count) = self.prediction_counts.get_mut(action) {
                *count += 1;
            }
        }
    }

    /// Average loss over the last N updates.
    pub fn average_loss(&self, last_n: usize) -> f32 {
        let n = self.update_losses.len().min(last_n);
        if n == 0 {
            return 0.0;
        }
        let sum: f32 = self.update_losses.iter().rev().take(n).sum();
        sum / n as f32
    }

    pub fn action_histogram(&self) -> &[usize] {
        &self.action_counts
    }

    pub fn prediction_histogram(&self) -> &[usize] {
        &self.prediction_counts
    }

    /// Start new histograms, e.g. after an emission.
    pub fn reset_histograms(&mut self) {
        self.action_counts.iter_mut().for_each(|c| *c = 0);
        self.prediction_counts.iter_mut().for_each(|c| *c = 0);
    }

    pub fn total_updates(&self) -> usize {
        self.total_updates
    }
}

/// One metrics emission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochRecord {
    pub epoch: usize,
    pub loss: f32,
    /// `None` when the validation set was empty.
    pub accuracy: Option<f32>,
    pub action_histogram: Vec<usize>,
    pub prediction_histogram: Vec<usize>,
    pub timestamp: u64,
}

/// Append-only destination for metrics emissions.
pub trait MetricsSink {
    fn record(&mut self, record: &EpochRecord) -> Result<(), MetricsError>;
}

/// Keeps every record in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub records: Vec<EpochRecord>,
}

impl MetricsSink for MemorySink {
    fn record(&mut self, record: &EpochRecord) -> Result<(), MetricsError> {
        self.records.push(record.clone());
        Ok(())
    }
}

/// Writes one JSON object per line to `run_{n}/metrics.jsonl`.
pub struct JsonlMetricsWriter {
    run_dir: PathBuf,
    path: PathBuf,
}

impl JsonlMetricsWriter {
    /// Allocate a fresh `run_{n}` directory under `runs_dir`, one past the
    /// highest run index already there. Never reuses an existing run.
    pub fn create(runs_dir: &Path) -> Result<Self, MetricsError> {
        let write_err = |source| MetricsError::Write {
            path: runs_dir.to_path_buf(),
            source,
        };
        fs::create_dir_all(runs_dir).map_err(write_err)?;

        let mut next = 0;
        for entry in fs::read_dir(runs_dir).map_err(write_err)? {
            let entry = entry.map_err(write_err)?;
            if let Some(index) = run_index(&entry.file_name().to_string_lossy()) {
                next = next.max(index + 1);
            }
        }

        let run_dir = runs_dir.join(format!("run_{}", next));
        // errors if another run claimed the index first
        fs::create_dir(&run_dir).map_err(|source| MetricsError::Write {
            path: run_dir.clone(),
            source,
        })?;
        let path = run_dir.join("metrics.jsonl");
        Ok(JsonlMetricsWriter { run_dir, path })
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn run_index(name: &str) -> Option<usize> {
    name.strip_prefix("run_")?.parse().ok()
}

impl MetricsSink for JsonlMetricsWriter {
    fn record(&mut self, record: &EpochRecord) -> Result<(), MetricsError> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');
        let write_err = |source| MetricsError::Write {
            path: self.path.clone(),
            source,
        };
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(write_err)?;
        file.write_all(line.as_bytes()).map_err(write_err)
    }
}
