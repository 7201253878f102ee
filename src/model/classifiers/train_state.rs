use std::cell::RefCell;
use std::path::PathBuf;

use burn::module::AutodiffModule;
use burn::nn::loss::{CrossEntropyLoss, CrossEntropyLossConfig};
use burn::optim::adaptor::OptimizerAdaptor;
use burn::optim::{Adam, AdamConfig, GradientsParams, Optimizer};
use burn::prelude::*;
use burn::tensor::ElementConversion;

use crate::checkpoint::{
    CheckpointHyperparameters, CheckpointKey, CheckpointManager, CheckpointMetadata,
};
use crate::data::ActionBatch;
use crate::error::TrainingError;
use crate::model::classifier::{argmax_actions, check_labels, ClassifierConfig, StepOutput};
use crate::util::unix_timestamp;
use crate::{BackendDevice, TrainBackend};

pub(crate) type AdamOptimizer<M> = OptimizerAdaptor<Adam, M, TrainBackend>;

/// Network, optimizer and checkpoint location owned by one classifier.
pub(crate) struct TrainState<M: AutodiffModule<TrainBackend>> {
    pub network: M,
    optimizer: AdamOptimizer<M>,
    loss_fn: CrossEntropyLoss<TrainBackend>,
    checkpoints: CheckpointManager,
    key: CheckpointKey,
    pub config: ClassifierConfig,
    pub device: BackendDevice,
    /// Set when constructed in load mode.
    pub load_epoch: Option<usize>,
    /// `valid()` copy of `network`, dropped whenever the weights change.
    inference: RefCell<Option<M::InnerModule>>,
}

impl<M: AutodiffModule<TrainBackend>> TrainState<M> {
    /// `key` fixes variant and scope; its epoch is replaced on every save and load.
    pub fn new(
        network: M,
        config: ClassifierConfig,
        checkpoints: CheckpointManager,
        key: CheckpointKey,
        device: BackendDevice,
    ) -> Self {
        TrainState {
            network,
            optimizer: AdamConfig::new().init(),
            loss_fn: CrossEntropyLossConfig::new().init(&device),
            checkpoints,
            key,
            config,
            device,
            load_epoch: None,
            inference: RefCell::new(None),
        }
    }

    /// Cross-entropy against the batch labels, then one Adam step.
    pub fn step(
        &mut self,
        logits: Tensor<TrainBackend, 2>,
        batch: &ActionBatch<TrainBackend>,
    ) -> Result<StepOutput, TrainingError> {
        check_labels(&batch.labels, self.config.num_actions)?;

        let predictions = argmax_actions(logits.clone().inner());
        let loss = self.loss_fn.forward(logits, batch.actions.clone());
        let loss_value = loss.clone().into_scalar().elem::<f32>();

        let grads = GradientsParams::from_grads(loss.backward(), &self.network);
        self.network = self
            .optimizer
            .step(self.config.learning_rate, self.network.clone(), grads);
        self.inference.get_mut().take();

        Ok(StepOutput {
            loss: loss_value,
            predictions,
        })
    }

    pub fn save(&self, epoch: usize, loss: f32) -> Result<PathBuf, TrainingError> {
        let key = self.key.at_epoch(epoch);
        let metadata = CheckpointMetadata {
            epoch,
            loss,
            variant: key.variant,
            game: key.scope.game().map(str::to_string),
            dataset: key.scope.dataset_name().map(str::to_string),
            timestamp: unix_timestamp(),
            hyperparameters: CheckpointHyperparameters {
                learning_rate: self.config.learning_rate,
                num_actions: self.config.num_actions,
                input_shape: self.config.input_shape,
                dropout: self.config.dropout,
                seed: self.config.seed,
            },
        };
        let path = self
            .checkpoints
            .save(&key, &self.network, &self.optimizer, &metadata)?;
        Ok(path)
    }

    /// Restore the record for `epoch` and enter load mode.
    pub fn enter_load_mode(&mut self, epoch: usize) -> Result<(), TrainingError> {
        self.load(epoch)?;
        self.load_epoch = Some(epoch);
        Ok(())
    }

    pub fn load(&mut self, epoch: usize) -> Result<CheckpointMetadata, TrainingError> {
        let key = self.key.at_epoch(epoch);
        let loaded = self.checkpoints.load(
            &key,
            self.network.clone(),
            self.optimizer.clone(),
            &self.device,
        )?;
        self.network = loaded.model;
        self.optimizer = loaded.optimizer;
        self.inference.get_mut().take();
        log::info!(
            "loaded {} checkpoint from {}",
            key.variant,
            loaded.path.display()
        );
        Ok(loaded.metadata)
    }

    /// Run `f` on the inference-backend copy of the network. The copy is
    /// taken once and reused until the next step or load.
    pub fn with_inference<R>(&self, f: impl FnOnce(&M::InnerModule) -> R) -> R {
        let mut cached = self.inference.borrow_mut();
        let network = cached.get_or_insert_with(|| self.network.valid());
        f(network)
    }
}
