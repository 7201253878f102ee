use burn::prelude::*;

use super::encoder::{flattened_width, FeatureEncoder, FeatureEncoderConfig};
use super::head::{ClassificationHead, ClassificationHeadConfig};
use super::Mode;

/// Single-stream action network: frame stack -> encoder -> head.
#[derive(Module, Debug)]
pub struct ActionNetwork<B: Backend> {
    pub(crate) encoder: FeatureEncoder<B>,
    pub(crate) head: ClassificationHead<B>,
}

#[derive(Config, Debug)]
pub struct ActionNetworkConfig {
    #[config(default = 18)]
    pub num_actions: usize,
    #[config(default = "[84, 84]")]
    pub input_shape: [usize; 2],
    #[config(default = 0.5)]
    pub dropout: f64,
}

impl ActionNetworkConfig {
    /// Returns `None` when `input_shape` is too small for the encoder.
    pub fn init<B: Backend>(&self, device: &B::Device) -> Option<ActionNetwork<B>> {
        let in_features = flattened_width(self.input_shape)?;
        Some(ActionNetwork {
            encoder: FeatureEncoderConfig::new()
                .with_dropout(self.dropout)
                .init(device),
            head: ClassificationHeadConfig::new(in_features, self.num_actions).init(device),
        })
    }
}

impl<B: Backend> ActionNetwork<B> {
    /// Forward pass: frames [batch, 4, H, W] -> logits [batch, num_actions].
    pub fn forward(&self, frames: Tensor<B, 4>, mode: Mode) -> Tensor<B, 2> {
        let features = self.encoder.forward(frames, mode);
        self.head.forward(features)
    }
}
