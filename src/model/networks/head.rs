use burn::nn::{Linear, LinearConfig};
use burn::prelude::*;

/// Three stacked fully-connected layers producing raw action logits.
///
/// ```text
/// FC1: features -> 512
/// FC2: 512 -> 128
/// FC3: 128 -> num_actions
/// ```
///
/// No activation is applied between the layers or after the last one.
#[derive(Module, Debug)]
pub struct ClassificationHead<B: Backend> {
    linear1: Linear<B>,
    linear2: Linear<B>,
    linear3: Linear<B>,
}

#[derive(Config, Debug)]
pub struct ClassificationHeadConfig {
    pub in_features: usize,
    pub num_actions: usize,
}

impl ClassificationHeadConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> ClassificationHead<B> {
        ClassificationHead {
            linear1: LinearConfig::new(self.in_features, 512).init(device),
            linear2: LinearConfig::new(512, 128).init(device),
            linear3: LinearConfig::new(128, self.num_actions).init(device),
        }
    }
}

impl<B: Backend> ClassificationHead<B> {
    /// Flatten encoder features [batch, c, h, w] and map them to logits [batch, num_actions].
    pub fn forward(&self, features: Tensor<B, 4>) -> Tensor<B, 2> {
        let [batch_size, channels, height, width] = features.dims();
        let x = features.reshape([batch_size, channels * height * width]);
        let x = self.linear1.forward(x);
        let x = self.linear2.forward(x);
        self.linear3.forward(x)
    }

    /// Width expected by the first layer.
    pub fn in_features(&self) -> usize {
        self.linear1.weight.val().dims()[0]
    }

    /// Flattened copy of the last layer's weights.
    pub(crate) fn output_weights(&self) -> Vec<f32> {
        self.linear3
            .weight
            .val()
            .into_data()
            .iter::<f32>()
            .collect()
    }
}
