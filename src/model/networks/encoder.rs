use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::pool::{MaxPool2d, MaxPool2dConfig};
use burn::nn::{BatchNorm, BatchNormConfig, Dropout, DropoutConfig, PaddingConfig2d, Relu};
use burn::prelude::*;

use super::Mode;
use crate::model::shape::{chain_output_size, ConvGeometry};

/// Number of temporally stacked frames per input stream.
pub const STACK_DEPTH: usize = 4;

/// Channels produced by the last convolution.
pub const FEATURE_CHANNELS: usize = 64;

/// Geometry of the three convolutions, in order.
pub const ENCODER_CONVS: [ConvGeometry; 3] = [
    ConvGeometry::square(8, 4),
    ConvGeometry::square(4, 2),
    ConvGeometry::square(3, 1),
];

/// 1x1 max pool with unit stride, an identity on every input.
pub const ENCODER_POOL: ConvGeometry = ConvGeometry::square(1, 1);

/// Spatial size of the encoder output for a given input size.
pub fn encoder_output_shape(input_shape: [usize; 2]) -> Option<[usize; 2]> {
    let mut layers = Vec::with_capacity(ENCODER_CONVS.len() * 2);
    for conv in ENCODER_CONVS {
        layers.push(conv);
        layers.push(ENCODER_POOL);
    }
    chain_output_size(input_shape, &layers)
}

/// Width of the flattened encoder output, i.e. the input width of the first
/// fully-connected layer.
pub fn flattened_width(input_shape: [usize; 2]) -> Option<usize> {
    encoder_output_shape(input_shape).map(|[h, w]| FEATURE_CHANNELS * h * w)
}

/// Shared convolutional tower applied to every visual stream.
///
/// ```text
/// Input:  [batch, 4, 84, 84]
/// Conv1:  4 -> 32, 8x8 stride 4   =>  [batch, 32, 20, 20]
/// ReLU, Pool(1x1), BatchNorm(32), Dropout
/// Conv2:  32 -> 64, 4x4 stride 2  =>  [batch, 64, 9, 9]
/// ReLU, Pool(1x1), BatchNorm(64), Dropout
/// Conv3:  64 -> 64, 3x3 stride 1  =>  [batch, 64, 7, 7]
/// ReLU, Pool(1x1), BatchNorm(64), Dropout
/// ```
///
/// Both 64-channel stages normalise through the same `batch_norm64`.
#[derive(Module, Debug)]
pub struct FeatureEncoder<B: Backend> {
    conv1: Conv2d<B>,
    conv2: Conv2d<B>,
    conv3: Conv2d<B>,
    pool: MaxPool2d,
    batch_norm32: BatchNorm<B, 2>,
    batch_norm64: BatchNorm<B, 2>,
    dropout: Dropout,
    relu: Relu,
}

#[derive(Config, Debug)]
pub struct FeatureEncoderConfig {
    /// Drop probability used in `Mode::Train`.
    #[config(default = 0.5)]
    pub dropout: f64,
}

impl FeatureEncoderConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> FeatureEncoder<B> {
        FeatureEncoder {
            conv1: conv_layer([STACK_DEPTH, 32], &ENCODER_CONVS[0], device),
            conv2: conv_layer([32, FEATURE_CHANNELS], &ENCODER_CONVS[1], device),
            conv3: conv_layer([FEATURE_CHANNELS, FEATURE_CHANNELS], &ENCODER_CONVS[2], device),
            pool: MaxPool2dConfig::new(ENCODER_POOL.kernel)
                .with_strides(ENCODER_POOL.stride)
                .init(),
            batch_norm32: BatchNormConfig::new(32).init(device),
            batch_norm64: BatchNormConfig::new(FEATURE_CHANNELS).init(device),
            dropout: DropoutConfig::new(self.dropout).init(),
            relu: Relu::new(),
        }
    }
}

fn conv_layer<B: Backend>(
    channels: [usize; 2],
    geometry: &ConvGeometry,
    device: &B::Device,
) -> Conv2d<B> {
    Conv2dConfig::new(channels, geometry.kernel)
        .with_stride(geometry.stride)
        .with_dilation(geometry.dilation)
        .with_padding(PaddingConfig2d::Explicit(
            geometry.padding[0],
            geometry.padding[1],
        ))
        .init(device)
}

impl<B: Backend> FeatureEncoder<B> {
    /// Forward pass: input [batch, 4, H, W] -> features [batch, 64, h, w].
    pub fn forward(&self, input: Tensor<B, 4>, mode: Mode) -> Tensor<B, 4> {
        let x = self.stage(self.conv1.forward(input), &self.batch_norm32, mode);
        let x = self.stage(self.conv2.forward(x), &self.batch_norm64, mode);
        self.stage(self.conv3.forward(x), &self.batch_norm64, mode)
    }

    fn stage(&self, x: Tensor<B, 4>, norm: &BatchNorm<B, 2>, mode: Mode) -> Tensor<B, 4> {
        let x = self.pool.forward(self.relu.forward(x));
        let x = norm.forward(x);
        match mode {
            Mode::Train => self.dropout.forward(x),
            Mode::Eval => x,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InferBackend;

    #[test]
    fn test_default_output_shape() {
        assert_eq!(encoder_output_shape([84, 84]), Some([7, 7]));
        assert_eq!(flattened_width([84, 84]), Some(64 * 7 * 7));
    }

    #[test]
    fn test_too_small_input_has_no_shape() {
        assert_eq!(encoder_output_shape([16, 16]), None);
    }

    #[test]
    fn test_forward_matches_calculated_shape() {
        let device = Default::default();
        let encoder = FeatureEncoderConfig::new().init::<InferBackend>(&device);

        let input = Tensor::zeros([2, 4, 84, 84], &device);
        let output = encoder.forward(input, Mode::Eval);
        assert_eq!(output.shape().dims, [2, 64, 7, 7]);
    }

    #[test]
    fn test_forward_non_square_input() {
        let device = Default::default();
        let encoder = FeatureEncoderConfig::new().init::<InferBackend>(&device);
        let [h, w] = encoder_output_shape([84, 100]).unwrap();

        let input = Tensor::zeros([1, 4, 84, 100], &device);
        let output = encoder.forward(input, Mode::Eval);
        assert_eq!(output.shape().dims, [1, 64, h, w]);
    }
}
