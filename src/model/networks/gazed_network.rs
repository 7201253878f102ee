use burn::prelude::*;

use super::encoder::{flattened_width, FeatureEncoder, FeatureEncoderConfig};
use super::head::{ClassificationHead, ClassificationHeadConfig};
use super::Mode;

/// Average frame and gaze features elementwise: `0.5 * (frame + gaze)`.
pub fn fuse_features<B: Backend>(frame: Tensor<B, 4>, gaze: Tensor<B, 4>) -> Tensor<B, 4> {
    (frame + gaze).mul_scalar(0.5)
}

/// Dual-stream action network.
///
/// ```text
/// frames [batch, 4, H, W] --encoder--\
///                                     mean --> head --> logits [batch, num_actions]
/// gaze   [batch, 4, H, W] --encoder--/
/// ```
///
/// Both streams run through the one `encoder`, so convolution and
/// normalisation parameters are shared between them.
#[derive(Module, Debug)]
pub struct GazedActionNetwork<B: Backend> {
    pub(crate) encoder: FeatureEncoder<B>,
    pub(crate) head: ClassificationHead<B>,
}

#[derive(Config, Debug)]
pub struct GazedActionNetworkConfig {
    #[config(default = 18)]
    pub num_actions: usize,
    #[config(default = "[84, 84]")]
    pub input_shape: [usize; 2],
    #[config(default = 0.5)]
    pub dropout: f64,
}

impl GazedActionNetworkConfig {
    /// Returns `None` when `input_shape` is too small for the encoder.
    pub fn init<B: Backend>(&self, device: &B::Device) -> Option<GazedActionNetwork<B>> {
        let in_features = flattened_width(self.input_shape)?;
        Some(GazedActionNetwork {
            encoder: FeatureEncoderConfig::new()
                .with_dropout(self.dropout)
                .init(device),
            head: ClassificationHeadConfig::new(in_features, self.num_actions).init(device),
        })
    }
}

impl<B: Backend> GazedActionNetwork<B> {
    /// Forward pass: (frames, gaze) [batch, 4, H, W] each -> logits [batch, num_actions].
    pub fn forward(&self, frames: Tensor<B, 4>, gaze: Tensor<B, 4>, mode: Mode) -> Tensor<B, 2> {
        let frame_features = self.encoder.forward(frames, mode);
        let gaze_features = self.encoder.forward(gaze, mode);
        self.head.forward(fuse_features(frame_features, gaze_features))
    }
}
