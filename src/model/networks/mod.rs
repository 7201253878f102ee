mod action_network;
pub mod encoder;
mod gazed_network;
mod head;

pub use action_network::{ActionNetwork, ActionNetworkConfig};
pub use encoder::{FeatureEncoder, FeatureEncoderConfig};
pub use gazed_network::{fuse_features, GazedActionNetwork, GazedActionNetworkConfig};
pub use head::{ClassificationHead, ClassificationHeadConfig};

/// Layer behaviour for a forward pass.
///
/// `Train` applies dropout; `Eval` skips it. Batch normalisation follows the
/// backend: autodiff modules normalise with batch statistics and update their
/// running averages, inference modules (`valid()`) use the frozen averages.
/// Evaluation paths therefore run the `valid()` copy in `Eval`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Train,
    Eval,
}
