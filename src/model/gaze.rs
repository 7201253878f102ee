//! Gaze maps synthesized by a teacher model when the data carries none.

use burn::prelude::*;

use crate::error::TrainingError;
use crate::InferBackend;

/// Raw teacher output for a batch of frame stacks.
#[derive(Debug, Clone)]
pub enum GazeEstimate<B: Backend> {
    /// One saliency map per example: [batch, H, W].
    Map(Tensor<B, 3>),
    /// One saliency value per example: [batch].
    Scalar(Tensor<B, 1>),
}

impl<B: Backend> GazeEstimate<B> {
    /// Broadcast the estimate across channels to the frame batch shape
    /// `[batch, channels, H, W]`.
    pub fn broadcast(self, dims: [usize; 4]) -> Result<Tensor<B, 4>, TrainingError> {
        let [batch, channels, height, width] = dims;
        match self {
            GazeEstimate::Map(map) => {
                let actual = map.dims();
                if actual != [batch, height, width] {
                    return Err(TrainingError::ShapeMismatch {
                        what: "teacher gaze map",
                        expected: vec![batch, height, width],
                        actual: actual.to_vec(),
                    });
                }
                Ok(map.unsqueeze_dim::<4>(1).repeat_dim(1, channels))
            }
            GazeEstimate::Scalar(values) => {
                let actual = values.dims();
                if actual != [batch] {
                    return Err(TrainingError::ShapeMismatch {
                        what: "teacher gaze scalars",
                        expected: vec![batch],
                        actual: actual.to_vec(),
                    });
                }
                Ok(values
                    .reshape([batch, 1, 1, 1])
                    .repeat_dim(1, channels)
                    .repeat_dim(2, height)
                    .repeat_dim(3, width))
            }
        }
    }
}

/// An externally trained model that estimates where a player looks.
///
/// Only consulted when fused gazes are not part of the data stream.
pub trait GazePredictor {
    fn infer(&self, frames: Tensor<InferBackend, 4>) -> GazeEstimate<InferBackend>;
}

/// Synthesize a full gaze batch for `frames` from `teacher`.
pub fn synthesize_gaze(
    teacher: &dyn GazePredictor,
    frames: Tensor<InferBackend, 4>,
) -> Result<Tensor<InferBackend, 4>, TrainingError> {
    let dims = frames.dims();
    teacher.infer(frames).broadcast(dims)
}

/// Teacher stand-in that uses the mean intensity of the frame stack as the
/// saliency map.
#[derive(Debug, Clone, Copy, Default)]
pub struct MeanIntensityGaze;

impl GazePredictor for MeanIntensityGaze {
    fn infer(&self, frames: Tensor<InferBackend, 4>) -> GazeEstimate<InferBackend> {
        let [batch, _, height, width] = frames.dims();
        GazeEstimate::Map(frames.mean_dim(1).reshape([batch, height, width]))
    }
}
