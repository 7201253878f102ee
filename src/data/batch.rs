use burn::prelude::*;
use burn::tensor::TensorData;

use super::dataset::ActionDataset;
use crate::error::DataError;
use crate::model::networks::encoder::STACK_DEPTH;

/// A collated batch ready for a forward pass.
#[derive(Debug, Clone)]
pub struct ActionBatch<B: Backend> {
    /// [batch, 4, H, W]
    pub frames: Tensor<B, 4>,
    /// [batch]
    pub actions: Tensor<B, 1, Int>,
    /// [batch, 4, H, W], present only when collated with gazes.
    pub gazes: Option<Tensor<B, 4>>,
    /// Host copy of `actions`.
    pub labels: Vec<usize>,
}

impl<B: Backend> ActionBatch<B> {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Gather the samples at `indices` into one batch, in the given order.
///
/// With `with_gazes` every selected sample must carry a fused gaze map.
pub fn collate<B: Backend>(
    dataset: &dyn ActionDataset,
    indices: &[usize],
    with_gazes: bool,
    device: &B::Device,
) -> Result<ActionBatch<B>, DataError> {
    let [height, width] = dataset.input_shape();
    let stack_len = STACK_DEPTH * height * width;
    let batch_size = indices.len();

    let mut frames = Vec::with_capacity(batch_size * stack_len);
    let mut gazes = Vec::with_capacity(if with_gazes { batch_size * stack_len } else { 0 });
    let mut labels = Vec::with_capacity(batch_size);

    for &index in indices {
        let sample = dataset.sample(index)?;
        frames.extend_from_slice(&sample.frames);
        labels.push(sample.action);
        if with_gazes {
            let gaze = sample
                .gaze
                .as_ref()
                .ok_or(DataError::MissingGaze { index })?;
            gazes.extend_from_slice(gaze);
        }
    }

    let shape = [batch_size, STACK_DEPTH, height, width];
    let actions: Vec<i64> = labels.iter().map(|&a| a as i64).collect();

    Ok(ActionBatch {
        frames: Tensor::from_data(TensorData::new(frames, shape), device),
        actions: Tensor::from_data(TensorData::new(actions, [batch_size]), device),
        gazes: with_gazes.then(|| Tensor::from_data(TensorData::new(gazes, shape), device)),
        labels,
    })
}

/// Split an index order into consecutive batches of at most `batch_size`.
pub fn batch_indices(order: &[usize], batch_size: usize) -> impl Iterator<Item = &[usize]> {
    order.chunks(batch_size.max(1))
}
