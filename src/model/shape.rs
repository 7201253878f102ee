//! Output-size bookkeeping for the convolutional tower.

/// Per-axis geometry of a 2-D convolution (or pooling window).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConvGeometry {
    pub kernel: [usize; 2],
    pub stride: [usize; 2],
    pub padding: [usize; 2],
    pub dilation: [usize; 2],
}

impl ConvGeometry {
    /// Square kernel with the given stride, no padding, no dilation.
    pub const fn square(kernel: usize, stride: usize) -> Self {
        ConvGeometry {
            kernel: [kernel, kernel],
            stride: [stride, stride],
            padding: [0, 0],
            dilation: [1, 1],
        }
    }

    /// Output spatial size for an `input` of `[height, width]`.
    ///
    /// `out = floor((in + 2*pad - dilation*(kernel-1) - 1) / stride + 1)` per axis.
    /// Returns `None` when the dilated kernel does not fit inside the padded
    /// input on some axis.
    pub fn output_size(&self, input: [usize; 2]) -> Option<[usize; 2]> {
        let mut out = [0usize; 2];
        for axis in 0..2 {
            let padded = input[axis] + 2 * self.padding[axis];
            let reach = self.dilation[axis] * (self.kernel[axis].checked_sub(1)?) + 1;
            let span = padded.checked_sub(reach)?;
            out[axis] = span / self.stride[axis] + 1;
        }
        Some(out)
    }
}

/// Apply a sequence of convolutions to an input size, in order.
pub fn chain_output_size(input: [usize; 2], layers: &[ConvGeometry]) -> Option<[usize; 2]> {
    layers
        .iter()
        .try_fold(input, |size, layer| layer.output_size(size))
}
