//! Max pooling over NHWC activations
//!
//! Windows are `pool_size × pool_size` with the given stride and no padding.
//! The backward pass recomputes each window's arg-max from the forward input
//! and routes the gradient there; overlapping windows accumulate.

use crate::layers::r#trait::check_len;
use crate::layers::Layer;

/// 2D max pooling layer (valid padding).
pub struct MaxPool2DLayer {
    channels: usize,
    input_height: usize,
    input_width: usize,
    pool_size: usize,
    stride: usize,
}

impl MaxPool2DLayer {
    pub fn new(
        channels: usize,
        input_height: usize,
        input_width: usize,
        pool_size: usize,
        stride: usize,
    ) -> Self {
        Self {
            channels,
            input_height,
            input_width,
            pool_size,
            stride,
        }
    }

    pub fn output_height(&self) -> usize {
        pooled_extent(self.input_height, self.pool_size, self.stride)
    }

    pub fn output_width(&self) -> usize {
        pooled_extent(self.input_width, self.pool_size, self.stride)
    }

    /// Flat index (within one sample) of the maximum of window (oy, ox) in channel `c`.
    /// Ties resolve to the first position in row-major window order.
    fn argmax(&self, sample: &[f32], oy: usize, ox: usize, c: usize) -> usize {
        let mut best_idx = 0;
        let mut best = f32::NEG_INFINITY;
        let mut first = true;
        for dy in 0..self.pool_size {
            let iy = oy * self.stride + dy;
            for dx in 0..self.pool_size {
                let ix = ox * self.stride + dx;
                let idx = (iy * self.input_width + ix) * self.channels + c;
                let v = sample[idx];
                if first || v > best {
                    best = v;
                    best_idx = idx;
                    first = false;
                }
            }
        }
        best_idx
    }
}

fn pooled_extent(input: usize, pool: usize, stride: usize) -> usize {
    if input < pool {
        0
    } else {
        (input - pool) / stride + 1
    }
}

impl Layer for MaxPool2DLayer {
    fn forward(&self, input: &[f32], output: &mut [f32], batch_size: usize, _training: bool) {
        let in_size = self.input_size();
        let out_size = self.output_size();
        check_len("input", input, batch_size * in_size);
        check_len("output", output, batch_size * out_size);

        let out_w = self.output_width();
        for b in 0..batch_size {
            let sample = &input[b * in_size..(b + 1) * in_size];
            let out_b = &mut output[b * out_size..(b + 1) * out_size];
            for oy in 0..self.output_height() {
                for ox in 0..out_w {
                    for c in 0..self.channels {
                        let idx = self.argmax(sample, oy, ox, c);
                        out_b[(oy * out_w + ox) * self.channels + c] = sample[idx];
                    }
                }
            }
        }
    }

    fn backward(
        &self,
        input: &[f32],
        _output: &[f32],
        grad_output: &[f32],
        grad_input: &mut [f32],
        batch_size: usize,
    ) {
        let in_size = self.input_size();
        let out_size = self.output_size();
        check_len("input", input, batch_size * in_size);
        check_len("grad_output", grad_output, batch_size * out_size);
        check_len("grad_input", grad_input, batch_size * in_size);

        grad_input.fill(0.0);
        let out_w = self.output_width();
        for b in 0..batch_size {
            let sample = &input[b * in_size..(b + 1) * in_size];
            let grad_b = &mut grad_input[b * in_size..(b + 1) * in_size];
            for oy in 0..self.output_height() {
                for ox in 0..out_w {
                    for c in 0..self.channels {
                        let g = grad_output[b * out_size + (oy * out_w + ox) * self.channels + c];
                        if g != 0.0 {
                            grad_b[self.argmax(sample, oy, ox, c)] += g;
                        }
                    }
                }
            }
        }
    }

    fn input_size(&self) -> usize {
        self.input_height * self.input_width * self.channels
    }

    fn output_shape(&self) -> Vec<usize> {
        vec![self.output_height(), self.output_width(), self.channels]
    }
}
