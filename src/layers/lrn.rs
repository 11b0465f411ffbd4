//! Local Response Normalization (cross-channel)
//!
//! `out[c] = in[c] / (bias + alpha * Σ in[c']²)^beta` where `c'` runs over
//! `[c - depth_radius, c + depth_radius]` clipped to the available channels.
//! The sum is not divided by the window size.

use crate::error::{AlexNetError, Result};
use crate::layers::r#trait::check_len;
use crate::layers::Layer;
use crate::tensor::Tensor;
use serde::{Deserialize, Serialize};

/// Hyper-parameters of local response normalization.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LrnParams {
    pub depth_radius: usize,
    pub bias: f32,
    pub alpha: f32,
    pub beta: f32,
}

impl Default for LrnParams {
    fn default() -> Self {
        Self {
            depth_radius: 5,
            bias: 1.0,
            alpha: 1e-4,
            beta: 0.75,
        }
    }
}

impl LrnParams {
    /// Channel window `[lo, hi)` around `c`.
    #[inline]
    fn window(&self, c: usize, channels: usize) -> std::ops::Range<usize> {
        c.saturating_sub(self.depth_radius)..(c + self.depth_radius + 1).min(channels)
    }

    /// Denominator base `bias + alpha * Σ x²` for every channel of one pixel.
    fn scales(&self, pixel: &[f32], scales: &mut [f32]) {
        let channels = pixel.len();
        for (c, s) in scales.iter_mut().enumerate() {
            let sum: f32 = pixel[self.window(c, channels)].iter().map(|x| x * x).sum();
            *s = self.bias + self.alpha * sum;
        }
    }

    fn normalize_pixel(&self, pixel: &[f32], out: &mut [f32], scales: &mut [f32]) {
        self.scales(pixel, scales);
        for ((o, &x), &d) in out.iter_mut().zip(pixel).zip(scales.iter()) {
            *o = x * d.powf(-self.beta);
        }
    }
}

/// Normalize a rank-4 `[N, H, W, C]` tensor across channels.
pub fn local_response_normalization(input: &Tensor, params: &LrnParams) -> Result<Tensor> {
    if input.rank() != 4 {
        return Err(AlexNetError::RankMismatch {
            expected: 4,
            actual: input.rank(),
        });
    }
    let channels = input.shape()[3];
    let mut output = Tensor::zeros(input.shape().to_vec());
    if channels == 0 {
        return Ok(output);
    }
    let mut scales = vec![0.0f32; channels];
    for (pixel, out) in input
        .data()
        .chunks_exact(channels)
        .zip(output.data_mut().chunks_exact_mut(channels))
    {
        params.normalize_pixel(pixel, out, &mut scales);
    }
    Ok(output)
}

/// LRN as a network layer over NHWC activations.
pub struct LrnLayer {
    height: usize,
    width: usize,
    channels: usize,
    params: LrnParams,
}

impl LrnLayer {
    pub fn new(height: usize, width: usize, channels: usize, params: LrnParams) -> Self {
        Self {
            height,
            width,
            channels,
            params,
        }
    }

    pub fn params(&self) -> &LrnParams {
        &self.params
    }
}

impl Layer for LrnLayer {
    fn forward(&self, input: &[f32], output: &mut [f32], batch_size: usize, _training: bool) {
        let size = self.input_size();
        check_len("input", input, batch_size * size);
        check_len("output", output, batch_size * size);
        if self.channels == 0 {
            return;
        }

        let mut scales = vec![0.0f32; self.channels];
        for (pixel, out) in input
            .chunks_exact(self.channels)
            .zip(output.chunks_exact_mut(self.channels))
        {
            self.params.normalize_pixel(pixel, out, &mut scales);
        }
    }

    /// dL/dx_j = g_j·D_j^-β − 2αβ·x_j·Σ_{|i−j|≤r} g_i·x_i·D_i^(−β−1)
    fn backward(
        &self,
        input: &[f32],
        _output: &[f32],
        grad_output: &[f32],
        grad_input: &mut [f32],
        batch_size: usize,
    ) {
        let size = self.input_size();
        check_len("input", input, batch_size * size);
        check_len("grad_output", grad_output, batch_size * size);
        check_len("grad_input", grad_input, batch_size * size);
        if self.channels == 0 {
            return;
        }

        let LrnParams { alpha, beta, .. } = self.params;
        let c_len = self.channels;
        let mut scales = vec![0.0f32; c_len];
        // g_i * x_i * D_i^(-β-1)
        let mut weighted = vec![0.0f32; c_len];

        for ((pixel, gy), gx) in input
            .chunks_exact(c_len)
            .zip(grad_output.chunks_exact(c_len))
            .zip(grad_input.chunks_exact_mut(c_len))
        {
            self.params.scales(pixel, &mut scales);
            for i in 0..c_len {
                weighted[i] = gy[i] * pixel[i] * scales[i].powf(-beta - 1.0);
            }
            for j in 0..c_len {
                let cross: f32 = weighted[self.params.window(j, c_len)].iter().sum();
                gx[j] = gy[j] * scales[j].powf(-beta) - 2.0 * alpha * beta * pixel[j] * cross;
            }
        }
    }

    fn input_size(&self) -> usize {
        self.height * self.width * self.channels
    }

    fn output_shape(&self) -> Vec<usize> {
        vec![self.height, self.width, self.channels]
    }
}
