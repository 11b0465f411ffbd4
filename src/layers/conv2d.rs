//! 2D convolution layer
//!
//! Operates on NHWC activations with filters stored as
//! `[kernel_height][kernel_width][in_channels][out_channels]`, the layout the
//! pretrained weight importer produces. An activation is fused into the layer.

use crate::error::{AlexNetError, Result};
use crate::layers::r#trait::check_len;
use crate::layers::{Layer, ParameterMut};
use crate::tensor::Tensor;
use crate::utils::{Activation, SimpleRng};
use std::cell::RefCell;

/// Shape of a convolution filter bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterShape {
    pub kernel_height: usize,
    pub kernel_width: usize,
    pub input_channels: usize,
    pub output_channels: usize,
}

impl FilterShape {
    pub fn new(
        kernel_height: usize,
        kernel_width: usize,
        input_channels: usize,
        output_channels: usize,
    ) -> Self {
        Self {
            kernel_height,
            kernel_width,
            input_channels,
            output_channels,
        }
    }

    /// Number of scalars in the filter bank.
    pub fn count(&self) -> usize {
        self.kernel_height * self.kernel_width * self.input_channels * self.output_channels
    }

    /// Tensor dimensions `[kh, kw, in, out]`.
    pub fn dims(&self) -> Vec<usize> {
        vec![
            self.kernel_height,
            self.kernel_width,
            self.input_channels,
            self.output_channels,
        ]
    }
}

/// Spatial padding mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Padding {
    /// No padding; windows must fit entirely inside the input.
    Valid,
    /// Zero padding so that output = ceil(input / stride).
    Same,
}

impl Padding {
    /// Output extent and leading padding along one spatial axis.
    pub fn output_and_offset(self, input: usize, kernel: usize, stride: usize) -> (usize, usize) {
        match self {
            Padding::Valid => {
                if input < kernel {
                    (0, 0)
                } else {
                    ((input - kernel) / stride + 1, 0)
                }
            }
            Padding::Same => {
                let out = input.div_ceil(stride);
                let total = ((out.saturating_sub(1)) * stride + kernel).saturating_sub(input);
                (out, total / 2)
            }
        }
    }
}

/// Geometry of a convolution layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Conv2DSpec {
    pub in_channels: usize,
    pub out_channels: usize,
    pub kernel_size: usize,
    pub stride: usize,
    pub padding: Padding,
    pub input_height: usize,
    pub input_width: usize,
    pub activation: Activation,
}

impl Conv2DSpec {
    pub fn filter_shape(&self) -> FilterShape {
        FilterShape::new(
            self.kernel_size,
            self.kernel_size,
            self.in_channels,
            self.out_channels,
        )
    }

    pub fn output_height(&self) -> usize {
        self.padding
            .output_and_offset(self.input_height, self.kernel_size, self.stride)
            .0
    }

    pub fn output_width(&self) -> usize {
        self.padding
            .output_and_offset(self.input_width, self.kernel_size, self.stride)
            .0
    }
}

/// 2D convolution with learnable filters and per-channel biases.
///
/// # Example
///
/// ```ignore
/// let mut rng = SimpleRng::new(42);
/// let layer = Conv2DLayer::new(spec, &mut rng);
/// assert_eq!(layer.output_shape(), vec![55, 55, 96]);
/// ```
pub struct Conv2DLayer {
    spec: Conv2DSpec,
    pad_top: usize,
    pad_left: usize,
    weights: Vec<f32>, // [kh * kw * in * out]
    biases: Vec<f32>,  // [out]
    grad_weights: RefCell<Vec<f32>>,
    grad_biases: RefCell<Vec<f32>>,
}

impl Conv2DLayer {
    /// Create a layer with Xavier/Glorot uniform filters and zero biases.
    ///
    /// limit = sqrt(6 / (fan_in + fan_out)) with
    /// fan_in = in_channels × k², fan_out = out_channels × k².
    pub fn new(spec: Conv2DSpec, rng: &mut SimpleRng) -> Self {
        let k2 = spec.kernel_size * spec.kernel_size;
        let fan_in = (spec.in_channels * k2) as f32;
        let fan_out = (spec.out_channels * k2) as f32;
        let limit = (6.0f32 / (fan_in + fan_out)).sqrt();

        let mut weights = vec![0.0f32; spec.filter_shape().count()];
        for value in &mut weights {
            *value = rng.gen_range_f32(-limit, limit);
        }

        Self::assemble(spec, weights, vec![0.0f32; spec.out_channels])
    }

    /// Create a layer from existing parameters.
    ///
    /// `weights` must have shape `[k, k, in, out]` and `biases` exactly
    /// `out_channels` values.
    pub fn from_parameters(spec: Conv2DSpec, weights: Tensor, biases: Tensor) -> Result<Self> {
        let dims = spec.filter_shape().dims();
        if weights.shape() != dims.as_slice() {
            return Err(AlexNetError::InvalidShape {
                expected: dims,
                actual: weights.shape().to_vec(),
            });
        }
        if biases.len() != spec.out_channels {
            return Err(AlexNetError::ShapeMismatch {
                expected: spec.out_channels,
                actual: biases.len(),
            });
        }
        Ok(Self::assemble(spec, weights.into_data(), biases.into_data()))
    }

    fn assemble(spec: Conv2DSpec, weights: Vec<f32>, biases: Vec<f32>) -> Self {
        let (_, pad_top) =
            spec.padding
                .output_and_offset(spec.input_height, spec.kernel_size, spec.stride);
        let (_, pad_left) =
            spec.padding
                .output_and_offset(spec.input_width, spec.kernel_size, spec.stride);
        let weight_count = weights.len();
        let bias_count = biases.len();
        Self {
            spec,
            pad_top,
            pad_left,
            weights,
            biases,
            grad_weights: RefCell::new(vec![0.0f32; weight_count]),
            grad_biases: RefCell::new(vec![0.0f32; bias_count]),
        }
    }

    pub fn weights(&self) -> &[f32] {
        &self.weights
    }

    pub fn biases(&self) -> &[f32] {
        &self.biases
    }

    /// Input pixel (y, x) read by output pixel (oy, ox) at kernel tap (ky, kx),
    /// or `None` when it falls into the padding.
    #[inline]
    fn input_pixel(&self, oy: usize, ox: usize, ky: usize, kx: usize) -> Option<(usize, usize)> {
        let iy = (oy * self.spec.stride + ky) as isize - self.pad_top as isize;
        let ix = (ox * self.spec.stride + kx) as isize - self.pad_left as isize;
        if iy < 0
            || ix < 0
            || iy >= self.spec.input_height as isize
            || ix >= self.spec.input_width as isize
        {
            None
        } else {
            Some((iy as usize, ix as usize))
        }
    }
}

impl Layer for Conv2DLayer {
    fn forward(&self, input: &[f32], output: &mut [f32], batch_size: usize, _training: bool) {
        let in_size = self.input_size();
        let out_size = self.output_size();
        check_len("input", input, batch_size * in_size);
        check_len("output", output, batch_size * out_size);

        let Conv2DSpec {
            in_channels,
            out_channels,
            kernel_size,
            input_width,
            ..
        } = self.spec;
        let out_h = self.spec.output_height();
        let out_w = self.spec.output_width();

        for b in 0..batch_size {
            let in_b = &input[b * in_size..(b + 1) * in_size];
            let out_b = &mut output[b * out_size..(b + 1) * out_size];

            for oy in 0..out_h {
                for ox in 0..out_w {
                    let acc_start = (oy * out_w + ox) * out_channels;
                    let acc = &mut out_b[acc_start..acc_start + out_channels];
                    acc.copy_from_slice(&self.biases);

                    for ky in 0..kernel_size {
                        for kx in 0..kernel_size {
                            let Some((iy, ix)) = self.input_pixel(oy, ox, ky, kx) else {
                                continue;
                            };
                            let px_start = (iy * input_width + ix) * in_channels;
                            let pixel = &in_b[px_start..px_start + in_channels];
                            let tap = (ky * kernel_size + kx) * in_channels;

                            for (ic, &x) in pixel.iter().enumerate() {
                                // assumes finite weights: 0 * NaN would not be skipped
                                if x == 0.0 {
                                    continue;
                                }
                                let w_start = (tap + ic) * out_channels;
                                let w_row = &self.weights[w_start..w_start + out_channels];
                                for (a, &w) in acc.iter_mut().zip(w_row) {
                                    *a += x * w;
                                }
                            }
                        }
                    }

                    self.spec.activation.apply(acc);
                }
            }
        }
    }

    fn backward(
        &self,
        input: &[f32],
        output: &[f32],
        grad_output: &[f32],
        grad_input: &mut [f32],
        batch_size: usize,
    ) {
        let in_size = self.input_size();
        let out_size = self.output_size();
        check_len("input", input, batch_size * in_size);
        check_len("output", output, batch_size * out_size);
        check_len("grad_output", grad_output, batch_size * out_size);
        check_len("grad_input", grad_input, batch_size * in_size);

        let Conv2DSpec {
            in_channels,
            out_channels,
            kernel_size,
            input_width,
            activation,
            ..
        } = self.spec;
        let out_h = self.spec.output_height();
        let out_w = self.spec.output_width();

        let mut grad_w = self.grad_weights.borrow_mut();
        let mut grad_b = self.grad_biases.borrow_mut();
        grad_input.fill(0.0);

        // gradient at the pre-activation of one output pixel
        let mut grad_z = vec![0.0f32; out_channels];

        for b in 0..batch_size {
            let in_b = &input[b * in_size..(b + 1) * in_size];
            let grad_in_b = &mut grad_input[b * in_size..(b + 1) * in_size];

            for oy in 0..out_h {
                for ox in 0..out_w {
                    let px_out = b * out_size + (oy * out_w + ox) * out_channels;
                    let mut any = false;
                    for o in 0..out_channels {
                        let g = grad_output[px_out + o]
                            * activation.derivative_from_output(output[px_out + o]);
                        grad_z[o] = g;
                        any |= g != 0.0;
                    }
                    if !any {
                        continue;
                    }

                    for (gb, &g) in grad_b.iter_mut().zip(&grad_z) {
                        *gb += g;
                    }

                    for ky in 0..kernel_size {
                        for kx in 0..kernel_size {
                            let Some((iy, ix)) = self.input_pixel(oy, ox, ky, kx) else {
                                continue;
                            };
                            let px_start = (iy * input_width + ix) * in_channels;
                            let tap = (ky * kernel_size + kx) * in_channels;

                            for ic in 0..in_channels {
                                let x = in_b[px_start + ic];
                                let w_start = (tap + ic) * out_channels;
                                let w_row = &self.weights[w_start..w_start + out_channels];
                                let gw_row = &mut grad_w[w_start..w_start + out_channels];

                                let mut acc = 0.0f32;
                                for o in 0..out_channels {
                                    gw_row[o] += x * grad_z[o];
                                    acc += w_row[o] * grad_z[o];
                                }
                                grad_in_b[px_start + ic] += acc;
                            }
                        }
                    }
                }
            }
        }
    }

    fn parameters_mut(&mut self) -> Vec<ParameterMut<'_>> {
        vec![
            ParameterMut {
                values: &mut self.weights,
                gradients: self.grad_weights.get_mut(),
            },
            ParameterMut {
                values: &mut self.biases,
                gradients: self.grad_biases.get_mut(),
            },
        ]
    }

    fn parameter_tensors(&self) -> usize {
        2
    }

    fn parameter_count(&self) -> usize {
        self.weights.len() + self.biases.len()
    }

    fn input_size(&self) -> usize {
        self.spec.input_height * self.spec.input_width * self.spec.in_channels
    }

    fn output_shape(&self) -> Vec<usize> {
        vec![
            self.spec.output_height(),
            self.spec.output_width(),
            self.spec.out_channels,
        ]
    }
}
