//! Dense (fully connected) layer implementation
//!
//! Performs `output = activation(input × weights + biases)` with weights
//! stored row-major as `[input_size][output_size]`.

use crate::layers::r#trait::check_len;
use crate::layers::{Layer, ParameterMut};
use crate::utils::{Activation, SimpleRng};
use std::cell::RefCell;

/// Dense (fully connected) layer with weights, biases and a fused activation.
///
/// # Example
///
/// ```ignore
/// use alexnet::layers::DenseLayer;
/// use alexnet::utils::{Activation, SimpleRng};
///
/// let mut rng = SimpleRng::new(42);
/// let layer = DenseLayer::gaussian(9216, 256, 0.005, 0.1, Activation::Relu, &mut rng);
/// assert_eq!(layer.output_size(), 256);
/// ```
pub struct DenseLayer {
    input_size: usize,
    output_size: usize,
    activation: Activation,
    weights: Vec<f32>,
    biases: Vec<f32>,
    grad_weights: RefCell<Vec<f32>>,
    grad_biases: RefCell<Vec<f32>>,
}

impl DenseLayer {
    /// Create a layer with Xavier/Glorot uniform weights and zero biases.
    pub fn new(
        input_size: usize,
        output_size: usize,
        activation: Activation,
        rng: &mut SimpleRng,
    ) -> Self {
        let limit = (6.0f32 / (input_size + output_size) as f32).sqrt();
        let weights = (0..input_size * output_size)
            .map(|_| rng.gen_range_f32(-limit, limit))
            .collect();
        Self::from_parts(input_size, output_size, activation, weights, vec![0.0; output_size])
    }

    /// Create a layer with weights drawn from N(0, std_dev²) and every bias set to `bias`.
    pub fn gaussian(
        input_size: usize,
        output_size: usize,
        std_dev: f32,
        bias: f32,
        activation: Activation,
        rng: &mut SimpleRng,
    ) -> Self {
        let weights = (0..input_size * output_size)
            .map(|_| rng.gen_normal_f32(0.0, std_dev))
            .collect();
        Self::from_parts(input_size, output_size, activation, weights, vec![bias; output_size])
    }

    fn from_parts(
        input_size: usize,
        output_size: usize,
        activation: Activation,
        weights: Vec<f32>,
        biases: Vec<f32>,
    ) -> Self {
        Self {
            input_size,
            output_size,
            activation,
            grad_weights: RefCell::new(vec![0.0; weights.len()]),
            grad_biases: RefCell::new(vec![0.0; biases.len()]),
            weights,
            biases,
        }
    }

    pub fn weights(&self) -> &[f32] {
        &self.weights
    }

    pub fn biases(&self) -> &[f32] {
        &self.biases
    }

    pub fn activation(&self) -> Activation {
        self.activation
    }
}

impl Layer for DenseLayer {
    fn forward(&self, input: &[f32], output: &mut [f32], batch_size: usize, _training: bool) {
        check_len("input", input, batch_size * self.input_size);
        check_len("output", output, batch_size * self.output_size);

        for (x, y) in input
            .chunks_exact(self.input_size)
            .zip(output.chunks_exact_mut(self.output_size))
        {
            y.copy_from_slice(&self.biases);
            for (i, &xi) in x.iter().enumerate() {
                if xi == 0.0 {
                    continue;
                }
                let row = &self.weights[i * self.output_size..(i + 1) * self.output_size];
                for (yj, &w) in y.iter_mut().zip(row) {
                    *yj += xi * w;
                }
            }
            self.activation.apply(y);
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
        check_len("input", input, batch_size * self.input_size);
        check_len("output", output, batch_size * self.output_size);
        check_len("grad_output", grad_output, batch_size * self.output_size);
        check_len("grad_input", grad_input, batch_size * self.input_size);

        let mut grad_w = self.grad_weights.borrow_mut();
        let mut grad_b = self.grad_biases.borrow_mut();
        let mut grad_z = vec![0.0f32; self.output_size];

        for b in 0..batch_size {
            let x = &input[b * self.input_size..(b + 1) * self.input_size];
            let y = &output[b * self.output_size..(b + 1) * self.output_size];
            let gy = &grad_output[b * self.output_size..(b + 1) * self.output_size];
            let gx = &mut grad_input[b * self.input_size..(b + 1) * self.input_size];

            for j in 0..self.output_size {
                grad_z[j] = gy[j] * self.activation.derivative_from_output(y[j]);
                grad_b[j] += grad_z[j];
            }

            for i in 0..self.input_size {
                let row = i * self.output_size..(i + 1) * self.output_size;
                let w_row = &self.weights[row.clone()];
                let gw_row = &mut grad_w[row];
                let mut acc = 0.0f32;
                for j in 0..self.output_size {
                    gw_row[j] += x[i] * grad_z[j];
                    acc += w_row[j] * grad_z[j];
                }
                gx[i] = acc;
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
        self.input_size
    }

    fn output_size(&self) -> usize {
        self.output_size
    }

    fn output_shape(&self) -> Vec<usize> {
        vec![self.output_size]
    }
}
