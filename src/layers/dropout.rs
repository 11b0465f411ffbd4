//! Dropout layer implementation for regularization
//!
//! During training a fraction of units is zeroed and the survivors are scaled
//! by 1/(1-drop_rate) so the expected activation is unchanged. During inference
//! the input passes through untouched. The mode is chosen per forward call.

use crate::layers::r#trait::check_len;
use crate::layers::Layer;
use crate::utils::rng::SimpleRng;
use std::cell::RefCell;

/// Dropout layer for regularization.
///
/// # Fields
///
/// * `size` - Number of input/output features (dropout doesn't change dimensions)
/// * `drop_rate` - Probability of dropping each unit
/// * `mask` - Per-unit multiplier applied in the last forward pass (0 or 1/(1-p))
/// * `rng` - Random number generator for mask generation
///
/// # Example
///
/// ```
/// use alexnet::layers::{DropoutLayer, Layer};
/// use alexnet::utils::SimpleRng;
///
/// let mut rng = SimpleRng::new(42);
/// let layer = DropoutLayer::new(4, 0.5, &mut rng);
/// let input = vec![1.0f32; 4];
/// let mut output = vec![0.0f32; 4];
/// layer.forward(&input, &mut output, 1, false);
/// assert_eq!(output, input);
/// ```
pub struct DropoutLayer {
    size: usize,
    drop_rate: f32,
    mask: RefCell<Vec<f32>>,
    rng: RefCell<SimpleRng>,
}

impl DropoutLayer {
    /// Creates a new dropout layer with specified size and drop rate.
    ///
    /// The layer draws its masks from a generator forked off `rng`.
    ///
    /// # Panics
    ///
    /// Panics if `drop_rate` is outside `[0.0, 1.0)`.
    pub fn new(size: usize, drop_rate: f32, rng: &mut SimpleRng) -> Self {
        assert!(
            (0.0..1.0).contains(&drop_rate),
            "drop_rate must be in range [0.0, 1.0)"
        );

        Self {
            size,
            drop_rate,
            mask: RefCell::new(Vec::new()),
            rng: RefCell::new(rng.fork()),
        }
    }

    /// Probability that each unit is dropped during training.
    pub fn drop_rate(&self) -> f32 {
        self.drop_rate
    }
}

impl Layer for DropoutLayer {
    fn forward(&self, input: &[f32], output: &mut [f32], batch_size: usize, training: bool) {
        let total_size = batch_size * self.size;
        check_len("input", input, total_size);
        check_len("output", output, total_size);

        let mut mask = self.mask.borrow_mut();
        mask.resize(total_size, 0.0);

        if !training {
            mask.fill(1.0);
            output.copy_from_slice(input);
            return;
        }

        let scale = 1.0 / (1.0 - self.drop_rate);
        let mut rng = self.rng.borrow_mut();
        for ((m, out), &x) in mask.iter_mut().zip(output.iter_mut()).zip(input) {
            if rng.next_f32() >= self.drop_rate {
                *m = scale;
                *out = x * scale;
            } else {
                *m = 0.0;
                *out = 0.0;
            }
        }
    }

    /// Routes the gradient through the units kept in the last forward pass.
    fn backward(
        &self,
        _input: &[f32],
        _output: &[f32],
        grad_output: &[f32],
        grad_input: &mut [f32],
        batch_size: usize,
    ) {
        let total_size = batch_size * self.size;
        check_len("grad_output", grad_output, total_size);
        check_len("grad_input", grad_input, total_size);

        let mask = self.mask.borrow();
        check_len("dropout mask", &mask, total_size);
        for ((gi, &go), &m) in grad_input.iter_mut().zip(grad_output).zip(mask.iter()) {
            *gi = go * m;
        }
    }

    fn input_size(&self) -> usize {
        self.size
    }

    fn output_shape(&self) -> Vec<usize> {
        vec![self.size]
    }
}
