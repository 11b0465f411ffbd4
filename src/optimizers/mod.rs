//! Optimizer abstractions for parameter updates
//!
//! An optimizer owns whatever state its update rule needs (SGD momentum keeps
//! a velocity buffer), so the model keeps one optimizer instance per
//! trainable tensor.
//!
//! # Example
//!
//! ```ignore
//! use alexnet::optimizers::{Optimizer, SGD};
//!
//! let mut optimizer = SGD::with_momentum(0.1, 0.9);
//! optimizer.update(&mut weights, &gradients);
//! ```

pub mod sgd;

pub use sgd::SGD;

/// Core trait for optimizers.
pub trait Optimizer {
    /// Update parameters in place using their gradients.
    ///
    /// # Panics
    ///
    /// Implementations may panic if parameters and gradients have different lengths.
    fn update(&mut self, parameters: &mut [f32], gradients: &[f32]);
}

/// Build one boxed SGD optimizer per trainable tensor.
pub fn sgd_for_tensors(count: usize, learning_rate: f32, momentum: f32) -> Vec<Box<dyn Optimizer>> {
    (0..count)
        .map(|_| Box::new(SGD::with_momentum(learning_rate, momentum)) as Box<dyn Optimizer>)
        .collect()
}
