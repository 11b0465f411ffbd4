//! Stochastic Gradient Descent (SGD) optimizer implementation
//!
//! Supports classical momentum:
//!
//! ```text
//! v = μ * v - η * ∇L/∂w
//! w = w + v
//! ```
//!
//! With μ = 0 this is the plain update `w = w - η * ∇L/∂w`.

use crate::optimizers::Optimizer;

/// Stochastic Gradient Descent optimizer with optional momentum.
///
/// # Fields
///
/// * `learning_rate` - The step size for parameter updates (η)
/// * `momentum` - Velocity decay factor (μ); 0 disables momentum
/// * `velocity` - Per-parameter velocity, sized on first update
///
/// # Example
///
/// ```
/// use alexnet::optimizers::{Optimizer, SGD};
///
/// let mut optimizer = SGD::with_momentum(0.1, 0.9);
/// let mut weights = vec![1.0, 2.0];
/// optimizer.update(&mut weights, &[1.0, -1.0]);
/// assert!((weights[0] - 0.9).abs() < 1e-6);
/// assert!((weights[1] - 2.1).abs() < 1e-6);
/// ```
#[derive(Debug, Clone)]
pub struct SGD {
    learning_rate: f32,
    momentum: f32,
    velocity: Vec<f32>,
}

impl SGD {
    /// Creates a plain SGD optimizer (no momentum).
    pub fn new(learning_rate: f32) -> Self {
        Self::with_momentum(learning_rate, 0.0)
    }

    /// Creates an SGD optimizer with classical momentum.
    pub fn with_momentum(learning_rate: f32, momentum: f32) -> Self {
        Self {
            learning_rate,
            momentum,
            velocity: Vec::new(),
        }
    }
}

impl Optimizer for SGD {
    /// # Panics
    ///
    /// Panics if `parameters` and `gradients` have different lengths.
    fn update(&mut self, parameters: &mut [f32], gradients: &[f32]) {
        assert_eq!(
            parameters.len(),
            gradients.len(),
            "Parameters and gradients must have the same length"
        );

        if self.momentum == 0.0 {
            for (param, grad) in parameters.iter_mut().zip(gradients) {
                *param -= self.learning_rate * grad;
            }
            return;
        }

        if self.velocity.len() != parameters.len() {
            self.velocity = vec![0.0; parameters.len()];
        }

        for ((param, grad), v) in parameters
            .iter_mut()
            .zip(gradients)
            .zip(self.velocity.iter_mut())
        {
            *v = self.momentum * *v - self.learning_rate * grad;
            *param += *v;
        }
    }
}
