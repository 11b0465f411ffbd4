//! Shared utilities: random numbers, activations and loss helpers.

pub mod activations;
pub mod rng;

pub use activations::{argmax_rows, relu_inplace, softmax_cross_entropy, softmax_rows, Activation};
pub use rng::SimpleRng;
