//! Layer abstractions for the network
//!
//! This module provides the Layer trait and the layer types AlexNet is built
//! from: convolution, max pooling, local response normalization, dense and
//! dropout.

mod r#trait;
pub mod conv2d;
pub mod dense;
pub mod dropout;
pub mod lrn;
pub mod maxpool;

// Re-export the Layer trait for convenience
pub use r#trait::{Layer, ParameterMut};
pub use conv2d::{Conv2DLayer, Conv2DSpec, FilterShape, Padding};
pub use dense::DenseLayer;
pub use dropout::DropoutLayer;
pub use lrn::{local_response_normalization, LrnLayer, LrnParams};
pub use maxpool::MaxPool2DLayer;
