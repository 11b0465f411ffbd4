//! AlexNet image classification
//!
//! The network, its training loop and the supporting pieces, built on a small
//! layer library where every layer carries an explicit forward and backward pass.
//!
//! # Modules
//!
//! - `tensor`: owned `f32` tensor with shape
//! - `layers`: Layer trait and implementations (Conv2D, MaxPool2D, LRN, Dense, Dropout)
//! - `model`: `Sequential` stages and the `Model` trait
//! - `alexnet`: the AlexNet topology
//! - `weights`: pretrained convolution weight and bias import
//! - `dataset`: labelled images from a class-per-directory tree
//! - `mosaic`: activation heatmap mosaics
//! - `train`: training loop, accuracy and synthetic benchmark
//! - `optimizers`: Optimizer trait and SGD with momentum
//! - `config`: training and network configuration
//! - `utils`: RNG, activations and loss

pub mod alexnet;
pub mod config;
pub mod dataset;
pub mod error;
pub mod layers;
pub mod model;
pub mod mosaic;
pub mod optimizers;
pub mod tensor;
pub mod train;
pub mod utils;
pub mod weights;

pub use alexnet::AlexNet;
pub use config::{load_config, NetworkConfig, TrainingConfig};
pub use dataset::{ChannelOrder, DatasetOptions, ImageDataset};
pub use error::{AlexNetError, Result};
pub use model::{ForwardTrace, Model, Sequential};
pub use tensor::Tensor;
pub use train::{accuracy, EpochReport, Trainer};
