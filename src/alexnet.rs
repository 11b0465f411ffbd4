//! The AlexNet topology
//!
//! ```text
//! input [N, 227, 227, 3]
//! conv1 11x11/4 valid, 96  -> norm1 (optional) -> pool1 3x3/2   [27, 27, 96]
//! conv2 5x5/1 same, 256    -> norm2            -> pool2 3x3/2   [13, 13, 256]
//! conv3 3x3 same, 384 -> conv4 3x3 same, 384 -> conv5 3x3 same, 256
//!                                               -> pool5 3x3/2  [6, 6, 256]
//! fc6 9216 -> W, drop6 -> fc7 W -> W, drop7 -> fc8 W -> classes
//! ```
//!
//! Convolutions and fc6/fc7 use ReLU; fc8 produces raw logits.

use crate::config::{validate_network, NetworkConfig};
use crate::error::{AlexNetError, Result};
use crate::layers::{
    Conv2DLayer, Conv2DSpec, DenseLayer, DropoutLayer, LrnLayer, MaxPool2DLayer, Padding,
    ParameterMut,
};
use crate::model::{ForwardTrace, Model, Sequential};
use crate::optimizers::Optimizer;
use crate::tensor::Tensor;
use crate::utils::{Activation, SimpleRng};
use crate::weights::{load_biases, load_weights};
use std::path::Path;

/// Height and width of the network input.
pub const INPUT_SIZE: usize = 227;
/// Colour channels of the network input.
pub const INPUT_CHANNELS: usize = 3;
/// Name of the last stage included in `debug_activations`.
const LAST_DEBUG_STAGE: &str = "pool5";

/// AlexNet classifier.
pub struct AlexNet {
    network: Sequential,
    config: NetworkConfig,
    class_count: usize,
}

impl AlexNet {
    /// Build the network with freshly initialized parameters.
    ///
    /// Convolutions get Xavier uniform filters and zero biases; fc6/fc7
    /// weights are drawn from N(0, 0.005²) with bias 0.1, fc8 from N(0, 0.01²)
    /// with bias 0.
    pub fn new(config: &NetworkConfig, class_count: usize, rng: &mut SimpleRng) -> Result<Self> {
        Self::build(config, class_count, rng, |_, spec, rng| {
            Ok(Conv2DLayer::new(spec, rng))
        })
    }

    /// Build the network with conv1..conv5 read from `directory`.
    ///
    /// Each convolution reads `convN.weights` (flat `[out][in][h][w]`) and
    /// `convN.biases`. Dense layers are initialized as in [`AlexNet::new`].
    pub fn with_pretrained(
        config: &NetworkConfig,
        class_count: usize,
        directory: &Path,
        rng: &mut SimpleRng,
    ) -> Result<Self> {
        Self::build(config, class_count, rng, |name, spec, _| {
            let weights = load_weights(directory, &format!("{name}.weights"), spec.filter_shape())?;
            let biases = load_biases(directory, &format!("{name}.biases"))?;
            Conv2DLayer::from_parameters(spec, weights, biases)
        })
    }

    fn build<F>(
        config: &NetworkConfig,
        class_count: usize,
        rng: &mut SimpleRng,
        mut make_conv: F,
    ) -> Result<Self>
    where
        F: FnMut(&str, Conv2DSpec, &mut SimpleRng) -> Result<Conv2DLayer>,
    {
        validate_network(config)?;
        if class_count == 0 {
            return Err(AlexNetError::InvalidConfig(
                "class_count must be positive".to_string(),
            ));
        }

        let mut net = Sequential::new(vec![INPUT_SIZE, INPUT_SIZE, INPUT_CHANNELS]);
        let mut conv = |net: &mut Sequential,
                        name: &str,
                        out_channels: usize,
                        kernel_size: usize,
                        stride: usize,
                        padding: Padding,
                        rng: &mut SimpleRng|
         -> Result<()> {
            let (height, width, in_channels) = spatial(net);
            let spec = Conv2DSpec {
                in_channels,
                out_channels,
                kernel_size,
                stride,
                padding,
                input_height: height,
                input_width: width,
                activation: Activation::Relu,
            };
            let layer = make_conv(name, spec, rng)?;
            net.push(name, Box::new(layer))
        };

        conv(&mut net, "conv1", 96, 11, 4, Padding::Valid, &mut *rng)?;
        if config.conv1_lrn {
            push_lrn(&mut net, "norm1", config)?;
        }
        push_pool(&mut net, "pool1")?;

        conv(&mut net, "conv2", 256, 5, 1, Padding::Same, &mut *rng)?;
        push_lrn(&mut net, "norm2", config)?;
        push_pool(&mut net, "pool2")?;

        conv(&mut net, "conv3", 384, 3, 1, Padding::Same, &mut *rng)?;
        conv(&mut net, "conv4", 384, 3, 1, Padding::Same, &mut *rng)?;
        conv(&mut net, "conv5", 256, 3, 1, Padding::Same, &mut *rng)?;
        push_pool(&mut net, "pool5")?;

        // NHWC activations are already laid out as the flattened vector
        let flat = net.output_size();
        let width = config.fully_connected_width;
        let fc6 = DenseLayer::gaussian(flat, width, 0.005, 0.1, Activation::Relu, rng);
        net.push("fc6", Box::new(fc6))?;
        net.push("drop6", Box::new(DropoutLayer::new(width, config.drop_rate, rng)))?;
        let fc7 = DenseLayer::gaussian(width, width, 0.005, 0.1, Activation::Relu, rng);
        net.push("fc7", Box::new(fc7))?;
        net.push("drop7", Box::new(DropoutLayer::new(width, config.drop_rate, rng)))?;
        let fc8 = DenseLayer::gaussian(width, class_count, 0.01, 0.0, Activation::Identity, rng);
        net.push("fc8", Box::new(fc8))?;

        tracing::info!(
            stages = net.stages().len(),
            parameters = net.parameter_count(),
            classes = class_count,
            "built AlexNet"
        );

        Ok(Self {
            network: net,
            config: config.clone(),
            class_count,
        })
    }

    pub fn network(&self) -> &Sequential {
        &self.network
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    pub fn parameter_count(&self) -> usize {
        self.network.parameter_count()
    }

    /// Every trainable tensor with its gradient accumulator, in stage order.
    pub fn parameters_mut(&mut self) -> Vec<ParameterMut<'_>> {
        self.network.parameters_mut()
    }

    /// Inference-mode activations of the input and of every stage up to pool5.
    pub fn debug_activations(&self, input: &Tensor) -> Result<Vec<(String, Tensor)>> {
        let trace = self.network.forward_trace(input, false)?;
        let mut activations = vec![("input".to_string(), trace.tensor(0)?)];
        for (i, stage) in self.network.stages().iter().enumerate() {
            activations.push((stage.name().to_string(), trace.tensor(i + 1)?));
            if stage.name() == LAST_DEBUG_STAGE {
                break;
            }
        }
        Ok(activations)
    }
}

impl Model for AlexNet {
    fn forward_trace(&self, input: &Tensor, training: bool) -> Result<ForwardTrace> {
        self.network.forward_trace(input, training)
    }

    fn backward(&self, trace: &ForwardTrace, grad_output: &[f32]) -> Result<()> {
        self.network.backward(trace, grad_output)
    }

    fn apply_gradients(&mut self, optimizers: &mut [Box<dyn Optimizer>]) -> Result<()> {
        self.network.apply_gradients(optimizers)
    }

    fn parameter_tensor_count(&self) -> usize {
        self.network.parameter_tensor_count()
    }

    fn class_count(&self) -> usize {
        self.class_count
    }
}

/// `(height, width, channels)` of the current spatial output.
fn spatial(net: &Sequential) -> (usize, usize, usize) {
    match net.output_shape().as_slice() {
        &[h, w, c] => (h, w, c),
        other => (1, 1, other.iter().product()),
    }
}

fn push_lrn(net: &mut Sequential, name: &str, config: &NetworkConfig) -> Result<()> {
    let (h, w, c) = spatial(net);
    net.push(name, Box::new(LrnLayer::new(h, w, c, config.lrn)))
}

fn push_pool(net: &mut Sequential, name: &str) -> Result<()> {
    let (h, w, c) = spatial(net);
    net.push(name, Box::new(MaxPool2DLayer::new(c, h, w, 3, 2)))
}
