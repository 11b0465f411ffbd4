//! Sequential model and the `Model` trait driven by the training loop
//!
//! A `Sequential` is an ordered list of named stages. The forward pass keeps
//! every intermediate activation in a `ForwardTrace`; the backward pass walks
//! the stages in reverse using that trace, and `apply_gradients` hands each
//! trainable tensor to its own optimizer.

use crate::error::{AlexNetError, Result};
use crate::layers::Layer;
use crate::optimizers::Optimizer;
use crate::tensor::Tensor;

/// Common interface for trainable classifiers.
pub trait Model {
    /// Run the network and return the logits `[N, class_count]`.
    fn forward(&self, input: &Tensor, training: bool) -> Result<Tensor> {
        self.forward_trace(input, training)?.output()
    }

    /// Forward pass that keeps every intermediate activation.
    fn forward_trace(&self, input: &Tensor, training: bool) -> Result<ForwardTrace>;

    /// Accumulate parameter gradients given the gradient of the loss at the logits.
    fn backward(&self, trace: &ForwardTrace, grad_output: &[f32]) -> Result<()>;

    /// Apply and clear the accumulated gradients, one optimizer per trainable tensor.
    fn apply_gradients(&mut self, optimizers: &mut [Box<dyn Optimizer>]) -> Result<()>;

    /// Number of trainable tensors, i.e. the number of optimizers `apply_gradients` expects.
    fn parameter_tensor_count(&self) -> usize;

    /// Width of the logits.
    fn class_count(&self) -> usize;
}

/// A named layer inside a `Sequential`.
pub struct Stage {
    name: String,
    layer: Box<dyn Layer>,
}

impl Stage {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn layer(&self) -> &dyn Layer {
        self.layer.as_ref()
    }
}

/// Activations recorded during one forward pass.
///
/// Index 0 holds the input; index `i + 1` holds the output of stage `i`.
pub struct ForwardTrace {
    batch_size: usize,
    shapes: Vec<Vec<usize>>,
    activations: Vec<Vec<f32>>,
}

impl ForwardTrace {
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Number of recorded activations (stages + 1).
    pub fn len(&self) -> usize {
        self.activations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.activations.is_empty()
    }

    fn out_of_range(&self, index: usize) -> AlexNetError {
        AlexNetError::InvalidShape {
            expected: vec![index + 1],
            actual: vec![self.activations.len()],
        }
    }

    /// Raw buffer of activation `index`.
    pub fn activation(&self, index: usize) -> Result<&[f32]> {
        self.activations
            .get(index)
            .map(Vec::as_slice)
            .ok_or_else(|| self.out_of_range(index))
    }

    /// Activation `index` as a tensor with a leading batch dimension.
    pub fn tensor(&self, index: usize) -> Result<Tensor> {
        let (values, stage_shape) = self
            .activations
            .get(index)
            .zip(self.shapes.get(index))
            .ok_or_else(|| self.out_of_range(index))?;
        let mut shape = Vec::with_capacity(stage_shape.len() + 1);
        shape.push(self.batch_size);
        shape.extend_from_slice(stage_shape);
        Tensor::new(shape, values.clone())
    }

    /// Output of the last stage.
    pub fn output(&self) -> Result<Tensor> {
        self.tensor(self.activations.len().saturating_sub(1))
    }
}

/// Ordered stack of layers.
pub struct Sequential {
    input_shape: Vec<usize>,
    stages: Vec<Stage>,
}

impl Sequential {
    /// Empty model accepting per-sample inputs of `input_shape`.
    pub fn new(input_shape: Vec<usize>) -> Self {
        Self {
            input_shape,
            stages: Vec::new(),
        }
    }

    /// Append a stage; its input size must match the current output size.
    pub fn push(&mut self, name: impl Into<String>, layer: Box<dyn Layer>) -> Result<()> {
        let expected = self.output_size();
        if layer.input_size() != expected {
            return Err(AlexNetError::ShapeMismatch {
                expected,
                actual: layer.input_size(),
            });
        }
        self.stages.push(Stage {
            name: name.into(),
            layer,
        });
        Ok(())
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Per-sample shape produced by the last stage.
    pub fn output_shape(&self) -> Vec<usize> {
        match self.stages.last() {
            Some(stage) => stage.layer.output_shape(),
            None => self.input_shape.clone(),
        }
    }

    pub fn output_size(&self) -> usize {
        self.output_shape().iter().product()
    }

    /// Total number of trainable scalars.
    pub fn parameter_count(&self) -> usize {
        self.stages.iter().map(|s| s.layer.parameter_count()).sum()
    }

    /// Mutable access to every trainable tensor in stage order.
    pub fn parameters_mut(&mut self) -> Vec<crate::layers::ParameterMut<'_>> {
        self.stages
            .iter_mut()
            .flat_map(|stage| stage.layer.parameters_mut())
            .collect()
    }

    fn check_input(&self, input: &Tensor) -> Result<usize> {
        let shape = input.shape();
        let batch_size = shape.first().copied().unwrap_or(0);
        if shape.len() != self.input_shape.len() + 1 || shape[1..] != self.input_shape[..] {
            let mut expected = vec![batch_size];
            expected.extend_from_slice(&self.input_shape);
            return Err(AlexNetError::InvalidShape {
                expected,
                actual: shape.to_vec(),
            });
        }
        Ok(batch_size)
    }
}

impl Model for Sequential {
    fn forward_trace(&self, input: &Tensor, training: bool) -> Result<ForwardTrace> {
        let batch_size = self.check_input(input)?;

        let mut shapes = Vec::with_capacity(self.stages.len() + 1);
        let mut activations = Vec::with_capacity(self.stages.len() + 1);
        shapes.push(self.input_shape.clone());
        activations.push(input.data().to_vec());

        for stage in &self.stages {
            let mut output = vec![0.0f32; batch_size * stage.layer.output_size()];
            let previous = activations.last().map(Vec::as_slice).unwrap_or_default();
            stage.layer.forward(previous, &mut output, batch_size, training);
            tracing::trace!(stage = %stage.name, values = output.len(), "forward");
            shapes.push(stage.layer.output_shape());
            activations.push(output);
        }

        Ok(ForwardTrace {
            batch_size,
            shapes,
            activations,
        })
    }

    fn backward(&self, trace: &ForwardTrace, grad_output: &[f32]) -> Result<()> {
        let batch_size = trace.batch_size;
        let expected = batch_size * self.output_size();
        if grad_output.len() != expected {
            return Err(AlexNetError::ShapeMismatch {
                expected,
                actual: grad_output.len(),
            });
        }
        if trace.activations.len() != self.stages.len() + 1 {
            return Err(AlexNetError::ShapeMismatch {
                expected: self.stages.len() + 1,
                actual: trace.activations.len(),
            });
        }

        let mut grad = grad_output.to_vec();
        for (i, stage) in self.stages.iter().enumerate().rev() {
            let mut grad_input = vec![0.0f32; batch_size * stage.layer.input_size()];
            stage.layer.backward(
                &trace.activations[i],
                &trace.activations[i + 1],
                &grad,
                &mut grad_input,
                batch_size,
            );
            grad = grad_input;
        }
        Ok(())
    }

    fn apply_gradients(&mut self, optimizers: &mut [Box<dyn Optimizer>]) -> Result<()> {
        let expected = self.parameter_tensor_count();
        if optimizers.len() != expected {
            return Err(AlexNetError::ParameterCount {
                expected,
                actual: optimizers.len(),
            });
        }
        for (param, optimizer) in self.parameters_mut().into_iter().zip(optimizers.iter_mut()) {
            optimizer.update(param.values, param.gradients);
            param.gradients.fill(0.0);
        }
        Ok(())
    }

    fn parameter_tensor_count(&self) -> usize {
        self.stages.iter().map(|s| s.layer.parameter_tensors()).sum()
    }

    fn class_count(&self) -> usize {
        self.output_size()
    }
}
