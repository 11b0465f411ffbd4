//! Layer trait definition
//!
//! Every layer carries an explicit forward function and a separately written
//! backward function. Buffers are flat `f32` slices holding `batch_size`
//! consecutive samples; spatial layers use NHWC order within a sample.

/// Mutable view of one trainable tensor and its accumulated gradient.
pub struct ParameterMut<'a> {
    pub values: &'a mut [f32],
    pub gradients: &'a mut [f32],
}

/// Core trait for neural network layers.
///
/// # Example
///
/// ```ignore
/// let mut output = vec![0.0f32; batch_size * layer.output_size()];
/// layer.forward(&input, &mut output, batch_size, true);
///
/// let mut grad_input = vec![0.0f32; batch_size * layer.input_size()];
/// layer.backward(&input, &output, &grad_output, &mut grad_input, batch_size);
/// ```
pub trait Layer {
    /// Forward propagation through the layer.
    ///
    /// # Arguments
    ///
    /// * `input` - Input data (batch_size × input_size)
    /// * `output` - Output buffer (batch_size × output_size), fully overwritten
    /// * `batch_size` - Number of samples in the batch
    /// * `training` - Whether the call is part of a training step; only layers
    ///   whose behavior differs between training and inference look at it
    ///
    /// # Panics
    ///
    /// Panics if the buffer lengths do not match the layer dimensions.
    fn forward(&self, input: &[f32], output: &mut [f32], batch_size: usize, training: bool);

    /// Backward propagation through the layer.
    ///
    /// Writes the gradient with respect to the input into `grad_input`
    /// (fully overwritten) and accumulates parameter gradients internally.
    ///
    /// # Arguments
    ///
    /// * `input` - Input of the matching forward pass
    /// * `output` - Output of the matching forward pass
    /// * `grad_output` - Gradient of the loss w.r.t. the output
    /// * `grad_input` - Buffer receiving the gradient w.r.t. the input
    /// * `batch_size` - Number of samples in the batch
    fn backward(
        &self,
        input: &[f32],
        output: &[f32],
        grad_output: &[f32],
        grad_input: &mut [f32],
        batch_size: usize,
    );

    /// Trainable tensors together with their gradient accumulators, in a fixed order.
    fn parameters_mut(&mut self) -> Vec<ParameterMut<'_>> {
        Vec::new()
    }

    /// Number of trainable tensors returned by `parameters_mut`.
    fn parameter_tensors(&self) -> usize {
        0
    }

    /// Total number of trainable scalars.
    fn parameter_count(&self) -> usize {
        0
    }

    /// Number of input features per sample.
    fn input_size(&self) -> usize;

    /// Number of output features per sample.
    fn output_size(&self) -> usize {
        self.output_shape().iter().product()
    }

    /// Per-sample output shape (`[h, w, c]` for spatial layers, `[features]` otherwise).
    fn output_shape(&self) -> Vec<usize>;
}

/// Check forward/backward buffer lengths against the layer dimensions.
pub(crate) fn check_len(name: &str, buffer: &[f32], expected: usize) {
    assert_eq!(
        buffer.len(),
        expected,
        "{} len mismatch: expected {}, got {}",
        name,
        expected,
        buffer.len()
    );
}
