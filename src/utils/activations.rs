//! Activation and loss helpers
//!
//! - ReLU applied in place and its backward mask
//! - Row-wise softmax
//! - Softmax cross-entropy with the gradient at the logits
//! - Row-wise arg-max for accuracy

use serde::Deserialize;

/// Activation fused into a convolution or dense layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    #[default]
    Relu,
    Identity,
}

impl Activation {
    /// Apply the activation to a pre-activation buffer in place.
    pub fn apply(self, data: &mut [f32]) {
        match self {
            Activation::Relu => relu_inplace(data),
            Activation::Identity => {}
        }
    }

    /// Derivative of the activation expressed through its output.
    pub fn derivative_from_output(self, output: f32) -> f32 {
        match self {
            Activation::Relu => {
                if output > 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
            Activation::Identity => 1.0,
        }
    }
}

/// ReLU applied in place.
pub fn relu_inplace(data: &mut [f32]) {
    for value in data.iter_mut() {
        if *value < 0.0 {
            *value = 0.0;
        }
    }
}

/// Softmax applied row-wise with max subtraction for stability.
pub fn softmax_rows(outputs: &mut [f32], rows: usize, cols: usize) {
    if cols == 0 {
        return;
    }
    assert_eq!(outputs.len(), rows * cols, "outputs length mismatch in softmax_rows");

    for row in outputs.chunks_exact_mut(cols).take(rows) {
        let max_value = row.iter().copied().fold(f32::NEG_INFINITY, f32::max);

        let mut sum = 0.0f32;
        for value in row.iter_mut() {
            *value = (*value - max_value).exp();
            sum += *value;
        }

        let inv_sum = 1.0f32 / sum;
        for value in row.iter_mut() {
            *value *= inv_sum;
        }
    }
}

/// Mean softmax cross-entropy over a batch of logits.
///
/// Writes `(softmax - onehot) / batch` into `grad_logits` and returns the mean
/// loss. `labels` must already be validated against `classes`.
pub fn softmax_cross_entropy(
    logits: &[f32],
    labels: &[usize],
    classes: usize,
    grad_logits: &mut [f32],
) -> f32 {
    let batch = labels.len();
    assert_eq!(logits.len(), batch * classes, "logits length mismatch");
    assert_eq!(grad_logits.len(), logits.len(), "gradient length mismatch");
    if batch == 0 {
        return 0.0;
    }

    let eps = 1e-9f32;
    let scale = 1.0 / batch as f32;
    grad_logits.copy_from_slice(logits);
    softmax_rows(grad_logits, batch, classes);

    let mut loss = 0.0f32;
    for (row, &label) in grad_logits.chunks_exact_mut(classes).zip(labels) {
        loss -= row[label].max(eps).ln();
        row[label] -= 1.0;
        for value in row.iter_mut() {
            *value *= scale;
        }
    }
    loss * scale
}

/// Index of the largest value in each row.
pub fn argmax_rows(values: &[f32], cols: usize) -> Vec<usize> {
    values
        .chunks_exact(cols)
        .map(|row| {
            let mut best = 0;
            for (j, &v) in row.iter().enumerate().skip(1) {
                if v > row[best] {
                    best = j;
                }
            }
            best
        })
        .collect()
}
