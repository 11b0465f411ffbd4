//! Pretrained convolution parameters stored as flat binary files
//!
//! Files hold little-endian `f32` values. Filter banks arrive ordered
//! `[out][in][h][w]` and are reordered into the `[h][w][in][out]` layout the
//! convolution layer consumes; biases are used as read.

use crate::error::{AlexNetError, Result};
use crate::layers::FilterShape;
use crate::tensor::Tensor;
use std::fs;
use std::path::Path;

/// Reorder flat filter weights into `[h][w][in][out]` order.
///
/// Destinations are visited with `h` slowest and `oc` fastest; destination
/// `(h, w, ic, oc)` reads source index `oc*kw*kh + ic*kw*kh + h*kw + w`.
/// That formula has no separate input-channel stride, so for `ic > 1`
/// distinct `(oc, ic)` pairs read the same source value and some source
/// values are never read. Out-of-range source indices leave a zero.
pub fn reorder_filter_weights(values: &[f32], shape: FilterShape) -> Result<Vec<f32>> {
    let expected = shape.count();
    if values.len() != expected {
        return Err(AlexNetError::ShapeMismatch {
            expected,
            actual: values.len(),
        });
    }

    let FilterShape {
        kernel_height: kh,
        kernel_width: kw,
        input_channels,
        output_channels,
    } = shape;
    let plane = kw * kh;

    let mut reordered = vec![0.0f32; expected];
    let mut dst = 0;
    for h in 0..kh {
        for w in 0..kw {
            for ic in 0..input_channels {
                for oc in 0..output_channels {
                    let src = oc * plane + ic * plane + h * kw + w;
                    if let Some(&v) = values.get(src) {
                        reordered[dst] = v;
                    }
                    dst += 1;
                }
            }
        }
    }
    Ok(reordered)
}

/// Build a `[kh, kw, in, out]` filter tensor from flat `[out][in][h][w]` values.
///
/// A length mismatch is logged and yields an all-zero tensor of the requested shape.
pub fn filter_tensor_from_values(values: &[f32], shape: FilterShape) -> Tensor {
    match reorder_filter_weights(values, shape) {
        Ok(data) => Tensor::new(shape.dims(), data).unwrap_or_else(|_| Tensor::zeros(shape.dims())),
        Err(err) => {
            tracing::warn!(
                expected = shape.count(),
                actual = values.len(),
                "filter weight count mismatch ({err}), using zeros"
            );
            Tensor::zeros(shape.dims())
        }
    }
}

/// Read a whole file as little-endian `f32` values; a trailing partial value is ignored.
pub fn read_f32_file(path: &Path) -> Result<Vec<f32>> {
    let bytes = fs::read(path).map_err(|e| AlexNetError::io(path, e))?;
    Ok(bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

/// Load `directory/name` as a filter bank of `shape`.
pub fn load_weights(directory: &Path, name: &str, shape: FilterShape) -> Result<Tensor> {
    let path = directory.join(name);
    let values = read_f32_file(&path)?;
    tracing::info!(file = %path.display(), count = values.len(), "read weights");
    Ok(filter_tensor_from_values(&values, shape))
}

/// Load `directory/name` as a flat bias vector.
pub fn load_biases(directory: &Path, name: &str) -> Result<Tensor> {
    let path = directory.join(name);
    let values = read_f32_file(&path)?;
    tracing::info!(file = %path.display(), count = values.len(), "read biases");
    let len = values.len();
    Tensor::new(vec![len], values)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_channel_keeps_spatial_order() {
        // ic = oc = 1: destination (h, w) reads h*kw + w, i.e. identity order
        let shape = FilterShape::new(2, 3, 1, 1);
        let values: Vec<f32> = (0..6).map(|v| v as f32).collect();
        assert_eq!(reorder_filter_weights(&values, shape).unwrap(), values);
    }

    #[test]
    fn test_length_mismatch_is_an_error() {
        let shape = FilterShape::new(2, 2, 2, 2);
        assert!(matches!(
            reorder_filter_weights(&[0.0; 10], shape),
            Err(AlexNetError::ShapeMismatch {
                expected: 16,
                actual: 10
            })
        ));
    }

    #[test]
    fn test_input_channels_interleave_per_tap() {
        let shape = FilterShape::new(1, 2, 2, 1);
        let values = vec![1.0, 2.0, 3.0, 4.0];
        // dst (w=0, ic=0) -> 0, (0, 1) -> 2, (1, 0) -> 1, (1, 1) -> 3
        assert_eq!(
            reorder_filter_weights(&values, shape).unwrap(),
            vec![1.0, 3.0, 2.0, 4.0]
        );
    }
}
