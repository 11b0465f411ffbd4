//! Owned n-dimensional `f32` tensor
//!
//! A thin wrapper pairing a row-major data buffer with its shape. Images and
//! convolution activations are stored NHWC (`[batch, height, width, channels]`),
//! dense activations as `[batch, features]`, convolution filters as
//! `[kernel_height, kernel_width, in_channels, out_channels]`.

use crate::error::{AlexNetError, Result};

/// Row-major tensor of `f32` scalars.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    shape: Vec<usize>,
    data: Vec<f32>,
}

impl Tensor {
    /// Wrap `data` with `shape`, checking that the element counts agree.
    pub fn new(shape: Vec<usize>, data: Vec<f32>) -> Result<Self> {
        let expected: usize = shape.iter().product();
        if expected != data.len() {
            return Err(AlexNetError::ShapeMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { shape, data })
    }

    /// All-zero tensor of the given shape.
    pub fn zeros(shape: Vec<usize>) -> Self {
        Self::filled(shape, 0.0)
    }

    /// Tensor with every element set to `value`.
    pub fn filled(shape: Vec<usize>, value: f32) -> Self {
        let count = shape.iter().product();
        Self {
            shape,
            data: vec![value; count],
        }
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    pub fn into_data(self) -> Vec<f32> {
        self.data
    }

    /// Reinterpret the buffer under a new shape with the same element count.
    pub fn reshape(self, shape: Vec<usize>) -> Result<Self> {
        Self::new(shape, self.data)
    }

    /// Copy of the `index`-th slice along the leading (batch) dimension,
    /// keeping a leading dimension of 1.
    pub fn example(&self, index: usize) -> Result<Self> {
        if self.shape.is_empty() || index >= self.shape[0] {
            let mut expected = self.shape.clone();
            if let Some(first) = expected.first_mut() {
                *first = index + 1;
            }
            return Err(AlexNetError::InvalidShape {
                expected,
                actual: self.shape.clone(),
            });
        }
        let stride = self.data.len() / self.shape[0];
        let mut shape = self.shape.clone();
        shape[0] = 1;
        Ok(Self {
            shape,
            data: self.data[index * stride..(index + 1) * stride].to_vec(),
        })
    }

    /// Smallest element (NaN is ignored); `+inf` for an empty tensor.
    pub fn min(&self) -> f32 {
        self.data.iter().copied().fold(f32::INFINITY, f32::min)
    }

    /// Largest element (NaN is ignored); `-inf` for an empty tensor.
    pub fn max(&self) -> f32 {
        self.data.iter().copied().fold(f32::NEG_INFINITY, f32::max)
    }

    /// Arithmetic mean, 0 for an empty tensor.
    pub fn mean(&self) -> f32 {
        if self.data.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.data.iter().map(|&v| v as f64).sum();
        (sum / self.data.len() as f64) as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_wrong_length() {
        let err = Tensor::new(vec![2, 3], vec![0.0; 5]).unwrap_err();
        assert!(matches!(
            err,
            AlexNetError::ShapeMismatch {
                expected: 6,
                actual: 5
            }
        ));
    }

    #[test]
    fn test_zeros_shape() {
        let t = Tensor::zeros(vec![1, 2, 3, 4]);
        assert_eq!(t.rank(), 4);
        assert_eq!(t.len(), 24);
        assert!(t.data().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_example_slices_batch() {
        let t = Tensor::new(vec![2, 1, 1, 2], vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let second = t.example(1).unwrap();
        assert_eq!(second.shape(), &[1, 1, 1, 2]);
        assert_eq!(second.data(), &[3.0, 4.0]);
        assert!(t.example(2).is_err());
    }

    #[test]
    fn test_statistics() {
        let t = Tensor::new(vec![4], vec![-1.0, 3.0, f32::NAN, 2.0]).unwrap();
        assert_eq!(t.min(), -1.0);
        assert_eq!(t.max(), 3.0);

        let t = Tensor::new(vec![3], vec![1.0, 2.0, 3.0]).unwrap();
        assert!((t.mean() - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_reshape() {
        let t = Tensor::zeros(vec![2, 6]);
        let t = t.reshape(vec![3, 4]).unwrap();
        assert_eq!(t.shape(), &[3, 4]);
        assert!(Tensor::zeros(vec![2, 6]).reshape(vec![5]).is_err());
    }
}
