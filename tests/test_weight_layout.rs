//! Tests for pretrained weight import
//!
//! This file covers:
//! - Filter reordering from `[out][in][h][w]` to `[h][w][in][out]`
//! - The lenient zero fallback on a value-count mismatch
//! - Reading little-endian weight and bias files from a directory

use alexnet::layers::FilterShape;
use alexnet::weights::{
    filter_tensor_from_values, load_biases, load_weights, read_f32_file, reorder_filter_weights,
};
use alexnet::AlexNetError;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn write_f32_file(path: &Path, values: &[f32]) {
    let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
    fs::write(path, bytes).expect("failed to write weight file");
}

// ============================================================================
// Reordering
// ============================================================================

mod reorder_tests {
    use super::*;

    #[test]
    fn test_two_by_two_filter_follows_source_formula() {
        let shape = FilterShape::new(2, 2, 2, 2);
        let values: Vec<f32> = (0..16).map(|v| v as f32).collect();
        let tensor = filter_tensor_from_values(&values, shape);
        assert_eq!(tensor.shape(), &[2, 2, 2, 2]);

        let data = tensor.data();
        for h in 0..2 {
            for w in 0..2 {
                for ic in 0..2 {
                    for oc in 0..2 {
                        let dst = ((h * 2 + w) * 2 + ic) * 2 + oc;
                        let src = oc * 4 + ic * 4 + h * 2 + w;
                        assert_eq!(data[dst], src as f32, "h={h} w={w} ic={ic} oc={oc}");
                    }
                }
            }
        }
    }

    #[test]
    fn test_distinct_channel_pairs_share_a_source() {
        // (oc=1, ic=0) and (oc=0, ic=1) both read index 4 at tap (0, 0)
        let shape = FilterShape::new(2, 2, 2, 2);
        let values: Vec<f32> = (0..16).map(|v| v as f32).collect();
        let data = reorder_filter_weights(&values, shape).unwrap();

        let at = |h: usize, w: usize, ic: usize, oc: usize| data[((h * 2 + w) * 2 + ic) * 2 + oc];
        assert_eq!(at(0, 0, 0, 1), at(0, 0, 1, 0));

        // sources 12..16 are never read
        assert!(data.iter().all(|&v| v < 12.0));
    }

    #[test]
    fn test_length_mismatch_falls_back_to_zeros() {
        let shape = FilterShape::new(2, 2, 2, 2);
        let values = vec![1.0f32; 10];
        let tensor = filter_tensor_from_values(&values, shape);

        assert_eq!(tensor.shape(), &[2, 2, 2, 2]);
        assert!(tensor.data().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_strict_reorder_reports_mismatch() {
        let shape = FilterShape::new(3, 3, 1, 2);
        assert!(matches!(
            reorder_filter_weights(&[0.0; 17], shape),
            Err(AlexNetError::ShapeMismatch {
                expected: 18,
                actual: 17
            })
        ));
    }
}

// ============================================================================
// File loading
// ============================================================================

mod file_tests {
    use super::*;

    #[test]
    fn test_load_weights_reads_little_endian_values() {
        let dir = tempdir().unwrap();
        let values: Vec<f32> = (0..16).map(|v| v as f32 * 0.5).collect();
        write_f32_file(&dir.path().join("conv1.weights"), &values);

        let shape = FilterShape::new(2, 2, 2, 2);
        let tensor = load_weights(dir.path(), "conv1.weights", shape).unwrap();
        assert_eq!(tensor, filter_tensor_from_values(&values, shape));
    }

    #[test]
    fn test_trailing_bytes_are_ignored() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("partial.biases");
        let mut bytes: Vec<u8> = [1.5f32, -2.0].iter().flat_map(|v| v.to_le_bytes()).collect();
        bytes.extend_from_slice(&[0xAA, 0xBB]);
        fs::write(&path, bytes).unwrap();

        assert_eq!(read_f32_file(&path).unwrap(), vec![1.5, -2.0]);
    }

    #[test]
    fn test_load_biases_is_flat() {
        let dir = tempdir().unwrap();
        write_f32_file(&dir.path().join("conv2.biases"), &[0.1, 0.2, 0.3]);

        let biases = load_biases(dir.path(), "conv2.biases").unwrap();
        assert_eq!(biases.shape(), &[3]);
        assert_eq!(biases.data(), &[0.1, 0.2, 0.3]);
    }

    #[test]
    fn test_wrong_count_file_loads_as_zeros() {
        let dir = tempdir().unwrap();
        write_f32_file(&dir.path().join("conv3.weights"), &[1.0; 10]);

        let shape = FilterShape::new(2, 2, 2, 2);
        let tensor = load_weights(dir.path(), "conv3.weights", shape).unwrap();
        assert!(tensor.data().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempdir().unwrap();
        let result = load_biases(dir.path(), "missing.biases");
        match result {
            Err(AlexNetError::Io { path, .. }) => assert!(path.ends_with("missing.biases")),
            other => panic!("expected an I/O error, got {:?}", other),
        }
    }
}
