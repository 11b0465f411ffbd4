//! End-to-end forward pass tests for AlexNet
//!
//! This file covers:
//! - Logit shape and zero-parameter behaviour
//! - Debug activations up to pool5
//! - Building from a pretrained weight directory
//! - Initial parameter distributions of a fresh network

use alexnet::alexnet::{INPUT_CHANNELS, INPUT_SIZE};
use alexnet::utils::SimpleRng;
use alexnet::{AlexNet, AlexNetError, Model, NetworkConfig, Tensor};
use std::fs;
use std::path::Path;
use tempfile::tempdir;

const CONV_CHANNELS: [(&str, usize); 5] = [
    ("conv1", 96),
    ("conv2", 256),
    ("conv3", 384),
    ("conv4", 384),
    ("conv5", 256),
];

fn small_config() -> NetworkConfig {
    NetworkConfig {
        fully_connected_width: 16,
        ..NetworkConfig::default()
    }
}

fn input_batch(batch: usize, rng: &mut SimpleRng) -> Tensor {
    let len = batch * INPUT_SIZE * INPUT_SIZE * INPUT_CHANNELS;
    let data = (0..len).map(|_| rng.gen_range_f32(-1.0, 1.0)).collect();
    Tensor::new(vec![batch, INPUT_SIZE, INPUT_SIZE, INPUT_CHANNELS], data).unwrap()
}

fn write_f32_file(path: &Path, values: &[f32]) {
    let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
    fs::write(path, bytes).expect("failed to write weight file");
}

/// Weight files with a single value (loaded as zeros) and constant biases.
fn write_stub_weights(dir: &Path, conv1_bias: f32) {
    for (name, channels) in CONV_CHANNELS {
        write_f32_file(&dir.join(format!("{name}.weights")), &[1.0]);
        let bias = if name == "conv1" { conv1_bias } else { 0.0 };
        write_f32_file(&dir.join(format!("{name}.biases")), &vec![bias; channels]);
    }
}

// ============================================================================
// Logits
// ============================================================================

mod logits_tests {
    use super::*;

    #[test]
    fn test_zero_parameters_give_zero_logits() {
        let mut rng = SimpleRng::new(42);
        let mut net = AlexNet::new(&small_config(), 10, &mut rng).unwrap();
        for param in net.parameters_mut() {
            param.values.fill(0.0);
        }

        let input = Tensor::zeros(vec![1, INPUT_SIZE, INPUT_SIZE, INPUT_CHANNELS]);
        let logits = net.forward(&input, false).unwrap();
        assert_eq!(logits.shape(), &[1, 10]);
        assert!(logits.data().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_logits_are_finite_and_deterministic_in_inference() {
        let mut rng = SimpleRng::new(7);
        let net = AlexNet::new(&small_config(), 5, &mut rng).unwrap();
        let input = input_batch(1, &mut rng);

        let first = net.forward(&input, false).unwrap();
        let second = net.forward(&input, false).unwrap();
        assert_eq!(first.shape(), &[1, 5]);
        assert!(first.data().iter().all(|v| v.is_finite()));
        assert_eq!(first, second);
    }

    #[test]
    fn test_rejects_wrong_input_shape() {
        let mut rng = SimpleRng::new(3);
        let net = AlexNet::new(&small_config(), 2, &mut rng).unwrap();
        let input = Tensor::zeros(vec![1, 224, 224, 3]);
        assert!(matches!(
            net.forward(&input, false),
            Err(AlexNetError::InvalidShape { .. })
        ));
    }
}

// ============================================================================
// Debug activations
// ============================================================================

mod debug_tests {
    use super::*;

    #[test]
    fn test_debug_activations_stop_at_pool5() {
        let mut rng = SimpleRng::new(11);
        let net = AlexNet::new(&small_config(), 3, &mut rng).unwrap();
        let input = input_batch(1, &mut rng);

        let activations = net.debug_activations(&input).unwrap();
        let summary: Vec<(&str, &[usize])> = activations
            .iter()
            .map(|(name, tensor)| (name.as_str(), tensor.shape()))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("input", &[1, 227, 227, 3][..]),
                ("conv1", &[1, 55, 55, 96][..]),
                ("norm1", &[1, 55, 55, 96][..]),
                ("pool1", &[1, 27, 27, 96][..]),
                ("conv2", &[1, 27, 27, 256][..]),
                ("norm2", &[1, 27, 27, 256][..]),
                ("pool2", &[1, 13, 13, 256][..]),
                ("conv3", &[1, 13, 13, 384][..]),
                ("conv4", &[1, 13, 13, 384][..]),
                ("conv5", &[1, 13, 13, 256][..]),
                ("pool5", &[1, 6, 6, 256][..]),
            ]
        );
        assert_eq!(activations[0].1, input);
    }

    #[test]
    fn test_debug_activations_without_conv1_lrn() {
        let config = NetworkConfig {
            conv1_lrn: false,
            ..small_config()
        };
        let mut rng = SimpleRng::new(12);
        let net = AlexNet::new(&config, 3, &mut rng).unwrap();
        let input = input_batch(1, &mut rng);

        let names: Vec<String> = net
            .debug_activations(&input)
            .unwrap()
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        assert_eq!(names.len(), 10);
        assert!(!names.iter().any(|n| n == "norm1"));
        assert_eq!(names.last().map(String::as_str), Some("pool5"));
    }

    #[test]
    fn test_relu_stages_are_non_negative() {
        let mut rng = SimpleRng::new(13);
        let net = AlexNet::new(&small_config(), 3, &mut rng).unwrap();
        let input = input_batch(1, &mut rng);

        for (name, tensor) in net.debug_activations(&input).unwrap() {
            if name.starts_with("conv") || name.starts_with("pool") {
                assert!(tensor.min() >= 0.0, "{name} has negative values");
            }
        }
    }
}

// ============================================================================
// Pretrained weights
// ============================================================================

mod pretrained_tests {
    use super::*;

    #[test]
    fn test_wrong_length_weights_load_as_zero_filters() {
        let dir = tempdir().unwrap();
        write_stub_weights(dir.path(), 0.5);

        let mut rng = SimpleRng::new(21);
        let net = AlexNet::with_pretrained(&small_config(), 4, dir.path(), &mut rng).unwrap();
        let input = input_batch(1, &mut rng);

        // zero filters leave only relu(bias)
        let activations = net.debug_activations(&input).unwrap();
        let (name, conv1) = &activations[1];
        assert_eq!(name, "conv1");
        assert!(conv1.data().iter().all(|&v| v == 0.5));

        let (name, pool5) = activations.last().unwrap();
        assert_eq!(name, "pool5");
        assert!(pool5.data().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_wrong_bias_count_is_rejected() {
        let dir = tempdir().unwrap();
        write_stub_weights(dir.path(), 0.0);
        write_f32_file(&dir.path().join("conv3.biases"), &[0.0; 10]);

        let mut rng = SimpleRng::new(22);
        let result = AlexNet::with_pretrained(&small_config(), 4, dir.path(), &mut rng);
        assert!(matches!(
            result,
            Err(AlexNetError::ShapeMismatch {
                expected: 384,
                actual: 10
            })
        ));
    }

    #[test]
    fn test_missing_weight_file_is_io_error() {
        let dir = tempdir().unwrap();
        write_stub_weights(dir.path(), 0.0);
        fs::remove_file(dir.path().join("conv4.weights")).unwrap();

        let mut rng = SimpleRng::new(23);
        let result = AlexNet::with_pretrained(&small_config(), 4, dir.path(), &mut rng);
        match result {
            Err(AlexNetError::Io { path, .. }) => assert!(path.ends_with("conv4.weights")),
            Err(other) => panic!("expected an I/O error, got {other}"),
            Ok(_) => panic!("expected an I/O error"),
        }
    }
}

// ============================================================================
// Initialisation
// ============================================================================

mod init_tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn mean_and_std(values: &[f32]) -> (f32, f32) {
        let n = values.len() as f64;
        let mean = values.iter().map(|&v| v as f64).sum::<f64>() / n;
        let var = values.iter().map(|&v| (v as f64 - mean).powi(2)).sum::<f64>() / n;
        (mean as f32, var.sqrt() as f32)
    }

    #[test]
    fn test_fresh_network_parameter_distributions() {
        let mut rng = SimpleRng::new(2012);
        let config = NetworkConfig {
            fully_connected_width: 64,
            ..NetworkConfig::default()
        };
        let mut net = AlexNet::new(&config, 10, &mut rng).unwrap();
        let params = net.parameters_mut();
        assert_eq!(params.len(), 16);

        // conv1..conv5 biases
        for index in [1, 3, 5, 7, 9] {
            assert!(
                params[index].values.iter().all(|&b| b == 0.0),
                "conv bias tensor {index} is not zero"
            );
        }

        // (weights, biases, weight std, bias) for fc6, fc7, fc8
        let dense = [(10, 11, 0.005f32, 0.1f32), (12, 13, 0.005, 0.1), (14, 15, 0.01, 0.0)];
        for (weights, biases, std_dev, bias) in dense {
            assert!(
                params[biases].values.iter().all(|&b| b == bias),
                "bias tensor {biases} is not {bias}"
            );
            let (mean, std) = mean_and_std(&*params[weights].values);
            assert_abs_diff_eq!(mean, 0.0, epsilon = 0.2 * std_dev);
            assert_abs_diff_eq!(std, std_dev, epsilon = 0.15 * std_dev);
        }

        assert_eq!(params[10].values.len(), 6 * 6 * 256 * 64);
        assert_eq!(params[12].values.len(), 64 * 64);
        assert_eq!(params[14].values.len(), 64 * 10);
        assert_eq!(params[15].values.len(), 10);
    }
}
