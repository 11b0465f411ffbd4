//! Configuration structures for the network and for training
//!
//! Both structures are read from JSON; every field is optional in the file
//! and falls back to the defaults below.
//!
//! # Example
//!
//! ```json
//! {
//!   "epochs": 10,
//!   "batch_size": 32,
//!   "learning_rate": 0.01,
//!   "momentum": 0.9,
//!   "channel_order": "bgr",
//!   "pixel_mean": 117.0,
//!   "network": {
//!     "fully_connected_width": 4096,
//!     "conv1_lrn": true
//!   }
//! }
//! ```

use crate::dataset::ChannelOrder;
use crate::error::{AlexNetError, Result};
use crate::layers::LrnParams;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Hyper-parameters of the AlexNet topology.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Width of fc6 and fc7 (4096 in the canonical network).
    pub fully_connected_width: usize,
    /// Dropout probability after fc6 and fc7.
    pub drop_rate: f32,
    /// Whether conv1 is followed by local response normalization.
    pub conv1_lrn: bool,
    pub lrn: LrnParams,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            fully_connected_width: 256,
            drop_rate: 0.5,
            conv1_lrn: true,
            lrn: LrnParams::default(),
        }
    }
}

/// Training run settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f32,
    pub momentum: f32,
    /// Seed for initialization, dropout and shuffling; time-based when absent.
    pub seed: Option<u64>,
    /// Report every `log_every` epochs (the last epoch is always reported).
    pub log_every: usize,
    /// CSV file the epoch reports are appended to.
    pub log_path: Option<PathBuf>,
    pub channel_order: ChannelOrder,
    /// Constant subtracted from every 0-255 pixel value.
    pub pixel_mean: f32,
    pub network: NetworkConfig,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epochs: 10,
            batch_size: 32,
            learning_rate: 0.1,
            momentum: 0.9,
            seed: None,
            log_every: 1,
            log_path: None,
            channel_order: ChannelOrder::Rgb,
            pixel_mean: 0.0,
            network: NetworkConfig::default(),
        }
    }
}

/// Loads a training configuration from a JSON file.
///
/// # Examples
///
/// ```no_run
/// use alexnet::config::load_config;
///
/// let cfg = load_config("config/alexnet.json").unwrap();
/// assert!(cfg.batch_size > 0);
/// ```
pub fn load_config(path: impl AsRef<Path>) -> Result<TrainingConfig> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|e| AlexNetError::io(path, e))?;
    let config: TrainingConfig = serde_json::from_str(&contents)?;
    validate_config(&config)?;
    Ok(config)
}

/// Reject settings the network or the training loop cannot run with.
pub fn validate_config(config: &TrainingConfig) -> Result<()> {
    if config.batch_size == 0 {
        return Err(invalid("batch_size must be positive"));
    }
    if config.log_every == 0 {
        return Err(invalid("log_every must be positive"));
    }
    if config.learning_rate.is_nan() || config.learning_rate <= 0.0 {
        return Err(invalid("learning_rate must be positive"));
    }
    if !(0.0..1.0).contains(&config.momentum) {
        return Err(invalid("momentum must be in range [0.0, 1.0)"));
    }
    if !config.pixel_mean.is_finite() {
        return Err(invalid("pixel_mean must be finite"));
    }
    validate_network(&config.network)
}

/// Reject network settings that cannot be built.
pub fn validate_network(network: &NetworkConfig) -> Result<()> {
    if network.fully_connected_width == 0 {
        return Err(invalid("fully_connected_width must be positive"));
    }
    if !(0.0..1.0).contains(&network.drop_rate) {
        return Err(invalid("drop_rate must be in range [0.0, 1.0)"));
    }
    let lrn = &network.lrn;
    if lrn.bias.is_nan() || lrn.bias <= 0.0 || lrn.alpha < 0.0 || lrn.beta < 0.0 {
        return Err(invalid("lrn requires bias > 0 and non-negative alpha and beta"));
    }
    Ok(())
}

fn invalid(message: &str) -> AlexNetError {
    AlexNetError::InvalidConfig(message.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = TrainingConfig::default();
        assert!(validate_config(&config).is_ok());
        assert_eq!(config.learning_rate, 0.1);
        assert_eq!(config.momentum, 0.9);
        assert_eq!(config.network.fully_connected_width, 256);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: TrainingConfig =
            serde_json::from_str(r#"{ "epochs": 3, "network": { "conv1_lrn": false } }"#).unwrap();
        assert_eq!(config.epochs, 3);
        assert_eq!(config.batch_size, 32);
        assert!(!config.network.conv1_lrn);
        assert_eq!(config.network.drop_rate, 0.5);
        assert_eq!(config.network.lrn.depth_radius, 5);
    }

    #[test]
    fn test_rejects_bad_values() {
        let mut config = TrainingConfig::default();
        config.momentum = 1.0;
        assert!(matches!(
            validate_config(&config),
            Err(AlexNetError::InvalidConfig(_))
        ));

        let mut config = TrainingConfig::default();
        config.network.drop_rate = 1.5;
        assert!(validate_config(&config).is_err());

        let mut config = TrainingConfig::default();
        config.batch_size = 0;
        assert!(validate_config(&config).is_err());
    }
}
