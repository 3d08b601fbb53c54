//! Training configuration.
//!
//! Recognized options: the hidden-layer dimensions (the fixed 3125 input and
//! 10 output are appended automatically), the epoch count, the learning rate,
//! and its decay rate. Configurations can be built directly, deserialized
//! from JSON, or assembled by the CLI; every path goes through [`TrainingConfig::validate`].
//!
//! # Example
//!
//! ```json
//! {
//!   "hidden_dims": [800, 500],
//!   "epochs": 200,
//!   "learning_rate": 0.8,
//!   "decay_rate": 0.003
//! }
//! ```

use serde::Deserialize;
use std::path::Path;

use crate::error::{Error, Result};
use crate::layers::conv::FLAT_FEATURES;
use crate::network::NUM_CLASSES;

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct TrainingConfig {
    /// Hidden-layer widths, in order, excluding input and output.
    pub hidden_dims: Vec<usize>,

    /// Number of full-batch training epochs.
    pub epochs: usize,

    /// Initial gradient-descent step size.
    pub learning_rate: f64,

    /// Per-epoch decay: alpha = learning_rate / (1 + decay_rate * epoch).
    pub decay_rate: f64,

    /// Seed for parameter initialization.
    pub seed: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            hidden_dims: vec![800],
            epochs: 200,
            learning_rate: 0.8,
            decay_rate: 0.003,
            seed: 0,
        }
    }
}

impl TrainingConfig {
    /// Full layer-width list: 3125 input, hidden dims, 10 output.
    pub fn net_dims(&self) -> Vec<usize> {
        let mut dims = Vec::with_capacity(self.hidden_dims.len() + 2);
        dims.push(FLAT_FEATURES);
        dims.extend_from_slice(&self.hidden_dims);
        dims.push(NUM_CLASSES);
        dims
    }

    /// Checks every option; a zero learning rate is allowed (it makes the
    /// update step a no-op) but it must be finite and non-negative.
    pub fn validate(&self) -> Result<()> {
        if self.epochs == 0 {
            return Err(Error::Configuration("epochs must be at least 1".into()));
        }
        if !self.learning_rate.is_finite() || self.learning_rate < 0.0 {
            return Err(Error::Configuration(format!(
                "learning_rate must be finite and non-negative, got {}",
                self.learning_rate
            )));
        }
        if !self.decay_rate.is_finite() || self.decay_rate < 0.0 {
            return Err(Error::Configuration(format!(
                "decay_rate must be finite and non-negative, got {}",
                self.decay_rate
            )));
        }
        if self.hidden_dims.iter().any(|&d| d == 0) {
            return Err(Error::Configuration(format!(
                "hidden dimensions must be positive, got {:?}",
                self.hidden_dims
            )));
        }
        Ok(())
    }
}

/// Load and validate a configuration from a JSON file.
pub fn load_config(path: impl AsRef<Path>) -> Result<TrainingConfig> {
    let contents = std::fs::read_to_string(path)?;
    let config: TrainingConfig = serde_json::from_str(&contents)?;
    config.validate()?;
    Ok(config)
}
