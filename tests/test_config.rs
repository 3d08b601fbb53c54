//! Configuration tests: defaults, layer-dimension assembly, validation
//! failures, and JSON loading.

use convnet::config::{load_config, TrainingConfig};
use convnet::Error;
use std::fs;
use std::path::PathBuf;

fn write_temp(name: &str, contents: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("convnet-{}-{}", std::process::id(), name));
    fs::write(&path, contents).unwrap();
    path
}

// ============================================================================
// Defaults and derived dimensions
// ============================================================================

mod defaults_tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = TrainingConfig::default();
        assert_eq!(config.hidden_dims, vec![800]);
        assert_eq!(config.epochs, 200);
        assert_eq!(config.learning_rate, 0.8);
        assert_eq!(config.decay_rate, 0.003);
        assert_eq!(config.seed, 0);
        config.validate().unwrap();
    }

    #[test]
    fn test_net_dims_wraps_hidden_layers() {
        let config = TrainingConfig {
            hidden_dims: vec![800, 500],
            ..TrainingConfig::default()
        };
        assert_eq!(config.net_dims(), vec![3125, 800, 500, 10]);

        let direct = TrainingConfig {
            hidden_dims: vec![],
            ..TrainingConfig::default()
        };
        assert_eq!(direct.net_dims(), vec![3125, 10]);
    }
}

// ============================================================================
// Validation
// ============================================================================

mod validation_tests {
    use super::*;

    #[test]
    fn test_zero_epochs_rejected() {
        let config = TrainingConfig {
            epochs: 0,
            ..TrainingConfig::default()
        };
        assert!(matches!(config.validate(), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_negative_learning_rate_rejected() {
        let config = TrainingConfig {
            learning_rate: -0.1,
            ..TrainingConfig::default()
        };
        assert!(matches!(config.validate(), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_nan_learning_rate_rejected() {
        let config = TrainingConfig {
            learning_rate: f64::NAN,
            ..TrainingConfig::default()
        };
        assert!(matches!(config.validate(), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_zero_learning_rate_allowed() {
        let config = TrainingConfig {
            learning_rate: 0.0,
            ..TrainingConfig::default()
        };
        config.validate().unwrap();
    }

    #[test]
    fn test_negative_decay_rate_rejected() {
        let config = TrainingConfig {
            decay_rate: -0.003,
            ..TrainingConfig::default()
        };
        assert!(matches!(config.validate(), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_zero_width_hidden_layer_rejected() {
        let config = TrainingConfig {
            hidden_dims: vec![800, 0],
            ..TrainingConfig::default()
        };
        assert!(matches!(config.validate(), Err(Error::Configuration(_))));
    }
}

// ============================================================================
// JSON loading
// ============================================================================

mod json_loading_tests {
    use super::*;

    #[test]
    fn test_load_full_config() {
        let path = write_temp(
            "full.json",
            r#"{
                "hidden_dims": [400, 200],
                "epochs": 50,
                "learning_rate": 0.5,
                "decay_rate": 0.01,
                "seed": 7
            }"#,
        );
        let config = load_config(&path).unwrap();
        fs::remove_file(&path).unwrap();

        assert_eq!(config.hidden_dims, vec![400, 200]);
        assert_eq!(config.epochs, 50);
        assert_eq!(config.learning_rate, 0.5);
        assert_eq!(config.decay_rate, 0.01);
        assert_eq!(config.seed, 7);
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let path = write_temp("partial.json", r#"{ "epochs": 10 }"#);
        let config = load_config(&path).unwrap();
        fs::remove_file(&path).unwrap();

        assert_eq!(config.epochs, 10);
        assert_eq!(config.hidden_dims, vec![800]);
        assert_eq!(config.learning_rate, 0.8);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let path = write_temp("unknown.json", r#"{ "momentum": 0.9 }"#);
        let result = load_config(&path);
        fs::remove_file(&path).unwrap();

        assert!(matches!(result, Err(Error::Json(_))));
    }

    #[test]
    fn test_invalid_values_rejected_after_parse() {
        let path = write_temp("invalid.json", r#"{ "epochs": 0 }"#);
        let result = load_config(&path);
        fs::remove_file(&path).unwrap();

        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[test]
    fn test_malformed_json_rejected() {
        let path = write_temp("malformed.json", "{ not json");
        let result = load_config(&path);
        fs::remove_file(&path).unwrap();

        assert!(matches!(result, Err(Error::Json(_))));
    }

    #[test]
    fn test_missing_file_is_an_io_error() {
        let path = std::env::temp_dir().join("convnet-definitely-missing.json");
        assert!(matches!(load_config(&path), Err(Error::Io(_))));
    }
}
