use std::path::Path;

use burn::{config::Config, LearningRate};
use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    models::ArchitectureConfig,
};

use super::embedder::ClipPolicy;

/// Configuration of a text embedding classifier
#[derive(Config, Debug)]
pub struct ClassifierConfig {
    /// Architecture variant and its encoder hyperparameters
    pub architecture: ArchitectureConfig,

    /// Maximum sequence length
    #[config(default = 50)]
    pub max_length: usize,

    /// Which tokens of an over-long text are kept
    #[config(default = "ClipPolicy::Head")]
    pub clip: ClipPolicy,

    /// Dropout rate in front of the output layer
    #[config(default = 0.5)]
    pub dropout: f64,

    /// Batch size used for evaluation and prediction
    #[config(default = 32)]
    pub batch_size: usize,

    /// Seed for parameter initialization
    #[config(default = 42)]
    pub seed: u64,
}

impl ClassifierConfig {
    /// Reject out-of-range hyperparameters before any parameters are drawn
    pub fn validate(&self) -> Result<()> {
        if self.architecture.is_sequential() && self.max_length == 0 {
            return Err(Error::Configuration(
                "the maximum sequence length must be positive".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(Error::Configuration(format!(
                "dropout must be in [0, 1), got {}",
                self.dropout
            )));
        }
        if self.batch_size == 0 {
            return Err(Error::Configuration(
                "the batch size must be positive".to_string(),
            ));
        }

        self.architecture.validate(self.max_length)
    }

    /// Save as pretty JSON
    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        self.save(path.as_ref())
            .map_err(|e| Error::Persistence(format!("unable to save config: {}", e)))
    }

    /// Load a configuration written by [`ClassifierConfig::save_json`]
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self> {
        let config = Self::load(path.as_ref())
            .map_err(|e| Error::Format(format!("unable to load config: {}", e)))?;
        config.validate()?;

        Ok(config)
    }
}

/// Optimization algorithm used by the training harness
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizerKind {
    /// Adam
    #[default]
    Adam,

    /// Adam with decoupled weight decay
    AdamW,

    /// Stochastic gradient descent
    Sgd,
}

impl TryFrom<&str> for OptimizerKind {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self> {
        match value.to_lowercase().as_str() {
            "adam" => Ok(OptimizerKind::Adam),
            "adamw" => Ok(OptimizerKind::AdamW),
            "sgd" => Ok(OptimizerKind::Sgd),
            _ => Err(Error::Configuration(format!(
                "unsupported optimizer: {}",
                value
            ))),
        }
    }
}

/// Define configuration struct for a training run
#[derive(Config, Debug)]
pub struct TrainingConfig {
    /// Number of epochs
    #[config(default = 10)]
    pub num_epochs: usize,

    /// Batch size
    #[config(default = 32)]
    pub batch_size: usize,

    /// Learning rate
    #[config(default = 1e-3)]
    pub learning_rate: LearningRate,

    /// Optimizer
    #[config(default = "OptimizerKind::Adam")]
    pub optimizer: OptimizerKind,

    /// Adam epsilon
    #[config(default = 1e-8)]
    pub adam_epsilon: f32,

    /// Seed for shuffling and dropout
    #[config(default = 42)]
    pub seed: u64,

    /// Reshuffle the training samples every epoch
    #[config(default = true)]
    pub shuffle: bool,

    /// Fraction of the training set held out for validation when no validation set is given
    pub validation_fraction: Option<f64>,

    /// Stop after this many epochs without improvement of the monitored loss
    pub patience: Option<usize>,

    /// Restore the parameters of the best epoch when training ends
    #[config(default = true)]
    pub keep_best: bool,
}

impl TrainingConfig {
    /// Reject out-of-range hyperparameters
    pub fn validate(&self) -> Result<()> {
        if self.num_epochs == 0 {
            return Err(Error::Configuration(
                "at least one epoch is required".to_string(),
            ));
        }
        if self.batch_size == 0 {
            return Err(Error::Configuration(
                "the batch size must be positive".to_string(),
            ));
        }
        if !(self.learning_rate > 0.0) {
            return Err(Error::Configuration(format!(
                "the learning rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if let Some(fraction) = self.validation_fraction {
            if !(fraction > 0.0 && fraction < 1.0) {
                return Err(Error::Configuration(format!(
                    "the validation fraction must be in (0, 1), got {}",
                    fraction
                )));
            }
        }
        if self.patience == Some(0) {
            return Err(Error::Configuration(
                "patience must be at least one epoch".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::models::ConvolutionalConfig;

    #[test]
    fn test_defaults() {
        let config = ClassifierConfig::new(ArchitectureConfig::BagOfWords);

        assert_eq!(config.max_length, 50);
        assert_eq!(config.clip, ClipPolicy::Head);
        assert_eq!(config.batch_size, 32);
        assert!(config.validate().is_ok());

        let training = TrainingConfig::new();

        assert_eq!(training.num_epochs, 10);
        assert_eq!(training.optimizer, OptimizerKind::Adam);
        assert!(training.validate().is_ok());
    }

    #[test]
    fn test_out_of_range_values_are_rejected() {
        let config = ClassifierConfig::new(ArchitectureConfig::BagOfWords).with_dropout(1.0);
        assert!(matches!(config.validate(), Err(Error::Configuration(_))));

        let config = ClassifierConfig::new(ArchitectureConfig::Convolutional(
            ConvolutionalConfig::new().with_kernel_sizes(vec![3, 4, 5]),
        ))
        .with_max_length(4);
        assert!(matches!(config.validate(), Err(Error::Configuration(_))));

        let training = TrainingConfig::new().with_validation_fraction(Some(1.5));
        assert!(matches!(training.validate(), Err(Error::Configuration(_))));

        let training = TrainingConfig::new().with_patience(Some(0));
        assert!(matches!(training.validate(), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_config_file_round_trip() {
        let path = std::env::temp_dir().join(format!("classifier-config-{}.json", std::process::id()));
        let config = ClassifierConfig::new(ArchitectureConfig::recurrent()).with_max_length(12);

        config.save_json(&path).unwrap();
        let loaded = ClassifierConfig::load_json(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(loaded.architecture, config.architecture);
        assert_eq!(loaded.max_length, 12);
    }

    #[test]
    fn test_optimizer_names() {
        assert_eq!(OptimizerKind::try_from("AdamW").unwrap(), OptimizerKind::AdamW);
        assert!(OptimizerKind::try_from("rmsprop").is_err());
    }
}
