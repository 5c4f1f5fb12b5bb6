use std::fmt::Display;

use burn::{config::Config, tensor::backend::Backend};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

use super::{
    convolutional::Convolutional, head::ClassificationHeadConfig, recurrent::Recurrent, Model,
};

/// The recurrent cell used by a recurrent classifier
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellKind {
    /// Long short-term memory
    #[default]
    Lstm,

    /// Gated recurrent unit
    Gru,
}

impl TryFrom<&str> for CellKind {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self> {
        match value.to_lowercase().as_str() {
            "lstm" => Ok(CellKind::Lstm),
            "gru" => Ok(CellKind::Gru),
            _ => Err(Error::Configuration(format!(
                "unsupported recurrent cell type: {}",
                value
            ))),
        }
    }
}

impl Display for CellKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CellKind::Lstm => write!(f, "lstm"),
            CellKind::Gru => write!(f, "gru"),
        }
    }
}

/// Hyperparameters of a recurrent encoder
#[derive(Config, Debug, PartialEq)]
pub struct RecurrentConfig {
    /// Cell type
    #[config(default = "CellKind::Lstm")]
    pub cell: CellKind,

    /// Hidden units per direction
    #[config(default = 128)]
    pub units: usize,

    /// Stacked layers
    #[config(default = 1)]
    pub layers: usize,

    /// Read the sequence in both directions
    #[config(default = true)]
    pub bidirectional: bool,
}

/// Hyperparameters of a convolutional encoder
#[derive(Config, Debug, PartialEq)]
pub struct ConvolutionalConfig {
    /// Filters per kernel size
    #[config(default = 100)]
    pub filters: usize,

    /// Width of each parallel convolution, in tokens
    #[config(default = "vec![3, 4, 5]")]
    pub kernel_sizes: Vec<usize>,
}

/// The architecture variant of a classifier and its encoder hyperparameters
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ArchitectureConfig {
    /// Recurrent encoder over the embedded sequence
    Recurrent(RecurrentConfig),

    /// Convolutional encoder over the embedded sequence
    Convolutional(ConvolutionalConfig),

    /// Classifier over averaged embeddings
    BagOfWords,
}

impl ArchitectureConfig {
    /// A recurrent architecture with default hyperparameters
    pub fn recurrent() -> Self {
        ArchitectureConfig::Recurrent(RecurrentConfig::new())
    }

    /// A convolutional architecture with default hyperparameters
    pub fn convolutional() -> Self {
        ArchitectureConfig::Convolutional(ConvolutionalConfig::new())
    }

    /// Whether the architecture consumes padded sequences rather than averaged vectors
    pub fn is_sequential(&self) -> bool {
        !matches!(self, ArchitectureConfig::BagOfWords)
    }

    /// Short name used on the command line
    pub fn name(&self) -> &'static str {
        match self {
            ArchitectureConfig::Recurrent(_) => "rnn",
            ArchitectureConfig::Convolutional(_) => "cnn",
            ArchitectureConfig::BagOfWords => "bow",
        }
    }

    /// Check the hyperparameters against the sequence length the embedder produces
    pub fn validate(&self, max_length: usize) -> Result<()> {
        match self {
            ArchitectureConfig::Recurrent(config) => {
                if config.units == 0 {
                    return Err(Error::Configuration(
                        "recurrent units must be positive".to_string(),
                    ));
                }
                if config.layers == 0 {
                    return Err(Error::Configuration(
                        "recurrent layers must be positive".to_string(),
                    ));
                }
            }
            ArchitectureConfig::Convolutional(config) => {
                if config.filters == 0 {
                    return Err(Error::Configuration(
                        "convolution filters must be positive".to_string(),
                    ));
                }
                if config.kernel_sizes.is_empty() {
                    return Err(Error::Configuration(
                        "at least one kernel size is required".to_string(),
                    ));
                }
                if let Some(size) = config
                    .kernel_sizes
                    .iter()
                    .find(|&&size| size == 0 || size > max_length)
                {
                    return Err(Error::Configuration(format!(
                        "kernel size {} must be between 1 and the maximum sequence length {}",
                        size, max_length
                    )));
                }
            }
            ArchitectureConfig::BagOfWords => {}
        }

        Ok(())
    }

    /// Width of the encoder summary for the given embedding width
    pub fn output_size(&self, input_size: usize) -> usize {
        match self {
            ArchitectureConfig::Recurrent(config) => {
                config.units * if config.bidirectional { 2 } else { 1 }
            }
            ArchitectureConfig::Convolutional(config) => {
                config.filters * config.kernel_sizes.len()
            }
            ArchitectureConfig::BagOfWords => input_size,
        }
    }

    /// Initialize a model with freshly drawn parameters
    pub fn init<B: Backend>(
        &self,
        input_size: usize,
        sequence_length: usize,
        n_classes: usize,
        dropout: f64,
        device: &B::Device,
    ) -> Result<Model<B>> {
        if self.is_sequential() && sequence_length == 0 {
            return Err(Error::Configuration(
                "the maximum sequence length must be positive".to_string(),
            ));
        }
        if n_classes == 0 {
            return Err(Error::Configuration(
                "at least one class is required".to_string(),
            ));
        }
        self.validate(sequence_length)?;

        let (recurrent, convolutional) = match self {
            ArchitectureConfig::Recurrent(config) => (
                Some(Recurrent::init(
                    config.cell,
                    input_size,
                    config.units,
                    config.layers,
                    config.bidirectional,
                    device,
                )),
                None,
            ),
            ArchitectureConfig::Convolutional(config) => (
                None,
                Some(Convolutional::init(
                    input_size,
                    config.filters,
                    &config.kernel_sizes,
                    device,
                )),
            ),
            ArchitectureConfig::BagOfWords => (None, None),
        };

        let head = ClassificationHeadConfig::new(self.output_size(input_size), n_classes)
            .with_dropout(dropout)
            .init(device);

        Ok(Model {
            recurrent,
            convolutional,
            head,
            input_size,
            sequence_length,
        })
    }
}

impl Display for ArchitectureConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArchitectureConfig::Recurrent(config) => write!(
                f,
                "Recurrent ({}, {} units, {} layer(s){})",
                config.cell,
                config.units,
                config.layers,
                if config.bidirectional { ", bidirectional" } else { "" }
            ),
            ArchitectureConfig::Convolutional(config) => write!(
                f,
                "Convolutional ({} filters, kernel sizes {:?})",
                config.filters, config.kernel_sizes
            ),
            ArchitectureConfig::BagOfWords => write!(f, "Bag of words"),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_cell_names() {
        assert_eq!(CellKind::try_from("LSTM").unwrap(), CellKind::Lstm);
        assert_eq!(CellKind::try_from("gru").unwrap(), CellKind::Gru);
        assert!(matches!(
            CellKind::try_from("transformer"),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_kernel_longer_than_sequence_is_rejected() {
        let config = ArchitectureConfig::Convolutional(
            ConvolutionalConfig::new().with_kernel_sizes(vec![3, 8]),
        );

        assert!(config.validate(8).is_ok());
        assert!(matches!(config.validate(5), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_output_sizes() {
        assert_eq!(ArchitectureConfig::recurrent().output_size(300), 256);
        assert_eq!(ArchitectureConfig::convolutional().output_size(300), 300);
        assert_eq!(ArchitectureConfig::BagOfWords.output_size(300), 300);
    }

    #[test]
    fn test_json_is_tagged_by_type() {
        let json = serde_json::to_value(ArchitectureConfig::BagOfWords).unwrap();
        assert_eq!(json, serde_json::json!({ "type": "bag_of_words" }));

        let config = ArchitectureConfig::Recurrent(RecurrentConfig::new().with_cell(CellKind::Gru));
        let json = serde_json::to_string(&config).unwrap();

        assert_eq!(
            serde_json::from_str::<ArchitectureConfig>(&json).unwrap(),
            config
        );
    }
}
