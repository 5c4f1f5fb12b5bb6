use std::fmt::Display;

use crate::models::{ArchitectureConfig, CellKind, ConvolutionalConfig, RecurrentConfig};

/// The unique string token that identifies the recurrent architecture
pub static RECURRENT: &str = "rnn";

/// The unique string token that identifies the convolutional architecture
pub static CONVOLUTIONAL: &str = "cnn";

/// The unique string token that identifies the bag-of-words architecture
pub static BAG_OF_WORDS: &str = "bow";

/// Available Architectures
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum Architecture {
    /// Recurrent network over the token sequence
    Recurrent,

    /// Convolutional network over the token sequence
    Convolutional,

    /// Linear classifier over averaged embeddings
    BagOfWords,
}

/// Encoder options collected from the command line
#[derive(Debug, Clone, Default)]
pub struct ArchitectureOptions {
    /// Recurrent cell type
    pub cell: Option<CellKind>,

    /// Recurrent units per direction
    pub units: Option<usize>,

    /// Stacked recurrent layers
    pub layers: Option<usize>,

    /// Read the sequence in one direction only
    pub unidirectional: bool,

    /// Convolution filters per kernel size
    pub filters: Option<usize>,

    /// Convolution kernel sizes
    pub kernel_sizes: Option<Vec<usize>>,
}

impl Architecture {
    /// Build the architecture configuration, starting from the defaults
    pub fn config(&self, options: &ArchitectureOptions) -> ArchitectureConfig {
        match self {
            Architecture::Recurrent => {
                let mut config = RecurrentConfig::new().with_bidirectional(!options.unidirectional);

                if let Some(cell) = options.cell {
                    config.cell = cell;
                }
                if let Some(units) = options.units {
                    config.units = units;
                }
                if let Some(layers) = options.layers {
                    config.layers = layers;
                }

                ArchitectureConfig::Recurrent(config)
            }
            Architecture::Convolutional => {
                let mut config = ConvolutionalConfig::new();

                if let Some(filters) = options.filters {
                    config.filters = filters;
                }
                if let Some(kernel_sizes) = &options.kernel_sizes {
                    config.kernel_sizes = kernel_sizes.clone();
                }

                ArchitectureConfig::Convolutional(config)
            }
            Architecture::BagOfWords => ArchitectureConfig::BagOfWords,
        }
    }
}

impl TryFrom<&str> for Architecture {
    type Error = ArchitectureError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let value = value.to_lowercase();

        if value == RECURRENT {
            Ok(Architecture::Recurrent)
        } else if value == CONVOLUTIONAL {
            Ok(Architecture::Convolutional)
        } else if value == BAG_OF_WORDS {
            Ok(Architecture::BagOfWords)
        } else {
            Err(ArchitectureError::Unknown(value))
        }
    }
}

impl Display for Architecture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Architecture::Recurrent => RECURRENT,
            Architecture::Convolutional => CONVOLUTIONAL,
            Architecture::BagOfWords => BAG_OF_WORDS,
        };

        write!(f, "{}", name)
    }
}

/// Architecture Error
#[derive(thiserror::Error, Debug)]
pub enum ArchitectureError {
    /// No architecture found for the given string
    #[error("no architecture found for {0} (expected rnn, cnn or bow)")]
    Unknown(String),
}

/// Parse a comma separated list of kernel sizes such as `3,4,5`
pub fn parse_kernel_sizes(value: &str) -> Result<Vec<usize>, std::num::ParseIntError> {
    value.split(',').map(|size| size.trim().parse()).collect()
}
