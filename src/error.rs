/// Errors raised by the embedding pipeline and the classifiers built on it
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// A pretrained-vector source, persisted artifact or dataset row could not be parsed
    #[error("format error: {0}")]
    Format(String),

    /// A hyperparameter is out of range or names an unsupported choice
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A label that was not seen when the label encoder was fitted
    #[error("unknown label {0:?}")]
    UnknownLabel(String),

    /// An embedded batch does not match the input the model was built for
    #[error("shape error: expected {expected}, found {found}")]
    Shape {
        /// The shape the model expects
        expected: String,
        /// The shape that was supplied
        found: String,
    },

    /// Prediction or evaluation was requested before the classifier was built
    #[error("the classifier has not been built, fitted or restored")]
    NotFitted,

    /// The external tokenizer failed on an input text
    #[error("tokenizer error: {0}")]
    Tokenizer(String),

    /// Model state could not be recorded or restored
    #[error("unable to persist model state: {0}")]
    Persistence(String),

    /// Underlying I/O failure
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Build a shape error from anything printable
    pub fn shape(expected: impl ToString, found: impl ToString) -> Self {
        Self::Shape {
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }
}

/// Result alias used across the crate
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use burn::config::Config;

    use super::*;

    #[derive(Config, Debug)]
    struct WindowConfig {
        #[config(default = 3)]
        size: usize,
    }

    #[test]
    fn test_configs_derive_next_to_the_result_alias() {
        let json = serde_json::to_string(&WindowConfig::new()).unwrap();
        let restored: WindowConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(restored.size, 3);

        let result: Result<usize> = Err(Error::NotFitted);
        assert!(matches!(result, Err(Error::NotFitted)));
    }
}
