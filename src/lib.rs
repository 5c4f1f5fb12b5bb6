//! # Burn Text Embeddings
//!
//! Text classification over pretrained word embeddings: recurrent, convolutional and
//! bag-of-words classifiers sharing one build / fit / evaluate / predict contract.
#![forbid(unsafe_code)]

/// Errors
pub mod error;

/// Pretrained vocabularies and embedding tables
pub mod embeddings;

/// Tokenizers
pub mod tokenizer;

/// Datasets
pub mod datasets;

/// Models
pub mod models;

/// Pipelines
pub mod pipelines;

/// Utilities
pub mod utils;

/// CLI indexes and utilities
pub mod cli;

pub use error::{Error, Result};
