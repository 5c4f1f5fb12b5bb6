/// Label to class id mapping
pub mod labels;

/// Token ids to embedded batches
pub mod embedder;

/// Batcher
pub mod batcher;

/// Classifier and training hyperparameters
pub mod config;

/// Loss and accuracy accumulation
pub mod metrics;

/// Per-epoch training records
pub mod history;

/// Training
pub mod training;

/// Inference
pub mod inference;

/// The classifier contract shared by every architecture
pub mod classifier;

/// TF-IDF term vectors
pub mod tfidf;

/// Linear classification of weighted word counts
pub mod word_count;

pub use batcher::{EmbeddedBatch, Sample, TextBatcher, TrainBatch};
pub use classifier::TextEmbeddingClassifier;
pub use config::{ClassifierConfig, OptimizerKind, TrainingConfig};
pub use embedder::{BagOfWordsEmbedder, ClipPolicy, Embedder, SequenceEmbedder};
pub use history::{EpochMetrics, TrainingHistory};
pub use inference::Prediction;
pub use labels::LabelEncoder;
pub use metrics::Evaluation;
pub use tfidf::{TfIdfConfig, TfIdfVectorizer};
pub use word_count::{WordCountClassifier, WordCountConfig};
