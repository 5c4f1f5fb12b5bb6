use std::{fmt::Display, path::Path};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Token to id mapping
pub mod vocabulary;

/// Dense vector storage
pub mod table;

/// Text-format pretrained vector sources
pub mod loader;

/// Saving and restoring loaded embeddings
pub mod storage;

pub use table::EmbeddingTable;
pub use vocabulary::{Vocabulary, OOV_ID, OOV_TOKEN, PAD_ID, PAD_TOKEN};

/// Width of the pretrained vectors this crate is tuned for (GloVe 300d)
pub const EMBEDDING_DIM: usize = 300;

/// How the out-of-vocabulary row of the table is filled
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OovPolicy {
    /// Unknown tokens contribute a zero vector
    #[default]
    Zero,

    /// Unknown tokens contribute the mean of every pretrained vector
    Mean,
}

/// Options for loading a pretrained vector source
#[derive(burn::config::Config, Debug)]
pub struct EmbeddingsConfig {
    /// Number of components every vector must have
    #[config(default = 300)]
    pub dimension: usize,

    /// Keep only the first N tokens of the source
    pub max_vocabulary: Option<usize>,

    /// Contents of the out-of-vocabulary row
    #[config(default = "OovPolicy::Zero")]
    pub oov: OovPolicy,
}

/// A vocabulary and the pretrained table it indexes.
///
/// Built once at load time and shared read-only (usually behind an `Arc`) by every embedder.
#[derive(Clone, Debug, PartialEq)]
pub struct Embeddings {
    vocabulary: Vocabulary,
    table: EmbeddingTable,
}

impl Embeddings {
    /// Assemble embeddings from already-validated parts
    pub fn new(vocabulary: Vocabulary, table: EmbeddingTable) -> Result<Self> {
        if vocabulary.len() != table.rows() {
            return Err(Error::Format(format!(
                "vocabulary has {} entries but the table has {} rows",
                vocabulary.len(),
                table.rows()
            )));
        }

        Ok(Self { vocabulary, table })
    }

    /// Build embeddings from (token, vector) pairs in source order.
    ///
    /// Every vector must have exactly `config.dimension` components. Repeated tokens keep their
    /// first vector.
    pub fn from_pairs<I>(pairs: I, config: &EmbeddingsConfig) -> Result<Self>
    where
        I: IntoIterator<Item = Result<(String, Vec<f32>)>>,
    {
        let dim = config.dimension;
        if dim == 0 {
            return Err(Error::Configuration(
                "the embedding dimension must be positive".to_string(),
            ));
        }

        let mut vocabulary = Vocabulary::new();
        let mut rows = Vec::new();
        let mut sum = vec![0.0f64; dim];

        for (index, pair) in pairs.into_iter().enumerate() {
            if config
                .max_vocabulary
                .is_some_and(|max| vocabulary.len() - 2 >= max)
            {
                break;
            }

            let (token, vector) = pair?;

            if vector.len() != dim {
                return Err(Error::Format(format!(
                    "vector {} ({:?}) has {} components, expected {}",
                    index + 1,
                    token,
                    vector.len(),
                    dim
                )));
            }

            let (_, added) = vocabulary.insert(token);
            if !added {
                log::debug!("Skipping repeated pretrained token at entry {}", index + 1);
                continue;
            }

            for (total, value) in sum.iter_mut().zip(&vector) {
                *total += f64::from(*value);
            }
            rows.extend(vector);
        }

        let count = vocabulary.len() - 2;
        let oov = match config.oov {
            OovPolicy::Mean if count > 0 => sum.iter().map(|v| (v / count as f64) as f32).collect(),
            _ => vec![0.0; dim],
        };

        let table = EmbeddingTable::with_reserved_rows(dim, rows, oov)?;

        log::debug!("Loaded {} pretrained vectors of width {}", count, dim);

        Self::new(vocabulary, table)
    }

    /// Load a text-format source from disk
    pub fn from_file(path: impl AsRef<Path>, config: &EmbeddingsConfig) -> Result<Self> {
        let file = std::fs::File::open(path.as_ref())?;

        loader::load(std::io::BufReader::new(file), config)
    }

    /// Map a token to its id, falling back to [`OOV_ID`]
    pub fn lookup(&self, token: &str) -> usize {
        self.vocabulary.lookup(token)
    }

    /// The vector for a token, the OOV row when unknown
    pub fn vector(&self, token: &str) -> &[f32] {
        self.table.row(self.lookup(token))
    }

    /// The token to id mapping
    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    /// The pretrained vectors
    pub fn table(&self) -> &EmbeddingTable {
        &self.table
    }

    /// Width of every vector
    pub fn dim(&self) -> usize {
        self.table.dim()
    }

    /// Split into the vocabulary and the table
    pub fn into_parts(self) -> (Vocabulary, EmbeddingTable) {
        (self.vocabulary, self.table)
    }
}

impl Display for Embeddings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} vocabulary entries, {} dimensions",
            self.vocabulary.len(),
            self.dim()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(entries: &[(&str, &[f32])]) -> Vec<Result<(String, Vec<f32>)>> {
        entries
            .iter()
            .map(|(token, vector)| Ok((token.to_string(), vector.to_vec())))
            .collect()
    }

    #[test]
    fn test_ids_follow_source_order() {
        let config = EmbeddingsConfig::new().with_dimension(2);
        let embeddings =
            Embeddings::from_pairs(pairs(&[("b", &[1.0, 0.0]), ("a", &[0.0, 1.0])]), &config)
                .unwrap();

        assert_eq!(embeddings.lookup("b"), 2);
        assert_eq!(embeddings.lookup("a"), 3);
        assert_eq!(embeddings.vector("a"), &[0.0, 1.0]);
    }

    #[test]
    fn test_inconsistent_dimensions_are_rejected() {
        let config = EmbeddingsConfig::new().with_dimension(3);
        let result =
            Embeddings::from_pairs(pairs(&[("x", &[1.0, 2.0, 3.0]), ("y", &[1.0])]), &config);

        assert!(matches!(result, Err(Error::Format(_))));
    }

    #[test]
    fn test_oov_row_is_zero_by_default() {
        let config = EmbeddingsConfig::new().with_dimension(2);
        let embeddings = Embeddings::from_pairs(pairs(&[("x", &[2.0, 4.0])]), &config).unwrap();

        assert_eq!(embeddings.vector("missing"), &[0.0, 0.0]);
    }

    #[test]
    fn test_oov_row_can_be_the_mean() {
        let config = EmbeddingsConfig::new()
            .with_dimension(2)
            .with_oov(OovPolicy::Mean);
        let embeddings =
            Embeddings::from_pairs(pairs(&[("x", &[2.0, 4.0]), ("y", &[0.0, 0.0])]), &config)
                .unwrap();

        assert_eq!(embeddings.vector("missing"), &[1.0, 2.0]);
    }

    #[test]
    fn test_max_vocabulary_truncates_the_source() {
        let config = EmbeddingsConfig::new()
            .with_dimension(1)
            .with_max_vocabulary(Some(2));
        let embeddings = Embeddings::from_pairs(
            pairs(&[("a", &[1.0]), ("b", &[2.0]), ("c", &[3.0])]),
            &config,
        )
        .unwrap();

        assert_eq!(embeddings.vocabulary().len(), 4);
        assert_eq!(embeddings.lookup("c"), OOV_ID);
    }
}
