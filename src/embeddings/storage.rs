use std::{collections::HashMap, path::Path};

use safetensors::{tensor::TensorView, Dtype, SafeTensors};

use crate::{
    error::{Error, Result},
    utils::files::read_lines,
};

use super::{Embeddings, EmbeddingTable, Vocabulary};

/// File holding one vocabulary entry per line, in id order
pub static VOCABULARY_FILE: &str = "vocabulary.txt";

/// File holding the embedding table
pub static TABLE_FILE: &str = "embeddings.safetensors";

/// Name of the table tensor inside [`TABLE_FILE`]
pub static TABLE_TENSOR: &str = "embeddings";

impl Embeddings {
    /// Write the vocabulary and table into a directory
    pub fn save(&self, dir: impl AsRef<Path>) -> Result<()> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;

        let mut vocabulary = self.vocabulary().tokens().join("\n");
        vocabulary.push('\n');
        std::fs::write(dir.join(VOCABULARY_FILE), vocabulary)?;

        let table = self.table();
        let bytes: Vec<u8> = table
            .as_slice()
            .iter()
            .flat_map(|value| value.to_le_bytes())
            .collect();

        let view = TensorView::new(Dtype::F32, vec![table.rows(), table.dim()], &bytes)
            .map_err(|e| Error::Persistence(format!("unable to describe the table: {}", e)))?;

        let mut tensors = HashMap::new();
        tensors.insert(TABLE_TENSOR.to_string(), view);

        let serialized = safetensors::serialize(&tensors, &None)
            .map_err(|e| Error::Persistence(format!("unable to serialize the table: {}", e)))?;
        std::fs::write(dir.join(TABLE_FILE), serialized)?;

        log::debug!("Saved {} embeddings to {}", table.rows(), dir.display());

        Ok(())
    }

    /// Read embeddings written by [`Embeddings::save`]
    pub fn restore(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();

        let lines = read_lines(dir.join(VOCABULARY_FILE))?;
        if lines.len() < 2 {
            return Err(Error::Format(format!(
                "{} is missing the reserved entries",
                VOCABULARY_FILE
            )));
        }
        let vocabulary = Vocabulary::from_tokens(lines.into_iter().skip(2));

        let bytes = std::fs::read(dir.join(TABLE_FILE))?;
        let tensors = SafeTensors::deserialize(&bytes)
            .map_err(|e| Error::Format(format!("unable to parse {}: {}", TABLE_FILE, e)))?;
        let view = tensors
            .tensor(TABLE_TENSOR)
            .map_err(|e| Error::Format(format!("{} has no table: {}", TABLE_FILE, e)))?;

        let (rows, dim) = match (view.dtype(), view.shape()) {
            (Dtype::F32, &[rows, dim]) => (rows, dim),
            (dtype, shape) => {
                return Err(Error::Format(format!(
                    "expected an F32 matrix, found {:?} {:?}",
                    dtype, shape
                )))
            }
        };

        let data: Vec<f32> = view
            .data()
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect();

        if data.len() != rows * dim {
            return Err(Error::Format(format!(
                "table declares {}x{} but holds {} values",
                rows,
                dim,
                data.len()
            )));
        }

        Self::new(vocabulary, EmbeddingTable::from_raw(dim, data)?)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::embeddings::{loader, EmbeddingsConfig, OovPolicy};

    #[test]
    fn test_save_and_restore() {
        let dir = std::env::temp_dir().join(format!("embeddings-storage-{}", std::process::id()));
        let config = EmbeddingsConfig::new()
            .with_dimension(2)
            .with_oov(OovPolicy::Mean);
        let embeddings = loader::load("a 1 2\nb 3 4\n".as_bytes(), &config).unwrap();

        embeddings.save(&dir).unwrap();
        let restored = Embeddings::restore(&dir).unwrap();

        assert_eq!(restored, embeddings);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_restore_rejects_mismatched_vocabulary() {
        let dir = std::env::temp_dir().join(format!("embeddings-mismatch-{}", std::process::id()));
        let config = EmbeddingsConfig::new().with_dimension(1);
        let embeddings = loader::load("a 1\nb 2\n".as_bytes(), &config).unwrap();

        embeddings.save(&dir).unwrap();
        std::fs::write(dir.join(VOCABULARY_FILE), "<pad>\n<unk>\na\n").unwrap();

        assert!(matches!(Embeddings::restore(&dir), Err(Error::Format(_))));

        std::fs::remove_dir_all(&dir).ok();
    }
}
