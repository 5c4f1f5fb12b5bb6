use std::sync::Arc;

use crate::{
    datasets::TextDataset,
    error::{Error, Result},
    tokenizer::{Tokenize, WordTokenizer},
};

/// CLI Indexes: Architectures
pub mod architectures;

/// Argument files
pub mod args;

pub use architectures::{Architecture, ArchitectureOptions};

/// The tokenizer named on the command line: a `tokenizer.json` file, or the word tokenizer
pub fn tokenizer(path: Option<&str>, cased: bool) -> Result<Arc<dyn Tokenize>> {
    match path {
        Some(path) => {
            let tokenizer = tokenizers::Tokenizer::from_file(path)
                .map_err(|e| Error::Tokenizer(format!("unable to load {}: {}", path, e)))?;

            Ok(Arc::new(tokenizer))
        }
        None if cased => Ok(Arc::new(WordTokenizer::cased())),
        None => Ok(Arc::new(WordTokenizer::default())),
    }
}

/// Token count of the longest text, at least one
pub fn longest_text(tokenizer: &dyn Tokenize, dataset: &TextDataset) -> Result<usize> {
    dataset.texts().iter().try_fold(1, |longest, text| {
        Ok(longest.max(tokenizer.tokenize(text)?.len()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_longest_text() {
        let dataset = TextDataset::unlabeled(["one two", "one two three, four", ""]);
        let tokenizer = WordTokenizer::default();

        assert_eq!(longest_text(&tokenizer, &dataset).unwrap(), 5);
        assert_eq!(longest_text(&tokenizer, &TextDataset::unlabeled([""])).unwrap(), 1);
    }
}
