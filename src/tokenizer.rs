use std::{path::Path, sync::Arc};

use serde::{Deserialize, Serialize};
use tokenizers::{
    pre_tokenizers::bert::BertPreTokenizer, OffsetReferential, OffsetType, PreTokenizedString,
    PreTokenizer,
};

use crate::error::{Error, Result};

/// A Hugging Face tokenizer definition in an artifact directory
pub const TOKENIZER_FILE: &str = "tokenizer.json";

/// Word tokenizer settings in an artifact directory
pub const WORD_TOKENIZER_FILE: &str = "word_tokenizer.json";

/// Splits a text into the tokens that are looked up in the pretrained vocabulary.
///
/// Implementations must be deterministic: identical input yields identical tokens.
pub trait Tokenize: Send + Sync {
    /// Tokenize a single text
    fn tokenize(&self, text: &str) -> Result<Vec<String>>;

    /// Write everything [`restore`] needs to rebuild this tokenizer into `dir`
    fn persist(&self, dir: &Path) -> Result<()>;
}

/// Rebuild the tokenizer a model directory was saved with
pub fn restore(dir: &Path) -> Result<Arc<dyn Tokenize>> {
    let pretrained = dir.join(TOKENIZER_FILE);
    if pretrained.exists() {
        let tokenizer = tokenizers::Tokenizer::from_file(&pretrained).map_err(|e| {
            Error::Format(format!("unable to load {}: {}", pretrained.display(), e))
        })?;

        return Ok(Arc::new(tokenizer));
    }

    let word = dir.join(WORD_TOKENIZER_FILE);
    if word.exists() {
        let json = std::fs::read_to_string(&word)?;
        let tokenizer: WordTokenizer = serde_json::from_str(&json)
            .map_err(|e| Error::Format(format!("invalid word tokenizer settings: {}", e)))?;

        return Ok(Arc::new(tokenizer));
    }

    Err(Error::Format(format!(
        "{} holds no tokenizer definition",
        dir.display()
    )))
}

/// Remove a definition left behind by a tokenizer of the other kind
fn remove_stale(path: &Path) -> Result<()> {
    if path.exists() {
        std::fs::remove_file(path)?;
    }

    Ok(())
}

/// Word-level tokenizer splitting on whitespace and punctuation, as word-vector sources expect
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordTokenizer {
    /// Lowercase text before splitting (GloVe vocabularies are lowercase)
    pub lowercase: bool,
}

impl Default for WordTokenizer {
    fn default() -> Self {
        Self { lowercase: true }
    }
}

impl WordTokenizer {
    /// Create a tokenizer that keeps the original casing
    pub fn cased() -> Self {
        Self { lowercase: false }
    }
}

impl Tokenize for WordTokenizer {
    fn tokenize(&self, text: &str) -> Result<Vec<String>> {
        let text = if self.lowercase {
            text.to_lowercase()
        } else {
            text.to_string()
        };

        let mut pretokenized = PreTokenizedString::from(text);
        BertPreTokenizer
            .pre_tokenize(&mut pretokenized)
            .map_err(|e| Error::Tokenizer(e.to_string()))?;

        Ok(pretokenized
            .get_splits(OffsetReferential::Original, OffsetType::Byte)
            .into_iter()
            .map(|(token, _, _)| token.to_string())
            .collect())
    }

    fn persist(&self, dir: &Path) -> Result<()> {
        let json =
            serde_json::to_string_pretty(self).map_err(|e| Error::Persistence(e.to_string()))?;
        std::fs::write(dir.join(WORD_TOKENIZER_FILE), json)?;

        remove_stale(&dir.join(TOKENIZER_FILE))
    }
}

/// A Hugging Face tokenizer, e.g. loaded from a `tokenizer.json` file
impl Tokenize for tokenizers::Tokenizer {
    fn tokenize(&self, text: &str) -> Result<Vec<String>> {
        let encoding = self
            .encode(text, false)
            .map_err(|e| Error::Tokenizer(e.to_string()))?;

        Ok(encoding.get_tokens().to_vec())
    }

    fn persist(&self, dir: &Path) -> Result<()> {
        self.save(dir.join(TOKENIZER_FILE), false)
            .map_err(|e| Error::Persistence(format!("unable to save the tokenizer: {}", e)))?;

        remove_stale(&dir.join(WORD_TOKENIZER_FILE))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_splits_words_and_punctuation() {
        let tokens = WordTokenizer::default()
            .tokenize("A good movie, really!")
            .unwrap();

        assert_eq!(tokens, vec!["a", "good", "movie", ",", "really", "!"]);
    }

    #[test]
    fn test_cased_tokenizer_keeps_case() {
        let tokens = WordTokenizer::cased().tokenize("Good Movie").unwrap();

        assert_eq!(tokens, vec!["Good", "Movie"]);
    }

    #[test]
    fn test_word_tokenizer_is_restored_with_its_casing() {
        let dir = std::env::temp_dir().join(format!("word-tokenizer-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        WordTokenizer::cased().persist(&dir).unwrap();
        let restored = restore(&dir).unwrap();
        std::fs::remove_dir_all(&dir).unwrap();

        assert_eq!(restored.tokenize("Good Movie").unwrap(), vec!["Good", "Movie"]);
    }

    #[test]
    fn test_missing_definition_is_a_format_error() {
        let dir = std::env::temp_dir().join(format!("no-tokenizer-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        let result = restore(&dir);
        std::fs::remove_dir_all(&dir).unwrap();

        assert!(matches!(result, Err(Error::Format(_))));
    }

    #[test]
    fn test_empty_text_has_no_tokens() {
        assert!(WordTokenizer::default().tokenize("   ").unwrap().is_empty());
        assert!(WordTokenizer::default().tokenize("").unwrap().is_empty());
    }
}
