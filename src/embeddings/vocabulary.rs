use std::collections::HashMap;

/// The id reserved for padding positions
pub const PAD_ID: usize = 0;

/// The id every out-of-vocabulary token maps to
pub const OOV_ID: usize = 1;

/// Display name of the padding entry
pub static PAD_TOKEN: &str = "<pad>";

/// Display name of the out-of-vocabulary entry
pub static OOV_TOKEN: &str = "<unk>";

/// A dense mapping from token strings to ids.
///
/// Id 0 is padding and id 1 is the out-of-vocabulary fallback. Pretrained tokens follow in
/// source order, so two loads of the same source always agree on every id. The reserved
/// entries are never reachable through [`Vocabulary::lookup`], even if the source happens to
/// contain a token spelled like one of them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Vocabulary {
    /// Tokens in id order, reserved entries included
    tokens: Vec<String>,

    /// A reverse map from pretrained tokens to their ids
    ids: HashMap<String, usize>,
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self {
            tokens: vec![PAD_TOKEN.to_string(), OOV_TOKEN.to_string()],
            ids: HashMap::new(),
        }
    }
}

impl Vocabulary {
    /// Create a vocabulary holding only the reserved entries
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a vocabulary from pretrained tokens in source order. Repeats keep their first id.
    pub fn from_tokens<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut vocabulary = Self::new();

        for token in tokens {
            vocabulary.insert(token.into());
        }

        vocabulary
    }

    /// Append a token, returning its id and whether it was newly added
    pub(crate) fn insert(&mut self, token: String) -> (usize, bool) {
        if let Some(&id) = self.ids.get(&token) {
            return (id, false);
        }

        let id = self.tokens.len();
        self.tokens.push(token.clone());
        self.ids.insert(token, id);

        (id, true)
    }

    /// Map a token to its id, falling back to [`OOV_ID`]
    pub fn lookup(&self, token: &str) -> usize {
        self.ids.get(token).copied().unwrap_or(OOV_ID)
    }

    /// Whether the token has a pretrained vector
    pub fn contains(&self, token: &str) -> bool {
        self.ids.contains_key(token)
    }

    /// The token stored at the given id
    pub fn token(&self, id: usize) -> Option<&str> {
        self.tokens.get(id).map(String::as_str)
    }

    /// All entries in id order, reserved entries first
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// Total number of ids, reserved entries included
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Whether the vocabulary has no pretrained tokens
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_ids_come_first() {
        let vocabulary = Vocabulary::from_tokens(["the", "movie"]);

        assert_eq!(vocabulary.len(), 4);
        assert_eq!(vocabulary.token(PAD_ID), Some(PAD_TOKEN));
        assert_eq!(vocabulary.token(OOV_ID), Some(OOV_TOKEN));
        assert_eq!(vocabulary.lookup("the"), 2);
        assert_eq!(vocabulary.lookup("movie"), 3);
    }

    #[test]
    fn test_lookup_is_stable() {
        let vocabulary = Vocabulary::from_tokens(["a", "b", "c"]);

        for token in ["a", "b", "c"] {
            let first = vocabulary.lookup(token);
            assert_eq!(vocabulary.lookup(token), first);
            assert_ne!(first, PAD_ID);
            assert_ne!(first, OOV_ID);
        }
    }

    #[test]
    fn test_unknown_tokens_map_to_oov() {
        let vocabulary = Vocabulary::from_tokens(["known"]);

        assert_eq!(vocabulary.lookup("unknown"), OOV_ID);
        assert_eq!(vocabulary.lookup(""), OOV_ID);
    }

    #[test]
    fn test_duplicates_keep_first_id() {
        let vocabulary = Vocabulary::from_tokens(["x", "y", "x"]);

        assert_eq!(vocabulary.len(), 4);
        assert_eq!(vocabulary.lookup("x"), 2);
    }

    #[test]
    fn test_reserved_spellings_do_not_collide() {
        let vocabulary = Vocabulary::from_tokens([OOV_TOKEN, PAD_TOKEN]);

        assert_eq!(vocabulary.lookup(OOV_TOKEN), 2);
        assert_eq!(vocabulary.lookup(PAD_TOKEN), 3);
    }
}
