use std::{
    collections::{BTreeMap, BTreeSet},
    fmt::Display,
    path::Path,
};

use burn::{config::Config, tensor::backend::Backend};
use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    utils::tensors::from_values,
};

use super::batcher::EmbeddedBatch;

/// Vectorizer state in an artifact directory
pub const TFIDF_FILE: &str = "tfidf.json";

/// Common English words that carry no class signal
pub const ENGLISH_STOP_WORDS: &[&str] = &[
    "a", "about", "above", "across", "after", "afterwards", "again", "against", "all", "almost",
    "alone", "along", "already", "also", "although", "always", "am", "among", "amongst",
    "amoungst", "amount", "an", "and", "another", "any", "anyhow", "anyone", "anything", "anyway",
    "anywhere", "are", "around", "as", "at", "back", "be", "became", "because", "become",
    "becomes", "becoming", "been", "before", "beforehand", "behind", "being", "below", "beside",
    "besides", "between", "beyond", "bill", "both", "bottom", "but", "by", "call", "can",
    "cannot", "cant", "co", "con", "could", "couldnt", "cry", "de", "describe", "detail", "do",
    "done", "down", "due", "during", "each", "eg", "eight", "either", "eleven", "else",
    "elsewhere", "empty", "enough", "etc", "even", "ever", "every", "everyone", "everything",
    "everywhere", "except", "few", "fifteen", "fifty", "fill", "find", "fire", "first", "five",
    "for", "former", "formerly", "forty", "found", "four", "from", "front", "full", "further",
    "get", "give", "go", "had", "has", "hasnt", "have", "he", "hence", "her", "here", "hereafter",
    "hereby", "herein", "hereupon", "hers", "herself", "him", "himself", "his", "how", "however",
    "hundred", "i", "ie", "if", "in", "inc", "indeed", "interest", "into", "is", "it", "its",
    "itself", "keep", "last", "latter", "latterly", "least", "less", "ltd", "made", "many", "may",
    "me", "meanwhile", "might", "mill", "mine", "more", "moreover", "most", "mostly", "move",
    "much", "must", "my", "myself", "name", "namely", "neither", "never", "nevertheless", "next",
    "nine", "no", "nobody", "none", "noone", "nor", "not", "nothing", "now", "nowhere", "of",
    "off", "often", "on", "once", "one", "only", "onto", "or", "other", "others", "otherwise",
    "our", "ours", "ourselves", "out", "over", "own", "part", "per", "perhaps", "please", "put",
    "rather", "re", "same", "see", "seem", "seemed", "seeming", "seems", "serious", "several",
    "she", "should", "show", "side", "since", "sincere", "six", "sixty", "so", "some", "somehow",
    "someone", "something", "sometime", "sometimes", "somewhere", "still", "such", "system",
    "take", "ten", "than", "that", "the", "their", "them", "themselves", "then", "thence",
    "there", "thereafter", "thereby", "therefore", "therein", "thereupon", "these", "they",
    "thick", "thin", "third", "this", "those", "though", "three", "through", "throughout",
    "thru", "thus", "to", "together", "too", "top", "toward", "towards", "twelve", "twenty",
    "two", "un", "under", "until", "up", "upon", "us", "very", "via", "was", "we", "well",
    "were", "what", "whatever", "when", "whence", "whenever", "where", "whereafter", "whereas",
    "whereby", "wherein", "whereupon", "wherever", "whether", "which", "while", "whither", "who",
    "whoever", "whole", "whom", "whose", "why", "will", "with", "within", "without", "would",
    "yet", "you", "your", "yours", "yourself", "yourselves",
];

/// Whether a token is an English stop word, ignoring case
pub fn is_stop_word(token: &str) -> bool {
    ENGLISH_STOP_WORDS.contains(&token.to_lowercase().as_str())
}

/// Configuration of the TF-IDF vectorizer
#[derive(Config, Debug)]
pub struct TfIdfConfig {
    /// Replace a term count `tf` with `1 + ln(tf)`
    #[config(default = true)]
    pub sublinear_tf: bool,

    /// Drop English stop words from the vocabulary
    #[config(default = true)]
    pub stop_words: bool,

    /// Minimum number of training documents a term must occur in
    #[config(default = 1)]
    pub min_df: usize,

    /// Keep only the most frequent terms
    #[config(default = "None")]
    pub max_features: Option<usize>,
}

/// Maps token sequences to L2-normalized TF-IDF vectors over a vocabulary learned from training
/// documents
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TfIdfVectorizer {
    /// Term to column, in alphabetical order
    terms: BTreeMap<String, usize>,

    /// Smoothed inverse document frequency per column
    idf: Vec<f32>,

    sublinear_tf: bool,
}

impl TfIdfVectorizer {
    /// Learn the vocabulary and document frequencies of tokenized training documents
    pub fn fit<S: AsRef<str>>(documents: &[Vec<S>], config: &TfIdfConfig) -> Result<Self> {
        let mut document_frequency = BTreeMap::<&str, usize>::new();
        let mut total_frequency = BTreeMap::<&str, usize>::new();

        for document in documents {
            let mut seen = BTreeSet::new();

            for token in document.iter().map(|token| token.as_ref()) {
                if token.is_empty() || (config.stop_words && is_stop_word(token)) {
                    continue;
                }

                *total_frequency.entry(token).or_default() += 1;
                if seen.insert(token) {
                    *document_frequency.entry(token).or_default() += 1;
                }
            }
        }

        let mut kept = document_frequency
            .iter()
            .filter(|(_, &df)| df >= config.min_df)
            .map(|(&term, &df)| (term, df))
            .collect::<Vec<_>>();

        if let Some(max_features) = config.max_features {
            // Most frequent first, alphabetical among ties
            kept.sort_by(|(left, _), (right, _)| {
                total_frequency[right]
                    .cmp(&total_frequency[left])
                    .then_with(|| left.cmp(right))
            });
            kept.truncate(max_features);
            kept.sort_by(|(left, _), (right, _)| left.cmp(right));
        }

        if kept.is_empty() {
            return Err(Error::Configuration(
                "the training documents leave no terms for the TF-IDF vocabulary".to_string(),
            ));
        }

        let n = documents.len() as f32;
        let terms = kept
            .iter()
            .enumerate()
            .map(|(id, (term, _))| (term.to_string(), id))
            .collect();
        let idf = kept
            .iter()
            .map(|(_, df)| ((1.0 + n) / (1.0 + *df as f32)).ln() + 1.0)
            .collect();

        Ok(Self {
            terms,
            idf,
            sublinear_tf: config.sublinear_tf,
        })
    }

    /// Number of terms, the width of every vector
    pub fn len(&self) -> usize {
        self.idf.len()
    }

    /// Whether the vocabulary is empty
    pub fn is_empty(&self) -> bool {
        self.idf.is_empty()
    }

    /// The column of a known term
    pub fn term_id(&self, term: &str) -> Option<usize> {
        self.terms.get(term).copied()
    }

    /// Columns of the known tokens of a sequence, one entry per occurrence
    pub fn term_ids<S: AsRef<str>>(&self, tokens: &[S]) -> Vec<usize> {
        tokens
            .iter()
            .filter_map(|token| self.term_id(token.as_ref()))
            .collect()
    }

    /// Weight the term counts of one document by their idf and scale to unit length.
    ///
    /// A document without known terms maps to the zero vector.
    pub fn transform(&self, ids: &[usize]) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.len()];

        for &id in ids.iter().filter(|&&id| id < self.len()) {
            vector[id] += 1.0;
        }

        for (weight, idf) in vector.iter_mut().zip(&self.idf) {
            if *weight > 0.0 {
                let tf = if self.sublinear_tf {
                    1.0 + weight.ln()
                } else {
                    *weight
                };
                *weight = tf * idf;
            }
        }

        let norm = vector.iter().map(|weight| weight * weight).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|weight| *weight /= norm);
        }

        vector
    }

    /// Embed a batch as `[batch, terms]` TF-IDF vectors
    pub fn embed_ids<B: Backend>(&self, ids: &[Vec<usize>], device: &B::Device) -> EmbeddedBatch<B> {
        let vectors = ids.iter().flat_map(|row| self.transform(row)).collect();

        EmbeddedBatch::Pooled {
            vectors: from_values(vectors, [ids.len(), self.len()], device),
        }
    }

    /// Write the vocabulary and weights to [`TFIDF_FILE`] in `dir`
    pub fn save(&self, dir: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string(self).map_err(|e| Error::Persistence(e.to_string()))?;
        std::fs::write(dir.as_ref().join(TFIDF_FILE), json)?;

        Ok(())
    }

    /// Load a vectorizer written by [`save`](Self::save)
    pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(dir.as_ref().join(TFIDF_FILE))?;
        let vectorizer: Self = serde_json::from_str(&json)
            .map_err(|e| Error::Format(format!("unable to load the TF-IDF vocabulary: {}", e)))?;

        if vectorizer.terms.len() != vectorizer.idf.len()
            || vectorizer.terms.values().any(|&id| id >= vectorizer.idf.len())
        {
            return Err(Error::Format(
                "the TF-IDF terms and weights do not match".to_string(),
            ));
        }

        Ok(vectorizer)
    }
}

impl Display for TfIdfVectorizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TF-IDF vectorizer: {} terms", self.len())?;

        if self.sublinear_tf {
            write!(f, " (sublinear tf)")?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn documents() -> Vec<Vec<&'static str>> {
        vec![
            vec!["the", "good", "movie"],
            vec!["a", "bad", "movie"],
            vec!["good", "good", "plot"],
        ]
    }

    #[test]
    fn test_vocabulary_is_alphabetical_without_stop_words() {
        let vectorizer = TfIdfVectorizer::fit(&documents(), &TfIdfConfig::new()).unwrap();

        assert_eq!(vectorizer.len(), 4);
        assert_eq!(vectorizer.term_id("bad"), Some(0));
        assert_eq!(vectorizer.term_id("plot"), Some(3));
        assert_eq!(vectorizer.term_id("the"), None);
    }

    #[test]
    fn test_stop_words_can_be_kept() {
        let config = TfIdfConfig::new().with_stop_words(false);
        let vectorizer = TfIdfVectorizer::fit(&documents(), &config).unwrap();

        assert_eq!(vectorizer.len(), 6);
        assert!(vectorizer.term_id("the").is_some());
    }

    #[test]
    fn test_rarer_terms_weigh_more() {
        let vectorizer = TfIdfVectorizer::fit(&documents(), &TfIdfConfig::new()).unwrap();

        let ids = vectorizer.term_ids(&["bad", "movie"]);
        let vector = vectorizer.transform(&ids);

        assert!(vector[0] > vector[2]);
    }

    #[test]
    fn test_vectors_have_unit_length() {
        let vectorizer = TfIdfVectorizer::fit(&documents(), &TfIdfConfig::new()).unwrap();

        let ids = vectorizer.term_ids(&["good", "good", "movie", "unseen"]);
        let norm = vectorizer
            .transform(&ids)
            .iter()
            .map(|weight| weight * weight)
            .sum::<f32>();

        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_unknown_document_is_zero() {
        let vectorizer = TfIdfVectorizer::fit(&documents(), &TfIdfConfig::new()).unwrap();

        assert_eq!(vectorizer.transform(&vectorizer.term_ids(&["unseen"])), vec![0.0; 4]);
    }

    #[test]
    fn test_sublinear_counts_dampen_repetition() {
        let document = ["good", "good", "good", "movie"];
        let ratio = |sublinear_tf| {
            let config = TfIdfConfig::new().with_sublinear_tf(sublinear_tf);
            let vectorizer = TfIdfVectorizer::fit(&[document.to_vec()], &config).unwrap();
            let vector = vectorizer.transform(&vectorizer.term_ids(&document));

            vector[0] / vector[1]
        };

        assert!((ratio(false) - 3.0).abs() < 1e-5);
        assert!((ratio(true) - (1.0 + 3f32.ln())).abs() < 1e-5);
    }

    #[test]
    fn test_max_features_keeps_the_most_frequent_terms() {
        let config = TfIdfConfig::new().with_max_features(Some(2));
        let vectorizer = TfIdfVectorizer::fit(&documents(), &config).unwrap();

        assert_eq!(vectorizer.len(), 2);
        assert_eq!(vectorizer.term_id("good"), Some(0));
        assert_eq!(vectorizer.term_id("movie"), Some(1));
    }

    #[test]
    fn test_min_df_drops_rare_terms() {
        let config = TfIdfConfig::new().with_min_df(2);
        let vectorizer = TfIdfVectorizer::fit(&documents(), &config).unwrap();

        assert_eq!(vectorizer.len(), 2);
        assert_eq!(vectorizer.term_id("bad"), None);
    }

    #[test]
    fn test_only_stop_words_is_a_configuration_error() {
        let result = TfIdfVectorizer::fit(&[vec!["the", "a"]], &TfIdfConfig::new());

        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[test]
    fn test_saved_vectorizer_is_restored() {
        let dir = std::env::temp_dir().join(format!("tfidf-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        let vectorizer = TfIdfVectorizer::fit(&documents(), &TfIdfConfig::new()).unwrap();
        vectorizer.save(&dir).unwrap();
        let restored = TfIdfVectorizer::load(&dir).unwrap();

        std::fs::remove_dir_all(&dir).unwrap();

        assert_eq!(restored, vectorizer);
    }
}
