use burn::data::dataset::{self, Dataset as _, InMemDataset};
use derive_new::new;
use serde::{Deserialize, Serialize};

/// Comma or tab separated files
pub mod delimited;

/// Seeded train/validation splits
pub mod split;

pub use delimited::ColumnsConfig;

/// A text to classify, with its label when known
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, new)]
pub struct Item {
    /// The text for classification
    pub text: String,

    /// The class name of the text
    pub label: Option<String>,
}

impl Item {
    /// A labeled item
    pub fn labeled(text: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(text.into(), Some(label.into()))
    }

    /// An item without a label
    pub fn unlabeled(text: impl Into<String>) -> Self {
        Self::new(text.into(), None)
    }
}

/// An in-memory dataset of texts
pub struct TextDataset {
    /// Underlying In-Memory dataset
    dataset: InMemDataset<Item>,
}

/// Implement the Dataset trait for the text dataset
impl dataset::Dataset<Item> for TextDataset {
    /// Returns a specific item from the dataset
    fn get(&self, index: usize) -> Option<Item> {
        self.dataset.get(index)
    }

    /// Returns the length of the dataset
    fn len(&self) -> usize {
        self.dataset.len()
    }
}

impl TextDataset {
    /// Wrap a list of items
    pub fn new(items: Vec<Item>) -> Self {
        Self {
            dataset: InMemDataset::new(items),
        }
    }

    /// Build a labeled dataset from parallel texts and labels
    pub fn labeled<T, L>(texts: T, labels: L) -> Self
    where
        T: IntoIterator,
        T::Item: Into<String>,
        L: IntoIterator,
        L::Item: Into<String>,
    {
        Self::new(
            texts
                .into_iter()
                .zip(labels)
                .map(|(text, label)| Item::labeled(text, label))
                .collect(),
        )
    }

    /// Build an unlabeled dataset
    pub fn unlabeled<T>(texts: T) -> Self
    where
        T: IntoIterator,
        T::Item: Into<String>,
    {
        Self::new(texts.into_iter().map(Item::unlabeled).collect())
    }

    /// All items in order
    pub fn items(&self) -> Vec<Item> {
        self.dataset.iter().collect()
    }

    /// All texts in order
    pub fn texts(&self) -> Vec<String> {
        self.dataset.iter().map(|item| item.text).collect()
    }

    /// Whether every item carries a label
    pub fn is_labeled(&self) -> bool {
        self.dataset.iter().all(|item| item.label.is_some())
    }

    /// Split off a seeded validation set holding `fraction` of the items
    pub fn split(&self, fraction: f64, seed: u64) -> (TextDataset, TextDataset) {
        let (train, valid) = split::split_validation(&self.items(), fraction, seed);

        (TextDataset::new(train), TextDataset::new(valid))
    }
}

#[cfg(test)]
mod tests {
    use burn::data::dataset::Dataset;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_labeled_dataset() {
        let dataset = TextDataset::labeled(["good movie", "bad movie"], ["pos", "neg"]);

        assert_eq!(dataset.len(), 2);
        assert!(dataset.is_labeled());
        assert_eq!(dataset.get(1), Some(Item::labeled("bad movie", "neg")));
        assert_eq!(dataset.texts(), vec!["good movie", "bad movie"]);
    }

    #[test]
    fn test_unlabeled_dataset() {
        let dataset = TextDataset::unlabeled(["a", "b", "c"]);

        assert_eq!(dataset.len(), 3);
        assert!(!dataset.is_labeled());
        assert_eq!(dataset.get(3), None);
    }
}
