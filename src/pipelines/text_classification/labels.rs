use std::{
    collections::{BTreeMap, BTreeSet},
    path::Path,
};

use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    utils::classes::invert_map,
};

/// A bidirectional mapping between label strings and dense class ids.
///
/// Ids follow the sorted order of the distinct labels, so identical training data always
/// produces identical ids.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct LabelEncoder {
    /// A mapping from class ids to class name labels
    id2label: Vec<String>,

    /// A mapping from class name labels to class ids
    label2id: BTreeMap<String, usize>,
}

impl LabelEncoder {
    /// Fit the encoder to the distinct labels of a training set
    pub fn fit<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let distinct = labels
            .into_iter()
            .map(|label| label.as_ref().to_string())
            .collect::<BTreeSet<_>>();

        Self::from(distinct.into_iter().collect::<Vec<_>>())
    }

    /// The class id of a label seen during fitting
    pub fn encode(&self, label: &str) -> Result<usize> {
        self.label2id
            .get(label)
            .copied()
            .ok_or_else(|| Error::UnknownLabel(label.to_string()))
    }

    /// The label of a class id, if in range
    pub fn decode(&self, id: usize) -> Option<&str> {
        self.id2label.get(id).map(String::as_str)
    }

    /// Labels in id order
    pub fn labels(&self) -> &[String] {
        &self.id2label
    }

    /// Number of classes
    pub fn len(&self) -> usize {
        self.id2label.len()
    }

    /// Whether no labels were seen
    pub fn is_empty(&self) -> bool {
        self.id2label.is_empty()
    }

    /// Save the labels as a JSON list
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| Error::Persistence(e.to_string()))?;
        std::fs::write(path, json)?;

        Ok(())
    }

    /// Load labels written by [`LabelEncoder::save`]
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;

        serde_json::from_str(&json).map_err(|e| Error::Format(format!("invalid labels: {}", e)))
    }
}

/// Labels are taken as-is, in the given order
impl From<Vec<String>> for LabelEncoder {
    fn from(id2label: Vec<String>) -> Self {
        let label2id = invert_map(id2label.iter().cloned().enumerate());

        Self { id2label, label2id }
    }
}

impl From<LabelEncoder> for Vec<String> {
    fn from(encoder: LabelEncoder) -> Self {
        encoder.id2label
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_ids_follow_sorted_order() {
        let encoder = LabelEncoder::fit(["pos", "neg", "pos", "neutral"]);

        assert_eq!(encoder.labels(), &["neg", "neutral", "pos"]);
        assert_eq!(encoder.encode("neg").unwrap(), 0);
        assert_eq!(encoder.encode("pos").unwrap(), 2);
    }

    #[test]
    fn test_round_trip() {
        let labels = ["sports", "politics", "science"];
        let encoder = LabelEncoder::fit(labels);

        for label in labels {
            assert_eq!(encoder.decode(encoder.encode(label).unwrap()), Some(label));
        }
    }

    #[test]
    fn test_unknown_label() {
        let encoder = LabelEncoder::fit(["a", "b"]);

        assert!(matches!(encoder.encode("c"), Err(Error::UnknownLabel(label)) if label == "c"));
        assert_eq!(encoder.decode(2), None);
    }

    #[test]
    fn test_fit_is_order_independent() {
        assert_eq!(
            LabelEncoder::fit(["b", "a", "c"]),
            LabelEncoder::fit(["c", "b", "a", "a"])
        );
    }

    #[test]
    fn test_json_is_a_plain_list() {
        let encoder = LabelEncoder::fit(["y", "x"]);
        let json = serde_json::to_string(&encoder).unwrap();

        assert_eq!(json, r#"["x","y"]"#);
        assert_eq!(serde_json::from_str::<LabelEncoder>(&json).unwrap(), encoder);
    }
}
