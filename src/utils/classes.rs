use std::hash::Hash;

/// Invert a map by swapping keys and values
pub fn invert_map<K, V, MK, MV>(original: MK) -> MV
where
    K: Ord + Hash + Eq,
    V: Ord + Hash + Eq + Clone,
    MK: IntoIterator<Item = (K, V)>,
    MV: FromIterator<(V, K)>,
{
    original
        .into_iter()
        .map(|(key, value)| (value, key))
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    #[test]
    fn test_invert_enumerated_labels() {
        let labels = ["neg", "pos"];
        let inverted: BTreeMap<&str, usize> = invert_map(labels.iter().copied().enumerate());

        assert_eq!(inverted.get("neg"), Some(&0));
        assert_eq!(inverted.get("pos"), Some(&1));
    }
}
