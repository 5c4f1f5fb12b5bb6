use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

/// Split items into (train, validation) parts.
///
/// The validation part holds `fraction` of the items, rounded, drawn by a permutation seeded with
/// `seed`. At least one item always stays in the training part. Both parts keep the original
/// relative order of their items.
pub fn split_validation<T: Clone>(items: &[T], fraction: f64, seed: u64) -> (Vec<T>, Vec<T>) {
    let len = items.len();
    let n_valid = ((len as f64 * fraction).round() as usize).min(len.saturating_sub(1));

    let mut indices = (0..len).collect::<Vec<_>>();
    indices.shuffle(&mut StdRng::seed_from_u64(seed));

    let mut in_valid = vec![false; len];
    for &i in &indices[..n_valid] {
        in_valid[i] = true;
    }

    let mut train = Vec::with_capacity(len - n_valid);
    let mut valid = Vec::with_capacity(n_valid);

    for (item, is_valid) in items.iter().zip(in_valid) {
        if is_valid {
            valid.push(item.clone());
        } else {
            train.push(item.clone());
        }
    }

    (train, valid)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_sizes() {
        let items = (0..10).collect::<Vec<_>>();
        let (train, valid) = split_validation(&items, 0.2, 42);

        assert_eq!(train.len(), 8);
        assert_eq!(valid.len(), 2);
    }

    #[test]
    fn test_parts_cover_every_item_in_order() {
        let items = (0..25).collect::<Vec<_>>();
        let (train, valid) = split_validation(&items, 0.3, 1);

        assert!(train.windows(2).all(|pair| pair[0] < pair[1]));
        assert!(valid.windows(2).all(|pair| pair[0] < pair[1]));

        let mut all = train.into_iter().chain(valid).collect::<Vec<_>>();
        all.sort();
        assert_eq!(all, items);
    }

    #[test]
    fn test_same_seed_same_split() {
        let items = (0..40).collect::<Vec<_>>();

        assert_eq!(split_validation(&items, 0.25, 9), split_validation(&items, 0.25, 9));
    }

    #[test]
    fn test_training_part_is_never_empty() {
        let (train, valid) = split_validation(&[1], 0.9, 0);

        assert_eq!(train, vec![1]);
        assert!(valid.is_empty());
    }
}
