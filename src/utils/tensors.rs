use burn::tensor::{backend::Backend, Data, Shape, Tensor};

/// Build a float tensor from row-major values
pub fn from_values<B: Backend, const D: usize>(
    values: Vec<f32>,
    shape: [usize; D],
    device: &B::Device,
) -> Tensor<B, D> {
    Tensor::from_floats(Data::new(values, Shape::new(shape)), device)
}

/// Copy a matrix back into one `Vec` per row
pub fn into_rows<B: Backend>(tensor: Tensor<B, 2>) -> Vec<Vec<f32>> {
    let [_, columns] = tensor.dims();

    tensor
        .into_data()
        .convert::<f32>()
        .value
        .chunks(columns.max(1))
        .map(<[f32]>::to_vec)
        .collect()
}

/// Keep `update` where `mask` is one and `previous` where it is zero
pub fn blend<B: Backend, const D: usize>(
    update: Tensor<B, D>,
    previous: Tensor<B, D>,
    mask: Tensor<B, D>,
) -> Tensor<B, D> {
    previous.clone() + (update - previous) * mask
}

#[cfg(test)]
mod tests {
    use burn::backend::NdArray;

    use super::*;

    type TestBackend = NdArray;

    #[test]
    fn test_rows_round_trip() {
        let device = Default::default();
        let tensor = from_values::<TestBackend, 2>(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], [2, 3], &device);

        assert_eq!(
            into_rows(tensor),
            vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]
        );
    }

    #[test]
    fn test_blend_selects_by_mask() {
        let device = Default::default();
        let update = from_values::<TestBackend, 2>(vec![1.0, 1.0], [2, 1], &device);
        let previous = from_values::<TestBackend, 2>(vec![5.0, 5.0], [2, 1], &device);
        let mask = from_values::<TestBackend, 2>(vec![1.0, 0.0], [2, 1], &device);

        assert_eq!(
            into_rows(blend(update, previous, mask)),
            vec![vec![1.0], vec![5.0]]
        );
    }
}
