use burn::tensor::{backend::Backend, Tensor};

use crate::{
    error::{Error, Result},
    pipelines::text_classification::EmbeddedBatch,
};

use super::Summarize;

/// The averaged embedding is already the summary, so this encoder has no parameters
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BagOfWords {
    /// Width of the averaged vectors
    pub input_size: usize,
}

impl<B: Backend> Summarize<B> for BagOfWords {
    fn output_size(&self) -> usize {
        self.input_size
    }

    fn summarize(&self, input: EmbeddedBatch<B>) -> Result<Tensor<B, 2>> {
        match input {
            EmbeddedBatch::Pooled { vectors } => Ok(vectors),
            EmbeddedBatch::Sequence { vectors, .. } => Err(Error::shape(
                "pooled [batch, dim] vectors",
                format!("a sequence {:?}", vectors.dims()),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use burn::backend::NdArray;

    use super::*;
    use crate::utils::tensors::{from_values, into_rows};

    type TestBackend = NdArray;

    #[test]
    fn test_summary_is_the_input() {
        let device = Default::default();
        let vectors = from_values::<TestBackend, 2>(vec![0.5, 1.0, -1.0, 2.0], [2, 2], &device);

        let summary = BagOfWords { input_size: 2 }
            .summarize(EmbeddedBatch::Pooled { vectors })
            .unwrap();

        assert_eq!(into_rows(summary), vec![vec![0.5, 1.0], vec![-1.0, 2.0]]);
    }

    #[test]
    fn test_sequences_are_rejected() {
        let device = Default::default();
        let input = EmbeddedBatch::<TestBackend>::Sequence {
            vectors: Tensor::zeros([1, 3, 2], &device),
            mask: Tensor::ones([1, 3], &device),
        };

        assert!(matches!(
            BagOfWords { input_size: 2 }.summarize(input),
            Err(Error::Shape { .. })
        ));
    }
}
