use burn::{
    module::Module,
    nn::loss::CrossEntropyLossConfig,
    tensor::{activation::softmax, backend::Backend, Tensor},
    train::ClassificationOutput,
};

use crate::{
    error::{Error, Result},
    pipelines::text_classification::{EmbeddedBatch, TrainBatch},
};

/// Architecture selection and encoder hyperparameters
pub mod config;

/// Recurrent encoder
pub mod recurrent;

/// Convolutional encoder
pub mod convolutional;

/// Bag-of-words encoder
pub mod bag_of_words;

/// Classification head
pub mod head;

pub use bag_of_words::BagOfWords;
pub use config::{ArchitectureConfig, CellKind, ConvolutionalConfig, RecurrentConfig};
pub use convolutional::Convolutional;
pub use head::{ClassificationHead, ClassificationHeadConfig};
pub use recurrent::Recurrent;

/// Turns an embedded batch into one fixed-width summary vector per text
pub trait Summarize<B: Backend> {
    /// Width of the summary
    fn output_size(&self) -> usize;

    /// Summarize a batch: [batch_size, output_size]
    fn summarize(&self, input: EmbeddedBatch<B>) -> Result<Tensor<B, 2>>;
}

/// The encoder selected by a model's architecture
#[derive(Debug)]
pub enum Encoder<'a, B: Backend> {
    /// Recurrent encoder
    Recurrent(&'a Recurrent<B>),

    /// Convolutional encoder
    Convolutional(&'a Convolutional<B>),

    /// Averaged embeddings used as they are
    BagOfWords(BagOfWords),
}

impl<B: Backend> Summarize<B> for Encoder<'_, B> {
    fn output_size(&self) -> usize {
        match self {
            Encoder::Recurrent(encoder) => encoder.output_size(),
            Encoder::Convolutional(encoder) => encoder.output_size(),
            Encoder::BagOfWords(encoder) => Summarize::<B>::output_size(encoder),
        }
    }

    fn summarize(&self, input: EmbeddedBatch<B>) -> Result<Tensor<B, 2>> {
        match self {
            Encoder::Recurrent(encoder) => encoder.summarize(input),
            Encoder::Convolutional(encoder) => encoder.summarize(input),
            Encoder::BagOfWords(encoder) => encoder.summarize(input),
        }
    }
}

/// A text classifier network: an architecture-specific encoder followed by the shared head.
///
/// Exactly one of the encoder fields is set for sequence architectures. Bag-of-words models
/// have neither and feed the averaged embedding straight into the head.
#[derive(Module, Debug)]
pub struct Model<B: Backend> {
    /// Recurrent encoder
    pub recurrent: Option<Recurrent<B>>,

    /// Convolutional encoder
    pub convolutional: Option<Convolutional<B>>,

    /// Dropout and output projection
    pub head: ClassificationHead<B>,

    /// Width of the embedded vectors
    pub input_size: usize,

    /// Sequence length expected by sequence encoders
    pub sequence_length: usize,
}

/// Define model behavior
impl<B: Backend> Model<B> {
    /// The encoder in front of the head
    pub fn encoder(&self) -> Encoder<'_, B> {
        if let Some(recurrent) = &self.recurrent {
            Encoder::Recurrent(recurrent)
        } else if let Some(convolutional) = &self.convolutional {
            Encoder::Convolutional(convolutional)
        } else {
            Encoder::BagOfWords(BagOfWords {
                input_size: self.input_size,
            })
        }
    }

    /// Number of classes
    pub fn n_classes(&self) -> usize {
        self.head.n_classes()
    }

    /// Compare the stored weights with the sizes the model was built for.
    ///
    /// Loading a record replaces parameters without looking at their shapes, so this is checked
    /// after every restore.
    pub fn check_weights(&self) -> Result<()> {
        let [summary_size, n_classes] = self.head.weight_dims();

        let input_size = match self.encoder() {
            Encoder::Recurrent(encoder) => encoder.input_size(),
            Encoder::Convolutional(encoder) => encoder.input_size(),
            Encoder::BagOfWords(_) => Some(summary_size),
        };

        if input_size != Some(self.input_size) {
            return Err(Error::shape(
                format!("weights for {}-dimensional embeddings", self.input_size),
                format!("weights for {:?}-dimensional embeddings", input_size),
            ));
        }

        let expected = [self.encoder().output_size(), self.n_classes()];
        if [summary_size, n_classes] != expected {
            return Err(Error::shape(
                format!("an output layer of shape {:?}", expected),
                format!("{:?}", [summary_size, n_classes]),
            ));
        }

        Ok(())
    }

    /// Reject batches whose vector width or sequence length differs from the built model
    pub fn check_input(&self, input: &EmbeddedBatch<B>) -> Result<()> {
        match input {
            EmbeddedBatch::Sequence { vectors, .. } => {
                let [_, length, dim] = vectors.dims();

                if dim != self.input_size || length != self.sequence_length {
                    return Err(Error::shape(
                        format!("[batch, {}, {}]", self.sequence_length, self.input_size),
                        format!("{:?}", vectors.dims()),
                    ));
                }
            }
            EmbeddedBatch::Pooled { vectors } => {
                let [_, dim] = vectors.dims();

                if dim != self.input_size {
                    return Err(Error::shape(
                        format!("[batch, {}]", self.input_size),
                        format!("{:?}", vectors.dims()),
                    ));
                }
            }
        }

        Ok(())
    }

    /// Class logits: [batch_size, n_classes]
    pub fn forward(&self, input: EmbeddedBatch<B>) -> Result<Tensor<B, 2>> {
        self.check_input(&input)?;

        let summary = self.encoder().summarize(input)?;

        Ok(self.head.forward(summary))
    }

    /// Defines forward pass for training
    pub fn forward_classification(&self, batch: TrainBatch<B>) -> Result<ClassificationOutput<B>> {
        let targets = batch.targets;
        let output = self.forward(batch.input)?;

        let loss = CrossEntropyLossConfig::new()
            .init(&output.device())
            .forward(output.clone(), targets.clone());

        Ok(ClassificationOutput {
            loss,
            output,
            targets,
        })
    }

    /// Defines forward pass for inference: class probabilities, [batch_size, n_classes]
    pub fn infer(&self, input: EmbeddedBatch<B>) -> Result<Tensor<B, 2>> {
        Ok(softmax(self.forward(input)?, 1))
    }
}

#[cfg(test)]
mod tests {
    use burn::{backend::NdArray, tensor::Data};

    use super::*;
    use crate::utils::tensors::into_rows;

    type TestBackend = NdArray;

    fn sequence(batch_size: usize, length: usize, dim: usize) -> EmbeddedBatch<TestBackend> {
        let device = Default::default();

        EmbeddedBatch::Sequence {
            vectors: Tensor::ones([batch_size, length, dim], &device),
            mask: Tensor::ones([batch_size, length], &device),
        }
    }

    #[test]
    fn test_every_architecture_produces_probabilities() {
        let device = Default::default();

        for architecture in [
            ArchitectureConfig::recurrent(),
            ArchitectureConfig::convolutional(),
        ] {
            let model = architecture
                .init::<TestBackend>(4, 6, 3, 0.0, &device)
                .unwrap();
            let probabilities = into_rows(model.infer(sequence(2, 6, 4)).unwrap());

            for row in probabilities {
                assert_eq!(row.len(), 3);
                assert!((row.iter().sum::<f32>() - 1.0).abs() < 1e-5);
            }
        }

        let model = ArchitectureConfig::BagOfWords
            .init::<TestBackend>(4, 6, 3, 0.0, &device)
            .unwrap();
        let input = EmbeddedBatch::Pooled {
            vectors: Tensor::ones([2, 4], &device),
        };

        assert_eq!(model.infer(input).unwrap().dims(), [2, 3]);
    }

    #[test]
    fn test_mismatched_input_is_a_shape_error() {
        let device = Default::default();
        let model = ArchitectureConfig::recurrent()
            .init::<TestBackend>(4, 6, 2, 0.0, &device)
            .unwrap();

        assert!(matches!(model.forward(sequence(1, 5, 4)), Err(Error::Shape { .. })));
        assert!(matches!(model.forward(sequence(1, 6, 3)), Err(Error::Shape { .. })));

        let pooled = EmbeddedBatch::Pooled {
            vectors: Tensor::ones([1, 4], &device),
        };
        assert!(matches!(model.forward(pooled), Err(Error::Shape { .. })));
    }

    #[test]
    fn test_weights_of_another_width_are_rejected() {
        let device = Default::default();
        let model = ArchitectureConfig::convolutional()
            .init::<TestBackend>(4, 6, 2, 0.0, &device)
            .unwrap();
        assert!(model.check_weights().is_ok());

        let wider = ArchitectureConfig::convolutional()
            .init::<TestBackend>(5, 6, 2, 0.0, &device)
            .unwrap();
        let model = model.load_record(wider.into_record());

        assert!(matches!(model.check_weights(), Err(Error::Shape { .. })));
    }

    #[test]
    fn test_classification_output_carries_targets() {
        let device = Default::default();
        let model = ArchitectureConfig::BagOfWords
            .init::<TestBackend>(2, 1, 2, 0.0, &device)
            .unwrap();

        let batch = TrainBatch::new(
            EmbeddedBatch::Pooled {
                vectors: Tensor::ones([3, 2], &device),
            },
            Tensor::from_ints(Data::from([0, 1, 1]), &device),
        );

        let output = model.forward_classification(batch).unwrap();

        assert_eq!(output.output.dims(), [3, 2]);
        assert!(output.loss.into_scalar() > 0.0);
    }
}
