use burn::{
    data::dataloader,
    tensor::{backend::Backend, Data, Int, Shape, Tensor},
};
use derive_new::new;

use super::Embedder;

/// The numeric form of a batch of texts, as produced by an [`Embedder`]
#[derive(Clone, Debug)]
pub enum EmbeddedBatch<B: Backend> {
    /// Padded vector sequences for sequence models
    Sequence {
        /// Pretrained vectors as 3D tensor: [batch_size, max_length, dim]
        vectors: Tensor<B, 3>,

        /// One on real tokens, zero on padding: [batch_size, max_length]
        mask: Tensor<B, 2>,
    },

    /// One averaged vector per text
    Pooled {
        /// Averaged vectors as 2D tensor: [batch_size, dim]
        vectors: Tensor<B, 2>,
    },
}

impl<B: Backend> EmbeddedBatch<B> {
    /// The dimensions of the vector tensor
    pub fn shape(&self) -> Vec<usize> {
        match self {
            EmbeddedBatch::Sequence { vectors, .. } => vectors.dims().to_vec(),
            EmbeddedBatch::Pooled { vectors } => vectors.dims().to_vec(),
        }
    }

    /// Number of texts in the batch
    pub fn batch_size(&self) -> usize {
        self.shape()[0]
    }
}

/// A training batch for text classification
#[derive(Clone, Debug, new)]
pub struct TrainBatch<B: Backend> {
    /// Embedded texts
    pub input: EmbeddedBatch<B>,

    /// Class ids for the batch
    pub targets: Tensor<B, 1, Int>,
}

/// A text whose tokens were already looked up, with its class id
#[derive(Clone, Debug, PartialEq, Eq, new)]
pub struct Sample {
    /// Vocabulary ids, before clipping or padding
    pub ids: Vec<usize>,

    /// The class id of the label
    pub target: usize,
}

/// Struct for batching text classification items
#[derive(Clone, new)]
pub struct TextBatcher<B: Backend> {
    /// Embedder for converting token ids to vectors
    embedder: Embedder,

    /// Device on which to perform computation (e.g., CPU or CUDA device)
    device: B::Device,
}

/// Implement Batcher trait for TextBatcher struct for inference
impl<B: Backend> dataloader::batcher::Batcher<Vec<usize>, EmbeddedBatch<B>> for TextBatcher<B> {
    /// Embeds a vector of id sequences into an inference batch
    fn batch(&self, items: Vec<Vec<usize>>) -> EmbeddedBatch<B> {
        self.embedder.embed_ids(&items, &self.device)
    }
}

/// Implement Batcher trait for TextBatcher struct for training
impl<B: Backend> dataloader::batcher::Batcher<Sample, TrainBatch<B>> for TextBatcher<B> {
    /// Collects a vector of samples into a training batch
    fn batch(&self, items: Vec<Sample>) -> TrainBatch<B> {
        let batch_size = items.len();

        let mut ids = Vec::with_capacity(batch_size);
        let mut targets = Vec::with_capacity(batch_size);

        for item in items {
            ids.push(item.ids);
            targets.push(item.target as i32);
        }

        let input = self.embedder.embed_ids(&ids, &self.device);
        let targets = Tensor::from_ints(Data::new(targets, Shape::new([batch_size])), &self.device);

        TrainBatch { input, targets }
    }
}
