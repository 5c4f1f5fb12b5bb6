use std::{fmt::Display, sync::Arc};

use burn::tensor::backend::Backend;
use serde::{Deserialize, Serialize};

use crate::{
    embeddings::{Embeddings, PAD_ID},
    utils::tensors::from_values,
};

use super::{batcher::EmbeddedBatch, tfidf::TfIdfVectorizer};

/// Which tokens survive when a text is longer than the maximum sequence length
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClipPolicy {
    /// Keep the first `max_length` tokens
    #[default]
    Head,

    /// Keep the last `max_length` tokens
    Tail,
}

/// Turns token id sequences into fixed-length sequences of pretrained vectors
#[derive(Clone, Debug)]
pub struct SequenceEmbedder {
    embeddings: Arc<Embeddings>,
    max_length: usize,
    clip: ClipPolicy,
}

impl SequenceEmbedder {
    /// Creates a new sequence embedder
    pub fn new(embeddings: Arc<Embeddings>, max_length: usize, clip: ClipPolicy) -> Self {
        Self {
            embeddings,
            max_length,
            clip,
        }
    }

    /// Clip or right-pad ids to exactly `max_length` entries
    pub fn clip(&self, ids: &[usize]) -> Vec<usize> {
        let kept = if ids.len() <= self.max_length {
            ids
        } else {
            match self.clip {
                ClipPolicy::Head => &ids[..self.max_length],
                ClipPolicy::Tail => &ids[ids.len() - self.max_length..],
            }
        };

        let mut clipped = Vec::with_capacity(self.max_length);
        clipped.extend_from_slice(kept);
        clipped.resize(self.max_length, PAD_ID);

        clipped
    }

    /// Embed a batch as `[batch, max_length, dim]` vectors plus a `[batch, max_length]` mask
    /// that is one on real tokens and zero on padding
    pub fn embed_ids<B: Backend>(&self, ids: &[Vec<usize>], device: &B::Device) -> EmbeddedBatch<B> {
        let table = self.embeddings.table();
        let dim = table.dim();
        let batch_size = ids.len();

        let mut vectors = Vec::with_capacity(batch_size * self.max_length * dim);
        let mut mask = Vec::with_capacity(batch_size * self.max_length);

        for row in ids {
            for id in self.clip(row) {
                vectors.extend_from_slice(table.row(id));
                mask.push(if id == PAD_ID { 0.0 } else { 1.0 });
            }
        }

        EmbeddedBatch::Sequence {
            vectors: from_values(vectors, [batch_size, self.max_length, dim], device),
            mask: from_values(mask, [batch_size, self.max_length], device),
        }
    }

    /// The configured sequence length
    pub fn max_length(&self) -> usize {
        self.max_length
    }
}

/// Averages the pretrained vectors of a text into one vector
#[derive(Clone, Debug)]
pub struct BagOfWordsEmbedder {
    embeddings: Arc<Embeddings>,
}

impl BagOfWordsEmbedder {
    /// Creates a new bag-of-words embedder
    pub fn new(embeddings: Arc<Embeddings>) -> Self {
        Self { embeddings }
    }

    /// Elementwise mean of the rows of every non-padding id, zero when there are none
    pub fn mean(&self, ids: &[usize]) -> Vec<f32> {
        let table = self.embeddings.table();
        let mut sum = vec![0.0f32; table.dim()];
        let mut count = 0usize;

        for &id in ids.iter().filter(|&&id| id != PAD_ID) {
            for (total, value) in sum.iter_mut().zip(table.row(id)) {
                *total += value;
            }
            count += 1;
        }

        if count > 0 {
            sum.iter_mut().for_each(|total| *total /= count as f32);
        }

        sum
    }

    /// Embed a batch as `[batch, dim]` averaged vectors
    pub fn embed_ids<B: Backend>(&self, ids: &[Vec<usize>], device: &B::Device) -> EmbeddedBatch<B> {
        let dim = self.embeddings.dim();
        let vectors = ids.iter().flat_map(|row| self.mean(row)).collect();

        EmbeddedBatch::Pooled {
            vectors: from_values(vectors, [ids.len(), dim], device),
        }
    }
}

/// The embedding step in front of a classifier, chosen by its architecture
#[derive(Clone, Debug)]
pub enum Embedder {
    /// Padded id sequences for recurrent and convolutional models
    Sequence(SequenceEmbedder),

    /// Averaged vectors for bag-of-words models
    BagOfWords(BagOfWordsEmbedder),

    /// Weighted term counts for word-count models
    TfIdf(Arc<TfIdfVectorizer>),
}

impl Embedder {
    /// The shared pretrained embeddings, if the embedder uses any
    pub fn embeddings(&self) -> Option<&Arc<Embeddings>> {
        match self {
            Embedder::Sequence(embedder) => Some(&embedder.embeddings),
            Embedder::BagOfWords(embedder) => Some(&embedder.embeddings),
            Embedder::TfIdf(_) => None,
        }
    }

    /// Width of every embedded vector
    pub fn dim(&self) -> usize {
        match self {
            Embedder::Sequence(embedder) => embedder.embeddings.dim(),
            Embedder::BagOfWords(embedder) => embedder.embeddings.dim(),
            Embedder::TfIdf(vectorizer) => vectorizer.len(),
        }
    }

    /// Look up the ids of a token sequence, discarding empty tokens
    pub fn token_ids<S: AsRef<str>>(&self, tokens: &[S]) -> Vec<usize> {
        let embeddings = match self {
            Embedder::Sequence(embedder) => &embedder.embeddings,
            Embedder::BagOfWords(embedder) => &embedder.embeddings,
            Embedder::TfIdf(vectorizer) => return vectorizer.term_ids(tokens),
        };

        tokens
            .iter()
            .map(AsRef::as_ref)
            .filter(|token| !token.is_empty())
            .map(|token| embeddings.lookup(token))
            .collect()
    }

    /// Embed a batch of token sequences
    pub fn embed<B: Backend, S: AsRef<str>>(
        &self,
        texts: &[Vec<S>],
        device: &B::Device,
    ) -> EmbeddedBatch<B> {
        let ids = texts
            .iter()
            .map(|tokens| self.token_ids(tokens))
            .collect::<Vec<_>>();

        self.embed_ids(&ids, device)
    }

    /// Embed a batch of id sequences
    pub fn embed_ids<B: Backend>(&self, ids: &[Vec<usize>], device: &B::Device) -> EmbeddedBatch<B> {
        match self {
            Embedder::Sequence(embedder) => embedder.embed_ids(ids, device),
            Embedder::BagOfWords(embedder) => embedder.embed_ids(ids, device),
            Embedder::TfIdf(vectorizer) => vectorizer.embed_ids(ids, device),
        }
    }
}

impl Display for Embedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Embedder::Sequence(embedder) => write!(
                f,
                "Text sequence embedder: {}, {} tokens per text ({:?} clipping)",
                embedder.embeddings, embedder.max_length, embedder.clip
            ),
            Embedder::BagOfWords(embedder) => {
                write!(f, "Bag of words embedder: {}", embedder.embeddings)
            }
            Embedder::TfIdf(vectorizer) => write!(f, "{}", vectorizer),
        }
    }
}
