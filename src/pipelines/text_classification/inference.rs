use burn::{data::dataloader::batcher::Batcher, tensor::backend::Backend};

use crate::{
    error::{Error, Result},
    models::Model,
    utils::tensors::into_rows,
};

use super::{
    batcher::{EmbeddedBatch, Sample, TextBatcher, TrainBatch},
    labels::LabelEncoder,
    metrics::{Accumulator, Evaluation},
};

/// The predicted class of one text
#[derive(Clone, Debug, PartialEq)]
pub struct Prediction {
    /// The most probable label
    pub label: String,

    /// Its class id
    pub class_id: usize,

    /// The probability of every class, in class id order
    pub probabilities: Vec<f32>,
}

/// Loss and accuracy of a model over labeled samples, batch by batch.
///
/// Runs the forward pass only; call it with `model.valid()` so dropout is disabled.
pub fn evaluate<B: Backend>(
    model: &Model<B>,
    samples: &[Sample],
    batcher: &TextBatcher<B>,
    batch_size: usize,
) -> Result<Evaluation> {
    let mut accumulator = Accumulator::default();

    for chunk in samples.chunks(batch_size.max(1)) {
        let batch: TrainBatch<B> = batcher.batch(chunk.to_vec());
        accumulator.add_output(model.forward_classification(batch)?);
    }

    Ok(accumulator.finish())
}

/// Class probabilities for each id sequence, one row per input in input order
pub fn infer<B: Backend>(
    model: &Model<B>,
    ids: &[Vec<usize>],
    batcher: &TextBatcher<B>,
    batch_size: usize,
) -> Result<Vec<Vec<f32>>> {
    let mut probabilities = Vec::with_capacity(ids.len());

    for chunk in ids.chunks(batch_size.max(1)) {
        let batch: EmbeddedBatch<B> = batcher.batch(chunk.to_vec());
        probabilities.extend(into_rows(model.infer(batch)?));
    }

    Ok(probabilities)
}

/// Pick the most probable label of every probability row
pub fn predictions(labels: &LabelEncoder, probabilities: Vec<Vec<f32>>) -> Result<Vec<Prediction>> {
    probabilities
        .into_iter()
        .map(|probabilities| {
            let class_id = argmax(&probabilities);
            let label = labels.decode(class_id).ok_or_else(|| {
                Error::shape(
                    format!("{} classes", labels.len()),
                    format!("{} probabilities", probabilities.len()),
                )
            })?;

            Ok(Prediction {
                label: label.to_string(),
                class_id,
                probabilities,
            })
        })
        .collect()
}

/// Index of the largest probability, the lowest index on ties
pub fn argmax(probabilities: &[f32]) -> usize {
    probabilities
        .iter()
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |(best, max), (i, &p)| {
            if p > max {
                (i, p)
            } else {
                (best, max)
            }
        })
        .0
}
