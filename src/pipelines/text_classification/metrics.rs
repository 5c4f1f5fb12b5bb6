use std::fmt::Display;

use burn::{
    data::dataloader::Progress,
    tensor::backend::Backend,
    train::{
        metric::{
            AccuracyInput, AccuracyMetric, Adaptor, LossInput, LossMetric, Metric,
            MetricMetadata, Numeric,
        },
        ClassificationOutput,
    },
};
use serde::{Deserialize, Serialize};

/// Loss and accuracy over a dataset
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    /// Mean cross-entropy per sample
    pub loss: f64,

    /// Fraction of samples whose most probable class is the true class
    pub accuracy: f64,

    /// Number of samples evaluated
    pub samples: usize,
}

impl Display for Evaluation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "acc: {:.4} - loss: {:.4}", self.accuracy, self.loss)
    }
}

/// Sums batch results into a sample-weighted [`Evaluation`].
///
/// The per-batch numbers come from burn's accuracy and loss metrics.
#[derive(Default)]
pub struct Accumulator<B: Backend> {
    accuracy: AccuracyMetric<B>,
    loss: LossMetric<B>,
    loss_sum: f64,
    correct: usize,
    samples: usize,
    iteration: usize,
}

impl<B: Backend> Accumulator<B> {
    /// Add one batch whose loss is the batch mean
    pub fn add(&mut self, mean_loss: f64, correct: usize, batch_size: usize) {
        self.loss_sum += mean_loss * batch_size as f64;
        self.correct += correct;
        self.samples += batch_size;
    }

    /// Add the output of a classification forward pass
    pub fn add_output(&mut self, output: ClassificationOutput<B>) {
        let [batch_size, _] = output.output.dims();
        self.iteration += 1;

        let metadata = MetricMetadata {
            progress: Progress {
                items_processed: self.samples + batch_size,
                items_total: self.samples + batch_size,
            },
            epoch: 1,
            epoch_total: 1,
            iteration: self.iteration,
            lr: None,
        };

        let input: AccuracyInput<B> = output.adapt();
        self.accuracy.update(&input, &metadata);

        let input: LossInput<B> = output.adapt();
        self.loss.update(&input, &metadata);

        // The accuracy metric reports a percentage of the batch
        let correct = (self.accuracy.value() / 100.0 * batch_size as f64).round() as usize;

        self.add(self.loss.value(), correct, batch_size);
    }
    /// Number of samples seen so far
    pub fn samples(&self) -> usize {
        self.samples
    }

    /// The weighted means, zero for an empty dataset
    pub fn finish(&self) -> Evaluation {
        if self.samples == 0 {
            return Evaluation::default();
        }

        Evaluation {
            loss: self.loss_sum / self.samples as f64,
            accuracy: self.correct as f64 / self.samples as f64,
            samples: self.samples,
        }
    }
}

#[cfg(test)]
mod tests {
    use burn::{
        backend::NdArray,
        tensor::{Data, Tensor},
    };
    use pretty_assertions::assert_eq;

    use super::*;

    type TestBackend = NdArray;

    #[test]
    fn test_batches_are_weighted_by_size() {
        let mut accumulator = Accumulator::<TestBackend>::default();
        accumulator.add(1.0, 3, 3);
        accumulator.add(4.0, 0, 1);

        let evaluation = accumulator.finish();

        assert_eq!(evaluation.samples, 4);
        assert!((evaluation.loss - 1.75).abs() < 1e-12);
        assert!((evaluation.accuracy - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_empty_dataset() {
        assert_eq!(Accumulator::<TestBackend>::default().finish(), Evaluation::default());
    }

    #[test]
    fn test_counts_correct_predictions() {
        let device = Default::default();
        let output = ClassificationOutput {
            loss: Tensor::<TestBackend, 1>::from_floats([0.5], &device),
            output: Tensor::from_floats([[2.0, 1.0], [0.0, 3.0], [1.0, 0.0]], &device),
            targets: Tensor::from_ints(Data::from([0, 1, 1]), &device),
        };

        let mut accumulator = Accumulator::<TestBackend>::default();
        accumulator.add_output(output);
        let evaluation = accumulator.finish();

        assert_eq!(evaluation.samples, 3);
        assert!((evaluation.accuracy - 2.0 / 3.0).abs() < 1e-9);
        assert!((evaluation.loss - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_display() {
        let evaluation = Evaluation {
            loss: 0.25,
            accuracy: 0.5,
            samples: 2,
        };

        assert_eq!(evaluation.to_string(), "acc: 0.5000 - loss: 0.2500");
    }
}
