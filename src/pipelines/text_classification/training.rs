use burn::{
    data::dataloader::batcher::Batcher,
    module::AutodiffModule,
    optim::{AdamConfig, AdamWConfig, GradientsParams, Optimizer, SgdConfig},
    tensor::backend::AutodiffBackend,
    train::TrainingInterrupter,
};
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

use crate::{error::Result, models::Model};

use super::{
    batcher::{Sample, TextBatcher, TrainBatch},
    config::{OptimizerKind, TrainingConfig},
    history::{EpochMetrics, TrainingHistory},
    inference::evaluate,
    metrics::Accumulator,
};

/// Group sample indices into batches for one epoch.
///
/// Batches have `batch_size` entries except possibly the last. With `shuffle`, the order is a
/// permutation drawn from `seed` and the epoch number, so a given dataset, seed and epoch always
/// produce the same batches.
pub fn batch_indices(
    len: usize,
    batch_size: usize,
    epoch: usize,
    seed: u64,
    shuffle: bool,
) -> Vec<Vec<usize>> {
    let mut indices = (0..len).collect::<Vec<_>>();

    if shuffle {
        let mut rng = StdRng::seed_from_u64(seed.wrapping_add(epoch as u64));
        indices.shuffle(&mut rng);
    }

    indices
        .chunks(batch_size.max(1))
        .map(<[usize]>::to_vec)
        .collect()
}

/// Everything a fit run reads besides the model
pub struct Fit<'a, B: AutodiffBackend> {
    /// Batcher producing autodiff batches for the training pass
    pub batcher: &'a TextBatcher<B>,

    /// Batcher producing inner-backend batches for validation
    pub valid_batcher: &'a TextBatcher<B::InnerBackend>,

    /// Training samples
    pub train: &'a [Sample],

    /// Validation samples, if validating after every epoch
    pub valid: Option<&'a [Sample]>,

    /// Training hyperparameters
    pub config: &'a TrainingConfig,

    /// Stops the run between epochs when triggered
    pub interrupter: &'a TrainingInterrupter,
}

/// Define train function
pub fn train<B: AutodiffBackend>(
    model: Model<B>,
    fit: Fit<'_, B>,
) -> Result<(Model<B>, TrainingHistory)> {
    let config = fit.config;

    B::seed(config.seed);

    match config.optimizer {
        OptimizerKind::Adam => {
            let optim = AdamConfig::new()
                .with_epsilon(config.adam_epsilon)
                .init::<B, Model<B>>();
            run(model, optim, fit)
        }
        OptimizerKind::AdamW => {
            let optim = AdamWConfig::new()
                .with_epsilon(config.adam_epsilon)
                .init::<B, Model<B>>();
            run(model, optim, fit)
        }
        OptimizerKind::Sgd => {
            let optim = SgdConfig::new().init::<B, Model<B>>();
            run(model, optim, fit)
        }
    }
}

fn run<B, O>(
    mut model: Model<B>,
    mut optim: O,
    fit: Fit<'_, B>,
) -> Result<(Model<B>, TrainingHistory)>
where
    B: AutodiffBackend,
    O: Optimizer<Model<B>, B>,
{
    let config = fit.config;
    let mut history = TrainingHistory::default();
    let mut best: Option<(f64, Model<B>)> = None;
    let mut best_loss: Option<f64> = None;
    let mut stale_epochs = 0;

    for epoch in 1..=config.num_epochs {
        if fit.interrupter.should_stop() {
            log::warn!("Training interrupted before epoch {}", epoch);
            history.interrupted = true;
            break;
        }

        let mut accumulator = Accumulator::default();

        for indices in batch_indices(
            fit.train.len(),
            config.batch_size,
            epoch,
            config.seed,
            config.shuffle,
        ) {
            let samples = indices.iter().map(|&i| fit.train[i].clone()).collect();
            let batch: TrainBatch<B> = fit.batcher.batch(samples);

            let output = model.forward_classification(batch)?;
            let grads = output.loss.backward();
            accumulator.add_output(output);

            let grads = GradientsParams::from_grads(grads, &model);
            model = optim.step(config.learning_rate, model, grads);
        }

        let valid = match fit.valid {
            Some(samples) => Some(evaluate(
                &model.valid(),
                samples,
                fit.valid_batcher,
                config.batch_size,
            )?),
            None => None,
        };

        let metrics = EpochMetrics {
            epoch,
            train: accumulator.finish(),
            valid,
        };

        match metrics.valid {
            Some(valid) => log::info!(
                "Epoch {}/{} - train {} - valid {}",
                epoch,
                config.num_epochs,
                metrics.train,
                valid
            ),
            None => log::info!("Epoch {}/{} - train {}", epoch, config.num_epochs, metrics.train),
        }

        let loss = metrics.monitored_loss();
        history.epochs.push(metrics);

        if best_loss.map_or(true, |best| loss < best) {
            best_loss = Some(loss);
            stale_epochs = 0;

            if config.keep_best {
                best = Some((loss, model.clone()));
            }
        } else {
            stale_epochs += 1;
        }

        if let Some(patience) = config.patience {
            if stale_epochs >= patience {
                log::warn!(
                    "Stopping early: {} has not improved for {} epoch(s)",
                    history.monitor(),
                    stale_epochs
                );
                history.stopped_early = true;
                break;
            }
        }
    }

    if let Some((loss, best)) = best {
        log::debug!("Restoring the parameters of the best epoch ({:.4})", loss);
        model = best;
    }

    Ok((model, history))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_last_batch_may_be_smaller() {
        let batches = batch_indices(7, 3, 1, 42, false);

        assert_eq!(batches, vec![vec![0, 1, 2], vec![3, 4, 5], vec![6]]);
    }

    #[test]
    fn test_shuffled_batches_are_reproducible() {
        assert_eq!(batch_indices(50, 8, 3, 7, true), batch_indices(50, 8, 3, 7, true));
        assert_ne!(batch_indices(50, 8, 3, 7, true), batch_indices(50, 8, 4, 7, true));
    }

    #[test]
    fn test_shuffling_is_a_permutation() {
        let mut indices = batch_indices(20, 6, 1, 1, true)
            .into_iter()
            .flatten()
            .collect::<Vec<_>>();
        indices.sort();

        assert_eq!(indices, (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn test_empty_dataset_has_no_batches() {
        assert!(batch_indices(0, 4, 1, 0, true).is_empty());
    }
}
