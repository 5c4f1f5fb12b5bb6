use std::{fmt::Display, path::Path};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

use super::metrics::Evaluation;

/// Metrics recorded at the end of one epoch
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct EpochMetrics {
    /// 1-based epoch number
    pub epoch: usize,

    /// Training loss and accuracy, averaged over the epoch
    pub train: Evaluation,

    /// Validation loss and accuracy, when validating
    pub valid: Option<Evaluation>,
}

impl EpochMetrics {
    /// The loss that early stopping and best-epoch selection look at
    pub fn monitored_loss(&self) -> f64 {
        self.valid.map_or(self.train.loss, |valid| valid.loss)
    }
}

/// Per-epoch metrics of a fit run
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingHistory {
    /// One entry per completed epoch
    pub epochs: Vec<EpochMetrics>,

    /// Training ended because the monitored loss stopped improving
    pub stopped_early: bool,

    /// Training ended because the interrupter was triggered
    pub interrupted: bool,
}

impl TrainingHistory {
    /// Name of the monitored quantity
    pub fn monitor(&self) -> &'static str {
        match self.epochs.first() {
            Some(metrics) if metrics.valid.is_some() => "val_loss",
            _ => "loss",
        }
    }

    /// The epoch with the lowest monitored loss, the earliest one on ties
    pub fn best(&self) -> Option<&EpochMetrics> {
        self.epochs.iter().fold(None, |best, metrics| match best {
            Some(best) if best.monitored_loss() <= metrics.monitored_loss() => Some(best),
            _ => Some(metrics),
        })
    }

    /// The last recorded epoch
    pub fn last(&self) -> Option<&EpochMetrics> {
        self.epochs.last()
    }

    /// Save as pretty JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| Error::Persistence(e.to_string()))?;
        std::fs::write(path, json)?;

        Ok(())
    }

    /// Load a history written by [`TrainingHistory::save`]
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;

        serde_json::from_str(&json).map_err(|e| Error::Format(format!("invalid history: {}", e)))
    }
}

impl Display for TrainingHistory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let Some(best) = self.best() else {
            return write!(f, "No epochs completed");
        };

        write!(
            f,
            "Best epoch {} of {}: {} {:.4}, train {}",
            best.epoch,
            self.epochs.len(),
            self.monitor(),
            best.monitored_loss(),
            best.train
        )?;

        if let Some(valid) = best.valid {
            write!(f, ", valid {}", valid)?;
        }
        if self.stopped_early {
            write!(f, " (stopped early)")?;
        }
        if self.interrupted {
            write!(f, " (interrupted)")?;
        }

        Ok(())
    }
}
