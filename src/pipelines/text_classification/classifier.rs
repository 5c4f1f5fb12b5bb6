use std::{fmt::Display, path::Path, sync::Arc};

use burn::{
    module::{AutodiffModule, Module},
    record::{FullPrecisionSettings, NamedMpkGzFileRecorder, Recorder},
    tensor::backend::AutodiffBackend,
    train::TrainingInterrupter,
};

use crate::{
    datasets::{split::split_validation, Item, TextDataset},
    embeddings::Embeddings,
    error::{Error, Result},
    models::Model,
    tokenizer::{self, Tokenize},
};

use super::{
    batcher::{Sample, TextBatcher},
    config::{ClassifierConfig, TrainingConfig},
    embedder::{BagOfWordsEmbedder, Embedder, SequenceEmbedder},
    history::TrainingHistory,
    inference::{self, Prediction},
    labels::LabelEncoder,
    metrics::Evaluation,
    training::{self, Fit},
};

/// Classifier configuration file in an artifact directory
pub const CONFIG_FILE: &str = "config.json";

/// Label list file in an artifact directory
pub const LABELS_FILE: &str = "labels.json";

/// Model weights in an artifact directory; the recorder adds the `.mpk.gz` extension
pub const MODEL_FILE: &str = "model";

/// Human-readable model summary in an artifact directory
pub const DESCRIPTION_FILE: &str = "description.txt";

/// Training history in an artifact directory
pub const HISTORY_FILE: &str = "history.json";

type ModelRecorder = NamedMpkGzFileRecorder<FullPrecisionSettings>;

/// Split off the validation items a fit run uses.
///
/// An explicit validation set wins; otherwise `config.validation_fraction` holds out a seeded
/// share of the training items.
pub(crate) fn fit_items(
    train: &TextDataset,
    valid: Option<&TextDataset>,
    config: &TrainingConfig,
) -> Result<(Vec<Item>, Option<Vec<Item>>)> {
    let (train, valid) = match (valid, config.validation_fraction) {
        (None, Some(fraction)) => {
            let (train, valid) = split_validation(&train.items(), fraction, config.seed);
            (train, Some(valid))
        }
        (valid, _) => (train.items(), valid.map(TextDataset::items)),
    };

    if train.is_empty() {
        return Err(Error::Configuration("the training set is empty".to_string()));
    }

    Ok((train, valid))
}

/// The label of every item, failing on unlabeled ones
pub(crate) fn item_labels(items: &[Item]) -> Result<Vec<&str>> {
    items
        .iter()
        .map(|item| item.label.as_deref().ok_or_else(missing_label))
        .collect()
}

/// Pair the token ids of every item with its class id
pub(crate) fn samples<F>(items: &[Item], labels: &LabelEncoder, token_ids: F) -> Result<Vec<Sample>>
where
    F: Fn(&str) -> Result<Vec<usize>>,
{
    items
        .iter()
        .map(|item| {
            let label = item.label.as_deref().ok_or_else(missing_label)?;

            Ok(Sample::new(token_ids(&item.text)?, labels.encode(label)?))
        })
        .collect()
}

fn missing_label() -> Error {
    Error::Format("a labeled dataset is required, but an item has no label".to_string())
}

/// Record model weights at full precision
pub(crate) fn record_model<B: AutodiffBackend>(model: &Model<B>, dir: &Path) -> Result<()> {
    ModelRecorder::new()
        .record(model.clone().into_record(), dir.join(MODEL_FILE))
        .map_err(|e| Error::Persistence(format!("unable to record model weights: {:?}", e)))
}

/// Load recorded weights into a freshly initialized model and check their shapes
pub(crate) fn load_model<B: AutodiffBackend>(
    model: Model<B>,
    dir: &Path,
    device: &B::Device,
) -> Result<Model<B>> {
    let record = ModelRecorder::new()
        .load(dir.join(MODEL_FILE), device)
        .map_err(|e| Error::Persistence(format!("unable to load model weights: {:?}", e)))?;

    let model = model.load_record(record);
    model.check_weights()?;

    Ok(model)
}

/// A built network and the labels its outputs stand for
struct Fitted<B: AutodiffBackend> {
    labels: LabelEncoder,
    model: Model<B>,
}

/// A text classifier over pretrained word embeddings.
///
/// The same contract covers every architecture: [`build`](Self::build) draws fresh parameters,
/// [`fit`](Self::fit) trains them, and [`evaluate`](Self::evaluate) and
/// [`predict`](Self::predict) run the forward pass only. Evaluation and prediction take `&self`,
/// training takes `&mut self`, so a classifier is never read while it is being trained.
pub struct TextEmbeddingClassifier<B: AutodiffBackend> {
    config: ClassifierConfig,
    embeddings: Arc<Embeddings>,
    embedder: Embedder,
    tokenizer: Arc<dyn Tokenize>,
    state: Option<Fitted<B>>,
    device: B::Device,
    interrupter: TrainingInterrupter,
}

impl<B: AutodiffBackend> TextEmbeddingClassifier<B> {
    /// Create an unbuilt classifier
    pub fn new(
        config: ClassifierConfig,
        embeddings: Arc<Embeddings>,
        tokenizer: Arc<dyn Tokenize>,
        device: B::Device,
    ) -> Result<Self> {
        config.validate()?;

        let embedder = Self::embedder_for(&config, embeddings.clone());

        Ok(Self {
            config,
            embeddings,
            embedder,
            tokenizer,
            state: None,
            device,
            interrupter: TrainingInterrupter::new(),
        })
    }

    fn embedder_for(config: &ClassifierConfig, embeddings: Arc<Embeddings>) -> Embedder {
        if config.architecture.is_sequential() {
            Embedder::Sequence(SequenceEmbedder::new(
                embeddings,
                config.max_length,
                config.clip,
            ))
        } else {
            Embedder::BagOfWords(BagOfWordsEmbedder::new(embeddings))
        }
    }

    /// Draw fresh parameters for the given labels, replacing any trained state
    pub fn build(&mut self, labels: LabelEncoder) -> Result<()> {
        if labels.is_empty() {
            return Err(Error::Configuration(
                "at least one label is required".to_string(),
            ));
        }

        B::seed(self.config.seed);

        let model = self.config.architecture.init(
            self.embedder.dim(),
            self.config.max_length,
            labels.len(),
            self.config.dropout,
            &self.device,
        )?;

        log::info!(
            "Built {} classifier with {} labels and {} parameters",
            self.config.architecture,
            labels.len(),
            model.num_params()
        );

        self.state = Some(Fitted { labels, model });

        Ok(())
    }

    /// Train on a labeled dataset.
    ///
    /// Builds the classifier from the training labels first if it has not been built. Without an
    /// explicit validation set, `config.validation_fraction` holds out a seeded share of the
    /// training rows.
    pub fn fit(
        &mut self,
        train: &TextDataset,
        valid: Option<&TextDataset>,
        config: &TrainingConfig,
    ) -> Result<TrainingHistory> {
        config.validate()?;

        let (train, valid) = fit_items(train, valid, config)?;

        if self.state.is_none() {
            self.build(LabelEncoder::fit(item_labels(&train)?))?;
        }

        let fitted = self.state.as_ref().ok_or(Error::NotFitted)?;
        let train_samples = self.samples(&train, &fitted.labels)?;
        let valid_samples = valid
            .map(|valid| self.samples(&valid, &fitted.labels))
            .transpose()?
            .filter(|samples| !samples.is_empty());

        log::info!(
            "Training on {} samples, validating on {}",
            train_samples.len(),
            valid_samples.as_ref().map_or(0, Vec::len)
        );

        let batcher = TextBatcher::<B>::new(self.embedder.clone(), self.device.clone());
        let valid_batcher =
            TextBatcher::<B::InnerBackend>::new(self.embedder.clone(), self.device.clone());

        let result = training::train(
            fitted.model.clone(),
            Fit {
                batcher: &batcher,
                valid_batcher: &valid_batcher,
                train: &train_samples,
                valid: valid_samples.as_deref(),
                config,
                interrupter: &self.interrupter,
            },
        );

        // A stop request ends only the run it interrupted
        if self.interrupter.should_stop() {
            self.interrupter = TrainingInterrupter::new();
        }

        let (model, history) = result?;

        log::info!("{}", history);

        if let Some(fitted) = self.state.as_mut() {
            fitted.model = model;
        }

        Ok(history)
    }

    /// Accuracy and cross-entropy over a labeled dataset. Parameters are not changed.
    pub fn evaluate(&self, dataset: &TextDataset) -> Result<Evaluation> {
        let fitted = self.fitted()?;
        let samples = self.samples(&dataset.items(), &fitted.labels)?;
        let batcher = TextBatcher::<B::InnerBackend>::new(self.embedder.clone(), self.device.clone());

        inference::evaluate(&fitted.model.valid(), &samples, &batcher, self.config.batch_size)
    }

    /// Predict the label and class probabilities of every text, in input order
    pub fn predict<S: AsRef<str>>(&self, texts: &[S]) -> Result<Vec<Prediction>> {
        let fitted = self.fitted()?;

        let ids = texts
            .iter()
            .map(|text| self.token_ids(text.as_ref()))
            .collect::<Result<Vec<_>>>()?;

        let batcher = TextBatcher::<B::InnerBackend>::new(self.embedder.clone(), self.device.clone());
        let probabilities =
            inference::infer(&fitted.model.valid(), &ids, &batcher, self.config.batch_size)?;

        inference::predictions(&fitted.labels, probabilities)
    }

    /// Predict every text of a dataset, ignoring its labels
    pub fn predict_dataset(&self, dataset: &TextDataset) -> Result<Vec<Prediction>> {
        self.predict(&dataset.texts())
    }

    /// Swap the embeddings in front of the model, keeping the trained parameters.
    ///
    /// Embeddings of another width make later evaluation and prediction fail with a shape error.
    pub fn set_embeddings(&mut self, embeddings: Arc<Embeddings>) {
        self.embedder = Self::embedder_for(&self.config, embeddings.clone());
        self.embeddings = embeddings;
    }

    /// Write the configuration, labels, tokenizer, embeddings, weights and a description to `dir`
    pub fn save(&self, dir: impl AsRef<Path>) -> Result<()> {
        let fitted = self.fitted()?;
        let dir = dir.as_ref();

        std::fs::create_dir_all(dir)?;

        self.config.save_json(dir.join(CONFIG_FILE))?;
        fitted.labels.save(dir.join(LABELS_FILE))?;
        self.tokenizer.persist(dir)?;
        self.embeddings.save(dir)?;
        record_model(&fitted.model, dir)?;

        std::fs::write(dir.join(DESCRIPTION_FILE), self.to_string())?;

        log::info!("Saved model to {}", dir.display());

        Ok(())
    }

    /// Restore a classifier written by [`save`](Self::save), tokenizer included
    pub fn load(dir: impl AsRef<Path>, device: B::Device) -> Result<Self> {
        let dir = dir.as_ref();

        log::debug!("Loading model from {}", dir.display());

        let config = ClassifierConfig::load_json(dir.join(CONFIG_FILE))?;
        let labels = LabelEncoder::load(dir.join(LABELS_FILE))?;
        let tokenizer = tokenizer::restore(dir)?;
        let embeddings = Arc::new(Embeddings::restore(dir)?);

        let mut classifier = Self::new(config, embeddings, tokenizer, device)?;

        let model = classifier.config.architecture.init::<B>(
            classifier.embedder.dim(),
            classifier.config.max_length,
            labels.len(),
            classifier.config.dropout,
            &classifier.device,
        )?;
        let model = load_model(model, dir, &classifier.device)?;

        classifier.state = Some(Fitted { labels, model });

        Ok(classifier)
    }

    /// Whether the classifier has been built, fitted or restored
    pub fn is_fitted(&self) -> bool {
        self.state.is_some()
    }

    /// The label encoder, once built
    pub fn labels(&self) -> Option<&LabelEncoder> {
        self.state.as_ref().map(|fitted| &fitted.labels)
    }

    /// The classifier configuration
    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// The embedding step
    pub fn embedder(&self) -> &Embedder {
        &self.embedder
    }

    /// A handle that stops the next or ongoing [`fit`](Self::fit) between epochs.
    ///
    /// Each handle interrupts one run: take a new one after an interrupted fit.
    pub fn interrupter(&self) -> TrainingInterrupter {
        self.interrupter.clone()
    }

    fn fitted(&self) -> Result<&Fitted<B>> {
        self.state.as_ref().ok_or(Error::NotFitted)
    }

    fn token_ids(&self, text: &str) -> Result<Vec<usize>> {
        let tokens = self.tokenizer.tokenize(text)?;

        Ok(self.embedder.token_ids(&tokens))
    }

    fn samples(&self, items: &[Item], labels: &LabelEncoder) -> Result<Vec<Sample>> {
        samples(items, labels, |text| self.token_ids(text))
    }
}

impl<B: AutodiffBackend> Display for TextEmbeddingClassifier<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = if self.config.architecture.is_sequential() {
            "text sequence"
        } else {
            "bag of words"
        };

        write!(f, "Neural {} classifier: ", kind)?;

        match &self.state {
            Some(fitted) => write!(f, "{} labels, ", fitted.labels.len())?,
            None => write!(f, "not built, ")?,
        }

        writeln!(
            f,
            "{}, dropout rate {:.2}",
            self.config.architecture, self.config.dropout
        )?;
        write!(f, "{}", self.embedder)?;

        if let Some(fitted) = &self.state {
            write!(
                f,
                "\nLabels: {}\nParameters: {}",
                fitted.labels.labels().join(", "),
                fitted.model.num_params()
            )?;
        }

        Ok(())
    }
}
