use std::{fmt::Display, path::Path, sync::Arc};

use burn::{
    config::Config,
    module::{AutodiffModule, Module},
    tensor::backend::AutodiffBackend,
    train::TrainingInterrupter,
};

use crate::{
    datasets::{Item, TextDataset},
    error::{Error, Result},
    models::{ArchitectureConfig, Model},
    tokenizer::{self, Tokenize},
};

use super::{
    batcher::{Sample, TextBatcher},
    classifier::{
        fit_items, item_labels, load_model, record_model, samples, CONFIG_FILE, DESCRIPTION_FILE,
        LABELS_FILE,
    },
    config::TrainingConfig,
    embedder::Embedder,
    history::TrainingHistory,
    inference::{self, Prediction},
    labels::LabelEncoder,
    metrics::Evaluation,
    tfidf::{TfIdfConfig, TfIdfVectorizer},
    training::{self, Fit},
};

/// Configuration of a word count classifier
#[derive(Config, Debug)]
pub struct WordCountConfig {
    /// Vocabulary and weighting of the term vectors
    #[config(default = "TfIdfConfig::new()")]
    pub tfidf: TfIdfConfig,

    /// Batch size used for evaluation and prediction
    #[config(default = 32)]
    pub batch_size: usize,

    /// Seed for parameter initialization
    #[config(default = 42)]
    pub seed: u64,
}

impl WordCountConfig {
    /// Reject out-of-range hyperparameters
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::Configuration(
                "the batch size must be positive".to_string(),
            ));
        }
        if self.tfidf.max_features == Some(0) {
            return Err(Error::Configuration(
                "at least one TF-IDF feature is required".to_string(),
            ));
        }

        Ok(())
    }
}

/// A fitted vocabulary, the labels and the linear model over them
struct Fitted<B: AutodiffBackend> {
    vectorizer: Arc<TfIdfVectorizer>,
    labels: LabelEncoder,
    model: Model<B>,
}

impl<B: AutodiffBackend> Fitted<B> {
    fn embedder(&self) -> Embedder {
        Embedder::TfIdf(self.vectorizer.clone())
    }
}

/// A linear classifier over TF-IDF weighted word counts.
///
/// It needs no pretrained vectors: [`fit`](Self::fit) learns the vocabulary, the labels and a
/// softmax output layer from the training texts, so every fit starts from scratch.
pub struct WordCountClassifier<B: AutodiffBackend> {
    config: WordCountConfig,
    tokenizer: Arc<dyn Tokenize>,
    state: Option<Fitted<B>>,
    device: B::Device,
    interrupter: TrainingInterrupter,
}

impl<B: AutodiffBackend> WordCountClassifier<B> {
    /// Create an unfitted classifier
    pub fn new(
        config: WordCountConfig,
        tokenizer: Arc<dyn Tokenize>,
        device: B::Device,
    ) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            config,
            tokenizer,
            state: None,
            device,
            interrupter: TrainingInterrupter::new(),
        })
    }

    /// Learn the vocabulary and labels of the training set, then train the output layer.
    ///
    /// Without an explicit validation set, `config.validation_fraction` holds out a seeded share
    /// of the training rows; held-out rows take no part in the vocabulary.
    pub fn fit(
        &mut self,
        train: &TextDataset,
        valid: Option<&TextDataset>,
        config: &TrainingConfig,
    ) -> Result<TrainingHistory> {
        config.validate()?;

        let (train, valid) = fit_items(train, valid, config)?;
        let labels = LabelEncoder::fit(item_labels(&train)?);

        let documents = train
            .iter()
            .map(|item| self.tokenizer.tokenize(&item.text))
            .collect::<Result<Vec<_>>>()?;
        let vectorizer = Arc::new(TfIdfVectorizer::fit(&documents, &self.config.tfidf)?);

        B::seed(self.config.seed);

        let model = ArchitectureConfig::BagOfWords.init::<B>(
            vectorizer.len(),
            0,
            labels.len(),
            0.0,
            &self.device,
        )?;

        log::info!(
            "Built word count classifier with {} labels and {} terms",
            labels.len(),
            vectorizer.len()
        );

        let fitted = Fitted {
            vectorizer,
            labels,
            model,
        };

        let train_samples = self.samples(&fitted, &train)?;
        let valid_samples = valid
            .map(|valid| self.samples(&fitted, &valid))
            .transpose()?
            .filter(|samples| !samples.is_empty());

        let batcher = TextBatcher::<B>::new(fitted.embedder(), self.device.clone());
        let valid_batcher =
            TextBatcher::<B::InnerBackend>::new(fitted.embedder(), self.device.clone());

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

        if self.interrupter.should_stop() {
            self.interrupter = TrainingInterrupter::new();
        }

        let (model, history) = result?;

        log::info!("{}", history);

        self.state = Some(Fitted { model, ..fitted });

        Ok(history)
    }

    /// Accuracy and cross-entropy over a labeled dataset
    pub fn evaluate(&self, dataset: &TextDataset) -> Result<Evaluation> {
        let fitted = self.fitted()?;
        let samples = self.samples(fitted, &dataset.items())?;
        let batcher = TextBatcher::<B::InnerBackend>::new(fitted.embedder(), self.device.clone());

        inference::evaluate(&fitted.model.valid(), &samples, &batcher, self.config.batch_size)
    }

    /// Predict the label and class probabilities of every text, in input order
    pub fn predict<S: AsRef<str>>(&self, texts: &[S]) -> Result<Vec<Prediction>> {
        let fitted = self.fitted()?;

        let ids = texts
            .iter()
            .map(|text| self.term_ids(fitted, text.as_ref()))
            .collect::<Result<Vec<_>>>()?;

        let batcher = TextBatcher::<B::InnerBackend>::new(fitted.embedder(), self.device.clone());
        let probabilities =
            inference::infer(&fitted.model.valid(), &ids, &batcher, self.config.batch_size)?;

        inference::predictions(&fitted.labels, probabilities)
    }

    /// Predict every text of a dataset, ignoring its labels
    pub fn predict_dataset(&self, dataset: &TextDataset) -> Result<Vec<Prediction>> {
        self.predict(&dataset.texts())
    }

    /// Write the configuration, labels, tokenizer, vocabulary, weights and a description to `dir`
    pub fn save(&self, dir: impl AsRef<Path>) -> Result<()> {
        let fitted = self.fitted()?;
        let dir = dir.as_ref();

        std::fs::create_dir_all(dir)?;

        self.config
            .save(dir.join(CONFIG_FILE))
            .map_err(|e| Error::Persistence(format!("unable to save config: {}", e)))?;
        fitted.labels.save(dir.join(LABELS_FILE))?;
        fitted.vectorizer.save(dir)?;
        self.tokenizer.persist(dir)?;
        record_model(&fitted.model, dir)?;

        std::fs::write(dir.join(DESCRIPTION_FILE), self.to_string())?;

        log::info!("Saved model to {}", dir.display());

        Ok(())
    }

    /// Restore a classifier written by [`save`](Self::save)
    pub fn load(dir: impl AsRef<Path>, device: B::Device) -> Result<Self> {
        let dir = dir.as_ref();

        log::debug!("Loading model from {}", dir.display());

        let config = WordCountConfig::load(dir.join(CONFIG_FILE))
            .map_err(|e| Error::Format(format!("unable to load config: {}", e)))?;
        let labels = LabelEncoder::load(dir.join(LABELS_FILE))?;
        let vectorizer = Arc::new(TfIdfVectorizer::load(dir)?);
        let tokenizer = tokenizer::restore(dir)?;

        let mut classifier = Self::new(config, tokenizer, device)?;

        let model = ArchitectureConfig::BagOfWords.init::<B>(
            vectorizer.len(),
            0,
            labels.len(),
            0.0,
            &classifier.device,
        )?;
        let model = load_model(model, dir, &classifier.device)?;

        classifier.state = Some(Fitted {
            vectorizer,
            labels,
            model,
        });

        Ok(classifier)
    }

    /// Whether the classifier has been fitted or restored
    pub fn is_fitted(&self) -> bool {
        self.state.is_some()
    }

    /// The label encoder, once fitted
    pub fn labels(&self) -> Option<&LabelEncoder> {
        self.state.as_ref().map(|fitted| &fitted.labels)
    }

    /// The learned vocabulary, once fitted
    pub fn vectorizer(&self) -> Option<&TfIdfVectorizer> {
        self.state.as_ref().map(|fitted| fitted.vectorizer.as_ref())
    }

    /// The classifier configuration
    pub fn config(&self) -> &WordCountConfig {
        &self.config
    }

    /// A handle that stops the next or ongoing [`fit`](Self::fit) between epochs
    pub fn interrupter(&self) -> TrainingInterrupter {
        self.interrupter.clone()
    }

    fn fitted(&self) -> Result<&Fitted<B>> {
        self.state.as_ref().ok_or(Error::NotFitted)
    }

    fn term_ids(&self, fitted: &Fitted<B>, text: &str) -> Result<Vec<usize>> {
        let tokens = self.tokenizer.tokenize(text)?;

        Ok(fitted.vectorizer.term_ids(&tokens))
    }

    fn samples(&self, fitted: &Fitted<B>, items: &[Item]) -> Result<Vec<Sample>> {
        samples(items, &fitted.labels, |text| self.term_ids(fitted, text))
    }
}

impl<B: AutodiffBackend> Display for WordCountClassifier<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.state {
            Some(fitted) => {
                writeln!(f, "Linear TF-IDF classifier: {} labels", fitted.labels.len())?;
                writeln!(f, "{}", fitted.vectorizer)?;
                write!(
                    f,
                    "Labels: {}\nParameters: {}",
                    fitted.labels.labels().join(", "),
                    fitted.model.num_params()
                )
            }
            None => write!(f, "Linear TF-IDF classifier: not fitted"),
        }
    }
}

#[cfg(test)]
mod tests {
    use burn::backend::{Autodiff, NdArray};
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::tokenizer::WordTokenizer;

    type TestBackend = Autodiff<NdArray>;

    fn classifier() -> WordCountClassifier<TestBackend> {
        WordCountClassifier::new(
            WordCountConfig::new().with_batch_size(2),
            Arc::new(WordTokenizer::default()),
            Default::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_unfitted_classifier() {
        let classifier = classifier();

        assert!(!classifier.is_fitted());
        assert!(matches!(classifier.predict(&["good"]), Err(Error::NotFitted)));
        assert_eq!(classifier.to_string(), "Linear TF-IDF classifier: not fitted");
    }

    #[test]
    fn test_zero_batch_size_is_rejected() {
        let result = WordCountClassifier::<TestBackend>::new(
            WordCountConfig::new().with_batch_size(0),
            Arc::new(WordTokenizer::default()),
            Default::default(),
        );

        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[test]
    fn test_description_names_labels_and_terms() {
        let mut classifier = classifier();
        let dataset = TextDataset::labeled(["good movie", "bad movie"], ["pos", "neg"]);

        classifier
            .fit(&dataset, None, &TrainingConfig::new().with_num_epochs(1))
            .unwrap();

        let description = classifier.to_string();

        assert!(description.starts_with("Linear TF-IDF classifier: 2 labels\n"));
        assert!(description.contains("TF-IDF vectorizer: 3 terms (sublinear tf)"));
        assert!(description.contains("Labels: neg, pos"));
    }
}
