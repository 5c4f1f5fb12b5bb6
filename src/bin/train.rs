//! Command line tool for training

use std::{path::PathBuf, sync::Arc};

use anyhow::{anyhow, Result};
use burn::backend::{ndarray::NdArrayDevice, Autodiff, NdArray};
use burn_text_embeddings::{
    cli::{self, architectures::parse_kernel_sizes, Architecture, ArchitectureOptions},
    datasets::{delimited, ColumnsConfig},
    embeddings::{Embeddings, EmbeddingsConfig, OovPolicy},
    models::CellKind,
    pipelines::text_classification::{
        classifier::HISTORY_FILE, ClassifierConfig, ClipPolicy, OptimizerKind,
        TextEmbeddingClassifier, TrainingConfig,
    },
};
use pico_args::Arguments;

type Backend = Autodiff<NdArray>;

const HELP: &str = "\
Usage: train TRAINING VECTORS [OPTIONS]

Train a model to predict labels for text. The training and optional validation loss and
accuracy are logged for each epoch (set RUST_LOG=info to see them).

Arguments:
  TRAINING                 Training data: a comma or tab delimited file with a text and a label column
  VECTORS                  Pretrained word vectors, one 'token v1 ... vD' line per token

Options:
  -h, --help               Print help
  -a, --architecture       The architecture to use: 'rnn', 'cnn' or 'bow' (defaults to 'rnn')
  -o, --output-dir         Directory in which to save the model (defaults to not saving)
  @FILE                    Read further options from FILE, one per line

Data:
  --validation PORTION     Portion of the training data to hold out for validation
  --validation-file FILE   Separate validation data file
  --limit N                Only read this many rows
  --text-name NAME         Name of the text column (defaults to 'text')
  --label-name NAME        Name of the label column (defaults to 'label')

Language:
  --dimension D            Pretrained vector dimension (defaults to 300)
  --max-vocabulary N       Only load the first N pretrained vectors
  --oov POLICY             Out-of-vocabulary vector: 'zero' or 'mean' (defaults to 'zero')
  --tokenizer FILE         A tokenizer.json file (defaults to the word tokenizer)
  --cased                  Do not lowercase text before word tokenization

Model:
  --max-tokens M           Tokens embedded per text (defaults to the longest training text)
  --clip POLICY            Keep the 'head' or 'tail' of longer texts (defaults to 'head')
  --dropout RATE           Dropout rate (defaults to 0.5)
  --cell TYPE              Recurrent cell: 'lstm' or 'gru' (defaults to 'lstm')
  --units N                Recurrent units (defaults to 128)
  --layers N               Recurrent layers (defaults to 1)
  --unidirectional         Read texts in one direction only
  --filters N              Convolution filters per kernel size (defaults to 100)
  --kernel-sizes K,K,...   Convolution kernel sizes (defaults to 3,4,5)

Training:
  -n, --num-epochs N       Number of epochs to train for (defaults to 10)
  -b, --batch-size M       Batch size (defaults to 32)
  --learning-rate LR       Learning rate (defaults to 0.001)
  --optimizer NAME         'adam', 'adamw' or 'sgd' (defaults to 'adam')
  --patience N             Stop after N epochs without improvement
  --seed N                 Random seed (defaults to 42)
  --no-shuffle             Keep the training order in every epoch
";

#[derive(Debug)]
struct Args {
    training: PathBuf,
    vectors: PathBuf,
    architecture: Option<String>,
    output_dir: Option<PathBuf>,

    validation: Option<f64>,
    validation_file: Option<PathBuf>,
    limit: Option<usize>,
    text_name: Option<String>,
    label_name: Option<String>,

    dimension: Option<usize>,
    max_vocabulary: Option<usize>,
    oov: Option<OovPolicy>,
    tokenizer: Option<String>,
    cased: bool,

    max_tokens: Option<usize>,
    clip: Option<ClipPolicy>,
    dropout: Option<f64>,
    options: ArchitectureOptions,

    num_epochs: Option<usize>,
    batch_size: Option<usize>,
    learning_rate: Option<f64>,
    optimizer: Option<OptimizerKind>,
    patience: Option<usize>,
    seed: Option<u64>,
    no_shuffle: bool,
}

impl Args {
    fn parse() -> Result<Option<Self>> {
        let expanded = cli::args::expand_arg_files(std::env::args_os().skip(1))?;
        let mut pargs = Arguments::from_vec(expanded);

        // Help has a higher priority and should be handled separately.
        if pargs.contains(["-h", "--help"]) {
            return Ok(None);
        }

        let options = ArchitectureOptions {
            cell: pargs.opt_value_from_fn("--cell", parse_cell)?,
            units: pargs.opt_value_from_str("--units")?,
            layers: pargs.opt_value_from_str("--layers")?,
            unidirectional: pargs.contains("--unidirectional"),
            filters: pargs.opt_value_from_str("--filters")?,
            kernel_sizes: pargs.opt_value_from_fn("--kernel-sizes", parse_kernel_sizes)?,
        };

        let args = Args {
            architecture: pargs.opt_value_from_str(["-a", "--architecture"])?,
            output_dir: pargs.opt_value_from_str(["-o", "--output-dir"])?,
            validation: pargs.opt_value_from_str("--validation")?,
            validation_file: pargs.opt_value_from_str("--validation-file")?,
            limit: pargs.opt_value_from_str("--limit")?,
            text_name: pargs.opt_value_from_str("--text-name")?,
            label_name: pargs.opt_value_from_str("--label-name")?,
            dimension: pargs.opt_value_from_str("--dimension")?,
            max_vocabulary: pargs.opt_value_from_str("--max-vocabulary")?,
            oov: pargs.opt_value_from_fn("--oov", parse_oov)?,
            tokenizer: pargs.opt_value_from_str("--tokenizer")?,
            cased: pargs.contains("--cased"),
            max_tokens: pargs.opt_value_from_str("--max-tokens")?,
            clip: pargs.opt_value_from_fn("--clip", parse_clip)?,
            dropout: pargs.opt_value_from_str("--dropout")?,
            options,
            num_epochs: pargs.opt_value_from_str(["-n", "--num-epochs"])?,
            batch_size: pargs.opt_value_from_str(["-b", "--batch-size"])?,
            learning_rate: pargs.opt_value_from_str("--learning-rate")?,
            optimizer: pargs.opt_value_from_fn("--optimizer", parse_optimizer)?,
            patience: pargs.opt_value_from_str("--patience")?,
            seed: pargs.opt_value_from_str("--seed")?,
            no_shuffle: pargs.contains("--no-shuffle"),
            training: pargs.free_from_str().map_err(|e| match e {
                pico_args::Error::MissingArgument => anyhow!("Missing required argument: TRAINING"),
                _ => anyhow!("{}", e),
            })?,
            vectors: pargs.free_from_str().map_err(|e| match e {
                pico_args::Error::MissingArgument => anyhow!("Missing required argument: VECTORS"),
                _ => anyhow!("{}", e),
            })?,
        };

        let remaining = pargs.finish();
        if !remaining.is_empty() {
            return Err(anyhow!("Unexpected arguments: {:?}", remaining));
        }

        Ok(Some(args))
    }
}

fn parse_cell(value: &str) -> Result<CellKind> {
    Ok(CellKind::try_from(value)?)
}

fn parse_optimizer(value: &str) -> Result<OptimizerKind> {
    Ok(OptimizerKind::try_from(value)?)
}

fn parse_oov(value: &str) -> Result<OovPolicy> {
    match value {
        "zero" => Ok(OovPolicy::Zero),
        "mean" => Ok(OovPolicy::Mean),
        _ => Err(anyhow!("unsupported out-of-vocabulary policy: {}", value)),
    }
}

fn parse_clip(value: &str) -> Result<ClipPolicy> {
    match value {
        "head" => Ok(ClipPolicy::Head),
        "tail" => Ok(ClipPolicy::Tail),
        _ => Err(anyhow!("unsupported clip policy: {}", value)),
    }
}

fn main() -> Result<()> {
    pretty_env_logger::init();

    let Some(args) = Args::parse()? else {
        print!("{}", HELP);

        return Ok(());
    };

    let architecture = match &args.architecture {
        Some(name) => Architecture::try_from(name.as_str())?,
        None => Architecture::Recurrent,
    };

    let tokenizer = cli::tokenizer(args.tokenizer.as_deref(), args.cased)?;

    let mut columns = ColumnsConfig::new().with_limit(args.limit);
    if let Some(text_name) = &args.text_name {
        columns.text = text_name.clone();
    }
    if let Some(label_name) = &args.label_name {
        columns.label = label_name.clone();
    }

    let train = delimited::read(&args.training, &columns, true)?;
    let valid = args
        .validation_file
        .as_ref()
        .map(|path| delimited::read(path, &columns, true))
        .transpose()?;

    let mut embeddings_config = EmbeddingsConfig::new().with_max_vocabulary(args.max_vocabulary);
    if let Some(dimension) = args.dimension {
        embeddings_config.dimension = dimension;
    }
    if let Some(oov) = args.oov {
        embeddings_config.oov = oov;
    }

    let embeddings = Embeddings::from_file(&args.vectors, &embeddings_config)?;
    log::info!("Loaded {}", embeddings);

    let max_length = match args.max_tokens {
        Some(max_tokens) => max_tokens,
        None => cli::longest_text(tokenizer.as_ref(), &train)?,
    };

    let mut config = ClassifierConfig::new(architecture.config(&args.options))
        .with_max_length(max_length);
    if let Some(clip) = args.clip {
        config.clip = clip;
    }
    if let Some(dropout) = args.dropout {
        config.dropout = dropout;
    }
    if let Some(seed) = args.seed {
        config.seed = seed;
    }

    let mut training = TrainingConfig::new()
        .with_validation_fraction(args.validation)
        .with_patience(args.patience)
        .with_shuffle(!args.no_shuffle);
    if let Some(num_epochs) = args.num_epochs {
        training.num_epochs = num_epochs;
    }
    if let Some(batch_size) = args.batch_size {
        training.batch_size = batch_size;
    }
    if let Some(learning_rate) = args.learning_rate {
        training.learning_rate = learning_rate;
    }
    if let Some(optimizer) = args.optimizer {
        training.optimizer = optimizer;
    }
    if let Some(seed) = args.seed {
        training.seed = seed;
    }

    let device = NdArrayDevice::default();
    let mut classifier =
        TextEmbeddingClassifier::<Backend>::new(config, Arc::new(embeddings), tokenizer, device)?;

    let history = classifier.fit(&train, valid.as_ref(), &training)?;

    if let Some(output_dir) = &args.output_dir {
        classifier.save(output_dir)?;
        history.save(output_dir.join(HISTORY_FILE))?;
    }

    println!("{}", history);

    Ok(())
}
