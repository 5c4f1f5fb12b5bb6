//! Command line tool for inference

use std::path::PathBuf;

use anyhow::{anyhow, Result};
use burn::backend::{ndarray::NdArrayDevice, Autodiff, NdArray};
use burn_text_embeddings::{
    cli,
    datasets::{delimited, ColumnsConfig},
    pipelines::text_classification::{
        classifier::{DESCRIPTION_FILE, HISTORY_FILE},
        TextEmbeddingClassifier, TrainingHistory,
    },
};
use pico_args::Arguments;

type Backend = Autodiff<NdArray>;

const HELP: &str = "\
Usage: infer COMMAND MODEL_DIR [DATA] [OPTIONS]

Use a model saved by 'train --output-dir'.

Commands:
  predict                  Write the DATA rows with a probability per label and the predicted label as CSV
  evaluate                 Print the accuracy and loss of the model on labeled DATA
  details                  Describe the model

Arguments:
  MODEL_DIR                Directory the model was saved to
  DATA                     A comma or tab delimited file with a text column

Options:
  -h, --help               Print help
  --limit N                Only read this many rows
  --text-name NAME         Name of the text column (defaults to 'text')
  --label-name NAME        Name of the label column (defaults to 'label')
  @FILE                    Read further options from FILE, one per line
";

/// Available commands
#[derive(Debug, Clone, Copy, PartialEq)]
enum Command {
    Predict,
    Evaluate,
    Details,
}

impl TryFrom<&str> for Command {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self> {
        match value {
            "predict" => Ok(Command::Predict),
            "evaluate" => Ok(Command::Evaluate),
            "details" => Ok(Command::Details),
            _ => Err(anyhow!("Unsupported command: {}", value)),
        }
    }
}

#[derive(Debug)]
struct Args {
    command: Command,
    model_dir: PathBuf,
    data: Option<PathBuf>,
    limit: Option<usize>,
    text_name: Option<String>,
    label_name: Option<String>,
}

impl Args {
    fn parse() -> Result<Option<Self>> {
        let expanded = cli::args::expand_arg_files(std::env::args_os().skip(1))?;
        let mut pargs = Arguments::from_vec(expanded);

        // Help has a higher priority and should be handled separately.
        if pargs.contains(["-h", "--help"]) {
            return Ok(None);
        }

        let limit = pargs.opt_value_from_str("--limit")?;
        let text_name = pargs.opt_value_from_str("--text-name")?;
        let label_name = pargs.opt_value_from_str("--label-name")?;

        let command: String = pargs.free_from_str().map_err(|e| match e {
            pico_args::Error::MissingArgument => anyhow!("Missing required argument: COMMAND"),
            _ => anyhow!("{}", e),
        })?;

        let args = Args {
            command: Command::try_from(command.as_str())?,
            model_dir: pargs.free_from_str().map_err(|e| match e {
                pico_args::Error::MissingArgument => anyhow!("Missing required argument: MODEL_DIR"),
                _ => anyhow!("{}", e),
            })?,
            data: pargs.opt_free_from_str()?,
            limit,
            text_name,
            label_name,
        };

        let remaining = pargs.finish();
        if !remaining.is_empty() {
            return Err(anyhow!("Unexpected arguments: {:?}", remaining));
        }

        Ok(Some(args))
    }

    fn columns(&self) -> ColumnsConfig {
        let mut columns = ColumnsConfig::new().with_limit(self.limit);

        if let Some(text_name) = &self.text_name {
            columns.text = text_name.clone();
        }
        if let Some(label_name) = &self.label_name {
            columns.label = label_name.clone();
        }

        columns
    }

    fn data(&self) -> Result<&PathBuf> {
        self.data
            .as_ref()
            .ok_or_else(|| anyhow!("Missing required argument: DATA"))
    }
}

fn main() -> Result<()> {
    pretty_env_logger::init();

    let Some(args) = Args::parse()? else {
        print!("{}", HELP);

        return Ok(());
    };

    let device = NdArrayDevice::default();
    let classifier = TextEmbeddingClassifier::<Backend>::load(&args.model_dir, device)?;

    match args.command {
        Command::Predict => {
            let dataset = delimited::read(args.data()?, &args.columns(), false)?;
            let predictions = classifier.predict_dataset(&dataset)?;
            let labels = classifier
                .labels()
                .map(|labels| labels.labels().to_vec())
                .unwrap_or_default();

            let columns = args.columns();
            let labeled = dataset.is_labeled();

            let mut writer = csv::Writer::from_writer(std::io::stdout());

            let mut header = vec![columns.text.clone()];
            if labeled {
                header.push(columns.label.clone());
            }
            header.extend(labels.iter().cloned());
            header.push("predicted label".to_string());
            writer.write_record(&header)?;

            for (item, prediction) in dataset.items().into_iter().zip(predictions) {
                let mut row = vec![item.text];
                if labeled {
                    row.push(item.label.unwrap_or_default());
                }
                row.extend(prediction.probabilities.iter().map(|p| p.to_string()));
                row.push(prediction.label);
                writer.write_record(&row)?;
            }

            writer.flush()?;
        }
        Command::Evaluate => {
            let dataset = delimited::read(args.data()?, &args.columns(), true)?;
            let evaluation = classifier.evaluate(&dataset)?;

            println!("{}", evaluation);
        }
        Command::Details => {
            let description = args.model_dir.join(DESCRIPTION_FILE);

            match std::fs::read_to_string(&description) {
                Ok(text) => println!("{}", text),
                Err(_) => println!("{}", classifier),
            }

            let history = args.model_dir.join(HISTORY_FILE);
            if history.exists() {
                println!("{}", TrainingHistory::load(&history)?);
            }
        }
    }

    Ok(())
}
