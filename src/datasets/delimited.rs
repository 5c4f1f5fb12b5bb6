use std::path::Path;

use burn::config::Config;
use csv::StringRecord;

use crate::error::{Error, Result};

use super::{Item, TextDataset};

/// Which columns of a delimited file hold the texts and labels
#[derive(Config, Debug)]
pub struct ColumnsConfig {
    /// Name of the text column in the header row
    #[config(default = "\"text\".to_string()")]
    pub text: String,

    /// Name of the label column in the header row
    #[config(default = "\"label\".to_string()")]
    pub label: String,

    /// Read at most this many rows
    pub limit: Option<usize>,
}

/// Where the text and label live in each record
struct Layout {
    text: usize,
    label: Option<usize>,
}

impl Layout {
    /// Use the header when it names the text column, positional columns otherwise. A first row
    /// that names the label column but not the text column is rejected.
    ///
    /// Returns the layout and whether the first record is a header.
    fn detect(first: &StringRecord, columns: &ColumnsConfig, labeled: bool) -> Result<(Self, bool)> {
        let position = |name: &str| first.iter().position(|field| field.trim() == name);

        let Some(text) = position(&columns.text) else {
            // A header row naming only the label column means the text column name is wrong
            if position(&columns.label).is_some() {
                return Err(Error::Format(format!(
                    "the header has a {:?} column but no {:?} column",
                    columns.label, columns.text
                )));
            }

            return Ok((Layout { text: 0, label: Some(1) }, false));
        };

        let label = position(&columns.label);
        if labeled && label.is_none() {
            return Err(Error::Format(format!(
                "the header has a {:?} column but no {:?} column",
                columns.text, columns.label
            )));
        }

        Ok((Layout { text, label }, true))
    }
}

/// Read a comma or tab separated file
pub fn read(path: impl AsRef<Path>, columns: &ColumnsConfig, labeled: bool) -> Result<TextDataset> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)?;

    log::debug!("Reading {}", path.display());

    parse(&content, columns, labeled)
}

/// Parse delimited text.
///
/// The delimiter is a tab when the first line contains one, a comma otherwise. Rows with an empty
/// text are dropped, as are rows without a label when `labeled` is set.
pub fn parse(content: &str, columns: &ColumnsConfig, labeled: bool) -> Result<TextDataset> {
    let first_line = content.lines().next().unwrap_or_default();
    let delimiter = if first_line.contains('\t') { b'\t' } else { b',' };

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut records = reader.records();

    let first = match records.next() {
        Some(record) => record.map_err(|e| Error::Format(e.to_string()))?,
        None => return Ok(TextDataset::new(Vec::new())),
    };

    let (layout, has_header) = Layout::detect(&first, columns, labeled)?;
    let pending = if has_header { None } else { Some(first) };
    let limit = columns.limit.unwrap_or(usize::MAX);

    let mut items = Vec::new();
    let mut skipped = 0;

    for record in pending.into_iter().map(Ok).chain(records) {
        if items.len() >= limit {
            break;
        }

        let record = record.map_err(|e| Error::Format(e.to_string()))?;

        let text = record.get(layout.text).unwrap_or_default().trim();
        let label = layout
            .label
            .and_then(|column| record.get(column))
            .map(str::trim)
            .filter(|label| !label.is_empty());

        if text.is_empty() || (labeled && label.is_none()) {
            skipped += 1;
            continue;
        }

        items.push(Item::new(text.to_string(), label.map(str::to_string)));
    }

    if skipped > 0 {
        log::warn!("Skipped {} row(s) with a missing text or label", skipped);
    }

    Ok(TextDataset::new(items))
}

#[cfg(test)]
mod tests {
    use burn::data::dataset::Dataset;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_header_selects_columns() {
        let content = "id,label,text\n1,pos,good movie\n2,neg,bad movie\n";
        let dataset = parse(content, &ColumnsConfig::new(), true).unwrap();

        assert_eq!(
            dataset.items(),
            vec![
                Item::labeled("good movie", "pos"),
                Item::labeled("bad movie", "neg")
            ]
        );
    }

    #[test]
    fn test_positional_columns_without_header() {
        let content = "good movie\tpos\nbad movie\tneg\n";
        let dataset = parse(content, &ColumnsConfig::new(), true).unwrap();

        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.get(0), Some(Item::labeled("good movie", "pos")));
    }

    #[test]
    fn test_custom_column_names() {
        let content = "sentence,sentiment\n\"fine, really\",pos\n";
        let columns = ColumnsConfig::new()
            .with_text("sentence".to_string())
            .with_label("sentiment".to_string());

        let dataset = parse(content, &columns, true).unwrap();

        assert_eq!(dataset.items(), vec![Item::labeled("fine, really", "pos")]);
    }

    #[test]
    fn test_incomplete_rows_are_dropped() {
        let content = "text,label\n,pos\ngood,\nfine,pos\n";

        let labeled = parse(content, &ColumnsConfig::new(), true).unwrap();
        assert_eq!(labeled.items(), vec![Item::labeled("fine", "pos")]);

        let unlabeled = parse(content, &ColumnsConfig::new(), false).unwrap();
        assert_eq!(unlabeled.texts(), vec!["good", "fine"]);
    }

    #[test]
    fn test_limit() {
        let content = "a,x\nb,y\nc,z\n";
        let columns = ColumnsConfig::new().with_limit(Some(2));

        assert_eq!(parse(content, &columns, true).unwrap().len(), 2);
    }

    #[test]
    fn test_missing_label_column_is_a_format_error() {
        let content = "text,other\nhello,x\n";

        assert!(matches!(
            parse(content, &ColumnsConfig::new(), true),
            Err(Error::Format(_))
        ));
        assert_eq!(parse(content, &ColumnsConfig::new(), false).unwrap().len(), 1);
    }

    #[test]
    fn test_header_without_the_text_column_is_a_format_error() {
        let content = "review,label\ngood movie,pos\n";

        let result = parse(content, &ColumnsConfig::new(), true);

        assert!(matches!(result, Err(Error::Format(message)) if message.contains("\"text\"")));
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(parse("", &ColumnsConfig::new(), true).unwrap().len(), 0);
    }
}
