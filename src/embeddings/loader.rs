use std::io::BufRead;

use crate::error::{Error, Result};

use super::{Embeddings, EmbeddingsConfig};

/// Load a text-format pretrained vector source.
///
/// Each line holds a token followed by its components, separated by whitespace (the GloVe
/// layout). A leading word2vec header of exactly two integers is skipped, as are blank lines.
pub fn load<R: BufRead>(reader: R, config: &EmbeddingsConfig) -> Result<Embeddings> {
    let pairs = reader
        .lines()
        .enumerate()
        .filter_map(|(index, line)| match line {
            Ok(line) => parse_line(index + 1, &line).transpose(),
            Err(e) => Some(Err(Error::Io(e))),
        });

    Embeddings::from_pairs(pairs, config)
}

/// Parse one source line into a token and its vector
fn parse_line(number: usize, line: &str) -> Result<Option<(String, Vec<f32>)>> {
    let mut fields = line.split_whitespace();

    let Some(token) = fields.next() else {
        return Ok(None);
    };

    let values = fields.collect::<Vec<_>>();

    if number == 1 && is_header(token, &values) {
        log::debug!("Skipping word2vec header line: {}", line.trim());
        return Ok(None);
    }

    if values.is_empty() {
        return Err(Error::Format(format!(
            "line {}: token {:?} has no vector",
            number, token
        )));
    }

    let vector = values
        .iter()
        .map(|value| {
            value.parse::<f32>().map_err(|_| {
                Error::Format(format!(
                    "line {}: {:?} is not a number in the vector for {:?}",
                    number, value, token
                ))
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Some((token.to_string(), vector)))
}

fn is_header(first: &str, rest: &[&str]) -> bool {
    rest.len() == 1 && first.parse::<usize>().is_ok() && rest[0].parse::<usize>().is_ok()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn config(dimension: usize) -> EmbeddingsConfig {
        EmbeddingsConfig::new().with_dimension(dimension)
    }

    #[test]
    fn test_load_glove_lines() {
        let source = "good 1.0 0.0 0.5\nbad 0.0 1.0 -0.5\n\nmovie 0.1 0.1 0.1\n";
        let embeddings = load(source.as_bytes(), &config(3)).unwrap();

        assert_eq!(embeddings.vocabulary().len(), 5);
        assert_eq!(embeddings.vector("bad"), &[0.0, 1.0, -0.5]);
        assert_eq!(embeddings.lookup("movie"), 4);
    }

    #[test]
    fn test_word2vec_header_is_skipped() {
        let source = "2 2\nx 1 2\ny 3 4\n";
        let embeddings = load(source.as_bytes(), &config(2)).unwrap();

        assert_eq!(embeddings.vocabulary().len(), 4);
        assert_eq!(embeddings.lookup("x"), 2);
    }

    #[test]
    fn test_unparsable_component() {
        let source = "x 1.0 abc\n";

        match load(source.as_bytes(), &config(2)) {
            Err(Error::Format(message)) => assert!(message.contains("line 1")),
            other => panic!("expected a format error, got {:?}", other),
        }
    }

    #[test]
    fn test_token_without_vector() {
        assert!(matches!(
            load("lonely\n".as_bytes(), &config(2)),
            Err(Error::Format(_))
        ));
    }

    #[test]
    fn test_mixed_dimensions_fail() {
        let long = vec!["0.5"; 300].join(" ");
        let short = vec!["0.5"; 50].join(" ");
        let source = format!("first {}\nsecond {}\n", long, short);

        assert!(matches!(
            load(source.as_bytes(), &EmbeddingsConfig::new()),
            Err(Error::Format(_))
        ));
    }
}
