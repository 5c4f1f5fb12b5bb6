use std::{ffi::OsString, io, path::Path};

use crate::utils::files::read_lines;

/// Replace every `@FILE` argument with the arguments listed in FILE.
///
/// Each non-blank line of the file is one argument, so `--epochs 5` is written on one line as
/// `--epochs=5` or on two lines. Files are not expanded recursively.
pub fn expand_arg_files<I>(args: I) -> io::Result<Vec<OsString>>
where
    I: IntoIterator<Item = OsString>,
{
    let mut expanded = Vec::new();

    for arg in args {
        match arg.to_str().and_then(|arg| arg.strip_prefix('@')) {
            Some(path) if !path.is_empty() => {
                expanded.extend(
                    read_lines(Path::new(path))?
                        .into_iter()
                        .map(|line| line.trim().to_string())
                        .filter(|line| !line.is_empty())
                        .map(OsString::from),
                );
            }
            _ => expanded.push(arg),
        }
    }

    Ok(expanded)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_arguments_are_read_from_files() {
        let path = std::env::temp_dir().join(format!("arg-file-{}.txt", std::process::id()));
        std::fs::write(&path, "--epochs=5\n\n  --batch-size\n16\n").unwrap();

        let args = vec![
            OsString::from("train.csv"),
            OsString::from(format!("@{}", path.display())),
            OsString::from("--shuffle"),
        ];
        let expanded = expand_arg_files(args).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(
            expanded,
            vec!["train.csv", "--epochs=5", "--batch-size", "16", "--shuffle"]
                .into_iter()
                .map(OsString::from)
                .collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_lone_at_sign_is_kept() {
        let expanded = expand_arg_files(vec![OsString::from("@")]).unwrap();

        assert_eq!(expanded, vec![OsString::from("@")]);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let args = vec![OsString::from("@/nonexistent/arguments.txt")];

        assert!(expand_arg_files(args).is_err());
    }
}
