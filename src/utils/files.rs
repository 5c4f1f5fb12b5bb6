use std::{
    fs::File,
    io::{self, BufRead, BufReader},
    path::Path,
};

/// Read a file from the given path into a list of strings
pub fn read_lines(path: impl AsRef<Path>) -> io::Result<Vec<String>> {
    let reader = BufReader::new(File::open(path)?);

    reader.lines().collect()
}
