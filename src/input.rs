//! Feedback input sources.
//!
//! Every source produces the same thing: trimmed, non-blank feedback lines
//! in their original order. Supported files:
//! - Plain text (`.txt`, `.text`, or no extension): one item per line
//! - CSV (`.csv`): first column of each row, header row skipped

use std::fs;
use std::io::Read;
use std::path::Path;

use csv::ReaderBuilder;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InputError {
    #[error("Unsupported input format: .{0} (expected .txt or .csv)")]
    UnsupportedFormat(String),

    #[error("Failed to read input: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid CSV input: {0}")]
    Csv(#[from] csv::Error),
}

/// Split pasted text into feedback lines, dropping blank ones.
pub fn split_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Read feedback lines from a file, choosing the parser by extension.
pub fn read_feedback_file(path: &Path) -> Result<Vec<String>, InputError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase());

    match ext.as_deref() {
        None | Some("txt") | Some("text") => {
            let text = fs::read_to_string(path)?;
            Ok(split_lines(&text))
        }
        Some("csv") => read_csv_first_column(fs::File::open(path)?),
        Some(other) => Err(InputError::UnsupportedFormat(other.to_string())),
    }
}

/// Read pasted feedback from standard input.
pub fn read_feedback_stdin() -> Result<Vec<String>, InputError> {
    let mut text = String::new();
    std::io::stdin().read_to_string(&mut text)?;
    Ok(split_lines(&text))
}

/// First column of every CSV record after the header row.
pub fn read_csv_first_column<R: Read>(reader: R) -> Result<Vec<String>, InputError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let mut lines = Vec::new();
    for record in reader.records() {
        let record = record?;
        if let Some(cell) = record.get(0) {
            // A quoted cell can hold embedded newlines; each becomes its own item
            lines.extend(split_lines(cell));
        }
    }
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn split_lines_drops_blanks_and_trims() {
        let lines = split_lines("Great app!\n  Crashes on load  \n\n   \r\nNeeds dark mode\n");
        assert_eq!(lines, vec!["Great app!", "Crashes on load", "Needs dark mode"]);
    }

    #[test]
    fn split_lines_of_blank_text_is_empty() {
        assert!(split_lines("\n \n\t\n").is_empty());
    }

    #[test]
    fn csv_first_column_skips_header_and_blanks() {
        let data = "feedback,rating\nGreat app!,5\n,3\n\"Slow, very slow\",1\nShort row\n";
        let lines = read_csv_first_column(data.as_bytes()).unwrap();
        assert_eq!(lines, vec!["Great app!", "Slow, very slow", "Short row"]);
    }

    #[test]
    fn reads_text_and_csv_files() {
        let dir = tempfile::tempdir().unwrap();

        let txt = dir.path().join("feedback.TXT");
        fs::write(&txt, "one\n\ntwo\n").unwrap();
        assert_eq!(read_feedback_file(&txt).unwrap(), vec!["one", "two"]);

        let csv_path = dir.path().join("feedback.csv");
        let mut f = fs::File::create(&csv_path).unwrap();
        writeln!(f, "Comment").unwrap();
        writeln!(f, "Loves it").unwrap();
        assert_eq!(read_feedback_file(&csv_path).unwrap(), vec!["Loves it"]);
    }

    #[test]
    fn rejects_unsupported_extensions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("feedback.xlsx");
        fs::write(&path, b"PK").unwrap();
        match read_feedback_file(&path) {
            Err(InputError::UnsupportedFormat(ext)) => assert_eq!(ext, "xlsx"),
            other => panic!("expected UnsupportedFormat, got {:?}", other),
        }
    }
}
