//! CSV/TSV parsing with dialect sniffing.
//!
//! Detection sniffs a delimiter over the first 8 KiB: a candidate
//! qualifies when it appears in the header line and every sampled line
//! carries the same count of it outside quotes. Inputs with fewer than
//! two columns or no data rows are rejected so prose never parses as a
//! one-column table.

use indexmap::IndexMap;

use crate::error::{ParseError, ParseResult};
use crate::value::{coerce_scalar, Value};

const SNIFF_SAMPLE_BYTES: usize = 8192;
const SNIFF_SAMPLE_LINES: usize = 8;
const CANDIDATE_DELIMITERS: &[u8] = b",\t|;";

/// Auto-detecting CSV entry point.
pub fn try_parse(text: &str) -> ParseResult<Value> {
    let delimiter = sniff_delimiter(text)
        .ok_or_else(|| ParseError::new("csv", "could not detect a delimiter"))?;
    parse_with_delimiter(text, delimiter, "csv")
}

/// Tab-forced entry point, used by the `tsv` format hint.
pub fn try_parse_tsv(text: &str) -> ParseResult<Value> {
    parse_with_delimiter(text, b'\t', "tsv")
}

fn parse_with_delimiter(text: &str, delimiter: u8, format: &'static str) -> ParseResult<Value> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| ParseError::new(format, e.to_string()))?
        .clone();
    if headers.len() < 2 {
        return Err(ParseError::new(format, "fewer than 2 columns detected"));
    }
    let columns: Vec<String> = headers.iter().map(|h| h.trim().to_string()).collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| ParseError::new(format, e.to_string()))?;
        let mut row: IndexMap<String, Value> = IndexMap::with_capacity(columns.len());
        for (column, cell) in columns.iter().zip(record.iter()) {
            row.insert(column.clone(), coerce_scalar(cell.trim()));
        }
        rows.push(Value::Obj(row));
    }
    if rows.is_empty() {
        return Err(ParseError::new(format, "no data rows"));
    }

    Ok(Value::Arr(rows))
}

/// Pick the delimiter whose per-line count is consistent across the sample.
fn sniff_delimiter(text: &str) -> Option<u8> {
    let sample = if text.len() <= SNIFF_SAMPLE_BYTES {
        text
    } else {
        let mut end = SNIFF_SAMPLE_BYTES;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        &text[..end]
    };

    let lines: Vec<&str> = sample
        .lines()
        .filter(|l| !l.trim().is_empty())
        .take(SNIFF_SAMPLE_LINES)
        .collect();
    if lines.len() < 2 {
        return None;
    }

    let mut best: Option<(u8, usize)> = None;
    for &candidate in CANDIDATE_DELIMITERS {
        let counts: Vec<usize> = lines
            .iter()
            .map(|l| count_outside_quotes(l, candidate))
            .collect();
        let first = counts[0];
        if first == 0 || counts.iter().any(|&c| c != first) {
            continue;
        }
        if best.map(|(_, n)| first > n).unwrap_or(true) {
            best = Some((candidate, first));
        }
    }
    best.map(|(d, _)| d)
}

fn count_outside_quotes(line: &str, delimiter: u8) -> usize {
    let mut in_quotes = false;
    let mut count = 0;
    for b in line.bytes() {
        match b {
            b'"' => in_quotes = !in_quotes,
            b if b == delimiter && !in_quotes => count += 1,
            _ => {}
        }
    }
    count
}
