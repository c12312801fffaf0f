//! Streaming JSON5 loading for catalog and requirement records
//!
//! Supports both single-line JSONL and multi-line JSON5 formats.
//! JSON5 adds support for comments, trailing commas, and unquoted keys.
//!
//! Parsing is lenient: a malformed chunk becomes a [`Warning`] and parsing
//! resumes at the next balanced chunk, so one bad record does not hide the
//! rest of the file. Catalog validation applies the same
//! accumulate-then-report policy afterwards.

use std::io::Read;

use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::catalog::{Catalog, CatalogError};
use crate::records::{CatalogRecord, RequirementRecord, Warning};

/// Error type for parsing failures.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("line {line}: {message}")]
pub struct ParseError {
    pub message: String,
    pub line: usize,
}

/// Result of parsing a catalog stream.
#[derive(Debug, Clone, Default)]
pub struct CatalogParse {
    pub records: Vec<CatalogRecord>,
    pub warnings: Vec<Warning>,
}

/// Result of parsing a requirement stream.
#[derive(Debug, Clone, Default)]
pub struct RequirementParse {
    pub records: Vec<RequirementRecord>,
    pub warnings: Vec<Warning>,
}

/// Parse a single JSON5 catalog record.
///
/// Returns `Ok(CatalogRecord)` on success, or `Err(ParseError)` carrying
/// the given line number if parsing fails.
pub fn parse_record(input: &str, line_number: usize) -> Result<CatalogRecord, ParseError> {
    json5::from_str(input).map_err(|e| ParseError {
        message: e.to_string(),
        line: line_number,
    })
}

/// Parse a stream of JSON5 catalog records.
pub fn parse_catalog<R: Read>(reader: R) -> CatalogParse {
    let (records, warnings) = parse_objects(reader);
    CatalogParse { records, warnings }
}

/// Parse a stream of JSON5 requirement records.
pub fn parse_requirements<R: Read>(reader: R) -> RequirementParse {
    let (records, warnings) = parse_objects(reader);
    RequirementParse { records, warnings }
}

/// Parse and build a catalog in one step.
///
/// Parse warnings are returned alongside the catalog; validation errors
/// fail the whole load.
pub fn load_catalog<R: Read>(reader: R) -> Result<(Catalog, Vec<Warning>), CatalogError> {
    let parse = parse_catalog(reader);
    let catalog = Catalog::from_records(&parse.records)?;
    Ok((catalog, parse.warnings))
}

/// Parse a stream of JSON5 objects of any record type.
///
/// Objects may span multiple lines; chunks are delimited by balanced
/// braces/brackets outside of strings.
fn parse_objects<R: Read, T: DeserializeOwned>(reader: R) -> (Vec<T>, Vec<Warning>) {
    use std::io::BufRead;

    let mut objects = Vec::new();
    let mut warnings = Vec::new();
    let buf_reader = std::io::BufReader::new(reader);
    let mut lines = buf_reader.lines();

    let mut accumulator = String::new();
    let mut start_line = 1;
    let mut current_line = 1;
    let mut brace_depth: i32 = 0;
    let mut bracket_depth: i32 = 0;
    let mut in_string = false;
    let mut escape_next = false;

    while let Some(Ok(line)) = lines.next() {
        // Skip empty lines and comment-only lines when not accumulating
        let trimmed = line.trim();
        if accumulator.is_empty() && (trimmed.is_empty() || trimmed.starts_with("//")) {
            current_line += 1;
            start_line = current_line;
            continue;
        }

        if !accumulator.is_empty() {
            accumulator.push('\n');
        }
        accumulator.push_str(&line);

        // Track brace/bracket depth to detect complete objects
        for ch in line.chars() {
            if escape_next {
                escape_next = false;
                continue;
            }

            match ch {
                '\\' if in_string => escape_next = true,
                '"' if !in_string => in_string = true,
                '"' if in_string => in_string = false,
                '{' if !in_string => brace_depth += 1,
                '}' if !in_string => brace_depth -= 1,
                '[' if !in_string => bracket_depth += 1,
                ']' if !in_string => bracket_depth -= 1,
                _ => {}
            }
        }

        // Try to parse when braces are balanced
        if brace_depth == 0 && bracket_depth == 0 && !accumulator.trim().is_empty() {
            match json5::from_str::<T>(&accumulator) {
                Ok(obj) => objects.push(obj),
                Err(e) => warnings.push(Warning {
                    message: e.to_string(),
                    line: start_line,
                }),
            }

            accumulator.clear();
            start_line = current_line + 1;
            in_string = false;
            escape_next = false;
        }

        current_line += 1;
    }

    // Handle any remaining accumulated content
    if !accumulator.trim().is_empty() {
        match json5::from_str::<T>(&accumulator) {
            Ok(obj) => objects.push(obj),
            Err(e) => warnings.push(Warning {
                message: e.to_string(),
                line: start_line,
            }),
        }
    }

    (objects, warnings)
}
