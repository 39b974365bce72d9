//! Plate reader export parsing
//!
//! Expected layout, one header line followed by one line per plate row:
//!
//! ```text
//! ,1,2,3,4,5,6,7,8,9,10,11,12
//! A,0.41,0.39,...
//! ...
//! H,0.12,0.50,...
//! ```
//!
//! Fields may be separated by commas, tabs or spaces. Rows can appear in any
//! order but each of A-H must appear exactly once. Blank lines and lines
//! starting with `#` are ignored.

use std::fs;
use std::path::{Path, PathBuf};

use dilutor_core::grid::MeasurementGrid;
use dilutor_core::{Well, PLATE_COLUMNS, PLATE_ROWS};
use thiserror::Error;
use tracing::debug;

/// Plate readings errors
#[derive(Debug, Error)]
pub enum ReadingsError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("readings file is empty")]
    Empty,

    #[error("line {line}: '{label}' is not a plate row (A-H)")]
    UnknownRow { line: usize, label: String },

    #[error("line {line}: row {row} appears more than once")]
    DuplicateRow { line: usize, row: char },

    #[error("line {line}: row {row} has {found} values, expected {}", PLATE_COLUMNS)]
    ColumnCount { line: usize, row: char, found: usize },

    #[error("line {line}: '{value}' in {well} is not a number")]
    InvalidNumber {
        line: usize,
        well: Well,
        value: String,
    },

    #[error("row {0} is missing")]
    MissingRow(char),
}

/// Read and parse a readings file
pub fn load(path: &Path) -> Result<MeasurementGrid, ReadingsError> {
    let text = fs::read_to_string(path).map_err(|source| ReadingsError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let grid = parse(&text)?;
    debug!("Read plate readings from {}", path.display());
    Ok(grid)
}

/// Parse readings text into a measurement grid
pub fn parse(text: &str) -> Result<MeasurementGrid, ReadingsError> {
    let mut lines = text
        .lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'));

    // Header
    lines.next().ok_or(ReadingsError::Empty)?;

    let mut grid = MeasurementGrid::filled(0.0);
    let mut seen = [false; PLATE_ROWS];

    for (line_no, line) in lines {
        let mut fields = line
            .split([',', '\t', ' '])
            .map(str::trim)
            .filter(|f| !f.is_empty());

        let label = fields.next().unwrap_or_default();
        let row = row_index(label).ok_or_else(|| ReadingsError::UnknownRow {
            line: line_no,
            label: label.to_string(),
        })?;
        let letter = (b'A' + row as u8) as char;
        if seen[row] {
            return Err(ReadingsError::DuplicateRow {
                line: line_no,
                row: letter,
            });
        }
        seen[row] = true;

        let values: Vec<&str> = fields.collect();
        if values.len() != PLATE_COLUMNS {
            return Err(ReadingsError::ColumnCount {
                line: line_no,
                row: letter,
                found: values.len(),
            });
        }

        for (column, value) in values.into_iter().enumerate() {
            let Some(well) = Well::new(row, column) else {
                continue;
            };
            grid[well] = value.parse().map_err(|_| ReadingsError::InvalidNumber {
                line: line_no,
                well,
                value: value.to_string(),
            })?;
        }
    }

    if let Some(missing) = seen.iter().position(|s| !s) {
        return Err(ReadingsError::MissingRow((b'A' + missing as u8) as char));
    }

    Ok(grid)
}

/// Row index for a label like "A" or "h"
fn row_index(label: &str) -> Option<usize> {
    let mut chars = label.chars();
    let letter = chars.next()?;
    if chars.next().is_some() {
        return None;
    }
    Well::from_letter(letter, 0).map(|w| w.row())
}
