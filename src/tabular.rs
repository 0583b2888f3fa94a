//! Tabular feature reader: parses a delimited text payload into an ordered
//! feature sequence.
//!
//! Accepts a single row of many cells, a single column of one-cell rows, or
//! anything else flattened row-major. Length validation is left to the
//! classifier wrapper.

use crate::error::{Result, ScreenError};

/// Parse a delimited payload into floats using the given cell delimiter.
pub fn read_features(payload: &str, delimiter: char) -> Result<Vec<f64>> {
    let rows: Vec<Vec<&str>> = payload
        .lines()
        .map(|line| line.split(delimiter).collect::<Vec<&str>>())
        .filter(|cells| cells.iter().any(|cell| !cell.trim().is_empty()))
        .collect();

    if rows.is_empty() {
        return Err(ScreenError::EmptyInput);
    }

    // Single row with many columns
    if rows.len() == 1 && rows[0].len() > 1 {
        return parse_cells(rows[0].iter().copied());
    }

    // Many rows, single column
    if rows.iter().all(|cells| cells.len() == 1) {
        return parse_cells(rows.iter().map(|cells| cells[0]));
    }

    // Fallback: flatten everything row-major
    parse_cells(rows.iter().flat_map(|cells| cells.iter().copied()))
}

/// Comma-delimited convenience wrapper
pub fn read_features_csv(payload: &str) -> Result<Vec<f64>> {
    read_features(payload, ',')
}

fn parse_cells<'a>(cells: impl Iterator<Item = &'a str>) -> Result<Vec<f64>> {
    cells
        .map(str::trim)
        .filter(|cell| !cell.is_empty())
        .map(|cell| {
            cell.parse::<f64>().map_err(|_| ScreenError::ValueParse {
                cell: cell.to_string(),
            })
        })
        .collect()
}
