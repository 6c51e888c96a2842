//! Optional checks run before the ranking tool is started.
//!
//! Enabled with `validate_inputs`. The rules mirror what the front-end enforces: impacts are a
//! comma-separated list of `+`/`-` (whitespace ignored), weights a comma-separated list of
//! numbers, and both lists have the same length. The recipient must parse as a mail address.
//! The tabular content of the upload is still left to the tool.

use lettre::Address;

use crate::errors::{Error, Result};

/// Parse a weights string such as `1, 1, 2.5`.
pub fn parse_weights(weights: &str) -> Result<Vec<f64>> {
    weights
        .split(',')
        .map(str::trim)
        .enumerate()
        .map(|(i, w)| match w.parse::<f64>() {
            Ok(value) if value.is_finite() => Ok(value),
            _ => Err(Error::BadRequest {
                message: format!("Weight {} ('{w}') is not a number", i + 1),
            }),
        })
        .collect()
}

/// Parse an impacts string such as `+,+,-`.
pub fn parse_impacts(impacts: &str) -> Result<Vec<char>> {
    let compact: String = impacts.chars().filter(|c| !c.is_whitespace()).collect();
    compact
        .split(',')
        .map(|i| match i {
            "+" => Ok('+'),
            "-" => Ok('-'),
            _ => Err(Error::BadRequest {
                message: "Impacts must only contain '+' or '-' separated by commas.".to_string(),
            }),
        })
        .collect()
}

/// Validate the text fields of an upload together.
pub fn validate_submission(weights: &str, impacts: &str, email: &str) -> Result<()> {
    let weights = parse_weights(weights)?;
    let impacts = parse_impacts(impacts)?;

    if weights.len() != impacts.len() {
        return Err(Error::BadRequest {
            message: format!(
                "Number of weights ({}) must match number of impacts ({})",
                weights.len(),
                impacts.len()
            ),
        });
    }

    email.trim().parse::<Address>().map_err(|e| Error::BadRequest {
        message: format!("Invalid email address '{email}': {e}"),
    })?;

    Ok(())
}
