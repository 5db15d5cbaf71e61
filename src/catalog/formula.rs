//! Interpretation rules for catalog entries.
//!
//! A [Formula] turns one string into another. Response entries use them to render the
//! data tail of a response, and packed request parameters use them to turn a supplied
//! value into the hex digits that are shifted into the sub-identifier.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::helpers;

/// Result of applying a formula
pub type FormulaResult<T> = Result<T, FormulaError>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
/// Error produced when a value cannot be run through a [Formula]
pub enum FormulaError {
    /// Input was expected to be hex
    #[error("'{0}' is not a hex value")]
    InvalidHex(String),
    /// Input was expected to be a decimal integer
    #[error("'{0}' is not a decimal integer")]
    InvalidInteger(String),
    /// Decoded bytes are not valid UTF-8
    #[error("'{0}' does not decode to UTF-8 text")]
    InvalidUtf8(String),
    /// Input is shorter than the formula needs
    #[error("Expected at least {expected} hex characters, got {actual}")]
    TooShort {
        /// Minimum length
        expected: usize,
        /// Length that was supplied
        actual: usize,
    },
    /// Intermediate value does not fit into 128 bits
    #[error("'{0}' is too large to interpret")]
    Overflow(String),
}

/// A pure string to string mapping
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Formula {
    /// Value is passed through as is
    #[default]
    Identity,
    /// Hex integer, multiplied by `factor`, and rendered with `decimals` digits after the decimal point.
    ///
    /// EG: `factor: 1, decimals: 1` turns `00002710` into `1000.0`
    ScaleDecimal {
        /// Multiplier applied to the raw integer
        factor: u64,
        /// Position of the decimal point, counted from the right
        decimals: u32,
    },
    /// Session timing parameters. The first 2 bytes are P2 in milliseconds,
    /// the next 2 bytes are P2* in units of 10 milliseconds.
    SplitTimingPair,
    /// Hex bytes decoded as UTF-8 text
    HexBytesToUtf8,
    /// Exact match lookup of the (case insensitive) hex value. Unmatched values are returned unchanged
    LookupTable {
        /// Hex value to text
        table: BTreeMap<String, String>,
    },
    /// Decimal integer rendered as lowercase hex
    IntToHexString,
}

impl Formula {
    /// Builds a [Formula::LookupTable] from pairs
    pub fn lookup<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Self::LookupTable {
            table: pairs
                .into_iter()
                .map(|(k, v)| (helpers::normalize_hex(k), v.to_string()))
                .collect(),
        }
    }

    /// Runs the formula against an input
    pub fn apply(&self, input: &str) -> FormulaResult<String> {
        match self {
            Formula::Identity => Ok(input.to_string()),
            Formula::ScaleDecimal { factor, decimals } => {
                let raw = parse_hex_int(input)?;
                let scaled = raw
                    .checked_mul(*factor as u128)
                    .ok_or_else(|| FormulaError::Overflow(input.to_string()))?;
                Ok(insert_decimal_point(scaled, *decimals as usize))
            }
            Formula::SplitTimingPair => {
                if !input.is_ascii() {
                    return Err(FormulaError::InvalidHex(input.to_string()));
                }
                if input.len() < 8 {
                    return Err(FormulaError::TooShort {
                        expected: 8,
                        actual: input.len(),
                    });
                }
                let p2 = parse_hex_int(&input[0..4])?;
                let p2_star = parse_hex_int(&input[4..8])? * 10;
                Ok(format!("{p2}ms, {p2_star}ms"))
            }
            Formula::HexBytesToUtf8 => {
                let bytes =
                    hex::decode(input).map_err(|_| FormulaError::InvalidHex(input.to_string()))?;
                String::from_utf8(bytes).map_err(|_| FormulaError::InvalidUtf8(input.to_string()))
            }
            Formula::LookupTable { table } => Ok(table
                .get(&helpers::normalize_hex(input))
                .cloned()
                .unwrap_or_else(|| input.to_string())),
            Formula::IntToHexString => {
                let value = input
                    .trim()
                    .parse::<u128>()
                    .map_err(|_| FormulaError::InvalidInteger(input.to_string()))?;
                Ok(format!("{value:x}"))
            }
        }
    }
}

fn parse_hex_int(input: &str) -> FormulaResult<u128> {
    if !input.is_ascii() || !helpers::is_hex(input) {
        return Err(FormulaError::InvalidHex(input.to_string()));
    }
    u128::from_str_radix(input, 16).map_err(|_| FormulaError::Overflow(input.to_string()))
}

fn insert_decimal_point(value: u128, decimals: usize) -> String {
    if decimals == 0 {
        return value.to_string();
    }
    let digits = format!("{value:0>width$}", width = decimals + 1);
    let (int_part, frac_part) = digits.split_at(digits.len() - decimals);
    format!("{int_part}.{frac_part}")
}
