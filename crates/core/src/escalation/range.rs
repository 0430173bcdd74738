use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const UNBOUNDED_MARKER: &str = "+∞";

/// Closed-open interval `[lower; upper[` over inactivity days. A missing upper
/// bound means the interval is unbounded above.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Range {
    lower: u32,
    upper: Option<u32>,
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum RangeParseError {
    #[error("range `{input}` must look like `[m;M[` or `[m;+∞[`")]
    Malformed { input: String },
    #[error("range `{input}` has a bound that does not fit in 32 bits")]
    Overflow { input: String },
    #[error("range `{input}` is empty: lower bound {lower} is not below upper bound {upper}")]
    Empty { input: String, lower: u32, upper: u32 },
}

impl Range {
    pub fn new(lower: u32, upper: Option<u32>) -> Result<Self, RangeParseError> {
        match upper {
            Some(upper) if lower >= upper => Err(RangeParseError::Empty {
                input: format!("[{lower};{upper}["),
                lower,
                upper,
            }),
            _ => Ok(Self { lower, upper }),
        }
    }

    pub fn unbounded(lower: u32) -> Self {
        Self { lower, upper: None }
    }

    pub fn lower(&self) -> u32 {
        self.lower
    }

    pub fn upper(&self) -> Option<u32> {
        self.upper
    }

    pub fn is_in(&self, x: u32) -> bool {
        match self.upper {
            Some(upper) => self.lower <= x && x < upper,
            None => x >= self.lower,
        }
    }

    pub fn from_string(raw: &str) -> Result<Self, RangeParseError> {
        raw.parse()
    }
}

impl FromStr for Range {
    type Err = RangeParseError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let malformed = || RangeParseError::Malformed { input: raw.to_string() };

        let body = raw
            .trim()
            .strip_prefix('[')
            .and_then(|rest| rest.strip_suffix('['))
            .ok_or_else(malformed)?;
        let (lower_raw, upper_raw) = body.split_once(';').ok_or_else(malformed)?;

        // blanks are only tolerated around the separator
        let lower_raw = lower_raw.trim_end_matches([' ', '\t']);
        let upper_raw = upper_raw.trim_start_matches([' ', '\t']);

        let lower = parse_bound(raw, lower_raw)?.ok_or_else(malformed)?;
        let upper = if upper_raw == UNBOUNDED_MARKER { None } else { parse_bound(raw, upper_raw)? };

        Range::new(lower, upper).map_err(|error| match error {
            RangeParseError::Empty { lower, upper, .. } => {
                RangeParseError::Empty { input: raw.to_string(), lower, upper }
            }
            other => other,
        })
    }
}

fn parse_bound(input: &str, digits: &str) -> Result<Option<u32>, RangeParseError> {
    if digits.is_empty() {
        return Ok(None);
    }
    if !digits.bytes().all(|byte| byte.is_ascii_digit()) {
        return Err(RangeParseError::Malformed { input: input.to_string() });
    }
    digits
        .parse::<u32>()
        .map(Some)
        .map_err(|_| RangeParseError::Overflow { input: input.to_string() })
}

impl TryFrom<String> for Range {
    type Error = RangeParseError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        raw.parse()
    }
}

impl From<Range> for String {
    fn from(range: Range) -> Self {
        range.to_string()
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.upper {
            Some(upper) => write!(f, "[{};{}[", self.lower, upper),
            None => write!(f, "[{};{UNBOUNDED_MARKER}[", self.lower),
        }
    }
}
