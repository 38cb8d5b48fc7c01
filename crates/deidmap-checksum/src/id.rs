//! Surrogate identifier values and batch generation.
//!
//! A surrogate id is an optional alphanumeric prefix, a zero-padded
//! numeric body, and a trailing Verhoeff check digit. Hyphens may
//! separate the parts for readability; they carry no checksum weight.

use crate::verhoeff;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Errors from constructing or generating surrogate identifiers.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SurrogateIdError {
    #[error("surrogate id is empty")]
    Empty,

    #[error("surrogate id {id:?} contains unsupported character {found:?}")]
    InvalidCharacter { id: String, found: char },

    #[error("surrogate id {0:?} fails check-digit verification")]
    BadCheckDigit(String),

    #[error("surrogate id {0:?} is too short to carry a check digit")]
    TooShort(String),
}

/// A checksum-verified surrogate identifier.
///
/// Construction via [`SurrogateId::parse`] is the only way to obtain a
/// value, so every `SurrogateId` in the system satisfies Verhoeff
/// verification. Display preserves the original spelling, separators
/// included.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct SurrogateId(String);

impl SurrogateId {
    /// Parse and verify a surrogate identifier.
    ///
    /// Hyphen separators are stripped before checksum verification;
    /// letters map through the alphabet rule. Anything else is rejected.
    pub fn parse(value: &str) -> Result<Self, SurrogateIdError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(SurrogateIdError::Empty);
        }

        let mut digits = Vec::with_capacity(trimmed.len());
        for c in trimmed.chars() {
            if c == '-' {
                continue;
            }
            let digit =
                verhoeff::digit_of(c).map_err(|_| SurrogateIdError::InvalidCharacter {
                    id: trimmed.to_string(),
                    found: c,
                })?;
            digits.push(digit);
        }

        if digits.len() < 2 {
            return Err(SurrogateIdError::TooShort(trimmed.to_string()));
        }
        if !verhoeff::verify(&digits) {
            return Err(SurrogateIdError::BadCheckDigit(trimmed.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for SurrogateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for SurrogateId {
    type Err = SurrogateIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for SurrogateId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Append a Verhoeff check digit to an alphanumeric identifier.
pub fn append_check_digit(id: &str) -> Result<String, SurrogateIdError> {
    let digits = verhoeff::digits_of(id).map_err(|e| match e {
        verhoeff::ChecksumError::NonAlphanumeric(found) => SurrogateIdError::InvalidCharacter {
            id: id.to_string(),
            found,
        },
    })?;
    if digits.is_empty() {
        return Err(SurrogateIdError::Empty);
    }
    Ok(format!("{id}{}", verhoeff::compute(&digits)))
}

/// Parameters for batch identifier generation.
#[derive(Debug, Clone)]
pub struct GenerateIds {
    /// Number of identifiers to produce.
    pub count: u64,
    /// Alphanumeric prefix, may be empty.
    pub prefix: String,
    /// Numeric bodies start at `offset + 1`.
    pub offset: u64,
    /// Minimum total identifier length (prefix + body + check digit);
    /// bodies are zero-padded up to it.
    pub length: Option<usize>,
}

/// Generate `count` sequential checksum-valid identifiers.
///
/// Bodies run from `offset + 1` through `offset + count`, zero-padded to
/// a uniform width so the pool file sorts the way it allocates.
pub fn generate_ids(params: &GenerateIds) -> Result<Vec<SurrogateId>, SurrogateIdError> {
    let GenerateIds {
        count,
        prefix,
        offset,
        length,
    } = params;

    let highest = offset + count;
    let mut total = prefix.len() + highest.to_string().len() + 1;
    if let Some(length) = length
        && *length > total
    {
        total = *length;
    }
    let body_width = total - prefix.len() - 1;

    let mut ids = Vec::with_capacity(*count as usize);
    for n in (offset + 1)..=highest {
        let bare = format!("{prefix}{n:0body_width$}");
        let full = append_check_digit(&bare)?;
        ids.push(SurrogateId::parse(&full)?);
    }
    Ok(ids)
}
