//! # Phone Numbers
//!
//! Normalization of Kenyan mobile numbers to the canonical international
//! form (`2547XXXXXXXX`) expected by the provider.

use crate::error::PaymentError;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Country calling code prepended to local numbers
pub const COUNTRY_CODE: &str = "254";

/// Length of a canonical number (country code + 9 digit subscriber number)
const CANONICAL_LEN: usize = 12;

/// Phone parsing errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PhoneError {
    /// Input matched none of the accepted shapes
    #[error("Phone number must be in one of: 07XXXXXXXX, 7XXXXXXXX, 2547XXXXXXXX, +2547XXXXXXXX")]
    InvalidFormat,
}

impl From<PhoneError> for PaymentError {
    fn from(err: PhoneError) -> Self {
        PaymentError::Validation(err.to_string())
    }
}

/// A phone number in canonical 12-digit international format
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct PhoneNumber(String);

impl PhoneNumber {
    /// Normalize a phone number.
    ///
    /// Accepted shapes, first match wins:
    /// - `+2547XXXXXXXX` (the `+` is stripped, the rest must be international)
    /// - `07XXXXXXXX` (leading `0` replaced with the country code)
    /// - `7XXXXXXXX` (country code prepended)
    /// - `2547XXXXXXXX` (accepted as-is)
    pub fn parse(input: &str) -> Result<Self, PhoneError> {
        let p = input.trim();

        if !p.is_empty() && !p[p.starts_with('+') as usize..].bytes().all(|b| b.is_ascii_digit()) {
            return Err(PhoneError::InvalidFormat);
        }

        if let Some(rest) = p.strip_prefix('+') {
            return Self::international(rest).ok_or(PhoneError::InvalidFormat);
        }

        if p.starts_with('0') && p.len() == 10 {
            return Ok(Self(format!("{}{}", COUNTRY_CODE, &p[1..])));
        }

        if p.starts_with('7') && p.len() == 9 {
            return Ok(Self(format!("{}{}", COUNTRY_CODE, p)));
        }

        Self::international(p).ok_or(PhoneError::InvalidFormat)
    }

    fn international(p: &str) -> Option<Self> {
        (p.starts_with(COUNTRY_CODE) && p.len() == CANONICAL_LEN).then(|| Self(p.to_string()))
    }

    /// Get the canonical string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Masked form for logs (`2547*****678`)
    pub fn masked(&self) -> String {
        format!("{}*****{}", &self.0[..4], &self.0[9..])
    }
}

impl FromStr for PhoneNumber {
    type Err = PhoneError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PhoneNumber {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
