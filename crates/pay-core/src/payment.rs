//! # Payment Input
//!
//! Validation of the raw `phone` / `amount` pair submitted by clients.
//! Fields may arrive from a JSON body, a form body, or a query string, so
//! they are collected into [`PaymentFields`] before validation.

use crate::error::{PaymentError, PaymentResult};
use crate::phone::PhoneNumber;
use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// Amount used when the client does not send one
pub const DEFAULT_AMOUNT: &str = "200";

const PHONE_REQUIRED: &str = "phone is required";
const AMOUNT_INVALID: &str = "amount must be a positive number";

/// Raw amount as received from the client
#[derive(Debug, Clone, PartialEq)]
pub enum RawAmount {
    /// Text (form fields, query strings, JSON strings)
    Text(String),
    /// JSON number
    Number(f64),
    /// Anything else found in a JSON body (null, bool, array, object)
    Other(Value),
}

impl RawAmount {
    /// An explicit `null` is kept as `Other` so it fails validation
    /// instead of falling back to the default amount.
    fn from_json(value: &Value) -> Self {
        match value {
            Value::String(s) => RawAmount::Text(s.clone()),
            Value::Number(n) => match n.as_f64() {
                Some(f) => RawAmount::Number(f),
                None => RawAmount::Other(value.clone()),
            },
            other => RawAmount::Other(other.clone()),
        }
    }
}

/// A validated whole-unit amount (KES), always >= 1
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Amount(u64);

impl Amount {
    /// Parse a raw amount.
    ///
    /// Numeric input is truncated toward zero, so `"200.9"` becomes `200`.
    /// Non-numeric, non-finite, zero and negative values are rejected.
    pub fn parse(raw: &RawAmount) -> PaymentResult<Self> {
        let value = match raw {
            RawAmount::Text(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| PaymentError::Validation(AMOUNT_INVALID.to_string()))?,
            RawAmount::Number(f) => *f,
            RawAmount::Other(_) => return Err(PaymentError::Validation(AMOUNT_INVALID.to_string())),
        };

        if !value.is_finite() {
            return Err(PaymentError::Validation(AMOUNT_INVALID.to_string()));
        }

        let truncated = value.trunc();
        if truncated < 1.0 || truncated > u64::MAX as f64 {
            return Err(PaymentError::Validation(AMOUNT_INVALID.to_string()));
        }

        Ok(Self(truncated as u64))
    }

    /// Amount in whole units
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unvalidated fields of a payment request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PaymentFields {
    pub phone: Option<String>,
    pub amount: Option<RawAmount>,
}

impl PaymentFields {
    /// Collect fields from a JSON object. Non-object values yield no fields.
    pub fn from_json(value: &Value) -> Self {
        let Some(obj) = value.as_object() else {
            return Self::default();
        };

        let phone = obj.get("phone").and_then(|v| match v {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        });

        let amount = obj.get("amount").map(RawAmount::from_json);

        Self { phone, amount }
    }

    /// Collect fields from decoded `key=value` pairs (form body or query string).
    /// The first occurrence of a key wins.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut fields = Self::default();
        for (key, value) in pairs {
            match key.as_ref() {
                "phone" if fields.phone.is_none() => fields.phone = Some(value.into()),
                "amount" if fields.amount.is_none() => {
                    fields.amount = Some(RawAmount::Text(value.into()))
                }
                _ => {}
            }
        }
        fields
    }

    /// True if neither field was supplied
    pub fn is_empty(&self) -> bool {
        self.phone.is_none() && self.amount.is_none()
    }

    /// Validate into a [`PaymentInput`].
    ///
    /// Checks run in order: phone presence, phone shape, amount.
    pub fn validate(&self) -> PaymentResult<PaymentInput> {
        let raw_phone = self
            .phone
            .as_deref()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| PaymentError::Validation(PHONE_REQUIRED.to_string()))?;

        let phone = PhoneNumber::parse(raw_phone)?;

        let default_amount = RawAmount::Text(DEFAULT_AMOUNT.to_string());
        let amount = Amount::parse(self.amount.as_ref().unwrap_or(&default_amount))?;

        Ok(PaymentInput { phone, amount })
    }
}

/// Validated payment input, ready to be pushed to a provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentInput {
    pub phone: PhoneNumber,
    pub amount: Amount,
}
