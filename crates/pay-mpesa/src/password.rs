//! # STK Password
//!
//! Daraja signs each STK push with `base64(short_code + passkey + timestamp)`.

use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, TimeZone};
use pay_core::{PaymentError, PaymentResult};

/// Timestamp layout Daraja expects (`YYYYMMDDHHMMSS`)
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// Format a timestamp for the `Timestamp` field and the password.
pub fn stk_timestamp<Tz>(at: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// Build the STK push password.
pub fn build_password(short_code: &str, passkey: &str, timestamp: &str) -> PaymentResult<String> {
    if short_code.is_empty() || passkey.is_empty() {
        return Err(PaymentError::MissingConfiguration(
            "PASSKEY and BUSINESS_SHORT_CODE must be set".to_string(),
        ));
    }

    let data = format!("{}{}{}", short_code, passkey, timestamp);
    Ok(STANDARD.encode(data.as_bytes()))
}
