//! # pay-core
//!
//! Core types and traits for the mpesa-relay STK push service.
//!
//! This crate provides:
//! - `PhoneNumber` normalization to the canonical international format
//! - `Amount` and `PaymentFields` validation of raw client input
//! - `PushPaymentStrategy` trait for implementing push-payment providers
//! - `PaymentError` for typed error handling
//! - lenient body decoding for provider responses and callbacks
//!
//! ## Example
//!
//! ```rust,ignore
//! use pay_core::{PaymentFields, PushPaymentStrategy};
//!
//! let input = PaymentFields::from_json(&body).validate()?;
//! let accepted = strategy.push(&input).await?;
//! ```

pub mod body;
pub mod error;
pub mod payment;
pub mod phone;
pub mod strategy;

// Re-exports for convenience
pub use body::{callback_payload, response_body};
pub use error::{PaymentError, PaymentResult};
pub use payment::{Amount, PaymentFields, PaymentInput, RawAmount, DEFAULT_AMOUNT};
pub use phone::{PhoneError, PhoneNumber, COUNTRY_CODE};
pub use strategy::{BoxedPushStrategy, PushAccepted, PushPaymentStrategy};
