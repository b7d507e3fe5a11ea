//! # pay-mpesa
//!
//! Safaricom Daraja (M-PESA) integration for mpesa-relay.
//!
//! This crate provides:
//!
//! 1. **MpesaStkStrategy** - Lipa Na M-PESA Online (STK push)
//!    - Signed request payloads (`base64(short_code + passkey + timestamp)`)
//!    - Cached OAuth bearer tokens
//!    - Provider rejections relayed verbatim
//!
//! 2. **Callback parsing** - structured view of `Body.stkCallback` results
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use pay_mpesa::MpesaStkStrategy;
//! use pay_core::{PaymentFields, PushPaymentStrategy};
//!
//! // Create strategy from environment
//! let strategy = MpesaStkStrategy::from_env()?;
//!
//! // Prompt the payer
//! let input = PaymentFields::from_json(&body).validate()?;
//! let accepted = strategy.push(&input).await?;
//! ```
//!
//! ## Callback Handling
//!
//! ```rust,ignore
//! use pay_mpesa::{dispatch_callback, CallbackHandler, StkCallback};
//!
//! struct MyHandler;
//!
//! impl CallbackHandler for MyHandler {
//!     fn on_payment_completed(&self, cb: &StkCallback) -> PaymentResult<()> {
//!         println!("Paid! receipt {:?}", cb.receipt_number());
//!         Ok(())
//!     }
//! }
//!
//! // In your callback endpoint:
//! dispatch_callback(&MyHandler, &payload)?;
//! ```

pub mod callback;
pub mod config;
pub mod password;
pub mod stk;
pub mod token;

// Re-exports
pub use callback::{dispatch_callback, CallbackHandler, LoggingCallbackHandler, StkCallback};
pub use config::{MpesaConfig, MpesaEnvironment, DEFAULT_PUSH_TIMEOUT, DEFAULT_TOKEN_TIMEOUT};
pub use password::{build_password, stk_timestamp};
pub use stk::{MpesaStkStrategy, StkPushRequest};
pub use token::{AccessToken, OAuthTokenSource, TokenCache, TokenSource};
