//! # Push Payment Strategy Trait
//!
//! Seam between the HTTP layer and a push-payment provider.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                PushPaymentStrategy (trait)                  │
//! │  ├── push()                                                 │
//! │  └── provider_name()                                        │
//! └─────────────────────────────────────────────────────────────┘
//!                            ▲
//!                    ┌───────┴───────┐
//!                    │MpesaStkStrategy│
//!                    └───────────────┘
//! ```

use crate::error::PaymentResult;
use crate::payment::PaymentInput;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

/// Provider accepted the push request. The payer still has to confirm it
/// on their handset, so this is not proof of payment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PushAccepted {
    /// Provider response body (JSON, or `{"raw": text}` if it was not JSON)
    pub response: Value,
}

/// Core trait for push-payment provider implementations.
#[async_trait]
pub trait PushPaymentStrategy: Send + Sync {
    /// Ask the provider to prompt the payer for the given amount.
    ///
    /// A non-2xx provider answer is returned as
    /// [`PaymentError::ProviderRejected`](crate::PaymentError::ProviderRejected)
    /// carrying the provider's status and body.
    async fn push(&self, input: &PaymentInput) -> PaymentResult<PushAccepted>;

    /// Get the provider name (for logging).
    fn provider_name(&self) -> &'static str;
}

/// Type alias for a shared payment strategy (dynamic dispatch)
pub type BoxedPushStrategy = Arc<dyn PushPaymentStrategy>;
