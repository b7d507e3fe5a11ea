//! # Request Handlers
//!
//! Axum request handlers for the relay: the pay form, payment submission,
//! and the provider callback.

use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::{RawQuery, State},
    http::{header::CONTENT_TYPE, HeaderMap, StatusCode},
    response::{Html, IntoResponse},
    Json,
};
use pay_core::{callback_payload, PaymentError, PaymentFields, DEFAULT_AMOUNT};
use pay_mpesa::dispatch_callback;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{error, info, instrument, warn};

// =============================================================================
// Request/Response Types
// =============================================================================

/// Accepted payment response
#[derive(Debug, Serialize)]
pub struct PayResponse {
    pub ok: bool,
    /// Provider response, relayed as-is
    pub response: Value,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
            response: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_response(mut self, response: Value) -> Self {
        self.response = Some(response);
        self
    }
}

fn payment_error_to_response(err: PaymentError) -> (StatusCode, Json<ErrorResponse>) {
    let status = StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    let mut response = ErrorResponse::new(err.client_message());
    if let Some(details) = err.details() {
        response = response.with_details(details);
    }
    if let PaymentError::ProviderRejected { body, .. } = err {
        response = response.with_response(body);
    }

    (status, Json(response))
}

// =============================================================================
// Handlers
// =============================================================================

/// Health check endpoint
pub async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "service": "mpesa-relay",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Pay form for collaborators
pub async fn pay_form(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
) -> Html<String> {
    let amount = first_query_value(query.as_deref(), "amount");
    let amount = amount.as_deref().unwrap_or(DEFAULT_AMOUNT);

    Html(format!(
        r#"<!doctype html>
<title>Pay with M-PESA</title>
<h2>Pay to Till {till}</h2>
<form action="/api/pay" method="post">
  Phone (e.g. 2547XXXXXXXX): <input name="phone" required><br>
  Amount (KES): <input name="amount" value="{amount}"><br>
  <input type="submit" value="Pay">
</form>
"#,
        till = escape_html(state.till()),
        amount = escape_html(amount),
    ))
}

/// Submit an STK push.
///
/// Accepts a JSON object body, a form-encoded body, or query parameters.
#[instrument(skip_all)]
pub async fn api_pay(
    State(state): State<AppState>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
    body: Bytes,
) -> Result<Json<PayResponse>, (StatusCode, Json<ErrorResponse>)> {
    let fields = payment_fields(&headers, query.as_deref(), &body);

    let input = fields.validate().map_err(|e| {
        warn!("Rejected payment request: {}", e);
        payment_error_to_response(e)
    })?;

    info!(
        "Submitting STK push: provider={}, phone={}, amount={}",
        state.payments.provider_name(),
        input.phone.masked(),
        input.amount
    );

    let accepted = state
        .payments
        .push(&input)
        .await
        .map_err(payment_error_to_response)?;

    Ok(Json(PayResponse {
        ok: true,
        response: accepted.response,
    }))
}

/// Receive a payment-result callback from the provider.
///
/// Always acknowledged; the payload is only logged and dispatched.
#[instrument(skip_all)]
pub async fn callback(State(state): State<AppState>, body: Bytes) -> impl IntoResponse {
    let payload = callback_payload(&body);
    info!("Received STK callback: {}", payload);

    if let Err(e) = dispatch_callback(state.callbacks.as_ref(), &payload) {
        error!("Callback handler error: {}", e);
    }

    (StatusCode::OK, Json(json!({ "result": "received" })))
}

// =============================================================================
// Helpers
// =============================================================================

/// Pick payment fields from the first source that has any: JSON body,
/// form body, then query string.
pub(crate) fn payment_fields(headers: &HeaderMap, query: Option<&str>, body: &[u8]) -> PaymentFields {
    let mime = mime_type(headers);

    if mime.as_deref().is_some_and(is_json_mime) {
        if let Ok(value) = serde_json::from_slice::<Value>(body) {
            let fields = PaymentFields::from_json(&value);
            if !fields.is_empty() {
                return fields;
            }
        }
    }

    if mime.as_deref() == Some("application/x-www-form-urlencoded") {
        if let Ok(pairs) = serde_urlencoded::from_bytes::<Vec<(String, String)>>(body) {
            let fields = PaymentFields::from_pairs(pairs);
            if !fields.is_empty() {
                return fields;
            }
        }
    }

    query
        .and_then(|q| serde_urlencoded::from_str::<Vec<(String, String)>>(q).ok())
        .map(PaymentFields::from_pairs)
        .unwrap_or_default()
}

/// First value of `name` in a query string. Repeated keys are not an error.
fn first_query_value(query: Option<&str>, name: &str) -> Option<String> {
    serde_urlencoded::from_str::<Vec<(String, String)>>(query?)
        .ok()?
        .into_iter()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value)
}

fn mime_type(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(CONTENT_TYPE)?.to_str().ok()?;
    let mime = value.split(';').next()?.trim().to_ascii_lowercase();
    Some(mime)
}

fn is_json_mime(mime: &str) -> bool {
    mime == "application/json" || (mime.starts_with("application/") && mime.ends_with("+json"))
}

fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&#34;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
