//! # STK Callback Handling
//!
//! Daraja posts the outcome of every STK push to the configured callback URL.
//! Payloads are not signed, so nothing here proves a callback came from
//! Safaricom; treat the data as informational until it is reconciled
//! with a transaction status query.

use pay_core::PaymentResult;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Parsed `Body.stkCallback` object
#[derive(Debug, Clone, PartialEq)]
pub struct StkCallback {
    pub merchant_request_id: String,
    pub checkout_request_id: String,
    pub result_code: i64,
    pub result_desc: String,
    /// `CallbackMetadata.Item` flattened to `Name -> Value`
    pub metadata: BTreeMap<String, Value>,
}

impl StkCallback {
    /// Parse a callback payload. Returns `None` for anything that is not
    /// shaped like an STK callback.
    pub fn from_payload(payload: &Value) -> Option<Self> {
        let envelope = Envelope::deserialize(payload).ok()?;
        let raw = envelope.body.stk_callback;

        let result_code = match &raw.result_code {
            Value::Number(n) => n.as_i64()?,
            Value::String(s) => s.trim().parse().ok()?,
            _ => return None,
        };

        let metadata = raw
            .callback_metadata
            .map(|m| m.item.into_iter().map(|i| (i.name, i.value)).collect())
            .unwrap_or_default();

        Some(Self {
            merchant_request_id: raw.merchant_request_id,
            checkout_request_id: raw.checkout_request_id,
            result_code,
            result_desc: raw.result_desc,
            metadata,
        })
    }

    /// Result code 0 means the payer completed the payment
    pub fn is_success(&self) -> bool {
        self.result_code == 0
    }

    pub fn amount(&self) -> Option<f64> {
        self.metadata.get("Amount").and_then(Value::as_f64)
    }

    pub fn receipt_number(&self) -> Option<&str> {
        self.metadata.get("MpesaReceiptNumber").and_then(Value::as_str)
    }

    /// Payer phone number (Daraja sends it as a JSON number)
    pub fn phone_number(&self) -> Option<String> {
        self.metadata.get("PhoneNumber").and_then(value_to_string)
    }

    /// Transaction date as `YYYYMMDDHHMMSS`
    pub fn transaction_date(&self) -> Option<String> {
        self.metadata.get("TransactionDate").and_then(value_to_string)
    }
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "Body")]
    body: EnvelopeBody,
}

#[derive(Deserialize)]
struct EnvelopeBody {
    #[serde(rename = "stkCallback")]
    stk_callback: RawStkCallback,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawStkCallback {
    #[serde(rename = "MerchantRequestID", default)]
    merchant_request_id: String,
    #[serde(rename = "CheckoutRequestID", default)]
    checkout_request_id: String,
    result_code: Value,
    #[serde(default)]
    result_desc: String,
    #[serde(default)]
    callback_metadata: Option<RawMetadata>,
}

#[derive(Deserialize)]
struct RawMetadata {
    #[serde(rename = "Item", default)]
    item: Vec<RawItem>,
}

#[derive(Deserialize)]
struct RawItem {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Value", default)]
    value: Value,
}

/// Callback event handler trait
///
/// Implement this trait to react to payment results.
#[allow(unused_variables)]
pub trait CallbackHandler: Send + Sync {
    /// Called when the payer completed the payment
    fn on_payment_completed(&self, callback: &StkCallback) -> PaymentResult<()> {
        info!(
            "Payment completed: checkout={}, receipt={:?}, amount={:?}, phone={:?}",
            callback.checkout_request_id,
            callback.receipt_number(),
            callback.amount(),
            callback.phone_number()
        );
        Ok(())
    }

    /// Called when the payment failed or was cancelled
    fn on_payment_failed(&self, callback: &StkCallback) -> PaymentResult<()> {
        warn!(
            "Payment failed: checkout={}, code={}, desc={}",
            callback.checkout_request_id, callback.result_code, callback.result_desc
        );
        Ok(())
    }

    /// Called for payloads that are not STK callbacks
    fn on_unrecognized(&self, payload: &Value) -> PaymentResult<()> {
        debug!("Unrecognized callback payload");
        Ok(())
    }
}

/// Default handler (just logs results)
pub struct LoggingCallbackHandler;

impl CallbackHandler for LoggingCallbackHandler {}

/// Dispatch a callback payload to the appropriate handler method
pub fn dispatch_callback(handler: &dyn CallbackHandler, payload: &Value) -> PaymentResult<()> {
    match StkCallback::from_payload(payload) {
        Some(cb) if cb.is_success() => handler.on_payment_completed(&cb),
        Some(cb) => handler.on_payment_failed(&cb),
        None => handler.on_unrecognized(payload),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    fn success_payload() -> Value {
        json!({
            "Body": {
                "stkCallback": {
                    "MerchantRequestID": "29115-34620561-1",
                    "CheckoutRequestID": "ws_CO_191220191020363925",
                    "ResultCode": 0,
                    "ResultDesc": "The service request is processed successfully.",
                    "CallbackMetadata": {
                        "Item": [
                            {"Name": "Amount", "Value": 1.00},
                            {"Name": "MpesaReceiptNumber", "Value": "NLJ7RT61SV"},
                            {"Name": "Balance"},
                            {"Name": "TransactionDate", "Value": 20191219102115u64},
                            {"Name": "PhoneNumber", "Value": 254708374149u64}
                        ]
                    }
                }
            }
        })
    }

    fn cancelled_payload() -> Value {
        json!({
            "Body": {
                "stkCallback": {
                    "MerchantRequestID": "29115-34620561-1",
                    "CheckoutRequestID": "ws_CO_191220191020363925",
                    "ResultCode": 1032,
                    "ResultDesc": "Request cancelled by user."
                }
            }
        })
    }

    #[test]
    fn test_parse_success() {
        let cb = StkCallback::from_payload(&success_payload()).unwrap();
        assert!(cb.is_success());
        assert_eq!(cb.checkout_request_id, "ws_CO_191220191020363925");
        assert_eq!(cb.amount(), Some(1.0));
        assert_eq!(cb.receipt_number(), Some("NLJ7RT61SV"));
        assert_eq!(cb.phone_number().as_deref(), Some("254708374149"));
        assert_eq!(cb.transaction_date().as_deref(), Some("20191219102115"));
        assert_eq!(cb.metadata.get("Balance"), Some(&Value::Null));
    }

    #[test]
    fn test_parse_cancelled() {
        let cb = StkCallback::from_payload(&cancelled_payload()).unwrap();
        assert!(!cb.is_success());
        assert_eq!(cb.result_code, 1032);
        assert!(cb.metadata.is_empty());
        assert_eq!(cb.amount(), None);
    }

    #[test]
    fn test_string_result_code() {
        let mut payload = cancelled_payload();
        payload["Body"]["stkCallback"]["ResultCode"] = json!("1037");
        assert_eq!(StkCallback::from_payload(&payload).unwrap().result_code, 1037);
    }

    #[test]
    fn test_unrecognized_shapes() {
        assert!(StkCallback::from_payload(&json!({"raw_body": "not json"})).is_none());
        assert!(StkCallback::from_payload(&json!({"Body": {}})).is_none());
        assert!(StkCallback::from_payload(&json!([1, 2, 3])).is_none());
    }

    #[derive(Default)]
    struct RecordingHandler {
        seen: Mutex<Vec<&'static str>>,
    }

    impl CallbackHandler for RecordingHandler {
        fn on_payment_completed(&self, _cb: &StkCallback) -> PaymentResult<()> {
            self.seen.lock().unwrap().push("completed");
            Ok(())
        }

        fn on_payment_failed(&self, _cb: &StkCallback) -> PaymentResult<()> {
            self.seen.lock().unwrap().push("failed");
            Ok(())
        }

        fn on_unrecognized(&self, _payload: &Value) -> PaymentResult<()> {
            self.seen.lock().unwrap().push("unrecognized");
            Ok(())
        }
    }

    #[test]
    fn test_dispatch_callback() {
        let handler = RecordingHandler::default();

        dispatch_callback(&handler, &success_payload()).unwrap();
        dispatch_callback(&handler, &cancelled_payload()).unwrap();
        dispatch_callback(&handler, &json!({"raw_body": "not json"})).unwrap();

        assert_eq!(
            *handler.seen.lock().unwrap(),
            vec!["completed", "failed", "unrecognized"]
        );
    }

    #[test]
    fn test_logging_handler_accepts_everything() {
        let handler = LoggingCallbackHandler;
        assert!(dispatch_callback(&handler, &success_payload()).is_ok());
        assert!(dispatch_callback(&handler, &cancelled_payload()).is_ok());
        assert!(dispatch_callback(&handler, &Value::Null).is_ok());
    }
}
