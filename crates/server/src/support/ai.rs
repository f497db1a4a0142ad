#![forbid(unsafe_code)]

use pm_storage::StoreError;
use serde_json::{Value, json};

pub(crate) fn ai_ok(result: Value) -> Value {
    json!({
        "success": true,
        "result": result,
        "error": null
    })
}

fn ai_error_with_status(code: &str, message: &str, http_status: u16, retriable: bool) -> Value {
    json!({
        "success": false,
        "result": null,
        "error": {
            "code": code,
            "message": message.trim(),
            "http_status": http_status,
            "retriable": retriable
        }
    })
}

/// Request-shape problems detected before the store is touched.
pub(crate) fn ai_error(code: &str, message: &str) -> Value {
    ai_error_with_status(code, message, 400, false)
}

pub(crate) fn ai_store_error(err: StoreError) -> Value {
    if matches!(err, StoreError::Io(_) | StoreError::Sql(_)) {
        tracing::error!(code = err.code(), error = %err, "store failure");
    }
    ai_error_with_status(err.code(), &err.to_string(), err.http_status(), err.is_retriable())
}
