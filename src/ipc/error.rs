use crate::error::{EngineError, EngineResult};
use serde_json::json;

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    let mut error = json!({
        "code": code,
        "message": message.into(),
    });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({
        "id": id,
        "ok": false,
        "error": error,
    })
}

/// Envelope for an engine failure, carrying its wire code and details.
pub fn engine_err(id: &str, e: &EngineError) -> serde_json::Value {
    if matches!(e, EngineError::Conflict { .. }) {
        tracing::warn!(request = id, error = %e, "write rejected");
    }
    err(id, e.code(), e.to_string(), e.details())
}

pub fn no_workspace(id: &str) -> serde_json::Value {
    err(id, "no_workspace", "select a workspace first", None)
}

pub fn reply(id: &str, result: EngineResult<serde_json::Value>) -> serde_json::Value {
    match result {
        Ok(v) => ok(id, v),
        Err(e) => engine_err(id, &e),
    }
}
