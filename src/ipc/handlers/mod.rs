pub mod catalog;
pub mod core;
pub mod enrollment;
pub mod grading;
pub mod people;
pub mod setup;

use crate::error::EngineResult;
use crate::ipc::error::{no_workspace, reply};
use crate::ipc::types::{AppState, Request};
use rusqlite::Connection;
use serde_json::Value;

/// Runs `f` against the open workspace and wraps its outcome in an envelope.
pub(super) fn with_db<F>(state: &AppState, req: &Request, f: F) -> Value
where
    F: FnOnce(&Connection, &Value) -> EngineResult<Value>,
{
    let Some(conn) = state.db.as_ref() else {
        return no_workspace(&req.id);
    };
    reply(&req.id, f(conn, &req.params))
}
