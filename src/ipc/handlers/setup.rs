use crate::db;
use crate::error::{EngineError, EngineResult};
use crate::ipc::handlers::with_db;
use crate::ipc::types::{AppState, Request};
use rusqlite::Connection;
use serde_json::{json, Map, Value};

const GRADING_KEY: &str = "setup.grading";
pub const DEFAULT_MAX_CATEGORY_WEIGHT: u32 = 100;
const MAX_CATEGORY_WEIGHT_LIMIT: i64 = 10_000;

#[derive(Clone, Copy)]
enum SetupSection {
    Grading,
}

impl SetupSection {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "grading" => Some(Self::Grading),
            _ => None,
        }
    }

    fn key(self) -> &'static str {
        match self {
            Self::Grading => GRADING_KEY,
        }
    }
}

fn default_section(section: SetupSection) -> Value {
    match section {
        SetupSection::Grading => json!({
            "maxCategoryWeight": DEFAULT_MAX_CATEGORY_WEIGHT
        }),
    }
}

fn settings_error(e: anyhow::Error) -> EngineError {
    match e.downcast::<rusqlite::Error>() {
        Ok(sql) => EngineError::Store(sql),
        Err(other) => EngineError::invalid(format!("stored settings are unreadable: {other}")),
    }
}

fn parse_i64_range(v: &Value, key: &str, min: i64, max: i64) -> Result<i64, String> {
    let n = v
        .as_i64()
        .ok_or_else(|| format!("{} must be integer", key))?;
    if !(min..=max).contains(&n) {
        return Err(format!("{} must be in {}..={}", key, min, max));
    }
    Ok(n)
}

fn merge_section_patch(
    section: SetupSection,
    current: &mut Value,
    patch: &Map<String, Value>,
) -> Result<(), String> {
    let obj = current
        .as_object_mut()
        .ok_or_else(|| "internal setup object must be a JSON object".to_string())?;
    for (k, v) in patch {
        match (section, k.as_str()) {
            (SetupSection::Grading, "maxCategoryWeight") => {
                let n = parse_i64_range(v, k, 1, MAX_CATEGORY_WEIGHT_LIMIT)?;
                obj.insert(k.clone(), json!(n));
            }
            _ => return Err(format!("unknown setting {}", k)),
        }
    }
    Ok(())
}

/// Stored section merged over its defaults, so new keys appear for old workspaces.
fn load_section(conn: &Connection, section: SetupSection) -> EngineResult<Value> {
    let mut merged = default_section(section);
    let stored = db::settings_get_json(conn, section.key()).map_err(settings_error)?;
    if let (Some(Value::Object(stored)), Some(obj)) = (stored, merged.as_object_mut()) {
        for (k, v) in stored {
            obj.insert(k, v);
        }
    }
    Ok(merged)
}

/// Upper bound for category weights in this workspace.
pub fn max_category_weight(conn: &Connection) -> EngineResult<u32> {
    let section = load_section(conn, SetupSection::Grading)?;
    Ok(section
        .get("maxCategoryWeight")
        .and_then(Value::as_u64)
        .and_then(|n| u32::try_from(n).ok())
        .unwrap_or(DEFAULT_MAX_CATEGORY_WEIGHT))
}

fn setup_get(conn: &Connection, _params: &Value) -> EngineResult<Value> {
    let grading = load_section(conn, SetupSection::Grading)?;
    Ok(json!({ "grading": grading }))
}

fn setup_update(conn: &Connection, params: &Value) -> EngineResult<Value> {
    let Some(section_raw) = params.get("section").and_then(|v| v.as_str()) else {
        return Err(EngineError::invalid("missing section"));
    };
    let Some(section) = SetupSection::parse(section_raw) else {
        return Err(EngineError::invalid("unknown section"));
    };
    let Some(patch_obj) = params.get("patch").and_then(|v| v.as_object()) else {
        return Err(EngineError::invalid("patch must be an object"));
    };

    let mut current = load_section(conn, section)?;
    merge_section_patch(section, &mut current, patch_obj).map_err(EngineError::invalid)?;
    db::settings_set_json(conn, section.key(), &current).map_err(settings_error)?;
    tracing::info!(section = section.key(), "settings updated");
    Ok(json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "setup.get" => Some(with_db(state, req, setup_get)),
        "setup.update" => Some(with_db(state, req, setup_update)),
        _ => None,
    }
}
