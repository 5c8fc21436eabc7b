//! Typed extraction of request params. Every failure is `InvalidInput`, which
//! the envelope reports as `bad_params`.

use crate::error::{EngineError, EngineResult};
use crate::model::{parse_uid, AssignmentRef, ClassKey, Season, UserId, DATE_FORMAT};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde_json::Value;

fn missing(key: &str) -> EngineError {
    EngineError::invalid(format!("missing {key}"))
}

pub fn opt_str<'a>(params: &'a Value, key: &str) -> EngineResult<Option<&'a str>> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_str()
            .map(Some)
            .ok_or_else(|| EngineError::invalid(format!("{key} must be a string"))),
    }
}

pub fn req_str<'a>(params: &'a Value, key: &str) -> EngineResult<&'a str> {
    opt_str(params, key)?.ok_or_else(|| missing(key))
}

/// Required string that must not be blank after trimming.
pub fn req_name<'a>(params: &'a Value, key: &str) -> EngineResult<&'a str> {
    let s = req_str(params, key)?.trim();
    if s.is_empty() {
        return Err(EngineError::invalid(format!("{key} must not be empty")));
    }
    Ok(s)
}

/// Integers may arrive as JSON numbers or numeric strings.
pub fn req_i64(params: &Value, key: &str) -> EngineResult<i64> {
    match params.get(key) {
        None | Some(Value::Null) => Err(missing(key)),
        Some(Value::Number(n)) => n
            .as_i64()
            .ok_or_else(|| EngineError::invalid(format!("{key} must be an integer"))),
        Some(Value::String(s)) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| EngineError::invalid(format!("{key} must be an integer"))),
        Some(_) => Err(EngineError::invalid(format!("{key} must be an integer"))),
    }
}

pub fn req_uid(params: &Value, key: &str) -> EngineResult<UserId> {
    match params.get(key) {
        None | Some(Value::Null) => Err(missing(key)),
        Some(Value::Number(n)) => n
            .as_i64()
            .filter(|v| *v >= 0)
            .ok_or_else(|| EngineError::invalid(format!("malformed user id {n}"))),
        Some(Value::String(s)) => parse_uid(s),
        Some(_) => Err(EngineError::invalid(format!("{key} must be a user id"))),
    }
}

pub fn class_key(params: &Value) -> EngineResult<ClassKey> {
    Ok(ClassKey::new(
        req_name(params, "subject")?,
        req_i64(params, "number")?,
        Season::parse(req_str(params, "season")?)?,
        req_i64(params, "year")?,
    ))
}

pub fn assignment_ref(params: &Value) -> EngineResult<AssignmentRef> {
    Ok(AssignmentRef::new(
        class_key(params)?,
        req_name(params, "category")?,
        req_name(params, "asgname")?,
    ))
}

/// Accepts `HH:MM`, `HH:MM:SS`, or a full datetime whose date part is dropped.
pub fn req_time(params: &Value, key: &str) -> EngineResult<NaiveTime> {
    let raw = req_str(params, key)?.trim();
    for fmt in ["%H:%M:%S", "%H:%M"] {
        if let Ok(t) = NaiveTime::parse_from_str(raw, fmt) {
            return Ok(t);
        }
    }
    parse_datetime(raw)
        .map(|dt| dt.time())
        .ok_or_else(|| EngineError::invalid(format!("{key} is not a time: '{raw}'")))
}

fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
}

pub fn req_datetime(params: &Value, key: &str) -> EngineResult<NaiveDateTime> {
    let raw = req_str(params, key)?.trim();
    parse_datetime(raw)
        .ok_or_else(|| EngineError::invalid(format!("{key} is not a datetime: '{raw}'")))
}

pub fn req_date(params: &Value, key: &str) -> EngineResult<NaiveDate> {
    let raw = req_str(params, key)?.trim();
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .map_err(|_| EngineError::invalid(format!("{key} is not a date: '{raw}'")))
}
