use crate::calc::{self, RecomputeTarget};
use crate::catalog::require_class_id;
use crate::error::EngineResult;
use crate::grading::{self, NewAssignment, SubmissionOutcome};
use crate::ipc::handlers::setup::max_category_weight;
use crate::ipc::handlers::with_db;
use crate::ipc::params;
use crate::ipc::types::{AppState, Request};
use crate::model::CategoryWeight;
use crate::query;
use rusqlite::Connection;
use serde_json::{json, Value};

/// Runs the follow-up recompute for a write that has already committed. A
/// failure here is reported inside the payload; the write itself stands.
fn recompute_after_write(conn: &Connection, class_id: i64, target: RecomputeTarget) -> Value {
    match calc::recompute_grades(conn, class_id, target) {
        Ok(report) => json!(report),
        Err(e) => {
            tracing::warn!(class_id, error = %e, "recompute after write failed");
            json!({
                "classId": class_id,
                "updated": [],
                "failed": [],
                "error": { "code": e.code(), "message": e.to_string() }
            })
        }
    }
}

fn categories_create(conn: &Connection, p: &Value) -> EngineResult<Value> {
    let key = params::class_key(p)?;
    let name = params::req_name(p, "category")?;
    let weight = CategoryWeight::new(params::req_i64(p, "weight")?, max_category_weight(conn)?)?;
    let id = grading::create_assignment_category(conn, &key, name, weight)?;
    Ok(json!({ "categoryId": id }))
}

fn categories_list(conn: &Connection, p: &Value) -> EngineResult<Value> {
    let key = params::class_key(p)?;
    Ok(json!({ "categories": query::assignment_categories(conn, &key)? }))
}

/// A new assignment moves every enrolled student's denominator.
fn assignments_create(conn: &Connection, p: &Value) -> EngineResult<Value> {
    let key = params::class_key(p)?;
    let category = params::req_name(p, "category")?;
    let new = NewAssignment {
        name: params::req_name(p, "asgname")?,
        points: params::req_i64(p, "points")?,
        due: params::req_datetime(p, "due")?,
        contents: params::opt_str(p, "contents")?.unwrap_or(""),
    };
    let resolved = grading::create_assignment(conn, &key, category, &new)?;
    let recompute = recompute_after_write(conn, resolved.class_id, RecomputeTarget::AllEnrolled);
    Ok(json!({
        "assignmentId": resolved.assignment_id,
        "recompute": recompute
    }))
}

fn assignments_list(conn: &Connection, p: &Value) -> EngineResult<Value> {
    let key = params::class_key(p)?;
    let category = params::opt_str(p, "category")?;
    Ok(json!({ "assignments": query::assignments_in_category(conn, &key, category)? }))
}

fn assignments_contents(conn: &Connection, p: &Value) -> EngineResult<Value> {
    let a = params::assignment_ref(p)?;
    Ok(json!({ "contents": query::assignment_contents(conn, &a)? }))
}

fn submissions_submit(conn: &Connection, p: &Value) -> EngineResult<Value> {
    let a = params::assignment_ref(p)?;
    let uid = params::req_uid(p, "uid")?;
    let contents = params::req_str(p, "contents")?;
    let now = chrono::Local::now().naive_local();
    let outcome = grading::record_submission(conn, &a, uid, contents, now)?;
    let outcome = match outcome {
        SubmissionOutcome::Created => "created",
        SubmissionOutcome::Replaced => "replaced",
    };
    Ok(json!({ "outcome": outcome }))
}

fn submissions_grade(conn: &Connection, p: &Value) -> EngineResult<Value> {
    let a = params::assignment_ref(p)?;
    let uid = params::req_uid(p, "uid")?;
    let score = params::req_i64(p, "score")?;
    let resolved = grading::grade_submission(conn, &a, uid, score)?;
    let recompute = recompute_after_write(conn, resolved.class_id, RecomputeTarget::Student(uid));
    Ok(json!({ "recompute": recompute }))
}

fn submissions_list(conn: &Connection, p: &Value) -> EngineResult<Value> {
    let a = params::assignment_ref(p)?;
    Ok(json!({ "submissions": query::submissions_to_assignment(conn, &a)? }))
}

fn submissions_text(conn: &Connection, p: &Value) -> EngineResult<Value> {
    let a = params::assignment_ref(p)?;
    let uid = params::req_uid(p, "uid")?;
    Ok(json!({ "contents": query::submission_text(conn, &a, uid)? }))
}

/// Recomputes one student, or everyone enrolled when `uid` is omitted.
fn grades_recompute(conn: &Connection, p: &Value) -> EngineResult<Value> {
    let key = params::class_key(p)?;
    let class_id = require_class_id(conn, &key)?;
    let target = match p.get("uid") {
        None | Some(Value::Null) => RecomputeTarget::AllEnrolled,
        Some(_) => RecomputeTarget::Student(params::req_uid(p, "uid")?),
    };
    let report = calc::recompute_grades(conn, class_id, target)?;
    Ok(json!({ "recompute": report }))
}

fn grades_breakdown(conn: &Connection, p: &Value) -> EngineResult<Value> {
    let key = params::class_key(p)?;
    let uid = params::req_uid(p, "uid")?;
    let class_id = require_class_id(conn, &key)?;
    crate::enrollment::require_enrolled(conn, uid, class_id)?;
    let breakdown = calc::grade_breakdown(&calc::CalcContext { conn, class_id }, uid)?;
    Ok(json!(breakdown))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let handler: fn(&Connection, &Value) -> EngineResult<Value> = match req.method.as_str() {
        "categories.create" => categories_create,
        "categories.list" => categories_list,
        "assignments.create" => assignments_create,
        "assignments.list" => assignments_list,
        "assignments.contents" => assignments_contents,
        "submissions.submit" => submissions_submit,
        "submissions.grade" => submissions_grade,
        "submissions.list" => submissions_list,
        "submissions.text" => submissions_text,
        "grades.recompute" => grades_recompute,
        "grades.breakdown" => grades_breakdown,
        _ => return None,
    };
    Some(with_db(state, req, handler))
}
