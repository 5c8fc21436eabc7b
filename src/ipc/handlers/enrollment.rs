use crate::enrollment;
use crate::error::EngineResult;
use crate::ipc::handlers::with_db;
use crate::ipc::params;
use crate::ipc::types::{AppState, Request};
use crate::people::require_student;
use crate::query;
use rusqlite::Connection;
use serde_json::{json, Value};

fn enroll(conn: &Connection, p: &Value) -> EngineResult<Value> {
    let uid = params::req_uid(p, "uid")?;
    let key = params::class_key(p)?;
    let class_id = enrollment::enroll(conn, uid, &key)?;
    Ok(json!({ "classId": class_id }))
}

fn roster(conn: &Connection, p: &Value) -> EngineResult<Value> {
    let key = params::class_key(p)?;
    Ok(json!({ "students": query::roster(conn, &key)? }))
}

fn student_classes(conn: &Connection, p: &Value) -> EngineResult<Value> {
    let uid = params::req_uid(p, "uid")?;
    Ok(json!({ "classes": query::student_classes(conn, uid)? }))
}

fn student_assignments(conn: &Connection, p: &Value) -> EngineResult<Value> {
    let uid = params::req_uid(p, "uid")?;
    let key = params::class_key(p)?;
    Ok(json!({ "assignments": query::student_assignments(conn, &key, uid)? }))
}

fn gpa(conn: &Connection, p: &Value) -> EngineResult<Value> {
    let uid = params::req_uid(p, "uid")?;
    require_student(conn, uid)?;
    Ok(json!({ "gpa": enrollment::compute_gpa(conn, uid)? }))
}

fn professor_classes(conn: &Connection, p: &Value) -> EngineResult<Value> {
    let uid = params::req_uid(p, "uid")?;
    Ok(json!({ "classes": query::professor_classes(conn, uid)? }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let handler: fn(&Connection, &Value) -> EngineResult<Value> = match req.method.as_str() {
        "enrollment.enroll" => enroll,
        "enrollment.roster" => roster,
        "enrollment.studentClasses" => student_classes,
        "enrollment.studentAssignments" => student_assignments,
        "enrollment.gpa" => gpa,
        "professors.classes" => professor_classes,
        _ => return None,
    };
    Some(with_db(state, req, handler))
}
