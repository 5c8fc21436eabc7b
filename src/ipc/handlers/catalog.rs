use crate::catalog::{self, NewClass};
use crate::error::EngineResult;
use crate::ipc::handlers::with_db;
use crate::ipc::params;
use crate::ipc::types::{AppState, Request};
use crate::model::Season;
use crate::query;
use rusqlite::Connection;
use serde_json::{json, Value};

fn departments_create(conn: &Connection, p: &Value) -> EngineResult<Value> {
    let subject = params::req_name(p, "subject")?;
    let name = params::req_name(p, "name")?;
    let id = catalog::create_department(conn, subject, name)?;
    Ok(json!({ "departmentId": id, "subject": subject }))
}

fn departments_list(conn: &Connection, _p: &Value) -> EngineResult<Value> {
    Ok(json!({ "departments": query::departments(conn)? }))
}

fn courses_create(conn: &Connection, p: &Value) -> EngineResult<Value> {
    let subject = params::req_name(p, "subject")?;
    let number = params::req_i64(p, "number")?;
    let name = params::req_name(p, "name")?;
    let id = catalog::create_course(conn, subject, number, name)?;
    Ok(json!({ "courseId": id }))
}

fn courses_list(conn: &Connection, p: &Value) -> EngineResult<Value> {
    let subject = params::req_name(p, "subject")?;
    Ok(json!({ "courses": query::courses_in_department(conn, subject)? }))
}

fn classes_create(conn: &Connection, p: &Value) -> EngineResult<Value> {
    let new = NewClass {
        subject: params::req_name(p, "subject")?,
        number: params::req_i64(p, "number")?,
        season: Season::parse(params::req_str(p, "season")?)?,
        year: params::req_i64(p, "year")?,
        start: params::req_time(p, "start")?,
        end: params::req_time(p, "end")?,
        location: params::req_name(p, "location")?,
        instructor_id: params::req_uid(p, "instructor")?,
    };
    let id = catalog::create_class(conn, &new)?;
    Ok(json!({ "classId": id }))
}

fn classes_offerings(conn: &Connection, p: &Value) -> EngineResult<Value> {
    let subject = params::req_name(p, "subject")?;
    let number = params::req_i64(p, "number")?;
    Ok(json!({ "offerings": query::class_offerings(conn, subject, number)? }))
}

fn catalog_get(conn: &Connection, _p: &Value) -> EngineResult<Value> {
    Ok(json!({ "departments": query::catalog(conn)? }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let handler: fn(&Connection, &Value) -> EngineResult<Value> = match req.method.as_str() {
        "departments.create" => departments_create,
        "departments.list" => departments_list,
        "courses.create" => courses_create,
        "courses.list" => courses_list,
        "classes.create" => classes_create,
        "classes.offerings" => classes_offerings,
        "catalog.get" => catalog_get,
        _ => return None,
    };
    Some(with_db(state, req, handler))
}
