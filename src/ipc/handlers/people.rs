use crate::error::EngineResult;
use crate::ipc::handlers::with_db;
use crate::ipc::params;
use crate::ipc::types::{AppState, Request};
use crate::model::format_uid;
use crate::people;
use crate::query;
use rusqlite::Connection;
use serde_json::{json, Value};

fn created(id: i64) -> Value {
    json!({ "id": id, "uid": format_uid(id) })
}

fn create_student(conn: &Connection, p: &Value) -> EngineResult<Value> {
    let id = people::create_student(
        conn,
        params::req_name(p, "fname")?,
        params::req_name(p, "lname")?,
        params::req_date(p, "dob")?,
        params::req_name(p, "subject")?,
    )?;
    Ok(created(id))
}

fn create_professor(conn: &Connection, p: &Value) -> EngineResult<Value> {
    let id = people::create_professor(
        conn,
        params::req_name(p, "fname")?,
        params::req_name(p, "lname")?,
        params::req_date(p, "dob")?,
        params::req_name(p, "subject")?,
    )?;
    Ok(created(id))
}

fn create_administrator(conn: &Connection, p: &Value) -> EngineResult<Value> {
    let id = people::create_administrator(
        conn,
        params::req_name(p, "fname")?,
        params::req_name(p, "lname")?,
        params::req_date(p, "dob")?,
    )?;
    Ok(created(id))
}

fn get_user(conn: &Connection, p: &Value) -> EngineResult<Value> {
    let info = people::get_user(conn, params::req_uid(p, "uid")?)?;
    Ok(json!(info))
}

fn professors_list(conn: &Connection, p: &Value) -> EngineResult<Value> {
    let subject = params::req_name(p, "subject")?;
    Ok(json!({ "professors": query::professors_in_department(conn, subject)? }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let handler: fn(&Connection, &Value) -> EngineResult<Value> = match req.method.as_str() {
        "users.createStudent" => create_student,
        "users.createProfessor" => create_professor,
        "users.createAdministrator" => create_administrator,
        "users.get" => get_user,
        "professors.list" => professors_list,
        _ => return None,
    };
    Some(with_db(state, req, handler))
}
