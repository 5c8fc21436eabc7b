use crate::catalog::require_department_id;
use crate::db;
use crate::error::{EngineError, EngineResult};
use crate::model::{format_date, format_uid, UserId};
use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Role {
    Administrator,
    Professor,
    Student,
}

impl Role {
    fn as_str(self) -> &'static str {
        match self {
            Self::Administrator => "administrator",
            Self::Professor => "professor",
            Self::Student => "student",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub fname: String,
    pub lname: String,
    pub uid: String,
    pub role: Role,
    /// Home department for professors, major for students; absent for administrators.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
}

fn allocate_user(conn: &Connection, role: Role) -> EngineResult<UserId> {
    conn.execute("INSERT INTO users(role) VALUES(?)", [role.as_str()])?;
    Ok(conn.last_insert_rowid())
}

fn create_member(
    conn: &Connection,
    table: &str,
    role: Role,
    first_name: &str,
    last_name: &str,
    birth_date: NaiveDate,
    department_subject: &str,
) -> EngineResult<UserId> {
    let tx = db::immediate_tx(conn)?;
    let department_id = require_department_id(&tx, department_subject)?;
    let id = allocate_user(&tx, role)?;
    tx.execute(
        &format!(
            "INSERT INTO {table}(id, first_name, last_name, birth_date, department_id)
             VALUES(?, ?, ?, ?, ?)"
        ),
        (id, first_name, last_name, format_date(birth_date), department_id),
    )?;
    tx.commit()?;
    tracing::info!(id, role = role.as_str(), department = department_subject, "user created");
    Ok(id)
}

/// `major_subject` is the department the student majors in.
pub fn create_student(
    conn: &Connection,
    first_name: &str,
    last_name: &str,
    birth_date: NaiveDate,
    major_subject: &str,
) -> EngineResult<UserId> {
    create_member(
        conn,
        "students",
        Role::Student,
        first_name,
        last_name,
        birth_date,
        major_subject,
    )
}

pub fn create_professor(
    conn: &Connection,
    first_name: &str,
    last_name: &str,
    birth_date: NaiveDate,
    department_subject: &str,
) -> EngineResult<UserId> {
    create_member(
        conn,
        "professors",
        Role::Professor,
        first_name,
        last_name,
        birth_date,
        department_subject,
    )
}

pub fn create_administrator(
    conn: &Connection,
    first_name: &str,
    last_name: &str,
    birth_date: NaiveDate,
) -> EngineResult<UserId> {
    let tx = db::immediate_tx(conn)?;
    let id = allocate_user(&tx, Role::Administrator)?;
    tx.execute(
        "INSERT INTO administrators(id, first_name, last_name, birth_date) VALUES(?, ?, ?, ?)",
        (id, first_name, last_name, format_date(birth_date)),
    )?;
    tx.commit()?;
    tracing::info!(id, role = "administrator", "user created");
    Ok(id)
}

pub fn student_exists(conn: &Connection, uid: UserId) -> EngineResult<bool> {
    let hit: Option<i64> = conn
        .query_row("SELECT 1 FROM students WHERE id = ?", [uid], |r| r.get(0))
        .optional()?;
    Ok(hit.is_some())
}

pub fn require_student(conn: &Connection, uid: UserId) -> EngineResult<()> {
    if student_exists(conn, uid)? {
        Ok(())
    } else {
        Err(EngineError::not_found(format!("student {uid}")))
    }
}

/// Resolves a uid against whichever role table holds it.
pub fn get_user(conn: &Connection, uid: UserId) -> EngineResult<UserInfo> {
    let admin: Option<(String, String)> = conn
        .query_row(
            "SELECT first_name, last_name FROM administrators WHERE id = ?",
            [uid],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )
        .optional()?;
    if let Some((fname, lname)) = admin {
        return Ok(UserInfo {
            fname,
            lname,
            uid: format_uid(uid),
            role: Role::Administrator,
            department: None,
        });
    }

    for (table, role) in [("professors", Role::Professor), ("students", Role::Student)] {
        let sql = format!(
            "SELECT p.first_name, p.last_name, d.name
             FROM {table} p
             JOIN departments d ON d.id = p.department_id
             WHERE p.id = ?"
        );
        let row: Option<(String, String, String)> = conn
            .query_row(&sql, [uid], |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)))
            .optional()?;
        if let Some((fname, lname, department)) = row {
            return Ok(UserInfo {
                fname,
                lname,
                uid: format_uid(uid),
                role,
                department: Some(department),
            });
        }
    }

    Err(EngineError::not_found(format!("user {}", format_uid(uid))))
}
