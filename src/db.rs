use rusqlite::{Connection, OptionalExtension, Transaction, TransactionBehavior};
use std::path::Path;
use std::time::Duration;

pub const DB_FILE_NAME: &str = "lms.sqlite3";

/// How long a writer waits for another sidecar's write lock on the same workspace.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE_NAME);
    let conn = Connection::open(db_path)?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> anyhow::Result<()> {
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS departments(
            id INTEGER PRIMARY KEY,
            subject TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS courses(
            id INTEGER PRIMARY KEY,
            department_id INTEGER NOT NULL,
            number INTEGER NOT NULL,
            name TEXT NOT NULL,
            FOREIGN KEY(department_id) REFERENCES departments(id),
            UNIQUE(department_id, number)
        )",
        [],
    )?;

    // One id space for every role; the role tables key off users(id).
    conn.execute(
        "CREATE TABLE IF NOT EXISTS users(
            id INTEGER PRIMARY KEY,
            role TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS administrators(
            id INTEGER PRIMARY KEY,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            birth_date TEXT NOT NULL,
            FOREIGN KEY(id) REFERENCES users(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS professors(
            id INTEGER PRIMARY KEY,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            birth_date TEXT NOT NULL,
            department_id INTEGER NOT NULL,
            FOREIGN KEY(id) REFERENCES users(id),
            FOREIGN KEY(department_id) REFERENCES departments(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id INTEGER PRIMARY KEY,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            birth_date TEXT NOT NULL,
            department_id INTEGER NOT NULL,
            FOREIGN KEY(id) REFERENCES users(id),
            FOREIGN KEY(department_id) REFERENCES departments(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_professors_department ON professors(department_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_department ON students(department_id)",
        [],
    )?;

    // start_time/end_time hold time-of-day only, as HH:MM:SS.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS classes(
            id INTEGER PRIMARY KEY,
            course_id INTEGER NOT NULL,
            season TEXT NOT NULL,
            year INTEGER NOT NULL,
            start_time TEXT NOT NULL,
            end_time TEXT NOT NULL,
            location TEXT NOT NULL,
            instructor_id INTEGER NOT NULL,
            FOREIGN KEY(course_id) REFERENCES courses(id),
            FOREIGN KEY(instructor_id) REFERENCES professors(id),
            UNIQUE(course_id, season, year)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_classes_location ON classes(location)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_classes_instructor ON classes(instructor_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS assignment_categories(
            id INTEGER PRIMARY KEY,
            class_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            weight INTEGER NOT NULL,
            FOREIGN KEY(class_id) REFERENCES classes(id),
            UNIQUE(class_id, name)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS assignments(
            id INTEGER PRIMARY KEY,
            category_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            points INTEGER NOT NULL,
            due_time TEXT NOT NULL,
            contents TEXT NOT NULL,
            FOREIGN KEY(category_id) REFERENCES assignment_categories(id),
            UNIQUE(category_id, name)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS submissions(
            student_id INTEGER NOT NULL,
            assignment_id INTEGER NOT NULL,
            submitted_time TEXT NOT NULL,
            score INTEGER NOT NULL DEFAULT 0,
            contents TEXT NOT NULL,
            PRIMARY KEY(student_id, assignment_id),
            FOREIGN KEY(student_id) REFERENCES students(id),
            FOREIGN KEY(assignment_id) REFERENCES assignments(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_submissions_assignment ON submissions(assignment_id)",
        [],
    )?;

    // grade NULL means the enrollment has not been graded yet.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS enrolled(
            student_id INTEGER NOT NULL,
            class_id INTEGER NOT NULL,
            grade TEXT,
            PRIMARY KEY(student_id, class_id),
            FOREIGN KEY(student_id) REFERENCES students(id),
            FOREIGN KEY(class_id) REFERENCES classes(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_enrolled_class ON enrolled(class_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value_json TEXT NOT NULL
        )",
        [],
    )?;

    // Workspaces created before the sentinel became NULL stored the display string.
    migrate_ungraded_sentinel(conn)?;

    Ok(())
}

fn migrate_ungraded_sentinel(conn: &Connection) -> anyhow::Result<()> {
    conn.execute("UPDATE enrolled SET grade = NULL WHERE grade = '--'", [])?;
    Ok(())
}

/// Starts a transaction that takes the write lock up front, so a
/// check-then-insert sequence cannot interleave with another writer.
pub fn immediate_tx(conn: &Connection) -> rusqlite::Result<Transaction<'_>> {
    Transaction::new_unchecked(conn, TransactionBehavior::Immediate)
}

pub fn settings_get_json(
    conn: &Connection,
    key: &str,
) -> anyhow::Result<Option<serde_json::Value>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value_json FROM settings WHERE key = ?",
            [key],
            |r| r.get(0),
        )
        .optional()?;
    match raw {
        Some(s) => Ok(Some(serde_json::from_str(&s)?)),
        None => Ok(None),
    }
}

pub fn settings_set_json(
    conn: &Connection,
    key: &str,
    value: &serde_json::Value,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value_json) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json",
        (key, serde_json::to_string(value)?),
    )?;
    Ok(())
}

#[cfg(test)]
pub fn test_conn() -> Connection {
    let conn = Connection::open_in_memory().expect("open in-memory db");
    init_schema(&conn).expect("init schema");
    conn
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn schema_init_is_idempotent() {
        let conn = test_conn();
        init_schema(&conn).expect("second init");
        let n: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'enrolled'",
                [],
                |r| r.get(0),
            )
            .expect("count");
        assert_eq!(n, 1);
    }

    #[test]
    fn settings_round_trip_and_overwrite() {
        let conn = test_conn();
        assert!(settings_get_json(&conn, "setup.grading")
            .expect("get")
            .is_none());
        settings_set_json(&conn, "setup.grading", &json!({ "maxCategoryWeight": 100 }))
            .expect("set");
        settings_set_json(&conn, "setup.grading", &json!({ "maxCategoryWeight": 50 }))
            .expect("overwrite");
        let v = settings_get_json(&conn, "setup.grading")
            .expect("get")
            .expect("present");
        assert_eq!(v["maxCategoryWeight"], 50);
    }

    #[test]
    fn legacy_sentinel_rows_become_null() {
        let conn = test_conn();
        conn.execute_batch(
            "INSERT INTO departments(id, subject, name) VALUES(1, 'CS', 'Computing');
             INSERT INTO courses(id, department_id, number, name) VALUES(1, 1, 3500, 'SP');
             INSERT INTO users(id, role) VALUES(1, 'professor'), (2, 'student');
             INSERT INTO professors(id, first_name, last_name, birth_date, department_id)
                VALUES(1, 'P', 'Q', '1970-01-01', 1);
             INSERT INTO students(id, first_name, last_name, birth_date, department_id)
                VALUES(2, 'S', 'T', '2000-01-01', 1);
             INSERT INTO classes(id, course_id, season, year, start_time, end_time, location, instructor_id)
                VALUES(1, 1, 'Fall', 2024, '09:00:00', '10:00:00', 'WEB', 1);
             INSERT INTO enrolled(student_id, class_id, grade) VALUES(2, 1, '--');",
        )
        .expect("seed");
        init_schema(&conn).expect("re-init");
        let grade: Option<String> = conn
            .query_row("SELECT grade FROM enrolled", [], |r| r.get(0))
            .expect("grade");
        assert_eq!(grade, None);
    }
}
