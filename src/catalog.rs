use crate::db;
use crate::error::{map_constraint, EngineError, EngineResult};
use crate::model::{format_time, ClassKey, Season, UserId};
use crate::scheduling::{self, ClassCandidate};
use chrono::NaiveTime;
use rusqlite::{Connection, OptionalExtension};

pub fn find_department_id(conn: &Connection, subject: &str) -> EngineResult<Option<i64>> {
    Ok(conn
        .query_row(
            "SELECT id FROM departments WHERE subject = ?",
            [subject],
            |r| r.get(0),
        )
        .optional()?)
}

pub fn require_department_id(conn: &Connection, subject: &str) -> EngineResult<i64> {
    find_department_id(conn, subject)?
        .ok_or_else(|| EngineError::not_found(format!("department {subject}")))
}

pub fn find_course_id(conn: &Connection, subject: &str, number: i64) -> EngineResult<Option<i64>> {
    Ok(conn
        .query_row(
            "SELECT co.id
             FROM courses co
             JOIN departments d ON d.id = co.department_id
             WHERE d.subject = ? AND co.number = ?",
            (subject, number),
            |r| r.get(0),
        )
        .optional()?)
}

pub fn find_class_id(conn: &Connection, key: &ClassKey) -> EngineResult<Option<i64>> {
    Ok(conn
        .query_row(
            "SELECT c.id
             FROM classes c
             JOIN courses co ON co.id = c.course_id
             JOIN departments d ON d.id = co.department_id
             WHERE d.subject = ? AND co.number = ? AND c.season = ? AND c.year = ?",
            (&key.subject, key.number, key.season.as_str(), key.year),
            |r| r.get(0),
        )
        .optional()?)
}

pub fn require_class_id(conn: &Connection, key: &ClassKey) -> EngineResult<i64> {
    find_class_id(conn, key)?.ok_or_else(|| EngineError::not_found(format!("class {key}")))
}

pub fn create_department(conn: &Connection, subject: &str, name: &str) -> EngineResult<i64> {
    let tx = db::immediate_tx(conn)?;
    if find_department_id(&tx, subject)?.is_some() {
        return Err(EngineError::conflict(format!(
            "department {subject} already exists"
        )));
    }
    tx.execute(
        "INSERT INTO departments(subject, name) VALUES(?, ?)",
        (subject, name),
    )
    .map_err(|e| map_constraint(e, "department already exists"))?;
    let id = tx.last_insert_rowid();
    tx.commit()?;
    tracing::info!(subject, id, "department created");
    Ok(id)
}

pub fn create_course(conn: &Connection, subject: &str, number: i64, name: &str) -> EngineResult<i64> {
    let tx = db::immediate_tx(conn)?;
    let department_id = require_department_id(&tx, subject)?;
    if find_course_id(&tx, subject, number)?.is_some() {
        return Err(EngineError::conflict(format!(
            "course {subject} {number} already exists"
        )));
    }
    tx.execute(
        "INSERT INTO courses(department_id, number, name) VALUES(?, ?, ?)",
        (department_id, number, name),
    )
    .map_err(|e| map_constraint(e, "course already exists"))?;
    let id = tx.last_insert_rowid();
    tx.commit()?;
    tracing::info!(subject, number, id, "course created");
    Ok(id)
}

#[derive(Debug, Clone)]
pub struct NewClass<'a> {
    pub subject: &'a str,
    pub number: i64,
    pub season: Season,
    pub year: i64,
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub location: &'a str,
    pub instructor_id: UserId,
}

/// Admits a class offering. Both scheduling rules are evaluated inside the
/// write-locked transaction before the insert, so a rejected class leaves no row.
pub fn create_class(conn: &Connection, new: &NewClass<'_>) -> EngineResult<i64> {
    if new.end < new.start {
        return Err(EngineError::invalid("class end time is before its start time"));
    }

    let tx = db::immediate_tx(conn)?;
    let course_id = find_course_id(&tx, new.subject, new.number)?
        .ok_or_else(|| EngineError::not_found(format!("course {} {}", new.subject, new.number)))?;

    let instructor: Option<i64> = tx
        .query_row(
            "SELECT id FROM professors WHERE id = ?",
            [new.instructor_id],
            |r| r.get(0),
        )
        .optional()?;
    if instructor.is_none() {
        return Err(EngineError::not_found(format!(
            "professor {}",
            new.instructor_id
        )));
    }

    let verdict = scheduling::check_class(
        &tx,
        &ClassCandidate {
            course_id,
            season: new.season,
            year: new.year,
            start: new.start,
            end: new.end,
            location: new.location,
        },
    )?;
    if !verdict.is_admissible() {
        tracing::info!(
            subject = new.subject,
            number = new.number,
            location = new.location,
            conflicts = verdict.conflicts.len(),
            "class rejected by scheduling rules"
        );
    }
    verdict.into_result()?;

    tx.execute(
        "INSERT INTO classes(course_id, season, year, start_time, end_time, location, instructor_id)
         VALUES(?, ?, ?, ?, ?, ?, ?)",
        (
            course_id,
            new.season.as_str(),
            new.year,
            format_time(new.start),
            format_time(new.end),
            new.location,
            new.instructor_id,
        ),
    )
    .map_err(|e| map_constraint(e, "course is already offered in this term"))?;
    let id = tx.last_insert_rowid();
    tx.commit()?;
    tracing::info!(
        subject = new.subject,
        number = new.number,
        season = new.season.as_str(),
        year = new.year,
        id,
        "class created"
    );
    Ok(id)
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use crate::people;
    use chrono::NaiveDate;

    pub fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).expect("valid time")
    }

    pub fn dob() -> NaiveDate {
        NaiveDate::from_ymd_opt(2000, 1, 1).expect("valid date")
    }

    /// CS department, course CS 3500, one professor, one Fall 2024 class at WEB 09:00-10:00.
    pub fn seed_class(conn: &Connection) -> (ClassKey, i64, UserId) {
        create_department(conn, "CS", "Computing").expect("department");
        create_course(conn, "CS", 3500, "Software Practice").expect("course");
        let prof = people::create_professor(conn, "Ada", "Prof", dob(), "CS").expect("professor");
        let class_id = create_class(
            conn,
            &NewClass {
                subject: "CS",
                number: 3500,
                season: Season::Fall,
                year: 2024,
                start: t(9, 0),
                end: t(10, 0),
                location: "WEB",
                instructor_id: prof,
            },
        )
        .expect("class");
        (
            ClassKey::new("CS", 3500, Season::Fall, 2024),
            class_id,
            prof,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use crate::db::test_conn;

    #[test]
    fn department_subject_is_unique() {
        let conn = test_conn();
        create_department(&conn, "MATH", "Mathematics").expect("first");
        let e = create_department(&conn, "MATH", "Other").expect_err("second");
        assert_eq!(e.code(), "conflict");
        let n: i64 = conn
            .query_row("SELECT COUNT(*) FROM departments", [], |r| r.get(0))
            .expect("count");
        assert_eq!(n, 1);
    }

    #[test]
    fn course_requires_department_and_unique_number() {
        let conn = test_conn();
        let e = create_course(&conn, "CS", 2420, "Algorithms").expect_err("no dept");
        assert_eq!(e.code(), "not_found");
        create_department(&conn, "CS", "Computing").expect("dept");
        create_course(&conn, "CS", 2420, "Algorithms").expect("course");
        let e = create_course(&conn, "CS", 2420, "Again").expect_err("dup");
        assert_eq!(e.code(), "conflict");
        create_department(&conn, "MATH", "Mathematics").expect("dept");
        create_course(&conn, "MATH", 2420, "Same number, other dept").expect("other dept");
    }

    #[test]
    fn rejected_class_leaves_no_row() {
        let conn = test_conn();
        let (_, _, prof) = seed_class(&conn);
        create_course(&conn, "CS", 2420, "Algorithms").expect("course");
        let e = create_class(
            &conn,
            &NewClass {
                subject: "CS",
                number: 2420,
                season: Season::Spring,
                year: 2025,
                start: t(9, 30),
                end: t(11, 0),
                location: "WEB",
                instructor_id: prof,
            },
        )
        .expect_err("room taken");
        assert_eq!(e.code(), "conflict");
        let n: i64 = conn
            .query_row("SELECT COUNT(*) FROM classes", [], |r| r.get(0))
            .expect("count");
        assert_eq!(n, 1);

        create_class(
            &conn,
            &NewClass {
                subject: "CS",
                number: 2420,
                season: Season::Spring,
                year: 2025,
                start: t(10, 30),
                end: t(11, 45),
                location: "WEB",
                instructor_id: prof,
            },
        )
        .expect("later slot is free");
    }

    #[test]
    fn class_input_validation() {
        let conn = test_conn();
        let (_, _, prof) = seed_class(&conn);
        let backwards = NewClass {
            subject: "CS",
            number: 3500,
            season: Season::Summer,
            year: 2025,
            start: t(14, 0),
            end: t(13, 0),
            location: "MEB",
            instructor_id: prof,
        };
        assert_eq!(
            create_class(&conn, &backwards).expect_err("backwards").code(),
            "bad_params"
        );
        let unknown_prof = NewClass {
            start: t(13, 0),
            end: t(14, 0),
            instructor_id: prof + 100,
            ..backwards.clone()
        };
        assert_eq!(
            create_class(&conn, &unknown_prof).expect_err("prof").code(),
            "not_found"
        );
        let unknown_course = NewClass {
            number: 9999,
            start: t(13, 0),
            end: t(14, 0),
            ..backwards
        };
        assert_eq!(
            create_class(&conn, &unknown_course).expect_err("course").code(),
            "not_found"
        );
    }

    #[test]
    fn concurrent_sidecars_admit_one_offering() {
        let dir = std::env::temp_dir().join(format!(
            "lmsd-catalog-race-{}",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("clock")
                .as_nanos()
        ));
        let seed = crate::db::open_db(&dir).expect("open");
        let (_, _, prof) = seed_class(&seed);
        create_course(&seed, "CS", 5530, "Databases").expect("course");
        drop(seed);

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let dir = dir.clone();
                std::thread::spawn(move || {
                    let conn = crate::db::open_db(&dir).expect("open");
                    create_class(
                        &conn,
                        &NewClass {
                            subject: "CS",
                            number: 5530,
                            season: Season::Spring,
                            year: 2026,
                            start: t(12, 0),
                            end: t(13, 0),
                            location: if i % 2 == 0 { "MEB" } else { "LNCO" },
                            instructor_id: prof,
                        },
                    )
                    .map_err(|e| e.code())
                })
            })
            .collect();
        let results: Vec<_> = handles
            .into_iter()
            .map(|h| h.join().expect("thread"))
            .collect();
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|code| *code == "conflict"));
        let _ = std::fs::remove_dir_all(dir);
    }
}
