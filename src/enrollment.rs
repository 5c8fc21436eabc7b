use crate::catalog::require_class_id;
use crate::db;
use crate::error::{map_constraint, EngineError, EngineResult};
use crate::model::{grade_from_column, ClassKey, Grade, UserId};
use crate::people::require_student;
use rusqlite::{Connection, OptionalExtension};

/// Enrolls the student with no grade yet. An existing enrollment is left
/// untouched and reported as `Conflict`.
pub fn enroll(conn: &Connection, student_id: UserId, class: &ClassKey) -> EngineResult<i64> {
    let tx = db::immediate_tx(conn)?;
    let class_id = require_class_id(&tx, class)?;
    require_student(&tx, student_id)?;
    if is_enrolled(&tx, student_id, class_id)? {
        return Err(EngineError::conflict(format!(
            "student {student_id} is already enrolled in {class}"
        )));
    }
    tx.execute(
        "INSERT INTO enrolled(student_id, class_id, grade) VALUES(?, ?, NULL)",
        (student_id, class_id),
    )
    .map_err(|e| map_constraint(e, "student is already enrolled"))?;
    tx.commit()?;
    tracing::info!(student = student_id, class = %class, "student enrolled");
    Ok(class_id)
}

pub fn is_enrolled(conn: &Connection, student_id: UserId, class_id: i64) -> EngineResult<bool> {
    let hit: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM enrolled WHERE student_id = ? AND class_id = ?",
            (student_id, class_id),
            |r| r.get(0),
        )
        .optional()?;
    Ok(hit.is_some())
}

pub fn require_enrolled(conn: &Connection, student_id: UserId, class_id: i64) -> EngineResult<()> {
    if is_enrolled(conn, student_id, class_id)? {
        Ok(())
    } else {
        Err(EngineError::not_found(format!(
            "enrollment of {student_id} in class {class_id}"
        )))
    }
}

/// Mean grade points over graded enrollments; ungraded rows count in neither
/// numerator nor denominator.
pub fn gpa_from_grades<I>(grades: I) -> f64
where
    I: IntoIterator<Item = Grade>,
{
    let mut sum = 0.0_f64;
    let mut count = 0_usize;
    for g in grades.into_iter().flatten() {
        sum += g.grade_points();
        count += 1;
    }
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

pub fn compute_gpa(conn: &Connection, student_id: UserId) -> EngineResult<f64> {
    let mut stmt = conn.prepare("SELECT grade FROM enrolled WHERE student_id = ?")?;
    let grades = stmt
        .query_map([student_id], |r| r.get::<_, Option<String>>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(gpa_from_grades(grades.into_iter().map(grade_from_column)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::fixtures::{dob, seed_class};
    use crate::catalog::{create_class, create_course, NewClass};
    use crate::db::test_conn;
    use crate::model::{LetterGrade, Season};
    use crate::people::create_student;

    #[test]
    fn second_enrollment_conflicts_and_keeps_row() {
        let conn = test_conn();
        let (key, class_id, _) = seed_class(&conn);
        let sid = create_student(&conn, "stud", "one", dob(), "CS").expect("student");
        assert_eq!(enroll(&conn, sid, &key).expect("first"), class_id);
        conn.execute(
            "UPDATE enrolled SET grade = 'B' WHERE student_id = ?",
            [sid],
        )
        .expect("grade");
        let e = enroll(&conn, sid, &key).expect_err("second");
        assert_eq!(e.code(), "conflict");
        let grade: Option<String> = conn
            .query_row("SELECT grade FROM enrolled WHERE student_id = ?", [sid], |r| {
                r.get(0)
            })
            .expect("row");
        assert_eq!(grade.as_deref(), Some("B"));
    }

    #[test]
    fn enrollment_starts_ungraded() {
        let conn = test_conn();
        let (key, _, _) = seed_class(&conn);
        let sid = create_student(&conn, "stud", "one", dob(), "CS").expect("student");
        enroll(&conn, sid, &key).expect("enroll");
        let grade: Option<String> = conn
            .query_row("SELECT grade FROM enrolled WHERE student_id = ?", [sid], |r| {
                r.get(0)
            })
            .expect("row");
        assert_eq!(grade, None);
    }

    #[test]
    fn enrollment_targets_must_exist() {
        let conn = test_conn();
        let (key, _, _) = seed_class(&conn);
        let sid = create_student(&conn, "stud", "one", dob(), "CS").expect("student");
        let missing = ClassKey::new("CS", 3500, Season::Summer, 2030);
        assert_eq!(enroll(&conn, sid, &missing).expect_err("class").code(), "not_found");
        assert_eq!(enroll(&conn, sid + 50, &key).expect_err("student").code(), "not_found");
    }

    #[test]
    fn gpa_ignores_ungraded_rows() {
        assert_eq!(gpa_from_grades([Some(LetterGrade::BPlus), None]), 3.3);
        assert_eq!(gpa_from_grades([None, None]), 0.0);
        assert_eq!(gpa_from_grades(Vec::<Grade>::new()), 0.0);
        let mixed = gpa_from_grades([Some(LetterGrade::A), Some(LetterGrade::E)]);
        assert!((mixed - 2.0).abs() < 1e-12);
    }

    #[test]
    fn gpa_from_store() {
        let conn = test_conn();
        let (key, _, prof) = seed_class(&conn);
        create_course(&conn, "CS", 2420, "Algorithms").expect("course");
        let other = ClassKey::new("CS", 2420, Season::Fall, 2024);
        create_class(
            &conn,
            &NewClass {
                subject: "CS",
                number: 2420,
                season: Season::Fall,
                year: 2024,
                start: crate::catalog::fixtures::t(11, 0),
                end: crate::catalog::fixtures::t(12, 0),
                location: "WEB",
                instructor_id: prof,
            },
        )
        .expect("class");
        let sid = create_student(&conn, "stud", "one", dob(), "CS").expect("student");
        assert_eq!(compute_gpa(&conn, sid).expect("empty"), 0.0);

        enroll(&conn, sid, &key).expect("enroll");
        enroll(&conn, sid, &other).expect("enroll");
        assert_eq!(compute_gpa(&conn, sid).expect("ungraded"), 0.0);

        conn.execute(
            "UPDATE enrolled SET grade = 'B+' WHERE student_id = ? AND class_id = (
               SELECT c.id FROM classes c JOIN courses co ON co.id = c.course_id WHERE co.number = 3500
             )",
            [sid],
        )
        .expect("grade");
        assert_eq!(compute_gpa(&conn, sid).expect("one graded"), 3.3);
    }
}
