use crate::catalog::require_class_id;
use crate::db;
use crate::error::{map_constraint, EngineError, EngineResult};
use crate::model::{format_datetime, AssignmentRef, CategoryWeight, ClassKey, UserId};
use crate::people::require_student;
use chrono::NaiveDateTime;
use rusqlite::{Connection, OptionalExtension};

/// Ids an assignment path resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedAssignment {
    pub class_id: i64,
    pub category_id: i64,
    pub assignment_id: i64,
}

fn find_category(conn: &Connection, key: &ClassKey, name: &str) -> EngineResult<Option<(i64, i64)>> {
    Ok(conn
        .query_row(
            "SELECT c.id, ac.id
             FROM assignment_categories ac
             JOIN classes c ON c.id = ac.class_id
             JOIN courses co ON co.id = c.course_id
             JOIN departments d ON d.id = co.department_id
             WHERE d.subject = ? AND co.number = ? AND c.season = ? AND c.year = ? AND ac.name = ?",
            (&key.subject, key.number, key.season.as_str(), key.year, name),
            |r| Ok((r.get(0)?, r.get(1)?)),
        )
        .optional()?)
}

pub fn find_assignment(conn: &Connection, a: &AssignmentRef) -> EngineResult<Option<ResolvedAssignment>> {
    let k = &a.class;
    Ok(conn
        .query_row(
            "SELECT c.id, ac.id, a.id
             FROM assignments a
             JOIN assignment_categories ac ON ac.id = a.category_id
             JOIN classes c ON c.id = ac.class_id
             JOIN courses co ON co.id = c.course_id
             JOIN departments d ON d.id = co.department_id
             WHERE d.subject = ? AND co.number = ? AND c.season = ? AND c.year = ?
               AND ac.name = ? AND a.name = ?",
            (
                &k.subject,
                k.number,
                k.season.as_str(),
                k.year,
                &a.category,
                &a.name,
            ),
            |r| {
                Ok(ResolvedAssignment {
                    class_id: r.get(0)?,
                    category_id: r.get(1)?,
                    assignment_id: r.get(2)?,
                })
            },
        )
        .optional()?)
}

pub fn require_assignment(conn: &Connection, a: &AssignmentRef) -> EngineResult<ResolvedAssignment> {
    find_assignment(conn, a)?.ok_or_else(|| EngineError::not_found(format!("assignment {a}")))
}

pub fn create_assignment_category(
    conn: &Connection,
    class: &ClassKey,
    name: &str,
    weight: CategoryWeight,
) -> EngineResult<i64> {
    let tx = db::immediate_tx(conn)?;
    let class_id = require_class_id(&tx, class)?;
    if find_category(&tx, class, name)?.is_some() {
        return Err(EngineError::conflict(format!(
            "category '{name}' already exists in {class}"
        )));
    }
    tx.execute(
        "INSERT INTO assignment_categories(class_id, name, weight) VALUES(?, ?, ?)",
        (class_id, name, weight.get()),
    )
    .map_err(|e| map_constraint(e, "category already exists"))?;
    let id = tx.last_insert_rowid();
    tx.commit()?;
    tracing::info!(class = %class, category = name, weight = weight.get(), "category created");
    Ok(id)
}

#[derive(Debug, Clone)]
pub struct NewAssignment<'a> {
    pub name: &'a str,
    pub points: i64,
    pub due: NaiveDateTime,
    pub contents: &'a str,
}

/// Inserts the assignment and returns where it landed. Every enrolled
/// student's denominator changes, so the caller follows up with a full
/// recomputation of `class_id`.
pub fn create_assignment(
    conn: &Connection,
    class: &ClassKey,
    category: &str,
    new: &NewAssignment<'_>,
) -> EngineResult<ResolvedAssignment> {
    if new.points < 0 {
        return Err(EngineError::invalid(format!(
            "assignment points must be non-negative (got {})",
            new.points
        )));
    }

    let tx = db::immediate_tx(conn)?;
    let (class_id, category_id) = find_category(&tx, class, category)?
        .ok_or_else(|| EngineError::not_found(format!("category '{category}' in {class}")))?;
    let dup: Option<i64> = tx
        .query_row(
            "SELECT id FROM assignments WHERE category_id = ? AND name = ?",
            (category_id, new.name),
            |r| r.get(0),
        )
        .optional()?;
    if dup.is_some() {
        return Err(EngineError::conflict(format!(
            "assignment '{}' already exists in category '{category}'",
            new.name
        )));
    }
    tx.execute(
        "INSERT INTO assignments(category_id, name, points, due_time, contents) VALUES(?, ?, ?, ?, ?)",
        (
            category_id,
            new.name,
            new.points,
            format_datetime(new.due),
            new.contents,
        ),
    )
    .map_err(|e| map_constraint(e, "assignment already exists"))?;
    let assignment_id = tx.last_insert_rowid();
    tx.commit()?;
    tracing::info!(class = %class, category, assignment = new.name, points = new.points, "assignment created");
    Ok(ResolvedAssignment {
        class_id,
        category_id,
        assignment_id,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionOutcome {
    Created,
    Replaced,
}

/// Upserts by (student, assignment). A resubmission replaces contents and
/// time but keeps whatever score was already given.
pub fn record_submission(
    conn: &Connection,
    assignment: &AssignmentRef,
    student_id: UserId,
    contents: &str,
    now: NaiveDateTime,
) -> EngineResult<SubmissionOutcome> {
    let tx = db::immediate_tx(conn)?;
    let resolved = require_assignment(&tx, assignment)?;
    require_student(&tx, student_id)?;
    let changed = tx.execute(
        "UPDATE submissions SET contents = ?, submitted_time = ?
         WHERE student_id = ? AND assignment_id = ?",
        (contents, format_datetime(now), student_id, resolved.assignment_id),
    )?;
    let outcome = if changed > 0 {
        SubmissionOutcome::Replaced
    } else {
        tx.execute(
            "INSERT INTO submissions(student_id, assignment_id, submitted_time, score, contents)
             VALUES(?, ?, ?, 0, ?)",
            (student_id, resolved.assignment_id, format_datetime(now), contents),
        )?;
        SubmissionOutcome::Created
    };
    tx.commit()?;
    tracing::info!(student = student_id, assignment = %assignment, ?outcome, "submission recorded");
    Ok(outcome)
}

/// Sets the score and returns the owning class so the caller can recompute
/// this one student's grade there.
pub fn grade_submission(
    conn: &Connection,
    assignment: &AssignmentRef,
    student_id: UserId,
    score: i64,
) -> EngineResult<ResolvedAssignment> {
    if score < 0 {
        return Err(EngineError::invalid(format!(
            "score must be non-negative (got {score})"
        )));
    }
    let resolved = require_assignment(conn, assignment)?;
    let changed = conn.execute(
        "UPDATE submissions SET score = ? WHERE student_id = ? AND assignment_id = ?",
        (score, student_id, resolved.assignment_id),
    )?;
    if changed == 0 {
        return Err(EngineError::not_found(format!(
            "submission by {student_id} to {assignment}"
        )));
    }
    tracing::info!(student = student_id, assignment = %assignment, score, "submission graded");
    Ok(resolved)
}
