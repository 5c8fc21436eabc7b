//! Read-only projections for browsing screens. Every listing returns an
//! empty vector when nothing matches, including when a parent key does not
//! resolve.

use crate::error::EngineResult;
use crate::model::{format_uid, grade_display, grade_from_column, AssignmentRef, ClassKey, UserId};
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DepartmentRow {
    pub subject: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogCourse {
    pub number: i64,
    pub cname: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogDepartment {
    pub subject: String,
    pub dname: String,
    pub courses: Vec<CatalogCourse>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CourseRow {
    pub number: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfessorRow {
    pub lname: String,
    pub fname: String,
    pub uid: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OfferingRow {
    pub season: String,
    pub year: i64,
    pub location: String,
    pub start: String,
    pub end: String,
    pub fname: String,
    pub lname: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RosterRow {
    pub fname: String,
    pub lname: String,
    pub uid: String,
    pub dob: String,
    pub grade: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryRow {
    pub name: String,
    pub weight: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssignmentRow {
    pub aname: String,
    pub cname: String,
    pub due: String,
    pub submissions: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmissionRow {
    pub fname: String,
    pub lname: String,
    pub uid: String,
    pub time: String,
    pub score: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentClassRow {
    pub subject: String,
    pub number: i64,
    pub name: String,
    pub season: String,
    pub year: i64,
    pub grade: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentAssignmentRow {
    pub aname: String,
    pub cname: String,
    pub due: String,
    /// `None` when the student has not submitted.
    pub score: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeachingRow {
    pub subject: String,
    pub number: i64,
    pub name: String,
    pub season: String,
    pub year: i64,
}

const CLASS_KEY_FILTER: &str =
    "d.subject = ?1 AND co.number = ?2 AND c.season = ?3 AND c.year = ?4";

pub fn departments(conn: &Connection) -> EngineResult<Vec<DepartmentRow>> {
    let mut stmt = conn.prepare("SELECT subject, name FROM departments ORDER BY subject")?;
    let rows = stmt
        .query_map([], |r| {
            Ok(DepartmentRow {
                subject: r.get(0)?,
                name: r.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn catalog(conn: &Connection) -> EngineResult<Vec<CatalogDepartment>> {
    let mut dept_stmt = conn.prepare("SELECT id, subject, name FROM departments ORDER BY subject")?;
    let depts = dept_stmt
        .query_map([], |r| {
            Ok((
                r.get::<_, i64>(0)?,
                r.get::<_, String>(1)?,
                r.get::<_, String>(2)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut course_stmt =
        conn.prepare("SELECT number, name FROM courses WHERE department_id = ? ORDER BY number")?;
    let mut out = Vec::with_capacity(depts.len());
    for (id, subject, dname) in depts {
        let courses = course_stmt
            .query_map([id], |r| {
                Ok(CatalogCourse {
                    number: r.get(0)?,
                    cname: r.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        out.push(CatalogDepartment {
            subject,
            dname,
            courses,
        });
    }
    Ok(out)
}

pub fn courses_in_department(conn: &Connection, subject: &str) -> EngineResult<Vec<CourseRow>> {
    let mut stmt = conn.prepare(
        "SELECT co.number, co.name
         FROM courses co
         JOIN departments d ON d.id = co.department_id
         WHERE d.subject = ?
         ORDER BY co.number",
    )?;
    let rows = stmt
        .query_map([subject], |r| {
            Ok(CourseRow {
                number: r.get(0)?,
                name: r.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn professors_in_department(conn: &Connection, subject: &str) -> EngineResult<Vec<ProfessorRow>> {
    let mut stmt = conn.prepare(
        "SELECT p.last_name, p.first_name, p.id
         FROM professors p
         JOIN departments d ON d.id = p.department_id
         WHERE d.subject = ?
         ORDER BY p.last_name, p.first_name",
    )?;
    let rows = stmt
        .query_map([subject], |r| {
            Ok(ProfessorRow {
                lname: r.get(0)?,
                fname: r.get(1)?,
                uid: format_uid(r.get(2)?),
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn class_offerings(conn: &Connection, subject: &str, number: i64) -> EngineResult<Vec<OfferingRow>> {
    let mut stmt = conn.prepare(
        "SELECT c.season, c.year, c.location, c.start_time, c.end_time, p.first_name, p.last_name
         FROM classes c
         JOIN courses co ON co.id = c.course_id
         JOIN departments d ON d.id = co.department_id
         JOIN professors p ON p.id = c.instructor_id
         WHERE d.subject = ? AND co.number = ?
         ORDER BY c.year, c.season",
    )?;
    let rows = stmt
        .query_map((subject, number), |r| {
            Ok(OfferingRow {
                season: r.get(0)?,
                year: r.get(1)?,
                location: r.get(2)?,
                start: r.get(3)?,
                end: r.get(4)?,
                fname: r.get(5)?,
                lname: r.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn roster(conn: &Connection, class: &ClassKey) -> EngineResult<Vec<RosterRow>> {
    let sql = format!(
        "SELECT s.first_name, s.last_name, s.id, s.birth_date, e.grade
         FROM enrolled e
         JOIN students s ON s.id = e.student_id
         JOIN classes c ON c.id = e.class_id
         JOIN courses co ON co.id = c.course_id
         JOIN departments d ON d.id = co.department_id
         WHERE {CLASS_KEY_FILTER}
         ORDER BY s.last_name, s.first_name"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(
            (&class.subject, class.number, class.season.as_str(), class.year),
            |r| {
                Ok(RosterRow {
                    fname: r.get(0)?,
                    lname: r.get(1)?,
                    uid: format_uid(r.get(2)?),
                    dob: r.get(3)?,
                    grade: grade_display(grade_from_column(r.get(4)?)).to_string(),
                })
            },
        )?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn assignment_categories(conn: &Connection, class: &ClassKey) -> EngineResult<Vec<CategoryRow>> {
    let sql = format!(
        "SELECT ac.name, ac.weight
         FROM assignment_categories ac
         JOIN classes c ON c.id = ac.class_id
         JOIN courses co ON co.id = c.course_id
         JOIN departments d ON d.id = co.department_id
         WHERE {CLASS_KEY_FILTER}
         ORDER BY ac.id"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(
            (&class.subject, class.number, class.season.as_str(), class.year),
            |r| {
                Ok(CategoryRow {
                    name: r.get(0)?,
                    weight: r.get(1)?,
                })
            },
        )?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// `category == None` lists every assignment in the class.
pub fn assignments_in_category(
    conn: &Connection,
    class: &ClassKey,
    category: Option<&str>,
) -> EngineResult<Vec<AssignmentRow>> {
    let sql = format!(
        "SELECT a.name, ac.name, a.due_time,
           (SELECT COUNT(*) FROM submissions s WHERE s.assignment_id = a.id)
         FROM assignments a
         JOIN assignment_categories ac ON ac.id = a.category_id
         JOIN classes c ON c.id = ac.class_id
         JOIN courses co ON co.id = c.course_id
         JOIN departments d ON d.id = co.department_id
         WHERE {CLASS_KEY_FILTER} AND (?5 IS NULL OR ac.name = ?5)
         ORDER BY ac.id, a.due_time, a.id"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(
            (
                &class.subject,
                class.number,
                class.season.as_str(),
                class.year,
                category,
            ),
            |r| {
                Ok(AssignmentRow {
                    aname: r.get(0)?,
                    cname: r.get(1)?,
                    due: r.get(2)?,
                    submissions: r.get(3)?,
                })
            },
        )?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn submissions_to_assignment(conn: &Connection, a: &AssignmentRef) -> EngineResult<Vec<SubmissionRow>> {
    let sql = format!(
        "SELECT st.first_name, st.last_name, st.id, s.submitted_time, s.score
         FROM submissions s
         JOIN students st ON st.id = s.student_id
         JOIN assignments a ON a.id = s.assignment_id
         JOIN assignment_categories ac ON ac.id = a.category_id
         JOIN classes c ON c.id = ac.class_id
         JOIN courses co ON co.id = c.course_id
         JOIN departments d ON d.id = co.department_id
         WHERE {CLASS_KEY_FILTER} AND ac.name = ?5 AND a.name = ?6
         ORDER BY st.last_name, st.first_name"
    );
    let k = &a.class;
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(
            (
                &k.subject,
                k.number,
                k.season.as_str(),
                k.year,
                &a.category,
                &a.name,
            ),
            |r| {
                Ok(SubmissionRow {
                    fname: r.get(0)?,
                    lname: r.get(1)?,
                    uid: format_uid(r.get(2)?),
                    time: r.get(3)?,
                    score: r.get(4)?,
                })
            },
        )?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn student_classes(conn: &Connection, student_id: UserId) -> EngineResult<Vec<StudentClassRow>> {
    let mut stmt = conn.prepare(
        "SELECT d.subject, co.number, co.name, c.season, c.year, e.grade
         FROM enrolled e
         JOIN classes c ON c.id = e.class_id
         JOIN courses co ON co.id = c.course_id
         JOIN departments d ON d.id = co.department_id
         WHERE e.student_id = ?
         ORDER BY c.year, c.season, d.subject, co.number",
    )?;
    let rows = stmt
        .query_map([student_id], |r| {
            Ok(StudentClassRow {
                subject: r.get(0)?,
                number: r.get(1)?,
                name: r.get(2)?,
                season: r.get(3)?,
                year: r.get(4)?,
                grade: grade_display(grade_from_column(r.get(5)?)).to_string(),
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Every assignment of a class the student is enrolled in, with their score
/// if they submitted. Not enrolled means an empty list.
pub fn student_assignments(
    conn: &Connection,
    class: &ClassKey,
    student_id: UserId,
) -> EngineResult<Vec<StudentAssignmentRow>> {
    let sql = format!(
        "SELECT a.name, ac.name, a.due_time, s.score
         FROM assignments a
         JOIN assignment_categories ac ON ac.id = a.category_id
         JOIN classes c ON c.id = ac.class_id
         JOIN courses co ON co.id = c.course_id
         JOIN departments d ON d.id = co.department_id
         JOIN enrolled e ON e.class_id = c.id AND e.student_id = ?5
         LEFT JOIN submissions s ON s.assignment_id = a.id AND s.student_id = ?5
         WHERE {CLASS_KEY_FILTER}
         ORDER BY ac.id, a.due_time, a.id"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(
            (
                &class.subject,
                class.number,
                class.season.as_str(),
                class.year,
                student_id,
            ),
            |r| {
                Ok(StudentAssignmentRow {
                    aname: r.get(0)?,
                    cname: r.get(1)?,
                    due: r.get(2)?,
                    score: r.get(3)?,
                })
            },
        )?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn professor_classes(conn: &Connection, professor_id: UserId) -> EngineResult<Vec<TeachingRow>> {
    let mut stmt = conn.prepare(
        "SELECT d.subject, co.number, co.name, c.season, c.year
         FROM classes c
         JOIN courses co ON co.id = c.course_id
         JOIN departments d ON d.id = co.department_id
         WHERE c.instructor_id = ?
         ORDER BY c.year, c.season, d.subject, co.number",
    )?;
    let rows = stmt
        .query_map([professor_id], |r| {
            Ok(TeachingRow {
                subject: r.get(0)?,
                number: r.get(1)?,
                name: r.get(2)?,
                season: r.get(3)?,
                year: r.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Assignment body, or "" when the path does not resolve.
pub fn assignment_contents(conn: &Connection, a: &AssignmentRef) -> EngineResult<String> {
    let contents: Option<String> = conn
        .query_row(
            "SELECT a.contents FROM assignments a WHERE a.id = (
               SELECT a2.id
               FROM assignments a2
               JOIN assignment_categories ac ON ac.id = a2.category_id
               JOIN classes c ON c.id = ac.class_id
               JOIN courses co ON co.id = c.course_id
               JOIN departments d ON d.id = co.department_id
               WHERE d.subject = ?1 AND co.number = ?2 AND c.season = ?3 AND c.year = ?4
                 AND ac.name = ?5 AND a2.name = ?6
             )",
            (
                &a.class.subject,
                a.class.number,
                a.class.season.as_str(),
                a.class.year,
                &a.category,
                &a.name,
            ),
            |r| r.get(0),
        )
        .optional()?;
    Ok(contents.unwrap_or_default())
}

/// Submission body, or "" when the student has not submitted.
pub fn submission_text(conn: &Connection, a: &AssignmentRef, student_id: UserId) -> EngineResult<String> {
    let Some(resolved) = crate::grading::find_assignment(conn, a)? else {
        return Ok(String::new());
    };
    let contents: Option<String> = conn
        .query_row(
            "SELECT contents FROM submissions WHERE assignment_id = ? AND student_id = ?",
            (resolved.assignment_id, student_id),
            |r| r.get(0),
        )
        .optional()?;
    Ok(contents.unwrap_or_default())
}
