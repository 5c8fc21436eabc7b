use crate::db;
use crate::error::{EngineError, EngineResult};
use crate::model::{format_uid, round_2_decimals, LetterGrade, UserId};
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecomputeTarget {
    Student(UserId),
    AllEnrolled,
}

#[derive(Debug, Clone)]
pub struct CalcContext<'a> {
    pub conn: &'a Connection,
    pub class_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryScore {
    pub name: String,
    pub weight: i64,
    pub score_sum: i64,
    /// Points of every assignment in the category, submitted or not.
    pub points_sum: i64,
}

impl CategoryScore {
    /// `None` when the category has no points to earn yet.
    pub fn fraction(&self) -> Option<f64> {
        if self.points_sum > 0 {
            Some(self.score_sum as f64 / self.points_sum as f64)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeBreakdown {
    pub student_id: UserId,
    pub categories: Vec<CategoryScore>,
    pub weighted_sum: f64,
    pub weight_total: i64,
    pub percent: f64,
    #[serde(serialize_with = "serialize_letter")]
    pub letter: LetterGrade,
}

fn serialize_letter<S: serde::Serializer>(g: &LetterGrade, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(g.as_str())
}

/// Float noise below this scale is dropped, so an exact 7/10 lands on 70.0
/// rather than 69.99999999999999 and meets the 70 lower bound.
const PERCENT_SNAP: f64 = 1e9;

fn snap_percent(percent: f64) -> f64 {
    (percent * PERCENT_SNAP).round() / PERCENT_SNAP
}

/// Weighted category average on a 0-100 scale.
///
/// Categories without any points are left out of both the weighted sum and
/// the weight total; with nothing left the result is 0.
pub fn weighted_percent(categories: &[CategoryScore]) -> (f64, i64, f64) {
    let mut weighted_sum = 0.0_f64;
    let mut weight_total = 0_i64;
    for c in categories {
        let Some(fraction) = c.fraction() else {
            continue;
        };
        weighted_sum += fraction * c.weight as f64;
        weight_total += c.weight;
    }
    let percent = if weight_total > 0 {
        snap_percent(100.0 * weighted_sum / weight_total as f64)
    } else {
        0.0
    };
    (weighted_sum, weight_total, percent)
}

fn load_category_scores(ctx: &CalcContext<'_>, student_id: UserId) -> EngineResult<Vec<CategoryScore>> {
    // Correlated subqueries keep the two sums from multiplying through a join.
    let mut stmt = ctx.conn.prepare(
        "SELECT
           ac.name,
           ac.weight,
           COALESCE((SELECT SUM(a.points) FROM assignments a WHERE a.category_id = ac.id), 0),
           COALESCE((
             SELECT SUM(s.score)
             FROM assignments a
             JOIN submissions s ON s.assignment_id = a.id
             WHERE a.category_id = ac.id AND s.student_id = ?
           ), 0)
         FROM assignment_categories ac
         WHERE ac.class_id = ?
         ORDER BY ac.id",
    )?;
    let rows = stmt
        .query_map((student_id, ctx.class_id), |r| {
            Ok(CategoryScore {
                name: r.get(0)?,
                weight: r.get(1)?,
                points_sum: r.get(2)?,
                score_sum: r.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Computes a student's standing in the class without writing anything.
pub fn grade_breakdown(ctx: &CalcContext<'_>, student_id: UserId) -> EngineResult<GradeBreakdown> {
    let categories = load_category_scores(ctx, student_id)?;
    let (weighted_sum, weight_total, percent) = weighted_percent(&categories);
    Ok(GradeBreakdown {
        student_id,
        categories,
        weighted_sum,
        weight_total,
        percent: round_2_decimals(percent),
        // Letter comes from the unrounded percent.
        letter: LetterGrade::from_percent(percent),
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecomputedGrade {
    pub uid: String,
    pub grade: String,
    pub percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecomputeFailure {
    pub uid: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecomputeReport {
    pub class_id: i64,
    pub updated: Vec<RecomputedGrade>,
    pub failed: Vec<RecomputeFailure>,
}

impl RecomputeReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

fn enrolled_targets(conn: &Connection, class_id: i64, target: RecomputeTarget) -> EngineResult<Vec<UserId>> {
    match target {
        RecomputeTarget::Student(uid) => {
            let hit: Option<i64> = conn
                .query_row(
                    "SELECT student_id FROM enrolled WHERE class_id = ? AND student_id = ?",
                    (class_id, uid),
                    |r| r.get(0),
                )
                .optional()?;
            Ok(hit.into_iter().collect())
        }
        RecomputeTarget::AllEnrolled => {
            let mut stmt = conn.prepare(
                "SELECT student_id FROM enrolled WHERE class_id = ? ORDER BY student_id",
            )?;
            let ids = stmt
                .query_map([class_id], |r| r.get::<_, i64>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(ids)
        }
    }
}

fn recompute_student(conn: &Connection, class_id: i64, student_id: UserId) -> EngineResult<GradeBreakdown> {
    let tx = db::immediate_tx(conn)?;
    let breakdown = grade_breakdown(&CalcContext { conn: &tx, class_id }, student_id)?;
    let changed = tx.execute(
        "UPDATE enrolled SET grade = ? WHERE class_id = ? AND student_id = ?",
        (breakdown.letter.as_str(), class_id, student_id),
    )?;
    if changed == 0 {
        return Err(EngineError::not_found(format!(
            "enrollment of {student_id} in class {class_id}"
        )));
    }
    tx.commit()?;
    Ok(breakdown)
}

/// Rewrites the letter grade of each targeted enrolled student from scratch.
///
/// Every student commits on their own; a failure is recorded in the report
/// and the remaining students are still processed. Only failing to list the
/// targets is an error.
pub fn recompute_grades(
    conn: &Connection,
    class_id: i64,
    target: RecomputeTarget,
) -> EngineResult<RecomputeReport> {
    let students = enrolled_targets(conn, class_id, target)?;
    let mut report = RecomputeReport {
        class_id,
        ..Default::default()
    };
    for student_id in students {
        match recompute_student(conn, class_id, student_id) {
            Ok(b) => report.updated.push(RecomputedGrade {
                uid: format_uid(student_id),
                grade: b.letter.as_str().to_string(),
                percent: b.percent,
            }),
            Err(e) => {
                tracing::warn!(class_id, student = student_id, error = %e, "grade recompute failed");
                report.failed.push(RecomputeFailure {
                    uid: format_uid(student_id),
                    message: e.to_string(),
                });
            }
        }
    }
    if report.is_clean() {
        tracing::info!(class_id, updated = report.updated.len(), "grades recomputed");
    } else {
        tracing::warn!(
            class_id,
            updated = report.updated.len(),
            failed = report.failed.len(),
            "grades recomputed with failures"
        );
    }
    Ok(report)
}
