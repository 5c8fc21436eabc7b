//! Admission rules for new class offerings.
//!
//! Room overlap compares time-of-day only: two offerings in different terms
//! that share a room at the same clock time still collide.

use crate::error::{EngineError, EngineResult};
use crate::model::{format_time, parse_stored_time, Season};
use chrono::NaiveTime;
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use serde_json::json;

#[derive(Debug, Clone)]
pub struct ClassCandidate<'a> {
    pub course_id: i64,
    pub season: Season,
    pub year: i64,
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub location: &'a str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "rule", rename_all = "camelCase")]
pub enum SchedulingConflict {
    #[serde(rename_all = "camelCase")]
    LocationOverlap {
        class_id: i64,
        location: String,
        start: String,
        end: String,
    },
    #[serde(rename_all = "camelCase")]
    DuplicateOffering { class_id: i64 },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchedulingVerdict {
    pub conflicts: Vec<SchedulingConflict>,
}

impl SchedulingVerdict {
    pub fn is_admissible(&self) -> bool {
        self.conflicts.is_empty()
    }

    pub fn into_result(self) -> EngineResult<()> {
        if self.is_admissible() {
            return Ok(());
        }
        let message = if self.conflicts.len() > 1 {
            "location is booked and the course is already offered this term"
        } else {
            match &self.conflicts[0] {
                SchedulingConflict::LocationOverlap { .. } => {
                    "another class occupies this location during that time"
                }
                SchedulingConflict::DuplicateOffering { .. } => {
                    "course is already offered in this term"
                }
            }
        };
        Err(EngineError::conflict_with(
            message,
            json!({ "conflicts": self.conflicts }),
        ))
    }
}

/// Closed-interval intersection: touching endpoints count as overlap.
pub fn intervals_overlap(
    existing_start: NaiveTime,
    existing_end: NaiveTime,
    start: NaiveTime,
    end: NaiveTime,
) -> bool {
    existing_end >= start && existing_start <= end
}

/// Evaluates every rule against the current store without writing.
/// Callers run this inside the same immediate transaction as the insert.
pub fn check_class(conn: &Connection, c: &ClassCandidate<'_>) -> EngineResult<SchedulingVerdict> {
    let mut verdict = SchedulingVerdict::default();

    let mut stmt = conn.prepare(
        "SELECT id, start_time, end_time FROM classes WHERE location = ? ORDER BY id",
    )?;
    let booked = stmt
        .query_map([c.location], |r| {
            Ok((
                r.get::<_, i64>(0)?,
                r.get::<_, String>(1)?,
                r.get::<_, String>(2)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    for (class_id, s, e) in booked {
        let existing_start = parse_stored_time(&s)?;
        let existing_end = parse_stored_time(&e)?;
        if intervals_overlap(existing_start, existing_end, c.start, c.end) {
            verdict.conflicts.push(SchedulingConflict::LocationOverlap {
                class_id,
                location: c.location.to_string(),
                start: format_time(existing_start),
                end: format_time(existing_end),
            });
        }
    }

    let duplicate: Option<i64> = conn
        .query_row(
            "SELECT id FROM classes WHERE course_id = ? AND season = ? AND year = ?",
            (c.course_id, c.season.as_str(), c.year),
            |r| r.get(0),
        )
        .optional()?;
    if let Some(class_id) = duplicate {
        verdict
            .conflicts
            .push(SchedulingConflict::DuplicateOffering { class_id });
    }

    Ok(verdict)
}
