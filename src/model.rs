use crate::error::{EngineError, EngineResult};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;

pub type UserId = i64;

pub const TIME_FORMAT: &str = "%H:%M:%S";
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Display form of an enrollment that has no letter yet.
pub const UNGRADED: &str = "--";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Season {
    Spring,
    Summer,
    Fall,
}

impl Season {
    pub fn parse(s: &str) -> EngineResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "spring" => Ok(Self::Spring),
            "summer" => Ok(Self::Summer),
            "fall" => Ok(Self::Fall),
            other => Err(EngineError::invalid(format!(
                "season must be Spring, Summer or Fall (got '{other}')"
            ))),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Spring => "Spring",
            Self::Summer => "Summer",
            Self::Fall => "Fall",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LetterGrade {
    A,
    AMinus,
    BPlus,
    B,
    BMinus,
    CPlus,
    C,
    CMinus,
    DPlus,
    D,
    DMinus,
    E,
}

/// Inclusive lower bounds, highest first.
const LETTER_BREAKPOINTS: [(f64, LetterGrade); 11] = [
    (93.0, LetterGrade::A),
    (90.0, LetterGrade::AMinus),
    (87.0, LetterGrade::BPlus),
    (83.0, LetterGrade::B),
    (80.0, LetterGrade::BMinus),
    (77.0, LetterGrade::CPlus),
    (73.0, LetterGrade::C),
    (70.0, LetterGrade::CMinus),
    (67.0, LetterGrade::DPlus),
    (63.0, LetterGrade::D),
    (60.0, LetterGrade::DMinus),
];

impl LetterGrade {
    pub fn from_percent(percent: f64) -> Self {
        LETTER_BREAKPOINTS
            .iter()
            .find(|(floor, _)| percent >= *floor)
            .map(|(_, g)| *g)
            .unwrap_or(Self::E)
    }

    pub fn grade_points(self) -> f64 {
        match self {
            Self::A => 4.0,
            Self::AMinus => 3.7,
            Self::BPlus => 3.3,
            Self::B => 3.0,
            Self::BMinus => 2.7,
            Self::CPlus => 2.3,
            Self::C => 2.0,
            Self::CMinus => 1.7,
            Self::DPlus => 1.3,
            Self::D => 1.0,
            Self::DMinus => 0.7,
            Self::E => 0.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::AMinus => "A-",
            Self::BPlus => "B+",
            Self::B => "B",
            Self::BMinus => "B-",
            Self::CPlus => "C+",
            Self::C => "C",
            Self::CMinus => "C-",
            Self::DPlus => "D+",
            Self::D => "D",
            Self::DMinus => "D-",
            Self::E => "E",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "A" => Some(Self::A),
            "A-" => Some(Self::AMinus),
            "B+" => Some(Self::BPlus),
            "B" => Some(Self::B),
            "B-" => Some(Self::BMinus),
            "C+" => Some(Self::CPlus),
            "C" => Some(Self::C),
            "C-" => Some(Self::CMinus),
            "D+" => Some(Self::DPlus),
            "D" => Some(Self::D),
            "D-" => Some(Self::DMinus),
            "E" => Some(Self::E),
            _ => None,
        }
    }
}

/// `None` means the enrollment has not been graded yet.
pub type Grade = Option<LetterGrade>;

/// Reads the stored `enrolled.grade` column. Unknown strings are treated as
/// ungraded so a hand-edited row cannot poison GPA computation.
pub fn grade_from_column(raw: Option<String>) -> Grade {
    raw.as_deref().and_then(LetterGrade::parse)
}

pub fn grade_display(grade: Grade) -> &'static str {
    grade.map(LetterGrade::as_str).unwrap_or(UNGRADED)
}

/// Natural key of a class offering: subject, course number and term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassKey {
    pub subject: String,
    pub number: i64,
    pub season: Season,
    pub year: i64,
}

impl ClassKey {
    pub fn new(subject: impl Into<String>, number: i64, season: Season, year: i64) -> Self {
        Self {
            subject: subject.into(),
            number,
            season,
            year,
        }
    }
}

impl std::fmt::Display for ClassKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} {} {}",
            self.subject,
            self.number,
            self.season.as_str(),
            self.year
        )
    }
}

/// Six-part path to one assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignmentRef {
    pub class: ClassKey,
    pub category: String,
    pub name: String,
}

impl AssignmentRef {
    pub fn new(class: ClassKey, category: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            class,
            category: category.into(),
            name: name.into(),
        }
    }
}

impl std::fmt::Display for AssignmentRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} / {} / {}", self.class, self.category, self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoryWeight(u32);

impl CategoryWeight {
    pub fn new(raw: i64, max: u32) -> EngineResult<Self> {
        if raw < 0 || raw > i64::from(max) {
            return Err(EngineError::invalid(format!(
                "category weight must be between 0 and {max} (got {raw})"
            )));
        }
        Ok(Self(raw as u32))
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

/// Accepts `42` or the legacy `"u0000042"` spelling.
pub fn parse_uid(raw: &str) -> EngineResult<UserId> {
    let t = raw.trim();
    let digits = t
        .strip_prefix('u')
        .or_else(|| t.strip_prefix('U'))
        .unwrap_or(t);
    match digits.parse::<i64>() {
        Ok(v) if v >= 0 && !digits.is_empty() => Ok(v),
        _ => Err(EngineError::invalid(format!("malformed user id '{raw}'"))),
    }
}

pub fn format_uid(id: UserId) -> String {
    format!("u{id:07}")
}

pub fn format_time(t: NaiveTime) -> String {
    t.format(TIME_FORMAT).to_string()
}

pub fn parse_stored_time(s: &str) -> EngineResult<NaiveTime> {
    NaiveTime::parse_from_str(s, TIME_FORMAT)
        .map_err(|e| EngineError::invalid(format!("stored time '{s}' is malformed: {e}")))
}

pub fn format_datetime(t: NaiveDateTime) -> String {
    t.format(DATETIME_FORMAT).to_string()
}

pub fn format_date(d: NaiveDate) -> String {
    d.format(DATE_FORMAT).to_string()
}

/// Two-decimal rounding used for displayed percentages.
pub fn round_2_decimals(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn letter_boundaries_are_inclusive() {
        assert_eq!(LetterGrade::from_percent(93.0), LetterGrade::A);
        assert_eq!(LetterGrade::from_percent(92.999), LetterGrade::AMinus);
        assert_eq!(LetterGrade::from_percent(90.0), LetterGrade::AMinus);
        assert_eq!(LetterGrade::from_percent(87.0), LetterGrade::BPlus);
        assert_eq!(LetterGrade::from_percent(83.0), LetterGrade::B);
        assert_eq!(LetterGrade::from_percent(80.0), LetterGrade::BMinus);
        assert_eq!(LetterGrade::from_percent(77.0), LetterGrade::CPlus);
        assert_eq!(LetterGrade::from_percent(73.0), LetterGrade::C);
        assert_eq!(LetterGrade::from_percent(70.0), LetterGrade::CMinus);
        assert_eq!(LetterGrade::from_percent(67.0), LetterGrade::DPlus);
        assert_eq!(LetterGrade::from_percent(63.0), LetterGrade::D);
        assert_eq!(LetterGrade::from_percent(60.0), LetterGrade::DMinus);
        assert_eq!(LetterGrade::from_percent(59.99), LetterGrade::E);
        assert_eq!(LetterGrade::from_percent(0.0), LetterGrade::E);
        assert_eq!(LetterGrade::from_percent(f64::NAN), LetterGrade::E);
    }

    #[test]
    fn letters_round_trip_through_column_text() {
        for (_, g) in LETTER_BREAKPOINTS {
            assert_eq!(LetterGrade::parse(g.as_str()), Some(g));
        }
        assert_eq!(grade_from_column(Some("--".into())), None);
        assert_eq!(grade_from_column(None), None);
        assert_eq!(grade_display(None), "--");
        assert_eq!(grade_display(Some(LetterGrade::BPlus)), "B+");
    }

    #[test]
    fn uid_accepts_plain_and_prefixed_forms() {
        assert_eq!(parse_uid("42").expect("plain"), 42);
        assert_eq!(parse_uid("u0000042").expect("prefixed"), 42);
        assert_eq!(format_uid(42), "u0000042");
        assert!(parse_uid("u").is_err());
        assert!(parse_uid("abc").is_err());
        assert!(parse_uid("-3").is_err());
    }

    #[test]
    fn season_parse_is_case_insensitive() {
        assert_eq!(Season::parse("fall").expect("fall"), Season::Fall);
        assert_eq!(Season::parse(" Spring ").expect("spring"), Season::Spring);
        assert_eq!(Season::parse("Winter").expect_err("winter").code(), "bad_params");
    }

    #[test]
    fn category_weight_is_bounded() {
        assert_eq!(CategoryWeight::new(75, 100).expect("75").get(), 75);
        assert!(CategoryWeight::new(101, 100).is_err());
        assert!(CategoryWeight::new(-1, 100).is_err());
    }
}
