use serde::{Deserialize, Serialize};
use std::fmt;
use time::OffsetDateTime;

use crate::error::Error;
use crate::tokenizer::normalize;

pub type RecordId = u64;

/// Which examination a paper belongs to.
///
/// Serialized as its string form: `midsem`, `endsem`, `ct`, `ct<N>`, or the empty
/// string for an unknown exam.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Exam {
    Midsem,
    Endsem,
    /// Class test, optionally numbered (`ct1`, `ct10`).
    ClassTest(Option<u32>),
    #[default]
    Unknown,
}

impl TryFrom<&str> for Exam {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "midsem" => Ok(Exam::Midsem),
            "endsem" => Ok(Exam::Endsem),
            "" => Ok(Exam::Unknown),
            other => match other.strip_prefix("ct") {
                Some("") => Ok(Exam::ClassTest(None)),
                Some(n) => n
                    .parse::<u32>()
                    .map(|n| Exam::ClassTest(Some(n)))
                    .map_err(|_| Error::InvalidField(format!("invalid class test number in exam `{other}`"))),
                None => Err(Error::InvalidField(format!("unknown exam `{other}`"))),
            },
        }
    }
}

impl TryFrom<String> for Exam {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Exam::try_from(value.as_str())
    }
}

impl From<Exam> for String {
    fn from(value: Exam) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Exam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Exam::Midsem => write!(f, "midsem"),
            Exam::Endsem => write!(f, "endsem"),
            Exam::ClassTest(None) => write!(f, "ct"),
            Exam::ClassTest(Some(n)) => write!(f, "ct{n}"),
            Exam::Unknown => Ok(()),
        }
    }
}

/// One indexed question paper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub course_code: String,
    pub course_name: String,
    pub year: i32,
    #[serde(default)]
    pub exam: Exam,
    #[serde(default)]
    pub semester: String,
    /// Opaque handle to the stored file; never interpreted here.
    #[serde(default)]
    pub file_reference: String,
    #[serde(default)]
    pub from_library: bool,
    #[serde(default)]
    pub approved: bool,
    #[serde(default)]
    pub soft_deleted: bool,
    #[serde(with = "time::serde::rfc3339", default = "OffsetDateTime::now_utc")]
    pub created_at: OffsetDateTime,
}

impl Record {
    pub fn new(id: RecordId, course_code: impl Into<String>, course_name: impl Into<String>) -> Self {
        Self {
            id,
            course_code: course_code.into(),
            course_name: course_name.into(),
            year: 0,
            exam: Exam::Unknown,
            semester: String::new(),
            file_reference: String::new(),
            from_library: false,
            approved: false,
            soft_deleted: false,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    /// Normalized `course_code course_name`, the text every search channel scores.
    pub fn searchable_text(&self) -> String {
        normalize(&format!("{} {}", self.course_code, self.course_name))
    }

    /// Visible to public search.
    pub fn is_searchable(&self) -> bool {
        self.approved && !self.soft_deleted
    }

    fn same_text(&self, other: &Record) -> bool {
        self.course_code == other.course_code && self.course_name == other.course_name
    }

    /// Whether replacing `self` with `next` requires touching the token index.
    pub(crate) fn needs_reindex(&self, next: &Record) -> bool {
        !self.same_text(next) || self.soft_deleted != next.soft_deleted
    }
}

/// Partial edit applied by the approval workflow. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecordPatch {
    pub course_code: Option<String>,
    pub course_name: Option<String>,
    pub year: Option<i32>,
    pub semester: Option<String>,
    pub exam: Option<Exam>,
    pub approved: Option<bool>,
}

impl RecordPatch {
    pub(crate) fn apply_to(self, record: &mut Record) {
        if let Some(code) = self.course_code { record.course_code = code; }
        if let Some(name) = self.course_name { record.course_name = name; }
        if let Some(year) = self.year { record.year = year; }
        if let Some(semester) = self.semester { record.semester = semester; }
        if let Some(exam) = self.exam { record.exam = exam; }
        if let Some(approved) = self.approved { record.approved = approved; }
    }
}
