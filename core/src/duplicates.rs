use serde::Deserialize;

use crate::document::DocumentIndex;
use crate::record::{Exam, Record};

/// Structured equality lookup used before approving a paper.
///
/// `course_code` always has to match; every other field is a wildcard when `None`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DuplicateQuery {
    pub course_code: String,
    pub year: Option<i32>,
    pub exam: Option<Exam>,
    pub semester: Option<String>,
    pub course_name: Option<String>,
}

impl DuplicateQuery {
    pub fn new(course_code: impl Into<String>) -> Self {
        Self { course_code: course_code.into(), ..Default::default() }
    }

    pub fn year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }

    pub fn exam(mut self, exam: Exam) -> Self {
        self.exam = Some(exam);
        self
    }

    pub fn semester(mut self, semester: impl Into<String>) -> Self {
        self.semester = Some(semester.into());
        self
    }

    pub fn course_name(mut self, name: impl Into<String>) -> Self {
        self.course_name = Some(name.into());
        self
    }

    /// Soft-deleted records never match; unapproved ones do.
    pub fn matches(&self, r: &Record) -> bool {
        !r.soft_deleted
            && r.course_code == self.course_code
            && self.year.map_or(true, |y| r.year == y)
            && self.exam.map_or(true, |e| r.exam == e)
            && self.semester.as_deref().map_or(true, |s| r.semester == s)
            && self.course_name.as_deref().map_or(true, |n| r.course_name == n)
    }
}

/// All live records matching `query`, in id order. No match is an empty list.
pub fn find_duplicates(docs: &DocumentIndex, query: &DuplicateQuery) -> Vec<Record> {
    docs.scan(|r| query.matches(r)).cloned().collect()
}
