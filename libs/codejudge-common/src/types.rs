use serde::{Deserialize, Serialize};
use std::fmt;

/// Error label returned to clients when the toolchain rejects a submission
pub const COMPILATION_ERROR: &str = "Compilation Error";

/// Source language of a submission
///
/// Only C gets its own toolchain. Every other tag, including unknown
/// ones, is judged with the C++ toolchain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Language {
    C,
    Cpp,
}

impl Language {
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "c" => Language::C,
            _ => Language::Cpp,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Language::C => "c",
            Language::Cpp => "c++",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl From<String> for Language {
    fn from(tag: String) -> Self {
        Language::from_tag(&tag)
    }
}

impl From<Language> for String {
    fn from(language: Language) -> Self {
        language.tag().to_string()
    }
}

/// A single (input, expected output) pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    pub input: String,
    pub expected: String,
}

/// Problem document as stored in the problem store
///
/// Ids are opaque and assigned by the store. Documents exported from a
/// document database carry the id under `_id`, which is accepted too.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Problem {
    #[serde(alias = "_id")]
    pub id: String,
    pub title: String,
    #[serde(default, alias = "description")]
    pub statement: String,
    #[serde(default)]
    pub test_cases: Vec<TestCase>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
    pub language: Language,
    pub code: String,
    pub problem_id: String,
}

/// Outcome of one test case, indexed from 1 in problem order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestResult {
    #[serde(rename = "test")]
    pub test_index: usize,
    pub passed: bool,
    pub output: String,
}

/// What a finished submission reports back to the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SubmissionOutcome {
    Judged { results: Vec<TestResult> },
    CompilationFailed { error: String, details: String },
}

impl SubmissionOutcome {
    pub fn compilation_failed(details: impl Into<String>) -> Self {
        SubmissionOutcome::CompilationFailed {
            error: COMPILATION_ERROR.to_string(),
            details: details.into(),
        }
    }

    pub fn verdict(&self) -> &'static str {
        match self {
            SubmissionOutcome::Judged { results } if results.iter().all(|r| r.passed) => "accepted",
            SubmissionOutcome::Judged { .. } => "rejected",
            SubmissionOutcome::CompilationFailed { .. } => "compilation_error",
        }
    }
}
