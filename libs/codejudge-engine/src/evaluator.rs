/// Test Evaluator - classifies raw process output and aggregates results
///
/// Knows nothing about processes or toolchains: it receives what a run
/// produced and decides pass/fail.
///
/// **Classification (first match wins):**
/// - stderr not empty → failed, output = stderr
/// - execution error (spawn failure, non-zero exit, timeout, output
///   limit) → failed,
///   output = error description
/// - otherwise → passed iff trimmed stdout equals the expected text,
///   output = trimmed stdout
///
/// Only stdout is trimmed. The expected text is compared as authored.

use crate::error::JudgeError;
use codejudge_common::types::{TestCase, TestResult};
use thiserror::Error;

/// Raw execution output for a single test case
#[derive(Debug, Clone, Default)]
pub struct ExecutionOutput {
    pub stdout: String,
    pub stderr: String,
    /// Why the run counts as failed regardless of its output
    pub error: Option<String>,
    pub timed_out: bool,
    pub output_limit_exceeded: bool,
    pub execution_time_ms: u64,
}

pub fn evaluate_test(test_index: usize, output: &ExecutionOutput, test_case: &TestCase) -> TestResult {
    if !output.stderr.is_empty() {
        return TestResult {
            test_index,
            passed: false,
            output: output.stderr.clone(),
        };
    }

    if let Some(error) = &output.error {
        return TestResult {
            test_index,
            passed: false,
            output: error.clone(),
        };
    }

    let actual = output.stdout.trim();
    TestResult {
        test_index,
        passed: actual == test_case.expected,
        output: actual.to_string(),
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AggregateError {
    #[error("test index {index} is outside 1..={expected}")]
    OutOfRange { index: usize, expected: usize },

    #[error("test {0} reported twice")]
    Duplicate(usize),

    #[error("only {completed} of {expected} tests reported")]
    Incomplete { completed: usize, expected: usize },
}

impl From<AggregateError> for JudgeError {
    fn from(e: AggregateError) -> Self {
        JudgeError::Internal(e.to_string())
    }
}

/// Collects results in any arrival order and hands them back in test order.
///
/// Completion means every expected index has reported exactly once. A
/// suite of zero tests is complete from the start.
#[derive(Debug)]
pub struct ResultAggregator {
    slots: Vec<Option<TestResult>>,
    completed: usize,
}

impl ResultAggregator {
    pub fn new(expected: usize) -> Self {
        Self {
            slots: vec![None; expected],
            completed: 0,
        }
    }

    pub fn expected(&self) -> usize {
        self.slots.len()
    }

    pub fn completed(&self) -> usize {
        self.completed
    }

    pub fn is_complete(&self) -> bool {
        self.completed == self.slots.len()
    }

    pub fn record(&mut self, result: TestResult) -> Result<(), AggregateError> {
        let expected = self.slots.len();
        let index = result.test_index;
        if index == 0 || index > expected {
            return Err(AggregateError::OutOfRange { index, expected });
        }

        let slot = &mut self.slots[index - 1];
        if slot.is_some() {
            return Err(AggregateError::Duplicate(index));
        }
        *slot = Some(result);
        self.completed += 1;
        Ok(())
    }

    /// Results ordered by test index; fails unless every test reported
    pub fn into_results(self) -> Result<Vec<TestResult>, AggregateError> {
        if !self.is_complete() {
            return Err(AggregateError::Incomplete {
                completed: self.completed,
                expected: self.slots.len(),
            });
        }
        Ok(self.slots.into_iter().flatten().collect())
    }
}
