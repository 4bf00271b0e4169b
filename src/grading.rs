//! Scoring of submitted task solutions.

use crate::storage::Task;

pub const FULL_SCORE: i32 = 100;
pub const SUBMITTED_MESSAGE: &str = "Your code has been submitted for review.";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Grade {
    pub correct: bool,
    pub score: i32,
    pub message: String,
}

/// Decides whether a submission solves a task.
pub trait Grader: Send + Sync {
    fn grade(&self, task: &Task, code: &str) -> Grade;
}

/// Compares the submitted source text with the task's expected output.
///
/// Nothing is executed; surrounding whitespace is ignored on both sides and a
/// task without an expected output only accepts an empty submission.
#[derive(Clone, Copy, Debug, Default)]
pub struct LiteralGrader;

impl Grader for LiteralGrader {
    fn grade(&self, task: &Task, code: &str) -> Grade {
        let expected = task.expected_output.as_deref().unwrap_or_default().trim();
        let correct = code.trim() == expected;

        Grade {
            correct,
            score: if correct { FULL_SCORE } else { 0 },
            message: SUBMITTED_MESSAGE.to_string(),
        }
    }
}
