use serde::Serialize;

use crate::types::{ConsolidatedAnswer, OptionLabel};

/// The graded outcome for one sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradingResult {
    pub answers: Vec<ConsolidatedAnswer>,
    pub correct_count: u32,
}

impl GradingResult {
    pub fn new(answers: Vec<ConsolidatedAnswer>, expected: &[OptionLabel]) -> Self {
        let correct_count = score(&answers, expected);
        Self {
            answers,
            correct_count,
        }
    }
}

/// Counts the questions whose answer equals the expected option.
///
/// When the two sequences differ in length the sheet cannot be scored and the
/// count is zero. A blank answer never matches.
pub fn score(answers: &[ConsolidatedAnswer], expected: &[OptionLabel]) -> u32 {
    if answers.len() != expected.len() {
        return 0;
    }
    answers
        .iter()
        .zip(expected)
        .filter(|(answer, expected)| match answer {
            ConsolidatedAnswer::Option(label) => label == *expected,
            ConsolidatedAnswer::Blank => false,
        })
        .count() as u32
}
