use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub type AnswerKey = BTreeMap<String, String>;

// 15 of 20 on the reference quiz, carried as a 3/4 ratio for other sizes
pub const MASTERY_THRESHOLD_NUMERATOR: u32 = 3;
pub const MASTERY_THRESHOLD_DENOMINATOR: u32 = 4;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuizAnswer {
    pub question: String,
    pub selected: String,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuizReport {
    pub score: u32,
    pub total: u32,
    pub correct: Vec<String>,
    pub incorrect: Vec<String>,
    pub mastered: bool,
}

pub fn mastery_reached(score: u32, total: u32) -> bool {
    total > 0
        && u64::from(score) * u64::from(MASTERY_THRESHOLD_DENOMINATOR)
            >= u64::from(total) * u64::from(MASTERY_THRESHOLD_NUMERATOR)
}

/// Unknown question ids count as incorrect; the mastery denominator is the key size.
pub fn score_quiz(answers: &[QuizAnswer], key: &AnswerKey) -> QuizReport {
    let mut correct = Vec::new();
    let mut incorrect = Vec::new();
    for answer in answers {
        match key.get(&answer.question) {
            Some(expected) if expected == &answer.selected => correct.push(answer.question.clone()),
            _ => incorrect.push(answer.question.clone()),
        }
    }

    let score = correct.len() as u32;
    let total = key.len() as u32;
    QuizReport {
        score,
        total,
        correct,
        incorrect,
        mastered: mastery_reached(score, total),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key_of(questions: u32) -> AnswerKey {
        (1..=questions)
            .map(|n| (format!("q{n}"), "a".to_string()))
            .collect()
    }

    fn answers_with_correct(questions: u32, correct: u32) -> Vec<QuizAnswer> {
        (1..=questions)
            .map(|n| QuizAnswer {
                question: format!("q{n}"),
                selected: if n <= correct { "a" } else { "b" }.to_string(),
            })
            .collect()
    }

    #[test]
    fn fifteen_of_twenty_reaches_mastery() {
        let report = score_quiz(&answers_with_correct(20, 15), &key_of(20));
        assert_eq!(report.score, 15);
        assert_eq!(report.total, 20);
        assert!(report.mastered);
    }

    #[test]
    fn fourteen_of_twenty_misses_mastery() {
        let report = score_quiz(&answers_with_correct(20, 14), &key_of(20));
        assert_eq!(report.score, 14);
        assert!(!report.mastered);
        assert_eq!(report.incorrect.len(), 6);
    }

    #[test]
    fn unknown_question_counts_as_incorrect() {
        let mut answers = answers_with_correct(4, 4);
        answers.push(QuizAnswer {
            question: "q99".to_string(),
            selected: "a".to_string(),
        });

        let report = score_quiz(&answers, &key_of(4));
        assert_eq!(report.score, 4);
        assert_eq!(report.incorrect, vec!["q99".to_string()]);
    }

    #[test]
    fn skipped_questions_lower_the_mastery_ratio() {
        // 3 right out of a 6-question key is below the 3/4 bar even though
        // every submitted answer was correct.
        let report = score_quiz(&answers_with_correct(3, 3), &key_of(6));
        assert_eq!(report.score, 3);
        assert_eq!(report.total, 6);
        assert!(!report.mastered);
    }

    #[test]
    fn empty_answer_key_never_reports_mastery() {
        let report = score_quiz(&[], &AnswerKey::new());
        assert_eq!(report.total, 0);
        assert!(!report.mastered);
        assert!(!mastery_reached(0, 0));
    }

    #[test]
    fn correct_list_preserves_answer_order() {
        let report = score_quiz(&answers_with_correct(3, 3), &key_of(3));
        assert_eq!(
            report.correct,
            vec!["q1".to_string(), "q2".to_string(), "q3".to_string()]
        );
        assert!(report.mastered);
    }
}
