//! Built-in fallback quiz content.
//!
//! Guarantees the app answers something useful even without a Groq key,
//! a TOML bank, or a database.

use chrono::Utc;
use uuid::Uuid;

use crate::domain::{Quiz, QuizQuestion, QuizSource};
use crate::groq::DEFAULT_MODEL;

/// General-knowledge questions served as the last-resort quiz.
pub fn seed_questions() -> Vec<QuizQuestion> {
    vec![
        QuizQuestion {
            question: "What is 2+2?".into(),
            options: vec!["3".into(), "4".into(), "5".into(), "6".into()],
            correct_answer: 1,
            explanation: "2+2 equals 4.".into(),
        },
        QuizQuestion {
            question: "Which planet is known as the Red Planet?".into(),
            options: vec![
                "Venus".into(),
                "Jupiter".into(),
                "Mars".into(),
                "Saturn".into(),
            ],
            correct_answer: 2,
            explanation: "Iron oxide on its surface gives Mars its reddish color.".into(),
        },
        QuizQuestion {
            question: "What is the chemical symbol for water?".into(),
            options: vec!["CO2".into(), "H2O".into(), "NaCl".into(), "O2".into()],
            correct_answer: 1,
            explanation: "Water is two hydrogen atoms bonded to one oxygen atom.".into(),
        },
        QuizQuestion {
            question: "How many continents are there on Earth?".into(),
            options: vec!["5".into(), "6".into(), "7".into(), "8".into()],
            correct_answer: 2,
            explanation: "The conventional count is seven continents.".into(),
        },
        QuizQuestion {
            question: "Which language family does English belong to?".into(),
            options: vec![
                "Romance".into(),
                "Germanic".into(),
                "Slavic".into(),
                "Semitic".into(),
            ],
            correct_answer: 1,
            explanation: "English is a West Germanic language.".into(),
        },
    ]
}

/// Absolute last resort: a quiz stitched from the seed questions, keeping the
/// requested topic so clients can display it.
pub fn fallback_quiz(topic: &str) -> Quiz {
    Quiz {
        id: Uuid::new_v4().to_string(),
        topic: topic.to_string(),
        model: DEFAULT_MODEL.to_string(),
        temperature: 0.0,
        wikipedia_enhanced: false,
        source: QuizSource::Seed,
        questions: seed_questions(),
        generated_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_questions_are_well_formed() {
        for q in seed_questions() {
            assert_eq!(q.options.len(), 4);
            assert!(q.correct_answer < q.options.len());
            assert!(!q.explanation.is_empty());
        }
    }

    #[test]
    fn fallback_keeps_topic() {
        let quiz = fallback_quiz("Anything At All");
        assert_eq!(quiz.topic, "Anything At All");
        assert_eq!(quiz.source, QuizSource::Seed);
        assert!(!quiz.questions.is_empty());
    }
}
