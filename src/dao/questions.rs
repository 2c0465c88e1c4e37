//! Question source seam and the JSON-backed question bank.

use std::{fs, io::ErrorKind, path::Path};

use indexmap::IndexMap;
use rand::seq::IndexedRandom;
use serde::Deserialize;
use tracing::{info, warn};

use crate::state::duel::Question;

/// Category name that draws from every category.
pub const RANDOM_CATEGORY: &str = "random";

/// Provider of multiple choice questions.
pub trait QuestionSource: Send + Sync {
    /// A random question of the category, `None` when the category is empty.
    fn random_question(&self, category: &str) -> Option<Question>;
    /// Known category names.
    fn categories(&self) -> Vec<String>;
}

/// In-memory question bank grouped by category.
#[derive(Debug, Clone)]
pub struct QuestionBank {
    categories: IndexMap<String, Vec<Question>>,
}

#[derive(Debug, Deserialize)]
/// One question as stored on disk; `answer` repeats the text of the correct option.
struct RawQuestion {
    question: String,
    options: Vec<String>,
    answer: String,
}

impl QuestionBank {
    /// Bank over already validated questions.
    pub fn new(categories: IndexMap<String, Vec<Question>>) -> Self {
        Self { categories }
    }

    /// Load the bank from a JSON file mapping categories to question lists.
    ///
    /// Falls back to the built-in bank when the file is missing, unreadable or
    /// holds no usable question.
    pub fn load(path: &Path) -> Self {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "question file not found; using built-in questions"
                );
                return Self::default();
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read questions; using built-in questions"
                );
                return Self::default();
            }
        };

        match Self::from_json(&contents) {
            Ok(bank) if !bank.is_empty() => {
                info!(
                    path = %path.display(),
                    categories = bank.categories.len(),
                    questions = bank.len(),
                    "loaded question bank"
                );
                bank
            }
            Ok(_) => {
                warn!(path = %path.display(), "question file is empty; using built-in questions");
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to parse questions; using built-in questions"
                );
                Self::default()
            }
        }
    }

    /// Parse the on-disk JSON format. Questions whose answer is not one of
    /// their options are skipped.
    pub fn from_json(contents: &str) -> serde_json::Result<Self> {
        let raw: IndexMap<String, Vec<RawQuestion>> = serde_json::from_str(contents)?;
        let categories = raw
            .into_iter()
            .map(|(category, questions)| {
                let parsed = questions
                    .into_iter()
                    .filter_map(|raw| {
                        let correct_option = raw.options.iter().position(|o| *o == raw.answer);
                        if correct_option.is_none() {
                            warn!(
                                category = %category,
                                question = %raw.question,
                                "answer is not among the options; skipping question"
                            );
                        }
                        Some(Question {
                            text: raw.question,
                            options: raw.options,
                            correct_option: correct_option?,
                        })
                    })
                    .collect::<Vec<_>>();
                (category, parsed)
            })
            .filter(|(_, questions)| !questions.is_empty())
            .collect();

        Ok(Self { categories })
    }

    /// Total number of questions.
    pub fn len(&self) -> usize {
        self.categories.values().map(Vec::len).sum()
    }

    /// True when no category holds a question.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl QuestionSource for QuestionBank {
    fn random_question(&self, category: &str) -> Option<Question> {
        let mut rng = rand::rng();
        if category.eq_ignore_ascii_case(RANDOM_CATEGORY) {
            let all: Vec<&Question> = self.categories.values().flatten().collect();
            return all.choose(&mut rng).map(|question| (*question).clone());
        }

        self.categories
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(category))
            .and_then(|(_, questions)| questions.choose(&mut rng).cloned())
    }

    fn categories(&self) -> Vec<String> {
        self.categories.keys().cloned().collect()
    }
}

impl Default for QuestionBank {
    fn default() -> Self {
        let question = |text: &str, options: [&str; 4], correct_option: usize| Question {
            text: text.to_string(),
            options: options.iter().map(|option| option.to_string()).collect(),
            correct_option,
        };

        let mut categories = IndexMap::new();
        categories.insert(
            "geography".to_string(),
            vec![
                question(
                    "What is the capital of Australia?",
                    ["Sydney", "Melbourne", "Canberra", "Perth"],
                    2,
                ),
                question(
                    "Which river is the longest in Europe?",
                    ["Danube", "Volga", "Rhine", "Dnieper"],
                    1,
                ),
                question(
                    "How many continents are there?",
                    ["5", "6", "7", "8"],
                    2,
                ),
            ],
        );
        categories.insert(
            "science".to_string(),
            vec![
                question(
                    "What is the chemical symbol of gold?",
                    ["Ag", "Au", "Gd", "Go"],
                    1,
                ),
                question(
                    "Which planet is closest to the Sun?",
                    ["Venus", "Earth", "Mercury", "Mars"],
                    2,
                ),
                question(
                    "What is the boiling point of water at sea level in Celsius?",
                    ["90", "100", "110", "120"],
                    1,
                ),
            ],
        );
        categories.insert(
            "history".to_string(),
            vec![
                question(
                    "In which year did the Berlin Wall fall?",
                    ["1987", "1989", "1991", "1993"],
                    1,
                ),
                question(
                    "Who was the first person in space?",
                    ["Neil Armstrong", "Yuri Gagarin", "Alan Shepard", "John Glenn"],
                    1,
                ),
            ],
        );

        Self { categories }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "movies": [
            {"question": "Who directed Jaws?", "options": ["Lucas", "Spielberg"], "answer": "Spielberg"},
            {"question": "Broken", "options": ["a", "b"], "answer": "c"}
        ],
        "empty": []
    }"#;

    #[test]
    fn answers_are_mapped_to_option_indexes() {
        let bank = QuestionBank::from_json(SAMPLE).unwrap();
        assert_eq!(bank.len(), 1);
        assert_eq!(bank.categories(), vec!["movies".to_string()]);

        let question = bank.random_question("Movies").unwrap();
        assert_eq!(question.correct_option, 1);
        assert_eq!(question.correct_answer(), "Spielberg");
    }

    #[test]
    fn random_category_draws_from_every_category() {
        let bank = QuestionBank::default();
        for _ in 0..20 {
            let question = bank.random_question(RANDOM_CATEGORY).unwrap();
            assert!(question.correct_option < question.options.len());
        }
    }

    #[test]
    fn unknown_category_yields_nothing() {
        let bank = QuestionBank::default();
        assert!(bank.random_question("cooking").is_none());
    }

    #[test]
    fn missing_file_falls_back_to_builtin_questions() {
        let bank = QuestionBank::load(Path::new("does/not/exist.json"));
        assert!(!bank.is_empty());
    }
}
