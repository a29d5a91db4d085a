use std::fmt;

use serde::{Deserialize, Serialize};

pub const DEFAULT_CATEGORY: &str = "General";
pub const USER_CREATED_CATEGORY: &str = "User Created";
pub const CONVERTED_POLL_CATEGORY: &str = "Converted Poll";

fn default_category() -> String {
    DEFAULT_CATEGORY.to_owned()
}

/// A stored multiple-choice quiz item. `answer` is a zero-based index into
/// `options`; the store keeps `0 <= answer < options.len()` true across every
/// mutation path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub id: u32,
    pub question: String,
    pub options: Vec<String>,
    pub answer: usize,
    #[serde(default = "default_category")]
    pub category: String,
}

impl QuizQuestion {
    pub fn answer_text(&self) -> &str {
        self.options
            .get(self.answer)
            .map(String::as_str)
            .unwrap_or_default()
    }
}

impl fmt::Display for QuizQuestion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Question: {}", self.question)?;
        writeln!(f)?;
        writeln!(f, "Options:")?;
        for (i, option) in self.options.iter().enumerate() {
            let mark = if i == self.answer { " ✓" } else { "" };
            writeln!(f, "{}. {}{}", i + 1, option, mark)?;
        }
        write!(f, "\nCategory: {}", self.category)
    }
}

/// Per-user answer counters, keyed in the stats file by the stringified
/// Telegram user id. Rows are created on the first answered round and never
/// deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserStats {
    pub name: String,
    pub correct: u32,
    pub total: u32,
}

impl UserStats {
    pub fn accuracy(&self) -> f32 {
        if self.total == 0 {
            0.0
        } else {
            self.correct as f32 / self.total as f32 * 100.0
        }
    }
}
