use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

use crate::database::question::QuizQuestion;

fn short_title(question: &QuizQuestion) -> String {
    let mut title: String = question.question.chars().take(30).collect();
    if title.len() < question.question.len() {
        title.push('…');
    }
    format!("ID {}: {}", question.id, title)
}

/// One row per option, used while collecting the correct answer for a draft.
pub(crate) fn answer_select_keyboard(options: &[String]) -> InlineKeyboardMarkup {
    let keyboard: Vec<Vec<InlineKeyboardButton>> = options
        .iter()
        .enumerate()
        .map(|(i, option)| {
            vec![InlineKeyboardButton::callback(
                format!("{}. {}", i + 1, option),
                format!("answer_{i}"),
            )]
        })
        .collect();

    InlineKeyboardMarkup::new(keyboard)
}

/// Like [`answer_select_keyboard`], but bound to a stored question and with
/// the current correct option marked.
pub(crate) fn set_answer_keyboard(question: &QuizQuestion) -> InlineKeyboardMarkup {
    let keyboard: Vec<Vec<InlineKeyboardButton>> = question
        .options
        .iter()
        .enumerate()
        .map(|(i, option)| {
            let mark = if i == question.answer { " ✓" } else { "" };
            vec![InlineKeyboardButton::callback(
                format!("{}. {}{}", i + 1, option, mark),
                format!("setanswer_{}_{}", question.id, i),
            )]
        })
        .collect();

    InlineKeyboardMarkup::new(keyboard)
}

pub(crate) fn edit_menu_keyboard(id: u32) -> InlineKeyboardMarkup {
    let keyboard = vec![
        vec![InlineKeyboardButton::callback(
            "Edit Question Text",
            format!("edittext_{id}"),
        )],
        vec![InlineKeyboardButton::callback(
            "Edit Options",
            format!("editoptions_{id}"),
        )],
        vec![InlineKeyboardButton::callback(
            "Change Correct Answer",
            format!("editanswer_{id}"),
        )],
        vec![InlineKeyboardButton::callback(
            "Test this Quiz",
            format!("test_{id}"),
        )],
    ];

    InlineKeyboardMarkup::new(keyboard)
}

/// Selection list for /edit and /remove without an id argument. At most 10
/// questions are offered.
pub(crate) fn question_list_keyboard(
    questions: &[QuizQuestion],
    prefix: &str,
) -> InlineKeyboardMarkup {
    let keyboard: Vec<Vec<InlineKeyboardButton>> = questions
        .iter()
        .take(10)
        .map(|question| {
            vec![InlineKeyboardButton::callback(
                short_title(question),
                format!("{}_{}", prefix, question.id),
            )]
        })
        .collect();

    InlineKeyboardMarkup::new(keyboard)
}

pub(crate) fn confirm_remove_keyboard(id: u32) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![
        InlineKeyboardButton::callback("✅ Yes, delete it", format!("confirmremove_{id}")),
        InlineKeyboardButton::callback("❌ No, keep it", "cancelremove"),
    ]])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::question::DEFAULT_CATEGORY;

    fn question(id: u32, text: &str) -> QuizQuestion {
        QuizQuestion {
            id,
            question: text.to_owned(),
            options: vec!["a".to_owned(), "b".to_owned()],
            answer: 1,
            category: DEFAULT_CATEGORY.to_owned(),
        }
    }

    #[test]
    fn list_keyboard_is_capped_at_ten_rows() {
        let questions: Vec<_> = (1..=15).map(|id| question(id, "q")).collect();
        let markup = question_list_keyboard(&questions, "edit");
        assert_eq!(markup.inline_keyboard.len(), 10);
    }

    #[test]
    fn list_keyboard_truncates_long_titles_on_char_boundaries() {
        let long = "Яке місто є столицею України, і чому саме воно?";
        let markup = question_list_keyboard(&[question(3, long)], "remove");
        let button = &markup.inline_keyboard[0][0];
        assert!(button.text.starts_with("ID 3: "));
        assert!(button.text.ends_with('…'));
    }

    #[test]
    fn answer_keyboard_encodes_the_option_index() {
        let options = vec!["x".to_owned(), "y".to_owned(), "z".to_owned()];
        let markup = answer_select_keyboard(&options);
        assert_eq!(markup.inline_keyboard.len(), 3);
        assert_eq!(markup.inline_keyboard[2][0].text, "3. z");
    }
}
