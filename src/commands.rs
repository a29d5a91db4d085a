use std::collections::BTreeMap;
use std::sync::Arc;

use teloxide::{
    prelude::Requester,
    types::{Message, User},
    utils::command::BotCommands,
    Bot,
};
use tracing::instrument;

use crate::database::store::{RetrieveQuestions, RetrieveStats};
use crate::state::DialogState;
use crate::{HandlerResult, UserDialogue};

#[derive(Debug, Clone, BotCommands)]
#[command(rename_rule = "lowercase")]
pub enum Command {
    #[command(description = "start the bot.")]
    Start,
    #[command(description = "show this help message.")]
    Help,
    #[command(description = "play a random quiz.")]
    Play,
    #[command(description = "view your quiz statistics.")]
    Stats,
    #[command(description = "create a new quiz question.")]
    Add,
    #[command(description = "list all available questions.")]
    List,
    #[command(description = "clone a quiz from a Telegram link.")]
    Clone(String),
    #[command(description = "edit an existing question by id.")]
    Edit(String),
    #[command(description = "delete a question by id.")]
    Remove(String),
    #[command(description = "cancel the current operation.")]
    Cancel,
}

#[instrument(level = "info", skip(bot, dialogue))]
pub async fn start(bot: Bot, dialogue: UserDialogue, msg: Message) -> HandlerResult {
    bot.send_message(
        msg.chat.id,
        "Hello! I'm the Quiz Bot 🎯\n\n\
         I can help you play and create quiz questions.\n\n\
         Use /play to start a quiz\n\
         Use /add to create a new quiz question\n\
         Use /help to see all available commands",
    )
    .await?;
    dialogue.update(DialogState::Idle).await?;
    Ok(())
}

pub async fn help(bot: Bot, msg: Message) -> HandlerResult {
    bot.send_message(msg.chat.id, Command::descriptions().to_string())
        .await?;
    Ok(())
}

#[instrument(level = "info", skip(bot, dialogue))]
pub async fn cancel(bot: Bot, dialogue: UserDialogue, msg: Message) -> HandlerResult {
    log::info!("{} cancels the current operation", msg.chat.id);
    bot.send_message(
        msg.chat.id,
        "Operation cancelled. Use /help to see available commands.",
    )
    .await?;
    dialogue.exit().await?;
    Ok(())
}

#[instrument(level = "info", skip(bot, storage))]
pub async fn stats<S: RetrieveStats>(bot: Bot, msg: Message, storage: Arc<S>) -> HandlerResult {
    let Some(user_id) = stats_key(msg.from.as_ref()) else {
        log::warn!("stats request without a sender in {}", msg.chat.id);
        return Ok(());
    };
    match storage.user_stats(&user_id).await? {
        Some(stats) => {
            bot.send_message(
                msg.chat.id,
                format!(
                    "📊 Your Quiz Statistics 📊\n\n\
                     Total questions answered: {}\n\
                     Correct answers: {}\n\
                     Accuracy: {:.1}%",
                    stats.total,
                    stats.correct,
                    stats.accuracy()
                ),
            )
            .await?;
        }
        None => {
            bot.send_message(
                msg.chat.id,
                "You haven't answered any quiz questions yet. Use /play to start a quiz!",
            )
            .await?;
        }
    }
    Ok(())
}

#[instrument(level = "info", skip(bot, storage))]
pub async fn list<S: RetrieveQuestions>(bot: Bot, msg: Message, storage: Arc<S>) -> HandlerResult {
    let questions = storage.all_questions().await?;
    if questions.is_empty() {
        bot.send_message(
            msg.chat.id,
            "No quiz questions available. Use /add to create some!",
        )
        .await?;
        return Ok(());
    }

    let mut by_category: BTreeMap<&str, Vec<_>> = BTreeMap::new();
    for question in &questions {
        by_category.entry(&question.category).or_default().push(question);
    }

    let mut message = String::from("📋 Available Quiz Questions 📋\n\n");
    for (category, questions) in by_category {
        message.push_str(&format!("{} ({})\n", category, questions.len()));
        for question in questions.iter().take(5) {
            let title: String = question.question.chars().take(30).collect();
            message.push_str(&format!("- ID {}: {}\n", question.id, title));
        }
        if questions.len() > 5 {
            message.push_str(&format!("  ... and {} more\n", questions.len() - 5));
        }
        message.push('\n');
    }
    message.push_str("Use /play to play a random quiz, or /edit [ID] to edit a specific question.");

    bot.send_message(msg.chat.id, message).await?;
    Ok(())
}

/// Stats rows are written under the voter's user id, so lookups must use the
/// sender's id rather than the chat id; the two differ in group chats.
fn stats_key(user: Option<&User>) -> Option<String> {
    user.map(|user| user.id.to_string())
}

#[cfg(test)]
mod tests {
    use super::stats_key;
    use teloxide::types::{User, UserId};

    fn user(id: u64) -> User {
        User {
            id: UserId(id),
            is_bot: false,
            first_name: "Ada".to_owned(),
            last_name: None,
            username: None,
            language_code: None,
            is_premium: false,
            added_to_attachment_menu: false,
        }
    }

    #[test]
    fn stats_are_keyed_by_the_sender_not_the_chat() {
        // The answer recorder writes rows under the user id; a group chat id
        // would never match it.
        assert_eq!(stats_key(Some(&user(100))), Some("100".to_owned()));
        assert_eq!(stats_key(None), None);
    }
}
