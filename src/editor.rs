use std::sync::Arc;

use teloxide::{
    dispatching::dialogue::GetChatId,
    payloads::{EditMessageTextSetters, SendMessageSetters},
    prelude::Requester,
    types::{CallbackQuery, ChatId, InlineKeyboardMarkup, Message},
    Bot,
};
use tracing::instrument;

use crate::database::question::QuizQuestion;
use crate::database::store::{DeleteQuestion, EditQuestion, RetrieveQuestions};
use crate::keyboard;
use crate::runner::{self, ActiveRounds};
use crate::state::DialogState;
use crate::{HandlerResult, UserDialogue};

/// Entry point of the /edit flow. Without an id it offers a picker,
/// with one it jumps straight to the menu.
#[instrument(level = "info", skip(bot, storage))]
pub async fn edit_entry<S: RetrieveQuestions>(
    bot: Bot,
    msg: Message,
    storage: Arc<S>,
    arg: String,
) -> HandlerResult {
    let arg = arg.trim();
    if arg.is_empty() {
        let questions = storage.all_questions().await?;
        if questions.is_empty() {
            bot.send_message(
                msg.chat.id,
                "No quiz questions available. Use /add to create some!",
            )
            .await?;
            return Ok(());
        }
        bot.send_message(msg.chat.id, "Which question do you want to edit?")
            .reply_markup(keyboard::question_list_keyboard(&questions, "edit"))
            .await?;
        return Ok(());
    }

    let question = match arg.parse::<u32>() {
        Ok(id) => storage.question(id).await?,
        Err(_) => None,
    };
    match question {
        Some(question) => {
            bot.send_message(msg.chat.id, edit_menu_text(&question))
                .reply_markup(keyboard::edit_menu_keyboard(question.id))
                .await?;
        }
        None => {
            bot.send_message(
                msg.chat.id,
                "Invalid question ID. Use /list to see available questions.",
            )
            .await?;
        }
    }
    Ok(())
}

/// Entry point of the /remove flow.
#[instrument(level = "info", skip(bot, storage))]
pub async fn remove_entry<S: RetrieveQuestions>(
    bot: Bot,
    msg: Message,
    storage: Arc<S>,
    arg: String,
) -> HandlerResult {
    let arg = arg.trim();
    if arg.is_empty() {
        let questions = storage.all_questions().await?;
        if questions.is_empty() {
            bot.send_message(
                msg.chat.id,
                "No quiz questions available. Use /add to create some!",
            )
            .await?;
            return Ok(());
        }
        bot.send_message(msg.chat.id, "Which question do you want to delete?")
            .reply_markup(keyboard::question_list_keyboard(&questions, "remove"))
            .await?;
        return Ok(());
    }

    let question = match arg.parse::<u32>() {
        Ok(id) => storage.question(id).await?,
        Err(_) => None,
    };
    match question {
        Some(question) => {
            bot.send_message(
                msg.chat.id,
                format!("Are you sure you want to delete this question?\n\n{}", question),
            )
            .reply_markup(keyboard::confirm_remove_keyboard(question.id))
            .await?;
        }
        None => {
            bot.send_message(
                msg.chat.id,
                "Invalid question ID. Use /list to see available questions.",
            )
            .await?;
        }
    }
    Ok(())
}

/// Single dispatcher for every editing and removal button. Payloads are
/// prefix-routed and always carry the target question id, so a stale menu
/// can never act on the wrong record.
#[instrument(level = "info", skip(bot, dialogue, storage, rounds, q))]
pub async fn handle_callback<S>(
    bot: Bot,
    dialogue: UserDialogue,
    storage: Arc<S>,
    rounds: Arc<ActiveRounds>,
    q: CallbackQuery,
) -> HandlerResult
where
    S: RetrieveQuestions + EditQuestion + DeleteQuestion,
{
    bot.answer_callback_query(&q.id).await?;
    let Some(chat_id) = q.chat_id() else {
        return Ok(());
    };
    let Some(data) = q.data.clone() else {
        return Ok(());
    };

    if let Some(id) = parse_id(&data, "edit_") {
        match storage.question(id).await? {
            Some(question) => {
                edit_or_send(
                    &bot,
                    &q,
                    chat_id,
                    edit_menu_text(&question),
                    Some(keyboard::edit_menu_keyboard(id)),
                )
                .await?;
            }
            None => {
                bot.send_message(chat_id, "That question no longer exists.")
                    .await?;
            }
        }
    } else if let Some(id) = parse_id(&data, "edittext_") {
        bot.send_message(chat_id, "Send me the new question text.")
            .await?;
        dialogue
            .update(DialogState::ReceiveEditedText { question_id: id })
            .await?;
    } else if let Some(id) = parse_id(&data, "editoptions_") {
        bot.send_message(chat_id, "Send me the new answer options, one per line.")
            .await?;
        dialogue
            .update(DialogState::ReceiveEditedOptions { question_id: id })
            .await?;
    } else if let Some(id) = parse_id(&data, "editanswer_") {
        match storage.question(id).await? {
            Some(question) => {
                edit_or_send(
                    &bot,
                    &q,
                    chat_id,
                    "Pick the correct answer:".to_owned(),
                    Some(keyboard::set_answer_keyboard(&question)),
                )
                .await?;
            }
            None => {
                bot.send_message(chat_id, "That question no longer exists.")
                    .await?;
            }
        }
    } else if let Some((id, idx)) = parse_id_idx(&data, "setanswer_") {
        match storage.edit_answer(id, idx).await {
            Ok(Some(question)) => {
                edit_or_send(
                    &bot,
                    &q,
                    chat_id,
                    format!("✅ Correct answer updated!\n\n{}", question),
                    Some(keyboard::edit_menu_keyboard(id)),
                )
                .await?;
            }
            Ok(None) => {
                bot.send_message(chat_id, "That question no longer exists.")
                    .await?;
            }
            Err(err) => {
                log::error!("failed to update the correct answer of {id}: {err}");
                bot.send_message(chat_id, "❌ Failed to update the question. Please try again.")
                    .await?;
            }
        }
    } else if let Some(id) = parse_id(&data, "test_") {
        match storage.question(id).await? {
            Some(question) => {
                runner::send_question_poll(&bot, chat_id, &question, &rounds).await?;
            }
            None => {
                bot.send_message(chat_id, "That question no longer exists.")
                    .await?;
            }
        }
    } else if let Some(id) = parse_id(&data, "remove_") {
        match storage.question(id).await? {
            Some(question) => {
                edit_or_send(
                    &bot,
                    &q,
                    chat_id,
                    format!("Are you sure you want to delete this question?\n\n{}", question),
                    Some(keyboard::confirm_remove_keyboard(id)),
                )
                .await?;
            }
            None => {
                bot.send_message(chat_id, "That question no longer exists.")
                    .await?;
            }
        }
    } else if let Some(id) = parse_id(&data, "confirmremove_") {
        match storage.delete_question(id).await {
            Ok(true) => {
                edit_or_send(&bot, &q, chat_id, "🗑 Question deleted.".to_owned(), None).await?;
            }
            Ok(false) => {
                bot.send_message(chat_id, "That question no longer exists.")
                    .await?;
            }
            Err(err) => {
                log::error!("failed to delete question {id}: {err}");
                bot.send_message(chat_id, "❌ Failed to delete the question. Please try again.")
                    .await?;
            }
        }
    } else if data == "cancelremove" {
        edit_or_send(&bot, &q, chat_id, "Deletion cancelled.".to_owned(), None).await?;
    } else {
        bot.send_message(chat_id, "Invalid selection.").await?;
        dialogue.exit().await?;
    }
    Ok(())
}

pub async fn receive_edited_text<S: EditQuestion>(
    bot: Bot,
    dialogue: UserDialogue,
    storage: Arc<S>,
    msg: Message,
    question_id: u32,
) -> HandlerResult {
    let Some(text) = msg.text().map(str::trim).filter(|t| !t.is_empty()) else {
        bot.send_message(msg.chat.id, "Please send the new question text as plain text.")
            .await?;
        return Ok(());
    };

    match storage.edit_text(question_id, text.to_owned()).await {
        Ok(Some(question)) => {
            bot.send_message(
                msg.chat.id,
                format!("✅ Question text updated!\n\n{}", question),
            )
            .reply_markup(keyboard::edit_menu_keyboard(question.id))
            .await?;
        }
        Ok(None) => {
            bot.send_message(msg.chat.id, "That question no longer exists.")
                .await?;
        }
        Err(err) => {
            log::error!("failed to edit text of question {question_id}: {err}");
            bot.send_message(
                msg.chat.id,
                "❌ Failed to update the question. Please try again.",
            )
            .await?;
        }
    }
    dialogue.exit().await?;
    Ok(())
}

pub async fn receive_edited_options<S: EditQuestion>(
    bot: Bot,
    dialogue: UserDialogue,
    storage: Arc<S>,
    msg: Message,
    question_id: u32,
) -> HandlerResult {
    let options = crate::builder::parse_options(msg.text().unwrap_or_default());
    if options.len() < 2 {
        bot.send_message(
            msg.chat.id,
            "You need to provide at least 2 options. Please try again.",
        )
        .await?;
        return Ok(());
    }

    match storage.edit_options(question_id, options).await {
        Ok(Some(question)) => {
            bot.send_message(
                msg.chat.id,
                format!(
                    "✅ Options updated!\n\n{}\n\n\
                     Double-check the correct answer; it resets to the first \
                     option when the old one is gone.",
                    question
                ),
            )
            .reply_markup(keyboard::edit_menu_keyboard(question.id))
            .await?;
        }
        Ok(None) => {
            bot.send_message(msg.chat.id, "That question no longer exists.")
                .await?;
        }
        Err(err) => {
            log::error!("failed to edit options of question {question_id}: {err}");
            bot.send_message(
                msg.chat.id,
                "❌ Failed to update the question. Please try again.",
            )
            .await?;
        }
    }
    dialogue.exit().await?;
    Ok(())
}

fn edit_menu_text(question: &QuizQuestion) -> String {
    format!("✏️ Editing question {}\n\n{}", question.id, question)
}

/// Prefer editing the message the button lives on; fall back to a fresh
/// message when the original is inaccessible.
async fn edit_or_send(
    bot: &Bot,
    q: &CallbackQuery,
    chat_id: ChatId,
    text: String,
    markup: Option<InlineKeyboardMarkup>,
) -> HandlerResult {
    if let Some(message) = &q.message {
        let request = bot.edit_message_text(chat_id, message.id(), text.clone());
        let result = match markup.clone() {
            Some(markup) => request.reply_markup(markup).await,
            None => request.await,
        };
        if result.is_ok() {
            return Ok(());
        }
        log::warn!("could not edit message {} in {chat_id}", message.id());
    }
    let request = bot.send_message(chat_id, text);
    match markup {
        Some(markup) => request.reply_markup(markup).await?,
        None => request.await?,
    };
    Ok(())
}

fn parse_id(data: &str, prefix: &str) -> Option<u32> {
    data.strip_prefix(prefix)?.parse().ok()
}

fn parse_id_idx(data: &str, prefix: &str) -> Option<(u32, usize)> {
    let rest = data.strip_prefix(prefix)?;
    let (id, idx) = rest.split_once('_')?;
    Some((id.parse().ok()?, idx.parse().ok()?))
}
