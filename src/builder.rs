use std::sync::Arc;

use teloxide::{
    dispatching::dialogue::GetChatId,
    payloads::SendMessageSetters,
    prelude::Requester,
    types::{CallbackQuery, ChatId, Message},
    Bot,
};
use tracing::instrument;

use crate::database::question::{CONVERTED_POLL_CATEGORY, USER_CREATED_CATEGORY};
use crate::database::store::CreateQuestion;
use crate::importer;
use crate::keyboard;
use crate::state::{DialogState, Draft};
use crate::{HandlerResult, UserDialogue};

/// Entry point of the /add flow.
#[instrument(level = "info", skip(bot, dialogue))]
pub async fn add_entry(bot: Bot, dialogue: UserDialogue, msg: Message) -> HandlerResult {
    bot.send_message(
        msg.chat.id,
        "Let's create a new quiz question!\n\nFirst, send me the question text.",
    )
    .await?;
    dialogue
        .update(DialogState::ReceiveQuestion { source_url: None })
        .await?;
    Ok(())
}

/// Entry point of the /clone flow. The link may come inline
/// ("/clone https://t.me/...") or in a follow-up message.
#[instrument(level = "info", skip(bot, dialogue))]
pub async fn clone_entry(
    bot: Bot,
    dialogue: UserDialogue,
    msg: Message,
    link: String,
) -> HandlerResult {
    let link = link.trim().to_owned();
    if link.is_empty() {
        bot.send_message(
            msg.chat.id,
            "Send me a link to a Telegram message containing a quiz or poll, \
             and I'll try to clone it.",
        )
        .await?;
        dialogue.update(DialogState::ReceiveCloneUrl).await?;
    } else {
        process_url(&bot, &dialogue, msg.chat.id, &link).await?;
    }
    Ok(())
}

pub async fn receive_clone_url(bot: Bot, dialogue: UserDialogue, msg: Message) -> HandlerResult {
    let Some(link) = msg.text().map(str::trim).filter(|t| !t.is_empty()) else {
        bot.send_message(msg.chat.id, "Please send me a link as plain text.")
            .await?;
        return Ok(());
    };
    process_url(&bot, &dialogue, msg.chat.id, link).await?;
    Ok(())
}

/// Shared by both /clone entry paths. On a successful extraction the draft
/// goes straight to answer selection; otherwise the user is dropped into the
/// manual flow with the link remembered for the final summary.
async fn process_url(
    bot: &Bot,
    dialogue: &UserDialogue,
    chat_id: ChatId,
    link: &str,
) -> HandlerResult {
    bot.send_message(chat_id, "Analyzing the quiz link... Please wait.")
        .await?;

    match importer::extract(link).await {
        Some(quiz) => {
            let draft = Draft {
                question: quiz.question,
                options: quiz.options,
                category: USER_CREATED_CATEGORY.to_owned(),
                source_url: Some(link.to_owned()),
            };
            bot.send_message(
                chat_id,
                format!(
                    "I extracted this quiz:\n\n{}\n\nNow pick the correct answer:",
                    preview(&draft)
                ),
            )
            .reply_markup(keyboard::answer_select_keyboard(&draft.options))
            .await?;
            dialogue.update(DialogState::ReceiveAnswer { draft }).await?;
        }
        None => {
            bot.send_message(
                chat_id,
                "I couldn't automatically extract a quiz from that link.\n\n\
                 Let's create it manually instead. Send me the question text.",
            )
            .await?;
            dialogue
                .update(DialogState::ReceiveQuestion {
                    source_url: Some(link.to_owned()),
                })
                .await?;
        }
    }
    Ok(())
}

pub async fn receive_question(
    bot: Bot,
    dialogue: UserDialogue,
    msg: Message,
    source_url: Option<String>,
) -> HandlerResult {
    let Some(question) = msg.text().map(str::trim).filter(|t| !t.is_empty()) else {
        bot.send_message(msg.chat.id, "Please send the question as plain text.")
            .await?;
        return Ok(());
    };
    bot.send_message(
        msg.chat.id,
        "Got it! Now send me the answer options, one per line.",
    )
    .await?;
    dialogue
        .update(DialogState::ReceiveOptions {
            question: question.to_owned(),
            source_url,
        })
        .await?;
    Ok(())
}

pub async fn receive_options(
    bot: Bot,
    dialogue: UserDialogue,
    msg: Message,
    (question, source_url): (String, Option<String>),
) -> HandlerResult {
    let options = parse_options(msg.text().unwrap_or_default());
    if options.len() < 2 {
        bot.send_message(
            msg.chat.id,
            "You need to provide at least 2 options. Please try again.",
        )
        .await?;
        return Ok(());
    }

    let draft = Draft {
        question,
        options,
        category: USER_CREATED_CATEGORY.to_owned(),
        source_url,
    };
    bot.send_message(msg.chat.id, "Which option is the correct answer?")
        .reply_markup(keyboard::answer_select_keyboard(&draft.options))
        .await?;
    dialogue.update(DialogState::ReceiveAnswer { draft }).await?;
    Ok(())
}

/// Final step of every creation flow: the user picks the correct option
/// from the inline keyboard and the draft is persisted.
#[instrument(level = "info", skip(bot, dialogue, storage, q))]
pub async fn receive_answer<S: CreateQuestion>(
    bot: Bot,
    dialogue: UserDialogue,
    storage: Arc<S>,
    q: CallbackQuery,
    draft: Draft,
) -> HandlerResult {
    bot.answer_callback_query(&q.id).await?;
    let Some(chat_id) = q.chat_id() else {
        return Ok(());
    };

    let answer = q
        .data
        .as_deref()
        .and_then(|data| data.strip_prefix("answer_"))
        .and_then(|idx| idx.parse::<usize>().ok());
    let Some(answer) = answer.filter(|&idx| idx < draft.options.len()) else {
        bot.send_message(chat_id, "Invalid selection.").await?;
        dialogue.exit().await?;
        return Ok(());
    };

    match storage
        .create_question(draft.question, draft.options, answer, &draft.category)
        .await
    {
        Ok(record) => {
            if let Some(url) = &draft.source_url {
                log::info!("question {} cloned from {url}", record.id);
            }
            let converted = record.category == CONVERTED_POLL_CATEGORY;
            bot.send_message(
                chat_id,
                format!("✅ Question saved!\n\n{}", record),
            )
            .await?;
            if converted {
                bot.send_message(chat_id, "You can fine-tune the converted quiz here:")
                    .reply_markup(keyboard::edit_menu_keyboard(record.id))
                    .await?;
            }
        }
        Err(err) => {
            log::error!("failed to save a new question: {err}");
            bot.send_message(chat_id, "❌ Failed to save the question. Please try again.")
                .await?;
        }
    }
    dialogue.exit().await?;
    Ok(())
}

/// Catch-all for messages outside any flow: forwarded polls become drafts,
/// anything else gets a short hint.
pub async fn fallback(bot: Bot, dialogue: UserDialogue, msg: Message) -> HandlerResult {
    if let Some(poll) = msg.poll() {
        let options = poll.options.iter().map(|o| o.text.clone()).collect();
        if let Some(draft) =
            conversion_draft(msg.forward_origin().is_some(), &poll.question, options)
        {
            bot.send_message(
                msg.chat.id,
                "📝 I received a poll! Let's convert it into a quiz question.\n\n\
                 Which option is the correct answer?",
            )
            .reply_markup(keyboard::answer_select_keyboard(&draft.options))
            .await?;
            dialogue.update(DialogState::ReceiveAnswer { draft }).await?;
            return Ok(());
        }
    }
    bot.send_message(
        msg.chat.id,
        "I didn't understand that. Use /help to see available commands, \
         or forward me a poll to convert it into a quiz.",
    )
    .await?;
    Ok(())
}

fn preview(draft: &Draft) -> String {
    let mut out = format!("{}\n", draft.question);
    for (i, option) in draft.options.iter().enumerate() {
        out.push_str(&format!("{}. {}\n", i + 1, option));
    }
    out
}

/// Builds a conversion draft from a forwarded poll. A poll created natively
/// in the chat is not converted, and a convertible poll needs at least 2
/// options.
pub(crate) fn conversion_draft(
    forwarded: bool,
    question: &str,
    options: Vec<String>,
) -> Option<Draft> {
    if !forwarded || options.len() < 2 {
        return None;
    }
    Some(Draft {
        question: question.to_owned(),
        options,
        category: CONVERTED_POLL_CATEGORY.to_owned(),
        source_url: None,
    })
}

/// One option per line; blank lines and surrounding whitespace are dropped.
pub(crate) fn parse_options(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_owned)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{conversion_draft, parse_options};
    use crate::database::question::CONVERTED_POLL_CATEGORY;

    #[test]
    fn options_skip_blank_lines() {
        let options = parse_options("Paris\nLondon\n\nBerlin");
        assert_eq!(options, vec!["Paris", "London", "Berlin"]);
    }

    #[test]
    fn options_are_trimmed() {
        let options = parse_options("  Paris \n\tLondon\n");
        assert_eq!(options, vec!["Paris", "London"]);
    }

    #[test]
    fn single_option_is_too_few() {
        assert!(parse_options("Paris").len() < 2);
    }

    #[test]
    fn empty_input_yields_no_options() {
        assert!(parse_options("").is_empty());
    }

    #[test]
    fn only_forwarded_polls_become_conversion_drafts() {
        let options = vec!["a".to_owned(), "b".to_owned()];
        // A poll the user creates in the chat themselves is left alone.
        assert!(conversion_draft(false, "q", options.clone()).is_none());

        let draft = conversion_draft(true, "q", options).unwrap();
        assert_eq!(draft.question, "q");
        assert_eq!(draft.category, CONVERTED_POLL_CATEGORY);
    }

    #[test]
    fn a_forwarded_poll_needs_two_options() {
        assert!(conversion_draft(true, "q", vec!["only".to_owned()]).is_none());
    }
}
