use std::collections::HashMap;
use std::sync::Arc;

use rand::seq::SliceRandom;
use teloxide::{
    payloads::SendPollSetters,
    prelude::Requester,
    types::{ChatId, InputPollOption, Message, PollAnswer, PollType},
    Bot,
};
use tokio::sync::RwLock;
use tracing::instrument;

use crate::database::question::QuizQuestion;
use crate::database::store::{RecordAnswer, RetrieveQuestions};
use crate::HandlerResult;

/// An outstanding quiz poll, remembered until its first answer arrives.
#[derive(Debug, Clone)]
struct Round {
    question_id: u32,
    correct: usize,
}

/// In-flight rounds keyed by Telegram poll id, so answers from different
/// chats can never be graded against each other's question.
#[derive(Debug, Default)]
pub struct ActiveRounds {
    rounds: RwLock<HashMap<String, Round>>,
}

impl ActiveRounds {
    async fn register(&self, poll_id: String, question_id: u32, correct: usize) {
        self.rounds
            .write()
            .await
            .insert(poll_id, Round { question_id, correct });
    }

    /// Removes and returns the round, making a second answer a no-op.
    async fn take(&self, poll_id: &str) -> Option<(u32, usize)> {
        self.rounds
            .write()
            .await
            .remove(poll_id)
            .map(|round| (round.question_id, round.correct))
    }
}

#[instrument(level = "info", skip(bot, storage, rounds))]
pub async fn play<S: RetrieveQuestions>(
    bot: Bot,
    msg: Message,
    storage: Arc<S>,
    rounds: Arc<ActiveRounds>,
) -> HandlerResult {
    let questions = storage.all_questions().await?;
    let Some(question) = questions.choose(&mut rand::thread_rng()) else {
        bot.send_message(
            msg.chat.id,
            "No quiz questions available. Use /add to create some!",
        )
        .await?;
        return Ok(());
    };
    send_question_poll(&bot, msg.chat.id, question, &rounds).await?;
    Ok(())
}

pub(crate) async fn send_question_poll(
    bot: &Bot,
    chat_id: ChatId,
    question: &QuizQuestion,
    rounds: &ActiveRounds,
) -> HandlerResult {
    let options = question
        .options
        .iter()
        .map(|text| InputPollOption::new(text.clone()))
        .collect::<Vec<_>>();
    let correct = u8::try_from(question.answer)?;
    let poll = bot
        .send_poll(chat_id, question.question.clone(), options)
        .type_(PollType::Quiz)
        .is_anonymous(false)
        .correct_option_id(correct)
        .explanation(format!("This question is from category: {}", question.category))
        .await?;

    if let Some(poll) = poll.poll() {
        rounds
            .register(poll.id.clone(), question.id, question.answer)
            .await;
    } else {
        log::error!("sent poll message carries no poll payload");
    }
    Ok(())
}

/// Resolves a vote against the in-flight round. A retracted vote (no chosen
/// options) puts the round back so the voter's real answer still counts;
/// unknown polls and second answers yield nothing.
async fn grade(rounds: &ActiveRounds, poll_id: &str, option_ids: &[u8]) -> Option<(u32, bool)> {
    let (question_id, correct) = rounds.take(poll_id).await?;
    let Some(&selected) = option_ids.first() else {
        rounds.register(poll_id.to_owned(), question_id, correct).await;
        return None;
    };
    Some((question_id, selected as usize == correct))
}

/// Grades the first answer of a round and updates the voter's stats.
#[instrument(level = "info", skip(bot, storage, rounds, answer))]
pub async fn handle_poll_answer<S: RecordAnswer>(
    bot: Bot,
    storage: Arc<S>,
    rounds: Arc<ActiveRounds>,
    answer: PollAnswer,
) -> HandlerResult {
    let teloxide::types::MaybeAnonymousUser::User(user) = &answer.voter else {
        return Ok(());
    };
    let Some((question_id, is_correct)) =
        grade(&rounds, &answer.poll_id, &answer.option_ids).await
    else {
        log::info!("no round to grade for poll {}", answer.poll_id);
        return Ok(());
    };

    let stats = storage
        .record_answer(&user.id.to_string(), &user.full_name(), is_correct)
        .await?;
    log::info!(
        "{} answered question {question_id}: correct={is_correct}, total={}",
        user.id,
        stats.total
    );

    let verdict = if is_correct { "✅ Correct!" } else { "❌ Wrong!" };
    bot.send_message(
        ChatId(user.id.0 as i64),
        format!("{verdict} Use /play to try another quiz."),
    )
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{grade, ActiveRounds};

    #[tokio::test]
    async fn round_is_consumed_by_first_take() {
        let rounds = ActiveRounds::default();
        rounds.register("poll-1".to_owned(), 7, 2).await;
        assert_eq!(rounds.take("poll-1").await, Some((7, 2)));
        assert_eq!(rounds.take("poll-1").await, None);
    }

    #[tokio::test]
    async fn rounds_in_different_chats_stay_independent() {
        let rounds = ActiveRounds::default();
        rounds.register("poll-a".to_owned(), 1, 0).await;
        rounds.register("poll-b".to_owned(), 2, 3).await;
        assert_eq!(rounds.take("poll-b").await, Some((2, 3)));
        assert_eq!(rounds.take("poll-a").await, Some((1, 0)));
    }

    #[tokio::test]
    async fn unknown_poll_yields_no_round() {
        let rounds = ActiveRounds::default();
        assert_eq!(rounds.take("missing").await, None);
    }

    #[tokio::test]
    async fn retracted_votes_leave_the_round_answerable() {
        let rounds = ActiveRounds::default();
        rounds.register("poll-1".to_owned(), 7, 2).await;

        // An empty selection is a retracted vote: nothing is graded and the
        // round stays in place for the real answer.
        assert_eq!(grade(&rounds, "poll-1", &[]).await, None);
        assert_eq!(grade(&rounds, "poll-1", &[2]).await, Some((7, true)));
        assert_eq!(grade(&rounds, "poll-1", &[2]).await, None);
    }

    #[tokio::test]
    async fn grading_compares_against_the_stored_index() {
        let rounds = ActiveRounds::default();
        rounds.register("poll-1".to_owned(), 7, 2).await;
        assert_eq!(grade(&rounds, "poll-1", &[0]).await, Some((7, false)));
    }
}
