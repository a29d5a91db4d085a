use std::time::Duration;

use regex::Regex;
use url::Url;

/// A quiz scraped from a t.me link. The source never says which option is
/// correct, so callers always ask the user afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedQuiz {
    pub question: String,
    pub options: Vec<String>,
}

const FETCH_TIMEOUT: Duration = Duration::from_secs(10);
const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/91.0.4472.124 Safari/537.36";

/// Best-effort extraction of a question and its options from a Telegram
/// message link. Every failure mode (bad link, network error, timeout,
/// unrecognized page) collapses to `None`; callers fall back to manual entry.
pub async fn extract(link: &str) -> Option<ExtractedQuiz> {
    let parsed = Url::parse(link).ok()?;
    let is_telegram = parsed
        .host_str()
        .is_some_and(|host| host == "t.me" || host.ends_with(".t.me"));
    if !is_telegram {
        log::info!("not a t.me link, skipping extraction: {link}");
        return None;
    }

    let client = reqwest::Client::builder()
        .timeout(FETCH_TIMEOUT)
        .user_agent(USER_AGENT)
        .build()
        .ok()?;

    if let Some(page) = fetch(&client, link).await {
        if let Some(quiz) = parse_poll_widget(&page) {
            log::info!("extracted a poll widget from {link}");
            return Some(quiz);
        }
    }

    // The embedded view renders plain message text for channel posts that the
    // widget page hides behind scripts.
    let embed_link = format!("{link}?embed=1");
    let page = fetch(&client, &embed_link).await?;
    let quiz = parse_embedded_message(&page);
    if quiz.is_some() {
        log::info!("extracted message text from {embed_link}");
    } else {
        log::warn!("could not extract a quiz from {link}");
    }
    quiz
}

async fn fetch(client: &reqwest::Client, link: &str) -> Option<String> {
    match client.get(link).send().await {
        Ok(response) => response.text().await.ok(),
        Err(e) => {
            log::warn!("fetching {link} failed: {e}");
            None
        }
    }
}

fn parse_poll_widget(html: &str) -> Option<ExtractedQuiz> {
    let question_re =
        Regex::new(r#"<div class="tgme_widget_message_poll_question">([^<]+)</div>"#).ok()?;
    let option_re =
        Regex::new(r#"<div class="tgme_widget_message_poll_option_text">([^<]+)</div>"#).ok()?;

    let question = question_re.captures(html)?.get(1)?.as_str().trim().to_owned();
    let options: Vec<String> = option_re
        .captures_iter(html)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().trim().to_owned())
        .collect();

    (options.len() >= 2).then_some(ExtractedQuiz { question, options })
}

fn parse_embedded_message(html: &str) -> Option<ExtractedQuiz> {
    let text_re =
        Regex::new(r#"(?s)<div class="tgme_widget_message_text[^"]*"[^>]*>(.*?)</div>"#).ok()?;
    let br_re = Regex::new(r"(?i)<br\s*/?>").ok()?;
    let tag_re = Regex::new(r"<[^>]+>").ok()?;

    let body = text_re.captures(html)?.get(1)?.as_str();
    let without_br = br_re.replace_all(body, "\n");
    let text = tag_re.replace_all(&without_br, "");
    parse_message_text(&text)
}

/// Treats the first non-blank line as the question and the remaining lines as
/// options, stripping `A)` / `1.` style prefixes.
pub(crate) fn parse_message_text(text: &str) -> Option<ExtractedQuiz> {
    let prefix_re = Regex::new(r"^[A-Za-z0-9][.)]\s*").ok()?;

    let mut lines = text.lines().map(str::trim).filter(|line| !line.is_empty());
    let question = lines.next()?.to_owned();
    let options: Vec<String> = lines
        .map(|line| prefix_re.replace(line, "").into_owned())
        .filter(|line| !line.is_empty())
        .collect();

    (options.len() >= 2).then_some(ExtractedQuiz { question, options })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn extract_rejects_non_telegram_links() {
        assert_eq!(extract("https://example.com/some/quiz").await, None);
        assert_eq!(extract("not a url at all").await, None);
    }

    #[test]
    fn poll_widget_markup_is_parsed() {
        let html = r#"
            <div class="tgme_widget_message_poll_question">What is the capital of France?</div>
            <div class="tgme_widget_message_poll_option_text">Berlin</div>
            <div class="tgme_widget_message_poll_option_text">Paris</div>
        "#;
        let quiz = parse_poll_widget(html).unwrap();
        assert_eq!(quiz.question, "What is the capital of France?");
        assert_eq!(quiz.options, vec!["Berlin", "Paris"]);
    }

    #[test]
    fn poll_widget_with_one_option_is_rejected() {
        let html = r#"
            <div class="tgme_widget_message_poll_question">q</div>
            <div class="tgme_widget_message_poll_option_text">only</div>
        "#;
        assert_eq!(parse_poll_widget(html), None);
    }

    #[test]
    fn message_text_lines_become_question_and_options() {
        let quiz = parse_message_text("Which planet is red?\nA) Venus\nB) Mars\n2. Jupiter").unwrap();
        assert_eq!(quiz.question, "Which planet is red?");
        assert_eq!(quiz.options, vec!["Venus", "Mars", "Jupiter"]);
    }

    #[test]
    fn message_text_needs_at_least_two_options() {
        assert_eq!(parse_message_text("question\nonly option"), None);
        assert_eq!(parse_message_text(""), None);
    }

    #[test]
    fn embedded_view_markup_is_parsed() {
        let html = concat!(
            r#"<div class="tgme_widget_message_text js-message_text" dir="auto">"#,
            "Who wrote Dune?<br/>1. Herbert<br>2. Asimov</div>"
        );
        let quiz = parse_embedded_message(html).unwrap();
        assert_eq!(quiz.question, "Who wrote Dune?");
        assert_eq!(quiz.options, vec!["Herbert", "Asimov"]);
    }
}
