use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::warn;

use crate::page::{InteractivePage, PageElement, PageError};
use crate::profile::{Selector, TypingField};

/// Bounded wait for the prompt-words element at typing start.
pub const SOURCE_WAIT: Duration = Duration::from_secs(10);
/// Pause after a transient per-character send failure before moving on.
pub const TRANSIENT_BACKOFF: Duration = Duration::from_millis(50);

#[derive(Debug, Error)]
pub enum TypistError {
    #[error("typing input field unavailable ({selector}): {source}")]
    FieldMissing {
        selector: Selector,
        #[source]
        source: PageError,
    },
    #[error("prompt text element never appeared ({selector}): {source}")]
    SourceMissing {
        selector: Selector,
        #[source]
        source: PageError,
    },
    #[error("input field lost mid-session: {0}")]
    InputLost(#[source] PageError),
}

/// What the typing loop did before the deadline elapsed. An `Ok` summary
/// always means the loop stopped because time ran out; premature fatal
/// stops surface as [`TypistError`] instead.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TypingSummary {
    /// Characters delivered to the input field.
    pub chars_sent: usize,
    /// Characters dropped after a transient send failure (at-most-once
    /// delivery: dropped characters are not re-sent).
    pub chars_dropped: usize,
    /// Full passes over the prompt text, including empty ones.
    pub passes: usize,
}

/// Replay the prompt text into the input field, one character at a time,
/// until `deadline`. The prompt element is re-resolved after every pass
/// since the page may swap it for a new prompt; if re-resolution fails the
/// previous handle keeps being used.
pub fn drive<P: InteractivePage>(
    page: &mut P,
    field: &TypingField,
    deadline: Instant,
    interval: Duration,
) -> Result<TypingSummary, TypistError> {
    let input_selector = field.input_selector();
    let words_selector = field.words_selector();

    // The input field is assumed stable for the whole session.
    let input = page
        .locate(&input_selector)
        .map_err(|source| TypistError::FieldMissing {
            selector: input_selector.clone(),
            source,
        })?;
    let mut words = page
        .wait_for_presence(&words_selector, SOURCE_WAIT)
        .map_err(|source| TypistError::SourceMissing {
            selector: words_selector.clone(),
            source,
        })?;

    let mut summary = TypingSummary::default();
    while Instant::now() < deadline {
        let text = match words.text() {
            Ok(text) => text,
            Err(err) => {
                warn!(selector = %words_selector, error = %err, "prompt text unreadable, skipping pass");
                String::new()
            }
        };

        for ch in text.chars() {
            // The deadline wins over finishing the sequence.
            if Instant::now() >= deadline {
                return Ok(summary);
            }
            match input.send_keys(&ch.to_string()) {
                Ok(()) => {
                    summary.chars_sent += 1;
                    thread::sleep(interval);
                }
                Err(err) if err.is_transient() => {
                    warn!(character = %ch, error = %err, "dropping character after transient input failure");
                    summary.chars_dropped += 1;
                    thread::sleep(TRANSIENT_BACKOFF);
                }
                Err(err) => return Err(TypistError::InputLost(err)),
            }
        }
        summary.passes += 1;

        if text.is_empty() {
            // An empty prompt would otherwise spin this loop hot until the
            // deadline.
            thread::sleep(TRANSIENT_BACKOFF);
        }

        // The page may have advanced to a new prompt; keep the old handle
        // if the element cannot be re-resolved right now.
        match page.locate(&words_selector) {
            Ok(next) => words = next,
            Err(err) => {
                warn!(selector = %words_selector, error = %err, "prompt element not re-resolved, reusing previous handle");
            }
        }
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::ScriptedPage;
    use crate::profile::{TypingField, TypingFieldPath};
    use assert_matches::assert_matches;

    fn field() -> TypingField {
        TypingField {
            path: TypingFieldPath {
                input: "//input[@id='typer']".into(),
                words: "#words".into(),
            },
        }
    }

    #[test]
    fn stops_mid_sequence_at_deadline() {
        let mut page = ScriptedPage::new("https://example.com/");
        let field = field();
        page.script_text(&field.words_selector(), &["abcdefghij"]);

        let deadline = Instant::now() + Duration::from_millis(200);
        let summary =
            drive(&mut page, &field, deadline, Duration::from_millis(100)).unwrap();

        // 10 characters available, but only two sends fit into 0.2s at a
        // 0.1s interval.
        assert_eq!(summary.chars_sent, 2);
        assert_eq!(page.sent(), "ab");
    }

    #[test]
    fn refetches_prompt_after_exhausting_it() {
        let mut page = ScriptedPage::new("https://example.com/");
        let field = field();
        page.script_text(&field.words_selector(), &["abc", ""]);

        let deadline = Instant::now() + Duration::from_millis(50);
        let summary = drive(&mut page, &field, deadline, Duration::from_millis(1)).unwrap();

        assert_eq!(page.sent(), "abc");
        assert!(summary.passes >= 1);
        // initial wait plus at least one re-resolution
        assert!(page.locate_count(&field.words_selector()) >= 2);
    }

    #[test]
    fn transient_send_failure_drops_character_and_continues() {
        let mut page = ScriptedPage::new("https://example.com/");
        let field = field();
        page.script_text(&field.words_selector(), &["abcd", ""]);
        page.fail_send(1);

        let deadline = Instant::now() + Duration::from_millis(200);
        let summary = drive(&mut page, &field, deadline, Duration::from_millis(1)).unwrap();

        assert_eq!(page.sent(), "acd");
        assert_eq!(summary.chars_sent, 3);
        assert_eq!(summary.chars_dropped, 1);
    }

    #[test]
    fn unreadable_prompt_degrades_to_empty_passes() {
        let mut page = ScriptedPage::new("https://example.com/");
        let field = field();
        page.script_text(&field.words_selector(), &["abc"]);
        page.fail_text_on(&field.words_selector());

        let deadline = Instant::now() + Duration::from_millis(60);
        let summary = drive(&mut page, &field, deadline, Duration::from_millis(1)).unwrap();

        // Nothing was typed, but the loop ran to the deadline instead of
        // aborting the session.
        assert_eq!(summary.chars_sent, 0);
        assert_eq!(page.sent(), "");
        assert!(summary.passes >= 1);
    }

    #[test]
    fn missing_input_field_is_fatal() {
        let mut page = ScriptedPage::new("https://example.com/");
        let field = field();
        page.mark_missing(&field.input_selector());

        let deadline = Instant::now() + Duration::from_millis(50);
        assert_matches!(
            drive(&mut page, &field, deadline, Duration::from_millis(1)),
            Err(TypistError::FieldMissing { .. })
        );
    }

    #[test]
    fn missing_prompt_element_is_fatal_at_start() {
        let mut page = ScriptedPage::new("https://example.com/");
        let field = field();
        page.mark_missing(&field.words_selector());

        let deadline = Instant::now() + Duration::from_millis(50);
        assert_matches!(
            drive(&mut page, &field, deadline, Duration::from_millis(1)),
            Err(TypistError::SourceMissing { .. })
        );
    }

    #[test]
    fn non_transient_send_failure_terminates_immediately() {
        let mut page = ScriptedPage::new("https://example.com/");
        let field = field();
        page.script_text(&field.words_selector(), &["abc"]);
        page.fail_send_fatally(1);

        let deadline = Instant::now() + Duration::from_secs(5);
        let err = drive(&mut page, &field, deadline, Duration::from_millis(1)).unwrap_err();
        assert_matches!(err, TypistError::InputLost(_));
        assert_eq!(page.sent(), "a");
    }
}
