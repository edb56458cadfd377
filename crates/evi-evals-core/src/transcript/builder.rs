//! Event feed → annotated transcript.
//!
//! The feed is drained completely before a [`Transcript`] is produced; there
//! are no partial transcripts.

use std::fmt;

use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::emotion::annotate_payload;
use crate::error::{FeedResult, TranscriptError, TranscriptResult};
use crate::obs;
use crate::transcript::event::{ConversationEvent, Speaker};
use crate::transcript::feed::{event_stream, EventFeed};
use crate::METRICS;

/// The annotated conversation text handed to evaluators. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Transcript {
    lines: Vec<String>,
}

impl Transcript {
    pub fn from_lines(lines: Vec<String>) -> Self {
        Self { lines }
    }

    /// Wrap caller-supplied transcript text.
    pub fn from_text(text: &str) -> Self {
        Self {
            lines: text.split('\n').map(str::to_string).collect(),
        }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Lines joined with a single newline.
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }
}

impl fmt::Display for Transcript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text())
    }
}

impl From<String> for Transcript {
    fn from(text: String) -> Self {
        Transcript::from_text(&text)
    }
}

impl From<Transcript> for String {
    fn from(transcript: Transcript) -> Self {
        transcript.text()
    }
}

/// Render one event as a transcript line, or `None` for non-dialogue events.
///
/// User lines always carry an annotation, `{neutral}` when there is no
/// usable emotion signal.
pub fn render_event(event: &ConversationEvent) -> Option<String> {
    let speaker = event.speaker()?;
    let line = match speaker {
        Speaker::User => format!(
            "{}: {} {}",
            speaker.role(),
            event.text(),
            annotate_payload(event.emotion_features.as_deref())
        ),
        Speaker::Agent => format!("{}: {}", speaker.role(), event.text()),
    };
    Some(line)
}

#[derive(Debug, Default)]
struct LineCollector {
    seen: usize,
    lines: Vec<String>,
}

impl LineCollector {
    fn push(&mut self, event: &ConversationEvent) {
        self.seen += 1;
        if let Some(line) = render_event(event) {
            self.lines.push(line);
        }
    }

    fn finish(self) -> TranscriptResult<Transcript> {
        if self.seen == 0 {
            return Err(TranscriptError::EmptyFeed);
        }
        if self.lines.is_empty() {
            return Err(TranscriptError::NoDialogue { events: self.seen });
        }
        Ok(Transcript::from_lines(self.lines))
    }
}

/// Build a transcript from an in-memory sequence of events.
pub fn build_transcript<I>(events: I) -> TranscriptResult<Transcript>
where
    I: IntoIterator<Item = ConversationEvent>,
{
    let mut collector = LineCollector::default();
    for event in events {
        collector.push(&event);
    }
    collector.finish()
}

/// Drain a fallible event stream to completion and build the transcript.
///
/// The first feed error aborts the build.
pub async fn build_transcript_from_stream<S>(events: S) -> TranscriptResult<Transcript>
where
    S: Stream<Item = FeedResult<ConversationEvent>>,
{
    let mut collector = LineCollector::default();
    futures::pin_mut!(events);
    while let Some(next) = events.next().await {
        let event = next?;
        METRICS.inc_events_drained();
        collector.push(&event);
    }
    collector.finish()
}

/// Fetch every page of a conversation from `feed` and build its transcript.
pub async fn fetch_transcript(
    feed: &dyn EventFeed,
    conversation_id: &str,
) -> TranscriptResult<Transcript> {
    match build_transcript_from_stream(event_stream(feed, conversation_id)).await {
        Ok(transcript) => {
            obs::emit_transcript_built(conversation_id, transcript.len());
            Ok(transcript)
        }
        Err(e) => {
            warn!(conversation_id = %conversation_id, error = %e, "transcript build failed");
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emotion::EmotionScores;

    #[test]
    fn test_user_agent_and_system_events() {
        let joy: EmotionScores = [("Joy", 0.9)].into_iter().collect();
        let events = vec![
            ConversationEvent::user("hi").with_emotions(&joy),
            ConversationEvent::agent("hello"),
            ConversationEvent::other("SYSTEM_PROMPT"),
        ];

        let transcript = build_transcript(events).unwrap();
        assert_eq!(
            transcript.lines(),
            &["user: hi {extremely happy}", "assistant: hello"]
        );
        assert_eq!(transcript.text(), "user: hi {extremely happy}\nassistant: hello");
    }

    #[test]
    fn test_empty_user_text_still_annotated() {
        let transcript = build_transcript(vec![ConversationEvent::user("")]).unwrap();
        assert_eq!(transcript.lines(), &["user:  {neutral}"]);
    }

    #[test]
    fn test_agent_lines_never_annotated() {
        let joy: EmotionScores = [("Joy", 0.9)].into_iter().collect();
        let transcript =
            build_transcript(vec![ConversationEvent::agent("sure").with_emotions(&joy)]).unwrap();
        assert_eq!(transcript.text(), "assistant: sure");
    }

    #[test]
    fn test_empty_feed_error() {
        let err = build_transcript(Vec::new()).unwrap_err();
        assert!(matches!(err, TranscriptError::EmptyFeed));
    }

    #[test]
    fn test_no_dialogue_error() {
        let err = build_transcript(vec![
            ConversationEvent::other("SYSTEM_PROMPT"),
            ConversationEvent::other("CHAT_END_MESSAGE"),
        ])
        .unwrap_err();
        assert!(matches!(err, TranscriptError::NoDialogue { events: 2 }));
    }

    #[test]
    fn test_malformed_emotions_do_not_abort() {
        let transcript = build_transcript(vec![
            ConversationEvent::user("ok").with_emotion_payload("{broken"),
            ConversationEvent::agent("right"),
        ])
        .unwrap();
        assert_eq!(transcript.lines()[0], "user: ok {neutral}");
    }

    #[test]
    fn test_transcript_text_round_trip() {
        let t = Transcript::from_text("user: a {neutral}\nassistant: b");
        assert_eq!(t.len(), 2);
        assert_eq!(t.to_string(), "user: a {neutral}\nassistant: b");
        let json = serde_json::to_string(&t).unwrap();
        assert_eq!(json, "\"user: a {neutral}\\nassistant: b\"");
    }
}
