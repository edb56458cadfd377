//! Transcript reconstruction tests: annotation, filtering, pagination.

use evi_evals_core::fakes::MemoryEventFeed;
use evi_evals_core::transcript::{build_transcript_from_stream, event_stream};
use evi_evals_core::{
    annotate, build_transcript, fetch_transcript, ConversationEvent, EmotionScores, FeedError,
    TranscriptError,
};

fn scores(entries: &[(&str, f64)]) -> EmotionScores {
    entries.iter().map(|(k, v)| (*k, *v)).collect()
}

fn sample_events() -> Vec<ConversationEvent> {
    vec![
        ConversationEvent::user("hi").with_emotions(&scores(&[("Joy", 0.9)])),
        ConversationEvent::agent("hello"),
        ConversationEvent::other("SYSTEM_PROMPT"),
    ]
}

#[test]
fn test_annotate_absent_and_empty_are_neutral() {
    assert_eq!(annotate(None), "{neutral}");
    assert_eq!(annotate(Some(&EmotionScores::default())), "{neutral}");
}

#[test]
fn test_annotate_joy_is_extremely_happy() {
    assert_eq!(annotate(Some(&scores(&[("Joy", 0.8)]))), "{extremely happy}");
}

#[test]
fn test_annotate_keeps_top_three_in_score_order() {
    let annotation = annotate(Some(&scores(&[
        ("Calmness", 0.1),
        ("Anger", 0.5),
        ("Confusion", 0.3),
        ("Tiredness", 0.65),
    ])));
    assert_eq!(
        annotation,
        "{very tired, moderately angry, slightly confused}"
    );
}

#[test]
fn test_build_drops_system_events_and_annotates_user_lines() {
    let transcript = build_transcript(sample_events()).unwrap();

    assert_eq!(transcript.len(), 2);
    assert_eq!(transcript.lines()[0], "user: hi {extremely happy}");
    assert_eq!(transcript.lines()[1], "assistant: hello");
    assert_eq!(transcript.text(), "user: hi {extremely happy}\nassistant: hello");
}

#[test]
fn test_build_empty_feed_fails() {
    let err = build_transcript(Vec::new()).unwrap_err();
    assert!(matches!(err, TranscriptError::EmptyFeed));
}

#[test]
fn test_build_system_only_feed_fails_with_no_dialogue() {
    let err = build_transcript(vec![ConversationEvent::other("SYSTEM_PROMPT")]).unwrap_err();
    assert!(matches!(err, TranscriptError::NoDialogue { events: 1 }));
}

#[test]
fn test_rebuild_is_byte_identical() {
    let first = build_transcript(sample_events()).unwrap().text();
    let second = build_transcript(sample_events()).unwrap().text();
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_fetch_drains_every_page_in_order() {
    let feed = MemoryEventFeed::new().with_pages(
        "chat-1",
        vec![
            vec![
                ConversationEvent::other("CHAT_METADATA"),
                ConversationEvent::user("I need to move my booking"),
            ],
            vec![ConversationEvent::agent("Sure, to which date?")],
            vec![ConversationEvent::user("Friday")
                .with_emotion_payload(r#"{"Determination": 0.4, "Calmness": 0.2}"#)],
        ],
    );

    let transcript = fetch_transcript(&feed, "chat-1").await.unwrap();

    assert_eq!(feed.pages_fetched(), 3);
    assert_eq!(
        transcript.lines(),
        [
            "user: I need to move my booking {neutral}",
            "assistant: Sure, to which date?",
            "user: Friday {somewhat determined, very slightly calm}",
        ]
    );
}

#[tokio::test]
async fn test_feed_failure_aborts_the_build() {
    let feed = MemoryEventFeed::new()
        .with_pages(
            "chat-1",
            vec![
                vec![ConversationEvent::user("hi")],
                vec![ConversationEvent::agent("hello")],
            ],
        )
        .failing_at_page(1);

    let err = build_transcript_from_stream(event_stream(&feed, "chat-1"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        TranscriptError::Feed(FeedError::Transport(_))
    ));
}

#[tokio::test]
async fn test_unknown_conversation_is_an_empty_feed() {
    let feed = MemoryEventFeed::new();
    let err = fetch_transcript(&feed, "missing").await.unwrap_err();
    assert!(matches!(err, TranscriptError::EmptyFeed));
}
