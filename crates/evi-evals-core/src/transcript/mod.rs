//! Transcript reconstruction from conversation events.
//!
//! - [`event`]: `ConversationEvent`, `EventKind`, `Speaker`
//! - [`feed`]: `EventFeed` seam and `event_stream` pagination adapter
//! - [`builder`]: `Transcript`, `build_transcript`, `fetch_transcript`

pub mod builder;
pub mod event;
pub mod feed;

pub use builder::{
    build_transcript, build_transcript_from_stream, fetch_transcript, render_event, Transcript,
};
pub use event::{ConversationEvent, EventKind, Speaker};
pub use feed::{event_stream, EventFeed, EventPage};
