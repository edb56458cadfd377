//! The event-feed seam: a paginated source of conversation events.

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use tracing::debug;

use crate::error::{FeedError, FeedResult};
use crate::transcript::event::ConversationEvent;

/// One page of events, in feed order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventPage {
    pub events: Vec<ConversationEvent>,
    /// Whether another page follows this one.
    pub has_more: bool,
}

/// Injectable source of conversation events.
///
/// Implement this trait to plug in the real chat-events API or a test stub.
/// Page numbers are zero-based.
#[async_trait]
pub trait EventFeed: Send + Sync {
    async fn fetch_page(&self, conversation_id: &str, page_number: u32) -> FeedResult<EventPage>;
}

/// Adapt a paginated feed into a lazy stream of events.
///
/// Pages are fetched one at a time as the stream is polled. The stream ends
/// after a page reports `has_more == false` or comes back empty, and yields
/// the feed error (then ends) if a fetch fails.
pub fn event_stream<'a>(
    feed: &'a dyn EventFeed,
    conversation_id: &'a str,
) -> BoxStream<'a, FeedResult<ConversationEvent>> {
    stream::try_unfold(Some(0u32), move |next| async move {
        let Some(page_number) = next else {
            return Ok(None);
        };
        let page = feed.fetch_page(conversation_id, page_number).await?;
        debug!(
            conversation_id = %conversation_id,
            page_number,
            events = page.events.len(),
            has_more = page.has_more,
            "fetched event page"
        );
        let next = if page.has_more && !page.events.is_empty() {
            Some(page_number + 1)
        } else {
            None
        };
        Ok::<_, FeedError>(Some((page.events, next)))
    })
    .map_ok(|events| stream::iter(events.into_iter().map(Ok)))
    .try_flatten()
    .boxed()
}
