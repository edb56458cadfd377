//! Chat-events API client
//!
//! Implements [`EventFeed`] over the paginated chat-events endpoint of the
//! voice platform the conversations were recorded on.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::config::FeedConfig;
use crate::error::{ConfigError, ConfigResult, FeedError, FeedResult};
use crate::transcript::{ConversationEvent, EventFeed, EventPage};

/// One page of the chat-events response.
#[derive(Debug, Deserialize)]
struct ChatEventsPage {
    #[serde(default)]
    events_page: Vec<ConversationEvent>,
    #[serde(default)]
    page_number: u32,
    #[serde(default)]
    total_pages: u32,
}

impl From<ChatEventsPage> for EventPage {
    fn from(page: ChatEventsPage) -> Self {
        EventPage {
            has_more: page.page_number + 1 < page.total_pages,
            events: page.events_page,
        }
    }
}

/// HTTP event feed for recorded chats.
pub struct HumeEventFeed {
    config: FeedConfig,
    api_key: String,
    http_client: reqwest::Client,
}

impl HumeEventFeed {
    /// Create a feed client. Fails if no API key is configured.
    pub fn new(config: FeedConfig) -> ConfigResult<Self> {
        let api_key = config.require_api_key()?.to_string();
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("evi-evals/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout)
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        Ok(HumeEventFeed {
            config,
            api_key,
            http_client,
        })
    }

    fn page_url(&self, chat_id: &str) -> String {
        format!("{}/v0/evi/chats/{}", self.config.base_url, chat_id)
    }
}

#[async_trait]
impl EventFeed for HumeEventFeed {
    async fn fetch_page(&self, conversation_id: &str, page_number: u32) -> FeedResult<EventPage> {
        let url = self.page_url(conversation_id);
        debug!(url = %url, page_number, "fetching chat events page");

        let response = self
            .http_client
            .get(&url)
            .header("X-Hume-Api-Key", &self.api_key)
            .query(&[
                ("page_number", page_number.to_string()),
                ("page_size", self.config.page_size.to_string()),
                ("ascending_order", "true".to_string()),
            ])
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(FeedError::NotFound(conversation_id.to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FeedError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        let page: ChatEventsPage =
            serde_json::from_str(&body).map_err(|e| FeedError::Decode(e.to_string()))?;
        Ok(page.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_new_requires_api_key() {
        let err = HumeEventFeed::new(FeedConfig::default()).err();
        assert!(matches!(err, Some(ConfigError::MissingCredential(_))));
    }

    #[test]
    fn test_page_url() {
        let feed = HumeEventFeed::new(
            FeedConfig::default()
                .with_api_key("k")
                .with_base_url("http://localhost:8080/"),
        )
        .unwrap();
        assert_eq!(feed.page_url("chat-1"), "http://localhost:8080/v0/evi/chats/chat-1");
    }

    #[tokio::test]
    async fn test_unresponsive_feed_times_out() {
        use tokio::net::TcpListener;

        // Accepts the connection but never answers.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            std::future::pending::<()>().await;
        });

        let feed = HumeEventFeed::new(
            FeedConfig::default()
                .with_api_key("k")
                .with_base_url(&format!("http://{addr}"))
                .with_timeout(Duration::from_millis(200)),
        )
        .unwrap();

        let err = feed.fetch_page("chat-1", 0).await.unwrap_err();
        assert!(matches!(err, FeedError::Transport(_)), "got {err:?}");
        server.abort();
    }

    #[test]
    fn test_decode_chat_events_page() {
        let body = r#"{
            "id": "chat-1",
            "status": "COMPLETE",
            "page_number": 0,
            "page_size": 2,
            "total_pages": 3,
            "events_page": [
                {"id": "e1", "type": "SYSTEM_PROMPT", "message_text": "be nice"},
                {"id": "e2", "type": "USER_MESSAGE", "message_text": "hello",
                 "emotion_features": "{\"Joy\": 0.3}", "timestamp": 1716244940000}
            ]
        }"#;
        let page: EventPage = serde_json::from_str::<ChatEventsPage>(body).unwrap().into();
        assert!(page.has_more);
        assert_eq!(page.events.len(), 2);
        assert_eq!(page.events[1].text(), "hello");
    }

    #[test]
    fn test_last_page_has_no_more() {
        let page: EventPage = serde_json::from_str::<ChatEventsPage>(
            r#"{"page_number": 2, "total_pages": 3, "events_page": []}"#,
        )
        .unwrap()
        .into();
        assert!(!page.has_more);
    }
}
