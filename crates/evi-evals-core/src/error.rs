//! Error taxonomy for transcript building and evaluation.

/// Failures fetching conversation events from the event source.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("event feed transport error: {0}")]
    Transport(String),

    #[error("event feed returned status {status}: {body}")]
    Api { status: u16, body: String },

    #[error("could not decode event page: {0}")]
    Decode(String),

    #[error("conversation not found: {0}")]
    NotFound(String),
}

impl From<reqwest::Error> for FeedError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            FeedError::Decode(err.to_string())
        } else {
            FeedError::Transport(err.to_string())
        }
    }
}

/// Failures building a transcript from an event feed.
#[derive(Debug, thiserror::Error)]
pub enum TranscriptError {
    #[error("no events found for the conversation")]
    EmptyFeed,

    #[error("conversation has {events} events but no user or agent messages")]
    NoDialogue { events: usize },

    #[error(transparent)]
    Feed(#[from] FeedError),
}

/// Failures of a single scorer call. Recorded in the outcome, never propagated.
#[derive(Debug, thiserror::Error)]
pub enum ScorerError {
    #[error("scorer transport error: {0}")]
    Transport(String),

    #[error("scorer timed out")]
    Timeout,

    #[error("scorer API returned status {status}: {body}")]
    Api { status: u16, body: String },

    #[error("malformed scorer output: {0}")]
    MalformedOutput(String),

    #[error("success criteria are required for the success evaluator")]
    MissingCriteria,

    #[error("scorer panicked: {0}")]
    Panicked(String),
}

impl From<reqwest::Error> for ScorerError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ScorerError::Timeout
        } else if err.is_decode() {
            ScorerError::MalformedOutput(err.to_string())
        } else {
            ScorerError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ScorerError {
    fn from(err: serde_json::Error) -> Self {
        ScorerError::MalformedOutput(err.to_string())
    }
}

/// Malformed or missing request fields at the evaluation boundary.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum InputError {
    #[error("either a conversation id or a transcript is required")]
    MissingTranscriptSource,

    #[error("conversation id must not be blank")]
    MissingConversationId,

    #[error("transcript must not be blank")]
    EmptyTranscript,

    #[error("success criteria are required when the success evaluator is requested")]
    MissingSuccessCriteria,
}

/// Errors returned by the evaluation boundary before any evaluator runs.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("invalid request: {0}")]
    Input(#[from] InputError),

    #[error(transparent)]
    Transcript(#[from] TranscriptError),

    #[error("no event feed configured to fetch conversation {0}")]
    FeedNotConfigured(String),
}

impl ServiceError {
    /// `true` for errors the caller caused (the 4xx class); `false` for
    /// upstream failures.
    pub fn is_client_error(&self) -> bool {
        match self {
            ServiceError::Input(_) => true,
            ServiceError::Transcript(TranscriptError::EmptyFeed)
            | ServiceError::Transcript(TranscriptError::NoDialogue { .. }) => true,
            ServiceError::Transcript(TranscriptError::Feed(FeedError::NotFound(_))) => true,
            ServiceError::Transcript(TranscriptError::Feed(_)) => false,
            ServiceError::FeedNotConfigured(_) => false,
        }
    }
}

/// Invalid or incomplete configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing credential: set {0}")]
    MissingCredential(&'static str),

    #[error("invalid value for {var}: {value}")]
    InvalidValue { var: &'static str, value: String },

    #[error("could not build HTTP client: {0}")]
    HttpClient(String),

    #[error("could not read prompt template {path}: {source}")]
    Prompt {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub type FeedResult<T> = std::result::Result<T, FeedError>;
pub type TranscriptResult<T> = std::result::Result<T, TranscriptError>;
pub type ScorerResult<T> = std::result::Result<T, ScorerError>;
pub type ServiceResult<T> = std::result::Result<T, ServiceError>;
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
