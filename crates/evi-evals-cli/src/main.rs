//! evi-evals - conversation evaluation for voice agents
//!
//! The `evi-evals` command rebuilds emotion-annotated transcripts from chat
//! event feeds and scores them with LLM evaluators.
//!
//! ## Commands
//!
//! - `transcript`: Print the transcript of a conversation
//! - `evaluate`: Run the satisfaction, success and summary evaluators

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn, Level};

use evi_evals_core::config::{self, EvalConfig};
use evi_evals_core::{
    build_transcript, AnthropicScorer, ConversationEvent, EvaluationOutcome, EvaluationService,
    EvaluatorKind, HumeEventFeed, PromptTemplates, RunOutcome, Scorers, ServiceRequest,
    Transcript, METRICS,
};

#[derive(Parser)]
#[command(name = "evi-evals")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Evaluate voice-agent conversations with LLM scorers", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Where the conversation events come from.
#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct EventSource {
    /// Chat id to fetch from the chat-events API
    #[arg(long)]
    chat_id: Option<String>,

    /// JSON file with the conversation events (an array, or a saved events page)
    #[arg(long)]
    events: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the emotion-annotated transcript of a conversation
    Transcript {
        #[command(flatten)]
        source: EventSource,
    },

    /// Evaluate a conversation and print the outcome as JSON
    Evaluate {
        /// Chat id to fetch from the chat-events API
        #[arg(long, group = "input")]
        chat_id: Option<String>,

        /// JSON file with the conversation events
        #[arg(long, group = "input")]
        events: Option<PathBuf>,

        /// Plain-text transcript file, one line per turn
        #[arg(long, group = "input")]
        transcript: Option<PathBuf>,

        /// What a successful conversation looks like (required for `success`)
        #[arg(short, long)]
        criteria: Option<String>,

        /// Evaluators to run, comma separated (default: all)
        #[arg(short, long, value_delimiter = ',')]
        evaluators: Vec<EvaluatorKind>,

        /// Directory with prompt overrides
        #[arg(long, env = config::PROMPT_DIR)]
        prompt_dir: Option<PathBuf>,

        /// Per-request scorer timeout in seconds
        #[arg(long, env = config::TIMEOUT_SECS)]
        timeout_secs: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    evi_evals_core::init_tracing(cli.json, level);

    let result = match cli.command {
        Commands::Transcript { source } => cmd_transcript(&source, load_config).await,
        Commands::Evaluate {
            chat_id,
            events,
            transcript,
            criteria,
            evaluators,
            prompt_dir,
            timeout_secs,
        } => {
            let mut config = load_config()?;
            if let Some(dir) = prompt_dir {
                config.prompt_dir = Some(dir);
            }
            if let Some(secs) = timeout_secs {
                config.scorer.timeout = Duration::from_secs(secs);
            }
            let input = EvaluateInput::from_args(chat_id, events, transcript)?;
            cmd_evaluate(config, input, criteria, &evaluators).await
        }
    };

    METRICS.flush();
    result
}

// ---------------------------------------------------------------------------
// transcript
// ---------------------------------------------------------------------------

fn load_config() -> Result<EvalConfig> {
    EvalConfig::from_env().context("Invalid configuration")
}

/// Offline `--events` input never reads the configuration.
async fn cmd_transcript<F>(source: &EventSource, load_config: F) -> Result<()>
where
    F: FnOnce() -> Result<EvalConfig>,
{
    let transcript = match (&source.chat_id, &source.events) {
        (Some(chat_id), _) => {
            let config = load_config()?;
            let feed = HumeEventFeed::new(config.feed)
                .context("Chat-events API is not configured")?;
            evi_evals_core::fetch_transcript(&feed, chat_id)
                .await
                .with_context(|| format!("Failed to build transcript for chat {chat_id}"))?
        }
        (None, Some(path)) => transcript_from_events_file(path)?,
        (None, None) => bail!("either --chat-id or --events is required"),
    };

    println!("{transcript}");
    Ok(())
}

/// Events saved to disk: a bare array or a chat-events page.
#[derive(Deserialize)]
#[serde(untagged)]
enum EventsFile {
    List(Vec<ConversationEvent>),
    Page { events_page: Vec<ConversationEvent> },
}

fn read_events(path: &Path) -> Result<Vec<ConversationEvent>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read events file {:?}", path))?;
    let events = match serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse events file {:?}", path))?
    {
        EventsFile::List(events) => events,
        EventsFile::Page { events_page } => events_page,
    };
    Ok(events)
}

fn transcript_from_events_file(path: &Path) -> Result<Transcript> {
    let events = read_events(path)?;
    info!(path = ?path, events = events.len(), "loaded events file");
    build_transcript(events).with_context(|| format!("No transcript in {:?}", path))
}

// ---------------------------------------------------------------------------
// evaluate
// ---------------------------------------------------------------------------

#[derive(Debug)]
enum EvaluateInput {
    Chat(String),
    Events(PathBuf),
    TranscriptFile(PathBuf),
}

impl EvaluateInput {
    fn from_args(
        chat_id: Option<String>,
        events: Option<PathBuf>,
        transcript: Option<PathBuf>,
    ) -> Result<Self> {
        match (chat_id, events, transcript) {
            (Some(id), None, None) => Ok(EvaluateInput::Chat(id)),
            (None, Some(path), None) => Ok(EvaluateInput::Events(path)),
            (None, None, Some(path)) => Ok(EvaluateInput::TranscriptFile(path)),
            (None, None, None) => bail!("one of --chat-id, --events or --transcript is required"),
            _ => bail!("--chat-id, --events and --transcript are mutually exclusive"),
        }
    }
}

fn build_request(
    input: &EvaluateInput,
    criteria: Option<String>,
    evaluators: &[EvaluatorKind],
) -> Result<ServiceRequest> {
    let request = match input {
        EvaluateInput::Chat(chat_id) => ServiceRequest::for_conversation(chat_id),
        EvaluateInput::Events(path) => {
            ServiceRequest::for_transcript(&transcript_from_events_file(path)?.text())
        }
        EvaluateInput::TranscriptFile(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read transcript {:?}", path))?;
            ServiceRequest::for_transcript(&text)
        }
    };

    Ok(ServiceRequest {
        success_criteria: criteria,
        ..request.with_evaluators(evaluators)
    })
}

async fn cmd_evaluate(
    config: EvalConfig,
    input: EvaluateInput,
    criteria: Option<String>,
    evaluators: &[EvaluatorKind],
) -> Result<()> {
    let request = build_request(&input, criteria, evaluators)?;
    request.validate().context("Invalid evaluation request")?;

    let prompts = match &config.prompt_dir {
        Some(dir) => PromptTemplates::load_dir(dir).context("Failed to load prompt overrides")?,
        None => PromptTemplates::default(),
    };
    let scorer =
        AnthropicScorer::new(config.scorer.clone(), prompts).context("Scorer is not configured")?;
    let mut service = EvaluationService::new(Scorers::uniform(Arc::new(scorer)));
    if let EvaluateInput::Chat(_) = input {
        let feed = HumeEventFeed::new(config.feed.clone())
            .context("Chat-events API is not configured")?;
        service = service.with_feed(Arc::new(feed));
    }

    let interrupt = {
        let service = service.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, cancelling evaluation");
                service.shutdown();
            }
        })
    };

    let outcome = service.evaluate(request).await;
    interrupt.abort();

    let outcome = outcome.context("Evaluation failed")?;
    println!("{}", render_outcome(&outcome)?);
    Ok(())
}

fn render_outcome(outcome: &RunOutcome) -> Result<String> {
    let rendered = match outcome {
        RunOutcome::Completed(outcome) => {
            log_slot_errors(outcome);
            serde_json::to_string_pretty(outcome)?
        }
        RunOutcome::Cancelled => {
            info!("evaluation cancelled, no results");
            serde_json::to_string_pretty(&serde_json::json!({ "cancelled": true }))?
        }
    };
    Ok(rendered)
}

fn log_slot_errors(outcome: &EvaluationOutcome) {
    for error in &outcome.errors {
        warn!(evaluator = %error.source, error = %error.message, "evaluator failed");
    }
}
