//! Messages-API scorer
//!
//! One client backs all three scorer capabilities. Structured results are
//! requested as a single JSON object and pulled out of the model's reply.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ScorerConfig;
use crate::error::{ConfigError, ConfigResult, ScorerError, ScorerResult};
use crate::evaluation::outcome::{SatisfactionResult, SuccessResult, SuccessStatus, SummaryResult};
use crate::evaluation::prompt::PromptTemplates;
use crate::evaluation::scorer::{SatisfactionScorer, SuccessScorer, SummaryScorer};
use crate::transcript::Transcript;

const API_VERSION: &str = "2023-06-01";

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

impl MessagesResponse {
    fn text(self) -> String {
        self.content
            .into_iter()
            .filter(|b| b.kind == "text")
            .filter_map(|b| b.text)
            .collect::<Vec<_>>()
            .join("")
    }
}

/// Wire shape of the satisfaction reply; the score is validated separately.
#[derive(Debug, Deserialize)]
struct SatisfactionReply {
    reasoning: String,
    score: f64,
}

#[derive(Debug, Deserialize)]
struct SuccessReply {
    reasoning: String,
    status: SuccessStatus,
}

/// LLM-backed scorer speaking the messages API.
pub struct AnthropicScorer {
    config: ScorerConfig,
    api_key: String,
    prompts: PromptTemplates,
    http_client: reqwest::Client,
}

impl AnthropicScorer {
    /// Create a scorer. Fails if no API key is configured.
    pub fn new(config: ScorerConfig, prompts: PromptTemplates) -> ConfigResult<Self> {
        let api_key = config.require_api_key()?.to_string();
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("evi-evals/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout)
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        Ok(AnthropicScorer {
            config,
            api_key,
            prompts,
            http_client,
        })
    }

    async fn complete(&self, model: &str, system: Option<&str>, prompt: &str) -> ScorerResult<String> {
        let url = format!("{}/v1/messages", self.config.base_url);
        let body = MessagesRequest {
            model,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            system,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
        };

        debug!(model = %model, prompt_chars = prompt.len(), "sending scorer request");
        let response = self
            .http_client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ScorerError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let reply: MessagesResponse = response.json().await?;
        let text = reply.text();
        if text.trim().is_empty() {
            return Err(ScorerError::MalformedOutput("empty reply".to_string()));
        }
        Ok(text)
    }
}

/// Pull the outermost JSON object out of a model reply.
pub fn extract_json_object(reply: &str) -> ScorerResult<&str> {
    let start = reply.find('{');
    let end = reply.rfind('}');
    match (start, end) {
        (Some(s), Some(e)) if s < e => Ok(&reply[s..=e]),
        _ => Err(ScorerError::MalformedOutput(
            "no JSON object in scorer reply".to_string(),
        )),
    }
}

fn parse_satisfaction(reply: &str) -> ScorerResult<SatisfactionResult> {
    let parsed: SatisfactionReply = serde_json::from_str(extract_json_object(reply)?)?;
    let score = parsed.score;
    if score.fract() != 0.0 || !(1.0..=5.0).contains(&score) {
        return Err(ScorerError::MalformedOutput(format!(
            "satisfaction score {score} is not an integer in 1..=5"
        )));
    }
    Ok(SatisfactionResult {
        score: score as u8,
        reasoning: parsed.reasoning,
    })
}

fn parse_success(reply: &str) -> ScorerResult<SuccessResult> {
    let parsed: SuccessReply = serde_json::from_str(extract_json_object(reply)?)?;
    Ok(SuccessResult {
        status: parsed.status,
        reasoning: parsed.reasoning,
    })
}

#[async_trait]
impl SatisfactionScorer for AnthropicScorer {
    async fn score_satisfaction(&self, transcript: &Transcript) -> ScorerResult<SatisfactionResult> {
        let prompt = self.prompts.render_satisfaction(transcript);
        let reply = self
            .complete(&self.config.satisfaction_model, None, &prompt)
            .await?;
        parse_satisfaction(&reply)
    }
}

#[async_trait]
impl SuccessScorer for AnthropicScorer {
    async fn classify_success(
        &self,
        transcript: &Transcript,
        criteria: &str,
    ) -> ScorerResult<SuccessResult> {
        let (system, prompt) = self.prompts.render_success(transcript, criteria);
        let reply = self
            .complete(&self.config.success_model, Some(&system), &prompt)
            .await?;
        parse_success(&reply)
    }
}

#[async_trait]
impl SummaryScorer for AnthropicScorer {
    async fn summarize(&self, transcript: &Transcript) -> ScorerResult<SummaryResult> {
        let prompt = self.prompts.render_summary(transcript);
        let reply = self
            .complete(&self.config.summary_model, None, &prompt)
            .await?;
        Ok(SummaryResult {
            text: reply.trim().to_string(),
        })
    }
}
