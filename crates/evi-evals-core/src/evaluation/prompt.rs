//! Instruction templates sent to LLM-backed scorers.
//!
//! Templates use `{transcript}` and, for success, `{success_criteria}`
//! placeholders. A prompt directory can override any of them.

use std::path::Path;

use crate::error::{ConfigError, ConfigResult};
use crate::transcript::Transcript;

pub const SATISFACTION_FILE: &str = "satisfaction-score.txt";
pub const SUCCESS_FILE: &str = "chat-success.txt";
pub const SUMMARY_FILE: &str = "summarization.txt";

const SATISFACTION_TEMPLATE: &str = r#"You are reviewing a transcript of a conversation between a user and a voice AI assistant.
Each user line ends with the user's vocal expression in braces, for example {quite calm, slightly anxious}.
Use both what was said and how it was said.

Rate how satisfied the user was with the conversation on a scale from 1 to 5:
1 - very dissatisfied: the user was frustrated, upset, or their needs were ignored
2 - dissatisfied: the user was mostly unhappy with the assistant's help
3 - neutral: mixed or unclear signals
4 - satisfied: the user was mostly happy with the assistant's help
5 - very satisfied: the user was clearly pleased and their needs were fully met

<transcript>
{transcript}
</transcript>

Respond with only a JSON object of the form {"reasoning": "<2-4 sentences>", "score": <integer 1-5>}."#;

const SUCCESS_SYSTEM: &str = r#"You evaluate whether conversations between users and a voice AI assistant achieved their goal.
You are given a description of what success looks like for this assistant and a transcript.
User lines end with the user's vocal expression in braces.
Decide one status:
- "success": the success description was clearly met
- "failure": the success description was clearly not met
- "unknown": the transcript does not contain enough information to decide
Respond with only a JSON object of the form {"reasoning": "<2-5 sentences>", "status": "success" | "failure" | "unknown"}."#;

const SUCCESS_TEMPLATE: &str = r#"Please analyze the following chat transcript and success description to determine if the chat was successful.

<success_description>
{success_criteria}
</success_description>

<transcript>
{transcript}
</transcript>

Based on the above, reason whether the chat was successful or not and provide the resulting status and reasoning."#;

const SUMMARY_TEMPLATE: &str = r#"Summarize the following conversation between a user and a voice AI assistant in one short paragraph.
Cover what the user wanted, what the assistant did, how it ended, and any notable shifts in the user's vocal expression (shown in braces after each user line).

<transcript>
{transcript}
</transcript>

Respond with the summary text only."#;

/// The full set of scorer prompts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplates {
    pub satisfaction: String,
    pub success_system: String,
    pub success: String,
    pub summary: String,
}

impl Default for PromptTemplates {
    fn default() -> Self {
        Self {
            satisfaction: SATISFACTION_TEMPLATE.to_string(),
            success_system: SUCCESS_SYSTEM.to_string(),
            success: SUCCESS_TEMPLATE.to_string(),
            summary: SUMMARY_TEMPLATE.to_string(),
        }
    }
}

impl PromptTemplates {
    /// Built-in templates, overridden by any of `satisfaction-score.txt`,
    /// `chat-success.txt` (the success system prompt) and `summarization.txt`
    /// found in `dir`.
    pub fn load_dir(dir: &Path) -> ConfigResult<Self> {
        let mut templates = Self::default();
        if let Some(t) = read_optional(dir, SATISFACTION_FILE)? {
            templates.satisfaction = t;
        }
        if let Some(t) = read_optional(dir, SUCCESS_FILE)? {
            templates.success_system = t;
        }
        if let Some(t) = read_optional(dir, SUMMARY_FILE)? {
            templates.summary = t;
        }
        Ok(templates)
    }

    pub fn render_satisfaction(&self, transcript: &Transcript) -> String {
        self.satisfaction.replace("{transcript}", &transcript.text())
    }

    /// Returns `(system, user)` prompts.
    pub fn render_success(&self, transcript: &Transcript, criteria: &str) -> (String, String) {
        let user = self
            .success
            .replace("{success_criteria}", criteria)
            .replace("{transcript}", &transcript.text());
        (self.success_system.clone(), user)
    }

    pub fn render_summary(&self, transcript: &Transcript) -> String {
        self.summary.replace("{transcript}", &transcript.text())
    }
}

fn read_optional(dir: &Path, file: &str) -> ConfigResult<Option<String>> {
    let path = dir.join(file);
    if !path.exists() {
        return Ok(None);
    }
    std::fs::read_to_string(&path)
        .map(Some)
        .map_err(|source| ConfigError::Prompt {
            path: path.display().to_string(),
            source,
        })
}
