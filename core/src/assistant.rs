use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::AssistantConfig;
use crate::error::AssistantError;
use crate::record::Record;

pub const FALLBACK_ANSWER: &str =
    "Sorry, something went wrong while answering with the assistant. Please check the inventory data manually.";

const SYSTEM_INSTRUCTION: &str = "You are an expert logistics assistant. Answer questions about the current inventory concisely and professionally. When asked about a specific item, give exact details from the provided list. If the information is not there, say so politely.";

pub const API_KEY_VAR: &str = "INVENTORY_ASSISTANT_API_KEY";
pub const FALLBACK_API_KEY_VAR: &str = "GEMINI_API_KEY";
pub const API_URL_VAR: &str = "INVENTORY_ASSISTANT_URL";

/// Text generation backend. Implementations make a single attempt.
pub trait AnswerService: Send + Sync {
    fn generate(&self, system_instruction: &str, prompt: &str) -> Result<String, AssistantError>;
}

#[derive(Debug, Serialize)]
struct SnapshotItem<'a> {
    name: &'a str,
    location: &'a str,
    quantity: u64,
    responsible: &'a str,
    since: DateTime<Utc>,
}

/// The collection as sent to the assistant.
pub fn snapshot(records: &[Record]) -> Result<String, serde_json::Error> {
    let items: Vec<SnapshotItem<'_>> = records
        .iter()
        .map(|record| SnapshotItem {
            name: &record.name,
            location: &record.location,
            quantity: record.quantity,
            responsible: &record.responsible,
            since: record.arrival_date,
        })
        .collect();
    serde_json::to_string(&items)
}

pub fn build_prompt(question: &str, snapshot: &str) -> String {
    format!("Inventory context: {snapshot}\n\nUser question: {question}")
}

/// Asks `service` about `records`. Any failure is logged and comes back as
/// `Err(FALLBACK_ANSWER)`, ready to show in place of an answer.
pub fn ask(service: &dyn AnswerService, question: &str, records: &[Record]) -> Result<String, String> {
    let answer = snapshot(records)
        .map_err(|err| AssistantError::InvalidResponse(err.to_string()))
        .and_then(|context| service.generate(SYSTEM_INSTRUCTION, &build_prompt(question, &context)))
        .and_then(|answer| {
            if answer.trim().is_empty() {
                Err(AssistantError::EmptyAnswer)
            } else {
                Ok(answer)
            }
        });

    answer.map_err(|err| {
        error!(error = %err, "assistant call failed");
        FALLBACK_ANSWER.to_string()
    })
}

#[derive(Debug)]
pub struct GeminiClient {
    client: reqwest::blocking::Client,
    url: String,
    api_key: String,
}

impl GeminiClient {
    pub fn from_env(config: &AssistantConfig) -> Result<Self, AssistantError> {
        let api_key = std::env::var(API_KEY_VAR)
            .or_else(|_| std::env::var(FALLBACK_API_KEY_VAR))
            .map_err(|_| AssistantError::MissingApiKey)?;
        let base_url = std::env::var(API_URL_VAR).unwrap_or_else(|_| config.base_url.clone());
        Self::new(config, &base_url, api_key)
    }

    pub fn new(config: &AssistantConfig, base_url: &str, api_key: String) -> Result<Self, AssistantError> {
        if api_key.trim().is_empty() {
            return Err(AssistantError::MissingApiKey);
        }
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|err| AssistantError::Request(format!("failed to build HTTP client: {err}")))?;
        let url = format!(
            "{}/{}:generateContent",
            base_url.trim_end_matches('/'),
            config.model
        );
        Ok(Self {
            client,
            url,
            api_key,
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    system_instruction: Content<'a>,
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

impl GenerateResponse {
    fn answer(self) -> Option<String> {
        let content = self.candidates.into_iter().next()?.content?;
        let text: String = content.parts.into_iter().map(|part| part.text).collect();
        Some(text).filter(|text| !text.trim().is_empty())
    }
}

impl AnswerService for GeminiClient {
    fn generate(&self, system_instruction: &str, prompt: &str) -> Result<String, AssistantError> {
        let payload = GenerateRequest {
            system_instruction: Content {
                parts: vec![Part {
                    text: system_instruction,
                }],
            },
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
        };

        debug!(url = %self.url, "calling assistant");
        let response = self
            .client
            .post(&self.url)
            .header("x-goog-api-key", &self.api_key)
            .json(&payload)
            .send()
            .map_err(|err| AssistantError::Request(err.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().unwrap_or_default();
            return Err(AssistantError::Status { status, body });
        }

        let response: GenerateResponse = response
            .json()
            .map_err(|err| AssistantError::InvalidResponse(err.to_string()))?;
        response.answer().ok_or(AssistantError::EmptyAnswer)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
    System,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatEntry {
    pub role: Role,
    pub text: String,
    pub at: DateTime<Utc>,
}

/// Question/answer log of the query panel. It empties itself after a
/// period without submissions and refuses new questions while one is
/// pending.
#[derive(Debug)]
pub struct Conversation {
    entries: Vec<ChatEntry>,
    pending: bool,
    last_activity: Option<Instant>,
    inactivity: Duration,
}

impl Conversation {
    pub fn new(inactivity: Duration) -> Self {
        Self {
            entries: Vec::new(),
            pending: false,
            last_activity: None,
            inactivity,
        }
    }

    pub fn entries(&self) -> &[ChatEntry] {
        &self.entries
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Records a question. Returns the trimmed question to send, or `None`
    /// when it is blank or a previous question is still unanswered.
    pub fn submit(&mut self, question: &str, now: DateTime<Utc>) -> Option<String> {
        let question = question.trim();
        if question.is_empty() || self.pending {
            return None;
        }
        self.entries.push(ChatEntry {
            role: Role::User,
            text: question.to_string(),
            at: now,
        });
        self.pending = true;
        self.last_activity = Some(Instant::now());
        Some(question.to_string())
    }

    pub fn resolve(&mut self, answer: Result<String, String>, now: DateTime<Utc>) {
        self.pending = false;
        let (role, text) = match answer {
            Ok(text) => (Role::Assistant, text),
            Err(text) => (Role::System, text),
        };
        self.entries.push(ChatEntry { role, text, at: now });
    }

    /// Clears the log once the inactivity window has passed.
    pub fn expire(&mut self) -> bool {
        let Some(last) = self.last_activity else {
            return false;
        };
        if self.pending || last.elapsed() < self.inactivity {
            return false;
        }
        self.entries.clear();
        self.last_activity = None;
        true
    }
}
