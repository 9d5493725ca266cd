//! Message composition.
//!
//! `LlmComposer` calls any OpenAI-compatible chat endpoint to draft
//! outreach messages. Composition never fails: any API error or empty
//! completion falls back to a deterministic template, so the dispatcher
//! always has text to send.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use prospector_core::config::ComposerConfig;
use prospector_core::traits::MessageComposer;
use prospector_core::types::{CompanyContext, MessageRecord, ProfileRecord};

const INITIAL_MAX_CHARS: usize = 300;
const FOLLOWUP_MAX_CHARS: usize = 500;

/// Composer backed by an OpenAI-compatible chat completions API.
pub struct LlmComposer {
    config: ComposerConfig,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: String,
}

impl LlmComposer {
    pub fn new(config: ComposerConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    async fn chat(&self, system: &str, user: &str) -> Option<String> {
        if self.config.api_key.is_empty() {
            return None;
        }
        let url = format!(
            "{}/chat/completions",
            self.config.endpoint.trim_end_matches('/')
        );
        let body = json!({
            "model": self.config.model,
            "temperature": self.config.temperature,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user},
            ],
        });

        let response = match self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(&body)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!("✍️ Composer request failed, using template: {e}");
                return None;
            }
        };

        let parsed: ChatResponse = match response.json().await {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!("✍️ Composer returned invalid body, using template: {e}");
                return None;
            }
        };

        let text = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content.trim().to_string())
            .unwrap_or_default();
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

fn cap(text: String, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text
    } else {
        text.chars().take(max_chars).collect()
    }
}

fn company_blurb(context: &CompanyContext) -> String {
    let name = context.company_name.as_deref().unwrap_or("our team");
    match context.value_proposition.as_deref() {
        Some(value) => format!("{name} — {value}"),
        None => name.to_string(),
    }
}

/// Deterministic fallback when the LLM is unavailable.
fn initial_template(profile: &ProfileRecord, context: &CompanyContext) -> String {
    let first_name = profile.name.split_whitespace().next().unwrap_or("there");
    let hook = match (profile.title.as_deref(), profile.company.as_deref()) {
        (Some(title), Some(company)) => format!("your work as {title} at {company}"),
        (Some(title), None) => format!("your work as {title}"),
        (None, Some(company)) => format!("your work at {company}"),
        (None, None) => "your profile".to_string(),
    };
    cap(
        format!(
            "Hi {first_name}, I came across {hook} and thought it would be \
             great to connect. I'm with {}. Would love to exchange ideas!",
            company_blurb(context)
        ),
        INITIAL_MAX_CHARS,
    )
}

fn followup_template(profile: &ProfileRecord, context: &CompanyContext) -> String {
    let first_name = profile.name.split_whitespace().next().unwrap_or("there");
    cap(
        format!(
            "Hi {first_name}, thanks for connecting! I wanted to follow up — \
             at {} we help teams like yours, and I'd be glad to share how. \
             Open to a quick chat?",
            company_blurb(context)
        ),
        FOLLOWUP_MAX_CHARS,
    )
}

#[async_trait]
impl MessageComposer for LlmComposer {
    async fn compose_initial(&self, profile: &ProfileRecord, context: &CompanyContext) -> String {
        let system = "You write short, personable connection request notes for \
                      professional outreach. Maximum 300 characters. No hashtags, \
                      no emoji, no subject line. Output only the note text.";
        let user = format!(
            "Prospect: {} ({} at {}). Notes: {}. Sender: {}. Write the note.",
            profile.name,
            profile.title.as_deref().unwrap_or("unknown role"),
            profile.company.as_deref().unwrap_or("unknown company"),
            profile.notes.as_deref().unwrap_or("none"),
            company_blurb(context),
        );
        match self.chat(system, &user).await {
            Some(text) => cap(text, INITIAL_MAX_CHARS),
            None => initial_template(profile, context),
        }
    }

    async fn compose_followup(
        &self,
        profile: &ProfileRecord,
        prior_messages: &[MessageRecord],
        context: &CompanyContext,
    ) -> String {
        let system = "You write short follow-up messages to a new professional \
                      connection. Reference the earlier note naturally, suggest a \
                      concrete next step. Maximum 500 characters. Output only the \
                      message text.";
        let history = prior_messages
            .iter()
            .map(|m| format!("[{}] {}", m.message_type.as_str(), m.content))
            .collect::<Vec<_>>()
            .join("\n");
        let user = format!(
            "Prospect: {} ({} at {}). Prior messages:\n{}\nSender: {}. Write the follow-up.",
            profile.name,
            profile.title.as_deref().unwrap_or("unknown role"),
            profile.company.as_deref().unwrap_or("unknown company"),
            if history.is_empty() { "none".to_string() } else { history },
            company_blurb(context),
        );
        match self.chat(system, &user).await {
            Some(text) => cap(text, FOLLOWUP_MAX_CHARS),
            None => followup_template(profile, context),
        }
    }
}

/// Composer that always uses the deterministic templates. Used in tests
/// and when running without an API key on purpose.
#[derive(Default)]
pub struct TemplateComposer;

#[async_trait]
impl MessageComposer for TemplateComposer {
    async fn compose_initial(&self, profile: &ProfileRecord, context: &CompanyContext) -> String {
        initial_template(profile, context)
    }

    async fn compose_followup(
        &self,
        profile: &ProfileRecord,
        _prior_messages: &[MessageRecord],
        context: &CompanyContext,
    ) -> String {
        followup_template(profile, context)
    }
}
