use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use common::{
    truncate_payload, AdvisorDecision, Config, DecisionAdvisor, Error, MarketSnapshot, Result,
};

use crate::parse::parse_decision;
use crate::prompt::build_prompt;

/// Confidence attached to every model reply. The model is not asked for one.
const REPLY_CONFIDENCE: f64 = 0.8;

#[derive(Debug, Clone)]
pub struct DeepSeekSettings {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout: Duration,
}

impl Default for DeepSeekSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.deepseek.com".to_string(),
            model: "deepseek-chat".to_string(),
            temperature: 0.7,
            max_tokens: 300,
            timeout: Duration::from_secs(30),
        }
    }
}

impl From<&Config> for DeepSeekSettings {
    fn from(config: &Config) -> Self {
        Self {
            api_key: config.deepseek_api_key.clone(),
            base_url: config.deepseek_base_url.clone(),
            model: config.deepseek_model.clone(),
            timeout: config.http_timeout,
            ..Default::default()
        }
    }
}

/// DeepSeek chat-completions advisor (OpenAI-compatible API).
pub struct DeepSeekAdvisor {
    settings: DeepSeekSettings,
    http: Client,
}

impl DeepSeekAdvisor {
    pub fn new(settings: DeepSeekSettings) -> Result<Self> {
        if settings.api_key.is_none() {
            warn!("DEEPSEEK_API_KEY not set; advisor will report unavailable on every run");
        }
        let http = Client::builder()
            .use_rustls_tls()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { settings, http })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.settings.base_url.trim_end_matches('/')
        )
    }

    async fn complete(&self, api_key: &str, prompt: &str) -> Result<String> {
        let body = ChatRequest {
            model: &self.settings.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
        };

        let started = std::time::Instant::now();
        let resp = self
            .http
            .post(self.endpoint())
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::Timeout(format!("DeepSeek request: {e}"))
                } else {
                    Error::Http(e.to_string())
                }
            })?;

        let status = resp.status();
        let text = resp.text().await.map_err(|e| Error::Http(e.to_string()))?;
        debug!(
            status = %status,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "DeepSeek responded"
        );

        if !status.is_success() {
            return Err(Error::Advisor(format!(
                "DeepSeek API error {status}: {}",
                truncate_payload(&text)
            )));
        }

        let data: ChatResponse = serde_json::from_str(&text).map_err(|e| {
            Error::Advisor(format!(
                "malformed DeepSeek response ({e}): {}",
                truncate_payload(&text)
            ))
        })?;

        data.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| Error::Advisor("DeepSeek returned empty content".into()))
    }
}

#[async_trait]
impl DecisionAdvisor for DeepSeekAdvisor {
    async fn analyze(&self, snapshot: &MarketSnapshot) -> Result<AdvisorDecision> {
        let api_key = self
            .settings
            .api_key
            .as_deref()
            .ok_or_else(|| Error::Config("DEEPSEEK_API_KEY is not configured".into()))?;

        let prompt = build_prompt(snapshot);
        debug!(symbol = %snapshot.instrument.symbol, "Calling DeepSeek API...");
        let content = self.complete(api_key, &prompt).await?;

        let decision = AdvisorDecision::new(parse_decision(&content), REPLY_CONFIDENCE, content);
        info!(
            symbol = %snapshot.instrument.symbol,
            decision = %decision.category,
            summary = %decision.summary,
            "Advisor decision"
        );
        Ok(decision)
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}
