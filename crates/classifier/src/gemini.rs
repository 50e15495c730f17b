//! Google Gemini gateway (generateContent REST API).
//!
//! One blocking POST per product. 429 and 5xx responses are retried with
//! exponential backoff; any other failure is returned to the engine, which
//! treats it as "no answer" for that record.

use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use ncm_config::ResolvedClassifierConfig;
use ncm_recon::classify::parse_proposal;
use ncm_recon::{Classifier, ClassifierError, ReferenceEntry};

use crate::prompt::build_prompt;
use crate::throttle::Throttle;

pub const DEFAULT_GEMINI_URL: &str = "https://generativelanguage.googleapis.com";

const MAX_RETRIES: u32 = 2;

// ── Wire types ──────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<RequestContent<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestContent<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<ResponseCandidate>,
}

#[derive(Debug, Deserialize)]
struct ResponseCandidate {
    #[serde(default)]
    content: Option<ResponseContent>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

impl GenerateResponse {
    /// Text of the first part of the first candidate.
    fn first_text(&self) -> Option<&str> {
        self.candidates
            .first()?
            .content
            .as_ref()?
            .parts
            .first()?
            .text
            .as_deref()
    }
}

fn extract_gemini_error(body: &serde_json::Value, status: u16) -> String {
    body["error"]["message"]
        .as_str()
        .map(String::from)
        .unwrap_or_else(|| format!("HTTP {status}"))
}

// ── Client ──────────────────────────────────────────────────────────

pub struct GeminiClassifier {
    http: reqwest::blocking::Client,
    base_url: String,
    model: String,
    api_key: String,
    label: String,
    throttle: Throttle,
    backoff: Duration,
}

impl GeminiClassifier {
    pub fn new(config: &ResolvedClassifierConfig) -> Result<Self, ClassifierError> {
        let base_url = config
            .endpoint
            .clone()
            .unwrap_or_else(|| DEFAULT_GEMINI_URL.to_string());
        Self::with_base_url(config, base_url)
    }

    /// Same as [`GeminiClassifier::new`] against another server (tests).
    pub fn with_base_url(
        config: &ResolvedClassifierConfig,
        base_url: String,
    ) -> Result<Self, ClassifierError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                ClassifierError::NotConfigured(
                    config
                        .blocking_reason
                        .clone()
                        .unwrap_or_else(|| "no API key".to_string()),
                )
            })?;
        if config.model.trim().is_empty() {
            return Err(ClassifierError::NotConfigured("model name is empty".into()));
        }

        let http = reqwest::blocking::Client::builder()
            .user_agent(format!("ncm/{}", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout)
            .build()
            .map_err(|e| ClassifierError::NotConfigured(format!("HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
            label: format!("gemini:{}", config.model),
            throttle: Throttle::new(config.min_delay, config.jitter),
            backoff: Duration::from_secs(1),
        })
    }

    /// Replace call spacing (tests use [`Throttle::none`]).
    pub fn with_throttle(mut self, throttle: Throttle) -> Self {
        self.throttle = throttle;
        self
    }

    /// First retry delay; doubles on each further attempt.
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model)
    }

    /// Send one prompt and return the model's raw reply text.
    pub fn generate(&mut self, prompt: &str) -> Result<Option<String>, ClassifierError> {
        self.throttle.wait();
        let result = self.generate_with_retry(prompt);
        self.throttle.done();
        result
    }

    fn generate_with_retry(&self, prompt: &str) -> Result<Option<String>, ClassifierError> {
        let body = GenerateRequest {
            contents: vec![RequestContent { parts: vec![RequestPart { text: prompt }] }],
        };
        let url = self.endpoint();
        let mut backoff = self.backoff;

        for attempt in 0..=MAX_RETRIES {
            let resp = self
                .http
                .post(&url)
                .query(&[("key", self.api_key.as_str())])
                .json(&body)
                .send()
                .map_err(|e| ClassifierError::Network(e.without_url().to_string()))?;

            let status = resp.status().as_u16();
            if resp.status().is_success() {
                let parsed: GenerateResponse =
                    resp.json().map_err(|e| ClassifierError::Parse(e.to_string()))?;
                return Ok(parsed.first_text().map(String::from));
            }

            let retryable = status == 429 || status >= 500;
            if retryable && attempt < MAX_RETRIES {
                log::debug!(
                    "gemini: HTTP {status}, retrying in {backoff:?} (attempt {}/{MAX_RETRIES})",
                    attempt + 1
                );
                thread::sleep(backoff);
                backoff *= 2;
                continue;
            }

            let body: serde_json::Value = resp.json().unwrap_or(serde_json::Value::Null);
            return Err(ClassifierError::Http {
                status,
                message: extract_gemini_error(&body, status),
            });
        }

        Err(ClassifierError::Network("retries exhausted".into()))
    }
}

impl Classifier for GeminiClassifier {
    fn classify(
        &mut self,
        product_name: &str,
        candidates: &[&ReferenceEntry],
    ) -> Result<Option<String>, ClassifierError> {
        let prompt = build_prompt(product_name, candidates);
        let reply = self.generate(&prompt)?;
        log::trace!("gemini reply for '{product_name}': {reply:?}");
        Ok(reply.as_deref().and_then(parse_proposal))
    }

    fn name(&self) -> &str {
        &self.label
    }
}
