use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::ReportConfig;
use crate::error::{ReportError, ReportResult};
use crate::insight::NarrativeService;
use crate::logging::{log, obj, v_num, v_str, Domain, Level};

/// Narrative service backed by the Gemini `generateContent` REST endpoint.
pub struct GeminiService {
    client: Client,
    base: String,
    model: String,
}

impl GeminiService {
    pub fn new(base: &str, model: &str, timeout_secs: u64) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(timeout_secs))
                .build()
                .unwrap_or_else(|_| Client::new()),
            base: base.trim_end_matches('/').to_string(),
            model: model.to_string(),
        }
    }

    pub fn from_config(cfg: &ReportConfig) -> Self {
        Self::new(&cfg.api_base, &cfg.model, cfg.http_timeout_secs)
    }

    fn endpoint(&self) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base, self.model)
    }
}

#[derive(Serialize, Debug)]
struct GenerateRequest<'a> {
    contents: Vec<RequestContent<'a>>,
}

#[derive(Serialize, Debug)]
struct RequestContent<'a> {
    role: &'a str,
    parts: Vec<RequestPart<'a>>,
}

#[derive(Serialize, Debug)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Deserialize, Debug)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize, Debug)]
struct Candidate {
    content: Option<CandidateContent>,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize, Debug)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ApiErrorBody {
    error: ApiError,
}

#[derive(Deserialize, Debug)]
struct ApiError {
    message: String,
    status: Option<String>,
}

fn response_text(resp: GenerateResponse) -> String {
    resp.candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|p| p.text)
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default()
}

fn error_message(status: reqwest::StatusCode, body: &str) -> String {
    match serde_json::from_str::<ApiErrorBody>(body) {
        Ok(parsed) => format!(
            "HTTP {} {}: {}",
            status.as_u16(),
            parsed.error.status.unwrap_or_default(),
            parsed.error.message
        ),
        Err(_) => {
            let excerpt: String = body.chars().take(200).collect();
            format!("HTTP {}: {}", status.as_u16(), excerpt)
        }
    }
}

#[async_trait]
impl NarrativeService for GeminiService {
    async fn generate(&self, credential: &str, prompt: &str) -> ReportResult<String> {
        let body = GenerateRequest {
            contents: vec![RequestContent {
                role: "user",
                parts: vec![RequestPart { text: prompt }],
            }],
        };
        let resp = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", credential)
            .json(&body)
            .send()
            .await
            .map_err(|e| ReportError::Transport(e.to_string()))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| ReportError::Transport(e.to_string()))?;
        if !status.is_success() {
            return Err(ReportError::Transport(error_message(status, &text)));
        }

        let parsed: GenerateResponse = serde_json::from_str(&text)
            .map_err(|e| ReportError::Transport(format!("undecodable response: {}", e)))?;
        let finish = parsed
            .candidates
            .first()
            .and_then(|c| c.finish_reason.clone())
            .unwrap_or_default();
        let reply = response_text(parsed);
        log(
            Level::Debug,
            Domain::Insight,
            "service_reply",
            obj(&[
                ("model", v_str(&self.model)),
                ("finish_reason", v_str(&finish)),
                ("reply_chars", v_num(reply.len() as f64)),
            ]),
        );
        Ok(reply)
    }
}
