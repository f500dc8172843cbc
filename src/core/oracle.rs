//! The reasoning oracle: one system prompt plus one payload in, free text out.
//!
//! [`HttpOracle`] talks to an Anthropic-style messages endpoint over `ureq`.
//! [`ScriptedOracle`] replays canned responses and records what it was sent.

use crate::core::config::OracleSettings;
use crate::core::error::QuorumError;
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::error::Error as StdError;
use std::io;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const ANTHROPIC_VERSION: &str = "2023-06-01";

pub trait Oracle {
    fn name(&self) -> &'static str;

    /// A single request/response round trip.
    ///
    /// Timeouts surface as [`QuorumError::OracleTimeout`]; everything else
    /// that keeps a response from arriving is [`QuorumError::OracleUnavailable`].
    fn complete(&self, system: &str, payload: &str) -> Result<String, QuorumError>;
}

pub struct HttpOracle {
    url: String,
    model: String,
    api_key: String,
    max_tokens: u32,
    timeout: Duration,
    agent: ureq::Agent,
}

impl std::fmt::Debug for HttpOracle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpOracle")
            .field("url", &self.url)
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl HttpOracle {
    /// Builds a client from settings. The API key is read from the
    /// environment variable the settings name; a missing key is a
    /// configuration error.
    pub fn from_settings(settings: &OracleSettings) -> Result<Self, QuorumError> {
        let api_key = std::env::var(&settings.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                QuorumError::Config(format!(
                    "oracle API key not set (expected in ${})",
                    settings.api_key_env
                ))
            })?;
        let timeout = Duration::from_secs(settings.timeout_secs);
        Ok(Self {
            url: settings.url.clone(),
            model: settings.model.clone(),
            api_key,
            max_tokens: settings.max_tokens,
            timeout,
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
        })
    }

    fn request_body(&self, system: &str, payload: &str) -> Value {
        json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "system": system,
            "messages": [{ "role": "user", "content": payload }],
        })
    }
}

/// Concatenates the text blocks of a messages-API response body.
pub fn response_text(body: &Value) -> String {
    body.get("content")
        .and_then(Value::as_array)
        .map(|blocks| {
            blocks
                .iter()
                .filter(|b| b.get("type").and_then(Value::as_str) == Some("text"))
                .filter_map(|b| b.get("text").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default()
}

fn is_timeout(err: &(dyn StdError + 'static)) -> bool {
    let mut cur: Option<&(dyn StdError + 'static)> = Some(err);
    while let Some(e) = cur {
        if let Some(io_err) = e.downcast_ref::<io::Error>() {
            if matches!(io_err.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) {
                return true;
            }
        }
        cur = e.source();
    }
    false
}

impl Oracle for HttpOracle {
    fn name(&self) -> &'static str {
        "http"
    }

    fn complete(&self, system: &str, payload: &str) -> Result<String, QuorumError> {
        let started = Instant::now();
        let result = self
            .agent
            .post(&self.url)
            .set("content-type", "application/json")
            .set("x-api-key", &self.api_key)
            .set("anthropic-version", ANTHROPIC_VERSION)
            .send_json(self.request_body(system, payload));

        let response = match result {
            Ok(response) => response,
            Err(ureq::Error::Status(code, response)) => {
                let detail = response.into_string().unwrap_or_default();
                return Err(QuorumError::OracleUnavailable(format!(
                    "http status {code}: {}",
                    detail.chars().take(200).collect::<String>()
                )));
            }
            Err(ureq::Error::Transport(err)) => {
                if is_timeout(&err) || started.elapsed() >= self.timeout {
                    return Err(QuorumError::OracleTimeout(format!(
                        "no response after {}s",
                        started.elapsed().as_secs()
                    )));
                }
                return Err(QuorumError::OracleUnavailable(format!(
                    "http transport failure: {err}"
                )));
            }
        };

        let body: Value = response.into_json().map_err(|e| {
            if is_timeout(&e) {
                QuorumError::OracleTimeout(format!("body read timed out: {e}"))
            } else {
                QuorumError::OracleUnavailable(format!("unreadable response body: {e}"))
            }
        })?;
        let text = response_text(&body);
        debug!(
            model = %self.model,
            elapsed_ms = started.elapsed().as_millis() as u64,
            chars = text.len(),
            "oracle responded"
        );
        if text.is_empty() {
            warn!(model = %self.model, "oracle response carried no text blocks");
        }
        Ok(text)
    }
}

/// One recorded oracle call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OracleCall {
    pub system: String,
    pub payload: String,
}

/// Replays queued responses in order. Once the queue is drained every call
/// answers with an empty string.
#[derive(Debug, Default)]
pub struct ScriptedOracle {
    responses: Mutex<VecDeque<Result<String, QuorumError>>>,
    calls: Mutex<Vec<OracleCall>>,
}

impl ScriptedOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_responses<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let oracle = Self::new();
        for r in responses {
            oracle.push(r);
        }
        oracle
    }

    pub fn push(&self, response: impl Into<String>) -> &Self {
        self.queue().push_back(Ok(response.into()));
        self
    }

    pub fn push_timeout(&self) -> &Self {
        self.queue()
            .push_back(Err(QuorumError::OracleTimeout("scripted timeout".into())));
        self
    }

    pub fn push_unavailable(&self) -> &Self {
        self.queue()
            .push_back(Err(QuorumError::OracleUnavailable("scripted outage".into())));
        self
    }

    pub fn calls(&self) -> Vec<OracleCall> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    fn queue(&self) -> std::sync::MutexGuard<'_, VecDeque<Result<String, QuorumError>>> {
        self.responses.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Oracle for ScriptedOracle {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn complete(&self, system: &str, payload: &str) -> Result<String, QuorumError> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(OracleCall {
                system: system.to_string(),
                payload: payload.to_string(),
            });
        self.queue().pop_front().unwrap_or_else(|| Ok(String::new()))
    }
}
