//! Generation providers and the wire formats they speak.
//!
//! Two backends are supported:
//!
//! * [`RemoteProvider`] — a hosted OpenAI-compatible chat-completions API
//!   streaming Server-Sent Events, authenticated with a bearer key.
//! * [`LocalProvider`] — a local engine speaking the Ollama `/api/generate`
//!   JSON-lines protocol, no authentication.
//!
//! Both implement [`TokenProvider`]; which one serves a request is decided
//! by [`crate::llm::StreamingClient`], which probes the preferred provider
//! first and keeps the fallback in reserve.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use futures::StreamExt;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::config::LlmConfig;

// ---------------------------------------------------------------------------
// GenError
// ---------------------------------------------------------------------------

/// Errors that can occur during answer generation.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum GenError {
    /// HTTP transport, connection or protocol error.
    #[error("provider request failed: {0}")]
    Provider(String),

    /// The request did not complete within the configured timeout.
    #[error("generation timed out")]
    Timeout,

    /// The stream ended without producing any content.
    #[error("provider returned no content")]
    Empty,

    /// Neither provider passed its connection probe.
    #[error("no generation provider available")]
    NoProvider,
}

impl From<reqwest::Error> for GenError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            GenError::Timeout
        } else {
            GenError::Provider(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// GenOptions
// ---------------------------------------------------------------------------

/// Sampling options sent with every generation request.
#[derive(Debug, Clone)]
pub struct GenOptions {
    pub temperature: f32,
    pub max_tokens: u32,
    pub top_p: f32,
}

impl From<&LlmConfig> for GenOptions {
    fn from(config: &LlmConfig) -> Self {
        Self {
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            top_p: config.top_p,
        }
    }
}

/// Items flowing through the answer stream: whole-string tokens, or a
/// terminal error.  The channel closing without an error is the done marker.
pub type StreamItem = Result<String, GenError>;

// ---------------------------------------------------------------------------
// TokenProvider trait
// ---------------------------------------------------------------------------

/// A streaming generation backend.
///
/// Implementations must check `cancel` once per token and end the stream
/// cleanly (returning `Ok(())` without an error) when it is set.  Tokens are
/// whole JSON-decoded strings, so a multibyte character is never split.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Short name used in logs ("remote" / "local").
    fn name(&self) -> &'static str;

    /// Cheap connectivity test run at construction time.
    async fn probe(&self) -> Result<(), GenError>;

    /// Stream tokens for `prompt` into `tx`, incrementing `emitted` for each
    /// token delivered.
    ///
    /// Returns `Err(GenError::Empty)` when the stream finished without
    /// producing a single token (and was not cancelled).
    async fn stream_into(
        &self,
        prompt: &str,
        opts: &GenOptions,
        tx: &mpsc::Sender<StreamItem>,
        cancel: &AtomicBool,
        emitted: &mut usize,
    ) -> Result<(), GenError>;
}

// The client holds providers behind trait objects.
const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn TokenProvider>) {}
};

// ---------------------------------------------------------------------------
// Wire-format parsing
// ---------------------------------------------------------------------------

/// One parsed event from a chat-completions SSE body.
#[derive(Debug, PartialEq)]
pub(crate) enum SseEvent {
    /// A content delta.
    Token(String),
    /// The `[DONE]` sentinel.
    Done,
    /// A line carrying no content (keep-alive, empty delta, role frame).
    Skip,
}

/// Parse one line of a chat-completions SSE stream.
pub(crate) fn parse_sse_line(line: &str) -> SseEvent {
    let Some(data) = line.strip_prefix("data: ") else {
        return SseEvent::Skip;
    };
    let data = data.trim();
    if data == "[DONE]" {
        return SseEvent::Done;
    }
    let Ok(value) = serde_json::from_str::<serde_json::Value>(data) else {
        return SseEvent::Skip;
    };
    match value["choices"][0]["delta"]["content"].as_str() {
        Some(content) if !content.is_empty() => SseEvent::Token(content.to_string()),
        _ => SseEvent::Skip,
    }
}

/// Parse one JSON line of an Ollama `/api/generate` stream.
/// Returns `(token, done)`.
pub(crate) fn parse_generate_line(line: &str) -> (Option<String>, bool) {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(line.trim()) else {
        return (None, false);
    };
    let token = value["response"]
        .as_str()
        .filter(|s| !s.is_empty())
        .map(str::to_string);
    let done = value["done"].as_bool().unwrap_or(false);
    (token, done)
}

// ---------------------------------------------------------------------------
// Line-splitting byte-stream reader
// ---------------------------------------------------------------------------

/// Reads a response body as complete text lines. Dropping it closes the
/// underlying connection, which is how cancellation tears a stream down.
///
/// Chunk boundaries are arbitrary, so raw bytes are buffered and decoding
/// happens per complete line — a multibyte character split across two body
/// chunks is reassembled, never mangled.
struct LineStream {
    body: futures::stream::BoxStream<'static, reqwest::Result<bytes::Bytes>>,
    buffer: Vec<u8>,
    finished: bool,
}

impl LineStream {
    fn new(response: reqwest::Response) -> Self {
        Self::from_bytes_stream(response.bytes_stream().boxed())
    }

    fn from_bytes_stream(
        body: futures::stream::BoxStream<'static, reqwest::Result<bytes::Bytes>>,
    ) -> Self {
        Self {
            body,
            buffer: Vec::new(),
            finished: false,
        }
    }

    /// Next complete line with its terminator stripped, or `None` at the end
    /// of the body (a trailing unterminated line is flushed as the last one).
    async fn next_line(&mut self) -> Result<Option<String>, GenError> {
        loop {
            if let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
                let mut line: Vec<u8> = self.buffer.drain(..=pos).collect();
                while matches!(line.last(), Some(b'\n' | b'\r')) {
                    line.pop();
                }
                return Ok(Some(String::from_utf8_lossy(&line).into_owned()));
            }
            if self.finished {
                if self.buffer.is_empty() {
                    return Ok(None);
                }
                let line = std::mem::take(&mut self.buffer);
                return Ok(Some(String::from_utf8_lossy(&line).into_owned()));
            }
            match self.body.next().await {
                Some(chunk) => self.buffer.extend_from_slice(&chunk?),
                None => self.finished = true,
            }
        }
    }
}

// ---------------------------------------------------------------------------
// RemoteProvider  (hosted chat-completions, SSE)
// ---------------------------------------------------------------------------

/// Hosted OpenAI-compatible chat-completions provider.
pub struct RemoteProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl RemoteProvider {
    /// Build from config. Returns `None` when no API key is configured —
    /// the remote provider is disabled entirely in that case.
    pub fn from_config(config: &LlmConfig) -> Option<Self> {
        let api_key = config.remote_api_key.as_deref().unwrap_or("").to_string();
        if api_key.is_empty() {
            return None;
        }

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        let model = if config.remote_model.is_empty() {
            remote_model_for(&config.local_model).to_string()
        } else {
            config.remote_model.clone()
        };

        Some(Self {
            client,
            base_url: config.remote_base_url.clone(),
            api_key,
            model,
        })
    }
}

/// Map a local model tag to a hosted model identifier, used when no remote
/// model is configured explicitly.
pub fn remote_model_for(local_tag: &str) -> &'static str {
    match local_tag {
        t if t.starts_with("llama3.2") => "llama-3.1-8b-instant",
        t if t.starts_with("llama3") => "llama-3.3-70b-versatile",
        t if t.starts_with("mixtral") => "mixtral-8x7b-32768",
        _ => "llama-3.3-70b-versatile",
    }
}

#[async_trait]
impl TokenProvider for RemoteProvider {
    fn name(&self) -> &'static str {
        "remote"
    }

    async fn probe(&self) -> Result<(), GenError> {
        let url = format!("{}/v1/models", self.base_url);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.api_key)
            .send()
            .await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(GenError::Provider(format!(
                "probe returned HTTP {}",
                response.status()
            )))
        }
    }

    async fn stream_into(
        &self,
        prompt: &str,
        opts: &GenOptions,
        tx: &mpsc::Sender<StreamItem>,
        cancel: &AtomicBool,
        emitted: &mut usize,
    ) -> Result<(), GenError> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = serde_json::json!({
            "model": self.model,
            "messages": [ { "role": "user", "content": prompt } ],
            "stream": true,
            "temperature": opts.temperature,
            "max_tokens": opts.max_tokens,
            "top_p": opts.top_p,
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(GenError::Provider(format!(
                "HTTP {} from chat completions",
                response.status()
            )));
        }

        let mut lines = LineStream::new(response);
        while let Some(line) = lines.next_line().await? {
            // Checked once per token/line; dropping `lines` closes the
            // connection.
            if cancel.load(Ordering::SeqCst) {
                return Ok(());
            }
            match parse_sse_line(&line) {
                SseEvent::Token(token) => {
                    *emitted += 1;
                    if tx.send(Ok(token)).await.is_err() {
                        return Ok(());
                    }
                }
                SseEvent::Done => break,
                SseEvent::Skip => {}
            }
        }

        if *emitted == 0 {
            return Err(GenError::Empty);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// LocalProvider  (Ollama-style JSON lines)
// ---------------------------------------------------------------------------

/// Local engine speaking the Ollama `/api/generate` JSON-lines protocol.
pub struct LocalProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl LocalProvider {
    pub fn from_config(config: &LlmConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            base_url: config.local_base_url.clone(),
            model: config.local_model.clone(),
        }
    }
}

#[async_trait]
impl TokenProvider for LocalProvider {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn probe(&self) -> Result<(), GenError> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self.client.get(&url).send().await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(GenError::Provider(format!(
                "probe returned HTTP {}",
                response.status()
            )))
        }
    }

    async fn stream_into(
        &self,
        prompt: &str,
        opts: &GenOptions,
        tx: &mpsc::Sender<StreamItem>,
        cancel: &AtomicBool,
        emitted: &mut usize,
    ) -> Result<(), GenError> {
        let url = format!("{}/api/generate", self.base_url);
        let body = serde_json::json!({
            "model": self.model,
            "prompt": prompt,
            "stream": true,
            "options": {
                "temperature": opts.temperature,
                "num_predict": opts.max_tokens,
                "top_p": opts.top_p,
            },
        });

        let response = self.client.post(&url).json(&body).send().await?;

        if !response.status().is_success() {
            return Err(GenError::Provider(format!(
                "HTTP {} from generate",
                response.status()
            )));
        }

        let mut lines = LineStream::new(response);
        while let Some(line) = lines.next_line().await? {
            if cancel.load(Ordering::SeqCst) {
                return Ok(());
            }
            let (token, done) = parse_generate_line(&line);
            if let Some(token) = token {
                *emitted += 1;
                if tx.send(Ok(token)).await.is_err() {
                    return Ok(());
                }
            }
            if done {
                break;
            }
        }

        if *emitted == 0 {
            return Err(GenError::Empty);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // ---- SSE parsing -------------------------------------------------------

    #[test]
    fn sse_content_delta_is_a_token() {
        let line = r#"data: {"choices":[{"delta":{"content":"Hello"}}]}"#;
        assert_eq!(parse_sse_line(line), SseEvent::Token("Hello".into()));
    }

    #[test]
    fn sse_done_sentinel() {
        assert_eq!(parse_sse_line("data: [DONE]"), SseEvent::Done);
    }

    #[test]
    fn sse_role_frame_and_noise_are_skipped() {
        let role = r#"data: {"choices":[{"delta":{"role":"assistant"}}]}"#;
        assert_eq!(parse_sse_line(role), SseEvent::Skip);
        assert_eq!(parse_sse_line(""), SseEvent::Skip);
        assert_eq!(parse_sse_line(": keep-alive"), SseEvent::Skip);
        assert_eq!(parse_sse_line("data: not json"), SseEvent::Skip);
    }

    #[test]
    fn sse_preserves_multibyte_tokens() {
        let line = r#"data: {"choices":[{"delta":{"content":"héllo — ครับ"}}]}"#;
        match parse_sse_line(line) {
            SseEvent::Token(t) => assert_eq!(t, "héllo — ครับ"),
            other => panic!("expected token, got {other:?}"),
        }
    }

    // ---- JSON-lines parsing ------------------------------------------------

    #[test]
    fn generate_line_with_response() {
        let (token, done) = parse_generate_line(r#"{"response":"Hi","done":false}"#);
        assert_eq!(token, Some("Hi".into()));
        assert!(!done);
    }

    #[test]
    fn generate_final_line_sets_done() {
        let (token, done) = parse_generate_line(r#"{"response":"","done":true}"#);
        assert_eq!(token, None);
        assert!(done);
    }

    #[test]
    fn generate_garbage_line_is_ignored() {
        let (token, done) = parse_generate_line("not json at all");
        assert_eq!(token, None);
        assert!(!done);
    }

    // ---- LineStream --------------------------------------------------------

    fn line_stream(chunks: Vec<&'static [u8]>) -> LineStream {
        let body = futures::stream::iter(
            chunks
                .into_iter()
                .map(|c| Ok::<bytes::Bytes, reqwest::Error>(bytes::Bytes::from_static(c))),
        )
        .boxed();
        LineStream::from_bytes_stream(body)
    }

    #[tokio::test]
    async fn line_stream_reassembles_multibyte_chars_across_chunks() {
        let line = "data: {\"choices\":[{\"delta\":{\"content\":\"ค\"}}]}\n";
        let bytes = line.as_bytes();
        // Split inside the 3-byte UTF-8 encoding of "ค".
        let split = line.find('ค').expect("multibyte char present") + 1;
        let mut stream = line_stream(vec![&bytes[..split], &bytes[split..]]);

        let out = stream.next_line().await.expect("read").expect("one line");
        match parse_sse_line(&out) {
            SseEvent::Token(t) => assert_eq!(t, "ค"),
            other => panic!("expected token, got {other:?}"),
        }
        assert!(stream.next_line().await.expect("read").is_none());
    }

    #[tokio::test]
    async fn line_stream_strips_crlf_and_flushes_trailing_line() {
        let mut stream = line_stream(vec![b"first\r\nsec", b"ond\ntail"]);

        assert_eq!(stream.next_line().await.expect("read"), Some("first".into()));
        assert_eq!(stream.next_line().await.expect("read"), Some("second".into()));
        // Unterminated trailing bytes come out as the last line.
        assert_eq!(stream.next_line().await.expect("read"), Some("tail".into()));
        assert_eq!(stream.next_line().await.expect("read"), None);
    }

    // ---- construction ------------------------------------------------------

    #[test]
    fn remote_provider_requires_api_key() {
        let mut config = LlmConfig::default();
        assert!(RemoteProvider::from_config(&config).is_none());

        config.remote_api_key = Some(String::new());
        assert!(RemoteProvider::from_config(&config).is_none());

        config.remote_api_key = Some("gsk-test".into());
        assert!(RemoteProvider::from_config(&config).is_some());
    }

    #[test]
    fn local_provider_builds_without_auth() {
        let provider = LocalProvider::from_config(&LlmConfig::default());
        assert_eq!(provider.name(), "local");
    }

    #[test]
    fn remote_model_mapping_covers_common_tags() {
        assert_eq!(remote_model_for("llama3.2:3b"), "llama-3.1-8b-instant");
        assert_eq!(remote_model_for("mixtral:8x7b"), "mixtral-8x7b-32768");
        assert_eq!(remote_model_for("anything-else"), "llama-3.3-70b-versatile");
    }

    #[test]
    fn gen_error_from_reqwest_maps_timeout() {
        // Constructed indirectly: a reqwest::Error can't be built by hand,
        // so only the display strings are checked here.
        assert_eq!(GenError::Timeout.to_string(), "generation timed out");
        assert!(GenError::Provider("x".into()).to_string().contains('x'));
    }
}
