//! Typed session events and output sinks.
//!
//! The pipeline never talks to a terminal or a socket directly; it emits
//! [`SessionEvent`]s and answer tokens through the [`OutputSink`] trait.
//! Two sinks ship with the binary: a line-oriented terminal sink and a
//! JSON-lines sink whose frames are stable enough to pipe into another
//! process.  Every event carries a timestamp from a monotonic per-session
//! clock.

use std::io::Write;
use std::time::Instant;

use serde::Serialize;

// ---------------------------------------------------------------------------
// EventClock
// ---------------------------------------------------------------------------

/// Monotonic milliseconds since the session started.
#[derive(Debug, Clone)]
pub struct EventClock {
    start: Instant,
}

impl EventClock {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Milliseconds elapsed; `Instant` guarantees this never goes backwards.
    pub fn now_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

// ---------------------------------------------------------------------------
// SessionEvent
// ---------------------------------------------------------------------------

/// Everything a sink can be told about, tagged for JSON consumers.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// A finished transcript (question or not).
    Transcript {
        text: String,
        language: String,
        confidence: f32,
        timestamp_ms: u64,
    },
    /// The detector decided the transcript is a question.
    QuestionDetected {
        question: String,
        kind: String,
        confidence: f32,
        timestamp_ms: u64,
    },
    /// A complete generated answer (tokens were streamed separately).
    AnswerGenerated {
        answer: String,
        confidence: f32,
        context_used: Vec<String>,
        timestamp_ms: u64,
    },
    /// A non-fatal failure the listener should know about.
    Error {
        message: String,
        timestamp_ms: u64,
    },
}

// ---------------------------------------------------------------------------
// OutputSink
// ---------------------------------------------------------------------------

/// Destination for tokens and events. "Deliver now" semantics: sinks flush
/// as they go so a dashboard or terminal shows tokens as they stream.
pub trait OutputSink: Send {
    /// Deliver one answer token immediately.
    fn token(&mut self, token: &str);

    /// Mark the current answer stream as finished.
    fn token_done(&mut self);

    /// Deliver one typed event immediately.
    fn event(&mut self, event: &SessionEvent);
}

const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn OutputSink>) {}
};

// ---------------------------------------------------------------------------
// TerminalSink
// ---------------------------------------------------------------------------

/// Human-oriented line output: tokens print inline, events print as lines.
pub struct TerminalSink<W: Write + Send> {
    out: W,
}

impl TerminalSink<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self {
            out: std::io::stdout(),
        }
    }
}

impl<W: Write + Send> TerminalSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl<W: Write + Send> OutputSink for TerminalSink<W> {
    fn token(&mut self, token: &str) {
        let _ = write!(self.out, "{token}");
        let _ = self.out.flush();
    }

    fn token_done(&mut self) {
        let _ = writeln!(self.out);
        let _ = self.out.flush();
    }

    fn event(&mut self, event: &SessionEvent) {
        let line = match event {
            SessionEvent::Transcript {
                text, confidence, ..
            } => format!("[transcript {confidence:.2}] {text}"),
            SessionEvent::QuestionDetected {
                question,
                kind,
                confidence,
                ..
            } => format!("[question/{kind} {confidence:.2}] {question}"),
            SessionEvent::AnswerGenerated { confidence, .. } => {
                format!("[answer complete, confidence {confidence:.2}]")
            }
            SessionEvent::Error { message, .. } => format!("[error] {message}"),
        };
        let _ = writeln!(self.out, "{line}");
        let _ = self.out.flush();
    }
}

// ---------------------------------------------------------------------------
// JsonLinesSink
// ---------------------------------------------------------------------------

/// Machine-oriented output: one JSON object per line.  Token frames are
/// `{"type":"answer_token","token":…,"done":false}` with a final
/// `{"type":"answer_token","done":true}` marker.
pub struct JsonLinesSink<W: Write + Send> {
    out: W,
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    fn write_value(&mut self, value: &serde_json::Value) {
        if let Ok(line) = serde_json::to_string(value) {
            let _ = writeln!(self.out, "{line}");
            let _ = self.out.flush();
        }
    }
}

impl<W: Write + Send> OutputSink for JsonLinesSink<W> {
    fn token(&mut self, token: &str) {
        self.write_value(&serde_json::json!({
            "type": "answer_token",
            "token": token,
            "done": false,
        }));
    }

    fn token_done(&mut self) {
        self.write_value(&serde_json::json!({
            "type": "answer_token",
            "done": true,
        }));
    }

    fn event(&mut self, event: &SessionEvent) {
        match serde_json::to_value(event) {
            Ok(value) => self.write_value(&value),
            Err(err) => log::error!("failed to serialise event: {err}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_is_monotonic() {
        let clock = EventClock::start();
        let a = clock.now_ms();
        let b = clock.now_ms();
        let c = clock.now_ms();
        assert!(a <= b && b <= c);
    }

    #[test]
    fn json_sink_emits_tagged_events() {
        let mut buf = Vec::new();
        {
            let mut sink = JsonLinesSink::new(&mut buf);
            sink.event(&SessionEvent::QuestionDetected {
                question: "What is Rust?".into(),
                kind: "technical".into(),
                confidence: 0.5,
                timestamp_ms: 42,
            });
            sink.event(&SessionEvent::Error {
                message: "engine hiccup".into(),
                timestamp_ms: 43,
            });
        }

        let text = String::from_utf8(buf).expect("utf8");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: serde_json::Value = serde_json::from_str(lines[0]).expect("json");
        assert_eq!(first["type"], "question_detected");
        assert_eq!(first["question"], "What is Rust?");
        assert_eq!(first["kind"], "technical");
        assert_eq!(first["timestamp_ms"], 42);

        let second: serde_json::Value = serde_json::from_str(lines[1]).expect("json");
        assert_eq!(second["type"], "error");
    }

    #[test]
    fn json_sink_token_frames_carry_done_marker() {
        let mut buf = Vec::new();
        {
            let mut sink = JsonLinesSink::new(&mut buf);
            sink.token("Hel");
            sink.token("lo");
            sink.token_done();
        }

        let text = String::from_utf8(buf).expect("utf8");
        let frames: Vec<serde_json::Value> = text
            .lines()
            .map(|l| serde_json::from_str(l).expect("json"))
            .collect();
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0]["token"], "Hel");
        assert_eq!(frames[0]["done"], false);
        assert_eq!(frames[2]["done"], true);
        assert!(frames[2].get("token").is_none());
    }

    #[test]
    fn terminal_sink_prints_tokens_inline() {
        let mut buf = Vec::new();
        {
            let mut sink = TerminalSink::new(&mut buf);
            sink.token("Hello");
            sink.token(", world");
            sink.token_done();
            sink.event(&SessionEvent::Transcript {
                text: "hi".into(),
                language: "en".into(),
                confidence: 0.9,
                timestamp_ms: 1,
            });
        }

        let text = String::from_utf8(buf).expect("utf8");
        assert!(text.starts_with("Hello, world\n"));
        assert!(text.contains("[transcript 0.90] hi"));
    }
}
