//! Session state, events, and output sinks.

pub mod events;
pub mod history;
pub mod registry;

pub use events::{EventClock, JsonLinesSink, OutputSink, SessionEvent, TerminalSink};
pub use history::{QaHistory, QaPair};
pub use registry::{SessionContext, SessionError, SessionRegistry};
