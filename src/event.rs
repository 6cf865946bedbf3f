//! Engine events for the UI collaborator.
//!
//! The engine never draws anything. It reports what happened as
//! [`EngineEvent`]s through an [`EventSink`], and the host decides how to
//! present them: log lines, JSON, or an in-memory list for tests.

use std::sync::Mutex;

use serde::{Deserialize, Serialize};

/// Something the UI should reflect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    /// An element entered the discovery set for the first time.
    ElementDiscovered { name: String, glyph: String },
    /// A combination produced a result.
    CombineSucceeded {
        result: String,
        glyph: String,
        is_new: bool,
    },
    /// A combination could not be performed.
    CombineFailed { message: String },
    /// The whole state changed (reset, import, backup restore); redraw everything.
    StateRefreshed,
    /// An external generation request is in flight for this pair.
    GenerationStarted { first: String, second: String },
}

/// Receives engine events.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &EngineEvent);
}

// ── NullSink ────────────────────────────────────────────────────────────

/// Discards every event.
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: &EngineEvent) {}
}

// ── TracingSink ─────────────────────────────────────────────────────────

/// Forwards events to `tracing` at info level.
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: &EngineEvent) {
        match event {
            EngineEvent::ElementDiscovered { name, glyph } => {
                tracing::info!(element = %name, glyph = %glyph, "element discovered");
            }
            EngineEvent::CombineSucceeded {
                result,
                glyph,
                is_new,
            } => {
                tracing::info!(result = %result, glyph = %glyph, is_new, "combine succeeded");
            }
            EngineEvent::CombineFailed { message } => {
                tracing::info!(message = %message, "combine failed");
            }
            EngineEvent::StateRefreshed => tracing::info!("state refreshed"),
            EngineEvent::GenerationStarted { first, second } => {
                tracing::info!(first = %first, second = %second, "generation started");
            }
        }
    }
}

// ── JsonSink ────────────────────────────────────────────────────────────

/// Emits events as newline-delimited JSON on stdout.
pub struct JsonSink;

impl EventSink for JsonSink {
    fn emit(&self, event: &EngineEvent) {
        if let Ok(json) = serde_json::to_string(event) {
            println!("{json}");
        }
    }
}

// ── VecSink ─────────────────────────────────────────────────────────────

/// Collects events into a `Vec<EngineEvent>` for testing.
pub struct VecSink {
    events: Mutex<Vec<EngineEvent>>,
}

impl VecSink {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
        }
    }

    /// Get all collected events.
    pub fn events(&self) -> Vec<EngineEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Drain collected events.
    pub fn take(&self) -> Vec<EngineEvent> {
        std::mem::take(&mut *self.events.lock().unwrap())
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for VecSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for VecSink {
    fn emit(&self, event: &EngineEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vec_sink_collects_and_drains() {
        let sink = VecSink::new();
        sink.emit(&EngineEvent::StateRefreshed);
        sink.emit(&EngineEvent::CombineFailed {
            message: "nope".into(),
        });
        assert_eq!(sink.len(), 2);
        assert_eq!(sink.take()[0], EngineEvent::StateRefreshed);
        assert!(sink.is_empty());
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let json = serde_json::to_string(&EngineEvent::CombineSucceeded {
            result: "Steam".into(),
            glyph: "♨️".into(),
            is_new: true,
        })
        .unwrap();
        assert!(json.contains(r#""type":"combine_succeeded""#));
        assert!(json.contains(r#""is_new":true"#));
    }
}
