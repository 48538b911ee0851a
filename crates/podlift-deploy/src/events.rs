use std::fmt;
use std::sync::Mutex;

use serde::Serialize;

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Runtime,
    Credentials,
    Build,
    Publish,
    Provision,
    Instructions,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Runtime => "runtime",
            Stage::Credentials => "credentials",
            Stage::Build => "build",
            Stage::Publish => "publish",
            Stage::Provision => "provision",
            Stage::Instructions => "instructions",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Stage::Runtime => "Checking container runtime",
            Stage::Credentials => "Registry authentication",
            Stage::Build => "Building image",
            Stage::Publish => "Pushing image",
            Stage::Provision => "Provisioning serverless endpoint",
            Stage::Instructions => "Manual deployment instructions",
        }
    }

    pub fn number(self) -> u8 {
        self as u8 + 1
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

/// One progress report from a stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Event {
    pub stage: Stage,
    pub severity: Severity,
    pub message: String,
}

pub trait EventSink: Send + Sync {
    fn emit(&self, event: Event);
}

/// Forwards events to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: Event) {
        let stage = event.stage.as_str();
        match event.severity {
            Severity::Info | Severity::Success => {
                tracing::info!(stage, severity = ?event.severity, "{}", event.message)
            }
            Severity::Warning => tracing::warn!(stage, "{}", event.message),
            Severity::Error => tracing::error!(stage, "{}", event.message),
        }
    }
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<Event>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Distinct stages that reported anything, in first-seen order.
    pub fn stages(&self) -> Vec<Stage> {
        let mut out: Vec<Stage> = Vec::new();
        for ev in self.events() {
            if !out.contains(&ev.stage) {
                out.push(ev.stage);
            }
        }
        out
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: Event) {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event);
    }
}

/// Stage-scoped helper around an [`EventSink`].
#[derive(Clone, Copy)]
pub struct Reporter<'a> {
    sink: &'a dyn EventSink,
    stage: Stage,
}

impl<'a> Reporter<'a> {
    pub fn new(sink: &'a dyn EventSink, stage: Stage) -> Self {
        Self { sink, stage }
    }

    fn emit(&self, severity: Severity, message: impl Into<String>) {
        self.sink.emit(Event {
            stage: self.stage,
            severity,
            message: message.into(),
        });
    }

    pub fn info(&self, message: impl Into<String>) {
        self.emit(Severity::Info, message);
    }

    pub fn success(&self, message: impl Into<String>) {
        self.emit(Severity::Success, message);
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.emit(Severity::Warning, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.emit(Severity::Error, message);
    }
}
