use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventLevel {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    DomainStarted,
    DomainFinished,
    CareerPageFound,
    JobExtracted,
    Error,
    Log,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::DomainStarted => "domain_started",
            EventKind::DomainFinished => "domain_finished",
            EventKind::CareerPageFound => "career_page_found",
            EventKind::JobExtracted => "job_extracted",
            EventKind::Error => "error",
            EventKind::Log => "log",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CrawlEvent {
    pub id: Uuid,
    pub ts: DateTime<Utc>,
    pub level: EventLevel,
    pub kind: EventKind,
    pub domain: Option<String>,
    pub message: String,
    pub metadata: serde_json::Value,
}

impl CrawlEvent {
    pub fn new(kind: EventKind, domain: Option<&str>, message: impl Into<String>) -> Self {
        let level = match kind {
            EventKind::Error => EventLevel::Error,
            _ => EventLevel::Info,
        };
        Self {
            id: Uuid::new_v4(),
            ts: Utc::now(),
            level,
            kind,
            domain: domain.map(String::from),
            message: message.into(),
            metadata: serde_json::Value::Null,
        }
    }

    pub fn with_level(mut self, level: EventLevel) -> Self {
        self.level = level;
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// In-process fan-out of crawl events. Cloneable; publishing with no
/// subscribers is a no-op.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<CrawlEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CrawlEvent> {
        self.tx.subscribe()
    }

    /// Log the event at its level, then broadcast it.
    pub fn emit(&self, event: CrawlEvent) {
        let domain = event.domain.as_deref().unwrap_or("-");
        let kind = event.kind.as_str();
        match event.level {
            EventLevel::Info => tracing::info!("[{kind}] {domain}: {}", event.message),
            EventLevel::Warning => tracing::warn!("[{kind}] {domain}: {}", event.message),
            EventLevel::Error => tracing::error!("[{kind}] {domain}: {}", event.message),
        }
        let _ = self.tx.send(event);
    }
}
