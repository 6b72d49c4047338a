use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::models::{HealthStatus, Priority};

/// One provider's health as seen by a freshly connected stream client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderHealth {
    pub provider_id: String,
    pub enabled: bool,
    pub status: HealthStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AnalysisEvent {
    /// Sent once to each new stream client, never broadcast.
    ProviderSnapshot {
        providers: Vec<ProviderHealth>,
    },
    ProviderValidated {
        provider_id: String,
        valid: bool,
        status: HealthStatus,
        message: String,
    },
    ProviderHealthChanged {
        provider_id: String,
        status: HealthStatus,
    },
    AnalysisCompleted {
        provider_id: String,
        item_title: String,
        suggested_priority: Priority,
        confidence: f64,
        response_time: f64,
    },
    AnalysisFailed {
        provider_id: String,
        item_title: String,
        error: String,
    },
    BatchCompleted {
        provider_id: String,
        items: usize,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub event: AnalysisEvent,
}

impl EventEnvelope {
    pub fn new(event: AnalysisEvent) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            event,
        }
    }
}

#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EventEnvelope>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn publish(&self, event: AnalysisEvent) {
        let envelope = EventEnvelope::new(event);
        // Ignore error if no receivers
        let _ = self.sender.send(envelope);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.sender.subscribe()
    }
}
