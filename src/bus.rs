// Copyright 2025 Cowboy AI, LLC.

//! Event bus interface
//!
//! The kernel treats the message transport as an opaque two-method
//! interface: push an envelope onto a named queue, pop the next envelope
//! off one. `pop` is non-blocking and returns `None` promptly on an empty
//! queue so the runtime can drive its own poll cadence. Delivery semantics
//! (ordering, durability, retention) belong to the bus service, not here.

use crate::envelope::EventEnvelope;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;

/// Errors that can occur when talking to the bus.
#[derive(Debug, Error)]
pub enum BusError {
    /// The transport failed before a response was received
    #[error("Transport error: {0}")]
    Transport(String),

    /// The queue service answered with an unexpected status
    #[error("Queue service returned status {status} for queue \"{queue}\"")]
    Status {
        /// The queue being pushed to or popped from
        queue: String,
        /// The HTTP status code received
        status: u16,
    },

    /// The envelope could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid bus configuration
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl From<reqwest::Error> for BusError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            BusError::Serialization(err.to_string())
        } else {
            BusError::Transport(err.to_string())
        }
    }
}

/// Push/pop access to named queues.
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Append an envelope to the tail of a queue. Acknowledged on return.
    async fn push(&self, queue: &str, envelope: &EventEnvelope) -> Result<(), BusError>;

    /// Remove and return the head of a queue, or `None` when it is empty.
    async fn pop(&self, queue: &str) -> Result<Option<EventEnvelope>, BusError>;
}

/// In-memory FIFO bus for tests and local runs.
#[derive(Debug, Default)]
pub struct InMemoryBus {
    queues: Mutex<HashMap<String, VecDeque<EventEnvelope>>>,
}

impl InMemoryBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of envelopes currently waiting on a queue.
    pub async fn len(&self, queue: &str) -> usize {
        let queues = self.queues.lock().await;
        queues.get(queue).map_or(0, VecDeque::len)
    }

    /// Whether a queue is empty (or was never pushed to).
    pub async fn is_empty(&self, queue: &str) -> bool {
        self.len(queue).await == 0
    }

    /// Remove and return everything waiting on a queue, in FIFO order.
    pub async fn drain(&self, queue: &str) -> Vec<EventEnvelope> {
        let mut queues = self.queues.lock().await;
        queues
            .remove(queue)
            .map(Vec::from)
            .unwrap_or_default()
    }
}

#[async_trait]
impl EventBus for InMemoryBus {
    async fn push(&self, queue: &str, envelope: &EventEnvelope) -> Result<(), BusError> {
        let mut queues = self.queues.lock().await;
        queues
            .entry(queue.to_string())
            .or_default()
            .push_back(envelope.clone());
        Ok(())
    }

    async fn pop(&self, queue: &str) -> Result<Option<EventEnvelope>, BusError> {
        let mut queues = self.queues.lock().await;
        Ok(queues.get_mut(queue).and_then(VecDeque::pop_front))
    }
}

/// Configuration for the HTTP queue service client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpBusConfig {
    /// Base URL of the queue service (e.g. "http://localhost:8080")
    pub base_url: String,

    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
}

impl Default for HttpBusConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            request_timeout_secs: 10,
        }
    }
}

/// HTTP client for the external queue service.
///
/// Path shape: `POST {base}/queues/{queue}/messages` pushes one envelope;
/// `POST {base}/queues/{queue}/messages/pop` returns one envelope as JSON,
/// or HTTP 204 when the queue is empty.
#[derive(Debug)]
pub struct HttpBus {
    client: reqwest::Client,
    config: HttpBusConfig,
}

impl HttpBus {
    /// Build a client for the given queue service.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::Configuration`] when the underlying HTTP client
    /// cannot be constructed.
    pub fn new(config: HttpBusConfig) -> Result<Self, BusError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| BusError::Configuration(e.to_string()))?;
        Ok(Self { client, config })
    }

    /// The configuration used to build this client.
    pub fn config(&self) -> &HttpBusConfig {
        &self.config
    }

    fn queue_url(&self, queue: &str) -> String {
        let base = self.config.base_url.trim_end_matches('/');
        format!("{base}/queues/{queue}/messages")
    }
}

#[async_trait]
impl EventBus for HttpBus {
    async fn push(&self, queue: &str, envelope: &EventEnvelope) -> Result<(), BusError> {
        let response = self
            .client
            .post(self.queue_url(queue))
            .json(envelope)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(BusError::Status {
                queue: queue.to_string(),
                status: response.status().as_u16(),
            });
        }
        Ok(())
    }

    async fn pop(&self, queue: &str) -> Result<Option<EventEnvelope>, BusError> {
        let response = self
            .client
            .post(format!("{}/pop", self.queue_url(queue)))
            .send()
            .await?;
        match response.status() {
            status if status == reqwest::StatusCode::NO_CONTENT => Ok(None),
            status if status.is_success() => {
                let envelope = response.json::<EventEnvelope>().await?;
                Ok(Some(envelope))
            }
            status => Err(BusError::Status {
                queue: queue.to_string(),
                status: status.as_u16(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn in_memory_bus_is_fifo_per_queue() {
        let bus = InMemoryBus::new();
        let first = EventEnvelope::root("A", "c1", json!({}));
        let second = EventEnvelope::root("B", "c1", json!({}));

        bus.push("q", &first).await.unwrap();
        bus.push("q", &second).await.unwrap();
        assert_eq!(bus.len("q").await, 2);

        assert_eq!(bus.pop("q").await.unwrap().unwrap().event_name, "A");
        assert_eq!(bus.pop("q").await.unwrap().unwrap().event_name, "B");
        assert!(bus.pop("q").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn queues_are_independent() {
        let bus = InMemoryBus::new();
        bus.push("a", &EventEnvelope::root("A", "c", json!({})))
            .await
            .unwrap();
        assert!(bus.pop("b").await.unwrap().is_none());
        assert!(bus.pop("a").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn drain_empties_the_queue_in_order() {
        let bus = InMemoryBus::new();
        bus.push("q", &EventEnvelope::root("A", "c", json!({})))
            .await
            .unwrap();
        bus.push("q", &EventEnvelope::root("B", "c", json!({})))
            .await
            .unwrap();

        let drained = bus.drain("q").await;
        let names: Vec<_> = drained.iter().map(|e| e.event_name.as_str()).collect();
        assert_eq!(names, vec!["A", "B"]);
        assert!(bus.is_empty("q").await);
    }

    #[test]
    fn http_bus_builds_queue_urls() {
        let bus = HttpBus::new(HttpBusConfig {
            base_url: "http://bus:9000/".into(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(bus.queue_url("order-q"), "http://bus:9000/queues/order-q/messages");
    }

    #[test]
    fn default_config_points_at_localhost() {
        let config = HttpBusConfig::default();
        assert_eq!(config.base_url, "http://localhost:8080");
        assert_eq!(config.request_timeout_secs, 10);
    }
}
