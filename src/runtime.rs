// Copyright 2025 Cowboy AI, LLC.

//! Scenario runtime
//!
//! Executes a validated scenario against a bus: one worker task per domain
//! polls that domain's queue, dispatches popped envelopes through the
//! listener table in declaration order, and applies actions. Listeners
//! across domains run in parallel; within one worker everything is
//! sequential, so per-queue pop order is preserved.
//!
//! Cancellation is cooperative. `stop()` flips the shared `running` flag
//! and workers observe it at every suspension point: before polling, after
//! a pop, between listeners and between actions. An in-flight action
//! finishes; everything after it is skipped.

use crate::bus::{BusError, EventBus};
use crate::envelope::EventEnvelope;
use crate::mapping::evaluate_mapping;
use crate::scenario::{Action, Listener, Scenario};
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Runtime tuning options. All recognized options live here.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// How long a worker sleeps after an empty poll or a failed pop
    pub poll_interval: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(10),
        }
    }
}

/// Deep copy of the correlation state table:
/// correlation id -> domain id -> status.
pub type StateSnapshot = HashMap<String, HashMap<String, String>>;

/// The saga orchestration runtime for one scenario.
pub struct ScenarioRuntime {
    shared: Arc<RuntimeShared>,
    /// Worker task handles keyed by domain id; populated between
    /// `start()` and `stop()`
    workers: Mutex<HashMap<String, JoinHandle<()>>>,
}

/// State shared between the runtime handle and its worker tasks.
struct RuntimeShared {
    scenario: Scenario,
    bus: Arc<dyn EventBus>,
    poll_interval: Duration,
    running: AtomicBool,
    /// domain id -> queue name; read-only after construction
    domain_queues: HashMap<String, String>,
    /// correlation id -> domain id -> status
    state: RwLock<StateSnapshot>,
}

impl ScenarioRuntime {
    /// Build a runtime for a validated scenario. Workers are not spawned
    /// until [`start`](Self::start) is called.
    pub fn new(scenario: Scenario, bus: Arc<dyn EventBus>, config: RuntimeConfig) -> Self {
        let mut domain_queues: HashMap<String, String> = HashMap::new();
        for domain in &scenario.domains {
            if let Some((other, _)) = domain_queues
                .iter()
                .find(|(_, queue)| **queue == domain.queue)
            {
                warn!(
                    "Domains \"{other}\" and \"{}\" share queue \"{}\"; listeners are matched by event name, not by queue",
                    domain.id, domain.queue
                );
            }
            domain_queues.insert(domain.id.clone(), domain.queue.clone());
        }

        Self {
            shared: Arc::new(RuntimeShared {
                scenario,
                bus,
                poll_interval: config.poll_interval,
                running: AtomicBool::new(false),
                domain_queues,
                state: RwLock::new(HashMap::new()),
            }),
            workers: Mutex::new(HashMap::new()),
        }
    }

    /// The scenario this runtime executes.
    pub fn scenario(&self) -> &Scenario {
        &self.shared.scenario
    }

    /// Whether the runtime is currently running.
    pub fn is_running(&self) -> bool {
        self.shared.is_running()
    }

    /// Number of live worker tasks.
    pub async fn worker_count(&self) -> usize {
        self.workers.lock().await.len()
    }

    /// Spawn one worker per domain. Idempotent: calling while already
    /// running is a no-op.
    pub async fn start(&self) {
        if self.shared.running.swap(true, Ordering::SeqCst) {
            return;
        }
        let mut workers = self.workers.lock().await;
        for domain in &self.shared.scenario.domains {
            if workers.contains_key(&domain.id) {
                continue;
            }
            let shared = Arc::clone(&self.shared);
            let domain_id = domain.id.clone();
            let queue = domain.queue.clone();
            let handle =
                tokio::spawn(async move { RuntimeShared::worker_loop(shared, domain_id, queue).await });
            workers.insert(domain.id.clone(), handle);
        }
        info!(
            scenario = %self.shared.scenario.name,
            workers = workers.len(),
            "Scenario runtime started"
        );
    }

    /// Signal every worker to halt after its current envelope and wait for
    /// all of them to settle. Idempotent and safe while no workers exist.
    pub async fn stop(&self) {
        self.shared.running.store(false, Ordering::SeqCst);
        let handles: Vec<JoinHandle<()>> = {
            let mut workers = self.workers.lock().await;
            workers.drain().map(|(_, handle)| handle).collect()
        };
        if handles.is_empty() {
            return;
        }
        for result in join_all(handles).await {
            if let Err(e) = result {
                error!(error = %e, "Worker task ended abnormally");
            }
        }
        info!(scenario = %self.shared.scenario.name, "Scenario runtime stopped");
    }

    /// Deep copy of the correlation state table. Never exposes internal
    /// mutable references; mutating the returned map has no effect on the
    /// runtime.
    pub async fn state_snapshot(&self) -> StateSnapshot {
        self.shared.state.read().await.clone()
    }
}

impl RuntimeShared {
    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// The cooperative poll loop of one domain worker.
    async fn worker_loop(shared: Arc<Self>, domain_id: String, queue: String) {
        debug!(domain = %domain_id, queue = %queue, "Worker started");
        loop {
            if !shared.is_running() {
                break;
            }
            match shared.bus.pop(&queue).await {
                Err(e) => {
                    error!(domain = %domain_id, queue = %queue, error = %e, "Failed to pop from queue");
                    tokio::time::sleep(shared.poll_interval).await;
                }
                Ok(None) => tokio::time::sleep(shared.poll_interval).await,
                Ok(Some(envelope)) => {
                    // Re-check so envelopes dequeued during stop are not acted on
                    if !shared.is_running() {
                        break;
                    }
                    shared.process_envelope(&envelope).await;
                }
            }
        }
        debug!(domain = %domain_id, "Worker stopped");
    }

    /// Dispatch one envelope through every listener registered for its
    /// event, in declaration order.
    async fn process_envelope(&self, envelope: &EventEnvelope) {
        let listeners = self.scenario.listeners_for(&envelope.event_name);
        if listeners.is_empty() {
            debug!("No listeners registered for event \"{}\"", envelope.event_name);
            return;
        }
        for (listener, domain_id) in listeners {
            if !self.is_running() {
                break;
            }
            self.execute_listener(listener, domain_id, envelope).await;
        }
    }

    /// Run one listener: optional cooperative delay, then the actions in
    /// order. A failing action is logged and does not abort the ones after
    /// it.
    async fn execute_listener(
        &self,
        listener: &Listener,
        domain_id: &str,
        envelope: &EventEnvelope,
    ) {
        if listener.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(listener.delay_ms)).await;
        }
        for action in &listener.actions {
            if !self.is_running() {
                break;
            }
            if let Err(e) = self
                .execute_action(listener, domain_id, action, envelope)
                .await
            {
                error!(error = %e, "Failed to execute action for listener \"{}\"", listener.id);
            }
        }
    }

    async fn execute_action(
        &self,
        listener: &Listener,
        domain_id: &str,
        action: &Action,
        envelope: &EventEnvelope,
    ) -> Result<(), BusError> {
        match action {
            Action::SetState { status } => {
                let mut state = self.state.write().await;
                state
                    .entry(envelope.correlation_id.clone())
                    .or_default()
                    .insert(domain_id.to_string(), status.clone());
                debug!(
                    correlation = %envelope.correlation_id,
                    domain = %domain_id,
                    status = %status,
                    "Correlation state updated"
                );
                Ok(())
            }
            Action::Emit {
                event,
                to_domain,
                mapping,
            } => {
                // Unknown events and domains are impossible after validation;
                // guard anyway so a worker never dies on a stale index
                let Some((dest_event, owner)) = self.scenario.event(event) else {
                    error!("Unable to emit event \"{event}\" because it is not declared");
                    return Ok(());
                };
                let target = to_domain.as_deref().unwrap_or(owner);
                let Some(queue) = self.domain_queues.get(target) else {
                    error!("Unable to emit event \"{event}\" because domain \"{target}\" has no queue");
                    return Ok(());
                };

                let source = envelope.data_record();
                let (payload, warnings) =
                    evaluate_mapping(mapping, &source, &dest_event.payload_schema);
                for warning in warnings {
                    warn!(listener = %listener.id, path = %warning.path, "{}", warning.message);
                }

                let outbound = envelope.follow_from(event, payload);
                self.bus.push(queue, &outbound).await?;
                info!("Emitted event \"{event}\" to queue \"{queue}\"");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::InMemoryBus;
    use crate::validate::validate_scenario;
    use serde_json::json;

    fn two_domain_scenario() -> Scenario {
        validate_scenario(&json!({
            "name": "shop",
            "version": 1,
            "domains": [
                {
                    "id": "order",
                    "queue": "order-q",
                    "events": [{
                        "name": "OrderCreated",
                        "payloadSchema": {"orderId": "string", "amount": "number"}
                    }],
                    "listeners": [{
                        "id": "relay-payment",
                        "on": {"event": "OrderCreated"},
                        "actions": [{
                            "type": "emit",
                            "event": "PaymentRequested",
                            "mapping": {"orderId": "orderId", "amount": "amount"}
                        }]
                    }]
                },
                {
                    "id": "payment",
                    "queue": "payment-q",
                    "events": [{
                        "name": "PaymentRequested",
                        "payloadSchema": {"orderId": "string", "amount": "number"}
                    }]
                }
            ]
        }))
        .unwrap()
    }

    #[test]
    fn default_config_polls_every_ten_millis() {
        assert_eq!(RuntimeConfig::default().poll_interval, Duration::from_millis(10));
    }

    #[tokio::test]
    async fn runtime_starts_one_worker_per_domain() {
        let runtime = ScenarioRuntime::new(
            two_domain_scenario(),
            Arc::new(InMemoryBus::new()),
            RuntimeConfig::default(),
        );
        assert_eq!(runtime.worker_count().await, 0);
        assert!(!runtime.is_running());

        runtime.start().await;
        assert!(runtime.is_running());
        assert_eq!(runtime.worker_count().await, 2);

        runtime.stop().await;
        assert!(!runtime.is_running());
        assert_eq!(runtime.worker_count().await, 0);
    }

    #[tokio::test]
    async fn snapshot_is_initially_empty_and_isolated() {
        let runtime = ScenarioRuntime::new(
            two_domain_scenario(),
            Arc::new(InMemoryBus::new()),
            RuntimeConfig::default(),
        );
        let mut snapshot = runtime.state_snapshot().await;
        assert!(snapshot.is_empty());
        snapshot.insert("c1".into(), HashMap::new());
        assert!(runtime.state_snapshot().await.is_empty());
    }
}
