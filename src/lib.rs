// Copyright (c) 2025 - Cowboy AI, LLC.

//! # CIM Saga
//!
//! Declarative saga orchestration kernel for the Composable Information Machine.
//!
//! A JSON *scenario* document declares business domains, schema-typed events
//! and declarative listeners; this crate compiles the document and executes
//! it against a message bus:
//!
//! - **Scenario**: the root declarative document, validated with aggregated
//!   structured issues
//! - **Domains**: named units of responsibility, each bound to one queue
//! - **Events**: globally unique, schema-typed message types
//! - **Listeners**: reactions that set per-correlation state or emit derived
//!   events through a field-level payload mapping
//! - **Runtime**: one cooperative worker per domain polling its queue,
//!   dispatching envelopes and projecting correlation state
//!
//! ## Design Principles
//!
//! 1. **Total validation**: every issue in a document is collected before
//!    failing, so authoring tools surface all errors at once
//! 2. **Best-effort dispatch**: a buggy mapping warns and emits a partial
//!    envelope instead of stranding the saga
//! 3. **Cooperative cancellation**: `stop()` is observed at every suspension
//!    point, within one poll interval
//! 4. **Opaque transport**: the bus is a two-method push/pop interface; the
//!    kernel imposes no ordering or delivery semantics of its own

#![warn(missing_docs)]

mod envelope;
mod errors;
mod mapping;
mod scenario;
mod validate;

pub mod bus;
pub mod loader;
pub mod runtime;

pub use envelope::{EventEnvelope, ENVELOPE_VERSION};
pub use errors::{
    IssuePath, PathSegment, ScenarioValidationError, ValidationIssue, ValidationResult,
};
pub use mapping::{check_mapping, evaluate_mapping, MappingWarning};
pub use scenario::{
    Action, Domain, EmitMapping, Event, FieldMapping, FieldSchema, FieldType, FlatSchema,
    Listener, PayloadSchema, ScalarMapping, Scenario, Trigger,
};
pub use validate::validate_scenario;

pub use bus::{BusError, EventBus, HttpBus, HttpBusConfig, InMemoryBus};
pub use loader::{load_scenario, load_scenario_from_path, LoaderError};
pub use runtime::{RuntimeConfig, ScenarioRuntime, StateSnapshot};
