// Copyright 2025 Cowboy AI, LLC.

//! Scenario document model
//!
//! A scenario is the root declarative document compiled and executed by the
//! kernel: a set of business domains, each bound to one queue and owning a
//! set of schema-typed events and declarative listeners. Values of these
//! types are only ever produced by the validator (see [`crate::validate`]),
//! so every cross-reference they carry is already resolved.
//!
//! Serialization always produces the canonical *nested* form: events and
//! listeners live under their owning domain. The legacy flat form is
//! accepted on input and normalized away.

use crate::errors::ValidationResult;
use indexmap::IndexMap;
use schemars::JsonSchema;
use serde::ser::SerializeSeq;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Primitive payload field type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    /// JSON string
    String,
    /// JSON number (integer or float)
    Number,
    /// JSON boolean
    Boolean,
}

impl FieldType {
    /// The wire tag for this type (`"string"`, `"number"`, `"boolean"`).
    pub fn tag(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Number => "number",
            FieldType::Boolean => "boolean",
        }
    }

    /// Whether a concrete JSON value inhabits this type.
    pub fn matches(&self, value: &serde_json::Value) -> bool {
        match self {
            FieldType::String => value.is_string(),
            FieldType::Number => value.is_number(),
            FieldType::Boolean => value.is_boolean(),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// A flat object schema: sub-field name to primitive tag, no further nesting.
pub type FlatSchema = IndexMap<String, FieldType>;

/// Schema of one top-level payload field. At most two levels deep.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldSchema {
    /// A primitive tag, e.g. `"amount": "number"`
    Scalar(FieldType),
    /// A flat object of primitives, e.g. `"customer": {"name": "string"}`
    Object(FlatSchema),
    /// An array of flat objects, written as a one-element sequence:
    /// `"lines": [{"sku": "string"}]`
    ArrayOfObjects(FlatSchema),
}

impl Serialize for FieldSchema {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FieldSchema::Scalar(tag) => tag.serialize(serializer),
            FieldSchema::Object(fields) => fields.serialize(serializer),
            FieldSchema::ArrayOfObjects(item) => {
                let mut seq = serializer.serialize_seq(Some(1))?;
                seq.serialize_element(item)?;
                seq.end()
            }
        }
    }
}

/// Payload schema of an event: field name to field schema, declaration order
/// preserved.
pub type PayloadSchema = IndexMap<String, FieldSchema>;

/// A named, schema-typed message type. Owned by the domain that declares it;
/// names are globally unique across the scenario.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    /// Globally unique event name
    pub name: String,
    /// Strict payload schema
    #[serde(rename = "payloadSchema")]
    pub payload_schema: PayloadSchema,
}

/// Scalar field mapping: copy a source field or inject a constant.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ScalarMapping {
    /// Copy `source[from]`; serialized in the shorthand string form
    From(String),
    /// Inject a constant scalar value
    Const {
        /// The literal to inject
        #[serde(rename = "const")]
        value: serde_json::Value,
    },
}

/// Mapping for one destination field of an emit action.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldMapping {
    /// Destination field is a primitive
    Scalar(ScalarMapping),
    /// Destination field is a flat object
    Object {
        /// Source field holding the base record; the inbound payload itself
        /// when absent
        #[serde(rename = "objectFrom", skip_serializing_if = "Option::is_none")]
        object_from: Option<String>,
        /// Destination sub-field to scalar mapping
        map: IndexMap<String, ScalarMapping>,
    },
    /// Destination field is an array of flat objects
    Array {
        /// Source field holding the array to map over
        #[serde(rename = "arrayFrom")]
        array_from: String,
        /// Destination sub-field to scalar mapping, applied per item
        map: IndexMap<String, ScalarMapping>,
    },
}

/// Mapping from destination field name to its field mapping.
pub type EmitMapping = IndexMap<String, FieldMapping>;

/// A declarative reaction step: mutate correlation state or emit an event.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum Action {
    /// Set the correlation state entry for the listener's domain
    #[serde(rename = "set-state")]
    SetState {
        /// New status string for (correlation, domain)
        status: String,
    },
    /// Build and push a derived envelope to the target domain's queue
    #[serde(rename = "emit")]
    Emit {
        /// Destination event name; must be declared in the scenario
        event: String,
        /// Target domain; must equal the owner of `event` when present
        #[serde(rename = "toDomain", skip_serializing_if = "Option::is_none")]
        to_domain: Option<String>,
        /// Payload mapping, type-checked against the destination schema
        mapping: EmitMapping,
    },
}

/// The triggering event of a listener.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trigger {
    /// Name of the event that fires this listener
    pub event: String,
}

/// A declarative reaction: one triggering event plus an ordered action list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Listener {
    /// Unique listener id across the scenario
    pub id: String,
    /// Triggering event
    pub on: Trigger,
    /// Cooperative pre-action delay in milliseconds
    #[serde(rename = "delayMs", skip_serializing_if = "is_zero")]
    pub delay_ms: u64,
    /// Actions executed in order on each dispatch
    pub actions: Vec<Action>,
}

fn is_zero(value: &u64) -> bool {
    *value == 0
}

/// A named unit of responsibility bound to one queue.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Domain {
    /// Unique domain id
    pub id: String,
    /// Queue name used when talking to the bus; opaque to the kernel
    pub queue: String,
    /// Events owned by this domain
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<Event>,
    /// Listeners owned by this domain
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub listeners: Vec<Listener>,
}

/// A validated scenario together with its flattened lookup indices.
///
/// Constructed only by the validator; the indices are rebuilt from the
/// domain list and are read-only afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct Scenario {
    /// Scenario name
    pub name: String,
    /// Opaque document version, preserved through serialization
    pub version: u64,
    /// The domains in declaration order
    pub domains: Vec<Domain>,

    /// event name -> (domain index, event index)
    #[serde(skip)]
    events_by_name: IndexMap<String, (usize, usize)>,
    /// event name -> [(domain index, listener index)] in declaration order
    #[serde(skip)]
    listeners_by_event: IndexMap<String, Vec<(usize, usize)>>,
}

impl PartialEq for Scenario {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.version == other.version && self.domains == other.domains
    }
}

impl Scenario {
    /// Assemble a scenario from already-validated parts, building the
    /// flattened indices. Callers must have established uniqueness of
    /// domain ids, event names and listener ids.
    pub(crate) fn assemble(name: String, version: u64, domains: Vec<Domain>) -> Self {
        let mut events_by_name = IndexMap::new();
        let mut listeners_by_event: IndexMap<String, Vec<(usize, usize)>> = IndexMap::new();

        for (di, domain) in domains.iter().enumerate() {
            for (ei, event) in domain.events.iter().enumerate() {
                events_by_name.insert(event.name.clone(), (di, ei));
            }
        }
        for (di, domain) in domains.iter().enumerate() {
            for (li, listener) in domain.listeners.iter().enumerate() {
                listeners_by_event
                    .entry(listener.on.event.clone())
                    .or_default()
                    .push((di, li));
            }
        }

        Self {
            name,
            version,
            domains,
            events_by_name,
            listeners_by_event,
        }
    }

    /// Validate an arbitrary parsed JSON value into a scenario.
    ///
    /// Accepts both the nested and the legacy flat surface form.
    ///
    /// # Errors
    ///
    /// Returns the complete list of validation issues found in the document.
    pub fn from_value(value: &serde_json::Value) -> ValidationResult<Self> {
        crate::validate::validate_scenario(value)
    }

    /// Serialize to the canonical nested JSON form.
    ///
    /// The result re-validates to a structurally identical scenario.
    pub fn to_value(&self) -> serde_json::Value {
        // Serialize cannot fail: the model contains only JSON-representable data
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    /// All event names declared in the scenario, in declaration order.
    pub fn event_names(&self) -> impl Iterator<Item = &str> {
        self.events_by_name.keys().map(String::as_str)
    }

    /// All listener ids declared in the scenario, in declaration order.
    pub fn listener_ids(&self) -> impl Iterator<Item = &str> {
        self.domains
            .iter()
            .flat_map(|d| d.listeners.iter().map(|l| l.id.as_str()))
    }

    /// Look up an event and its owning domain id by name.
    pub fn event(&self, name: &str) -> Option<(&Event, &str)> {
        let (di, ei) = *self.events_by_name.get(name)?;
        let domain = &self.domains[di];
        Some((&domain.events[ei], domain.id.as_str()))
    }

    /// The listeners reacting to an event, paired with their owning domain
    /// id, in declaration order. Empty when no listener is registered.
    pub fn listeners_for(&self, event: &str) -> Vec<(&Listener, &str)> {
        self.listeners_by_event
            .get(event)
            .map(|refs| {
                refs.iter()
                    .map(|&(di, li)| {
                        let domain = &self.domains[di];
                        (&domain.listeners[li], domain.id.as_str())
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The queue a domain is bound to.
    pub fn queue_of(&self, domain_id: &str) -> Option<&str> {
        self.domains
            .iter()
            .find(|d| d.id == domain_id)
            .map(|d| d.queue.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn order_schema() -> PayloadSchema {
        let mut schema = PayloadSchema::new();
        schema.insert("orderId".into(), FieldSchema::Scalar(FieldType::String));
        schema.insert("amount".into(), FieldSchema::Scalar(FieldType::Number));
        schema
    }

    #[test]
    fn field_schema_serializes_to_surface_forms() {
        let scalar = FieldSchema::Scalar(FieldType::Number);
        assert_eq!(serde_json::to_value(&scalar).unwrap(), json!("number"));

        let mut flat = FlatSchema::new();
        flat.insert("name".into(), FieldType::String);
        let object = FieldSchema::Object(flat.clone());
        assert_eq!(
            serde_json::to_value(&object).unwrap(),
            json!({"name": "string"})
        );

        let array = FieldSchema::ArrayOfObjects(flat);
        assert_eq!(
            serde_json::to_value(&array).unwrap(),
            json!([{"name": "string"}])
        );
    }

    #[test]
    fn scalar_mapping_serializes_shorthand_and_const() {
        assert_eq!(
            serde_json::to_value(ScalarMapping::From("orderId".into())).unwrap(),
            json!("orderId")
        );
        assert_eq!(
            serde_json::to_value(ScalarMapping::Const { value: json!(42) }).unwrap(),
            json!({"const": 42})
        );
    }

    #[test]
    fn action_serializes_with_type_discriminator() {
        let set_state = Action::SetState {
            status: "CREATED".into(),
        };
        assert_eq!(
            serde_json::to_value(&set_state).unwrap(),
            json!({"type": "set-state", "status": "CREATED"})
        );

        let mut mapping = EmitMapping::new();
        mapping.insert(
            "orderId".into(),
            FieldMapping::Scalar(ScalarMapping::From("orderId".into())),
        );
        let emit = Action::Emit {
            event: "PaymentRequested".into(),
            to_domain: None,
            mapping,
        };
        assert_eq!(
            serde_json::to_value(&emit).unwrap(),
            json!({
                "type": "emit",
                "event": "PaymentRequested",
                "mapping": {"orderId": "orderId"}
            })
        );
    }

    #[test]
    fn listener_omits_zero_delay() {
        let listener = Listener {
            id: "l1".into(),
            on: Trigger {
                event: "OrderCreated".into(),
            },
            delay_ms: 0,
            actions: vec![Action::SetState {
                status: "SEEN".into(),
            }],
        };
        let value = serde_json::to_value(&listener).unwrap();
        assert!(value.get("delayMs").is_none());
    }

    #[test]
    fn indices_resolve_owner_and_listeners_in_declaration_order() {
        let scenario = Scenario::assemble(
            "shop".into(),
            1,
            vec![
                Domain {
                    id: "order".into(),
                    queue: "order-q".into(),
                    events: vec![Event {
                        name: "OrderCreated".into(),
                        payload_schema: order_schema(),
                    }],
                    listeners: vec![Listener {
                        id: "order-first".into(),
                        on: Trigger {
                            event: "OrderCreated".into(),
                        },
                        delay_ms: 0,
                        actions: vec![Action::SetState {
                            status: "CREATED".into(),
                        }],
                    }],
                },
                Domain {
                    id: "audit".into(),
                    queue: "audit-q".into(),
                    events: vec![],
                    listeners: vec![Listener {
                        id: "audit-second".into(),
                        on: Trigger {
                            event: "OrderCreated".into(),
                        },
                        delay_ms: 0,
                        actions: vec![Action::SetState {
                            status: "AUDITED".into(),
                        }],
                    }],
                },
            ],
        );

        let (event, owner) = scenario.event("OrderCreated").unwrap();
        assert_eq!(event.name, "OrderCreated");
        assert_eq!(owner, "order");
        assert!(scenario.event("Ghost").is_none());

        let listeners = scenario.listeners_for("OrderCreated");
        let ids: Vec<_> = listeners.iter().map(|(l, _)| l.id.as_str()).collect();
        assert_eq!(ids, vec!["order-first", "audit-second"]);
        let domains: Vec<_> = listeners.iter().map(|(_, d)| *d).collect();
        assert_eq!(domains, vec!["order", "audit"]);

        assert_eq!(scenario.queue_of("audit"), Some("audit-q"));
        assert_eq!(scenario.queue_of("ghost"), None);
        assert_eq!(scenario.event_names().collect::<Vec<_>>(), vec!["OrderCreated"]);
        assert_eq!(
            scenario.listener_ids().collect::<Vec<_>>(),
            vec!["order-first", "audit-second"]
        );
    }
}
