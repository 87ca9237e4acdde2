// Copyright 2025 Cowboy AI, LLC.

//! Scenario document validator
//!
//! Accepts an arbitrary parsed JSON value and produces either a validated
//! [`Scenario`] or the complete list of structured issues. Two surface
//! shapes are normalized into the canonical nested form:
//!
//! 1. Nested: events and listeners live under each domain.
//! 2. Legacy flat: top-level `events` and `listeners` arrays whose entries
//!    carry a `domain` field naming the owning domain.
//!
//! The same event name declared in both scopes must be deep-structurally
//! equal, in which case the declarations merge; listener-id collisions are
//! rejected regardless of equality. The validator never short-circuits:
//! every issue in the document is collected before failing.

use crate::errors::{IssuePath, ScenarioValidationError, ValidationIssue, ValidationResult};
use crate::mapping::check_mapping;
use crate::scenario::{
    Action, Domain, EmitMapping, Event, FieldMapping, FieldSchema, FieldType, FlatSchema,
    Listener, PayloadSchema, ScalarMapping, Scenario, Trigger,
};
use indexmap::IndexMap;
use serde_json::{Map, Value};

/// Validate a parsed scenario document.
///
/// # Errors
///
/// Returns every issue found in the document, aggregated into one error.
pub fn validate_scenario(value: &Value) -> ValidationResult<Scenario> {
    let mut issues = Vec::new();
    let root = IssuePath::root();

    let Some(doc) = value.as_object() else {
        issues.push(ValidationIssue::new(root, "Scenario must be a JSON object"));
        return Err(ScenarioValidationError::new(issues));
    };

    let name = require_non_empty_string(doc, "name", &root, &mut issues);
    let version = match doc.get("version") {
        Some(v) => match v.as_u64() {
            Some(version) => Some(version),
            None => {
                issues.push(ValidationIssue::new(
                    root.key("version"),
                    "Field \"version\" must be a non-negative integer",
                ));
                None
            }
        },
        None => {
            issues.push(ValidationIssue::new(
                root.key("version"),
                "Missing required field \"version\"",
            ));
            None
        }
    };

    let mut drafts = collect_domains(doc, &root, &mut issues);
    let mut event_owners = register_nested_events(&mut drafts, &mut issues);
    merge_flat_events(doc, &root, &mut drafts, &mut event_owners, &mut issues);
    merge_flat_listeners(doc, &root, &mut drafts, &mut issues);
    check_listener_ids(&drafts, &mut issues);
    check_cross_references(&drafts, &event_owners, &mut issues);

    if !issues.is_empty() {
        return Err(ScenarioValidationError::new(issues));
    }

    // All parse failures above produced issues, so the unwraps cannot be hit
    let name = name.unwrap_or_default();
    let version = version.unwrap_or_default();
    let domains = drafts
        .into_iter()
        .map(|draft| Domain {
            id: draft.id,
            queue: draft.queue,
            events: draft.events,
            listeners: draft.listeners.into_iter().map(|(l, _)| l).collect(),
        })
        .collect();
    Ok(Scenario::assemble(name, version, domains))
}

/// A domain in mid-normalization: listeners keep their source-document path
/// so cross-reference issues point at the original location (nested or flat).
struct DomainDraft {
    id: String,
    queue: String,
    events: Vec<Event>,
    listeners: Vec<(Listener, IssuePath)>,
}

fn collect_domains(
    doc: &Map<String, Value>,
    root: &IssuePath,
    issues: &mut Vec<ValidationIssue>,
) -> Vec<DomainDraft> {
    let domains_path = root.key("domains");
    let Some(domains) = doc.get("domains") else {
        issues.push(ValidationIssue::new(
            domains_path,
            "Missing required field \"domains\"",
        ));
        return Vec::new();
    };
    let Some(domains) = domains.as_array() else {
        issues.push(ValidationIssue::new(
            domains_path,
            "Field \"domains\" must be an array",
        ));
        return Vec::new();
    };
    if domains.is_empty() {
        issues.push(ValidationIssue::new(
            domains_path.clone(),
            "Field \"domains\" must not be empty",
        ));
    }

    let mut drafts: Vec<DomainDraft> = Vec::new();
    for (di, value) in domains.iter().enumerate() {
        let path = domains_path.index(di);
        let Some(obj) = value.as_object() else {
            issues.push(ValidationIssue::new(path, "Domain must be a JSON object"));
            continue;
        };

        let id = require_non_empty_string(obj, "id", &path, issues);
        let queue = require_non_empty_string(obj, "queue", &path, issues);

        let events = collect_events(obj.get("events"), &path.key("events"), issues);
        let listeners = collect_listeners(obj.get("listeners"), &path.key("listeners"), issues);

        let (Some(id), Some(queue)) = (id, queue) else {
            continue;
        };
        if drafts.iter().any(|d| d.id == id) {
            issues.push(ValidationIssue::new(
                path.key("id"),
                format!("Domain \"{id}\" is declared more than once"),
            ));
            continue;
        }
        drafts.push(DomainDraft {
            id,
            queue,
            events,
            listeners,
        });
    }
    drafts
}

/// Register nested events into the ownership index, enforcing the global
/// uniqueness rule. Duplicate declarations that are deep-structurally equal
/// and share an owner collapse into one.
fn register_nested_events(
    drafts: &mut [DomainDraft],
    issues: &mut Vec<ValidationIssue>,
) -> IndexMap<String, usize> {
    let mut owners: IndexMap<String, usize> = IndexMap::new();
    let mut rejected: Vec<(usize, usize)> = Vec::new();

    for (di, draft) in drafts.iter().enumerate() {
        for (ei, event) in draft.events.iter().enumerate() {
            match owners.get(&event.name) {
                None => {
                    owners.insert(event.name.clone(), di);
                }
                Some(&owner_di) => {
                    let duplicate_of_same = owner_di == di
                        && drafts[owner_di]
                            .events
                            .iter()
                            .take(ei)
                            .any(|e| e == event);
                    if duplicate_of_same {
                        rejected.push((di, ei));
                    } else {
                        issues.push(ValidationIssue::new(
                            IssuePath::root()
                                .key("domains")
                                .index(di)
                                .key("events")
                                .index(ei),
                            format!(
                                "Event \"{}\" is declared more than once with different definitions",
                                event.name
                            ),
                        ));
                        rejected.push((di, ei));
                    }
                }
            }
        }
    }

    for (di, ei) in rejected.into_iter().rev() {
        drafts[di].events.remove(ei);
    }
    owners
}

fn merge_flat_events(
    doc: &Map<String, Value>,
    root: &IssuePath,
    drafts: &mut [DomainDraft],
    owners: &mut IndexMap<String, usize>,
    issues: &mut Vec<ValidationIssue>,
) {
    let events_path = root.key("events");
    let Some(value) = doc.get("events") else {
        return;
    };
    let Some(entries) = value.as_array() else {
        issues.push(ValidationIssue::new(
            events_path,
            "Field \"events\" must be an array",
        ));
        return;
    };

    for (i, entry) in entries.iter().enumerate() {
        let path = events_path.index(i);
        let Some(obj) = entry.as_object() else {
            issues.push(ValidationIssue::new(path, "Event must be a JSON object"));
            continue;
        };
        let Some(event) = parse_event(obj, &path, issues) else {
            continue;
        };
        let Some(domain_id) = require_non_empty_string(obj, "domain", &path, issues) else {
            continue;
        };
        let Some(di) = drafts.iter().position(|d| d.id == domain_id) else {
            issues.push(ValidationIssue::new(
                path.key("domain"),
                format!("Unknown domain \"{domain_id}\""),
            ));
            continue;
        };

        match owners.get(&event.name) {
            None => {
                owners.insert(event.name.clone(), di);
                drafts[di].events.push(event);
            }
            Some(&owner_di) => {
                let existing = drafts[owner_di].events.iter().find(|e| e.name == event.name);
                if owner_di == di && existing == Some(&event) {
                    // Identical re-declaration across the two forms; merge
                } else {
                    issues.push(ValidationIssue::new(
                        path,
                        format!(
                            "Event \"{}\" is declared more than once with different definitions",
                            event.name
                        ),
                    ));
                }
            }
        }
    }
}

fn merge_flat_listeners(
    doc: &Map<String, Value>,
    root: &IssuePath,
    drafts: &mut [DomainDraft],
    issues: &mut Vec<ValidationIssue>,
) {
    let listeners_path = root.key("listeners");
    let Some(value) = doc.get("listeners") else {
        return;
    };
    let Some(entries) = value.as_array() else {
        issues.push(ValidationIssue::new(
            listeners_path,
            "Field \"listeners\" must be an array",
        ));
        return;
    };

    for (i, entry) in entries.iter().enumerate() {
        let path = listeners_path.index(i);
        let Some(obj) = entry.as_object() else {
            issues.push(ValidationIssue::new(path, "Listener must be a JSON object"));
            continue;
        };
        let listener = parse_listener(obj, &path, issues);
        let Some(domain_id) = require_non_empty_string(obj, "domain", &path, issues) else {
            continue;
        };
        let Some(listener) = listener else {
            continue;
        };
        match drafts.iter_mut().find(|d| d.id == domain_id) {
            Some(draft) => draft.listeners.push((listener, path)),
            None => issues.push(ValidationIssue::new(
                path.key("domain"),
                format!("Unknown domain \"{domain_id}\""),
            )),
        }
    }
}

fn check_listener_ids(drafts: &[DomainDraft], issues: &mut Vec<ValidationIssue>) {
    let mut seen: IndexMap<&str, ()> = IndexMap::new();
    for draft in drafts {
        for (listener, path) in &draft.listeners {
            if seen.insert(listener.id.as_str(), ()).is_some() {
                issues.push(ValidationIssue::new(
                    path.key("id"),
                    format!("Listener \"{}\" is declared more than once", listener.id),
                ));
            }
        }
    }
}

fn schema_of<'a>(
    drafts: &'a [DomainDraft],
    owners: &IndexMap<String, usize>,
    event_name: &str,
) -> Option<&'a PayloadSchema> {
    let &di = owners.get(event_name)?;
    drafts[di]
        .events
        .iter()
        .find(|e| e.name == event_name)
        .map(|e| &e.payload_schema)
}

fn check_cross_references(
    drafts: &[DomainDraft],
    owners: &IndexMap<String, usize>,
    issues: &mut Vec<ValidationIssue>,
) {
    for draft in drafts {
        for (listener, lpath) in &draft.listeners {
            let trigger = listener.on.event.as_str();
            if !owners.contains_key(trigger) {
                issues.push(ValidationIssue::new(
                    lpath.key("on").key("event"),
                    format!("Unknown event \"{trigger}\""),
                ));
            }

            for (ai, action) in listener.actions.iter().enumerate() {
                let Action::Emit {
                    event,
                    to_domain,
                    mapping,
                } = action
                else {
                    continue;
                };
                let apath = lpath.key("actions").index(ai);

                let Some(&owner_di) = owners.get(event.as_str()) else {
                    issues.push(ValidationIssue::new(
                        apath.key("event"),
                        format!("Unknown event \"{event}\""),
                    ));
                    continue;
                };
                let owner_id = drafts[owner_di].id.as_str();
                if let Some(target) = to_domain {
                    if target != owner_id {
                        issues.push(ValidationIssue::new(
                            apath.key("toDomain"),
                            format!(
                                "Event \"{event}\" is owned by domain \"{owner_id}\", not \"{target}\""
                            ),
                        ));
                    }
                }

                let source = schema_of(drafts, owners, trigger);
                let dest = schema_of(drafts, owners, event);
                if let (Some(source), Some(dest)) = (source, dest) {
                    check_mapping(mapping, source, dest, event, &apath, issues);
                }
            }
        }
    }
}

fn collect_events(
    value: Option<&Value>,
    path: &IssuePath,
    issues: &mut Vec<ValidationIssue>,
) -> Vec<Event> {
    let Some(value) = value else {
        return Vec::new();
    };
    let Some(entries) = value.as_array() else {
        issues.push(ValidationIssue::new(
            path.clone(),
            "Field \"events\" must be an array",
        ));
        return Vec::new();
    };
    let mut events = Vec::new();
    for (i, entry) in entries.iter().enumerate() {
        let entry_path = path.index(i);
        let Some(obj) = entry.as_object() else {
            issues.push(ValidationIssue::new(entry_path, "Event must be a JSON object"));
            continue;
        };
        if let Some(parsed) = parse_event(obj, &entry_path, issues) {
            events.push(parsed);
        }
    }
    events
}

fn parse_event(
    obj: &Map<String, Value>,
    path: &IssuePath,
    issues: &mut Vec<ValidationIssue>,
) -> Option<Event> {
    let name = require_non_empty_string(obj, "name", path, issues);
    let schema_path = path.key("payloadSchema");
    let schema = match obj.get("payloadSchema") {
        Some(value) => parse_payload_schema(value, &schema_path, issues),
        None => {
            issues.push(ValidationIssue::new(
                schema_path,
                "Missing required field \"payloadSchema\"",
            ));
            None
        }
    };
    Some(Event {
        name: name?,
        payload_schema: schema?,
    })
}

fn parse_payload_schema(
    value: &Value,
    path: &IssuePath,
    issues: &mut Vec<ValidationIssue>,
) -> Option<PayloadSchema> {
    let Some(obj) = value.as_object() else {
        issues.push(ValidationIssue::new(
            path.clone(),
            "Field \"payloadSchema\" must be an object",
        ));
        return None;
    };

    let mut schema = PayloadSchema::new();
    let mut failed = false;
    for (field, field_value) in obj {
        let field_path = path.key(field);
        let parsed = match field_value {
            Value::String(tag) => match parse_field_type(tag) {
                Some(ty) => Some(FieldSchema::Scalar(ty)),
                None => {
                    issues.push(ValidationIssue::new(
                        field_path,
                        format!("Unknown payload type \"{tag}\""),
                    ));
                    None
                }
            },
            Value::Object(_) => {
                parse_flat_schema(field_value, &field_path, issues).map(FieldSchema::Object)
            }
            Value::Array(items) => parse_array_schema(items, &field_path, issues),
            _ => {
                issues.push(ValidationIssue::new(
                    field_path,
                    "Payload field schema must be a type tag, an object, or an array",
                ));
                None
            }
        };
        match parsed {
            Some(field_schema) => {
                schema.insert(field.clone(), field_schema);
            }
            None => failed = true,
        }
    }
    (!failed).then_some(schema)
}

fn parse_array_schema(
    items: &[Value],
    path: &IssuePath,
    issues: &mut Vec<ValidationIssue>,
) -> Option<FieldSchema> {
    if items.len() != 1 {
        issues.push(ValidationIssue::new(
            path.clone(),
            "Array schema must be a sequence with exactly one element object",
        ));
        return None;
    }
    let element_path = path.index(0);
    match &items[0] {
        Value::Array(_) => {
            issues.push(ValidationIssue::new(
                element_path,
                "Arrays of arrays are not supported",
            ));
            None
        }
        element @ Value::Object(_) => {
            parse_flat_schema(element, &element_path, issues).map(FieldSchema::ArrayOfObjects)
        }
        _ => {
            issues.push(ValidationIssue::new(
                element_path,
                "Array element schema must be a flat object of primitive types",
            ));
            None
        }
    }
}

fn parse_flat_schema(
    value: &Value,
    path: &IssuePath,
    issues: &mut Vec<ValidationIssue>,
) -> Option<FlatSchema> {
    let Some(obj) = value.as_object() else {
        issues.push(ValidationIssue::new(
            path.clone(),
            "Object schema must be a mapping of sub-field names to primitive types",
        ));
        return None;
    };
    let mut flat = FlatSchema::new();
    let mut failed = false;
    for (sub, sub_value) in obj {
        match sub_value.as_str().and_then(parse_field_type) {
            Some(ty) => {
                flat.insert(sub.clone(), ty);
            }
            None => {
                issues.push(ValidationIssue::new(
                    path.key(sub),
                    "Object sub-fields must be primitive type tags; deeper nesting is not supported",
                ));
                failed = true;
            }
        }
    }
    (!failed).then_some(flat)
}

fn parse_field_type(tag: &str) -> Option<FieldType> {
    match tag {
        "string" => Some(FieldType::String),
        "number" => Some(FieldType::Number),
        "boolean" => Some(FieldType::Boolean),
        _ => None,
    }
}

fn collect_listeners(
    value: Option<&Value>,
    path: &IssuePath,
    issues: &mut Vec<ValidationIssue>,
) -> Vec<(Listener, IssuePath)> {
    let Some(value) = value else {
        return Vec::new();
    };
    let Some(entries) = value.as_array() else {
        issues.push(ValidationIssue::new(
            path.clone(),
            "Field \"listeners\" must be an array",
        ));
        return Vec::new();
    };
    let mut listeners = Vec::new();
    for (i, entry) in entries.iter().enumerate() {
        let entry_path = path.index(i);
        let Some(obj) = entry.as_object() else {
            issues.push(ValidationIssue::new(
                entry_path,
                "Listener must be a JSON object",
            ));
            continue;
        };
        if let Some(listener) = parse_listener(obj, &entry_path, issues) {
            listeners.push((listener, entry_path));
        }
    }
    listeners
}

fn parse_listener(
    obj: &Map<String, Value>,
    path: &IssuePath,
    issues: &mut Vec<ValidationIssue>,
) -> Option<Listener> {
    let id = require_non_empty_string(obj, "id", path, issues);

    let on_path = path.key("on");
    let on = match obj.get("on").and_then(Value::as_object) {
        Some(on_obj) => {
            require_non_empty_string(on_obj, "event", &on_path, issues).map(|event| Trigger { event })
        }
        None => {
            issues.push(ValidationIssue::new(
                on_path,
                "Missing required field \"on\" with an \"event\" reference",
            ));
            None
        }
    };

    let delay_ms = match obj.get("delayMs") {
        None => Some(0),
        Some(value) => match value.as_u64() {
            Some(ms) => Some(ms),
            None => {
                issues.push(ValidationIssue::new(
                    path.key("delayMs"),
                    "Field \"delayMs\" must be a non-negative integer",
                ));
                None
            }
        },
    };

    let actions_path = path.key("actions");
    let actions = match obj.get("actions").and_then(Value::as_array) {
        Some(entries) if !entries.is_empty() => {
            let mut actions = Vec::new();
            let mut failed = false;
            for (ai, entry) in entries.iter().enumerate() {
                match parse_action(entry, &actions_path.index(ai), issues) {
                    Some(action) => actions.push(action),
                    None => failed = true,
                }
            }
            (!failed).then_some(actions)
        }
        _ => {
            issues.push(ValidationIssue::new(
                actions_path,
                "Field \"actions\" must be a non-empty array",
            ));
            None
        }
    };

    Some(Listener {
        id: id?,
        on: on?,
        delay_ms: delay_ms?,
        actions: actions?,
    })
}

fn parse_action(
    value: &Value,
    path: &IssuePath,
    issues: &mut Vec<ValidationIssue>,
) -> Option<Action> {
    let Some(obj) = value.as_object() else {
        issues.push(ValidationIssue::new(
            path.clone(),
            "Action must be a JSON object",
        ));
        return None;
    };
    let Some(kind) = obj.get("type").and_then(Value::as_str) else {
        issues.push(ValidationIssue::new(
            path.key("type"),
            "Missing action discriminator field \"type\"",
        ));
        return None;
    };

    match kind {
        "set-state" => {
            let status = require_non_empty_string(obj, "status", path, issues)?;
            Some(Action::SetState { status })
        }
        "emit" => {
            let event = require_non_empty_string(obj, "event", path, issues);
            let to_domain = match obj.get("toDomain") {
                None => Some(None),
                Some(value) => match value.as_str() {
                    Some(domain) => Some(Some(domain.to_string())),
                    None => {
                        issues.push(ValidationIssue::new(
                            path.key("toDomain"),
                            "Field \"toDomain\" must be a string",
                        ));
                        None
                    }
                },
            };
            let mapping_path = path.key("mapping");
            let mapping = match obj.get("mapping").and_then(Value::as_object) {
                Some(entries) => parse_emit_mapping(entries, &mapping_path, issues),
                None => {
                    issues.push(ValidationIssue::new(
                        mapping_path,
                        "Missing required field \"mapping\"",
                    ));
                    None
                }
            };
            Some(Action::Emit {
                event: event?,
                to_domain: to_domain?,
                mapping: mapping?,
            })
        }
        other => {
            issues.push(ValidationIssue::new(
                path.key("type"),
                format!("Unknown action type \"{other}\""),
            ));
            None
        }
    }
}

fn parse_emit_mapping(
    entries: &Map<String, Value>,
    path: &IssuePath,
    issues: &mut Vec<ValidationIssue>,
) -> Option<EmitMapping> {
    let mut mapping = EmitMapping::new();
    let mut failed = false;
    for (dest, value) in entries {
        match parse_field_mapping(value, &path.key(dest), issues) {
            Some(field_mapping) => {
                mapping.insert(dest.clone(), field_mapping);
            }
            None => failed = true,
        }
    }
    (!failed).then_some(mapping)
}

fn parse_field_mapping(
    value: &Value,
    path: &IssuePath,
    issues: &mut Vec<ValidationIssue>,
) -> Option<FieldMapping> {
    match value {
        Value::String(from) => Some(FieldMapping::Scalar(ScalarMapping::From(from.clone()))),
        Value::Object(obj) => {
            if obj.contains_key("arrayFrom") {
                let array_from = require_non_empty_string(obj, "arrayFrom", path, issues);
                let map = parse_scalar_map(obj, path, issues);
                Some(FieldMapping::Array {
                    array_from: array_from?,
                    map: map?,
                })
            } else if obj.contains_key("map") {
                let object_from = match obj.get("objectFrom") {
                    None => Some(None),
                    Some(value) => match value.as_str() {
                        Some(from) => Some(Some(from.to_string())),
                        None => {
                            issues.push(ValidationIssue::new(
                                path.key("objectFrom"),
                                "Field \"objectFrom\" must be a string",
                            ));
                            None
                        }
                    },
                };
                let map = parse_scalar_map(obj, path, issues);
                Some(FieldMapping::Object {
                    object_from: object_from?,
                    map: map?,
                })
            } else {
                parse_scalar_mapping(value, path, issues).map(FieldMapping::Scalar)
            }
        }
        _ => {
            issues.push(ValidationIssue::new(
                path.clone(),
                "Field mapping must be a source field name or a mapping object",
            ));
            None
        }
    }
}

fn parse_scalar_map(
    obj: &Map<String, Value>,
    path: &IssuePath,
    issues: &mut Vec<ValidationIssue>,
) -> Option<IndexMap<String, ScalarMapping>> {
    let map_path = path.key("map");
    let Some(entries) = obj.get("map").and_then(Value::as_object) else {
        issues.push(ValidationIssue::new(
            map_path,
            "Missing required field \"map\"",
        ));
        return None;
    };
    let mut map = IndexMap::new();
    let mut failed = false;
    for (dest, value) in entries {
        match parse_scalar_mapping(value, &map_path.key(dest), issues) {
            Some(scalar) => {
                map.insert(dest.clone(), scalar);
            }
            None => failed = true,
        }
    }
    (!failed).then_some(map)
}

fn parse_scalar_mapping(
    value: &Value,
    path: &IssuePath,
    issues: &mut Vec<ValidationIssue>,
) -> Option<ScalarMapping> {
    match value {
        Value::String(from) => Some(ScalarMapping::From(from.clone())),
        Value::Object(obj) => {
            if let Some(constant) = obj.get("const") {
                if constant.is_string() || constant.is_number() || constant.is_boolean() {
                    Some(ScalarMapping::Const {
                        value: constant.clone(),
                    })
                } else {
                    issues.push(ValidationIssue::new(
                        path.key("const"),
                        "Constant must be a scalar value",
                    ));
                    None
                }
            } else if let Some(from) = obj.get("from") {
                match from.as_str() {
                    Some(from) if !from.is_empty() => Some(ScalarMapping::From(from.to_string())),
                    _ => {
                        issues.push(ValidationIssue::new(
                            path.key("from"),
                            "Field \"from\" must be a non-empty string",
                        ));
                        None
                    }
                }
            } else {
                issues.push(ValidationIssue::new(
                    path.clone(),
                    "Scalar mapping must be a source field name, {\"from\": ...} or {\"const\": ...}",
                ));
                None
            }
        }
        _ => {
            issues.push(ValidationIssue::new(
                path.clone(),
                "Scalar mapping must be a source field name, {\"from\": ...} or {\"const\": ...}",
            ));
            None
        }
    }
}

fn require_non_empty_string(
    obj: &Map<String, Value>,
    key: &str,
    path: &IssuePath,
    issues: &mut Vec<ValidationIssue>,
) -> Option<String> {
    match obj.get(key) {
        None => {
            issues.push(ValidationIssue::new(
                path.key(key),
                format!("Missing required field \"{key}\""),
            ));
            None
        }
        Some(value) => match value.as_str() {
            Some(s) if !s.is_empty() => Some(s.to_string()),
            _ => {
                issues.push(ValidationIssue::new(
                    path.key(key),
                    format!("Field \"{key}\" must be a non-empty string"),
                ));
                None
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn issues_of(value: Value) -> Vec<ValidationIssue> {
        match validate_scenario(&value) {
            Ok(_) => Vec::new(),
            Err(err) => err.issues,
        }
    }

    fn paths_of(value: Value) -> Vec<String> {
        issues_of(value)
            .iter()
            .map(|i| i.path.to_string())
            .collect()
    }

    #[test]
    fn accepts_minimal_nested_scenario() {
        let scenario = validate_scenario(&json!({
            "name": "shop",
            "version": 3,
            "domains": [{
                "id": "order",
                "queue": "order-q",
                "events": [{
                    "name": "OrderCreated",
                    "payloadSchema": {"orderId": "string", "amount": "number"}
                }],
                "listeners": [{
                    "id": "on-order",
                    "on": {"event": "OrderCreated"},
                    "actions": [{"type": "set-state", "status": "CREATED"}]
                }]
            }]
        }))
        .unwrap();

        assert_eq!(scenario.name, "shop");
        assert_eq!(scenario.version, 3);
        assert_eq!(scenario.event("OrderCreated").unwrap().1, "order");
    }

    #[test]
    fn rejects_non_object_document() {
        let err = validate_scenario(&json!([1, 2])).unwrap_err();
        assert_eq!(err.issues.len(), 1);
    }

    #[test]
    fn collects_all_top_level_issues_at_once() {
        let paths = paths_of(json!({
            "version": -1,
            "domains": []
        }));
        assert!(paths.contains(&"/name".to_string()));
        assert!(paths.contains(&"/version".to_string()));
        assert!(paths.contains(&"/domains".to_string()));
    }

    #[test]
    fn rejects_scalar_array_tags_and_nested_arrays() {
        let paths = paths_of(json!({
            "name": "bad-schemas",
            "version": 0,
            "domains": [{
                "id": "d",
                "queue": "q",
                "events": [{
                    "name": "E",
                    "payloadSchema": {
                        "tags": "string[]",
                        "grid": [[{"x": "number"}]],
                        "deep": {"inner": {"too": "string"}}
                    }
                }]
            }]
        }));
        assert_eq!(
            paths,
            vec![
                "/domains/0/events/0/payloadSchema/tags",
                "/domains/0/events/0/payloadSchema/grid/0",
                "/domains/0/events/0/payloadSchema/deep/inner",
            ]
        );
    }

    #[test]
    fn rejects_unknown_listener_trigger() {
        let paths = paths_of(json!({
            "name": "s",
            "version": 0,
            "domains": [{
                "id": "d",
                "queue": "q",
                "listeners": [{
                    "id": "l",
                    "on": {"event": "Ghost"},
                    "actions": [{"type": "set-state", "status": "X"}]
                }]
            }]
        }));
        assert_eq!(paths, vec!["/domains/0/listeners/0/on/event"]);
    }

    #[test]
    fn rejects_to_domain_not_owning_the_event() {
        let paths = paths_of(json!({
            "name": "s",
            "version": 0,
            "domains": [
                {
                    "id": "order",
                    "queue": "order-q",
                    "events": [{
                        "name": "OrderCreated",
                        "payloadSchema": {"orderId": "string"}
                    }]
                },
                {
                    "id": "payment",
                    "queue": "payment-q",
                    "events": [{
                        "name": "PaymentRequested",
                        "payloadSchema": {"orderId": "string"}
                    }]
                }
            ],
            "listeners": [{
                "id": "relay",
                "domain": "order",
                "on": {"event": "OrderCreated"},
                "actions": [{
                    "type": "emit",
                    "event": "PaymentRequested",
                    "toDomain": "ghost",
                    "mapping": {"orderId": "orderId"}
                }]
            }]
        }));
        assert_eq!(paths, vec!["/listeners/0/actions/0/toDomain"]);
    }

    #[test]
    fn duplicate_listener_ids_are_always_rejected() {
        let listener = json!({
            "id": "dup",
            "on": {"event": "E"},
            "actions": [{"type": "set-state", "status": "X"}]
        });
        let issues = issues_of(json!({
            "name": "s",
            "version": 0,
            "domains": [{
                "id": "d",
                "queue": "q",
                "events": [{"name": "E", "payloadSchema": {"x": "string"}}],
                "listeners": [listener.clone(), listener]
            }]
        }));
        assert_eq!(issues.len(), 1);
        assert!(issues[0]
            .message
            .contains("Listener \"dup\" is declared more than once"));
    }

    #[test]
    fn flat_and_nested_forms_normalize_identically() {
        let nested = validate_scenario(&json!({
            "name": "shop",
            "version": 1,
            "domains": [{
                "id": "order",
                "queue": "order-q",
                "events": [{
                    "name": "OrderCreated",
                    "payloadSchema": {"orderId": "string"}
                }],
                "listeners": [{
                    "id": "on-order",
                    "on": {"event": "OrderCreated"},
                    "actions": [{"type": "set-state", "status": "CREATED"}]
                }]
            }]
        }))
        .unwrap();

        let flat = validate_scenario(&json!({
            "name": "shop",
            "version": 1,
            "domains": [{"id": "order", "queue": "order-q"}],
            "events": [{
                "name": "OrderCreated",
                "domain": "order",
                "payloadSchema": {"orderId": "string"}
            }],
            "listeners": [{
                "id": "on-order",
                "domain": "order",
                "on": {"event": "OrderCreated"},
                "actions": [{"type": "set-state", "status": "CREATED"}]
            }]
        }))
        .unwrap();

        assert_eq!(nested.to_value(), flat.to_value());
    }

    #[test]
    fn identical_duplicate_event_across_forms_merges() {
        let event = json!({"name": "OrderCreated", "payloadSchema": {"orderId": "string"}});
        let scenario = validate_scenario(&json!({
            "name": "shop",
            "version": 1,
            "domains": [{
                "id": "order",
                "queue": "order-q",
                "events": [event]
            }],
            "events": [{
                "name": "OrderCreated",
                "domain": "order",
                "payloadSchema": {"orderId": "string"}
            }]
        }))
        .unwrap();
        assert_eq!(scenario.event_names().collect::<Vec<_>>(), vec!["OrderCreated"]);
        assert_eq!(scenario.domains[0].events.len(), 1);
    }

    #[test]
    fn differing_duplicate_event_is_rejected() {
        let err = validate_scenario(&json!({
            "name": "shop",
            "version": 1,
            "domains": [{
                "id": "order",
                "queue": "order-q",
                "events": [{"name": "OrderCreated", "payloadSchema": {"orderId": "string"}}]
            }],
            "events": [{
                "name": "OrderCreated",
                "domain": "order",
                "payloadSchema": {"orderId": "number"}
            }]
        }))
        .unwrap_err();
        assert_eq!(err.issues.len(), 1);
        assert!(err.issues[0]
            .message
            .contains("declared more than once with different definitions"));
    }

    #[test]
    fn mapping_type_mismatch_is_a_validation_issue() {
        let paths = paths_of(json!({
            "name": "s",
            "version": 0,
            "domains": [
                {
                    "id": "order",
                    "queue": "order-q",
                    "events": [{
                        "name": "OrderCreated",
                        "payloadSchema": {"orderId": "string", "amount": "number"}
                    }],
                    "listeners": [{
                        "id": "relay",
                        "on": {"event": "OrderCreated"},
                        "actions": [{
                            "type": "emit",
                            "event": "PaymentRequested",
                            "mapping": {"orderId": "amount", "amount": "amount"}
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
        }));
        assert_eq!(
            paths,
            vec!["/domains/0/listeners/0/actions/0/mapping/orderId"]
        );
    }

    #[test]
    fn unknown_emit_event_is_reported_once_per_action() {
        let paths = paths_of(json!({
            "name": "s",
            "version": 0,
            "domains": [{
                "id": "d",
                "queue": "q",
                "events": [{"name": "E", "payloadSchema": {"x": "string"}}],
                "listeners": [{
                    "id": "l",
                    "on": {"event": "E"},
                    "actions": [{
                        "type": "emit",
                        "event": "Ghost",
                        "mapping": {}
                    }]
                }]
            }]
        }));
        assert_eq!(paths, vec!["/domains/0/listeners/0/actions/0/event"]);
    }

    #[test]
    fn version_is_preserved_through_round_trip() {
        let doc = json!({
            "name": "shop",
            "version": 41,
            "domains": [{
                "id": "order",
                "queue": "order-q",
                "events": [{"name": "E", "payloadSchema": {"x": "boolean"}}]
            }]
        });
        let scenario = validate_scenario(&doc).unwrap();
        let reparsed = validate_scenario(&scenario.to_value()).unwrap();
        assert_eq!(reparsed.version, 41);
        assert_eq!(scenario.to_value(), reparsed.to_value());
    }
}
