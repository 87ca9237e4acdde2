// Copyright 2025 Cowboy AI, LLC.

//! Emit-mapping engine
//!
//! Two entry points share one traversal of the destination schema:
//!
//! - [`check_mapping`] runs at validation time against the *source event's
//!   schema*; every mismatch is a hard issue so mapping bugs surface while
//!   the scenario is authored.
//! - [`evaluate_mapping`] runs at dispatch time against a *concrete inbound
//!   payload*; mismatches produce warnings and the field is omitted, never
//!   aborting the evaluation. A listener with a buggy mapping still emits a
//!   best-effort envelope, because halting would strand the saga.
//!
//! Omission means the key is absent from the output record; `null` is never
//! written as a placeholder.

use crate::errors::{IssuePath, ValidationIssue};
use crate::scenario::{
    EmitMapping, FieldMapping, FieldSchema, FieldType, FlatSchema, PayloadSchema, ScalarMapping,
};
use serde_json::{Map, Value};

/// A non-fatal problem encountered while evaluating a mapping at dispatch
/// time. Carries a payload-relative path such as `"amount"`,
/// `"customer.name"` or `"lines[3].sku"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingWarning {
    /// Destination-payload path of the affected field
    pub path: String,
    /// What went wrong
    pub message: String,
}

impl MappingWarning {
    fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Where scalar source fields are resolved from during the static check:
/// the top level of the source event schema, or one flat record inside it.
enum SourceScope<'a> {
    Top(&'a PayloadSchema),
    Flat(&'a FlatSchema),
}

impl SourceScope<'_> {
    /// The declared primitive type of `field`, if it is declared and primitive.
    fn scalar_type(&self, field: &str) -> Result<FieldType, ScalarLookup> {
        match self {
            SourceScope::Top(schema) => match schema.get(field) {
                None => Err(ScalarLookup::Missing),
                Some(FieldSchema::Scalar(ty)) => Ok(*ty),
                Some(_) => Err(ScalarLookup::NotPrimitive),
            },
            SourceScope::Flat(flat) => flat.get(field).copied().ok_or(ScalarLookup::Missing),
        }
    }
}

enum ScalarLookup {
    Missing,
    NotPrimitive,
}

/// Statically type-check an emit mapping against the source and destination
/// event schemas. Issues are appended under `base` + `mapping`; the check
/// never short-circuits.
pub fn check_mapping(
    mapping: &EmitMapping,
    source: &PayloadSchema,
    dest: &PayloadSchema,
    dest_event: &str,
    base: &IssuePath,
    issues: &mut Vec<ValidationIssue>,
) {
    let mapping_path = base.key("mapping");

    for (dest_key, dest_schema) in dest {
        let path = mapping_path.key(dest_key);
        let Some(field_mapping) = mapping.get(dest_key) else {
            issues.push(ValidationIssue::new(
                path,
                format!("Field \"{dest_key}\" of event \"{dest_event}\" has no mapping"),
            ));
            continue;
        };

        match (dest_schema, field_mapping) {
            (FieldSchema::Scalar(expect), FieldMapping::Scalar(scalar)) => {
                check_scalar(scalar, &SourceScope::Top(source), *expect, &path, issues);
            }
            (FieldSchema::Scalar(_), _) => {
                issues.push(ValidationIssue::new(
                    path,
                    format!("Field \"{dest_key}\" is a primitive and expects a scalar mapping"),
                ));
            }
            (
                FieldSchema::Object(sub_schema),
                FieldMapping::Object { object_from, map },
            ) => {
                let scope = match object_from {
                    None => SourceScope::Top(source),
                    Some(from) => match source.get(from.as_str()) {
                        Some(FieldSchema::Object(flat)) => SourceScope::Flat(flat),
                        _ => {
                            issues.push(ValidationIssue::new(
                                path.key("objectFrom"),
                                format!(
                                    "Field \"{from}\" is not a flat object in the source payload schema"
                                ),
                            ));
                            continue;
                        }
                    },
                };
                check_sub_fields(map, sub_schema, &scope, dest_key, dest_event, &path, issues);
            }
            (FieldSchema::Object(_), _) => {
                issues.push(ValidationIssue::new(
                    path,
                    format!("Field \"{dest_key}\" is an object and expects an object mapping"),
                ));
            }
            (
                FieldSchema::ArrayOfObjects(sub_schema),
                FieldMapping::Array { array_from, map },
            ) => match source.get(array_from.as_str()) {
                Some(FieldSchema::ArrayOfObjects(flat)) => {
                    let scope = SourceScope::Flat(flat);
                    check_sub_fields(map, sub_schema, &scope, dest_key, dest_event, &path, issues);
                }
                _ => {
                    issues.push(ValidationIssue::new(
                        path.key("arrayFrom"),
                        format!(
                            "Field \"{array_from}\" is not an array of objects in the source payload schema"
                        ),
                    ));
                }
            },
            (FieldSchema::ArrayOfObjects(_), _) => {
                issues.push(ValidationIssue::new(
                    path,
                    format!("Field \"{dest_key}\" is an array and expects an array mapping"),
                ));
            }
        }
    }

    for mapped_key in mapping.keys() {
        if !dest.contains_key(mapped_key) {
            issues.push(ValidationIssue::new(
                mapping_path.key(mapped_key),
                format!(
                    "Field \"{mapped_key}\" is not declared in the payload schema of event \"{dest_event}\""
                ),
            ));
        }
    }
}

fn check_sub_fields(
    map: &indexmap::IndexMap<String, ScalarMapping>,
    sub_schema: &FlatSchema,
    scope: &SourceScope<'_>,
    dest_key: &str,
    dest_event: &str,
    path: &IssuePath,
    issues: &mut Vec<ValidationIssue>,
) {
    for (sub_key, expect) in sub_schema {
        let sub_path = path.key("map").key(sub_key);
        match map.get(sub_key) {
            None => issues.push(ValidationIssue::new(
                sub_path,
                format!(
                    "Field \"{dest_key}.{sub_key}\" of event \"{dest_event}\" has no mapping"
                ),
            )),
            Some(scalar) => check_scalar(scalar, scope, *expect, &sub_path, issues),
        }
    }
    for mapped_key in map.keys() {
        if !sub_schema.contains_key(mapped_key) {
            issues.push(ValidationIssue::new(
                path.key("map").key(mapped_key),
                format!(
                    "Field \"{dest_key}.{mapped_key}\" is not declared in the payload schema of event \"{dest_event}\""
                ),
            ));
        }
    }
}

fn check_scalar(
    scalar: &ScalarMapping,
    scope: &SourceScope<'_>,
    expect: FieldType,
    path: &IssuePath,
    issues: &mut Vec<ValidationIssue>,
) {
    match scalar {
        ScalarMapping::Const { value } => {
            if !expect.matches(value) {
                issues.push(ValidationIssue::new(
                    path.clone(),
                    format!("Constant {value} is not of type \"{expect}\""),
                ));
            }
        }
        ScalarMapping::From(from) => match scope.scalar_type(from) {
            Ok(found) if found == expect => {}
            Ok(found) => issues.push(ValidationIssue::new(
                path.clone(),
                format!(
                    "Field \"{from}\" has type \"{found}\" in the source but the destination expects \"{expect}\""
                ),
            )),
            Err(ScalarLookup::Missing) => issues.push(ValidationIssue::new(
                path.clone(),
                format!("Field \"{from}\" is not declared in the source payload schema"),
            )),
            Err(ScalarLookup::NotPrimitive) => issues.push(ValidationIssue::new(
                path.clone(),
                format!("Field \"{from}\" is not a primitive in the source payload schema"),
            )),
        },
    }
}

/// Evaluate an emit mapping against a concrete inbound payload, producing
/// the outbound payload and the warnings encountered along the way.
///
/// Missing or mismatched fields are omitted from the output; evaluation
/// itself never fails.
pub fn evaluate_mapping(
    mapping: &EmitMapping,
    source: &Map<String, Value>,
    dest: &PayloadSchema,
) -> (Map<String, Value>, Vec<MappingWarning>) {
    let mut out = Map::new();
    let mut warnings = Vec::new();

    for (dest_key, dest_schema) in dest {
        let Some(field_mapping) = mapping.get(dest_key) else {
            warnings.push(MappingWarning::new(
                dest_key,
                format!("Field \"{dest_key}\" has no mapping"),
            ));
            continue;
        };

        match (dest_schema, field_mapping) {
            (FieldSchema::Scalar(expect), FieldMapping::Scalar(scalar)) => {
                if let Some(value) = eval_scalar(scalar, source, *expect, dest_key, &mut warnings) {
                    out.insert(dest_key.clone(), value);
                }
            }
            (FieldSchema::Scalar(_), _) => {
                warnings.push(MappingWarning::new(
                    dest_key,
                    format!("Field \"{dest_key}\" is a primitive and expects a scalar mapping"),
                ));
            }
            (
                FieldSchema::Object(sub_schema),
                FieldMapping::Object { object_from, map },
            ) => {
                let base = match object_from {
                    None => source,
                    Some(from) => match source.get(from.as_str()) {
                        Some(Value::Object(record)) => record,
                        _ => {
                            warnings.push(MappingWarning::new(
                                dest_key,
                                format!("Field \"{from}\" is not an object in source payload"),
                            ));
                            continue;
                        }
                    },
                };
                check_sub_coverage(map, sub_schema, dest_key, &mut warnings);
                let mut record = Map::new();
                for (sub_key, expect) in sub_schema {
                    let Some(scalar) = map.get(sub_key) else {
                        continue;
                    };
                    let sub_path = format!("{dest_key}.{sub_key}");
                    if let Some(value) = eval_scalar(scalar, base, *expect, &sub_path, &mut warnings)
                    {
                        record.insert(sub_key.clone(), value);
                    }
                }
                out.insert(dest_key.clone(), Value::Object(record));
            }
            (FieldSchema::Object(_), _) => {
                warnings.push(MappingWarning::new(
                    dest_key,
                    format!("Field \"{dest_key}\" is an object and expects an object mapping"),
                ));
            }
            (
                FieldSchema::ArrayOfObjects(sub_schema),
                FieldMapping::Array { array_from, map },
            ) => {
                let Some(Value::Array(items)) = source.get(array_from.as_str()) else {
                    warnings.push(MappingWarning::new(
                        dest_key,
                        format!("Field \"{array_from}\" is not an array in source payload"),
                    ));
                    out.insert(dest_key.clone(), Value::Array(Vec::new()));
                    continue;
                };
                check_sub_coverage(map, sub_schema, dest_key, &mut warnings);
                let mut mapped_items = Vec::with_capacity(items.len());
                for (idx, item) in items.iter().enumerate() {
                    let Value::Object(record) = item else {
                        warnings.push(MappingWarning::new(
                            format!("{dest_key}[{idx}]"),
                            format!("Item {idx} of field \"{array_from}\" is not an object in source payload"),
                        ));
                        mapped_items.push(Value::Object(Map::new()));
                        continue;
                    };
                    let mut mapped = Map::new();
                    for (sub_key, expect) in sub_schema {
                        let Some(scalar) = map.get(sub_key) else {
                            continue;
                        };
                        let sub_path = format!("{dest_key}[{idx}].{sub_key}");
                        if let Some(value) =
                            eval_scalar(scalar, record, *expect, &sub_path, &mut warnings)
                        {
                            mapped.insert(sub_key.clone(), value);
                        }
                    }
                    mapped_items.push(Value::Object(mapped));
                }
                out.insert(dest_key.clone(), Value::Array(mapped_items));
            }
            (FieldSchema::ArrayOfObjects(_), _) => {
                warnings.push(MappingWarning::new(
                    dest_key,
                    format!("Field \"{dest_key}\" is an array and expects an array mapping"),
                ));
            }
        }
    }

    for mapped_key in mapping.keys() {
        if !dest.contains_key(mapped_key) {
            warnings.push(MappingWarning::new(
                mapped_key,
                format!("Field \"{mapped_key}\" is not declared in the destination schema"),
            ));
        }
    }

    (out, warnings)
}

/// Schema-level coverage warnings for object and array sub-mappings, issued
/// once rather than per item.
fn check_sub_coverage(
    map: &indexmap::IndexMap<String, ScalarMapping>,
    sub_schema: &FlatSchema,
    dest_key: &str,
    warnings: &mut Vec<MappingWarning>,
) {
    for sub_key in sub_schema.keys() {
        if !map.contains_key(sub_key) {
            warnings.push(MappingWarning::new(
                format!("{dest_key}.{sub_key}"),
                format!("Field \"{dest_key}.{sub_key}\" has no mapping"),
            ));
        }
    }
    for mapped_key in map.keys() {
        if !sub_schema.contains_key(mapped_key) {
            warnings.push(MappingWarning::new(
                format!("{dest_key}.{mapped_key}"),
                format!("Field \"{dest_key}.{mapped_key}\" is not declared in the destination schema"),
            ));
        }
    }
}

fn eval_scalar(
    scalar: &ScalarMapping,
    base: &Map<String, Value>,
    expect: FieldType,
    path: &str,
    warnings: &mut Vec<MappingWarning>,
) -> Option<Value> {
    match scalar {
        ScalarMapping::Const { value } => {
            if expect.matches(value) {
                Some(value.clone())
            } else {
                warnings.push(MappingWarning::new(
                    path,
                    format!("Constant {value} is not of type \"{expect}\""),
                ));
                None
            }
        }
        ScalarMapping::From(from) => match base.get(from.as_str()) {
            None => {
                warnings.push(MappingWarning::new(
                    path,
                    format!("Field \"{from}\" is missing in source payload"),
                ));
                None
            }
            Some(value) if expect.matches(value) => Some(value.clone()),
            Some(_) => {
                warnings.push(MappingWarning::new(
                    path,
                    format!("Field \"{from}\" is expected to be of type \"{expect}\" but is not"),
                ));
                None
            }
        },
    }
}
