//! Conversion of JSON-shaped documents into validated value types.
//!
//! Parsing is split into two passes on purpose:
//!
//! 1. [`parse_type_template`] / [`parse_pack`] do *structural* validation —
//!    required keys, closed tag sets, name shapes, size limits, duplicate
//!    detection — and produce typed [`ParseError`]s.
//! 2. [`validate_type_template`] does the *cross-reference* pass (dangling
//!    states and fields) and returns plain error strings.
//!
//! The split exists because the pack loader iterating trusted built-in data
//! only needs the structural pass, while installing an untrusted pack needs
//! both. Unknown top-level keys are silently ignored for forward
//! compatibility.

use std::collections::HashSet;

use serde_json::{Map, Value};

use crate::error::ParseError;
use crate::model::{
    Category, Enforcement, FieldSchema, FieldType, MAX_FIELDS, MAX_STATES, MAX_TRANSITIONS,
    PackGuide, StateDefinition, TransitionDefinition, TypeTemplate, WorkflowPack,
};

const GUIDE_OVERVIEW_WORDS: usize = 50;
const GUIDE_WHEN_TO_USE_WORDS: usize = 30;
const GUIDE_MIN_TIPS: usize = 3;
const GUIDE_MIN_MISTAKES: usize = 2;

fn object<'a>(value: &'a Value, context: &str) -> Result<&'a Map<String, Value>, ParseError> {
    value.as_object().ok_or_else(|| ParseError::NotAnObject {
        context: context.to_string(),
    })
}

fn require_str<'a>(
    obj: &'a Map<String, Value>,
    key: &'static str,
    context: &str,
) -> Result<&'a str, ParseError> {
    match obj.get(key) {
        None => Err(ParseError::MissingKey {
            key,
            context: context.to_string(),
        }),
        Some(value) => value.as_str().ok_or_else(|| ParseError::WrongType {
            key,
            expected: "string",
            context: context.to_string(),
        }),
    }
}

fn optional_str<'a>(
    obj: &'a Map<String, Value>,
    key: &'static str,
    context: &str,
) -> Result<Option<&'a str>, ParseError> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_str()
            .map(Some)
            .ok_or_else(|| ParseError::WrongType {
                key,
                expected: "string",
                context: context.to_string(),
            }),
    }
}

fn require_array<'a>(
    obj: &'a Map<String, Value>,
    key: &'static str,
    context: &str,
) -> Result<&'a [Value], ParseError> {
    match obj.get(key) {
        None => Err(ParseError::MissingKey {
            key,
            context: context.to_string(),
        }),
        Some(value) => value
            .as_array()
            .map(Vec::as_slice)
            .ok_or_else(|| ParseError::WrongType {
                key,
                expected: "array",
                context: context.to_string(),
            }),
    }
}

/// Missing key or `null` defaults to the empty sequence.
fn string_array(
    obj: &Map<String, Value>,
    key: &'static str,
    context: &str,
) -> Result<Vec<String>, ParseError> {
    let items = match obj.get(key) {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(value) => value.as_array().ok_or_else(|| ParseError::WrongType {
            key,
            expected: "array",
            context: context.to_string(),
        })?,
    };
    items
        .iter()
        .map(|item| {
            item.as_str()
                .map(str::to_string)
                .ok_or_else(|| ParseError::WrongType {
                    key,
                    expected: "array of strings",
                    context: context.to_string(),
                })
        })
        .collect()
}

fn value_array(
    obj: &Map<String, Value>,
    key: &'static str,
    context: &str,
) -> Result<Vec<Value>, ParseError> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(value) => value
            .as_array()
            .cloned()
            .ok_or_else(|| ParseError::WrongType {
                key,
                expected: "array",
                context: context.to_string(),
            }),
    }
}

/// Converts a type template document into a [`TypeTemplate`].
///
/// Required keys: `type`, `display_name`, `states`, `initial_state`,
/// `transitions`, `fields_schema`. A transition's `enforcement` defaults to
/// `soft` when absent, matching the engine's soft-by-default posture.
///
/// # Errors
///
/// Typed [`ParseError`]s for missing or mistyped keys, unknown tags,
/// invalid state names, oversized collections, and duplicate
/// state/field/transition declarations. Cross-reference problems are *not*
/// reported here; run [`validate_type_template`] for those.
///
/// # Examples
///
/// ```rust
/// use serde_json::json;
/// use workflow_templates::parse::parse_type_template;
///
/// let doc = json!({
///     "type": "note",
///     "display_name": "Note",
///     "states": [
///         {"name": "open", "category": "open"},
///         {"name": "done", "category": "done"},
///     ],
///     "initial_state": "open",
///     "transitions": [{"from": "open", "to": "done", "enforcement": "soft"}],
///     "fields_schema": [],
/// });
/// let template = parse_type_template(&doc).expect("well-formed document");
/// assert_eq!(template.states.len(), 2);
/// ```
pub fn parse_type_template(value: &Value) -> Result<TypeTemplate, ParseError> {
    let obj = object(value, "type template")?;
    let name = require_str(obj, "type", "type template")?.to_string();
    let context = format!("type template '{}'", name);

    let display_name = require_str(obj, "display_name", &context)?.to_string();
    let description = optional_str(obj, "description", &context)?
        .unwrap_or_default()
        .to_string();
    let pack = optional_str(obj, "pack", &context)?
        .unwrap_or_default()
        .to_string();

    let raw_states = require_array(obj, "states", &context)?;
    if raw_states.len() > MAX_STATES {
        return Err(ParseError::Oversized {
            what: "states",
            count: raw_states.len(),
            limit: MAX_STATES,
        });
    }
    let mut states: Vec<StateDefinition> = Vec::with_capacity(raw_states.len());
    for raw in raw_states {
        let sobj = object(raw, &format!("{} state entry", context))?;
        let state_name = require_str(sobj, "name", &format!("{} state entry", context))?;
        let tag = require_str(sobj, "category", &format!("state '{}'", state_name))?;
        let category = Category::parse(tag).ok_or_else(|| ParseError::UnknownCategory {
            state: state_name.to_string(),
            value: tag.to_string(),
        })?;
        if states.iter().any(|s| s.name == state_name) {
            return Err(ParseError::DuplicateState {
                name: state_name.to_string(),
            });
        }
        states.push(StateDefinition::new(state_name, category)?);
    }

    let initial_state = require_str(obj, "initial_state", &context)?.to_string();

    let raw_transitions = require_array(obj, "transitions", &context)?;
    if raw_transitions.len() > MAX_TRANSITIONS {
        return Err(ParseError::Oversized {
            what: "transitions",
            count: raw_transitions.len(),
            limit: MAX_TRANSITIONS,
        });
    }
    let mut transitions: Vec<TransitionDefinition> = Vec::with_capacity(raw_transitions.len());
    for raw in raw_transitions {
        let tobj = object(raw, &format!("{} transition entry", context))?;
        let tctx = format!("{} transition entry", context);
        let from = require_str(tobj, "from", &tctx)?.to_string();
        let to = require_str(tobj, "to", &tctx)?.to_string();
        let enforcement = match optional_str(tobj, "enforcement", &tctx)? {
            None => Enforcement::Soft,
            Some(tag) => {
                Enforcement::parse(tag).ok_or_else(|| ParseError::UnknownEnforcement {
                    from: from.clone(),
                    to: to.clone(),
                    value: tag.to_string(),
                })?
            }
        };
        let requires_fields = string_array(tobj, "requires_fields", &tctx)?;
        if transitions.iter().any(|t| t.from == from && t.to == to) {
            return Err(ParseError::DuplicateTransition { from, to });
        }
        transitions.push(TransitionDefinition::new(from, to, enforcement, requires_fields));
    }

    let raw_fields = require_array(obj, "fields_schema", &context)?;
    if raw_fields.len() > MAX_FIELDS {
        return Err(ParseError::Oversized {
            what: "fields",
            count: raw_fields.len(),
            limit: MAX_FIELDS,
        });
    }
    let mut fields_schema: Vec<FieldSchema> = Vec::with_capacity(raw_fields.len());
    for raw in raw_fields {
        let fobj = object(raw, &format!("{} field entry", context))?;
        let fctx = format!("{} field entry", context);
        let field_name = require_str(fobj, "name", &fctx)?.to_string();
        let tag = require_str(fobj, "type", &format!("field '{}'", field_name))?;
        let field_type = FieldType::parse(tag).ok_or_else(|| ParseError::UnknownFieldType {
            field: field_name.clone(),
            value: tag.to_string(),
        })?;
        if fields_schema.iter().any(|f| f.name == field_name) {
            return Err(ParseError::DuplicateField { name: field_name });
        }
        let description = optional_str(fobj, "description", &fctx)?
            .unwrap_or_default()
            .to_string();
        let options = string_array(fobj, "options", &fctx)?;
        let default = fobj.get("default").filter(|v| !v.is_null()).cloned();
        let required_at = string_array(fobj, "required_at", &fctx)?;
        fields_schema.push(FieldSchema {
            name: field_name,
            field_type,
            description,
            options,
            default,
            required_at,
        });
    }

    let suggested_children = string_array(obj, "suggested_children", &context)?;
    let suggested_labels = string_array(obj, "suggested_labels", &context)?;

    Ok(TypeTemplate {
        name,
        display_name,
        description,
        pack,
        states,
        initial_state,
        transitions,
        fields_schema,
        suggested_children,
        suggested_labels,
    })
}

/// Cross-reference pass over an already-parsed template.
///
/// Checks that `initial_state` and every transition endpoint name a
/// declared state, that every `requires_fields` entry names a declared
/// field, and that every `required_at` entry names a declared state. An
/// empty result signals validity.
pub fn validate_type_template(template: &TypeTemplate) -> Vec<String> {
    let mut errors = Vec::new();
    let state_names: HashSet<&str> = template.states.iter().map(|s| s.name.as_str()).collect();
    let field_names: HashSet<&str> = template
        .fields_schema
        .iter()
        .map(|f| f.name.as_str())
        .collect();

    if !state_names.contains(template.initial_state.as_str()) {
        errors.push(format!(
            "initial state '{}' is not a declared state",
            template.initial_state
        ));
    }
    for transition in &template.transitions {
        for endpoint in [&transition.from, &transition.to] {
            if !state_names.contains(endpoint.as_str()) {
                errors.push(format!(
                    "transition '{}' -> '{}' references undeclared state '{}'",
                    transition.from, transition.to, endpoint
                ));
            }
        }
        for field in &transition.requires_fields {
            if !field_names.contains(field.as_str()) {
                errors.push(format!(
                    "transition '{}' -> '{}' requires undeclared field '{}'",
                    transition.from, transition.to, field
                ));
            }
        }
    }
    for field in &template.fields_schema {
        for state in &field.required_at {
            if !state_names.contains(state.as_str()) {
                errors.push(format!(
                    "field '{}' is required at undeclared state '{}'",
                    field.name, state
                ));
            }
        }
    }
    errors
}

/// Cross-reference pass over every type in a pack.
///
/// Error strings are prefixed with the owning type name so an installer can
/// report them against the offending template.
pub fn validate_pack(pack: &WorkflowPack) -> Vec<String> {
    let mut errors = Vec::new();
    for (type_name, template) in &pack.types {
        for error in validate_type_template(template) {
            errors.push(format!("type '{}': {}", type_name, error));
        }
    }
    errors
}

/// Converts a pack document into a [`WorkflowPack`].
///
/// The pack document wraps a `types` mapping and adds `version`,
/// `requires_packs`, `relationships`, `cross_pack_relationships`, and an
/// optional `guide`. Every type's `pack` key must either be absent (it is
/// filled in) or match the enclosing pack name, and each entry in `types`
/// must sit under its own type name.
pub fn parse_pack(value: &Value) -> Result<WorkflowPack, ParseError> {
    let obj = object(value, "pack document")?;
    let name = require_str(obj, "name", "pack document")?.to_string();
    let context = format!("pack '{}'", name);

    let version = require_str(obj, "version", &context)?.to_string();
    let display_name = optional_str(obj, "display_name", &context)?
        .unwrap_or_default()
        .to_string();
    let description = optional_str(obj, "description", &context)?
        .unwrap_or_default()
        .to_string();
    let requires_packs = string_array(obj, "requires_packs", &context)?;
    let relationships = value_array(obj, "relationships", &context)?;
    let cross_pack_relationships = value_array(obj, "cross_pack_relationships", &context)?;

    let mut types = std::collections::BTreeMap::new();
    if let Some(raw_types) = obj.get("types").filter(|v| !v.is_null()) {
        let types_obj = object(raw_types, &format!("{} types mapping", context))?;
        for (key, raw) in types_obj {
            let mut template = parse_type_template(raw)?;
            if template.name != *key {
                return Err(ParseError::PackMismatch {
                    pack: name,
                    type_name: key.clone(),
                    declared: template.name,
                });
            }
            if template.pack.is_empty() {
                template.pack = name.clone();
            } else if template.pack != name {
                return Err(ParseError::PackMismatch {
                    pack: name,
                    type_name: key.clone(),
                    declared: template.pack,
                });
            }
            types.insert(template.name.clone(), template);
        }
    }

    let guide = match obj.get("guide").filter(|v| !v.is_null()) {
        None => None,
        Some(raw) => Some(parse_guide(raw, &name)?),
    };

    Ok(WorkflowPack {
        name,
        version,
        display_name,
        description,
        types,
        requires_packs,
        relationships,
        cross_pack_relationships,
        guide,
    })
}

fn parse_guide(value: &Value, pack: &str) -> Result<PackGuide, ParseError> {
    let context = format!("pack '{}' guide", pack);
    let obj = object(value, &context)?;
    let state_diagram = require_str(obj, "state_diagram", &context)?.to_string();
    let overview = require_str(obj, "overview", &context)?.to_string();
    let when_to_use = require_str(obj, "when_to_use", &context)?.to_string();
    let tips = string_array(obj, "tips", &context)?;
    let common_mistakes = string_array(obj, "common_mistakes", &context)?;

    let invalid = |reason: String| ParseError::InvalidGuide {
        pack: pack.to_string(),
        reason,
    };
    let overview_words = overview.split_whitespace().count();
    if overview_words > GUIDE_OVERVIEW_WORDS {
        return Err(invalid(format!(
            "overview is {} words (limit {})",
            overview_words, GUIDE_OVERVIEW_WORDS
        )));
    }
    let when_words = when_to_use.split_whitespace().count();
    if when_words > GUIDE_WHEN_TO_USE_WORDS {
        return Err(invalid(format!(
            "when_to_use is {} words (limit {})",
            when_words, GUIDE_WHEN_TO_USE_WORDS
        )));
    }
    if tips.len() < GUIDE_MIN_TIPS {
        return Err(invalid(format!(
            "needs at least {} tips, found {}",
            GUIDE_MIN_TIPS,
            tips.len()
        )));
    }
    if common_mistakes.len() < GUIDE_MIN_MISTAKES {
        return Err(invalid(format!(
            "needs at least {} common mistakes, found {}",
            GUIDE_MIN_MISTAKES,
            common_mistakes.len()
        )));
    }

    Ok(PackGuide {
        state_diagram,
        overview,
        when_to_use,
        tips,
        common_mistakes,
    })
}
