//! Transition and field-requirement evaluation.
//!
//! This is the hot path: the item store calls into here on every mutation.
//! All lookups go through [`TypeIndex`], built once per type at load time,
//! so a single evaluation costs one or two hash probes plus a walk over the
//! (bounded) field schema. Evaluation is pure and never fails — impossible
//! requests come back as structured [`TransitionResult`]s.

use std::collections::HashMap;

use serde_json::Value;

use crate::model::{
    Category, Enforcement, FieldValues, TransitionDefinition, TransitionOption, TransitionResult,
    TypeTemplate,
};

/// Precomputed lookup structures for one type.
///
/// Built eagerly during load; never invalidated (templates are immutable).
/// Without these, categorizing N items against T templates costs Θ(N·T)
/// and summary generation degrades by an order of magnitude.
#[derive(Debug, Clone)]
pub(crate) struct TypeIndex {
    /// state name -> category
    categories: HashMap<String, Category>,
    /// from state -> to state -> position in the template's transition list
    transitions: HashMap<String, HashMap<String, usize>>,
}

impl TypeIndex {
    pub(crate) fn build(template: &TypeTemplate) -> Self {
        let categories = template
            .states
            .iter()
            .map(|s| (s.name.clone(), s.category))
            .collect();
        let mut transitions: HashMap<String, HashMap<String, usize>> = HashMap::new();
        for (position, transition) in template.transitions.iter().enumerate() {
            transitions
                .entry(transition.from.clone())
                .or_default()
                .insert(transition.to.clone(), position);
        }
        Self {
            categories,
            transitions,
        }
    }

    pub(crate) fn category(&self, state: &str) -> Option<Category> {
        self.categories.get(state).copied()
    }

    fn transition<'a>(
        &self,
        template: &'a TypeTemplate,
        from: &str,
        to: &str,
    ) -> Option<&'a TransitionDefinition> {
        let position = *self.transitions.get(from)?.get(to)?;
        template.transitions.get(position)
    }
}

/// A field is unpopulated iff it is absent, JSON `null`, or a string that
/// is empty after trimming whitespace. Everything else — `false`, `0`, the
/// empty array — counts as populated.
pub(crate) fn is_populated(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.trim().is_empty(),
        Some(_) => true,
    }
}

/// Unpopulated fields for a declared transition: the transition's
/// `requires_fields` followed by the fields `required_at` the target state,
/// dedup'd by first occurrence with order preserved.
fn missing_fields(
    template: &TypeTemplate,
    transition: &TransitionDefinition,
    fields: &FieldValues,
) -> Vec<String> {
    let mut missing: Vec<String> = Vec::new();
    for name in &transition.requires_fields {
        if !is_populated(fields.get(name)) && !missing.iter().any(|m| m == name) {
            missing.push(name.clone());
        }
    }
    for field in &template.fields_schema {
        if field.required_at.iter().any(|s| s == &transition.to)
            && !is_populated(fields.get(&field.name))
            && !missing.iter().any(|m| m == &field.name)
        {
            missing.push(field.name.clone());
        }
    }
    missing
}

pub(crate) fn evaluate(
    template: &TypeTemplate,
    index: &TypeIndex,
    from: &str,
    to: &str,
    fields: &FieldValues,
) -> TransitionResult {
    let Some(transition) = index.transition(template, from, to) else {
        // Soft-by-default for undeclared pairs: allowed, but no field
        // computation happens and the caller gets a single advisory.
        return TransitionResult::undeclared(format!(
            "transition '{}' -> '{}' is not declared for type '{}'; \
             list the valid transitions from '{}' to discover legal moves",
            from, to, template.name, from
        ));
    };

    let missing = missing_fields(template, transition, fields);
    if missing.is_empty() {
        return TransitionResult::passed(transition.enforcement);
    }
    match transition.enforcement {
        Enforcement::Hard => TransitionResult::denied(missing),
        Enforcement::Soft => {
            let warning = format!(
                "fields required for '{}' are not populated: {}",
                to,
                missing.join(", ")
            );
            TransitionResult::soft_with_missing(missing, warning)
        }
    }
}

pub(crate) fn options(
    template: &TypeTemplate,
    index: &TypeIndex,
    from: &str,
    fields: &FieldValues,
) -> Vec<TransitionOption> {
    template
        .transitions
        .iter()
        .filter(|t| t.from == from)
        .filter_map(|transition| {
            let category = index.category(&transition.to)?;
            let missing = missing_fields(template, transition, fields);
            let ready = transition.enforcement != Enforcement::Hard || missing.is_empty();
            Some(TransitionOption {
                to_state: transition.to.clone(),
                category,
                enforcement: Some(transition.enforcement),
                requires_fields: transition.requires_fields.clone(),
                missing_fields: missing,
                ready,
            })
        })
        .collect()
}

/// Fields `required_at` the given state that are unpopulated, in schema
/// declaration order.
pub(crate) fn missing_for_state(
    template: &TypeTemplate,
    state: &str,
    fields: &FieldValues,
) -> Vec<String> {
    template
        .fields_schema
        .iter()
        .filter(|f| f.required_at.iter().any(|s| s == state))
        .filter(|f| !is_populated(fields.get(&f.name)))
        .map(|f| f.name.clone())
        .collect()
}
