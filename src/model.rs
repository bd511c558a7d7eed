//! Value types for the template engine.
//!
//! Everything here is an immutable record: created at parse time, owned by
//! the registry, and never mutated afterwards. Construction enforces the
//! structural rules that don't need cross-reference information (state name
//! shape, closed tag sets); the cross-reference checks live in
//! [`crate::parse::validate_type_template`].

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{
    HardEnforcementError, ParseError, TransitionError, TransitionNotAllowedError,
};

/// Field values supplied by the item store, keyed by field name.
///
/// Values are JSON-shaped; see [`TransitionResult`] for how populated-ness
/// is decided.
pub type FieldValues = serde_json::Map<String, Value>;

/// Maximum states per type template.
pub const MAX_STATES: usize = 50;
/// Maximum transitions per type template.
pub const MAX_TRANSITIONS: usize = 200;
/// Maximum fields per type template.
pub const MAX_FIELDS: usize = 50;

/// Initial state reported for item types the registry does not know.
///
/// This is the anchor of the backward-compatibility contract with the old
/// flat three-state model.
pub const FALLBACK_INITIAL_STATE: &str = "open";

/// Universal bucket every per-type state maps to, enabling cross-type
/// rollups ("12 open, 3 in progress, 40 done") without knowing any
/// individual state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Open,
    Wip,
    Done,
}

impl Category {
    /// The lowercase wire tag for this category.
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Open => "open",
            Category::Wip => "wip",
            Category::Done => "done",
        }
    }

    pub(crate) fn parse(tag: &str) -> Option<Self> {
        match tag {
            "open" => Some(Category::Open),
            "wip" => Some(Category::Wip),
            "done" => Some(Category::Done),
            _ => None,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a declared transition treats unpopulated required fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Enforcement {
    /// Reject the transition until every required field is populated.
    Hard,
    /// Allow the transition, reporting the missing fields as a warning.
    Soft,
}

impl Enforcement {
    pub fn as_str(self) -> &'static str {
        match self {
            Enforcement::Hard => "hard",
            Enforcement::Soft => "soft",
        }
    }

    pub(crate) fn parse(tag: &str) -> Option<Self> {
        match tag {
            "hard" => Some(Enforcement::Hard),
            "soft" => Some(Enforcement::Soft),
            _ => None,
        }
    }
}

impl fmt::Display for Enforcement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The closed set of field value shapes a type may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Text,
    Enum,
    Number,
    Date,
    List,
    Boolean,
}

impl FieldType {
    pub fn as_str(self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Enum => "enum",
            FieldType::Number => "number",
            FieldType::Date => "date",
            FieldType::List => "list",
            FieldType::Boolean => "boolean",
        }
    }

    pub(crate) fn parse(tag: &str) -> Option<Self> {
        match tag {
            "text" => Some(FieldType::Text),
            "enum" => Some(FieldType::Enum),
            "number" => Some(FieldType::Number),
            "date" => Some(FieldType::Date),
            "list" => Some(FieldType::List),
            "boolean" => Some(FieldType::Boolean),
            _ => None,
        }
    }
}

/// Returns true if `name` matches `^[a-z][a-z0-9_]{0,63}$`.
///
/// State names end up in query keys and file paths, so the shape is locked
/// down at construction rather than at use sites.
pub fn is_valid_state_name(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    first.is_ascii_lowercase()
        && name.len() <= 64
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

/// A named state within one type's workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StateDefinition {
    /// State name, `^[a-z][a-z0-9_]{0,63}$`
    pub name: String,
    /// Universal category this state maps to
    pub category: Category,
}

impl StateDefinition {
    /// Creates a state definition, validating the name shape.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::InvalidStateName`] if the name does not match
    /// `^[a-z][a-z0-9_]{0,63}$`.
    pub fn new(name: impl Into<String>, category: Category) -> Result<Self, ParseError> {
        let name = name.into();
        if !is_valid_state_name(&name) {
            return Err(ParseError::InvalidStateName { name });
        }
        Ok(Self { name, category })
    }
}

/// A declared directed edge in a type's state machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransitionDefinition {
    pub from: String,
    pub to: String,
    pub enforcement: Enforcement,
    /// Fields that must be populated for this transition to be complete,
    /// in declaration order.
    pub requires_fields: Vec<String>,
}

impl TransitionDefinition {
    pub fn new(
        from: impl Into<String>,
        to: impl Into<String>,
        enforcement: Enforcement,
        requires_fields: Vec<String>,
    ) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            enforcement,
            requires_fields,
        }
    }
}

/// Schema for one named field on a type.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldSchema {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub description: String,
    /// Valid string values, for `enum` fields
    pub options: Vec<String>,
    /// Default value, if any
    pub default: Option<Value>,
    /// States at which this field must be populated, in declaration order
    pub required_at: Vec<String>,
}

/// The complete workflow definition for one item type.
///
/// All cross-reference invariants (initial state declared, transition
/// endpoints declared, required fields declared, names unique) are checked
/// at load time by the parser and validator; a `TypeTemplate` handed out by
/// the registry always satisfies them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypeTemplate {
    /// Type name, unique across enabled packs
    pub name: String,
    pub display_name: String,
    pub description: String,
    /// Owning pack name
    pub pack: String,
    /// Declared states, in document order
    pub states: Vec<StateDefinition>,
    pub initial_state: String,
    /// Declared transitions, in document order
    pub transitions: Vec<TransitionDefinition>,
    /// Field schemas, in document order
    pub fields_schema: Vec<FieldSchema>,
    /// Child types a frontend may suggest when breaking this type down
    pub suggested_children: Vec<String>,
    pub suggested_labels: Vec<String>,
}

impl TypeTemplate {
    /// Looks up a declared state by name.
    pub fn state(&self, name: &str) -> Option<&StateDefinition> {
        self.states.iter().find(|s| s.name == name)
    }

    /// Returns true if `name` is a declared state.
    pub fn has_state(&self, name: &str) -> bool {
        self.state(name).is_some()
    }

    /// Looks up a field schema by name.
    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields_schema.iter().find(|f| f.name == name)
    }

    /// Looks up a declared transition by endpoint pair.
    ///
    /// Linear scan; the registry's precomputed index is the hot-path route.
    pub fn transition(&self, from: &str, to: &str) -> Option<&TransitionDefinition> {
        self.transitions.iter().find(|t| t.from == from && t.to == to)
    }
}

/// Structured help document attached to a pack.
///
/// Length constraints (overview ≤50 words, when-to-use ≤30 words, ≥3 tips,
/// ≥2 common mistakes) are enforced at parse time so downstream consumers
/// can rely on guides being compact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackGuide {
    /// Compact ASCII diagram of the pack's state machines
    pub state_diagram: String,
    pub overview: String,
    pub when_to_use: String,
    pub tips: Vec<String>,
    pub common_mistakes: Vec<String>,
}

/// A named, versioned bundle of type templates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkflowPack {
    pub name: String,
    /// Semantic version string
    pub version: String,
    pub display_name: String,
    pub description: String,
    /// Templates owned by this pack, keyed by type name
    pub types: BTreeMap<String, TypeTemplate>,
    /// Packs that must also be enabled for this pack to function
    pub requires_packs: Vec<String>,
    /// Intra-pack relationship descriptors, carried verbatim for other
    /// subsystems
    pub relationships: Vec<Value>,
    /// Cross-pack relationship descriptors, carried verbatim
    pub cross_pack_relationships: Vec<Value>,
    pub guide: Option<PackGuide>,
}

/// The outcome of validating one candidate transition.
///
/// Evaluation never fails: impossible requests come back as structured
/// results, and [`check`](Self::check) / [`check_strict`](Self::check_strict)
/// convert them into the typed errors the item store surfaces to users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransitionResult {
    /// Whether the item store should apply the transition
    pub allowed: bool,
    /// Declared enforcement level; `None` when the transition was not
    /// declared in the template (or the type is unknown)
    pub enforcement: Option<Enforcement>,
    /// Required fields that are unpopulated, dedup'd by first occurrence
    pub missing_fields: Vec<String>,
    /// Human-readable advisories; at most one per evaluation
    pub warnings: Vec<String>,
}

impl TransitionResult {
    /// Result for an unknown item type: anything goes, nothing is checked.
    pub(crate) fn fallback() -> Self {
        Self {
            allowed: true,
            enforcement: None,
            missing_fields: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub(crate) fn undeclared(warning: String) -> Self {
        Self {
            allowed: true,
            enforcement: None,
            missing_fields: Vec::new(),
            warnings: vec![warning],
        }
    }

    pub(crate) fn denied(missing_fields: Vec<String>) -> Self {
        Self {
            allowed: false,
            enforcement: Some(Enforcement::Hard),
            missing_fields,
            warnings: Vec::new(),
        }
    }

    pub(crate) fn passed(enforcement: Enforcement) -> Self {
        Self {
            allowed: true,
            enforcement: Some(enforcement),
            missing_fields: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub(crate) fn soft_with_missing(missing_fields: Vec<String>, warning: String) -> Self {
        Self {
            allowed: true,
            enforcement: Some(Enforcement::Soft),
            missing_fields,
            warnings: vec![warning],
        }
    }

    /// Converts a denial into [`HardEnforcementError`]; allowed results pass
    /// through with their warnings.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use workflow_templates::{FieldValues, TemplateRegistry};
    ///
    /// let registry = TemplateRegistry::builder().load().expect("built-ins load");
    /// let result = registry.validate_transition("bug", "verifying", "closed", &FieldValues::new());
    /// let err = result.check("bug", "verifying", "closed").unwrap_err();
    /// assert_eq!(err.missing_fields, vec!["fix_verification".to_string()]);
    /// ```
    pub fn check(
        &self,
        type_name: &str,
        from: &str,
        to: &str,
    ) -> Result<Vec<String>, HardEnforcementError> {
        if self.allowed {
            Ok(self.warnings.clone())
        } else {
            Err(HardEnforcementError::new(
                type_name,
                from,
                to,
                self.missing_fields.clone(),
            ))
        }
    }

    /// Like [`check`](Self::check), but additionally rejects transitions
    /// that were not declared in the template.
    ///
    /// The fallback result for an *unknown type* carries no advisory and
    /// still passes: items whose pack is disabled keep the relaxed legacy
    /// behavior rather than being bricked.
    pub fn check_strict(
        &self,
        type_name: &str,
        from: &str,
        to: &str,
    ) -> Result<Vec<String>, TransitionError> {
        if self.enforcement.is_none() && !self.warnings.is_empty() {
            return Err(TransitionNotAllowedError::new(type_name, from, to).into());
        }
        self.check(type_name, from, to).map_err(TransitionError::from)
    }
}

/// A possible next state from a given current state, with readiness
/// information for pickers and automation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransitionOption {
    /// Target state name
    pub to_state: String,
    /// Target state's category
    pub category: Category,
    /// Declared enforcement level of the edge
    pub enforcement: Option<Enforcement>,
    /// The edge's declared required fields
    pub requires_fields: Vec<String>,
    /// Required fields currently unpopulated, dedup'd by first occurrence
    pub missing_fields: Vec<String>,
    /// False only for hard edges with missing fields; a soft edge with
    /// missing fields will succeed (with a warning) and stays ready
    pub ready: bool,
}

/// The outcome of a whole-item validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

impl ValidationResult {
    pub(crate) fn new(warnings: Vec<String>, errors: Vec<String>) -> Self {
        Self {
            valid: errors.is_empty(),
            warnings,
            errors,
        }
    }
}
