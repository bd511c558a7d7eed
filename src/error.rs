//! Typed failures for template parsing, pack resolution, and enforcement.
//!
//! Every variant carries enough structured data that programmatic handlers
//! (the installer, the doctor tool, the item store's self-correction path)
//! can act without parsing the human-readable message. Transition
//! *evaluation* never produces these directly — the engine returns a
//! [`TransitionResult`](crate::TransitionResult) and callers convert it via
//! [`TransitionResult::check`](crate::TransitionResult::check) or
//! [`TransitionResult::check_strict`](crate::TransitionResult::check_strict).

use std::fmt;

/// Structural failure while converting a JSON document into a template or pack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The document (or a nested element) was not a JSON object.
    NotAnObject {
        /// What was being parsed, e.g. `"type template"` or `"state entry"`
        context: String,
    },

    /// A required key was absent.
    MissingKey {
        /// The missing key
        key: &'static str,
        /// What was being parsed
        context: String,
    },

    /// A key was present but held the wrong JSON type.
    WrongType {
        /// The offending key
        key: &'static str,
        /// Expected JSON type, e.g. `"string"` or `"array"`
        expected: &'static str,
        /// What was being parsed
        context: String,
    },

    /// A state name failed the `^[a-z][a-z0-9_]{0,63}$` rule.
    InvalidStateName {
        /// The rejected name
        name: String,
    },

    /// A state declared a category outside {open, wip, done}.
    UnknownCategory {
        /// The state carrying the bad tag
        state: String,
        /// The unrecognized tag
        value: String,
    },

    /// A transition declared an enforcement level outside {hard, soft}.
    UnknownEnforcement {
        from: String,
        to: String,
        /// The unrecognized tag
        value: String,
    },

    /// A field declared a type outside {text, enum, number, date, list, boolean}.
    UnknownFieldType {
        /// The field carrying the bad tag
        field: String,
        /// The unrecognized tag
        value: String,
    },

    /// The template exceeded a size limit (states, transitions, or fields).
    Oversized {
        /// Which collection overflowed: `"states"`, `"transitions"`, or `"fields"`
        what: &'static str,
        count: usize,
        limit: usize,
    },

    /// Two states in one template share a name.
    DuplicateState { name: String },

    /// Two fields in one template share a name.
    DuplicateField { name: String },

    /// Two transitions in one template share a `(from, to)` pair.
    DuplicateTransition { from: String, to: String },

    /// A type inside a pack document declared a `pack` that is not the
    /// enclosing pack, or sat under a `types` key that is not its own name.
    PackMismatch {
        pack: String,
        type_name: String,
        declared: String,
    },

    /// A pack guide violated its length constraints.
    InvalidGuide {
        pack: String,
        reason: String,
    },
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::NotAnObject { context } => {
                write!(f, "{} is not a JSON object", context)
            }
            ParseError::MissingKey { key, context } => {
                write!(f, "{} is missing required key '{}'", context, key)
            }
            ParseError::WrongType {
                key,
                expected,
                context,
            } => {
                write!(f, "{} key '{}' must be a {}", context, key, expected)
            }
            ParseError::InvalidStateName { name } => {
                write!(
                    f,
                    "invalid state name '{}': must match [a-z][a-z0-9_]{{0,63}}",
                    name
                )
            }
            ParseError::UnknownCategory { state, value } => {
                write!(
                    f,
                    "state '{}' has unknown category '{}' (expected open, wip, or done)",
                    state, value
                )
            }
            ParseError::UnknownEnforcement { from, to, value } => {
                write!(
                    f,
                    "transition '{}' -> '{}' has unknown enforcement '{}' (expected hard or soft)",
                    from, to, value
                )
            }
            ParseError::UnknownFieldType { field, value } => {
                write!(
                    f,
                    "field '{}' has unknown type '{}' (expected text, enum, number, date, list, or boolean)",
                    field, value
                )
            }
            ParseError::Oversized { what, count, limit } => {
                write!(
                    f,
                    "template declares {} {} but the limit is {}",
                    count, what, limit
                )
            }
            ParseError::DuplicateState { name } => {
                write!(f, "duplicate state '{}'", name)
            }
            ParseError::DuplicateField { name } => {
                write!(f, "duplicate field '{}'", name)
            }
            ParseError::DuplicateTransition { from, to } => {
                write!(f, "duplicate transition '{}' -> '{}'", from, to)
            }
            ParseError::PackMismatch {
                pack,
                type_name,
                declared,
            } => {
                write!(
                    f,
                    "type '{}' in pack '{}' declares mismatched name '{}'",
                    type_name, pack, declared
                )
            }
            ParseError::InvalidGuide { pack, reason } => {
                write!(f, "pack '{}' has an invalid guide: {}", pack, reason)
            }
        }
    }
}

impl std::error::Error for ParseError {}

/// Failure while resolving the enabled-pack selection.
///
/// Unlike malformed pack *documents*, which are logged and skipped,
/// dependency problems abort the load: they mean the enabled set itself is
/// inconsistent and no registry can faithfully represent it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackDependencyError {
    /// An enabled pack requires a pack that is not enabled.
    MissingDependency {
        /// The enabled pack whose requirement is unmet
        pack: String,
        /// The pack it requires
        requires: String,
    },

    /// The `requires_packs` graph over the enabled packs contains a cycle.
    DependencyCycle {
        /// The packs on the cycle, in walk order, first repeated at the end
        cycle: Vec<String>,
    },
}

impl fmt::Display for PackDependencyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PackDependencyError::MissingDependency { pack, requires } => {
                write!(
                    f,
                    "pack '{}' requires pack '{}', which is not enabled",
                    pack, requires
                )
            }
            PackDependencyError::DependencyCycle { cycle } => {
                write!(f, "pack dependency cycle: {}", cycle.join(" -> "))
            }
        }
    }
}

impl std::error::Error for PackDependencyError {}

/// A caller chose to reject a transition that is not declared in the
/// template.
///
/// The engine itself allows undeclared transitions with an advisory
/// warning; this error exists for item stores that opt into strict
/// enforcement via [`TransitionResult::check_strict`](crate::TransitionResult::check_strict).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionNotAllowedError {
    pub type_name: String,
    pub from: String,
    pub to: String,
}

impl TransitionNotAllowedError {
    pub fn new(
        type_name: impl Into<String>,
        from: impl Into<String>,
        to: impl Into<String>,
    ) -> Self {
        Self {
            type_name: type_name.into(),
            from: from.into(),
            to: to.into(),
        }
    }
}

impl fmt::Display for TransitionNotAllowedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "transition '{}' -> '{}' is not declared for type '{}'; \
             list valid transitions to discover legal moves",
            self.from, self.to, self.type_name
        )
    }
}

impl std::error::Error for TransitionNotAllowedError {}

/// A hard-enforced transition was attempted with unpopulated required
/// fields.
///
/// `missing_fields` preserves the engine's first-occurrence order so a
/// handler can populate them and retry without re-deriving the list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HardEnforcementError {
    pub type_name: String,
    pub from: String,
    pub to: String,
    pub missing_fields: Vec<String>,
}

impl HardEnforcementError {
    pub fn new(
        type_name: impl Into<String>,
        from: impl Into<String>,
        to: impl Into<String>,
        missing_fields: Vec<String>,
    ) -> Self {
        Self {
            type_name: type_name.into(),
            from: from.into(),
            to: to.into(),
            missing_fields,
        }
    }
}

impl fmt::Display for HardEnforcementError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "transition '{}' -> '{}' for type '{}' requires populated fields: {}; \
             inspect the type's field schema for details",
            self.from,
            self.to,
            self.type_name,
            self.missing_fields.join(", ")
        )
    }
}

impl std::error::Error for HardEnforcementError {}

/// Either way a checked transition can fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    NotAllowed(TransitionNotAllowedError),
    HardEnforcement(HardEnforcementError),
}

impl fmt::Display for TransitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransitionError::NotAllowed(e) => e.fmt(f),
            TransitionError::HardEnforcement(e) => e.fmt(f),
        }
    }
}

impl std::error::Error for TransitionError {}

impl From<TransitionNotAllowedError> for TransitionError {
    fn from(e: TransitionNotAllowedError) -> Self {
        TransitionError::NotAllowed(e)
    }
}

impl From<HardEnforcementError> for TransitionError {
    fn from(e: HardEnforcementError) -> Self {
        TransitionError::HardEnforcement(e)
    }
}
