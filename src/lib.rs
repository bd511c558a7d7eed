#![doc = include_str!("../README.md")]

pub mod builtin;
mod enforce;
pub mod error;
mod loader;
pub mod model;
pub mod parse;

use std::collections::HashMap;
use std::path::PathBuf;

use tracing::warn;

use crate::enforce::TypeIndex;
use crate::loader::LoadOptions;

// Re-export the public surface for convenience
pub use crate::error::{
    HardEnforcementError, PackDependencyError, ParseError, TransitionError,
    TransitionNotAllowedError,
};
pub use crate::model::{
    Category, Enforcement, FALLBACK_INITIAL_STATE, FieldSchema, FieldType, FieldValues,
    PackGuide, StateDefinition, TransitionDefinition, TransitionOption, TransitionResult,
    TypeTemplate, ValidationResult, WorkflowPack,
};

/// A template plus its precomputed lookup structures.
#[derive(Debug)]
struct TypeEntry {
    template: TypeTemplate,
    index: TypeIndex,
}

/// Immutable-after-load catalog of type templates and packs.
///
/// Built once at process start via [`TemplateRegistry::builder`]; afterwards
/// it performs no I/O, holds no locks, and exposes a read-only query API, so
/// it may be shared across threads without coordination. There is no reload:
/// a process that wants fresh templates builds a new registry and hands it
/// to callers.
///
/// Unknown type names never error. They fall back to the behavior of the
/// prior flat three-state model: initial state `open`, every transition
/// allowed, nothing field-checked. This keeps items whose pack has been
/// disabled workable.
///
/// # Examples
///
/// ```rust
/// use workflow_templates::{FieldValues, TemplateRegistry};
///
/// let registry = TemplateRegistry::builder()
///     .load()
///     .expect("built-in packs resolve");
///
/// assert_eq!(registry.initial_state("bug"), "triage");
/// let options = registry.valid_transitions("bug", "triage", &FieldValues::new());
/// assert!(options.iter().any(|o| o.to_state == "confirmed"));
/// ```
#[derive(Debug)]
pub struct TemplateRegistry {
    types: Vec<TypeEntry>,
    type_lookup: HashMap<String, usize>,
    packs: Vec<WorkflowPack>,
    pack_lookup: HashMap<String, usize>,
}

/// Builder for configuring and loading a [`TemplateRegistry`].
///
/// # Examples
///
/// ```rust,no_run
/// use workflow_templates::TemplateRegistry;
///
/// let registry = TemplateRegistry::builder()
///     .with_pack_dir("/etc/tracker/packs")
///     .with_template_dir("/etc/tracker/templates")
///     .with_enabled_packs(["core", "planning"])
///     .load()
///     .expect("enabled packs resolve");
/// # let _ = registry;
/// ```
#[derive(Debug, Clone, Default)]
pub struct TemplateRegistryBuilder {
    options: LoadOptions,
}

impl TemplateRegistryBuilder {
    /// Sets the directory holding installed pack documents
    /// (`<pack_dir>/*.json`, one pack per file). A missing directory is an
    /// empty layer.
    #[must_use = "builder methods consume self and return a new builder; the return value must be used"]
    pub fn with_pack_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.options.pack_dir = Some(dir.into());
        self
    }

    /// Sets the directory holding project type overrides
    /// (`<template_dir>/*.json`, one complete type template per file).
    /// An override replaces any built-in or pack-supplied template of the
    /// same type name, wholesale.
    #[must_use = "builder methods consume self and return a new builder; the return value must be used"]
    pub fn with_template_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.options.template_dir = Some(dir.into());
        self
    }

    /// Sets the enabled-pack selection. Defaults to `["core", "planning"]`.
    ///
    /// Only types belonging to enabled packs (and their project overrides)
    /// become visible. Every enabled pack's `requires_packs` must also be
    /// enabled or the load fails.
    #[must_use = "builder methods consume self and return a new builder; the return value must be used"]
    pub fn with_enabled_packs<I>(mut self, packs: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.options.enabled_packs = packs.into_iter().map(Into::into).collect();
        self
    }

    /// Includes or excludes the built-in packs. On by default; turning them
    /// off is mostly useful in tests that want full control of the pack set.
    #[must_use = "builder methods consume self and return a new builder; the return value must be used"]
    pub fn with_builtin_packs(mut self, include: bool) -> Self {
        self.options.builtin = include;
        self
    }

    /// Adds an already-parsed pack, layered above the installed pack
    /// directory. This is the programmatic install path; pair it with
    /// [`parse::parse_pack`] and [`parse::validate_pack`] for strict
    /// validation before handing the pack over.
    #[must_use = "builder methods consume self and return a new builder; the return value must be used"]
    pub fn with_extra_pack(mut self, pack: WorkflowPack) -> Self {
        self.options.extra_packs.push(pack);
        self
    }

    /// Resolves all configuration layers and freezes the registry.
    ///
    /// Malformed documents in the pack and template directories are logged
    /// and skipped; they never abort the load.
    ///
    /// # Errors
    ///
    /// [`PackDependencyError`] when an enabled pack requires a pack that is
    /// not enabled, or when the `requires_packs` graph over the enabled
    /// packs contains a cycle.
    pub fn load(self) -> Result<TemplateRegistry, PackDependencyError> {
        let resolved = loader::resolve(&self.options)?;

        let mut types = Vec::with_capacity(resolved.types.len());
        let mut type_lookup = HashMap::with_capacity(resolved.types.len());
        for template in resolved.types {
            let index = TypeIndex::build(&template);
            type_lookup.insert(template.name.clone(), types.len());
            types.push(TypeEntry { template, index });
        }

        let mut pack_lookup = HashMap::with_capacity(resolved.packs.len());
        for (position, pack) in resolved.packs.iter().enumerate() {
            pack_lookup.insert(pack.name.clone(), position);
        }

        Ok(TemplateRegistry {
            types,
            type_lookup,
            packs: resolved.packs,
            pack_lookup,
        })
    }
}

impl TemplateRegistry {
    /// Creates a new builder with the default configuration: built-in packs
    /// only, `["core", "planning"]` enabled.
    pub fn builder() -> TemplateRegistryBuilder {
        TemplateRegistryBuilder::default()
    }

    fn entry(&self, type_name: &str) -> Option<&TypeEntry> {
        self.type_lookup
            .get(type_name)
            .map(|&position| &self.types[position])
    }

    /// Looks up the template for a type name.
    pub fn template(&self, type_name: &str) -> Option<&TypeTemplate> {
        self.entry(type_name).map(|entry| &entry.template)
    }

    /// Returns true if the type is known to the registry.
    pub fn has_type(&self, type_name: &str) -> bool {
        self.type_lookup.contains_key(type_name)
    }

    /// Looks up an enabled pack by name.
    pub fn pack(&self, name: &str) -> Option<&WorkflowPack> {
        self.pack_lookup
            .get(name)
            .map(|&position| &self.packs[position])
    }

    /// All resolved templates, in load order.
    pub fn templates(&self) -> Vec<&TypeTemplate> {
        self.types.iter().map(|entry| &entry.template).collect()
    }

    /// All enabled packs, in enabled-selection order.
    pub fn packs(&self) -> &[WorkflowPack] {
        &self.packs
    }

    /// Resolved type names, in load order.
    pub fn type_names(&self) -> Vec<&str> {
        self.types
            .iter()
            .map(|entry| entry.template.name.as_str())
            .collect()
    }

    /// Enabled pack names, in enabled-selection order.
    pub fn pack_names(&self) -> Vec<&str> {
        self.packs.iter().map(|pack| pack.name.as_str()).collect()
    }

    /// The state a newly created item of this type starts in.
    ///
    /// Unknown types fall back to [`FALLBACK_INITIAL_STATE`] (`"open"`) and
    /// log a warning; they never error.
    pub fn initial_state(&self, type_name: &str) -> &str {
        match self.entry(type_name) {
            Some(entry) => &entry.template.initial_state,
            None => {
                warn!(
                    type_name = %type_name,
                    "unknown item type; falling back to initial state 'open'"
                );
                FALLBACK_INITIAL_STATE
            }
        }
    }

    /// The universal category of a state, from the precomputed index.
    ///
    /// Returns `None` for unknown types and for states the type does not
    /// declare. This is the O(1) lookup that keeps category rollups over
    /// large item sets linear.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use workflow_templates::{Category, TemplateRegistry};
    ///
    /// let registry = TemplateRegistry::builder().load().expect("built-ins load");
    /// assert_eq!(registry.category("bug", "fixing"), Some(Category::Wip));
    /// assert_eq!(registry.category("bug", "no_such_state"), None);
    /// ```
    pub fn category(&self, type_name: &str, state: &str) -> Option<Category> {
        self.entry(type_name)?.index.category(state)
    }

    /// The declared states of a type, in document order, or `None` for an
    /// unknown type.
    pub fn valid_states(&self, type_name: &str) -> Option<Vec<&str>> {
        let entry = self.entry(type_name)?;
        Some(
            entry
                .template
                .states
                .iter()
                .map(|s| s.name.as_str())
                .collect(),
        )
    }

    /// The first declared state with the given category, or `None` when the
    /// type is unknown or declares no state in that category.
    pub fn first_state_of_category(&self, type_name: &str, category: Category) -> Option<&str> {
        let entry = self.entry(type_name)?;
        entry
            .template
            .states
            .iter()
            .find(|s| s.category == category)
            .map(|s| s.name.as_str())
    }

    /// Evaluates one candidate transition against the supplied field values.
    ///
    /// Never errors; the result encodes the outcome:
    ///
    /// - unknown type: allowed, `enforcement = None`, nothing checked,
    /// - undeclared from/to pair: allowed, `enforcement = None`, one
    ///   advisory warning, no field computation,
    /// - declared pair: `missing_fields` is the transition's
    ///   `requires_fields` followed by the target state's `required_at`
    ///   fields, unpopulated ones only, dedup'd by first occurrence. A hard
    ///   edge with missing fields is denied; a soft edge passes with a
    ///   warning naming the fields and target state.
    ///
    /// Atomic populate-then-transition is the item store's job: merge the
    /// incoming field values into the item first, then evaluate with the
    /// post-merge map.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use workflow_templates::{Enforcement, FieldValues, TemplateRegistry};
    ///
    /// let registry = TemplateRegistry::builder().load().expect("built-ins load");
    ///
    /// let result = registry.validate_transition("bug", "fixing", "verifying", &FieldValues::new());
    /// assert!(result.allowed);
    /// assert_eq!(result.enforcement, Some(Enforcement::Soft));
    /// assert_eq!(result.missing_fields, vec!["fix_verification".to_string()]);
    /// ```
    pub fn validate_transition(
        &self,
        type_name: &str,
        from: &str,
        to: &str,
        fields: &FieldValues,
    ) -> TransitionResult {
        match self.entry(type_name) {
            Some(entry) => enforce::evaluate(&entry.template, &entry.index, from, to, fields),
            None => TransitionResult::fallback(),
        }
    }

    /// The declared transitions out of `from`, with readiness information.
    ///
    /// A transition is ready unless it is hard-enforced and has missing
    /// fields; soft transitions with missing fields stay ready (they will
    /// succeed with a warning). Unknown types return the empty sequence.
    pub fn valid_transitions(
        &self,
        type_name: &str,
        from: &str,
        fields: &FieldValues,
    ) -> Vec<TransitionOption> {
        match self.entry(type_name) {
            Some(entry) => enforce::options(&entry.template, &entry.index, from, fields),
            None => Vec::new(),
        }
    }

    /// The fields declared `required_at` the given state that are
    /// unpopulated, in schema declaration order. Unknown types return the
    /// empty sequence.
    pub fn validate_fields_for_state(
        &self,
        type_name: &str,
        state: &str,
        fields: &FieldValues,
    ) -> Vec<String> {
        match self.entry(type_name) {
            Some(entry) => enforce::missing_for_state(&entry.template, state, fields),
            None => Vec::new(),
        }
    }

    /// Whole-item validation: is the item's current state declared, and are
    /// its required-at fields populated?
    ///
    /// An undeclared state is an error; unpopulated required fields are
    /// warnings (the item already *is* in the state — the store persists
    /// these into its event log rather than rejecting). Unknown types are
    /// valid by the fallback contract.
    pub fn validate_item(
        &self,
        type_name: &str,
        state: &str,
        fields: &FieldValues,
    ) -> ValidationResult {
        let Some(entry) = self.entry(type_name) else {
            return ValidationResult::new(Vec::new(), Vec::new());
        };
        let mut errors = Vec::new();
        if entry.index.category(state).is_none() {
            errors.push(format!(
                "state '{}' is not declared for type '{}'",
                state, type_name
            ));
        }
        let warnings = enforce::missing_for_state(&entry.template, state, fields)
            .into_iter()
            .map(|field| {
                format!(
                    "required field '{}' is not populated at state '{}'",
                    field, state
                )
            })
            .collect();
        ValidationResult::new(warnings, errors)
    }
}
