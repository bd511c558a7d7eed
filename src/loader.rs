//! Resolution of the three configuration layers into a flat template set.
//!
//! Layers, in increasing precedence:
//!
//! 1. built-in packs compiled into the binary,
//! 2. installed pack documents (`<pack_dir>/*.json`, one pack per file),
//! 3. project type overrides (`<template_dir>/*.json`, one type per file).
//!
//! Later layers replace earlier layers at type granularity — whole-document
//! replacement, never field-level merge. Only types belonging to enabled
//! packs are resolved, and an override for a type whose pack is disabled is
//! hidden (overrides do not enable packs). Malformed or unreadable files
//! are logged and skipped so one broken document never aborts the load;
//! dependency problems in the enabled set itself do abort, with a typed
//! error.
//!
//! Files within a layer are read in lexicographic path order, which makes
//! the whole resolution deterministic: loading twice from the same inputs
//! yields the same registry.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::builtin;
use crate::error::PackDependencyError;
use crate::model::{TypeTemplate, WorkflowPack};
use crate::parse::{parse_pack, parse_type_template, validate_pack, validate_type_template};

/// Packs enabled when the caller does not supply a selection.
pub(crate) const DEFAULT_ENABLED_PACKS: &[&str] = &["core", "planning"];

#[derive(Debug, Clone)]
pub(crate) struct LoadOptions {
    pub builtin: bool,
    pub pack_dir: Option<PathBuf>,
    pub template_dir: Option<PathBuf>,
    pub enabled_packs: Vec<String>,
    pub extra_packs: Vec<WorkflowPack>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            builtin: true,
            pack_dir: None,
            template_dir: None,
            enabled_packs: DEFAULT_ENABLED_PACKS.iter().map(|s| s.to_string()).collect(),
            extra_packs: Vec::new(),
        }
    }
}

/// The flat result the registry is built from.
#[derive(Debug)]
pub(crate) struct ResolvedTemplates {
    /// Enabled packs, in enabled-selection order
    pub packs: Vec<WorkflowPack>,
    /// Resolved templates of enabled packs, overrides applied, load order
    pub types: Vec<TypeTemplate>,
}

pub(crate) fn resolve(options: &LoadOptions) -> Result<ResolvedTemplates, PackDependencyError> {
    // Layer 1 + 2: collect known packs. A later pack document with the same
    // name replaces the earlier one wholesale.
    let mut pack_order: Vec<String> = Vec::new();
    let mut packs: HashMap<String, WorkflowPack> = HashMap::new();
    let mut add_pack = |pack: WorkflowPack, pack_order: &mut Vec<String>| {
        if !packs.contains_key(&pack.name) {
            pack_order.push(pack.name.clone());
        }
        packs.insert(pack.name.clone(), pack);
    };

    if options.builtin {
        for pack in builtin::packs() {
            add_pack(pack, &mut pack_order);
        }
    }
    if let Some(dir) = &options.pack_dir {
        for (path, value) in read_documents(dir) {
            match parse_pack(&value) {
                Ok(pack) => {
                    let problems = validate_pack(&pack);
                    if problems.is_empty() {
                        add_pack(pack, &mut pack_order);
                    } else {
                        warn!(
                            path = %path.display(),
                            pack = %pack.name,
                            errors = ?problems,
                            "skipping pack document with dangling references"
                        );
                    }
                }
                Err(error) => {
                    warn!(path = %path.display(), %error, "skipping malformed pack document");
                }
            }
        }
    }
    for pack in &options.extra_packs {
        add_pack(pack.clone(), &mut pack_order);
    }

    // Enabled selection: unknown names are logged and dropped.
    let mut enabled: Vec<String> = Vec::new();
    for name in &options.enabled_packs {
        if enabled.contains(name) {
            continue;
        }
        if packs.contains_key(name) {
            enabled.push(name.clone());
        } else {
            warn!(pack = %name, "enabled pack is not installed; ignoring");
        }
    }
    let enabled_set: HashSet<&str> = enabled.iter().map(String::as_str).collect();

    // Every enabled pack's requirements must be enabled too.
    for name in &enabled {
        let pack = &packs[name];
        for dep in &pack.requires_packs {
            if !enabled_set.contains(dep.as_str()) {
                return Err(PackDependencyError::MissingDependency {
                    pack: name.clone(),
                    requires: dep.clone(),
                });
            }
        }
    }
    if let Some(cycle) = find_cycle(&packs, &enabled) {
        return Err(PackDependencyError::DependencyCycle { cycle });
    }

    // Flatten enabled packs into the type map. Peer packs declaring the
    // same type resolve later-wins in enabled-selection order, which is
    // deterministic (the enabled list is an ordered config input).
    let mut type_order: Vec<String> = Vec::new();
    let mut types: HashMap<String, TypeTemplate> = HashMap::new();
    for name in &enabled {
        for template in packs[name].types.values() {
            if let Some(previous) = types.get(&template.name) {
                warn!(
                    type_name = %template.name,
                    winner = %template.pack,
                    loser = %previous.pack,
                    "type declared by multiple packs; later pack wins"
                );
            } else {
                type_order.push(template.name.clone());
            }
            types.insert(template.name.clone(), template.clone());
        }
    }

    // Layer 3: project overrides, one complete type template per file.
    if let Some(dir) = &options.template_dir {
        for (path, value) in read_documents(dir) {
            let mut template = match parse_type_template(&value) {
                Ok(template) => template,
                Err(error) => {
                    warn!(path = %path.display(), %error, "skipping malformed type override");
                    continue;
                }
            };
            let problems = validate_type_template(&template);
            if !problems.is_empty() {
                warn!(
                    path = %path.display(),
                    type_name = %template.name,
                    errors = ?problems,
                    "skipping type override with dangling references"
                );
                continue;
            }
            if template.pack.is_empty() {
                template.pack = types
                    .get(&template.name)
                    .map(|existing| existing.pack.clone())
                    .unwrap_or_default();
            }
            if template.pack.is_empty() {
                warn!(
                    path = %path.display(),
                    type_name = %template.name,
                    "type override names no pack and matches no resolved type; hidden"
                );
                continue;
            }
            if !enabled_set.contains(template.pack.as_str()) {
                // Overrides do not enable packs.
                warn!(
                    path = %path.display(),
                    type_name = %template.name,
                    pack = %template.pack,
                    "type override hidden: its pack is not enabled"
                );
                continue;
            }
            if !types.contains_key(&template.name) {
                type_order.push(template.name.clone());
            }
            types.insert(template.name.clone(), template);
        }
    }

    let resolved_types: Vec<TypeTemplate> = type_order
        .iter()
        .filter_map(|name| types.remove(name))
        .collect();
    let resolved_packs: Vec<WorkflowPack> = enabled
        .iter()
        .filter_map(|name| packs.remove(name))
        .collect();

    debug!(
        packs = resolved_packs.len(),
        types = resolved_types.len(),
        "template load resolved"
    );
    Ok(ResolvedTemplates {
        packs: resolved_packs,
        types: resolved_types,
    })
}

/// Reads `*.json` documents under `dir` in lexicographic path order.
///
/// A missing directory is an empty layer, not an error; unreadable or
/// unparseable files are logged and skipped.
fn read_documents(dir: &Path) -> Vec<(PathBuf, Value)> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(error) => {
            debug!(dir = %dir.display(), %error, "template layer directory not readable");
            return Vec::new();
        }
    };
    let mut paths: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
        .collect();
    paths.sort();

    let mut documents = Vec::with_capacity(paths.len());
    for path in paths {
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(error) => {
                warn!(path = %path.display(), %error, "skipping unreadable document");
                continue;
            }
        };
        match serde_json::from_str::<Value>(&text) {
            Ok(value) => documents.push((path, value)),
            Err(error) => {
                warn!(path = %path.display(), %error, "skipping document with invalid JSON");
            }
        }
    }
    documents
}

/// Depth-first search for a cycle in the `requires_packs` graph restricted
/// to the enabled packs. Returns the cycle in walk order with the entry
/// pack repeated at the end.
fn find_cycle(packs: &HashMap<String, WorkflowPack>, enabled: &[String]) -> Option<Vec<String>> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Visiting,
        Done,
    }

    fn visit(
        name: &str,
        packs: &HashMap<String, WorkflowPack>,
        marks: &mut HashMap<String, Mark>,
        stack: &mut Vec<String>,
    ) -> Option<Vec<String>> {
        marks.insert(name.to_string(), Mark::Visiting);
        stack.push(name.to_string());
        if let Some(pack) = packs.get(name) {
            for dep in &pack.requires_packs {
                match marks.get(dep.as_str()) {
                    Some(Mark::Visiting) => {
                        let start = stack.iter().position(|n| n == dep).unwrap_or(0);
                        let mut cycle = stack[start..].to_vec();
                        cycle.push(dep.clone());
                        return Some(cycle);
                    }
                    Some(Mark::Done) => {}
                    None => {
                        if let Some(cycle) = visit(dep, packs, marks, stack) {
                            return Some(cycle);
                        }
                    }
                }
            }
        }
        stack.pop();
        marks.insert(name.to_string(), Mark::Done);
        None
    }

    let mut marks = HashMap::new();
    let mut stack = Vec::new();
    for name in enabled {
        if !marks.contains_key(name.as_str()) {
            if let Some(cycle) = visit(name, packs, &mut marks, &mut stack) {
                return Some(cycle);
            }
        }
    }
    None
}
