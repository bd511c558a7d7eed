//! Layered configuration resolution: installed packs, project overrides,
//! enabled-pack selection, and the skip-and-log policy for broken files.

use std::fs;
use std::path::Path;

use serde_json::{Value, json};
use tempfile::TempDir;
use workflow_templates::{PackDependencyError, TemplateRegistry};

fn write_doc(dir: &Path, name: &str, value: &Value) {
    fs::write(dir.join(name), serde_json::to_string_pretty(value).unwrap()).unwrap();
}

fn simple_type(type_name: &str, pack: &str, display_name: &str) -> Value {
    json!({
        "type": type_name,
        "display_name": display_name,
        "pack": pack,
        "states": [
            {"name": "open", "category": "open"},
            {"name": "done", "category": "done"},
        ],
        "initial_state": "open",
        "transitions": [
            {"from": "open", "to": "done", "enforcement": "soft"},
        ],
        "fields_schema": [],
    })
}

fn simple_pack(name: &str, requires: &[&str], types: &[&str]) -> Value {
    let mut type_map = serde_json::Map::new();
    for type_name in types {
        type_map.insert(
            type_name.to_string(),
            simple_type(type_name, name, type_name),
        );
    }
    json!({
        "name": name,
        "version": "1.0.0",
        "display_name": name,
        "requires_packs": requires,
        "types": type_map,
    })
}

#[test]
fn test_installed_pack_layer() {
    let packs = TempDir::new().unwrap();
    write_doc(packs.path(), "ops.json", &simple_pack("ops", &["core"], &["runbook"]));

    let registry = TemplateRegistry::builder()
        .with_pack_dir(packs.path())
        .with_enabled_packs(["core", "planning", "ops"])
        .load()
        .unwrap();

    assert!(registry.has_type("runbook"));
    assert_eq!(registry.template("runbook").unwrap().pack, "ops");
    assert_eq!(registry.pack("ops").unwrap().version, "1.0.0");
}

/// An installed pack with the same name replaces the built-in pack
/// wholesale — whole-document replacement, not a merge.
#[test]
fn test_installed_pack_replaces_builtin_pack() {
    let packs = TempDir::new().unwrap();
    write_doc(
        packs.path(),
        "core.json",
        &simple_pack("core", &[], &["task"]),
    );

    let registry = TemplateRegistry::builder()
        .with_pack_dir(packs.path())
        .with_enabled_packs(["core"])
        .load()
        .unwrap();

    assert!(registry.has_type("task"));
    assert!(!registry.has_type("bug"), "replaced pack loses built-in types");
    assert_eq!(registry.template("task").unwrap().states.len(), 2);
}

#[test]
fn test_project_override_replaces_type() {
    let templates = TempDir::new().unwrap();
    write_doc(
        templates.path(),
        "bug.json",
        &simple_type("bug", "core", "Simplified Bug"),
    );

    let registry = TemplateRegistry::builder()
        .with_template_dir(templates.path())
        .load()
        .unwrap();

    let bug = registry.template("bug").unwrap();
    assert_eq!(bug.display_name, "Simplified Bug");
    assert_eq!(bug.states.len(), 2);
    assert_eq!(registry.initial_state("bug"), "open");
}

/// An override that names no pack inherits the pack of the type it
/// replaces.
#[test]
fn test_override_without_pack_field_inherits_existing_pack() {
    let templates = TempDir::new().unwrap();
    let mut doc = simple_type("bug", "", "Packless Override");
    doc.as_object_mut().unwrap().remove("pack");
    write_doc(templates.path(), "bug.json", &doc);

    let registry = TemplateRegistry::builder()
        .with_template_dir(templates.path())
        .load()
        .unwrap();

    let bug = registry.template("bug").unwrap();
    assert_eq!(bug.display_name, "Packless Override");
    assert_eq!(bug.pack, "core");
}

/// Overrides do not enable packs: an override for a type of a disabled
/// pack stays hidden.
#[test]
fn test_override_for_disabled_pack_is_hidden() {
    let templates = TempDir::new().unwrap();
    write_doc(
        templates.path(),
        "milestone.json",
        &simple_type("milestone", "planning", "Custom Milestone"),
    );

    let registry = TemplateRegistry::builder()
        .with_template_dir(templates.path())
        .with_enabled_packs(["core"])
        .load()
        .unwrap();

    assert!(!registry.has_type("milestone"));
}

/// An override for a brand-new type with an unknown pack is also hidden.
#[test]
fn test_override_with_unknown_pack_is_hidden() {
    let templates = TempDir::new().unwrap();
    write_doc(
        templates.path(),
        "widget.json",
        &simple_type("widget", "gadgets", "Widget"),
    );

    let registry = TemplateRegistry::builder()
        .with_template_dir(templates.path())
        .load()
        .unwrap();

    assert!(!registry.has_type("widget"));
}

/// Broken documents are logged and skipped; the rest of the layer loads.
#[test]
fn test_malformed_documents_are_skipped() {
    let packs = TempDir::new().unwrap();
    fs::write(packs.path().join("broken.json"), "{ not json").unwrap();
    write_doc(
        packs.path(),
        "missing_key.json",
        &json!({"version": "1.0.0", "types": {}}),
    );
    write_doc(packs.path(), "ops.json", &simple_pack("ops", &["core"], &["runbook"]));

    let templates = TempDir::new().unwrap();
    fs::write(templates.path().join("junk.json"), "[1, 2, 3]").unwrap();

    let registry = TemplateRegistry::builder()
        .with_pack_dir(packs.path())
        .with_template_dir(templates.path())
        .with_enabled_packs(["core", "planning", "ops"])
        .load()
        .unwrap();

    assert!(registry.has_type("runbook"));
    assert!(registry.has_type("bug"));
}

/// A pack whose types carry dangling references is rejected as a whole.
#[test]
fn test_pack_with_dangling_references_is_skipped() {
    let packs = TempDir::new().unwrap();
    let mut pack = simple_pack("ops", &["core"], &["runbook"]);
    pack["types"]["runbook"]["initial_state"] = json!("nowhere");
    write_doc(packs.path(), "ops.json", &pack);

    let registry = TemplateRegistry::builder()
        .with_pack_dir(packs.path())
        .with_enabled_packs(["core", "planning"])
        .load()
        .unwrap();

    assert!(!registry.has_type("runbook"));
}

#[test]
fn test_missing_dependency_fails_load() {
    let packs = TempDir::new().unwrap();
    write_doc(
        packs.path(),
        "extra.json",
        &simple_pack("extra", &["ghost"], &["thing"]),
    );

    let err = TemplateRegistry::builder()
        .with_pack_dir(packs.path())
        .with_enabled_packs(["core", "extra"])
        .load()
        .unwrap_err();

    assert_eq!(
        err,
        PackDependencyError::MissingDependency {
            pack: "extra".to_string(),
            requires: "ghost".to_string(),
        }
    );
}

/// Disabling a pack that an enabled pack depends on is the same failure.
#[test]
fn test_disabling_required_pack_fails_load() {
    // planning requires core; enabling planning alone must fail
    let err = TemplateRegistry::builder()
        .with_enabled_packs(["planning"])
        .load()
        .unwrap_err();

    assert_eq!(
        err,
        PackDependencyError::MissingDependency {
            pack: "planning".to_string(),
            requires: "core".to_string(),
        }
    );
}

#[test]
fn test_dependency_cycle_fails_load() {
    let packs = TempDir::new().unwrap();
    write_doc(packs.path(), "alpha.json", &simple_pack("alpha", &["beta"], &[]));
    write_doc(packs.path(), "beta.json", &simple_pack("beta", &["alpha"], &[]));

    let err = TemplateRegistry::builder()
        .with_pack_dir(packs.path())
        .with_enabled_packs(["alpha", "beta"])
        .load()
        .unwrap_err();

    match err {
        PackDependencyError::DependencyCycle { cycle } => {
            assert_eq!(cycle.first(), cycle.last());
            assert!(cycle.contains(&"alpha".to_string()));
            assert!(cycle.contains(&"beta".to_string()));
        }
        other => panic!("expected a cycle, got {:?}", other),
    }
}

/// Peer packs declaring the same type resolve deterministically: the later
/// pack in the enabled selection wins.
#[test]
fn test_peer_packs_same_type_later_enabled_wins() {
    let packs = TempDir::new().unwrap();
    let mut first = simple_pack("aaa", &[], &[]);
    first["types"] = json!({"gizmo": simple_type("gizmo", "aaa", "Gizmo A")});
    let mut second = simple_pack("bbb", &[], &[]);
    second["types"] = json!({"gizmo": simple_type("gizmo", "bbb", "Gizmo B")});
    write_doc(packs.path(), "aaa.json", &first);
    write_doc(packs.path(), "bbb.json", &second);

    let registry = TemplateRegistry::builder()
        .with_pack_dir(packs.path())
        .with_enabled_packs(["aaa", "bbb"])
        .load()
        .unwrap();
    assert_eq!(registry.template("gizmo").unwrap().display_name, "Gizmo B");

    let registry = TemplateRegistry::builder()
        .with_pack_dir(packs.path())
        .with_enabled_packs(["bbb", "aaa"])
        .load()
        .unwrap();
    assert_eq!(registry.template("gizmo").unwrap().display_name, "Gizmo A");
}

#[test]
fn test_unknown_enabled_pack_is_ignored() {
    let registry = TemplateRegistry::builder()
        .with_enabled_packs(["core", "planning", "no_such_pack"])
        .load()
        .unwrap();

    assert_eq!(registry.pack_names(), vec!["core", "planning"]);
}

/// Missing layer directories are empty layers, not errors.
#[test]
fn test_missing_directories_are_empty_layers() {
    let registry = TemplateRegistry::builder()
        .with_pack_dir("/definitely/not/a/real/path/packs")
        .with_template_dir("/definitely/not/a/real/path/templates")
        .load()
        .unwrap();

    assert!(registry.has_type("bug"));
}
