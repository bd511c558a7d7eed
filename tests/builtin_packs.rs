//! Shape checks over the built-in pack data.

use workflow_templates::{Category, Enforcement, TemplateRegistry};

fn all_packs_registry() -> TemplateRegistry {
    TemplateRegistry::builder()
        .with_enabled_packs([
            "core",
            "planning",
            "requirements",
            "risk",
            "roadmap",
            "incident",
            "debt",
            "spike",
            "release",
        ])
        .load()
        .expect("all built-in packs resolve")
}

#[test]
fn test_nine_packs_ship() {
    let registry = all_packs_registry();
    assert_eq!(registry.packs().len(), 9);
    for pack in registry.packs() {
        assert!(!pack.version.is_empty(), "pack '{}' has a version", pack.name);
    }
}

#[test]
fn test_core_and_planning_are_complete() {
    let registry = all_packs_registry();

    let core = registry.pack("core").unwrap();
    let mut core_types: Vec<&str> = core.types.keys().map(String::as_str).collect();
    core_types.sort_unstable();
    assert_eq!(core_types, vec!["bug", "epic", "feature", "task"]);
    assert!(core.guide.is_some());
    assert!(core.requires_packs.is_empty());

    let planning = registry.pack("planning").unwrap();
    let mut planning_types: Vec<&str> = planning.types.keys().map(String::as_str).collect();
    planning_types.sort_unstable();
    assert_eq!(
        planning_types,
        vec!["deliverable", "milestone", "phase", "step", "work_package"]
    );
    assert!(planning.guide.is_some());
    assert_eq!(planning.requires_packs, vec!["core".to_string()]);
}

#[test]
fn test_stub_packs_are_empty_and_require_core() {
    let registry = all_packs_registry();
    for name in ["requirements", "risk", "roadmap", "incident", "debt", "spike", "release"] {
        let pack = registry.pack(name).expect(name);
        assert!(pack.types.is_empty(), "stub '{}' should carry no types yet", name);
        assert_eq!(pack.requires_packs, vec!["core".to_string()]);
    }
}

/// Task and epic keep the legacy three-state machine.
#[test]
fn test_task_and_epic_keep_legacy_three_state_machine() {
    let registry = all_packs_registry();
    for name in ["task", "epic"] {
        let template = registry.template(name).expect(name);
        let states: Vec<&str> = template.states.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(states, vec!["open", "in_progress", "done"]);
        assert_eq!(template.initial_state, "open");
        assert!(
            template
                .transitions
                .iter()
                .all(|t| t.enforcement == Enforcement::Soft && t.requires_fields.is_empty()),
            "legacy machine has no gates"
        );
    }
}

/// The bug flow: six states, exactly one hard edge, on verifying -> closed.
#[test]
fn test_bug_flow_shape() {
    let registry = all_packs_registry();
    let bug = registry.template("bug").unwrap();

    assert_eq!(bug.states.len(), 6);
    assert_eq!(bug.initial_state, "triage");

    let hard: Vec<_> = bug
        .transitions
        .iter()
        .filter(|t| t.enforcement == Enforcement::Hard)
        .collect();
    assert_eq!(hard.len(), 1);
    assert_eq!(hard[0].from, "verifying");
    assert_eq!(hard[0].to, "closed");
    assert_eq!(hard[0].requires_fields, vec!["fix_verification".to_string()]);

    // Exactly one field is required at closed, so a hard denial reports
    // exactly that field.
    let required_at_closed: Vec<&str> = bug
        .fields_schema
        .iter()
        .filter(|f| f.required_at.iter().any(|s| s == "closed"))
        .map(|f| f.name.as_str())
        .collect();
    assert_eq!(required_at_closed, vec!["fix_verification"]);
}

/// Feature and deliverable carry their rework loops; phase and step can be
/// skipped.
#[test]
fn test_rework_loops_and_skipped_states() {
    let registry = all_packs_registry();

    let feature = registry.template("feature").unwrap();
    assert!(feature.transition("building", "reviewing").is_some());
    assert!(feature.transition("reviewing", "building").is_some());

    let deliverable = registry.template("deliverable").unwrap();
    assert!(deliverable.transition("producing", "reviewing").is_some());
    assert!(deliverable.transition("reviewing", "producing").is_some());

    for name in ["phase", "step"] {
        let template = registry.template(name).expect(name);
        let skipped = template.state("skipped").expect("skipped state declared");
        assert_eq!(skipped.category, Category::Done);
        assert!(template.transition("pending", "skipped").is_some());
        assert!(template.transition("active", "skipped").is_some());
    }
}

/// Built-in convention: done-category states declare no outbound edges.
/// (Nothing in the engine enforces this; reopening stays legal through the
/// undeclared-transition advisory.)
#[test]
fn test_done_states_declare_no_outbound_edges() {
    let registry = all_packs_registry();
    for template in registry.templates() {
        for transition in &template.transitions {
            let category = registry
                .category(&template.name, &transition.from)
                .expect("endpoints are declared");
            assert_ne!(
                category,
                Category::Done,
                "type '{}' declares an edge out of done-state '{}'",
                template.name,
                transition.from
            );
        }
    }
}

/// Every type declares states in all the categories its flow needs, and
/// every template exposes exactly one initial state that is open-category.
#[test]
fn test_initial_states_are_open_category() {
    let registry = all_packs_registry();
    for template in registry.templates() {
        assert_eq!(
            registry.category(&template.name, &template.initial_state),
            Some(Category::Open),
            "type '{}'",
            template.name
        );
    }
}

#[test]
fn test_guides_respect_length_constraints() {
    let registry = all_packs_registry();
    for name in ["core", "planning"] {
        let guide = registry.pack(name).unwrap().guide.as_ref().expect(name);
        assert!(guide.overview.split_whitespace().count() <= 50);
        assert!(guide.when_to_use.split_whitespace().count() <= 30);
        assert!(guide.tips.len() >= 3);
        assert!(guide.common_mistakes.len() >= 2);
        assert!(!guide.state_diagram.is_empty());
    }
}
