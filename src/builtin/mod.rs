//! Pack documents compiled into the binary.
//!
//! Built-in data goes through the exact same [`parse_pack`] path as an
//! installed pack document, so an authoring mistake here fails the same way
//! a bad installed file does — and is caught by this module's tests rather
//! than at a customer site. `core` and `planning` ship complete; the other
//! seven packs are name stubs that exist so `requires_packs` declarations
//! resolve while their types land incrementally.

use tracing::error;

use crate::model::WorkflowPack;
use crate::parse::parse_pack;

/// Embedded pack documents, in load order.
const PACK_DOCUMENTS: &[(&str, &str)] = &[
    ("core", include_str!("core.json")),
    ("planning", include_str!("planning.json")),
    ("requirements", include_str!("requirements.json")),
    ("risk", include_str!("risk.json")),
    ("roadmap", include_str!("roadmap.json")),
    ("incident", include_str!("incident.json")),
    ("debt", include_str!("debt.json")),
    ("spike", include_str!("spike.json")),
    ("release", include_str!("release.json")),
];

/// Parses every built-in pack document.
///
/// A document that fails to parse is logged and dropped rather than
/// panicking; the test suite pins all nine as well-formed, so in practice
/// this returns all of them.
pub fn packs() -> Vec<WorkflowPack> {
    PACK_DOCUMENTS
        .iter()
        .filter_map(|(name, text)| {
            let value = match serde_json::from_str(text) {
                Ok(value) => value,
                Err(err) => {
                    error!(pack = %name, error = %err, "built-in pack document is not valid JSON");
                    return None;
                }
            };
            match parse_pack(&value) {
                Ok(pack) => Some(pack),
                Err(err) => {
                    error!(pack = %name, error = %err, "built-in pack document failed to parse");
                    None
                }
            }
        })
        .collect()
}
