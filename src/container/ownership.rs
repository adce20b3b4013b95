//! Decide whether an existing container was created by this tool.

use tracing::debug;

use crate::engine::ContainerInspect;

/// Label stamped on every container (and volume) this tool creates.
pub const OWNERSHIP_LABEL: &str = "dev.agentbox.managed";

/// Sentinel value of [`OWNERSHIP_LABEL`].
pub const OWNERSHIP_SENTINEL: &str = "agentbox";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    /// Label present with the sentinel value.
    Confirmed,
    /// No label, but the image matches: a legacy container created before
    /// labels were applied. Destructive operations need explicit confirmation.
    Ambiguous,
    /// Neither matches. Blocks every mutating operation.
    Foreign,
}

/// Ownership as seen from a fresh inspect.
pub fn verify(inspect: &ContainerInspect, expected_image: &str) -> Ownership {
    let ownership = match inspect.labels.get(OWNERSHIP_LABEL) {
        Some(value) if value == OWNERSHIP_SENTINEL => Ownership::Confirmed,
        Some(_) => Ownership::Foreign,
        None if same_image(&inspect.image, expected_image) => Ownership::Ambiguous,
        None => Ownership::Foreign,
    };
    debug!(
        "ownership of {}: {:?} (image={}, expected={})",
        inspect.id, ownership, inspect.image, expected_image
    );
    ownership
}

/// Compare image references, treating a missing tag as `:latest`.
pub fn same_image(actual: &str, expected: &str) -> bool {
    normalize_image(actual) == normalize_image(expected)
}

fn normalize_image(reference: &str) -> String {
    let reference = reference.trim();
    if reference.contains('@') {
        return reference.to_string();
    }
    // A ':' after the last '/' is a tag; one before it is a registry port.
    let last_segment = reference.rsplit('/').next().unwrap_or(reference);
    if last_segment.contains(':') {
        reference.to_string()
    } else {
        format!("{}:latest", reference)
    }
}
