//! Purchaser ID allocation.

use serde::{Deserialize, Serialize};

use crate::model::RecordId;

/// Format of a human-readable purchaser ID derived from a record identifier.
///
/// Identifiers wider than `width` are rendered in full rather than truncated,
/// so the output can exceed the nominal width but never loses information.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdFormat {
    pub prefix: String,
    pub width: usize,
}

impl Default for IdFormat {
    fn default() -> Self {
        Self {
            prefix: "C-".to_string(),
            width: 7,
        }
    }
}

impl IdFormat {
    pub fn new(prefix: impl Into<String>, width: usize) -> Self {
        Self {
            prefix: prefix.into(),
            width,
        }
    }

    /// Derive the purchaser ID for a store-assigned record identifier.
    /// Pure: the same identifier always yields the same ID.
    pub fn allocate(&self, id: RecordId) -> String {
        format!("{}{:0width$}", self.prefix, id.0, width = self.width)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_pads_to_fixed_width() {
        let format = IdFormat::default();
        assert_eq!(format.allocate(RecordId(42)), "C-0000042");
        assert_eq!(format.allocate(RecordId(1)), "C-0000001");
    }

    #[test]
    fn allocate_is_deterministic_and_collision_free() {
        let format = IdFormat::default();
        assert_eq!(format.allocate(RecordId(42)), format.allocate(RecordId(42)));

        let mut seen = std::collections::HashSet::new();
        for n in [1, 9, 10, 99, 1_000_000, 9_999_999, 10_000_000, 123_456_789] {
            assert!(seen.insert(format.allocate(RecordId(n))));
        }
    }

    #[test]
    fn oversized_identifier_exceeds_width_without_truncation() {
        let format = IdFormat::new("C-", 3);
        assert_eq!(format.allocate(RecordId(12_345)), "C-12345");
    }

    #[test]
    fn custom_prefix_and_width() {
        let format = IdFormat::new("PUR", 5);
        assert_eq!(format.allocate(RecordId(7)), "PUR00007");
    }
}
