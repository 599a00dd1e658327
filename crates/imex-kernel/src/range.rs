//! Identifier ranges reserved from the registry.

use serde::{Deserialize, Serialize};

use crate::error::IdentifierError;
use crate::xref::ImexId;

/// A contiguous block `[from, to]` of reserved identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentifierRange {
    pub submission_id: String,
    pub from: u64,
    pub to: u64,
    pub partner: String,
}

impl IdentifierRange {
    /// Number of identifiers in the range; zero when `to < from`.
    pub fn len(&self) -> u64 {
        if self.to < self.from {
            0
        } else {
            self.to - self.from + 1
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, value: u64) -> bool {
        (self.from..=self.to).contains(&value)
    }

    /// Identifier at `offset` from the start of the range.
    pub fn nth(&self, offset: u64) -> Option<Result<ImexId, IdentifierError>> {
        if offset >= self.len() {
            return None;
        }
        Some(ImexId::new(self.from + offset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(from: u64, to: u64) -> IdentifierRange {
        IdentifierRange {
            submission_id: "sub-1".to_string(),
            from,
            to,
            partner: "IntAct".to_string(),
        }
    }

    #[test]
    fn single_identifier_range() {
        let r = range(1000, 1000);
        assert_eq!(r.len(), 1);
        assert_eq!(
            r.nth(0).expect("in range").expect("non-zero").to_string(),
            "IM-1000"
        );
        assert!(r.nth(1).is_none());
    }

    #[test]
    fn inverted_range_is_empty() {
        assert!(range(10, 9).is_empty());
        assert!(range(10, 9).nth(0).is_none());
    }

    #[test]
    fn wire_shape_is_camel_case() {
        let json = serde_json::to_value(range(1, 5)).expect("range serializes");
        assert_eq!(json["submissionId"], "sub-1");
        assert_eq!(json["from"], 1);
        assert_eq!(json["to"], 5);
    }
}
