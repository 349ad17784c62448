//! Sub-resource kinds of a loan application.

use serde::{Deserialize, Serialize};

/// The kinds of record managed by the loan origination resource APIs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Application,
    Party,
    Document,
    Offer,
    StatusHistory,
    Score,
    Decision,
}

impl ResourceKind {
    /// Every kind, application first.
    pub const ALL: [ResourceKind; 7] = [
        ResourceKind::Application,
        ResourceKind::Party,
        ResourceKind::Document,
        ResourceKind::Offer,
        ResourceKind::StatusHistory,
        ResourceKind::Score,
        ResourceKind::Decision,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Application => "loan_application",
            ResourceKind::Party => "application_party",
            ResourceKind::Document => "application_document",
            ResourceKind::Offer => "proposed_offer",
            ResourceKind::StatusHistory => "status_history",
            ResourceKind::Score => "underwriting_score",
            ResourceKind::Decision => "underwriting_decision",
        }
    }

    /// Returns true for records owned by a parent loan application.
    pub fn is_sub_resource(&self) -> bool {
        !matches!(self, ResourceKind::Application)
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_application_is_top_level() {
        let top_level: Vec<_> = ResourceKind::ALL
            .iter()
            .filter(|k| !k.is_sub_resource())
            .collect();
        assert_eq!(top_level, vec![&ResourceKind::Application]);
    }

    #[test]
    fn test_display() {
        assert_eq!(ResourceKind::Party.to_string(), "application_party");
        assert_eq!(ResourceKind::Decision.to_string(), "underwriting_decision");
    }
}
