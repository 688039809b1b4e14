//! Finding types.

use std::fmt;

use chrono::{DateTime, Utc};
use nr_core::{Axis, EntityId, Real};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingKind {
    UnconnectedEnd,
    SlopeDiscontinuity,
    CoordinateMismatch,
    DegenerateGeometry,
}

impl FindingKind {
    pub const ALL: [FindingKind; 4] = [
        FindingKind::UnconnectedEnd,
        FindingKind::SlopeDiscontinuity,
        FindingKind::CoordinateMismatch,
        FindingKind::DegenerateGeometry,
    ];

    pub fn severity(self) -> Severity {
        match self {
            FindingKind::UnconnectedEnd | FindingKind::DegenerateGeometry => Severity::Error,
            FindingKind::SlopeDiscontinuity | FindingKind::CoordinateMismatch => {
                Severity::Warning
            }
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            FindingKind::UnconnectedEnd => "unconnected_end",
            FindingKind::SlopeDiscontinuity => "slope_discontinuity",
            FindingKind::CoordinateMismatch => "coordinate_mismatch",
            FindingKind::DegenerateGeometry => "degenerate_geometry",
        }
    }
}

impl fmt::Display for FindingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingStatus {
    #[default]
    Open,
    Acknowledged,
    Resolved,
}

/// Identity of a finding across validation runs.
///
/// Entity ids are kept sorted so a pair of pipes has one key regardless of
/// which side a check visited first. `qualifier` separates findings that
/// share kind and entities, such as the two ends of one pipe or the axes of
/// one coordinate mismatch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FindingKey {
    pub kind: FindingKind,
    pub entities: Vec<EntityId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qualifier: Option<String>,
}

impl FindingKey {
    pub fn new(kind: FindingKind, entities: impl IntoIterator<Item = EntityId>) -> Self {
        let mut entities: Vec<EntityId> = entities.into_iter().collect();
        entities.sort();
        entities.dedup();
        Self {
            kind,
            entities,
            qualifier: None,
        }
    }

    pub fn with_qualifier(mut self, qualifier: impl Into<String>) -> Self {
        self.qualifier = Some(qualifier.into());
        self
    }

    /// Short stable id: first 16 hex chars of the SHA-256 of the key.
    pub fn id(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.kind.label().as_bytes());
        for e in &self.entities {
            hasher.update([0u8]);
            hasher.update(e.as_str().as_bytes());
        }
        if let Some(q) = &self.qualifier {
            hasher.update([1u8]);
            hasher.update(q.as_bytes());
        }
        let digest = hasher.finalize();
        digest[..8].iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl fmt::Display for FindingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[", self.kind)?;
        for (i, e) in self.entities.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{e}")?;
        }
        f.write_str("]")?;
        if let Some(q) = &self.qualifier {
            write!(f, ":{q}")?;
        }
        Ok(())
    }
}

/// A detected rule violation. Not necessarily an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub id: String,
    pub key: FindingKey,
    pub severity: Severity,
    /// Size of the violation in the rule's own units (length or slope).
    pub deviation: Real,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub axis: Option<Axis>,
    pub first_detected: DateTime<Utc>,
    #[serde(default)]
    pub status: FindingStatus,
    pub message: String,
}

impl Finding {
    pub fn new(key: FindingKey, deviation: Real, detected: DateTime<Utc>) -> Self {
        let message = format!("{key} deviation {deviation:.4}");
        Self {
            id: key.id(),
            severity: key.kind.severity(),
            key,
            deviation,
            axis: None,
            first_detected: detected,
            status: FindingStatus::Open,
            message,
        }
    }

    pub fn with_axis(mut self, axis: Axis) -> Self {
        self.axis = Some(axis);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn kind(&self) -> FindingKind {
        self.key.kind
    }

    pub fn is_open(&self) -> bool {
        self.status == FindingStatus::Open
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_is_order_independent() {
        let a = FindingKey::new(
            FindingKind::SlopeDiscontinuity,
            [EntityId::from("P2"), EntityId::from("P1")],
        );
        let b = FindingKey::new(
            FindingKind::SlopeDiscontinuity,
            [EntityId::from("P1"), EntityId::from("P2")],
        );
        assert_eq!(a, b);
        assert_eq!(a.id(), b.id());
        assert_eq!(a.id().len(), 16);
    }

    #[test]
    fn qualifier_changes_identity() {
        let start = FindingKey::new(FindingKind::UnconnectedEnd, [EntityId::from("P1")])
            .with_qualifier("start");
        let end = FindingKey::new(FindingKind::UnconnectedEnd, [EntityId::from("P1")])
            .with_qualifier("end");
        assert_ne!(start.id(), end.id());
        assert_eq!(end.to_string(), "unconnected_end[P1]:end");
    }

    #[test]
    fn severity_by_kind() {
        assert_eq!(FindingKind::UnconnectedEnd.severity(), Severity::Error);
        assert_eq!(FindingKind::SlopeDiscontinuity.severity(), Severity::Warning);
        assert!(Severity::Error > Severity::Warning);
    }
}
