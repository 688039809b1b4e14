//! Externally supplied reference points (survey data), keyed by entity label.

use std::path::Path;

use nr_core::{Point3, ensure_finite_point};
use nr_graph::PipeEnd;
use serde::{Deserialize, Serialize};

use crate::{RulesError, RulesResult};

/// One surveyed position.
///
/// Without `end` the label is matched against structures; with `end` it is
/// matched against that end of a pipe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferencePoint {
    pub label: String,
    pub position: Point3,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<PipeEnd>,
}

impl ReferencePoint {
    pub fn structure(label: impl Into<String>, position: Point3) -> Self {
        Self {
            label: label.into(),
            position,
            end: None,
        }
    }

    pub fn pipe_end(label: impl Into<String>, end: PipeEnd, position: Point3) -> Self {
        Self {
            label: label.into(),
            position,
            end: Some(end),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReferencePoints(Vec<ReferencePoint>);

impl ReferencePoints {
    pub fn new(points: Vec<ReferencePoint>) -> Self {
        Self(points)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ReferencePoint> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Load a JSON array of reference points.
    pub fn load_json(path: &Path) -> RulesResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let points: ReferencePoints = serde_json::from_str(&content)?;
        for p in points.iter() {
            ensure_finite_point(&p.position, "reference position")
                .map_err(|e| RulesError::Reference(format!("{}: {e}", p.label)))?;
        }
        Ok(points)
    }
}

impl FromIterator<ReferencePoint> for ReferencePoints {
    fn from_iter<I: IntoIterator<Item = ReferencePoint>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nr_core::point;

    #[test]
    fn parses_json_layout() {
        let json = r#"[
            {"label": "MH-1", "position": [1.0, 2.0, 3.0]},
            {"label": "L-7", "position": [4.0, 5.0, 6.0], "end": "end"}
        ]"#;
        let points: ReferencePoints = serde_json::from_str(json).unwrap();
        assert_eq!(points.len(), 2);
        let v: Vec<_> = points.iter().cloned().collect();
        assert_eq!(v[0], ReferencePoint::structure("MH-1", point(1.0, 2.0, 3.0)));
        assert_eq!(v[1].end, Some(PipeEnd::End));
    }
}
