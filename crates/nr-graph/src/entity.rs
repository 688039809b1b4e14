//! Network entities as read from the model collaborator.

use std::collections::BTreeMap;

use nr_core::{EntityId, EntityKind, Point3, Real, Revision, distance};
use serde::{Deserialize, Serialize};

/// Role of a structure in the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StructureCategory {
    #[default]
    Junction,
    Terminus,
    Access,
    Other,
}

/// A network node: junction, access point or terminus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Structure {
    pub id: EntityId,
    /// Human label used to match external reference points. Falls back to the id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub position: Point3,
    #[serde(default)]
    pub category: StructureCategory,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub revision: Revision,
}

impl Structure {
    pub fn new(id: impl Into<EntityId>, position: Point3) -> Self {
        Self {
            id: id.into(),
            label: None,
            position,
            category: StructureCategory::Junction,
            attributes: BTreeMap::new(),
            revision: Revision::new(1),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_category(mut self, category: StructureCategory) -> Self {
        self.category = category;
        self
    }

    pub fn with_revision(mut self, revision: Revision) -> Self {
        self.revision = revision;
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn label_or_id(&self) -> &str {
        self.label.as_deref().unwrap_or(self.id.as_str())
    }
}

/// Which end of a pipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipeEnd {
    Start,
    End,
}

impl PipeEnd {
    pub const BOTH: [PipeEnd; 2] = [PipeEnd::Start, PipeEnd::End];
}

impl std::fmt::Display for PipeEnd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipeEnd::Start => f.write_str("start"),
            PipeEnd::End => f.write_str("end"),
        }
    }
}

/// A network edge between two structures.
///
/// Endpoint positions are denormalized from the structures so that
/// tolerance checks work even when the structure linkage is intact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pipe {
    pub id: EntityId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub start_structure: EntityId,
    pub end_structure: EntityId,
    pub start: Point3,
    pub end: Point3,
    /// Nominal size (inner diameter).
    pub size: Real,
    #[serde(default)]
    pub material: String,
    /// Signed rise over run.
    pub slope: Real,
    pub length: Real,
    #[serde(default)]
    pub revision: Revision,
}

impl Pipe {
    /// Pipe spanning two structures, with positions, length and slope
    /// derived from the structure positions.
    pub fn between(id: impl Into<EntityId>, from: &Structure, to: &Structure) -> Self {
        let start = from.position;
        let end = to.position;
        let length = distance(&start, &end);
        let run = ((end.x - start.x).powi(2) + (end.y - start.y).powi(2)).sqrt();
        let slope = if run > 0.0 {
            (end.z - start.z) / run
        } else {
            0.0
        };
        Self {
            id: id.into(),
            label: None,
            start_structure: from.id.clone(),
            end_structure: to.id.clone(),
            start,
            end,
            size: 0.3,
            material: String::new(),
            slope,
            length,
            revision: Revision::new(1),
        }
    }

    pub fn with_slope(mut self, slope: Real) -> Self {
        self.slope = slope;
        self
    }

    pub fn with_end_position(mut self, end: Point3) -> Self {
        self.end = end;
        self
    }

    pub fn with_start_position(mut self, start: Point3) -> Self {
        self.start = start;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_revision(mut self, revision: Revision) -> Self {
        self.revision = revision;
        self
    }

    pub fn endpoint(&self, end: PipeEnd) -> &Point3 {
        match end {
            PipeEnd::Start => &self.start,
            PipeEnd::End => &self.end,
        }
    }

    pub fn structure_at(&self, end: PipeEnd) -> &EntityId {
        match end {
            PipeEnd::Start => &self.start_structure,
            PipeEnd::End => &self.end_structure,
        }
    }

    /// Straight-line distance between the two endpoints.
    pub fn span(&self) -> Real {
        distance(&self.start, &self.end)
    }

    pub fn label_or_id(&self) -> &str {
        self.label.as_deref().unwrap_or(self.id.as_str())
    }
}

/// Either kind of network entity, as exchanged with the collaborators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Entity {
    Structure(Structure),
    Pipe(Pipe),
}

impl Entity {
    pub fn id(&self) -> &EntityId {
        match self {
            Entity::Structure(s) => &s.id,
            Entity::Pipe(p) => &p.id,
        }
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            Entity::Structure(_) => EntityKind::Structure,
            Entity::Pipe(_) => EntityKind::Pipe,
        }
    }

    pub fn revision(&self) -> Revision {
        match self {
            Entity::Structure(s) => s.revision,
            Entity::Pipe(p) => p.revision,
        }
    }

    pub fn set_revision(&mut self, revision: Revision) {
        match self {
            Entity::Structure(s) => s.revision = revision,
            Entity::Pipe(p) => p.revision = revision,
        }
    }

    /// Same entity with the revision stamp replaced.
    pub fn with_revision(mut self, revision: Revision) -> Self {
        self.set_revision(revision);
        self
    }
}

impl From<Structure> for Entity {
    fn from(s: Structure) -> Self {
        Entity::Structure(s)
    }
}

impl From<Pipe> for Entity {
    fn from(p: Pipe) -> Self {
        Entity::Pipe(p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nr_core::point;

    #[test]
    fn pipe_between_derives_slope_and_length() {
        let s1 = Structure::new("S1", point(0.0, 0.0, 0.0));
        let s2 = Structure::new("S2", point(10.0, 0.0, -2.0));
        let p = Pipe::between("P1", &s1, &s2);
        assert_eq!(p.slope, -0.2);
        assert!((p.length - 104.0_f64.sqrt()).abs() < 1e-12);
        assert_eq!(p.structure_at(PipeEnd::End).as_str(), "S2");
    }

    #[test]
    fn vertical_pipe_has_zero_slope() {
        let s1 = Structure::new("S1", point(0.0, 0.0, 0.0));
        let s2 = Structure::new("S2", point(0.0, 0.0, -3.0));
        assert_eq!(Pipe::between("P1", &s1, &s2).slope, 0.0);
    }

    #[test]
    fn entity_revision_accessors() {
        let s = Structure::new("S1", point(0.0, 0.0, 0.0));
        let e = Entity::from(s).with_revision(Revision::new(7));
        assert_eq!(e.revision(), Revision::new(7));
        assert_eq!(e.kind(), EntityKind::Structure);
        assert_eq!(e.id().as_str(), "S1");
    }

    #[test]
    fn entity_json_is_tagged() {
        let s = Structure::new("S1", point(1.0, 2.0, 3.0)).with_label("MH-1");
        let json = serde_json::to_value(Entity::from(s)).unwrap();
        assert_eq!(json["type"], "structure");
        assert_eq!(json["label"], "MH-1");
        assert_eq!(json["position"], serde_json::json!([1.0, 2.0, 3.0]));
    }
}
