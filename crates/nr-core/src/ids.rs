use core::fmt;

use serde::{Deserialize, Serialize};

/// Opaque, stable handle assigned by the model collaborator.
///
/// The core never interprets the contents; it only compares and orders them.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({})", self.0)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for EntityId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Which table an entity lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Structure,
    Pipe,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Structure => f.write_str("structure"),
            EntityKind::Pipe => f.write_str("pipe"),
        }
    }
}

/// Monotonically comparable marker of when an entity last changed.
///
/// Stamps from the model and from the store are separate sequences; only
/// stamps from the same side are compared.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Revision(u64);

impl Revision {
    pub const ZERO: Revision = Revision(0);

    pub fn new(v: u64) -> Self {
        Self(v)
    }

    pub fn get(self) -> u64 {
        self.0
    }

    pub fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl fmt::Debug for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_id_orders_lexically() {
        let mut ids = vec![EntityId::from("P2"), EntityId::from("P10"), EntityId::from("A")];
        ids.sort();
        assert_eq!(ids[0].as_str(), "A");
        assert_eq!(ids[1].as_str(), "P10");
    }

    #[test]
    fn entity_id_serializes_transparently() {
        let json = serde_json::to_string(&EntityId::from("S1")).unwrap();
        assert_eq!(json, "\"S1\"");
    }

    #[test]
    fn revision_next_advances() {
        let v1 = Revision::new(1);
        assert!(v1.next() > v1);
        assert_eq!(format!("{}", v1.next()), "v2");
    }
}
