//! Propose/confirm gate for model writebacks.
//!
//! The model is never written without a reviewer accepting the change.

use std::collections::BTreeSet;

use nr_core::EntityId;
use nr_graph::Entity;

/// One pending store -> model change, as shown to the reviewer.
#[derive(Debug, Clone, PartialEq)]
pub struct WritebackProposal {
    pub id: EntityId,
    /// Current model copy, which will be overwritten.
    pub current: Entity,
    /// Store copy that would be written.
    pub proposed: Entity,
    /// Values agreed at the last sync, if any.
    pub base: Option<Entity>,
}

/// Human-in-the-loop decision point.
pub trait WritebackReviewer {
    /// Return the ids to apply. Ids not among the proposals are ignored.
    fn review(&self, proposals: &[WritebackProposal]) -> Vec<EntityId>;
}

impl<F> WritebackReviewer for F
where
    F: Fn(&[WritebackProposal]) -> Vec<EntityId>,
{
    fn review(&self, proposals: &[WritebackProposal]) -> Vec<EntityId> {
        self(proposals)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RejectAll;

impl WritebackReviewer for RejectAll {
    fn review(&self, _: &[WritebackProposal]) -> Vec<EntityId> {
        Vec::new()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl WritebackReviewer for AcceptAll {
    fn review(&self, proposals: &[WritebackProposal]) -> Vec<EntityId> {
        proposals.iter().map(|p| p.id.clone()).collect()
    }
}

/// Accept a fixed set of ids.
#[derive(Debug, Clone, Default)]
pub struct AcceptIds(pub BTreeSet<EntityId>);

impl FromIterator<EntityId> for AcceptIds {
    fn from_iter<I: IntoIterator<Item = EntityId>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl WritebackReviewer for AcceptIds {
    fn review(&self, proposals: &[WritebackProposal]) -> Vec<EntityId> {
        proposals
            .iter()
            .filter(|p| self.0.contains(&p.id))
            .map(|p| p.id.clone())
            .collect()
    }
}

/// Outcome of one review round.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Review {
    pub accepted: Vec<EntityId>,
    pub rejected: Vec<EntityId>,
}

/// Split proposals into accepted and rejected ids, in proposal order.
pub fn propose_writeback(
    reviewer: &dyn WritebackReviewer,
    proposals: &[WritebackProposal],
) -> Review {
    let chosen: BTreeSet<EntityId> = reviewer.review(proposals).into_iter().collect();
    let (accepted, rejected) = proposals
        .iter()
        .map(|p| p.id.clone())
        .partition(|id| chosen.contains(id));
    Review { accepted, rejected }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nr_core::point;
    use nr_graph::Structure;

    fn proposal(id: &str) -> WritebackProposal {
        let e: Entity = Structure::new(id, point(0.0, 0.0, 0.0)).into();
        WritebackProposal {
            id: id.into(),
            current: e.clone(),
            proposed: e,
            base: None,
        }
    }

    #[test]
    fn reviewer_picks_subset() {
        let proposals = [proposal("A"), proposal("B"), proposal("C")];
        let reviewer: AcceptIds = [EntityId::from("B"), EntityId::from("Z")].into_iter().collect();
        let review = propose_writeback(&reviewer, &proposals);
        assert_eq!(review.accepted, vec![EntityId::from("B")]);
        assert_eq!(review.rejected, vec![EntityId::from("A"), EntityId::from("C")]);
    }

    #[test]
    fn default_reviewers() {
        let proposals = [proposal("A")];
        assert_eq!(propose_writeback(&AcceptAll, &proposals).accepted.len(), 1);
        assert_eq!(propose_writeback(&RejectAll, &proposals).rejected.len(), 1);
        let closure =
            |p: &[WritebackProposal]| -> Vec<EntityId> { p.iter().map(|x| x.id.clone()).collect() };
        assert_eq!(propose_writeback(&closure, &proposals).accepted.len(), 1);
    }
}
