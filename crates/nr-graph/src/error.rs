//! Snapshot construction errors.

use nr_core::{CollabError, EntityId, EntityKind};

use crate::entity::PipeEnd;

pub type GraphResult<T> = Result<T, GraphError>;

/// Errors that make a snapshot unusable.
///
/// Geometric imperfections are not errors; they surface later as findings.
#[derive(Debug, Clone, PartialEq)]
pub enum GraphError {
    /// A pipe references a structure absent from the same snapshot.
    IncompleteEntity {
        pipe: EntityId,
        structure: EntityId,
        end: PipeEnd,
    },

    /// The same id appears twice in one snapshot, in either table.
    DuplicateId { kind: EntityKind, id: EntityId },

    /// A position or numeric attribute is NaN or infinite.
    NonFinite { id: EntityId, what: &'static str },

    /// Adjacency index disagrees with the pipe table.
    InconsistentAdjacency { pipe: EntityId, structure: EntityId },

    /// The model collaborator could not be read.
    SourceUnavailable(CollabError),
}

impl GraphError {
    /// Only collaborator outages are worth retrying; the rest are data problems.
    pub fn is_retryable(&self) -> bool {
        matches!(self, GraphError::SourceUnavailable(e) if e.is_retryable())
    }
}

impl std::fmt::Display for GraphError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GraphError::IncompleteEntity {
                pipe,
                structure,
                end,
            } => {
                write!(
                    f,
                    "Pipe {} {} refers to structure {} which is not in the snapshot",
                    pipe, end, structure
                )
            }
            GraphError::DuplicateId { kind, id } => {
                write!(f, "Duplicate {} id {} in snapshot", kind, id)
            }
            GraphError::NonFinite { id, what } => {
                write!(f, "Entity {} has a non-finite {}", id, what)
            }
            GraphError::InconsistentAdjacency { pipe, structure } => {
                write!(
                    f,
                    "Pipe {} in structure {}'s adjacency list but doesn't reference that structure",
                    pipe, structure
                )
            }
            GraphError::SourceUnavailable(err) => {
                write!(f, "Model source unavailable: {}", err)
            }
        }
    }
}

impl std::error::Error for GraphError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GraphError::SourceUnavailable(err) => Some(err),
            _ => None,
        }
    }
}

impl From<CollabError> for GraphError {
    fn from(err: CollabError) -> Self {
        GraphError::SourceUnavailable(err)
    }
}
