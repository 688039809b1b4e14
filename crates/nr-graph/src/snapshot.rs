//! Snapshot reader: model collaborator -> `NetworkGraph`.

use tracing::{debug, info};

use crate::builder::GraphBuilder;
use crate::error::GraphResult;
use crate::graph::NetworkGraph;
use crate::model::ModelCollaborator;

/// Pull a point-in-time set of entities from the model into a graph.
///
/// Read-only. Fails with `SourceUnavailable` when the collaborator cannot be
/// reached and with `IncompleteEntity` when a pipe references a structure
/// absent from the same snapshot.
pub fn load_snapshot(model: &dyn ModelCollaborator) -> GraphResult<NetworkGraph> {
    let structures = model.list_structures()?;
    let pipes = model.list_pipes()?;
    debug!(
        structures = structures.len(),
        pipes = pipes.len(),
        "snapshot read"
    );

    let mut builder = GraphBuilder::with_capacity(structures.len(), pipes.len());
    builder.extend_structures(structures);
    builder.extend_pipes(pipes);
    let graph = builder.build()?;

    info!(
        structures = graph.structure_count(),
        pipes = graph.pipe_count(),
        networks = graph.network_count(),
        "snapshot loaded"
    );
    Ok(graph)
}
