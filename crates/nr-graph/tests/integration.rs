//! Integration tests for nr-graph.

use nr_core::{CollabError, point};
use nr_graph::{
    Entity, GraphBuilder, GraphError, MemoryModel, Pipe, PipeEnd, Structure, load_snapshot,
};

fn chain(n: usize) -> (Vec<Structure>, Vec<Pipe>) {
    let structures: Vec<Structure> = (0..n)
        .map(|i| Structure::new(format!("S{i:03}"), point(i as f64 * 10.0, 0.0, -(i as f64))))
        .collect();
    let pipes = structures
        .windows(2)
        .enumerate()
        .map(|(i, w)| Pipe::between(format!("P{i:03}"), &w[0], &w[1]))
        .collect();
    (structures, pipes)
}

#[test]
fn build_minimal_graph() {
    // Build: S1 -> [P1] -> S2
    let s1 = Structure::new("S1", point(0.0, 0.0, 0.0));
    let s2 = Structure::new("S2", point(10.0, 0.0, -2.0));
    let p1 = Pipe::between("P1", &s1, &s2);

    let mut builder = GraphBuilder::new();
    builder.add_structure(s1).add_structure(s2).add_pipe(p1);
    let graph = builder.build().unwrap();

    assert_eq!(graph.structure_count(), 2);
    assert_eq!(graph.pipe_count(), 1);

    let pipe = graph.pipe(&"P1".into()).unwrap();
    assert_eq!(graph.structure_at(pipe, PipeEnd::Start).unwrap().id.as_str(), "S1");
    assert_eq!(graph.structure_at(pipe, PipeEnd::End).unwrap().id.as_str(), "S2");
    assert_eq!(graph.incident_pipes(&"S2".into()).count(), 1);
}

#[test]
fn chain_middle_structures_have_two_pipes() {
    let (structures, pipes) = chain(5);
    let mut builder = GraphBuilder::new();
    builder.extend_structures(structures);
    builder.extend_pipes(pipes);
    let graph = builder.build().unwrap();

    assert_eq!(graph.degree(&"S000".into()), 1);
    assert_eq!(graph.degree(&"S002".into()), 2);
    assert_eq!(graph.degree(&"S004".into()), 1);
    assert_eq!(graph.network_count(), 1);

    let incident: Vec<_> = graph
        .incident_pipes(&"S002".into())
        .map(|id| id.as_str().to_string())
        .collect();
    assert_eq!(incident, vec!["P001", "P002"]);
}

#[test]
fn load_snapshot_from_model() {
    let (structures, pipes) = chain(3);
    let model = MemoryModel::with_entities(
        structures
            .into_iter()
            .map(Entity::from)
            .chain(pipes.into_iter().map(Entity::from)),
    );

    let graph = load_snapshot(&model).unwrap();
    assert_eq!(graph.structure_count(), 3);
    assert_eq!(graph.pipe_count(), 2);
}

#[test]
fn load_snapshot_rejects_dangling_pipe() {
    let s1 = Structure::new("S1", point(0.0, 0.0, 0.0));
    let s2 = Structure::new("S2", point(10.0, 0.0, -2.0));
    let p1 = Pipe::between("P1", &s1, &s2);
    let model = MemoryModel::with_entities([Entity::from(s1), Entity::from(p1)]);

    let err = load_snapshot(&model).unwrap_err();
    assert!(matches!(err, GraphError::IncompleteEntity { .. }));
    assert!(!err.is_retryable());
}

#[test]
fn load_snapshot_offline_is_retryable() {
    let model = MemoryModel::new();
    model.set_offline(true);

    let err = load_snapshot(&model).unwrap_err();
    assert!(matches!(
        err,
        GraphError::SourceUnavailable(CollabError::Unavailable { .. })
    ));
    assert!(err.is_retryable());
}

#[test]
fn empty_graph() {
    let graph = GraphBuilder::new().build().unwrap();
    assert!(graph.is_empty());
    assert_eq!(graph.network_count(), 0);
}

#[test]
fn large_graph() {
    let (structures, pipes) = chain(1000);
    let mut builder = GraphBuilder::new();
    builder.extend_structures(structures);
    builder.extend_pipes(pipes);
    let graph = builder.build().unwrap();

    assert_eq!(graph.structure_count(), 1000);
    assert_eq!(graph.pipe_count(), 999);
    assert_eq!(graph.network_count(), 1);
}

#[test]
fn parallel_pipes() {
    // Two pipes between the same pair of structures
    let s1 = Structure::new("S1", point(0.0, 0.0, 0.0));
    let s2 = Structure::new("S2", point(10.0, 0.0, -1.0));
    let p1 = Pipe::between("P1", &s1, &s2);
    let p2 = Pipe::between("P2", &s1, &s2);

    let mut builder = GraphBuilder::new();
    builder.add_structure(s1).add_structure(s2).add_pipe(p1).add_pipe(p2);
    let graph = builder.build().unwrap();

    assert_eq!(graph.degree(&"S1".into()), 2);
    assert_eq!(graph.degree(&"S2".into()), 2);
}
