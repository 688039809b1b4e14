//! nr-graph: network model layer for netrecon.
//!
//! Provides:
//! - Entity data structures (Structure, Pipe, Entity)
//! - Snapshot builder with referential validation
//! - `NetworkGraph` with its structure -> pipe adjacency index
//! - Spatial grid for tolerance-based proximity queries
//! - The model collaborator interface and snapshot reader
//!
//! # Example
//!
//! ```
//! use nr_core::point;
//! use nr_graph::{GraphBuilder, Pipe, Structure};
//!
//! let s1 = Structure::new("S1", point(0.0, 0.0, 0.0));
//! let s2 = Structure::new("S2", point(10.0, 0.0, -2.0));
//! let p1 = Pipe::between("P1", &s1, &s2);
//!
//! let mut builder = GraphBuilder::new();
//! builder.add_structure(s1);
//! builder.add_structure(s2);
//! builder.add_pipe(p1);
//! let graph = builder.build().unwrap();
//!
//! assert_eq!(graph.structure_count(), 2);
//! assert_eq!(graph.pipe_count(), 1);
//! ```

pub mod builder;
pub mod entity;
pub mod error;
pub mod graph;
pub mod model;
pub mod snapshot;
pub mod spatial;
pub(crate) mod validate;

// Re-exports for ergonomics
pub use builder::GraphBuilder;
pub use entity::{Entity, Pipe, PipeEnd, Structure, StructureCategory};
pub use error::{GraphError, GraphResult};
pub use graph::NetworkGraph;
pub use model::{MemoryModel, ModelCollaborator};
pub use snapshot::load_snapshot;
pub use spatial::SpatialGrid;
