//! nr-core: stable foundation for netrecon.
//!
//! Contains:
//! - numeric (Real + finiteness checks + float helpers)
//! - geometry (3D points, distances, per-axis deviation)
//! - ids (opaque entity ids and revision stamps)
//! - collab (error taxonomy shared by the external collaborators)
//! - error (shared error types)

pub mod collab;
pub mod error;
pub mod geometry;
pub mod ids;
pub mod numeric;

// Re-exports: nice ergonomics for downstream crates
pub use collab::{CollabError, CollabResult};
pub use error::{CoreError, CoreResult};
pub use geometry::*;
pub use ids::*;
pub use numeric::*;
