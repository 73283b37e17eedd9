//! Planar geometry for boundary reconstruction.
//!
//! Rings are assembled from way fragments, nested into a containment forest
//! and turned into polygons with holes. Everything here works on degree
//! coordinates; the fixed-precision integer representation stops at the
//! module boundary.

pub mod centroid;
pub mod inclusion;
pub mod ring;
mod union_find;

pub use centroid::compute_centroid;
pub use inclusion::make_polygons;
pub use ring::close_rings;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GeometryError {
    /// A line fragment could not be chained into any closed ring.
    #[error("cannot close ring: {0}")]
    UnclosableRing(i64),
    /// The containment relation between rings is circular.
    #[error("cycle detected in containment graph")]
    CycleDetected,
    /// A polygon ring has no convex vertex, so no interior diagonal exists.
    #[error("cannot find convex vertex")]
    NoConvexVertex,
    /// Two lines were merged without sharing an endpoint.
    #[error("lines are not linked")]
    LinkMismatch,
}
