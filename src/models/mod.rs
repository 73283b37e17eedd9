//! Core data models shared by the decoder, the geometry engine and the store.

pub mod location;
pub mod osm;

pub use location::{Centroid, Location};
pub use osm::{
    BoundingBox, Linestring, Metadata, Node, Point, RefKind, RelRef, Relation, RingRole, Tag, Way,
};
