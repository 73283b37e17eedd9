//! Laurel - administrative boundary extraction from OpenStreetMap o5m dumps.
//!
//! This library provides the streaming o5m decoder, the multipolygon
//! reconstruction engine and the persistence layer shared by the CLI binary.

pub mod geometry;
pub mod models;
pub mod o5m;
pub mod resolve;
pub mod store;

pub use models::{Centroid, Linestring, Location, Point, Relation, Way};
