//! OSM entity types decoded from o5m streams.
//!
//! Coordinates are fixed-precision integers scaled by 1e7, matching the wire
//! format. Conversion to degrees happens at the geometry boundary only.

use serde::{Deserialize, Serialize};

/// A fixed-precision coordinate pair. Equality is exact integer equality,
/// which makes endpoints safe to use as hash keys during ring assembly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub lon: i64,
    pub lat: i64,
}

impl Point {
    /// Scale factor between wire integers and degrees.
    pub const SCALE: f64 = 1e7;

    pub fn lon_degrees(&self) -> f64 {
        self.lon as f64 / Self::SCALE
    }

    pub fn lat_degrees(&self) -> f64 {
        self.lat as f64 / Self::SCALE
    }
}

/// A single key/value tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Entity metadata. Timestamp and changeset are running totals across records
/// of the same kind; a version delta of zero clears everything back to this
/// default state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub version: u64,
    pub timestamp: i64,
    pub changeset: i64,
    pub uid: String,
    pub author: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: i64,
    pub meta: Metadata,
    pub lon: i64,
    pub lat: i64,
    pub tags: Vec<Tag>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Way {
    pub id: i64,
    pub meta: Metadata,
    pub nodes: Vec<i64>,
    pub tags: Vec<Tag>,
}

/// Target kind of a relation member, selected on the wire by a leading
/// `'0'`/`'1'`/`'2'` character in the reference string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefKind {
    Node,
    Way,
    Relation,
}

impl RefKind {
    pub fn from_wire(c: u8) -> Option<Self> {
        match c {
            b'0' => Some(RefKind::Node),
            b'1' => Some(RefKind::Way),
            b'2' => Some(RefKind::Relation),
            _ => None,
        }
    }

    /// Index into the per-kind running id counters.
    pub fn index(&self) -> usize {
        match self {
            RefKind::Node => 0,
            RefKind::Way => 1,
            RefKind::Relation => 2,
        }
    }
}

/// A relation member: resolved id, target kind and free-text role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelRef {
    pub id: i64,
    pub kind: RefKind,
    pub role: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    pub id: i64,
    pub meta: Metadata,
    pub refs: Vec<RelRef>,
    pub tags: Vec<Tag>,
}

impl Relation {
    /// Look up a tag value by key.
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|t| t.key == key)
            .map(|t| t.value.as_str())
    }

    /// The raw `name` tag, or an empty string.
    pub fn name(&self) -> &str {
        self.tag("name").unwrap_or("")
    }
}

/// Dataset bounding box, already converted to degrees.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

/// Nesting role of a ring inside a multipolygon relation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RingRole {
    Outer,
    Inner,
    #[default]
    None,
}

/// An ordered point sequence derived from a way, or from several ways fused
/// together. Rings are linestrings whose first and last points coincide.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Linestring {
    pub id: i64,
    #[serde(default)]
    pub role: RingRole,
    pub points: Vec<Point>,
}

impl Linestring {
    pub fn start(&self) -> Point {
        self.points[0]
    }

    pub fn end(&self) -> Point {
        self.points[self.points.len() - 1]
    }

    pub fn is_closed(&self) -> bool {
        self.start() == self.end()
    }

    pub fn reverse(&mut self) {
        self.points.reverse();
    }
}
