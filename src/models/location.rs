//! Resolved boundary geometry as stored in the database and exported.

use serde::{Deserialize, Serialize};

/// A GeoJSON-style multipolygon: a list of polygons, each a list of rings
/// (first ring is the outer boundary, remaining rings are holes), each ring a
/// closed list of `[lon, lat]` pairs in degrees.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    #[serde(rename = "type")]
    pub kind: String,
    pub coordinates: Vec<Vec<Vec<[f64; 2]>>>,
}

impl Location {
    pub fn multipolygon(coordinates: Vec<Vec<Vec<[f64; 2]>>>) -> Self {
        Self {
            kind: "multipolygon".to_string(),
            coordinates,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.coordinates.is_empty()
    }
}

/// A representative interior point for a boundary. `node_id` is set when the
/// point came from a dedicated admin-centre node rather than a computation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Centroid {
    pub lon: f64,
    pub lat: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<i64>,
}
