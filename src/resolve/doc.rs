//! Export documents for resolved boundaries.

use anyhow::{bail, Context, Result};
use serde::Serialize;

use crate::models::{Centroid, Location, Relation, Tag};

#[derive(Debug, Clone, Copy, Serialize)]
pub struct CenterPoint {
    pub lon: f64,
    pub lat: f64,
}

/// A fully resolved boundary, ready for bulk indexing.
#[derive(Debug, Serialize)]
pub struct BoundaryDoc {
    pub id: String,
    pub name: String,
    pub admin_level: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country_iso2: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country_iso3: Option<String>,
    pub center: CenterPoint,
    pub shape: Location,
    pub tags: Vec<Tag>,
}

/// Bulk-index envelope written as one JSONL line per boundary.
#[derive(Debug, Serialize)]
pub struct BulkEnvelope {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_type")]
    pub kind: &'static str,
    #[serde(rename = "_source")]
    pub source: BoundaryDoc,
}

impl BoundaryDoc {
    pub fn into_envelope(self) -> BulkEnvelope {
        BulkEnvelope {
            id: self.id.clone(),
            kind: "boundary",
            source: self,
        }
    }
}

/// `"France (terres)"` indexes as `"France"`.
fn clean_name(name: &str) -> String {
    let name = match name.find('(') {
        Some(pos) => &name[..pos],
        None => name,
    };
    name.trim().to_string()
}

/// Shape a relation with its resolved geometry and center into an export
/// document. The admin level must be present exactly once and in the 1..=11
/// administrative range.
pub fn make_boundary_doc(
    relation: &Relation,
    center: &Centroid,
    location: &Location,
) -> Result<BoundaryDoc> {
    if location.is_empty() {
        bail!("empty relation");
    }
    let mut admin_level = 0u32;
    let mut country_iso2 = None;
    let mut country_iso3 = None;
    for tag in &relation.tags {
        match tag.key.as_str() {
            "admin_level" => {
                let level: u32 = tag
                    .value
                    .parse()
                    .with_context(|| format!("cannot parse admin_level: {}", tag.value))?;
                if admin_level != 0 {
                    bail!("more than one admin level");
                }
                if !(1..=11).contains(&level) {
                    bail!("unexpected admin_level: {}", level);
                }
                admin_level = level;
            }
            "ISO3166-1" => country_iso2 = Some(tag.value.clone()),
            "ISO3166-1:alpha3" => country_iso3 = Some(tag.value.clone()),
            _ => {}
        }
    }
    Ok(BoundaryDoc {
        id: relation.id.to_string(),
        name: clean_name(relation.name()),
        admin_level,
        country_iso2,
        country_iso3,
        center: CenterPoint {
            lon: center.lon,
            lat: center.lat,
        },
        shape: location.clone(),
        tags: relation.tags.clone(),
    })
}
