//! Relation to multipolygon resolution.
//!
//! A boundary relation references ways (ring fragments) and sometimes other
//! relations (country borders built out of regional borders). Resolution
//! collects every fragment through a `BoundarySource`, assembles closed rings,
//! nests them and emits a GeoJSON-style `Location` with counter-clockwise
//! outer rings and clockwise holes.

pub mod doc;
pub mod nodes;

use anyhow::{anyhow, Result};
use geo::{Polygon, Winding};
use tracing::warn;

use crate::geometry::{close_rings, make_polygons};
use crate::models::{Linestring, Location, RefKind, Relation, RelRef, RingRole};
use crate::store::BoundarySource;

/// Selects which relations and relation members take part in geometry
/// building. Dataset-specific workarounds belong in implementations of this
/// trait, not in the resolution code.
pub trait RelationPolicy {
    /// Relations to leave out entirely.
    fn skip(&self, relation: &Relation) -> bool;

    /// Member roles that link a sub-relation without contributing geometry.
    fn skip_member_role(&self, role: &str) -> bool;
}

/// Policy for administrative boundaries.
pub struct AdminPolicy;

impl RelationPolicy for AdminPolicy {
    fn skip(&self, relation: &Relation) -> bool {
        relation.tag("type") == Some("collection")
            || relation.tag("type") == Some("multilinestring")
            || relation.tag("admin_level").map_or(true, str::is_empty)
            // Things like religious provinces carry admin tags but are not
            // administrative areas.
            || relation.tag("boundary") == Some("religious_administration")
    }

    fn skip_member_role(&self, role: &str) -> bool {
        matches!(
            role,
            // Empty roles show up on shared territories.
            "" | "subarea" | "subarea:FIXME" | "collection" | "disused:subarea"
        )
    }
}

fn ring_role(role: &str) -> Option<RingRole> {
    match role {
        "outer" => Some(RingRole::Outer),
        "inner" => Some(RingRole::Inner),
        "" => Some(RingRole::None),
        _ => None,
    }
}

/// Split a relation's members into way references and geometry-bearing
/// sub-relation references, both sorted by id. Returns `None` when a
/// sub-relation member has a role the policy cannot place.
fn collect_way_refs(
    relation: &Relation,
    policy: &impl RelationPolicy,
) -> Option<(Vec<RelRef>, Vec<RelRef>)> {
    let mut ways = Vec::new();
    let mut relations = Vec::new();
    for member in &relation.refs {
        match member.kind {
            RefKind::Node => continue,
            RefKind::Way => ways.push(member.clone()),
            RefKind::Relation => {
                if member.role == "outer" || member.role == "inner" {
                    relations.push(member.clone());
                } else if policy.skip_member_role(&member.role) {
                    continue;
                } else {
                    warn!(
                        relation = relation.id,
                        member = member.id,
                        role = %member.role,
                        "cannot handle relation member role"
                    );
                    return None;
                }
            }
        }
    }
    ways.sort_by_key(|r| r.id);
    relations.sort_by_key(|r| r.id);
    Some((ways, relations))
}

/// Load ring fragments for way members. A missing way is an error; a way
/// member with an unknown role makes the whole relation unresolvable and
/// yields `None`.
fn collect_way_geometries(
    refs: &[RelRef],
    source: &impl BoundarySource,
) -> Result<Option<Vec<Linestring>>> {
    let mut rings = Vec::with_capacity(refs.len());
    for member in refs {
        let Some(role) = ring_role(&member.role) else {
            warn!(way = member.id, role = %member.role, "unsupported ring role");
            return Ok(None);
        };
        let mut ring = source
            .way(member.id)?
            .ok_or_else(|| anyhow!("cannot resolve way: {}", member.id))?;
        ring.role = role;
        rings.push(ring);
    }
    Ok(Some(rings))
}

fn collect_relation_ways(
    refs: &[RelRef],
    source: &impl BoundarySource,
    policy: &impl RelationPolicy,
) -> Result<Option<Vec<Linestring>>> {
    let mut rings = Vec::new();
    for member in refs {
        let relation = source
            .relation(member.id)?
            .ok_or_else(|| anyhow!("cannot resolve subrelation: {}", member.id))?;
        let Some((ways, subs)) = collect_way_refs(&relation, policy) else {
            return Ok(None);
        };
        if !subs.is_empty() {
            match collect_relation_ways(&subs, source, policy)? {
                Some(lines) => rings.extend(lines),
                None => return Ok(None),
            }
        }
        match collect_way_geometries(&ways, source)? {
            Some(lines) => rings.extend(lines),
            None => return Ok(None),
        }
    }
    Ok(Some(rings))
}

/// Close the collected fragments into rings and nest them into polygons.
pub fn build_geometry(rings: Vec<Linestring>) -> Result<Vec<Polygon<f64>>> {
    let rings = close_rings(rings)?;
    Ok(make_polygons(&rings)?)
}

fn ring_coordinates(line: &geo::LineString<f64>) -> Vec<[f64; 2]> {
    line.coords().map(|c| [c.x, c.y]).collect()
}

/// Convert polygons to the stored multipolygon representation. Outer rings
/// are rewound counter-clockwise and holes clockwise, the GeoJSON convention.
pub fn polygons_to_location(polygons: Vec<Polygon<f64>>) -> Location {
    let mut shapes = Vec::with_capacity(polygons.len());
    for polygon in polygons {
        let mut rings = Vec::with_capacity(1 + polygon.interiors().len());
        let mut outer = polygon.exterior().clone();
        outer.make_ccw_winding();
        rings.push(ring_coordinates(&outer));
        for hole in polygon.interiors() {
            let mut hole = hole.clone();
            hole.make_cw_winding();
            rings.push(ring_coordinates(&hole));
        }
        shapes.push(rings);
    }
    Location::multipolygon(shapes)
}

/// Resolve one relation to its boundary shape. `Ok(None)` means the relation
/// was skipped (by policy, or because a member makes it unresolvable);
/// errors mean the data was expected to resolve and did not.
pub fn build_location(
    relation: &Relation,
    source: &impl BoundarySource,
    policy: &impl RelationPolicy,
) -> Result<Option<Location>> {
    if policy.skip(relation) {
        return Ok(None);
    }
    let Some((ways, subs)) = collect_way_refs(relation, policy) else {
        return Ok(None);
    };
    let mut rings = match collect_way_geometries(&ways, source)? {
        Some(rings) => rings,
        None => return Ok(None),
    };
    match collect_relation_ways(&subs, source, policy)? {
        Some(lines) => rings.extend(lines),
        None => return Ok(None),
    }
    if rings.is_empty() {
        return Ok(None);
    }
    let polygons = build_geometry(rings)?;
    Ok(Some(polygons_to_location(polygons)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Point, Tag};
    use hashbrown::HashMap;

    #[derive(Default)]
    struct MemSource {
        ways: HashMap<i64, Linestring>,
        relations: HashMap<i64, Relation>,
    }

    impl MemSource {
        fn add_way(&mut self, id: i64, coords: &[(i64, i64)]) {
            self.ways.insert(
                id,
                Linestring {
                    id,
                    role: RingRole::None,
                    points: coords
                        .iter()
                        .map(|&(lon, lat)| Point {
                            lon: lon * 10_000,
                            lat: lat * 10_000,
                        })
                        .collect(),
                },
            );
        }

        fn add_relation(&mut self, relation: Relation) {
            self.relations.insert(relation.id, relation);
        }
    }

    impl BoundarySource for MemSource {
        fn way(&self, id: i64) -> Result<Option<Linestring>> {
            Ok(self.ways.get(&id).cloned())
        }

        fn relation(&self, id: i64) -> Result<Option<Relation>> {
            Ok(self.relations.get(&id).cloned())
        }
    }

    fn admin_relation(id: i64, refs: Vec<RelRef>) -> Relation {
        Relation {
            id,
            refs,
            tags: vec![
                Tag::new("type", "boundary"),
                Tag::new("boundary", "administrative"),
                Tag::new("admin_level", "8"),
            ],
            ..Default::default()
        }
    }

    fn way_ref(id: i64, role: &str) -> RelRef {
        RelRef {
            id,
            kind: RefKind::Way,
            role: role.to_string(),
        }
    }

    fn rel_ref(id: i64, role: &str) -> RelRef {
        RelRef {
            id,
            kind: RefKind::Relation,
            role: role.to_string(),
        }
    }

    fn signed_area(ring: &[[f64; 2]]) -> f64 {
        let mut area = 0.0;
        for w in ring.windows(2) {
            area += (w[1][0] - w[0][0]) * (w[1][1] + w[0][1]);
        }
        // Shoelace with this sign convention: negative is counter-clockwise.
        area
    }

    #[test]
    fn test_outer_only_relation() {
        let mut source = MemSource::default();
        source.add_way(1, &[(0, 0), (0, 1), (1, 1)]);
        source.add_way(2, &[(1, 1), (1, 0), (0, 0)]);
        let relation = admin_relation(10, vec![way_ref(1, "outer"), way_ref(2, "outer")]);

        let location = build_location(&relation, &source, &AdminPolicy)
            .unwrap()
            .unwrap();
        assert_eq!(location.kind, "multipolygon");
        assert_eq!(location.coordinates.len(), 1);
        assert_eq!(location.coordinates[0].len(), 1);
        let outer = &location.coordinates[0][0];
        assert_eq!(outer.first(), outer.last());
        assert!(signed_area(outer) < 0.0, "outer ring must be ccw");
    }

    #[test]
    fn test_outer_with_hole() {
        let mut source = MemSource::default();
        source.add_way(1, &[(0, 0), (0, 3), (3, 3), (3, 0), (0, 0)]);
        source.add_way(2, &[(1, 1), (1, 2), (2, 2), (2, 1), (1, 1)]);
        let relation = admin_relation(10, vec![way_ref(1, "outer"), way_ref(2, "inner")]);

        let location = build_location(&relation, &source, &AdminPolicy)
            .unwrap()
            .unwrap();
        assert_eq!(location.coordinates.len(), 1);
        let rings = &location.coordinates[0];
        assert_eq!(rings.len(), 2);
        assert!(signed_area(&rings[0]) < 0.0, "outer ring must be ccw");
        assert!(signed_area(&rings[1]) > 0.0, "hole must be cw");
    }

    #[test]
    fn test_sub_relation_recursion() {
        let mut source = MemSource::default();
        source.add_way(1, &[(0, 0), (0, 1), (1, 1)]);
        source.add_way(2, &[(1, 1), (1, 0), (0, 0)]);
        source.add_relation(admin_relation(20, vec![way_ref(1, "outer"), way_ref(2, "outer")]));
        let parent = admin_relation(10, vec![rel_ref(20, "outer")]);

        let location = build_location(&parent, &source, &AdminPolicy)
            .unwrap()
            .unwrap();
        assert_eq!(location.coordinates.len(), 1);
        assert!(!location.coordinates[0][0].is_empty());
    }

    #[test]
    fn test_ignorable_member_roles() {
        let mut source = MemSource::default();
        source.add_way(1, &[(0, 0), (0, 1), (1, 1), (1, 0), (0, 0)]);
        let relation = admin_relation(
            10,
            vec![
                way_ref(1, "outer"),
                rel_ref(99, "subarea"),
                rel_ref(98, ""),
                RelRef {
                    id: 5,
                    kind: RefKind::Node,
                    role: "admin_centre".to_string(),
                },
            ],
        );

        // Subareas and node members are ignored without being resolved.
        let location = build_location(&relation, &source, &AdminPolicy)
            .unwrap()
            .unwrap();
        assert_eq!(location.coordinates.len(), 1);
    }

    #[test]
    fn test_unknown_relation_member_role_skips() {
        let mut source = MemSource::default();
        source.add_way(1, &[(0, 0), (0, 1), (1, 1), (1, 0), (0, 0)]);
        let relation = admin_relation(10, vec![way_ref(1, "outer"), rel_ref(99, "main_area")]);
        let location = build_location(&relation, &source, &AdminPolicy).unwrap();
        assert!(location.is_none());
    }

    #[test]
    fn test_unknown_way_role_skips() {
        let mut source = MemSource::default();
        source.add_way(1, &[(0, 0), (0, 1), (1, 1), (1, 0), (0, 0)]);
        let relation = admin_relation(10, vec![way_ref(1, "exclave?")]);
        let location = build_location(&relation, &source, &AdminPolicy).unwrap();
        assert!(location.is_none());
    }

    #[test]
    fn test_missing_way_is_an_error() {
        let source = MemSource::default();
        let relation = admin_relation(10, vec![way_ref(1, "outer")]);
        assert!(build_location(&relation, &source, &AdminPolicy).is_err());
    }

    #[test]
    fn test_policy_skips() {
        let source = MemSource::default();
        let mut relation = admin_relation(10, vec![]);
        relation.tags.retain(|t| t.key != "admin_level");
        assert!(build_location(&relation, &source, &AdminPolicy)
            .unwrap()
            .is_none());

        let mut relation = admin_relation(11, vec![]);
        for tag in &mut relation.tags {
            if tag.key == "type" {
                tag.value = "multilinestring".to_string();
            }
        }
        assert!(build_location(&relation, &source, &AdminPolicy)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_empty_members_resolve_to_nothing() {
        let source = MemSource::default();
        let relation = admin_relation(10, vec![]);
        assert!(build_location(&relation, &source, &AdminPolicy)
            .unwrap()
            .is_none());
    }
}
