//! Ring assembly from way fragments.
//!
//! Boundary relations reference ways that each cover an arbitrary slice of a
//! ring. Assembly runs in two phases: arcs whose shared endpoints have degree
//! exactly two are fused unconditionally, then the remaining lines are chained
//! into closed rings by backtracking search over the endpoint graph.

use geo::{Coord, LineString, Polygon, Validation};
use hashbrown::HashMap;

use crate::models::{Linestring, Point, RingRole};

use super::union_find::UnionFind;
use super::GeometryError;

/// A partial ring under construction. Pushed lines are oriented so the chain
/// stays contiguous from `start` to `end`.
struct RingParts {
    parts: Vec<Linestring>,
    start: Point,
    end: Point,
}

impl RingParts {
    fn new(first: &Linestring) -> Self {
        Self {
            parts: vec![first.clone()],
            start: first.start(),
            end: first.end(),
        }
    }

    fn end(&self) -> Point {
        self.end
    }

    fn is_closed(&self) -> bool {
        self.start == self.end
    }

    /// Append a line, reversing it if needed so it continues from the current
    /// end point.
    fn push(&mut self, line: &Linestring) -> Result<(), GeometryError> {
        let mut line = line.clone();
        if line.end() == self.end {
            line.reverse();
        }
        if self.end != line.start() {
            return Err(GeometryError::LinkMismatch);
        }
        self.end = line.end();
        self.parts.push(line);
        Ok(())
    }

    fn pop(&mut self) {
        if let Some(p) = self.parts.pop() {
            self.end = p.start();
        }
    }

    /// Fuse the chained parts into one closed line. The ring keeps the first
    /// part's id; the role survives only if every part agrees on it.
    fn make_ring(&self) -> Linestring {
        debug_assert!(self.is_closed());
        let mut base = self.parts[0].clone();
        for other in &self.parts[1..] {
            debug_assert_eq!(base.end(), other.start());
            base.points.extend_from_slice(&other.points[1..]);
            if base.role != RingRole::None && base.role != other.role {
                base.role = RingRole::None;
            }
        }
        base
    }
}

fn endpoint_index(lines: &[Linestring]) -> HashMap<Point, Vec<usize>> {
    let mut endpoints: HashMap<Point, Vec<usize>> = HashMap::with_capacity(lines.len());
    for (i, line) in lines.iter().enumerate() {
        endpoints.entry(line.start()).or_default().push(i);
        endpoints.entry(line.end()).or_default().push(i);
    }
    endpoints
}

/// Splice `absorbed` into `base`, keeping `base`'s id and role.
fn merge_lines(base: &mut Linestring, absorbed: &mut Linestring) -> Result<(), GeometryError> {
    if base.start() == absorbed.start() || base.end() == absorbed.end() {
        absorbed.reverse();
    }
    if base.end() == absorbed.start() {
        base.points.extend_from_slice(&absorbed.points[1..]);
    } else if base.start() == absorbed.end() {
        let mut points = std::mem::take(&mut absorbed.points);
        points.extend_from_slice(&base.points[1..]);
        base.points = points;
    } else {
        return Err(GeometryError::LinkMismatch);
    }
    Ok(())
}

/// Unconditionally fuse lines meeting at endpoints of degree exactly two.
/// This collapses long chains before the backtracking phase, which keeps the
/// search space small on real boundary data.
fn merge_arcs(mut lines: Vec<Linestring>) -> Result<Vec<Linestring>, GeometryError> {
    let endpoints = endpoint_index(&lines);

    let mut uf = UnionFind::new(lines.len());
    for indices in endpoints.values() {
        if indices.len() != 2 {
            continue;
        }
        let i = uf.find(indices[0]);
        let j = uf.find(indices[1]);
        if i == j {
            continue;
        }
        uf.merge(i, j);
        let mut absorbed = std::mem::take(&mut lines[j]);
        merge_lines(&mut lines[i], &mut absorbed)?;
        let root = uf.find(i);
        if root != i {
            lines.swap(root, i);
        }
    }
    Ok(lines
        .into_iter()
        .enumerate()
        .filter(|(i, _)| uf.find(*i) == *i)
        .map(|(_, line)| line)
        .collect())
}

/// A ring is usable when it closes and its boundary does not self-intersect.
fn is_valid_ring(ring: &Linestring) -> bool {
    if ring.points.len() < 4 || !ring.is_closed() {
        return false;
    }
    let coords: Vec<Coord<f64>> = ring
        .points
        .iter()
        .map(|p| Coord {
            x: p.lon_degrees(),
            y: p.lat_degrees(),
        })
        .collect();
    Polygon::new(LineString::new(coords), vec![]).is_valid()
}

fn grow_ring(
    parts: &mut RingParts,
    lines: &[Linestring],
    endpoints: &HashMap<Point, Vec<usize>>,
    seen: &mut [bool],
) -> Result<Option<Linestring>, GeometryError> {
    if parts.is_closed() {
        let ring = parts.make_ring();
        if is_valid_ring(&ring) {
            return Ok(Some(ring));
        }
        return Ok(None);
    }
    let Some(candidates) = endpoints.get(&parts.end()) else {
        return Ok(None);
    };
    for &next in candidates {
        if seen[next] {
            continue;
        }
        let line = &lines[next];
        if line.start() != parts.end() && line.end() != parts.end() {
            continue;
        }
        seen[next] = true;
        parts.push(line)?;
        if let Some(ring) = grow_ring(parts, lines, endpoints, seen)? {
            return Ok(Some(ring));
        }
        parts.pop();
        seen[next] = false;
    }
    Ok(None)
}

/// Combine a collection of lines into closed rings. Every returned ring has
/// equal first and last points. Fails if any line cannot be chained into a
/// valid ring.
pub fn close_rings(lines: Vec<Linestring>) -> Result<Vec<Linestring>, GeometryError> {
    // Zero-node ways exist in the wild; they have no endpoints to chain.
    if let Some(line) = lines.iter().find(|l| l.points.is_empty()) {
        return Err(GeometryError::UnclosableRing(line.id));
    }
    let lines = merge_arcs(lines)?;
    let endpoints = endpoint_index(&lines);

    let mut rings = Vec::new();
    let mut seen = vec![false; lines.len()];
    for i in 0..lines.len() {
        if seen[i] {
            continue;
        }
        seen[i] = true;
        let mut parts = RingParts::new(&lines[i]);
        match grow_ring(&mut parts, &lines, &endpoints, &mut seen)? {
            Some(ring) => rings.push(ring),
            None => return Err(GeometryError::UnclosableRing(lines[i].id)),
        }
    }
    Ok(rings)
}
