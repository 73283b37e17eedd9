//! Representative point computation for multipolygon boundaries.
//!
//! The point is the barycenter of the largest sub-polygon's outer ring when
//! that lands inside the shape, and otherwise the midpoint of an interior
//! diagonal found from a convex vertex (see 3.6 in
//! http://apodeline.free.fr/FAQ/CGAFAQ/CGAFAQ-3.html). Shapes where neither
//! attempt stays inside, such as thin annuli, get no point at all.

use geo::{Area, Contains, Coord, LineString, Polygon};

use crate::models::{Centroid, Location};

use super::GeometryError;

fn polygon_from_rings(rings: &[Vec<[f64; 2]>]) -> Option<Polygon<f64>> {
    let mut iter = rings.iter().map(|ring| {
        LineString::new(
            ring.iter()
                .map(|p| Coord { x: p[0], y: p[1] })
                .collect::<Vec<_>>(),
        )
    });
    let exterior = iter.next()?;
    Some(Polygon::new(exterior, iter.collect()))
}

fn neighbour_vertices(len: usize, i: usize) -> (usize, usize) {
    let prev = if i > 0 { i - 1 } else { len - 1 };
    let next = if i < len - 1 { i + 1 } else { 0 };
    (prev, next)
}

/// First vertex whose neighbours turn outward, assuming a clockwise outer
/// ring.
fn find_convex_vertex(ring: &[[f64; 2]]) -> Option<usize> {
    let len = ring.len();
    for (i, v) in ring.iter().enumerate() {
        let (ai, bi) = neighbour_vertices(len, i);
        let a = ring[ai];
        let b = ring[bi];
        let cross = (a[0] - v[0]) * (b[1] - v[1]) - (a[1] - v[1]) * (b[0] - v[0]);
        if cross >= 0.0 {
            return Some(i);
        }
    }
    None
}

fn in_triangle(a: [f64; 2], v: [f64; 2], b: [f64; 2], q: [f64; 2]) -> bool {
    // Barycentric coordinates test. Not robust but good enough here.
    let d = (v[1] - b[1]) * (a[0] - b[0]) + (b[0] - v[0]) * (a[1] - b[1]);
    let x = ((v[1] - b[1]) * (q[0] - b[0]) + (b[0] - v[0]) * (q[1] - b[1])) / d;
    let y = ((b[1] - a[1]) * (q[0] - b[0]) + (a[0] - b[0]) * (q[1] - b[1])) / d;
    let z = 1.0 - x - y;
    (0.0..=1.0).contains(&x) && (0.0..=1.0).contains(&y) && (0.0..=1.0).contains(&z)
}

fn barycenter(ring: &[[f64; 2]]) -> [f64; 2] {
    let mut c = [0.0, 0.0];
    for p in ring {
        c[0] += p[0];
        c[1] += p[1];
    }
    c[0] /= ring.len() as f64;
    c[1] /= ring.len() as f64;
    c
}

/// Interior point of a simple (possibly non-convex) polygon ring: pick a
/// convex vertex, find the nearest other vertex inside its ear triangle and
/// return the midpoint of that diagonal. Convex rings fall back to the
/// barycenter.
fn simple_polygon_centroid(ring: &[[f64; 2]]) -> Result<[f64; 2], GeometryError> {
    let vi = find_convex_vertex(ring).ok_or(GeometryError::NoConvexVertex)?;
    let (ai, bi) = neighbour_vertices(ring.len(), vi);

    let a = ring[ai];
    let v = ring[vi];
    let b = ring[bi];

    let mut q_index = None;
    let mut q_dist = f64::MAX;
    for (i, &q) in ring.iter().enumerate() {
        if i == ai || i == vi || i == bi {
            continue;
        }
        if !in_triangle(a, v, b, q) {
            continue;
        }
        let dx = v[0] - q[0];
        let dy = v[1] - q[1];
        let d = dx * dx + dy * dy;
        if q_index.is_none() || d < q_dist {
            q_dist = d;
            q_index = Some(i);
        }
    }
    Ok(match q_index {
        None => barycenter(ring),
        Some(qi) => {
            let q = ring[qi];
            [(v[0] + q[0]) / 2.0, (v[1] + q[1]) / 2.0]
        }
    })
}

fn in_polygon(c: [f64; 2], poly: &Polygon<f64>) -> bool {
    poly.contains(&geo::Point::new(c[0], c[1]))
}

/// Compute a representative point guaranteed to lie inside the shape, or
/// `None` when no candidate lands inside.
pub fn compute_centroid(location: &Location) -> Result<Option<Centroid>, GeometryError> {
    let polygons: Vec<Option<Polygon<f64>>> = location
        .coordinates
        .iter()
        .map(|rings| polygon_from_rings(rings))
        .collect();

    // Work on the largest sub-polygon only.
    let mut max_area = 0.0;
    let mut max_poly = None;
    for (i, poly) in polygons.iter().enumerate() {
        if let Some(poly) = poly {
            let area = poly.unsigned_area();
            if area > max_area {
                max_area = area;
                max_poly = Some(i);
            }
        }
    }
    let Some(index) = max_poly else {
        return Ok(None);
    };
    let Some(poly) = &polygons[index] else {
        return Ok(None);
    };
    // The closing point repeats the first vertex; skipping the first point
    // leaves each distinct vertex exactly once.
    let outer = &location.coordinates[index][0][1..];

    let c = barycenter(outer);
    if in_polygon(c, poly) {
        return Ok(Some(Centroid {
            lon: c[0],
            lat: c[1],
            node_id: None,
        }));
    }

    // The diagonal construction handles concave outlines but not always
    // holes, so the result still needs a containment check.
    let c = simple_polygon_centroid(outer)?;
    if !in_polygon(c, poly) {
        return Ok(None);
    }
    Ok(Some(Centroid {
        lon: c[0],
        lat: c[1],
        node_id: None,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn centroid_of(coords: Vec<Vec<Vec<[f64; 2]>>>) -> Option<Centroid> {
        compute_centroid(&Location::multipolygon(coords)).unwrap()
    }

    #[test]
    fn test_square_centroid() {
        let c = centroid_of(vec![vec![vec![
            [0.0, 0.0],
            [0.0, 1.0],
            [1.0, 1.0],
            [1.0, 0.0],
            [0.0, 0.0],
        ]]])
        .unwrap();
        assert!((c.lon - 0.5).abs() < 1e-12);
        assert!((c.lat - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_horseshoe_centroid() {
        let c = centroid_of(vec![vec![vec![
            [0.0, 0.0],
            [3.0, 0.0],
            [3.0, 3.0],
            [3.0, 2.0],
            [1.0, 2.0],
            [1.0, 1.0],
            [3.0, 1.0],
            [3.0, 0.0],
            [0.0, 0.0],
        ]]])
        .unwrap();
        assert!((c.lon - 2.125).abs() < 1e-12);
        assert!((c.lat - 1.125).abs() < 1e-12);
    }

    #[test]
    fn test_square_with_hole_has_no_centroid() {
        // The barycenter falls inside the hole and the ear diagonal cannot
        // help, so the shape gets no point.
        let c = centroid_of(vec![vec![
            vec![
                [0.0, 0.0],
                [0.0, 3.0],
                [3.0, 3.0],
                [3.0, 0.0],
                [0.0, 0.0],
            ],
            vec![
                [1.0, 1.0],
                [2.0, 1.0],
                [2.0, 2.0],
                [1.0, 2.0],
                [1.0, 1.0],
            ],
        ]]);
        assert!(c.is_none());
    }

    #[test]
    fn test_largest_sub_polygon_wins() {
        let c = centroid_of(vec![
            vec![vec![
                [10.0, 10.0],
                [10.0, 11.0],
                [11.0, 11.0],
                [11.0, 10.0],
                [10.0, 10.0],
            ]],
            vec![vec![
                [0.0, 0.0],
                [0.0, 4.0],
                [4.0, 4.0],
                [4.0, 0.0],
                [0.0, 0.0],
            ]],
        ])
        .unwrap();
        assert!((c.lon - 2.0).abs() < 1e-12);
        assert!((c.lat - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_empty_location() {
        assert!(centroid_of(vec![]).is_none());
        assert!(centroid_of(vec![vec![]]).is_none());
    }
}
