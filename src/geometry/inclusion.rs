//! Ring containment analysis and polygon assembly.
//!
//! Rings nest arbitrarily deep: a country outer ring can hold an enclave
//! hole which itself holds an exclave island. The pairwise containment
//! matrix is reduced to a forest where each ring hangs off its closest
//! enclosing ring, then alternating forest levels become polygon shells
//! and holes.

use geo::orient::{Direction, Orient};
use geo::{unary_union, BooleanOps, Contains, Coord, LineString, MultiPolygon, Polygon};

use crate::models::Linestring;

use super::GeometryError;

/// Convert a closed ring to a polygon in degree coordinates. Orientation is
/// normalized so later winding decisions start from a known state.
pub(crate) fn ring_to_polygon(ring: &Linestring) -> Polygon<f64> {
    let coords: Vec<Coord<f64>> = ring
        .points
        .iter()
        .map(|p| Coord {
            x: p.lon_degrees(),
            y: p.lat_degrees(),
        })
        .collect();
    Polygon::new(LineString::new(coords), Vec::new()).orient(Direction::Default)
}

/// Pairwise containment matrix: `m[i][j]` is true when shape `i` contains
/// shape `j`. Shapes never contain themselves, and exactly equal shapes are
/// treated as siblings rather than as mutually containing.
pub(crate) fn compute_inclusion(shapes: &[Polygon<f64>]) -> Vec<Vec<bool>> {
    let n = shapes.len();
    let mut matrix = vec![vec![false; n]; n];
    for (i, outer) in shapes.iter().enumerate() {
        for (j, inner) in shapes.iter().enumerate() {
            if i != j && outer.contains(inner) {
                matrix[i][j] = true;
            }
        }
    }
    for i in 0..n {
        for j in 0..i {
            if matrix[i][j] && matrix[j][i] {
                matrix[i][j] = false;
                matrix[j][i] = false;
            }
        }
    }
    matrix
}

/// Containment forest over ring indices. `children[i]` lists the rings
/// directly inside ring `i`.
#[derive(Debug)]
pub(crate) struct InclusionForest {
    pub children: Vec<Vec<usize>>,
    pub roots: Vec<usize>,
}

/// Reduce the containment matrix to a forest by keeping, for every ring, the
/// enclosing ring at the end of the longest containment chain from a root.
/// That parent is the closest one, so forest depth alternates between shells
/// and holes.
pub(crate) fn forest_from_matrix(matrix: &[Vec<bool>]) -> Result<InclusionForest, GeometryError> {
    let n = matrix.len();
    let mut children: Vec<Vec<usize>> = matrix
        .iter()
        .map(|row| (0..n).filter(|&j| row[j]).collect())
        .collect();

    let mut has_parent = vec![false; n];
    for row in matrix {
        for (j, &contained) in row.iter().enumerate() {
            if contained {
                has_parent[j] = true;
            }
        }
    }
    let roots: Vec<usize> = (0..n).filter(|&i| !has_parent[i]).collect();
    if roots.is_empty() && n > 0 {
        return Err(GeometryError::CycleDetected);
    }

    // Longest chain wins: (parent, depth of parent) per node.
    let mut best: Vec<Option<(usize, usize)>> = vec![None; n];
    let mut on_path = vec![false; n];
    for &root in &roots {
        collect_parents(root, 0, &children, &mut best, &mut on_path)?;
    }
    for i in 0..n {
        children[i].retain(|&c| best[c].is_some_and(|(parent, _)| parent == i));
    }
    Ok(InclusionForest { children, roots })
}

fn collect_parents(
    node: usize,
    depth: usize,
    children: &[Vec<usize>],
    best: &mut [Option<(usize, usize)>],
    on_path: &mut [bool],
) -> Result<(), GeometryError> {
    if on_path[node] {
        return Err(GeometryError::CycleDetected);
    }
    on_path[node] = true;
    for &child in &children[node] {
        if best[child].is_none_or(|(_, d)| d < depth) {
            best[child] = Some((node, depth));
        }
        collect_parents(child, depth + 1, children, best, on_path)?;
    }
    on_path[node] = false;
    Ok(())
}

/// Walk the forest and build polygons: each root becomes a shell, its
/// children become holes, and grandchildren are islands pushed back as new
/// roots. Holes are merged with one union before the subtraction, which is
/// far cheaper than subtracting them one by one.
pub(crate) fn assemble_polygons(
    forest: &InclusionForest,
    shapes: &[Polygon<f64>],
) -> Vec<Polygon<f64>> {
    let mut stack = forest.roots.clone();
    let mut polygons = Vec::new();
    while let Some(root) = stack.pop() {
        let mut holes: Vec<Polygon<f64>> = Vec::new();
        for &child in &forest.children[root] {
            holes.push(shapes[child].clone());
            stack.extend(&forest.children[child]);
        }
        if holes.is_empty() {
            polygons.push(shapes[root].clone());
            continue;
        }
        let merged: MultiPolygon<f64> = unary_union(&holes);
        let carved = shapes[root].difference(&merged);
        polygons.extend(carved.0);
    }
    polygons
}

/// Build polygons (one outer ring, zero or more holes) from closed rings.
pub fn make_polygons(rings: &[Linestring]) -> Result<Vec<Polygon<f64>>, GeometryError> {
    let shapes: Vec<Polygon<f64>> = rings.iter().map(ring_to_polygon).collect();
    let matrix = compute_inclusion(&shapes);
    let forest = forest_from_matrix(&matrix)?;
    Ok(assemble_polygons(&forest, &shapes))
}
