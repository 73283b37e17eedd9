//! In-memory node coordinate index.
//!
//! Planet-scale o5m files list all nodes first, sorted by id, between the
//! first and second reset markers. The index is built in two passes so the
//! point array can be allocated exactly once: count nodes up to the second
//! reset, rewind, collect. The reader is left positioned at the start of the
//! ways section.

use std::io::{Read, Seek};

use anyhow::{bail, Result};
use tracing::info;

use crate::models::{Linestring, Point, RingRole, Way};
use crate::o5m::{O5mReader, RecordKind};

/// Node coordinates sorted by node id.
pub struct NodeIndex {
    points: Vec<(i64, Point)>,
}

impl NodeIndex {
    pub fn find(&self, id: i64) -> Result<Point> {
        match self.points.binary_search_by_key(&id, |&(node_id, _)| node_id) {
            Ok(i) => Ok(self.points[i].1),
            Err(_) => bail!("cannot resolve node: {}", id),
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Materialize the node section of the stream. On success the reader is
/// positioned at the second reset, right before the ways.
pub fn build_node_index<R: Read + Seek>(reader: &mut O5mReader<R>) -> Result<NodeIndex> {
    let mut count = 0usize;
    loop {
        let Some(kind) = reader.next()? else { break };
        let resets = reader.reset_points().len();
        if resets >= 2 {
            break;
        }
        if kind == RecordKind::Node {
            if resets == 0 {
                bail!("node found before first reset");
            }
            count += 1;
        }
    }
    let resets = reader.reset_points().to_vec();
    if resets.len() < 2 {
        bail!("found {} resets before the end of the node section", resets.len());
    }
    info!(nodes = count, "counted node section");

    let mut points = Vec::with_capacity(count);
    reader.seek(resets[0])?;
    while points.len() < count {
        let Some(kind) = reader.next()? else { break };
        if kind != RecordKind::Node {
            continue;
        }
        let node = reader.node();
        if let Some(&(last_id, _)) = points.last() {
            if last_id >= node.id {
                bail!("nodes are not sorted by id: {} >= {}", last_id, node.id);
            }
        }
        points.push((
            node.id,
            Point {
                lon: node.lon,
                lat: node.lat,
            },
        ));
    }
    if points.len() != count {
        bail!("could not collect all nodes");
    }
    reader.seek(resets[1])?;
    Ok(NodeIndex { points })
}

/// Resolve a way's node references into an ordered point sequence.
pub fn linestring_for_way(way: &Way, nodes: &NodeIndex) -> Result<Linestring> {
    let mut points = Vec::with_capacity(way.nodes.len());
    for &id in &way.nodes {
        points.push(nodes.find(id)?);
    }
    Ok(Linestring {
        id: way.id,
        role: RingRole::None,
        points,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::o5m::testutil::StreamBuilder;
    use std::io::Cursor;

    fn node_section_reader() -> O5mReader<Cursor<Vec<u8>>> {
        let mut b = StreamBuilder::new();
        b.reset();
        b.node(100, 1000, 2000, &[]);
        b.node(5, 10, 10, &[]);
        b.node(15, -100, 50, &[]);
        b.reset();
        b.way(7, &[100, 5, 15], &[]);
        b.end();
        O5mReader::new(Cursor::new(b.into_bytes())).unwrap()
    }

    #[test]
    fn test_build_and_query_index() {
        let mut reader = node_section_reader();
        let index = build_node_index(&mut reader).unwrap();
        assert_eq!(index.len(), 3);
        assert_eq!(
            index.find(105).unwrap(),
            Point {
                lon: 1010,
                lat: 2010
            }
        );
        assert!(index.find(106).is_err());

        // The reader resumes at the ways section.
        assert_eq!(reader.next().unwrap(), Some(RecordKind::Way));
        assert_eq!(reader.way().id, 7);
        assert_eq!(reader.next().unwrap(), None);
    }

    #[test]
    fn test_way_to_linestring() {
        let mut reader = node_section_reader();
        let index = build_node_index(&mut reader).unwrap();
        reader.next().unwrap();
        let way = reader.way().clone();
        let line = linestring_for_way(&way, &index).unwrap();
        assert_eq!(line.id, 7);
        assert_eq!(line.points.len(), 3);
        assert_eq!(
            line.points[0],
            Point {
                lon: 1000,
                lat: 2000
            }
        );
    }

    #[test]
    fn test_unsorted_nodes_rejected() {
        let mut b = StreamBuilder::new();
        b.reset();
        b.node(100, 0, 0, &[]);
        b.node(-5, 0, 0, &[]);
        b.reset();
        b.end();
        let mut reader = O5mReader::new(Cursor::new(b.into_bytes())).unwrap();
        assert!(build_node_index(&mut reader).is_err());
    }

    #[test]
    fn test_missing_reset_rejected() {
        let mut b = StreamBuilder::new();
        b.reset();
        b.node(1, 0, 0, &[]);
        b.end();
        let mut reader = O5mReader::new(Cursor::new(b.into_bytes())).unwrap();
        assert!(build_node_index(&mut reader).is_err());
    }
}
