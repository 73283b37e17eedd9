//! Record-level o5m stream decoder.
//!
//! The decoder owns a `DecoderSession` holding every piece of running state
//! the format deltas against: the previously decoded node/way/relation, the
//! shared way-node id counter, the three relation reference counters and the
//! string table. Reset markers clear the session and are remembered as seek
//! checkpoints; rewinding to a checkpoint restores the session exactly as a
//! live forward pass would have.

use std::io::{BufReader, Read, Seek, SeekFrom};

use crate::models::{BoundingBox, Node, Point, RefKind, Relation, RelRef, Tag, Way};

use super::strings::StringTable;
use super::varint;
use super::O5mError;

const RESET_MARKER: u8 = 0xff;
const END_MARKER: u8 = 0xfe;
const HEADER_KIND: u8 = 0xe0;
const BBOX_KIND: u8 = 0xdb;
const NODE_KIND: u8 = 0x10;
const WAY_KIND: u8 = 0x11;
const RELATION_KIND: u8 = 0x12;

const HEADER_MAGIC: &[u8; 4] = b"o5m2";

/// Kind of the record most recently produced by `next`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    BBox,
    Node,
    Way,
    Relation,
}

/// An opaque seek anchor: the byte offset immediately after a reset marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint(u64);

/// Buffered reader that tracks the absolute byte offset of every read.
#[derive(Debug)]
struct RawReader<R> {
    inner: BufReader<R>,
    offset: u64,
}

impl<R: Read> Read for RawReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.offset += n as u64;
        Ok(n)
    }
}

impl<R: Read> RawReader<R> {
    fn new(inner: R) -> Self {
        Self {
            inner: BufReader::new(inner),
            offset: 0,
        }
    }

    fn read_byte(&mut self) -> Result<u8, O5mError> {
        varint::read_byte(self)
    }

    /// Read bytes up to (and consuming) a NUL terminator.
    fn read_cstring(&mut self) -> Result<String, O5mError> {
        let mut buf = Vec::new();
        loop {
            let b = self.read_byte()?;
            if b == 0 {
                return Ok(String::from_utf8_lossy(&buf).into_owned());
            }
            buf.push(b);
        }
    }
}

impl<R: Read + Seek> RawReader<R> {
    fn seek_to(&mut self, offset: u64) -> Result<(), O5mError> {
        self.inner.seek(SeekFrom::Start(offset))?;
        self.offset = offset;
        Ok(())
    }
}

/// All delta state of a decode pass. Reset markers clear it wholesale.
#[derive(Debug)]
struct DecoderSession {
    strings: StringTable,
    node: Node,
    way: Way,
    relation: Relation,
    /// Shared running counter for way node references. Carries across ways,
    /// cleared only at reset points.
    way_node_id: i64,
    /// Running id counters for relation references, one per target kind.
    ref_ids: [i64; 3],
}

impl DecoderSession {
    fn new() -> Self {
        Self {
            strings: StringTable::new(),
            node: Node::default(),
            way: Way::default(),
            relation: Relation::default(),
            way_node_id: 0,
            ref_ids: [0; 3],
        }
    }

    fn reset(&mut self) {
        self.strings.clear();
        self.node = Node::default();
        self.way = Way::default();
        self.relation = Relation::default();
        self.way_node_id = 0;
        self.ref_ids = [0; 3];
    }
}

/// Streaming o5m reader over any seekable byte source.
#[derive(Debug)]
pub struct O5mReader<R> {
    raw: RawReader<R>,
    session: DecoderSession,
    kind: Option<RecordKind>,
    bounding_box: BoundingBox,
    reset_points: Vec<Checkpoint>,
}

impl<R: Read + Seek> O5mReader<R> {
    /// Open a stream and validate the format header. No record is produced
    /// before the header is accepted.
    pub fn new(inner: R) -> Result<Self, O5mError> {
        let mut raw = RawReader::new(inner);
        parse_header(&mut raw)?;
        Ok(Self {
            raw,
            session: DecoderSession::new(),
            kind: None,
            bounding_box: BoundingBox::default(),
            reset_points: Vec::new(),
        })
    }

    /// Decode the next record. Returns `Ok(None)` at the end marker. Any
    /// error is fatal to the stream; the caller must not continue iterating.
    pub fn next(&mut self) -> Result<Option<RecordKind>, O5mError> {
        loop {
            let kind = self.raw.read_byte()?;
            match kind {
                RESET_MARKER => {
                    self.session.reset();
                    self.note_reset();
                    continue;
                }
                END_MARKER => return Ok(None),
                _ => {}
            }
            let declared = varint::read_unsigned(&mut self.raw)?;
            let start = self.raw.offset;
            let record = match kind {
                NODE_KIND => {
                    self.parse_node(declared)?;
                    RecordKind::Node
                }
                WAY_KIND => {
                    self.parse_way(declared)?;
                    RecordKind::Way
                }
                RELATION_KIND => {
                    self.parse_relation(declared)?;
                    RecordKind::Relation
                }
                BBOX_KIND => {
                    self.parse_bbox()?;
                    RecordKind::BBox
                }
                other => return Err(O5mError::UnsupportedDataset(other)),
            };
            let consumed = self.raw.offset - start;
            if consumed != declared {
                return Err(O5mError::FrameLengthMismatch { declared, consumed });
            }
            self.kind = Some(record);
            return Ok(Some(record));
        }
    }

    /// Kind of the current record, if any.
    pub fn kind(&self) -> Option<RecordKind> {
        self.kind
    }

    pub fn node(&self) -> &Node {
        debug_assert_eq!(self.kind, Some(RecordKind::Node));
        &self.session.node
    }

    pub fn way(&self) -> &Way {
        debug_assert_eq!(self.kind, Some(RecordKind::Way));
        &self.session.way
    }

    pub fn relation(&self) -> &Relation {
        debug_assert_eq!(self.kind, Some(RecordKind::Relation));
        &self.session.relation
    }

    pub fn bounding_box(&self) -> BoundingBox {
        debug_assert_eq!(self.kind, Some(RecordKind::BBox));
        self.bounding_box
    }

    /// Checkpoints for every reset marker consumed so far, in stream order.
    pub fn reset_points(&self) -> &[Checkpoint] {
        &self.reset_points
    }

    /// Rewind to a previously reported checkpoint. The session is cleared
    /// exactly as it would be on encountering the reset marker live, so
    /// subsequent decoding matches a single forward pass.
    pub fn seek(&mut self, checkpoint: Checkpoint) -> Result<(), O5mError> {
        self.raw.seek_to(checkpoint.0)?;
        self.session.reset();
        self.kind = None;
        Ok(())
    }

    fn note_reset(&mut self) {
        let cp = Checkpoint(self.raw.offset);
        if !self.reset_points.contains(&cp) {
            self.reset_points.push(cp);
        }
    }

    fn parse_node(&mut self, declared: u64) -> Result<(), O5mError> {
        let start = self.raw.offset;
        self.session.node.id += varint::read_signed(&mut self.raw)?;
        self.session.node.tags.clear();
        parse_meta(
            &mut self.raw,
            &mut self.session.strings,
            &mut self.session.node.meta,
        )?;
        self.session.node.lon += varint::read_signed(&mut self.raw)?;
        self.session.node.lat += varint::read_signed(&mut self.raw)?;
        let remaining = declared as i64 - (self.raw.offset - start) as i64;
        parse_tags(
            &mut self.raw,
            &mut self.session.strings,
            remaining,
            &mut self.session.node.tags,
        )
    }

    fn parse_way(&mut self, declared: u64) -> Result<(), O5mError> {
        let start = self.raw.offset;
        self.session.way.id += varint::read_signed(&mut self.raw)?;
        self.session.way.nodes.clear();
        self.session.way.tags.clear();
        parse_meta(
            &mut self.raw,
            &mut self.session.strings,
            &mut self.session.way.meta,
        )?;

        let refs_declared = varint::read_unsigned(&mut self.raw)?;
        let mut remaining = refs_declared as i64;
        while remaining > 0 {
            let ref_start = self.raw.offset;
            self.session.way_node_id += varint::read_signed(&mut self.raw)?;
            self.session.way.nodes.push(self.session.way_node_id);
            remaining -= (self.raw.offset - ref_start) as i64;
        }
        if remaining < 0 {
            return Err(O5mError::FrameLengthMismatch {
                declared: refs_declared,
                consumed: (refs_declared as i64 - remaining) as u64,
            });
        }

        let remaining = declared as i64 - (self.raw.offset - start) as i64;
        parse_tags(
            &mut self.raw,
            &mut self.session.strings,
            remaining,
            &mut self.session.way.tags,
        )
    }

    fn parse_relation(&mut self, declared: u64) -> Result<(), O5mError> {
        let start = self.raw.offset;
        self.session.relation.id += varint::read_signed(&mut self.raw)?;
        self.session.relation.refs.clear();
        self.session.relation.tags.clear();
        parse_meta(
            &mut self.raw,
            &mut self.session.strings,
            &mut self.session.relation.meta,
        )?;

        let refs_declared = varint::read_unsigned(&mut self.raw)?;
        let mut remaining = refs_declared as i64;
        while remaining > 0 {
            let ref_start = self.raw.offset;
            let delta = varint::read_signed(&mut self.raw)?;
            let s = read_single(&mut self.raw, &mut self.session.strings)?;
            let kind = s
                .as_bytes()
                .first()
                .and_then(|c| RefKind::from_wire(*c))
                .ok_or_else(|| O5mError::InvalidReferenceType(s.clone()))?;
            self.session.ref_ids[kind.index()] += delta;
            self.session.relation.refs.push(RelRef {
                id: self.session.ref_ids[kind.index()],
                kind,
                role: s[1..].to_string(),
            });
            remaining -= (self.raw.offset - ref_start) as i64;
        }
        if remaining < 0 {
            return Err(O5mError::FrameLengthMismatch {
                declared: refs_declared,
                consumed: (refs_declared as i64 - remaining) as u64,
            });
        }

        let remaining = declared as i64 - (self.raw.offset - start) as i64;
        parse_tags(
            &mut self.raw,
            &mut self.session.strings,
            remaining,
            &mut self.session.relation.tags,
        )
    }

    fn parse_bbox(&mut self) -> Result<(), O5mError> {
        // The four corner values are plain signed varints, independent of any
        // running counter.
        let mut corners = [0i64; 4];
        for v in &mut corners {
            *v = varint::read_signed(&mut self.raw)?;
        }
        self.bounding_box = BoundingBox {
            x1: corners[0] as f64 / Point::SCALE,
            y1: corners[1] as f64 / Point::SCALE,
            x2: corners[2] as f64 / Point::SCALE,
            y2: corners[3] as f64 / Point::SCALE,
        };
        Ok(())
    }
}

fn parse_header<R: Read>(raw: &mut RawReader<R>) -> Result<(), O5mError> {
    let lead = raw.read_byte()?;
    if lead != RESET_MARKER {
        return Err(O5mError::InvalidHeader(format!(
            "unexpected lead byte {:#04x}",
            lead
        )));
    }
    let kind = raw.read_byte()?;
    if kind != HEADER_KIND {
        return Err(O5mError::InvalidHeader(format!(
            "unexpected header section {:#04x}",
            kind
        )));
    }
    let length = varint::read_unsigned(raw)?;
    if length != HEADER_MAGIC.len() as u64 {
        return Err(O5mError::InvalidHeader(format!(
            "unexpected header length {}",
            length
        )));
    }
    let mut magic = [0u8; 4];
    raw.read_exact(&mut magic)
        .map_err(|_| O5mError::TruncatedInput)?;
    if &magic != HEADER_MAGIC {
        return Err(O5mError::InvalidHeader(format!(
            "unexpected format magic {:?}",
            String::from_utf8_lossy(&magic)
        )));
    }
    Ok(())
}

/// Read a (key, value) string pair: either a literal (two NUL-terminated
/// strings, pushed into the table) or a back-reference distance.
fn read_pair<R: Read>(
    raw: &mut RawReader<R>,
    strings: &mut StringTable,
) -> Result<(String, String), O5mError> {
    let b = raw.read_byte()?;
    if b == 0 {
        let key = raw.read_cstring()?;
        let value = raw.read_cstring()?;
        strings.push(&key, &value);
        Ok((key, value))
    } else {
        let distance = varint::read_unsigned_cont(b, raw)?;
        strings.get(distance)
    }
}

/// Read a single string (relation references, which fuse the target type and
/// role into one string). Literals occupy a table slot with an empty value.
fn read_single<R: Read>(
    raw: &mut RawReader<R>,
    strings: &mut StringTable,
) -> Result<String, O5mError> {
    let b = raw.read_byte()?;
    if b == 0 {
        let s = raw.read_cstring()?;
        strings.push(&s, "");
        Ok(s)
    } else {
        let distance = varint::read_unsigned_cont(b, raw)?;
        Ok(strings.get(distance)?.0)
    }
}

/// Decode the metadata block. A version delta of zero clears everything; a
/// non-zero version accumulates the timestamp and, only when the resulting
/// timestamp is non-zero, the changeset and the (uid, author) pair. This is
/// the literal behavior of the format even where it looks surprising for
/// interleaved versioned and version-less entities.
fn parse_meta<R: Read>(
    raw: &mut RawReader<R>,
    strings: &mut StringTable,
    meta: &mut crate::models::Metadata,
) -> Result<(), O5mError> {
    let version = varint::read_unsigned(raw)?;
    if version == 0 {
        *meta = crate::models::Metadata::default();
        return Ok(());
    }
    meta.version = version;
    meta.timestamp += varint::read_signed(raw)?;
    if meta.timestamp != 0 {
        meta.changeset += varint::read_signed(raw)?;
        let (uid, author) = read_pair(raw, strings)?;
        meta.uid = uid;
        meta.author = author;
    }
    Ok(())
}

/// Decode tag pairs until exactly `remaining` bytes are consumed.
fn parse_tags<R: Read>(
    raw: &mut RawReader<R>,
    strings: &mut StringTable,
    mut remaining: i64,
    tags: &mut Vec<Tag>,
) -> Result<(), O5mError> {
    let declared = remaining.max(0) as u64;
    while remaining > 0 {
        let start = raw.offset;
        let (key, value) = read_pair(raw, strings)?;
        tags.push(Tag { key, value });
        remaining -= (raw.offset - start) as i64;
    }
    if remaining < 0 {
        return Err(O5mError::FrameLengthMismatch {
            declared,
            consumed: (declared as i64 - remaining) as u64,
        });
    }
    Ok(())
}
