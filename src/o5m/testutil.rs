//! Hand-rolled o5m stream construction for decoder tests.
//!
//! Callers supply raw deltas, exactly as they would appear on the wire; the
//! builder only handles framing and varint encoding.

use super::varint;

/// A tag on the wire: either a literal pair or a table back-reference.
pub(crate) enum TagSpec {
    Lit(String, String),
    Backref(u64),
}

impl TagSpec {
    pub(crate) fn lit(key: &str, value: &str) -> Self {
        TagSpec::Lit(key.to_string(), value.to_string())
    }

    fn encode(&self, out: &mut Vec<u8>) {
        match self {
            TagSpec::Lit(key, value) => {
                out.push(0);
                out.extend_from_slice(key.as_bytes());
                out.push(0);
                out.extend_from_slice(value.as_bytes());
                out.push(0);
            }
            TagSpec::Backref(distance) => varint::write_unsigned(out, *distance),
        }
    }
}

pub(crate) struct StreamBuilder {
    bytes: Vec<u8>,
}

impl StreamBuilder {
    pub(crate) fn new() -> Self {
        Self::with_magic(b"o5m2")
    }

    pub(crate) fn with_magic(magic: &[u8; 4]) -> Self {
        let mut bytes = vec![0xff, 0xe0, 0x04];
        bytes.extend_from_slice(magic);
        Self { bytes }
    }

    pub(crate) fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub(crate) fn reset(&mut self) {
        self.bytes.push(0xff);
    }

    pub(crate) fn end(&mut self) {
        self.bytes.push(0xfe);
    }

    pub(crate) fn raw_record(&mut self, kind: u8, payload: &[u8]) {
        self.raw_record_with_length(kind, payload.len() as u64, payload);
    }

    pub(crate) fn raw_record_with_length(&mut self, kind: u8, length: u64, payload: &[u8]) {
        self.bytes.push(kind);
        varint::write_unsigned(&mut self.bytes, length);
        self.bytes.extend_from_slice(payload);
    }

    /// A node with an empty metadata block (version delta zero).
    pub(crate) fn node(&mut self, id_delta: i64, lon_delta: i64, lat_delta: i64, tags: &[TagSpec]) {
        let mut p = Vec::new();
        varint::write_signed(&mut p, id_delta);
        varint::write_unsigned(&mut p, 0);
        varint::write_signed(&mut p, lon_delta);
        varint::write_signed(&mut p, lat_delta);
        for tag in tags {
            tag.encode(&mut p);
        }
        self.raw_record(0x10, &p);
    }

    /// A node carrying full metadata with a literal (uid, author) pair.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn node_with_meta(
        &mut self,
        id_delta: i64,
        lon_delta: i64,
        lat_delta: i64,
        version: u64,
        ts_delta: i64,
        cs_delta: i64,
        pair: Option<(&str, &str)>,
    ) {
        let mut p = Vec::new();
        varint::write_signed(&mut p, id_delta);
        varint::write_unsigned(&mut p, version);
        varint::write_signed(&mut p, ts_delta);
        varint::write_signed(&mut p, cs_delta);
        if let Some((uid, author)) = pair {
            p.push(0);
            p.extend_from_slice(uid.as_bytes());
            p.push(0);
            p.extend_from_slice(author.as_bytes());
            p.push(0);
        }
        varint::write_signed(&mut p, lon_delta);
        varint::write_signed(&mut p, lat_delta);
        self.raw_record(0x10, &p);
    }

    /// A node carrying full metadata with a back-referenced (uid, author) pair.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn node_with_meta_backref(
        &mut self,
        id_delta: i64,
        lon_delta: i64,
        lat_delta: i64,
        version: u64,
        ts_delta: i64,
        cs_delta: i64,
        distance: u64,
    ) {
        let mut p = Vec::new();
        varint::write_signed(&mut p, id_delta);
        varint::write_unsigned(&mut p, version);
        varint::write_signed(&mut p, ts_delta);
        varint::write_signed(&mut p, cs_delta);
        varint::write_unsigned(&mut p, distance);
        varint::write_signed(&mut p, lon_delta);
        varint::write_signed(&mut p, lat_delta);
        self.raw_record(0x10, &p);
    }

    pub(crate) fn way(&mut self, id_delta: i64, node_deltas: &[i64], tags: &[TagSpec]) {
        let mut refs = Vec::new();
        for delta in node_deltas {
            varint::write_signed(&mut refs, *delta);
        }
        let mut p = Vec::new();
        varint::write_signed(&mut p, id_delta);
        varint::write_unsigned(&mut p, 0);
        varint::write_unsigned(&mut p, refs.len() as u64);
        p.extend_from_slice(&refs);
        for tag in tags {
            tag.encode(&mut p);
        }
        self.raw_record(0x11, &p);
    }

    /// Relation members are `(id delta, type character, role)` triples; the
    /// type and role are encoded as a single literal string.
    pub(crate) fn relation(
        &mut self,
        id_delta: i64,
        members: &[(i64, u8, &str)],
        tags: &[TagSpec],
    ) {
        let mut refs = Vec::new();
        for (delta, kind, role) in members {
            varint::write_signed(&mut refs, *delta);
            refs.push(0);
            refs.push(*kind);
            refs.extend_from_slice(role.as_bytes());
            refs.push(0);
        }
        let mut p = Vec::new();
        varint::write_signed(&mut p, id_delta);
        varint::write_unsigned(&mut p, 0);
        varint::write_unsigned(&mut p, refs.len() as u64);
        p.extend_from_slice(&refs);
        for tag in tags {
            tag.encode(&mut p);
        }
        self.raw_record(0x12, &p);
    }

    pub(crate) fn bbox(&mut self, x1: i64, y1: i64, x2: i64, y2: i64) {
        let mut p = Vec::new();
        for v in [x1, y1, x2, y2] {
            varint::write_signed(&mut p, v);
        }
        self.raw_record(0xdb, &p);
    }
}
