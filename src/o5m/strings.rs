//! Back-reference string table.
//!
//! o5m avoids re-transmitting recently seen (key, value) string pairs by
//! referencing them with a distance counted backwards from the most recent
//! insertion. The table is a fixed-capacity ring buffer; oversized pairs are
//! never stored, so later back-references simply skip over those slots.

use super::O5mError;

/// Number of slots in the table, fixed by the format.
pub const TABLE_CAPACITY: usize = 15_000;

/// Pairs whose combined byte length exceeds this are not stored.
pub const MAX_PAIR_BYTES: usize = 250;

#[derive(Debug)]
pub struct StringTable {
    entries: Vec<(String, String)>,
    latest: usize,
}

impl Default for StringTable {
    fn default() -> Self {
        Self::new()
    }
}

impl StringTable {
    pub fn new() -> Self {
        Self {
            entries: vec![(String::new(), String::new()); TABLE_CAPACITY],
            latest: 0,
        }
    }

    /// Drop all stored pairs, as required at stream reset points.
    pub fn clear(&mut self) {
        for entry in &mut self.entries {
            entry.0.clear();
            entry.1.clear();
        }
        self.latest = 0;
    }

    /// Store a pair, overwriting the oldest slot. Pairs over the byte limit
    /// are silently dropped.
    pub fn push(&mut self, key: &str, value: &str) {
        if key.len() + value.len() > MAX_PAIR_BYTES {
            return;
        }
        self.entries[self.latest] = (key.to_string(), value.to_string());
        self.latest = (self.latest + 1) % TABLE_CAPACITY;
    }

    /// Fetch the pair `distance` insertions back (1 = most recent). Zero and
    /// anything beyond the table capacity are out of range.
    pub fn get(&self, distance: u64) -> Result<(String, String), O5mError> {
        if distance == 0 || distance > TABLE_CAPACITY as u64 {
            return Err(O5mError::BackrefOutOfRange(distance));
        }
        // Unsigned wraparound only; latest never exceeds the capacity.
        let index = (self.latest + TABLE_CAPACITY - distance as usize) % TABLE_CAPACITY;
        Ok(self.entries[index].clone())
    }
}
