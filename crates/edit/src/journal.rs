// Chunk: docs/chunks/pending_journal - Editor-owned pending-change journal

//! The pending-change journal.
//!
//! Phase one of an edit records its changes here instead of touching the
//! buffer: each entry is a span to replace and the replacement text. The
//! journal lives in its own block-paged buffer, so a large pending edit
//! (a global substitute over a big file, say) spills to scratch storage
//! like any other text.
//!
//! On-disk layout per entry: the replacement text in UTF-8 followed by a
//! fixed-width little-endian header `{from, to, bytes, runes, seq}`. An
//! in-memory index of entry start offsets supports forward iteration and
//! the in-place header rewrites that address fix-up performs; `push`,
//! `top`, and `pop` give the stack view of the same data.

use sted_buffer::{BlockBuffer, Span};

use crate::Error;

/// Header size: five 8-byte little-endian fields.
const HEADER_BYTES: usize = 40;

/// A journal entry's header: everything but the replacement text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Header {
    /// The span to replace, in the coordinates of phase one (rewritten by
    /// fix-up as earlier entries change sizes).
    pub at: Span,
    /// Rune count of the replacement text.
    pub runes: usize,
    /// Byte count of the replacement text.
    pub bytes: usize,
    /// Buffer sequence number at the time the entry was logged.
    pub seq: u64,
}

/// A full journal entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Entry {
    pub at: Span,
    pub runes: usize,
    pub seq: u64,
    pub text: String,
}

/// A stack of pending changes on a block-paged buffer.
#[derive(Debug)]
pub(crate) struct Journal {
    bytes: BlockBuffer,
    /// Byte offset where each entry's text begins.
    starts: Vec<usize>,
}

impl Journal {
    pub fn new(block_size: usize) -> Self {
        Journal {
            bytes: BlockBuffer::new(block_size),
            starts: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.starts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.starts.is_empty()
    }

    /// Appends an entry replacing `at` with `text`.
    pub fn push(&mut self, at: Span, text: &str, seq: u64) -> Result<(), Error> {
        let start = self.bytes.len();
        self.bytes.insert(text.as_bytes(), start)?;
        let h = Header {
            at,
            runes: text.chars().count(),
            bytes: text.len(),
            seq,
        };
        let end = self.bytes.len();
        self.bytes.insert(&encode(&h), end)?;
        self.starts.push(start);
        Ok(())
    }

    fn header_offset(&self, i: usize) -> usize {
        let next = if i + 1 < self.starts.len() {
            self.starts[i + 1]
        } else {
            self.bytes.len()
        };
        next - HEADER_BYTES
    }

    /// Reads the header of entry `i`.
    pub fn header(&mut self, i: usize) -> Result<Header, Error> {
        let off = self.header_offset(i);
        let bs = self.bytes.read(Span::new(off, off + HEADER_BYTES))?;
        Ok(decode(&bs))
    }

    /// Rewrites the span of entry `i` in place.
    pub fn set_span(&mut self, i: usize, at: Span) -> Result<(), Error> {
        let mut h = self.header(i)?;
        h.at = at;
        let off = self.header_offset(i);
        self.bytes.write(&encode(&h), Span::new(off, off + HEADER_BYTES))?;
        Ok(())
    }

    /// Reads entry `i` whole.
    pub fn entry(&mut self, i: usize) -> Result<Entry, Error> {
        let h = self.header(i)?;
        let start = self.starts[i];
        let bs = self.bytes.read(Span::new(start, start + h.bytes))?;
        let text = String::from_utf8(bs).expect("journal text is utf-8");
        Ok(Entry {
            at: h.at,
            runes: h.runes,
            seq: h.seq,
            text,
        })
    }

    /// Reads the most recent entry's header.
    pub fn top(&mut self) -> Result<Header, Error> {
        debug_assert!(!self.is_empty(), "top of empty journal");
        self.header(self.starts.len() - 1)
    }

    /// Removes and returns the most recent entry.
    pub fn pop(&mut self) -> Result<Entry, Error> {
        debug_assert!(!self.is_empty(), "pop of empty journal");
        let e = self.entry(self.starts.len() - 1)?;
        let start = self.starts.pop().expect("entry exists");
        let end = self.bytes.len();
        self.bytes.delete(end - start, start)?;
        Ok(e)
    }

    /// Drops every entry.
    pub fn clear(&mut self) -> Result<(), Error> {
        let n = self.bytes.len();
        self.bytes.delete(n, 0)?;
        self.starts.clear();
        Ok(())
    }
}

fn encode(h: &Header) -> [u8; HEADER_BYTES] {
    let mut out = [0u8; HEADER_BYTES];
    let fields = [
        h.at.from as u64,
        h.at.to as u64,
        h.bytes as u64,
        h.runes as u64,
        h.seq,
    ];
    for (i, f) in fields.iter().enumerate() {
        out[i * 8..(i + 1) * 8].copy_from_slice(&f.to_le_bytes());
    }
    out
}

fn decode(bs: &[u8]) -> Header {
    let field = |i: usize| {
        let mut b = [0u8; 8];
        b.copy_from_slice(&bs[i * 8..(i + 1) * 8]);
        u64::from_le_bytes(b)
    };
    Header {
        at: Span::new(field(0) as usize, field(1) as usize),
        bytes: field(2) as usize,
        runes: field(3) as usize,
        seq: field(4),
    }
}
