// Chunk: docs/chunks/rune_buffer - UTF-8 rune view over the block pager

//! A rune-indexed view over the byte pager.
//!
//! [`RuneBuffer`] stores text as UTF-8 in a [`BlockBuffer`] and exposes it
//! by rune (Unicode scalar value) index: `rune(i)`, span reads, and
//! insert/delete by rune offset and count. Byte offsets never escape this
//! module.
//!
//! Random access keeps a cursor pairing a rune index with its byte
//! offset. A lookup repositions the cursor by scanning UTF-8 lead bytes
//! from whichever of the cursor, the start, or the end is nearest, so
//! neighboring accesses, the overwhelmingly common pattern for line
//! walks and regex scans, cost a handful of bytes each.

use crate::block::{Backing, BlockBuffer, Error, ScratchFile};
use crate::span::Span;

/// How many bytes a positioning scan reads at a time.
const SCAN_CHUNK: usize = 256;

/// Returns the encoded length of the UTF-8 sequence starting with `lead`.
fn utf8_len(lead: u8) -> usize {
    match lead {
        b if b < 0x80 => 1,
        b if b < 0xE0 => 2,
        b if b < 0xF0 => 3,
        _ => 4,
    }
}

/// Returns true if `b` starts a UTF-8 sequence.
fn is_lead(b: u8) -> bool {
    b & 0xC0 != 0x80
}

/// Decodes the first rune of `buf`.
///
/// Returns `None` if `buf` is empty or holds only part of the sequence.
fn decode(buf: &[u8]) -> Option<(char, usize)> {
    let n = utf8_len(*buf.first()?);
    if buf.len() < n {
        return None;
    }
    let s = match std::str::from_utf8(&buf[..n]) {
        Ok(s) => s,
        Err(_) => panic!("rune buffer holds invalid utf-8"),
    };
    let ch = s.chars().next()?;
    Some((ch, n))
}

/// A rune index and the byte offset of that rune's first byte.
#[derive(Debug, Clone, Copy, Default)]
struct Cursor {
    rune: usize,
    byte: usize,
}

/// An unbounded rune buffer backed by a scratch store.
#[derive(Debug)]
pub struct RuneBuffer<B: Backing = ScratchFile> {
    bytes: BlockBuffer<B>,
    /// Total rune count, maintained incrementally.
    runes: usize,
    /// Rune-to-byte correspondence; always on a rune boundary.
    cursor: Cursor,
}

impl RuneBuffer<ScratchFile> {
    /// Creates a new, empty buffer paged in `block_size`-byte blocks.
    pub fn new(block_size: usize) -> Self {
        Self::with_backing(block_size, ScratchFile::new())
    }
}

impl<B: Backing> RuneBuffer<B> {
    /// Creates a new, empty buffer over the given backing store.
    pub fn with_backing(block_size: usize, backing: B) -> Self {
        Self {
            bytes: BlockBuffer::with_backing(block_size, backing),
            runes: 0,
            cursor: Cursor::default(),
        }
    }

    /// Returns the number of runes in the buffer.
    pub fn len(&self) -> usize {
        self.runes
    }

    /// Returns true if the buffer holds no runes.
    pub fn is_empty(&self) -> bool {
        self.runes == 0
    }

    /// Returns the `i`th rune.
    pub fn rune(&mut self, i: usize) -> Result<char, Error> {
        if i >= self.runes {
            return Err(Error::OutOfRange { from: i, to: i });
        }
        let byte = self.byte_offset(i)?;
        let mut buf = [0u8; 4];
        let n = self.bytes.read_at(&mut buf, byte)?;
        match decode(&buf[..n]) {
            Some((ch, _)) => Ok(ch),
            None => panic!("rune buffer holds invalid utf-8"),
        }
    }

    /// Returns the text of the span.
    pub fn read(&mut self, at: Span) -> Result<String, Error> {
        if at.from > at.to || at.to > self.runes {
            return Err(Error::out_of_range(at));
        }
        let mut out = String::with_capacity(at.len());
        let mut byte = self.byte_offset(at.from)?;
        let mut got = 0;
        let mut chunk = [0u8; SCAN_CHUNK];
        while got < at.len() {
            let n = self.bytes.read_at(&mut chunk, byte)?;
            if n == 0 {
                panic!("rune buffer shorter than its rune count");
            }
            let mut i = 0;
            while got < at.len() {
                match decode(&chunk[i..n]) {
                    Some((ch, w)) => {
                        out.push(ch);
                        got += 1;
                        i += w;
                    }
                    // Rune straddles the chunk edge; refill from here.
                    None => break,
                }
            }
            byte += i;
        }
        self.cursor = Cursor {
            rune: at.to,
            byte,
        };
        Ok(out)
    }

    /// Inserts `text` so that its first rune lands at rune offset `at`.
    ///
    /// Returns the number of runes inserted.
    pub fn insert(&mut self, text: &str, at: usize) -> Result<usize, Error> {
        if at > self.runes {
            return Err(Error::OutOfRange { from: at, to: at });
        }
        let byte = self.byte_offset(at)?;
        self.bytes.insert(text.as_bytes(), byte)?;
        let n = text.chars().count();
        self.runes += n;
        self.cursor = Cursor { rune: at, byte };
        Ok(n)
    }

    /// Deletes `n` runes starting at rune offset `at`.
    pub fn delete(&mut self, n: usize, at: usize) -> Result<(), Error> {
        if at + n > self.runes {
            return Err(Error::out_of_range(Span::new(at, at + n)));
        }
        let from = self.byte_offset(at)?;
        let to = self.byte_offset(at + n)?;
        self.bytes.delete(to - from, from)?;
        self.runes -= n;
        self.cursor = Cursor { rune: at, byte: from };
        Ok(())
    }

    /// Replaces the text of the span, returning the rune count inserted.
    pub fn write(&mut self, text: &str, at: Span) -> Result<usize, Error> {
        if at.from > at.to || at.to > self.runes {
            return Err(Error::out_of_range(at));
        }
        self.delete(at.len(), at.from)?;
        self.insert(text, at.from)
    }

    /// Returns the byte offset of rune `r`, repositioning the cursor.
    ///
    /// `r` may equal the rune count, naming the end of the buffer.
    fn byte_offset(&mut self, r: usize) -> Result<usize, Error> {
        // Scan from the nearest of the three known correspondences.
        let cur = self.cursor;
        let d_start = r;
        let d_cursor = r.abs_diff(cur.rune);
        let d_end = self.runes - r;

        let byte = if d_cursor <= d_start && d_cursor <= d_end {
            if r >= cur.rune {
                self.scan_forward(cur, r)?
            } else {
                self.scan_backward(cur, r)?
            }
        } else if d_start <= d_end {
            self.scan_forward(Cursor::default(), r)?
        } else {
            let end = Cursor {
                rune: self.runes,
                byte: self.bytes.len(),
            };
            self.scan_backward(end, r)?
        };
        self.cursor = Cursor { rune: r, byte };
        Ok(byte)
    }

    /// Walks forward from `at` counting rune lead bytes until rune `r`.
    fn scan_forward(&mut self, at: Cursor, r: usize) -> Result<usize, Error> {
        let mut rune = at.rune;
        let mut byte = at.byte;
        let mut chunk = [0u8; SCAN_CHUNK];
        while rune < r {
            let n = self.bytes.read_at(&mut chunk, byte)?;
            if n == 0 {
                panic!("rune buffer shorter than its rune count");
            }
            let mut i = 0;
            while i < n && rune < r {
                // The full width counts even if the tail is past the
                // chunk edge; those bytes exist and need not be read.
                i += utf8_len(chunk[i]);
                rune += 1;
            }
            byte += i;
        }
        Ok(byte)
    }

    /// Walks backward from `at` counting rune lead bytes until rune `r`.
    fn scan_backward(&mut self, at: Cursor, r: usize) -> Result<usize, Error> {
        let mut rune = at.rune;
        let mut byte = at.byte;
        let mut chunk = [0u8; SCAN_CHUNK];
        while rune > r {
            let want = SCAN_CHUNK.min(byte);
            if want == 0 {
                panic!("rune buffer shorter than its rune count");
            }
            self.bytes.read_at(&mut chunk[..want], byte - want)?;
            for i in (0..want).rev() {
                if is_lead(chunk[i]) {
                    rune -= 1;
                    if rune == r {
                        return Ok(byte - want + i);
                    }
                }
            }
            byte -= want;
        }
        Ok(byte)
    }
}
