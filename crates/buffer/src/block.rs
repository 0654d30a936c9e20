// Chunk: docs/chunks/block_pager - Scratch-file-backed paged byte buffer

//! An unbounded byte buffer paged into fixed-size blocks.
//!
//! A [`BlockBuffer`] holds an arbitrarily large byte sequence while keeping
//! at most one block of it in memory. The rest lives in a scratch file that
//! is created lazily on the first write-back and vanishes when the buffer
//! is dropped. Blocks freed by deletion keep their file offset on a free
//! list so backing space is reused rather than leaked; the file's
//! high-water mark only grows.
//!
//! Insertion and deletion work against the single cached block. Inserting
//! into a full block splits it: the block is shortened at the insertion
//! point, an empty block is spliced in for the incoming bytes, and the
//! remainder becomes a new trailing block left dirty in the cache.
//!
//! The backing store is abstracted by [`Backing`] so tests can substitute
//! an injectable failure source; production buffers use [`ScratchFile`].

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};

use crate::span::Span;

/// Errors from pager and rune-buffer operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A span or offset outside `[0, len]`.
    #[error("address out of range: [{from}, {to})")]
    OutOfRange { from: usize, to: usize },
    /// The scratch file failed underneath the buffer.
    #[error("scratch i/o: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    pub(crate) fn out_of_range(span: Span) -> Self {
        Error::OutOfRange {
            from: span.from,
            to: span.to,
        }
    }

    pub(crate) fn point_out_of_range(at: usize) -> Self {
        Error::OutOfRange { from: at, to: at }
    }
}

/// Random-access storage for block write-back.
///
/// Offsets are absolute file positions chosen by the pager. Reads are only
/// issued against regions that were previously written.
pub trait Backing {
    fn read_at(&mut self, buf: &mut [u8], off: u64) -> io::Result<()>;
    fn write_at(&mut self, buf: &[u8], off: u64) -> io::Result<()>;
}

/// The default backing: an anonymous temporary file.
///
/// The file is created lazily on the first write-back, and `tempfile`
/// unlinks it at creation, so the scratch space is reclaimed even if the
/// process dies without dropping the buffer.
#[derive(Debug, Default)]
pub struct ScratchFile {
    file: Option<File>,
}

impl ScratchFile {
    pub fn new() -> Self {
        Self::default()
    }

    fn file(&mut self) -> io::Result<&mut File> {
        if self.file.is_none() {
            tracing::debug!("creating scratch file");
            self.file = Some(tempfile::tempfile()?);
        }
        Ok(self.file.as_mut().expect("scratch file just created"))
    }
}

impl Backing for ScratchFile {
    fn read_at(&mut self, buf: &mut [u8], off: u64) -> io::Result<()> {
        if buf.is_empty() {
            return Ok(());
        }
        let f = self.file()?;
        f.seek(SeekFrom::Start(off))?;
        f.read_exact(buf)
    }

    fn write_at(&mut self, buf: &[u8], off: u64) -> io::Result<()> {
        if buf.is_empty() {
            return Ok(());
        }
        let f = self.file()?;
        f.seek(SeekFrom::Start(off))?;
        f.write_all(buf)
    }
}

/// A block descriptor: where the block lives in the file and how many of
/// its bytes are live.
#[derive(Debug, Clone, Copy)]
struct Block {
    /// Byte offset of the block in the backing store.
    start: u64,
    /// Number of live bytes in the block, at most `block_size`.
    len: usize,
}

/// An unbounded byte buffer backed by a scratch store.
///
/// At most `block_size` bytes are held in memory.
#[derive(Debug)]
pub struct BlockBuffer<B: Backing = ScratchFile> {
    /// Maximum number of bytes in a block.
    block_size: usize,
    /// All blocks of the buffer, in order.
    blocks: Vec<Block>,
    /// Blocks free for re-allocation. Only `start` is meaningful.
    free: Vec<Block>,
    /// Offset of the end of the backing store; grows monotonically.
    end: u64,
    /// Index of the block whose bytes are in `cache`, if any.
    cached: Option<usize>,
    /// The cached block's bytes.
    cache: Vec<u8>,
    /// Whether `cache` has changed since it was read.
    dirty: bool,
    /// Total live bytes in the buffer.
    len: usize,
    backing: B,
}

impl BlockBuffer<ScratchFile> {
    /// Creates a new, empty buffer backed by a lazily created scratch file.
    pub fn new(block_size: usize) -> Self {
        Self::with_backing(block_size, ScratchFile::new())
    }
}

impl<B: Backing> BlockBuffer<B> {
    /// Creates a new, empty buffer over the given backing store.
    pub fn with_backing(block_size: usize, backing: B) -> Self {
        assert!(block_size > 0, "block size must be positive");
        Self {
            block_size,
            blocks: Vec::new(),
            free: Vec::new(),
            end: 0,
            cached: None,
            cache: vec![0; block_size],
            dirty: false,
            len: 0,
            backing,
        }
    }

    /// Returns the total number of bytes in the buffer.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if the buffer holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Reads bytes starting at `at` into `dst`, returning the count read.
    ///
    /// The count is less than `dst.len()` only when the end of the buffer
    /// intervenes; reading at the end returns 0.
    pub fn read_at(&mut self, dst: &mut [u8], at: usize) -> Result<usize, Error> {
        if at > self.len {
            return Err(Error::point_out_of_range(at));
        }
        let mut at = at;
        let mut tot = 0;
        while tot < dst.len() && at < self.len {
            let (i, q0) = self.block_at(at);
            let blk = self.get(i)?;
            let o = at - q0;
            let n = (blk.len - o).min(dst.len() - tot);
            dst[tot..tot + n].copy_from_slice(&self.cache[o..o + n]);
            tot += n;
            at += n;
        }
        Ok(tot)
    }

    /// Returns the bytes of the span.
    pub fn read(&mut self, at: Span) -> Result<Vec<u8>, Error> {
        if at.from > at.to || at.to > self.len {
            return Err(Error::out_of_range(at));
        }
        let mut bs = vec![0; at.len()];
        self.read_at(&mut bs, at.from)?;
        Ok(bs)
    }

    /// Replaces the bytes of the span with `src`.
    pub fn write(&mut self, src: &[u8], at: Span) -> Result<(), Error> {
        if at.from > at.to || at.to > self.len {
            return Err(Error::out_of_range(at));
        }
        self.delete(at.len(), at.from)?;
        self.insert(src, at.from)
    }

    /// Inserts `src` so that its first byte lands at offset `at`.
    pub fn insert(&mut self, src: &[u8], at: usize) -> Result<(), Error> {
        if at > self.len {
            return Err(Error::point_out_of_range(at));
        }
        let mut src = src;
        let mut at = at;
        while !src.is_empty() {
            let (mut i, mut q0) = self.block_at(at);
            let mut blk = self.get(i)?;
            let mut room = self.block_size - blk.len;
            if room == 0 {
                i = self.insert_at(at)?;
                blk = self.get(i)?;
                q0 = at;
                room = self.block_size;
            }
            let n = room.min(src.len());
            let o = at - q0;
            self.cache.copy_within(o..blk.len, o + n);
            self.cache[o..o + n].copy_from_slice(&src[..n]);
            self.dirty = true;
            self.blocks[i].len += n;
            self.len += n;
            at += n;
            src = &src[n..];
        }
        Ok(())
    }

    /// Deletes `n` bytes starting at offset `at`.
    pub fn delete(&mut self, n: usize, at: usize) -> Result<(), Error> {
        if at + n > self.len {
            return Err(Error::out_of_range(Span::new(at, at + n)));
        }
        let mut n = n;
        let at = at;
        while n > 0 {
            let (i, q0) = self.block_at(at);
            let blk = self.get(i)?;
            let o = at - q0;
            let m = (blk.len - o).min(n);
            if o == 0 && n >= blk.len {
                // The whole block goes; keep its file space for reuse.
                self.free_block(blk);
                self.blocks.remove(i);
                self.cached = None;
                self.dirty = false;
            } else {
                self.cache.copy_within(o + m..blk.len, o);
                self.dirty = true;
                self.blocks[i].len -= m;
            }
            n -= m;
            self.len -= m;
        }
        Ok(())
    }

    fn alloc_block(&mut self) -> Block {
        if let Some(blk) = self.free.pop() {
            return Block {
                start: blk.start,
                len: 0,
            };
        }
        let blk = Block {
            start: self.end,
            len: 0,
        };
        self.end += self.block_size as u64;
        blk
    }

    fn free_block(&mut self, blk: Block) {
        self.free.push(Block {
            start: blk.start,
            len: 0,
        });
    }

    /// Returns the index and start offset of the block containing `at`.
    ///
    /// If `at` is one past the last byte, a new trailing block is
    /// allocated; this is how the buffer grows.
    fn block_at(&mut self, at: usize) -> (usize, usize) {
        debug_assert!(at <= self.len, "block_at past the buffer");
        if at == self.len {
            let i = self.blocks.len();
            let blk = self.alloc_block();
            self.blocks.push(blk);
            return (i, at);
        }
        let mut q0 = 0;
        for (i, blk) in self.blocks.iter().enumerate() {
            if q0 <= at && at < q0 + blk.len {
                return (i, q0);
            }
            q0 += blk.len;
        }
        unreachable!("offset {at} not covered by any block");
    }

    /// Makes room for an insertion at `at`, returning the index of a new,
    /// empty block there.
    ///
    /// If `at` is the start of an existing block the new block is spliced
    /// in front of it. Otherwise the containing block is split: it is
    /// shortened to the offset, the empty block follows it, and the
    /// remainder becomes a third block left dirty in the cache.
    fn insert_at(&mut self, at: usize) -> Result<usize, Error> {
        let (i, q0) = self.block_at(at);
        let o = at - q0;
        let blk = self.blocks[i];
        if at == q0 {
            let nblk = self.alloc_block();
            self.blocks.insert(i, nblk);
            if self.cached == Some(i) {
                self.cached = Some(i + 1);
            }
            return Ok(i);
        }

        // Splitting: make sure the block is both on disk and in the cache.
        if self.cached == Some(i) && self.dirty {
            self.put()?;
        } else {
            self.get(i)?;
        }

        self.blocks[i].len = o;

        let nblk = self.alloc_block();
        self.blocks.insert(i + 1, nblk);

        let nblk = self.alloc_block();
        self.blocks.insert(i + 2, nblk);
        self.blocks[i + 2].len = blk.len - o;
        self.cache.copy_within(o..blk.len, 0);
        self.cached = Some(i + 2);
        self.dirty = true;

        Ok(i + 1)
    }

    /// Writes the cached block back to the backing store if it changed.
    fn put(&mut self) -> Result<(), Error> {
        let i = match self.cached {
            Some(i) if self.dirty => i,
            _ => return Ok(()),
        };
        let blk = self.blocks[i];
        self.backing.write_at(&self.cache[..blk.len], blk.start)?;
        self.dirty = false;
        Ok(())
    }

    /// Loads block `i` into the cache, returning its descriptor.
    fn get(&mut self, i: usize) -> Result<Block, Error> {
        if self.cached == Some(i) {
            return Ok(self.blocks[i]);
        }
        self.put()?;
        let blk = self.blocks[i];
        self.backing.read_at(&mut self.cache[..blk.len], blk.start)?;
        self.cached = Some(i);
        self.dirty = false;
        Ok(blk)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_BLOCK: usize = 8;

    fn buf() -> BlockBuffer {
        BlockBuffer::new(TEST_BLOCK)
    }

    fn contents(b: &mut BlockBuffer) -> Vec<u8> {
        b.read(Span::new(0, b.len())).expect("read all")
    }

    #[test]
    fn basics() {
        let mut b = buf();
        assert!(b.is_empty());
        b.insert(b"Hello, World!", 0).unwrap();
        assert_eq!(b.len(), 13);
        assert_eq!(contents(&mut b), b"Hello, World!");
    }

    #[test]
    fn write_table() {
        struct Test {
            init: &'static [u8],
            write: &'static [u8],
            at: Span,
            want: &'static [u8],
        }
        let tests = [
            Test {
                init: b"",
                write: b"",
                at: Span::new(0, 0),
                want: b"",
            },
            Test {
                init: b"",
                write: b"Hello, World!",
                at: Span::new(0, 0),
                want: b"Hello, World!",
            },
            Test {
                init: b"Hello, World!",
                write: b"",
                at: Span::new(0, 13),
                want: b"",
            },
            Test {
                init: b"Hello, !",
                write: b"World",
                at: Span::new(7, 7),
                want: b"Hello, World!",
            },
            Test {
                init: b"Hello, World",
                write: b"!!",
                at: Span::new(12, 12),
                want: b"Hello, World!!",
            },
            Test {
                init: b", World!",
                write: b"Hello",
                at: Span::new(0, 0),
                want: b"Hello, World!",
            },
        ];
        for t in &tests {
            let mut b = buf();
            b.insert(t.init, 0).unwrap();
            b.write(t.write, t.at).unwrap();
            assert_eq!(contents(&mut b), t.want);
        }
    }

    #[test]
    fn write_out_of_range() {
        let mut b = buf();
        assert!(matches!(
            b.write(b"", Span::new(1, 2)),
            Err(Error::OutOfRange { from: 1, to: 2 })
        ));
        assert!(matches!(
            b.write(b"", Span::new(2, 1)),
            Err(Error::OutOfRange { .. })
        ));
        assert!(matches!(
            b.write(b"", Span::new(0, 1)),
            Err(Error::OutOfRange { .. })
        ));
    }

    #[test]
    fn read_table() {
        let mut b = buf();
        b.insert(b"Hello, World!", 0).unwrap();
        assert_eq!(b.read(Span::new(13, 13)).unwrap(), b"");
        assert_eq!(b.read(Span::new(0, 13)).unwrap(), b"Hello, World!");
        assert_eq!(b.read(Span::new(1, 9)).unwrap(), b"ello, Wo");
        assert!(matches!(
            b.read(Span::new(0, 14)),
            Err(Error::OutOfRange { .. })
        ));
        assert!(matches!(
            b.read(Span::new(2, 1)),
            Err(Error::OutOfRange { .. })
        ));
    }

    #[test]
    fn read_at_stops_at_end() {
        let mut b = buf();
        b.insert(b"abc", 0).unwrap();
        let mut dst = [0u8; 8];
        assert_eq!(b.read_at(&mut dst, 0).unwrap(), 3);
        assert_eq!(&dst[..3], b"abc");
        assert_eq!(b.read_at(&mut dst, 3).unwrap(), 0);
        assert!(b.read_at(&mut dst, 4).is_err());
    }

    #[test]
    fn insert_spills_across_blocks() {
        let mut b = buf();
        // Three blocks' worth, written front to back.
        b.insert(b"0123456789abcdefghijklm", 0).unwrap();
        assert_eq!(b.len(), 23);
        assert_eq!(contents(&mut b), b"0123456789abcdefghijklm");
    }

    #[test]
    fn insert_splits_full_block() {
        let mut b = buf();
        b.insert(b"01234567", 0).unwrap(); // exactly one full block
        b.insert(b"xy", 4).unwrap(); // forces a split
        assert_eq!(contents(&mut b), b"0123xy4567");
        // And again at a block boundary.
        b.insert(b"z", 0).unwrap();
        assert_eq!(contents(&mut b), b"z0123xy4567");
    }

    #[test]
    fn delete_within_and_across_blocks() {
        let mut b = buf();
        b.insert(b"0123456789abcdef", 0).unwrap();
        b.delete(4, 6).unwrap();
        assert_eq!(contents(&mut b), b"012345cdef");
        b.delete(10, 0).unwrap();
        assert_eq!(contents(&mut b), b"");
        assert!(b.delete(1, 0).is_err());
    }

    #[test]
    fn deleted_blocks_are_reused() {
        let mut b = buf();
        b.insert(b"0123456789abcdef", 0).unwrap();
        let end_before = b.end;
        b.delete(16, 0).unwrap();
        b.insert(b"0123456789abcdef", 0).unwrap();
        // The freed blocks covered the re-insert; no new file space needed.
        assert_eq!(b.end, end_before);
        assert_eq!(contents(&mut b), b"0123456789abcdef");
    }

    #[test]
    fn interleaved_edits() {
        let mut b = buf();
        let mut model: Vec<u8> = Vec::new();
        let ops: [(usize, &[u8]); 7] = [
            (0, b"hello world"),
            (5, b", there,"),
            (0, b">> "),
            (22, b"!"),
            (10, b"0123456789abcdef"),
            (3, b""),
            (1, b"mid"),
        ];
        for (at, text) in ops {
            b.insert(text, at).unwrap();
            model.splice(at..at, text.iter().copied());
            assert_eq!(contents(&mut b), model, "after insert at {at}");
        }
        let dels = [(0usize, 2usize), (5, 9), (20, 1)];
        for (at, n) in dels {
            b.delete(n, at).unwrap();
            model.drain(at..at + n);
            assert_eq!(contents(&mut b), model, "after delete {n}@{at}");
        }
    }

    /// A backing that fails every operation after a fuse burns out.
    struct BlowableBacking {
        inner: ScratchFile,
        fail: bool,
    }

    impl Backing for BlowableBacking {
        fn read_at(&mut self, buf: &mut [u8], off: u64) -> io::Result<()> {
            if self.fail {
                return Err(io::Error::new(io::ErrorKind::Other, "read error"));
            }
            self.inner.read_at(buf, off)
        }

        fn write_at(&mut self, buf: &[u8], off: u64) -> io::Result<()> {
            if self.fail {
                return Err(io::Error::new(io::ErrorKind::Other, "write error"));
            }
            self.inner.write_at(buf, off)
        }
    }

    #[test]
    fn backing_errors_surface() {
        let mut b = BlockBuffer::with_backing(
            4,
            BlowableBacking {
                inner: ScratchFile::new(),
                fail: false,
            },
        );
        b.insert(b"0123456789", 0).unwrap();
        b.backing.fail = true;
        // Reading a non-cached block must hit the backing and fail.
        let mut dst = [0u8; 10];
        assert!(matches!(b.read_at(&mut dst, 0), Err(Error::Io(_))));
    }
}
