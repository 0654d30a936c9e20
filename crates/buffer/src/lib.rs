// Chunk: docs/chunks/block_pager - Scratch-file-backed paged byte buffer
// Chunk: docs/chunks/rune_buffer - UTF-8 rune view over the block pager

//! sted-buffer: file-backed paged buffers for the sted editing core.
//!
//! This crate provides the storage layer: a [`BlockBuffer`] of bytes paged
//! into fixed-size blocks over a lazily created scratch file (at most one
//! block resident in memory), and a [`RuneBuffer`] presenting that byte
//! sequence as UTF-8 with rune-indexed access. [`Span`] is the half-open
//! rune range type shared by the whole editing core, together with its
//! `update` algebra for carrying ranges across edits.
//!
//! # Example
//!
//! ```
//! use sted_buffer::{RuneBuffer, Span};
//!
//! let mut b = RuneBuffer::new(1 << 12);
//! b.insert("Hello, 世界!", 0).unwrap();
//! assert_eq!(b.len(), 10); // runes, not bytes
//! assert_eq!(b.read(Span::new(7, 9)).unwrap(), "世界");
//!
//! b.write("World", Span::new(7, 9)).unwrap();
//! assert_eq!(b.read(Span::new(0, b.len())).unwrap(), "Hello, World!");
//! ```
//!
//! The scratch file is anonymous and unlinked at creation, so its space is
//! reclaimed when the buffer is dropped, or by the OS if the process dies
//! first. Its layout is private to this crate.

mod block;
mod rune;
mod span;

pub use block::{Backing, BlockBuffer, Error, ScratchFile};
pub use rune::RuneBuffer;
pub use span::Span;
