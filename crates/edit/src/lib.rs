// Chunk: docs/chunks/edit_language - Edit AST, grammar, and phase-one functions
// Chunk: docs/chunks/editor_protocol - Shared buffer, editors, and the two-phase commit

//! sted-edit: addresses, edits, and editors in the sam tradition.
//!
//! A [`Buffer`] holds text shared by any number of [`Editor`]s, possibly
//! on different threads. An [`Address`] names a substring of the buffer
//! (by line, rune offset, mark, regular expression, or arithmetic over
//! those) and an [`Edit`] pairs an address with an operation: change,
//! append, insert, delete, move, copy, mark, print, where, substitute.
//! Both have a textual grammar and a builder API, and both print back to
//! text that parses to an equivalent value.
//!
//! Edits commit under an optimistic two-phase protocol that keeps every
//! editor's marks consistent across interleaved changes; see the
//! `editor` module docs for the mechanics.
//!
//! # Example
//!
//! ```
//! use sted_edit::{all, regex, Buffer, Edit, Editor};
//!
//! let buf = Buffer::new();
//! let mut ed = Editor::new(&buf);
//! let mut out = Vec::new();
//!
//! ed.apply(&Edit::change(all(), "Hello, 世界!"), &mut out).unwrap();
//! ed.apply(&Edit::where_runes(regex("/世界/")), &mut out).unwrap();
//! assert_eq!(out, b"#7,#9");
//!
//! // The same edit, from text.
//! let text: Vec<char> = "/世界/c/World/".chars().collect();
//! let (e, _) = Edit::parse_prefix(&text).unwrap();
//! ed.apply(&e, &mut Vec::new()).unwrap();
//! assert_eq!(buf.contents().unwrap(), "Hello, World!");
//! ```

use std::io;

mod address;
mod edit;
mod editor;
mod journal;

pub use address::{all, dot, end, line, mark, regex, rune, Address, SimpleAddress};
pub use edit::Edit;
pub use editor::{Buffer, Editor};
pub use sted_buffer::Span;

/// Errors from evaluating addresses and applying edits.
///
/// Everything here aborts the current edit without modifying the buffer,
/// except the I/O and journal-order variants, which can surface from
/// phase two and leave the editor unusable; callers drop it then.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A regular-expression address found no match.
    #[error("no match")]
    NoMatch,
    /// A mark name outside `[a-zA-Z.]`.
    #[error("bad mark: {0}")]
    BadMark(char),
    /// A `#n` address before the start or past the end.
    #[error("rune address out of range")]
    RuneAddressOutOfRange,
    /// A line address past the last line.
    #[error("line address out of range")]
    LineAddressOutOfRange,
    /// A move whose destination falls inside its source.
    #[error("addresses overlap")]
    Overlap,
    /// Journal entries out of ascending address order.
    #[error("changes not in sequence")]
    NotInSequence,
    /// A malformed address or edit.
    #[error("{pos}: {msg}")]
    Parse { pos: usize, msg: String },
    /// A malformed regular expression.
    #[error(transparent)]
    Pattern(#[from] sted_regex::ParseError),
    /// Storage failure in the text or journal.
    #[error(transparent)]
    Buffer(#[from] sted_buffer::Error),
    /// Failure writing to the caller's output sink.
    #[error("write output: {0}")]
    Output(#[source] io::Error),
}
