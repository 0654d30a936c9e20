// Chunk: docs/chunks/editor_protocol - Shared buffer, editors, and the two-phase commit

//! The shared buffer and its editors.
//!
//! One [`Buffer`] holds the text; any number of [`Editor`]s edit it, each
//! with its own marks (dot included) and its own pending journal.
//! Editors may run on different threads.
//!
//! Every edit commits in two phases. Phase one runs under the buffer's
//! reader lock: it evaluates the edit's addresses against a snapshot of
//! the editor's marks and journals the changes it wants to make, without
//! touching the text. Phase two takes the writer lock and, provided no
//! other editor committed in between (detected by the buffer's sequence
//! counter and answered by retrying phase one), replays the
//! journal onto the text, carrying every live editor's marks across each
//! change. Phase one is therefore idempotent by construction: it only
//! reads, and writes nowhere but its own journal and mark snapshot.
//!
//! In between the phases, journaled spans are fixed up: each entry was
//! computed against the unmodified text, so later entries (and the span
//! that will become dot) are shifted by the size changes of earlier ones.
//! A journal whose entries overlap out of order is rejected.

use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use sted_buffer::{RuneBuffer, Span};

use crate::address::Address;
use crate::edit::Edit;
use crate::journal::Journal;
use crate::Error;

/// Block size of the text's backing pager.
const TEXT_BLOCK: usize = 1 << 12;

/// Block size of each editor's journal pager.
const JOURNAL_BLOCK: usize = 1 << 10;

/// Marks of one editor: named spans, with dot stored under `.`.
pub(crate) type Marks = HashMap<char, Span>;

/// Per-editor state kept inside the shared core, so a committing editor
/// can fix up everyone's marks under the writer lock.
struct EditorState {
    id: u64,
    marks: Marks,
}

struct Core {
    /// The text. The inner mutex serialises the rune buffer's one-block
    /// cache among concurrent readers of the outer lock.
    text: Mutex<RuneBuffer>,
    editors: Vec<EditorState>,
    next_id: u64,
}

struct Shared {
    core: RwLock<Core>,
    /// Mutation counter; bumped by every committed edit. Lives outside
    /// the lock so phase two can detect movement cheaply.
    seq: AtomicU64,
}

/// An editable buffer of runes, shared by any number of editors.
///
/// `Buffer` is a cheap cloneable handle; all clones see the same text.
#[derive(Clone)]
pub struct Buffer {
    shared: Arc<Shared>,
}

impl Buffer {
    /// Creates a new, empty buffer.
    pub fn new() -> Buffer {
        Buffer::with_block_size(TEXT_BLOCK)
    }

    /// Creates a new, empty buffer paged in `block_size`-byte blocks.
    pub fn with_block_size(block_size: usize) -> Buffer {
        Buffer {
            shared: Arc::new(Shared {
                core: RwLock::new(Core {
                    text: Mutex::new(RuneBuffer::new(block_size)),
                    editors: Vec::new(),
                    next_id: 0,
                }),
                seq: AtomicU64::new(0),
            }),
        }
    }

    /// Returns the number of runes in the buffer.
    pub fn len(&self) -> usize {
        let core = self.shared.core.read().unwrap();
        let text = core.text.lock().unwrap();
        text.len()
    }

    /// Returns true if the buffer holds no runes.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the text of the span.
    pub fn read(&self, at: Span) -> Result<String, Error> {
        let core = self.shared.core.read().unwrap();
        let mut text = core.text.lock().unwrap();
        Ok(text.read(at)?)
    }

    /// Returns the entire contents.
    pub fn contents(&self) -> Result<String, Error> {
        let core = self.shared.core.read().unwrap();
        let mut text = core.text.lock().unwrap();
        let len = text.len();
        Ok(text.read(Span::new(0, len))?)
    }
}

impl Default for Buffer {
    fn default() -> Self {
        Buffer::new()
    }
}

/// Phase-one context: what an edit's pend function may touch.
///
/// The text is read-only in spirit; it is `&mut` only because reads move
/// the pager's cache. The marks are the editor's private snapshot, and
/// the journal is the editor's own.
pub(crate) struct PendCx<'a> {
    pub text: &'a mut RuneBuffer,
    pub marks: &'a mut Marks,
    pub journal: &'a mut Journal,
    pub seq: u64,
    pub out: &'a mut dyn io::Write,
}

/// A handle for editing a [`Buffer`], with its own marks and journal.
pub struct Editor {
    buf: Buffer,
    id: u64,
    journal: Journal,
}

impl Editor {
    /// Registers a new editor on the buffer.
    pub fn new(buf: &Buffer) -> Editor {
        let mut core = buf.shared.core.write().unwrap();
        let id = core.next_id;
        core.next_id += 1;
        core.editors.push(EditorState {
            id,
            marks: Marks::new(),
        });
        Editor {
            buf: buf.clone(),
            id,
            journal: Journal::new(JOURNAL_BLOCK),
        }
    }

    /// Unregisters the editor, releasing its marks and journal.
    ///
    /// Dropping an editor does the same; `close` just names the intent.
    pub fn close(self) {}

    /// Returns the editor's dot.
    pub fn dot(&self) -> Span {
        self.mark('.')
    }

    /// Returns the named mark, or the empty span at 0 if it is unset.
    pub fn mark(&self, m: char) -> Span {
        let core = self.buf.shared.core.read().unwrap();
        core.editors
            .iter()
            .find(|s| s.id == self.id)
            .and_then(|s| s.marks.get(&m).copied())
            .unwrap_or_default()
    }

    /// Evaluates an address against the current text without committing
    /// anything.
    pub fn resolve(&self, a: &Address) -> Result<Span, Error> {
        let core = self.buf.shared.core.read().unwrap();
        let mut marks = core
            .editors
            .iter()
            .find(|s| s.id == self.id)
            .map(|s| s.marks.clone())
            .unwrap_or_default();
        let mut text = core.text.lock().unwrap();
        a.resolve(0, &mut text, &mut marks)
    }

    /// Applies an edit to the buffer. Output edits (`print`, `where`)
    /// write to `out` during phase one.
    pub fn apply(&mut self, e: &Edit, out: &mut impl io::Write) -> Result<(), Error> {
        self.run(|cx| e.pend(cx), out)
    }

    /// The two-phase optimistic commit.
    fn run(
        &mut self,
        mut pend: impl FnMut(&mut PendCx) -> Result<Span, Error>,
        out: &mut dyn io::Write,
    ) -> Result<(), Error> {
        loop {
            // Phase one: journal the changes under the reader lock,
            // against a fresh snapshot of this editor's marks.
            self.journal.clear()?;
            let (seq, at, marks) = {
                let core = self.buf.shared.core.read().unwrap();
                let seq = self.buf.shared.seq.load(Ordering::Acquire);
                let mut marks = core
                    .editors
                    .iter()
                    .find(|s| s.id == self.id)
                    .map(|s| s.marks.clone())
                    .unwrap_or_default();
                let mut text = core.text.lock().unwrap();
                let mut cx = PendCx {
                    text: &mut text,
                    marks: &mut marks,
                    journal: &mut self.journal,
                    seq,
                    out: &mut *out,
                };
                let at = pend(&mut cx)?;
                (seq, at, marks)
            };

            let at = fix_spans(at, &mut self.journal)?;

            // Phase two: replay the journal under the writer lock,
            // unless someone else committed first.
            let mut guard = self.buf.shared.core.write().unwrap();
            if self.buf.shared.seq.load(Ordering::Acquire) != seq {
                tracing::debug!(seq, "buffer changed during phase one; retrying");
                drop(guard);
                continue;
            }
            let core = &mut *guard;
            if let Some(state) = core.editors.iter_mut().find(|s| s.id == self.id) {
                state.marks = marks;
            }
            for i in 0..self.journal.len() {
                let entry = self.journal.entry(i)?;
                let n = {
                    let mut text = core.text.lock().unwrap();
                    text.write(&entry.text, entry.at)?
                };
                for state in core.editors.iter_mut() {
                    for m in state.marks.values_mut() {
                        *m = m.update(entry.at, n);
                    }
                }
            }
            if let Some(state) = core.editors.iter_mut().find(|s| s.id == self.id) {
                state.marks.insert('.', at);
            }
            self.buf.shared.seq.fetch_add(1, Ordering::Release);
            tracing::trace!(entries = self.journal.len(), "committed edit");
            return Ok(());
        }
    }
}

impl Drop for Editor {
    fn drop(&mut self) {
        if let Ok(mut core) = self.buf.shared.core.write() {
            core.editors.retain(|s| s.id != self.id);
        }
    }
}

/// Carries the computed span and every journaled span forward across the
/// size changes of earlier entries.
///
/// An entry with the same `from` as the computed span grows it, even a
/// point span, to cover the entry's insertion; the general update rule
/// would leave a point where it was instead.
fn fix_spans(mut at: Span, journal: &mut Journal) -> Result<Span, Error> {
    if !in_sequence(journal)? {
        return Err(Error::NotInSequence);
    }
    for i in 0..journal.len() {
        let e = journal.header(i)?;
        if e.at.from == at.from {
            at.to = at.update(e.at, e.runes).to;
        } else {
            at = at.update(e.at, e.runes);
        }
        for j in i + 1..journal.len() {
            let f = journal.header(j)?;
            journal.set_span(j, f.at.update(e.at, e.runes))?;
        }
    }
    Ok(at)
}

/// Returns true if the journal's entries are in ascending address order
/// (identical spans excepted).
fn in_sequence(journal: &mut Journal) -> Result<bool, Error> {
    for i in 1..journal.len() {
        let e = journal.header(i - 1)?;
        let f = journal.header(i)?;
        if f.at != e.at && f.at.from < e.at.to {
            return Ok(false);
        }
    }
    Ok(true)
}
