// Chunk: docs/chunks/regex_engine - Plan 9 regexp(7) engine public surface

//! sted-regex: Plan 9 regular expressions with submatches and reverse
//! matching.
//!
//! The dialect is the `regexp(7)` one used by sam-family editors:
//! literals, `.` (any rune but newline), character classes with ranges and
//! negation (a negated class never matches newline), the `^`/`$` line
//! anchors, `* + ?` repetition, grouping with submatch capture, and
//! alternation. `\n` escapes to a newline; any other `\x` is the literal
//! `x`.
//!
//! Three compile options mirror how editor addresses use patterns:
//! `delimited` treats the first rune as a delimiter and consumes through
//! its next unescaped occurrence; `reverse` compiles the automaton to run
//! right-to-left (concatenation flipped, anchors swapped) over a
//! [`Reversed`] view; `literal` disables all metacharacters.
//!
//! # Example
//!
//! ```
//! use sted_regex::{Options, Regex};
//!
//! let re = Regex::compile("(a+)b", Options::default()).unwrap();
//! let text: Vec<char> = "xxaaab".chars().collect();
//! let m = re.find(&text[..], 0).unwrap();
//! assert_eq!(m[0], [2, 6]); // whole match
//! assert_eq!(m[1], [2, 5]); // group 1
//! ```
//!
//! Matching is leftmost-longest: every start position from `from` through
//! the end is attempted (wrapping around to the front afterwards), and at
//! the first position that matches at all, the longest acceptance wins.

use std::sync::Mutex;

mod machine;
mod program;

use machine::Machine;
use program::{Label, Program};

/// How many idle machines a compiled expression keeps for reuse.
const MACHINE_CACHE: usize = 2;

/// Compile-time options.
#[derive(Debug, Clone, Copy, Default)]
pub struct Options {
    /// The first rune of the pattern is a delimiter; compilation consumes
    /// up to and including its next unescaped occurrence.
    pub delimited: bool,
    /// Compile for right-to-left matching over a [`Reversed`] view.
    pub reverse: bool,
    /// Treat metacharacters as literals.
    pub literal: bool,
}

/// A compile error: where in the pattern, and what went wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("{pos}: {msg}")]
pub struct ParseError {
    pub pos: usize,
    pub msg: &'static str,
}

/// Indexable rune text, the matcher's input.
///
/// `rune` returns `None` past the end. Adapters over fallible storage may
/// also return `None` to cut the text short on a read error and report it
/// out of band; the matcher treats that position as the end of the text.
pub trait Runes {
    fn len(&self) -> usize;
    fn rune(&self, i: usize) -> Option<char>;
}

impl Runes for [char] {
    fn len(&self) -> usize {
        self.len()
    }

    fn rune(&self, i: usize) -> Option<char> {
        self.get(i).copied()
    }
}

/// A right-to-left view of some other text, for reverse matching.
///
/// Offsets in match results are in the reversed coordinate system; callers
/// translate back with `len - offset`.
pub struct Reversed<'a, R: Runes + ?Sized>(pub &'a R);

impl<R: Runes + ?Sized> Runes for Reversed<'_, R> {
    fn len(&self) -> usize {
        self.0.len()
    }

    fn rune(&self, i: usize) -> Option<char> {
        self.0.rune(self.0.len() - i - 1)
    }
}

/// A compiled regular expression.
///
/// Matching through `&self` is thread-safe: scratch state lives in a small
/// pool of machines behind a mutex.
#[derive(Debug)]
pub struct Regex {
    expr: String,
    prog: Program,
    /// Label of the sole first consuming edge, if the program starts with
    /// one; lets an attempt be rejected without running the machine.
    first: Option<Label>,
    machines: Mutex<Vec<Machine>>,
}

impl Regex {
    /// Compiles `pattern` under the given options.
    pub fn compile(pattern: &str, opts: Options) -> Result<Regex, ParseError> {
        let rs: Vec<char> = pattern.chars().collect();
        let prog = program::compile(&rs, opts)?;
        let expr = rs[..prog.consumed].iter().collect();
        let first = first_label(&prog);
        Ok(Regex {
            expr,
            prog,
            first,
            machines: Mutex::new(Vec::new()),
        })
    }

    /// Returns the pattern text that was consumed, including delimiters.
    pub fn expression(&self) -> &str {
        &self.expr
    }

    /// Returns the number of submatch slots, counting the whole match.
    pub fn captures(&self) -> usize {
        self.prog.nsub
    }

    /// Returns the leftmost-longest match starting at `from` or later,
    /// wrapping around to the front of the text if nothing matches before
    /// the end.
    ///
    /// Entry `k` of the result is the `[start, end)` rune interval of
    /// submatch `k`; entry 0 is the whole match. An untraversed group is
    /// the empty interval `[0, 0]`. The empty pattern matches the empty
    /// string at any position.
    pub fn find<R: Runes + ?Sized>(&self, rs: &R, from: usize) -> Option<Vec<[usize; 2]>> {
        let mut m = self
            .machines
            .lock()
            .unwrap()
            .pop()
            .unwrap_or_else(|| Machine::new(&self.prog));

        let mut found = None;
        // Attempts run through len inclusive so the empty expression can
        // match the empty text.
        for i in (from..=rs.len()).chain(0..from) {
            if let Some(es) = m.run(&self.prog, self.first.as_ref(), rs, i) {
                found = Some(es);
                break;
            }
        }

        let mut pool = self.machines.lock().unwrap();
        if pool.len() < MACHINE_CACHE {
            pool.push(m);
        }
        found
    }

    /// Like [`Regex::find`], but without wrapping: only start positions
    /// from `from` through the end of the text are tried.
    pub fn find_forward<R: Runes + ?Sized>(
        &self,
        rs: &R,
        from: usize,
    ) -> Option<Vec<[usize; 2]>> {
        let mut m = self
            .machines
            .lock()
            .unwrap()
            .pop()
            .unwrap_or_else(|| Machine::new(&self.prog));

        let mut found = None;
        for i in from..=rs.len() {
            if let Some(es) = m.run(&self.prog, self.first.as_ref(), rs, i) {
                found = Some(es);
                break;
            }
        }

        let mut pool = self.machines.lock().unwrap();
        if pool.len() < MACHINE_CACHE {
            pool.push(m);
        }
        found
    }
}

/// Returns the program's first consuming label when it is the only way in.
fn first_label(prog: &Program) -> Option<Label> {
    let s0 = prog.nodes[prog.start].out[0].to?;
    let node = &prog.nodes[s0];
    if node.out[1].to.is_none() && !node.out[0].is_epsilon() {
        return node.out[0].label.clone();
    }
    None
}
