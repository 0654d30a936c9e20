// Chunk: docs/chunks/edit_language - Edit AST, grammar, and phase-one functions

//! The edit language: operations on an address.
//!
//! Each edit names an address (defaulting to dot) and a verb:
//!
//! | text | edit |
//! |---|---|
//! | `a c/x/` | change the text at `a` to `x` |
//! | `a a/x/` | append `x` after `a` |
//! | `a i/x/` | insert `x` before `a` |
//! | `a d` | delete the text at `a` |
//! | `a m b` | move the text at `a` to after `b` |
//! | `a t b` | copy the text at `a` to after `b` |
//! | `a k l` | set the mark named `l` to `a` |
//! | `a p` | print the text at `a` |
//! | `a =` | print the line numbers of `a` |
//! | `a =#` | print the rune offsets of `a` |
//! | `a s/re/x/` | substitute `x` for matches of `re` within `a` |
//! | `a` | set dot to `a` |
//!
//! Text arguments are delimited inline (`c/x/`, any delimiter, `\n` for
//! newline) or multiline (`c` then lines terminated by a lone `.`). The
//! substitute verb takes an optional match ordinal before the delimiter
//! and a trailing `g` to replace every match.
//!
//! Parsing an edit consumes through its terminator and returns the rest;
//! every edit prints back to text that parses to an equivalent edit.
//!
//! The `pend` functions here are phase one of the editor's two-phase
//! commit: they evaluate addresses against a read-only view and journal
//! the text changes without touching the buffer. They are idempotent,
//! since a contended commit re-runs them.

use std::fmt;
use std::io::Write;

use sted_buffer::{RuneBuffer, Span};
use sted_regex::{Options, Regex, Runes};

use crate::address::{
    dot, parse_compound, take_digits, with_trailing_delim, Address, Scanner, TextRunes,
};
use crate::editor::PendCx;
use crate::Error;

/// An edit: an operation on the text at an address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Edit {
    Change(Address, String),
    Append(Address, String),
    Insert(Address, String),
    Delete(Address),
    Move(Address, Address),
    Copy(Address, Address),
    /// Sets the named mark; `.` makes this the "set dot" edit.
    Mark(Address, char),
    Print(Address),
    /// Prints the address in rune form: `#from` or `#from,#to`.
    Where(Address),
    /// Prints the address in line form: `l0` or `l0,l1`.
    WhereLine(Address),
    Substitute {
        addr: Address,
        /// The delimited pattern, compiled lazily at evaluation.
        pattern: String,
        /// The raw replacement; `\n`, `\\`, and `\0`–`\9` expand at
        /// evaluation.
        with: String,
        global: bool,
        /// Replacement starts at the `nth` match.
        nth: usize,
    },
}

// ==================== Builders ====================

impl Edit {
    /// Replaces the text at `a` with `text`.
    pub fn change(a: impl Into<Address>, text: &str) -> Edit {
        Edit::Change(a.into(), text.into())
    }

    /// Inserts `text` after the text at `a`.
    pub fn append(a: impl Into<Address>, text: &str) -> Edit {
        Edit::Append(a.into(), text.into())
    }

    /// Inserts `text` before the text at `a`.
    pub fn insert(a: impl Into<Address>, text: &str) -> Edit {
        Edit::Insert(a.into(), text.into())
    }

    /// Deletes the text at `a`.
    pub fn delete(a: impl Into<Address>) -> Edit {
        Edit::Delete(a.into())
    }

    /// Moves the text at `src` to after `dst`.
    pub fn move_to(src: impl Into<Address>, dst: impl Into<Address>) -> Edit {
        Edit::Move(src.into(), dst.into())
    }

    /// Copies the text at `src` to after `dst`.
    pub fn copy_to(src: impl Into<Address>, dst: impl Into<Address>) -> Edit {
        Edit::Copy(src.into(), dst.into())
    }

    /// Sets the mark named `m` to the text at `a`. The mark `.` sets dot.
    pub fn set_mark(a: impl Into<Address>, m: char) -> Edit {
        Edit::Mark(a.into(), m)
    }

    /// Writes the text at `a` to the output sink.
    pub fn print(a: impl Into<Address>) -> Edit {
        Edit::Print(a.into())
    }

    /// Writes the rune offsets of `a` to the output sink.
    pub fn where_runes(a: impl Into<Address>) -> Edit {
        Edit::Where(a.into())
    }

    /// Writes the line numbers of `a` to the output sink.
    pub fn where_line(a: impl Into<Address>) -> Edit {
        Edit::WhereLine(a.into())
    }

    /// Replaces the first match of `pattern` within `a` by `with`.
    ///
    /// The pattern is in delimited form (`/re/`); a missing trailing
    /// delimiter is supplied. `with` may use `\n` for newline, `\\` for a
    /// backslash, and `\0`–`\9` for submatches of the pattern.
    pub fn substitute(a: impl Into<Address>, pattern: &str, with: &str) -> Edit {
        Edit::Substitute {
            addr: a.into(),
            pattern: with_trailing_delim(pattern),
            with: with.into(),
            global: false,
            nth: 1,
        }
    }

    /// Replaces every match of `pattern` within `a` by `with`.
    pub fn substitute_global(a: impl Into<Address>, pattern: &str, with: &str) -> Edit {
        match Edit::substitute(a, pattern, with) {
            Edit::Substitute {
                addr,
                pattern,
                with,
                nth,
                ..
            } => Edit::Substitute {
                addr,
                pattern,
                with,
                global: true,
                nth,
            },
            _ => unreachable!(),
        }
    }
}

// ==================== Stringification ====================

/// Renders a text argument: inline-delimited unless it ends in a newline,
/// in which case the multiline form is used.
fn escape(text: &str) -> String {
    if text.ends_with('\n') {
        return format!("\n{text}.\n");
    }
    let mut out = String::with_capacity(text.len() + 2);
    out.push('/');
    for r in text.chars() {
        match r {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '/' => out.push_str("\\/"),
            _ => out.push(r),
        }
    }
    out.push('/');
    out
}

/// Renders a substitute replacement. Backslash escapes are stored raw, so
/// only the delimiter and newlines need escaping here.
fn escape_with(with: &str, d: char) -> String {
    let mut out = String::with_capacity(with.len());
    for r in with.chars() {
        if r == d {
            out.push('\\');
            out.push(d);
        } else if r == '\n' {
            out.push_str("\\n");
        } else {
            out.push(r);
        }
    }
    out
}

impl fmt::Display for Edit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Edit::Change(a, text) => write!(f, "{a}c{}", escape(text)),
            Edit::Append(a, text) => write!(f, "{a}a{}", escape(text)),
            Edit::Insert(a, text) => write!(f, "{a}i{}", escape(text)),
            Edit::Delete(a) => write!(f, "{a}d"),
            Edit::Move(src, dst) => write!(f, "{src}m{dst}"),
            Edit::Copy(src, dst) => write!(f, "{src}t{dst}"),
            Edit::Mark(a, '.') => write!(f, "{a}"),
            Edit::Mark(a, m) => write!(f, "{a}k{m}"),
            Edit::Print(a) => write!(f, "{a}p"),
            Edit::Where(a) => write!(f, "{a}=#"),
            Edit::WhereLine(a) => write!(f, "{a}="),
            Edit::Substitute {
                addr,
                pattern,
                with,
                global,
                nth,
            } => {
                let d = pattern.chars().next().unwrap_or('/');
                write!(f, "{addr}s")?;
                if *nth > 1 {
                    write!(f, "{nth}")?;
                }
                write!(f, "{pattern}{}{d}", escape_with(with, d))?;
                if *global {
                    write!(f, "g")?;
                }
                Ok(())
            }
        }
    }
}

// ==================== Parsing ====================

impl Edit {
    /// Parses a leading edit from `rs`, returning it and the unconsumed
    /// remainder. A bare address (or nothing at all) is the "set dot"
    /// edit.
    pub fn parse_prefix(rs: &[char]) -> Result<(Edit, &[char]), Error> {
        let mut s = Scanner::new(rs);
        let addr = parse_compound(&mut s)?;
        s.skip_hspace();
        let addr = move || addr.unwrap_or_else(|| dot().into());
        let edit = match s.peek() {
            None => Edit::Mark(addr(), '.'),
            Some('\n') => {
                s.bump();
                Edit::Mark(addr(), '.')
            }
            Some('c') => {
                s.bump();
                Edit::Change(addr(), parse_text(&mut s))
            }
            Some('a') => {
                s.bump();
                Edit::Append(addr(), parse_text(&mut s))
            }
            Some('i') => {
                s.bump();
                Edit::Insert(addr(), parse_text(&mut s))
            }
            Some('d') => {
                s.bump();
                finish_plain(&mut s);
                Edit::Delete(addr())
            }
            Some('m') => {
                s.bump();
                let dst = parse_compound(&mut s)?.unwrap_or_else(|| dot().into());
                finish_plain(&mut s);
                Edit::Move(addr(), dst)
            }
            Some('t') => {
                s.bump();
                let dst = parse_compound(&mut s)?.unwrap_or_else(|| dot().into());
                finish_plain(&mut s);
                Edit::Copy(addr(), dst)
            }
            Some('k') => {
                s.bump();
                s.skip_hspace();
                let m = match s.peek() {
                    Some(r) if r.is_ascii_alphabetic() => {
                        s.bump();
                        r
                    }
                    _ => '.',
                };
                finish_plain(&mut s);
                Edit::Mark(addr(), m)
            }
            Some('p') => {
                s.bump();
                finish_plain(&mut s);
                Edit::Print(addr())
            }
            Some('=') => {
                s.bump();
                let e = if s.peek() == Some('#') {
                    s.bump();
                    Edit::Where(addr())
                } else {
                    Edit::WhereLine(addr())
                };
                finish_plain(&mut s);
                e
            }
            Some('s') => {
                s.bump();
                parse_substitute(&mut s, addr())?
            }
            Some(r) => {
                return Err(Error::Parse {
                    pos: s.pos(),
                    msg: format!("unknown command: {r}"),
                })
            }
        };
        Ok((edit, s.rest()))
    }
}

/// Consumes the tail of a textless verb: horizontal space and one
/// optional terminating newline.
fn finish_plain(s: &mut Scanner) {
    s.skip_hspace();
    if s.peek() == Some('\n') {
        s.bump();
    }
}

/// Parses a text argument: inline-delimited, or multiline when the verb
/// is followed directly by a newline.
fn parse_text(s: &mut Scanner) -> String {
    match s.peek() {
        None => String::new(),
        Some('\n') => {
            s.bump();
            parse_multiline(s)
        }
        Some(d) => {
            s.bump();
            parse_delimited(s, d)
        }
    }
}

/// Inline text: runs to an unescaped delimiter, a newline, or the end,
/// consuming the terminator. `\n` is a newline, `\\` a backslash, and an
/// escaped delimiter is itself; any other escape is the escaped rune.
fn parse_delimited(s: &mut Scanner, d: char) -> String {
    let mut out = String::new();
    while let Some(r) = s.bump() {
        match r {
            '\n' => break,
            _ if r == d => break,
            '\\' => match s.bump() {
                Some('n') => out.push('\n'),
                Some('\\') => out.push('\\'),
                Some(e) if e == d => out.push(d),
                Some(e) => out.push(e),
                None => {
                    out.push('\\');
                    break;
                }
            },
            _ => out.push(r),
        }
    }
    out
}

/// Multiline text: lines up to one holding a single `.`.
fn parse_multiline(s: &mut Scanner) -> String {
    let mut text = String::new();
    loop {
        let mut line = String::new();
        let mut saw_newline = false;
        while let Some(r) = s.bump() {
            if r == '\n' {
                saw_newline = true;
                break;
            }
            line.push(r);
        }
        if line == "." {
            return text;
        }
        text.push_str(&line);
        if saw_newline {
            text.push('\n');
        } else {
            return text;
        }
    }
}

/// The tail of an `s` edit: `[nth][d]pattern[d]replacement[d][g]`.
fn parse_substitute(s: &mut Scanner, addr: Address) -> Result<Edit, Error> {
    s.skip_hspace();
    let digits = take_digits(s);
    let nth = if digits.is_empty() {
        1
    } else {
        digits.parse::<usize>().map_err(|_| Error::Parse {
            pos: s.pos(),
            msg: "value out of range".into(),
        })?
    };
    s.skip_hspace();

    let d = match s.peek() {
        None | Some('\n') => {
            return Err(Error::Parse {
                pos: s.pos(),
                msg: "missing pattern".into(),
            })
        }
        Some(d) => {
            s.bump();
            d
        }
    };

    // The pattern is kept raw, escapes and all, for the regex compiler.
    let mut pat = String::new();
    let mut esc = false;
    while let Some(r) = s.peek() {
        if r == '\n' {
            break;
        }
        s.bump();
        if !esc && r == d {
            break;
        }
        pat.push(r);
        esc = !esc && r == '\\';
    }
    if pat.is_empty() {
        return Err(Error::Parse {
            pos: s.pos(),
            msg: "missing pattern".into(),
        });
    }
    let pattern = format!("{d}{pat}{d}");

    // The replacement keeps backslash escapes raw too, except for the
    // delimiter, which is unescaped here and re-escaped on display.
    let mut with = String::new();
    let mut closed = false;
    loop {
        let r = match s.peek() {
            None => break,
            Some(r) => r,
        };
        if r == '\n' {
            s.bump();
            break;
        }
        s.bump();
        if r == d {
            closed = true;
            break;
        }
        if r == '\\' {
            if s.peek() == Some(d) {
                s.bump();
                with.push(d);
            } else {
                with.push('\\');
            }
            continue;
        }
        with.push(r);
    }

    let mut global = false;
    if closed && s.peek() == Some('g') {
        s.bump();
        global = true;
    }

    Ok(Edit::Substitute {
        addr,
        pattern,
        with,
        global,
        nth,
    })
}

// ==================== Phase one ====================

impl Edit {
    /// Phase one of the two-phase commit: evaluates this edit's addresses
    /// and journals its changes, without mutating the buffer. Returns the
    /// span the edit was computed over, which becomes dot after fix-up.
    pub(crate) fn pend(&self, cx: &mut PendCx) -> Result<Span, Error> {
        match self {
            Edit::Change(a, text) => {
                let at = a.resolve(0, cx.text, cx.marks)?;
                cx.journal.push(at, text, cx.seq)?;
                Ok(at)
            }
            Edit::Append(a, text) => {
                let at = a.resolve(0, cx.text, cx.marks)?;
                let p = Span::point(at.to);
                cx.journal.push(p, text, cx.seq)?;
                Ok(p)
            }
            Edit::Insert(a, text) => {
                let at = a.resolve(0, cx.text, cx.marks)?;
                let p = Span::point(at.from);
                cx.journal.push(p, text, cx.seq)?;
                Ok(p)
            }
            Edit::Delete(a) => {
                let at = a.resolve(0, cx.text, cx.marks)?;
                cx.journal.push(at, "", cx.seq)?;
                Ok(at)
            }
            Edit::Move(src, dst) => {
                let s = src.resolve(0, cx.text, cx.marks)?;
                let d = dst.resolve(0, cx.text, cx.marks)?;
                let d = Span::point(d.to);
                if d.from > s.from && d.from < s.to {
                    return Err(Error::Overlap);
                }
                let text = cx.text.read(s)?;
                if d.from >= s.to {
                    // Journal in address order: the delete comes first.
                    cx.journal.push(s, "", cx.seq)?;
                    cx.journal.push(d, &text, cx.seq)?;
                } else {
                    cx.journal.push(d, &text, cx.seq)?;
                    cx.journal.push(s, "", cx.seq)?;
                }
                Ok(d)
            }
            Edit::Copy(src, dst) => {
                let s = src.resolve(0, cx.text, cx.marks)?;
                let d = dst.resolve(0, cx.text, cx.marks)?;
                let d = Span::point(d.to);
                let text = cx.text.read(s)?;
                cx.journal.push(d, &text, cx.seq)?;
                Ok(d)
            }
            Edit::Mark(a, m) => {
                let at = a.resolve(0, cx.text, cx.marks)?;
                if *m == '.' {
                    return Ok(at);
                }
                cx.marks.insert(*m, at);
                Ok(cx.marks.get(&'.').copied().unwrap_or_default())
            }
            Edit::Print(a) => {
                let at = a.resolve(0, cx.text, cx.marks)?;
                let text = cx.text.read(at)?;
                cx.out.write_all(text.as_bytes()).map_err(Error::Output)?;
                Ok(at)
            }
            Edit::Where(a) => {
                let at = a.resolve(0, cx.text, cx.marks)?;
                let out = if at.is_empty() {
                    format!("#{}", at.from)
                } else {
                    format!("#{},#{}", at.from, at.to)
                };
                cx.out.write_all(out.as_bytes()).map_err(Error::Output)?;
                Ok(at)
            }
            Edit::WhereLine(a) => {
                let at = a.resolve(0, cx.text, cx.marks)?;
                let (l0, l1) = line_numbers(at, cx.text)?;
                let out = if l0 == l1 {
                    format!("{l0}")
                } else {
                    format!("{l0},{l1}")
                };
                cx.out.write_all(out.as_bytes()).map_err(Error::Output)?;
                Ok(at)
            }
            Edit::Substitute {
                addr,
                pattern,
                with,
                global,
                nth,
            } => pend_substitute(cx, addr, pattern, with, *global, *nth),
        }
    }
}

/// Returns the 1-based line numbers of the endpoints of `at`. A newline
/// that terminates the span does not start a new line.
fn line_numbers(at: Span, text: &mut RuneBuffer) -> Result<(usize, usize), Error> {
    let mut l0 = 1;
    let mut i = 0;
    while i < at.from {
        if text.rune(i)? == '\n' {
            l0 += 1;
        }
        i += 1;
    }
    let mut l1 = l0;
    while i < at.to {
        if text.rune(i)? == '\n' && i < at.to - 1 {
            l1 += 1;
        }
        i += 1;
    }
    Ok((l0, l1))
}

/// A prefix of some other text; matches within the addressed span must
/// not run past its end.
struct Clipped<'a, R: Runes + ?Sized> {
    inner: &'a R,
    len: usize,
}

impl<R: Runes + ?Sized> Runes for Clipped<'_, R> {
    fn len(&self) -> usize {
        self.len
    }

    fn rune(&self, i: usize) -> Option<char> {
        if i < self.len {
            self.inner.rune(i)
        } else {
            None
        }
    }
}

fn pend_substitute(
    cx: &mut PendCx,
    addr: &Address,
    pattern: &str,
    with: &str,
    global: bool,
    nth: usize,
) -> Result<Span, Error> {
    let at = addr.resolve(0, cx.text, cx.marks)?;
    let re = Regex::compile(
        pattern,
        Options {
            delimited: true,
            ..Options::default()
        },
    )?;

    let rs = TextRunes::new(cx.text);
    let clipped = Clipped {
        inner: &rs,
        len: at.to,
    };
    let mut skip = nth.max(1);
    let mut start = at.from;
    loop {
        let m = match re.find_forward(&clipped, start) {
            Some(m) => m,
            None => break,
        };
        rs.take_err()?;
        let m0 = Span::new(m[0][0], m[0][1]);
        if skip > 1 {
            skip -= 1;
            start = if m0.is_empty() { m0.to + 1 } else { m0.to };
            continue;
        }
        let repl = expand(with, &m, &rs)?;
        cx.journal.push(m0, &repl, cx.seq)?;
        if !global {
            break;
        }
        start = if m0.is_empty() { m0.to + 1 } else { m0.to };
    }
    rs.take_err()?;
    Ok(at)
}

/// Expands a substitute replacement: `\n` is a newline, `\\` a backslash,
/// `\0`–`\9` the text of that submatch (empty if it did not match).
fn expand(with: &str, m: &[[usize; 2]], rs: &TextRunes) -> Result<String, Error> {
    let mut out = String::new();
    let mut it = with.chars();
    while let Some(r) = it.next() {
        if r != '\\' {
            out.push(r);
            continue;
        }
        match it.next() {
            Some('n') => out.push('\n'),
            Some('\\') => out.push('\\'),
            Some(d) if d.is_ascii_digit() => {
                let k = d as usize - '0' as usize;
                if k < m.len() && m[k][0] < m[k][1] {
                    out.push_str(&rs.read(Span::new(m[k][0], m[k][1]))?);
                }
            }
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    Ok(out)
}
