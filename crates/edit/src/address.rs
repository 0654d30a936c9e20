// Chunk: docs/chunks/address_algebra - Address AST, parser, and evaluator

//! The address algebra: a compositional language for naming substrings.
//!
//! A simple address names one span: the dot, the end of the buffer, a
//! named mark, a rune offset, a line, or a regular-expression match. An
//! [`Address`] combines simple addresses: `a,b` spans from the start of
//! `a` to the end of `b`; `a;b` is the same but evaluates `b` from the
//! end of `a` with dot temporarily set to `a`; `a+b` and `a-b` evaluate
//! `b` forward from the end of `a` or in reverse from its start.
//!
//! Addresses come from two places: the builder functions here ([`dot`],
//! [`line`], [`regex`], … with the [`Address::to`]-style combinators) and
//! the textual grammar via [`Address::parse_prefix`]. Every address
//! renders back to text that re-parses to an equivalent tree; the one
//! caveat is that `rune(-n)` and `line(-n)` render as `-#n` and `-n`,
//! which re-parse with an implicit leading dot.

use std::cell::RefCell;
use std::fmt;

use sted_buffer::{RuneBuffer, Span};
use sted_regex::{Options, Regex, Reversed, Runes};

use crate::editor::Marks;
use crate::Error;

/// A simple address: one leaf of the algebra, naming a single span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimpleAddress {
    /// `.`: the editor's current dot.
    Dot,
    /// `$`: the empty string at the end of the buffer.
    End,
    /// `'l`: the mark named by a letter (or `.`, naming dot).
    Mark(char),
    /// `#n`: the empty string after rune `n`; negative means `-#n`.
    Rune(i64),
    /// `n`: the nth full line; `neg` is the reversed form `-n`.
    Line { n: usize, neg: bool },
    /// `/re/` or `?re?`: the next match, forward or in reverse.
    Regex { pattern: String, reverse: bool },
}

/// An address: a simple address or a combination of them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Address {
    Simple(SimpleAddress),
    /// `a,b`
    To(Box<Address>, Box<Address>),
    /// `a;b`
    Then(Box<Address>, Box<Address>),
    /// `a+b`
    Plus(Box<Address>, SimpleAddress),
    /// `a-b`
    Minus(Box<Address>, SimpleAddress),
}

// ==================== Builders ====================

/// The address of the entire buffer: `0,$`.
pub fn all() -> Address {
    line(0).to(end())
}

/// The address of the editor's dot.
pub fn dot() -> SimpleAddress {
    SimpleAddress::Dot
}

/// The address of the empty string at the end of the buffer.
pub fn end() -> SimpleAddress {
    SimpleAddress::End
}

/// The address of the named mark.
///
/// The name must be a letter or `.`; anything else evaluates to a
/// `bad mark` error.
pub fn mark(m: char) -> SimpleAddress {
    SimpleAddress::Mark(m)
}

/// The address of the empty string after rune `n`.
///
/// A negative `n` is the reversed form, equivalent to `.-#n`.
pub fn rune(n: i64) -> SimpleAddress {
    SimpleAddress::Rune(n)
}

/// The address of the `n`th full line. Line 0 is the empty string before
/// the first full line. A negative `n` is the reversed form `.-n`.
pub fn line(n: i64) -> SimpleAddress {
    if n < 0 {
        SimpleAddress::Line {
            n: n.unsigned_abs() as usize,
            neg: true,
        }
    } else {
        SimpleAddress::Line {
            n: n as usize,
            neg: false,
        }
    }
}

/// The address of the next match of a delimited regular expression.
///
/// The first rune is the delimiter; `?` as the delimiter matches in
/// reverse. A missing trailing delimiter is supplied. The expression is
/// not compiled until the address is evaluated, so compile errors
/// surface at evaluation time.
pub fn regex(pattern: &str) -> SimpleAddress {
    let pattern = if pattern.is_empty() { "/" } else { pattern };
    let reverse = pattern.starts_with('?');
    SimpleAddress::Regex {
        pattern: with_trailing_delim(pattern),
        reverse,
    }
}

/// Appends the closing delimiter unless the pattern already ends with an
/// unescaped one.
pub(crate) fn with_trailing_delim(pattern: &str) -> String {
    let rs: Vec<char> = pattern.chars().collect();
    let d = rs[0];
    let mut out = String::with_capacity(pattern.len() + d.len_utf8());
    let mut esc = false;
    for (i, &r) in rs.iter().enumerate() {
        out.push(r);
        if i == rs.len() - 1 && (i == 0 || r != d || esc) {
            out.push(d);
        }
        esc = !esc && r == '\\';
    }
    out
}

impl Address {
    /// The string from the start of `self` to the end of `other`.
    pub fn to(self, other: impl Into<Address>) -> Address {
        Address::To(Box::new(self), Box::new(other.into()))
    }

    /// Like [`Address::to`], but `other` evaluates from the end of `self`
    /// with dot set to `self`.
    pub fn then(self, other: impl Into<Address>) -> Address {
        Address::Then(Box::new(self), Box::new(other.into()))
    }

    /// The address of `other` evaluated from the end of `self`.
    pub fn plus(self, other: SimpleAddress) -> Address {
        Address::Plus(Box::new(self), other)
    }

    /// The address of `other` evaluated in reverse from the start of
    /// `self`.
    pub fn minus(self, other: SimpleAddress) -> Address {
        Address::Minus(Box::new(self), other)
    }
}

impl SimpleAddress {
    pub fn to(self, other: impl Into<Address>) -> Address {
        Address::from(self).to(other)
    }

    pub fn then(self, other: impl Into<Address>) -> Address {
        Address::from(self).then(other)
    }

    pub fn plus(self, other: SimpleAddress) -> Address {
        Address::from(self).plus(other)
    }

    pub fn minus(self, other: SimpleAddress) -> Address {
        Address::from(self).minus(other)
    }

    /// Returns the form of this address that walks the other way.
    pub(crate) fn reversed(&self) -> SimpleAddress {
        match self {
            SimpleAddress::Dot | SimpleAddress::End | SimpleAddress::Mark(_) => self.clone(),
            SimpleAddress::Rune(n) => SimpleAddress::Rune(-n),
            SimpleAddress::Line { n, neg } => SimpleAddress::Line { n: *n, neg: !neg },
            SimpleAddress::Regex { pattern, reverse } => SimpleAddress::Regex {
                pattern: pattern.clone(),
                reverse: !reverse,
            },
        }
    }
}

impl From<SimpleAddress> for Address {
    fn from(a: SimpleAddress) -> Address {
        Address::Simple(a)
    }
}

// ==================== Stringification ====================

impl fmt::Display for SimpleAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimpleAddress::Dot => write!(f, "."),
            SimpleAddress::End => write!(f, "$"),
            SimpleAddress::Mark(m) => write!(f, "'{m}"),
            SimpleAddress::Rune(n) if *n < 0 => write!(f, "-#{}", -n),
            SimpleAddress::Rune(n) => write!(f, "#{n}"),
            SimpleAddress::Line { n, neg: true } => write!(f, "-{n}"),
            SimpleAddress::Line { n, neg: false } => write!(f, "{n}"),
            SimpleAddress::Regex { pattern, .. } => write!(f, "{pattern}"),
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::Simple(a) => a.fmt(f),
            Address::To(a, b) => write!(f, "{a},{b}"),
            Address::Then(a, b) => write!(f, "{a};{b}"),
            Address::Plus(a, b) => write!(f, "{a}+{b}"),
            Address::Minus(a, b) => write!(f, "{a}-{b}"),
        }
    }
}

// ==================== Parsing ====================

const SIMPLE_FIRST: &str = "#/?$.'0123456789";

/// A cursor over the input runes, tracking position for error reports.
pub(crate) struct Scanner<'a> {
    rs: &'a [char],
    pos: usize,
}

impl<'a> Scanner<'a> {
    pub(crate) fn new(rs: &'a [char]) -> Self {
        Scanner { rs, pos: 0 }
    }

    pub(crate) fn peek(&self) -> Option<char> {
        self.rs.get(self.pos).copied()
    }

    pub(crate) fn bump(&mut self) -> Option<char> {
        let r = self.peek()?;
        self.pos += 1;
        Some(r)
    }

    pub(crate) fn pos(&self) -> usize {
        self.pos
    }

    pub(crate) fn rest(&self) -> &'a [char] {
        &self.rs[self.pos..]
    }

    /// Skips horizontal whitespace; newlines are significant.
    pub(crate) fn skip_hspace(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace() && c != '\n') {
            self.bump();
        }
    }
}

impl Address {
    /// Parses a leading address from `rs`, returning it (if any) and the
    /// unconsumed remainder. A terminating newline is consumed.
    pub fn parse_prefix(rs: &[char]) -> Result<(Option<Address>, &[char]), Error> {
        let mut s = Scanner::new(rs);
        let a = parse_compound(&mut s)?;
        if s.peek() == Some('\n') {
            s.bump();
        }
        Ok((a, s.rest()))
    }
}

pub(crate) fn parse_compound(s: &mut Scanner) -> Result<Option<Address>, Error> {
    let mut a1: Option<Address> = None;
    loop {
        let r = match s.peek() {
            Some(r) => r,
            None => return Ok(a1),
        };
        if SIMPLE_FIRST.contains(r) {
            if let Some(a2) = parse_simple(s)? {
                a1 = Some(match a1 {
                    // Adjacent simple addresses get an implicit +.
                    Some(a1) => a1.plus(a2),
                    None => a2.into(),
                });
            }
        } else if r == '+' || r == '-' {
            s.bump();
            let base = a1.take().unwrap_or_else(|| dot().into());
            let a2 = parse_simple(s)?.unwrap_or_else(|| line(1));
            a1 = Some(if r == '+' {
                base.plus(a2)
            } else {
                base.minus(a2)
            });
        } else if r == ',' || r == ';' {
            s.bump();
            let base = a1.take().unwrap_or_else(|| line(0).into());
            let a2 = parse_compound(s)?.unwrap_or_else(|| end().into());
            a1 = Some(if r == ',' {
                base.to(a2)
            } else {
                base.then(a2)
            });
        } else if r.is_whitespace() && r != '\n' {
            s.bump();
        } else {
            return Ok(a1);
        }
    }
}

fn parse_simple(s: &mut Scanner) -> Result<Option<SimpleAddress>, Error> {
    loop {
        return match s.peek() {
            None => Ok(None),
            Some('\'') => parse_mark(s).map(Some),
            Some('#') => parse_rune(s).map(Some),
            Some(d) if d.is_ascii_digit() => parse_line(s).map(Some),
            Some('/') | Some('?') => Ok(Some(regex(&parse_regex_text(s)))),
            Some('$') => {
                s.bump();
                Ok(Some(end()))
            }
            Some('.') => {
                s.bump();
                Ok(Some(dot()))
            }
            Some(c) if c.is_whitespace() && c != '\n' => {
                s.bump();
                continue;
            }
            Some(_) => Ok(None),
        };
    }
}

fn is_mark_name(r: char) -> bool {
    r.is_ascii_lowercase() || r.is_ascii_uppercase()
}

fn parse_mark(s: &mut Scanner) -> Result<SimpleAddress, Error> {
    s.bump(); // the quote
    s.skip_hspace();
    match s.peek() {
        Some(r) if is_mark_name(r) => {
            s.bump();
            Ok(mark(r))
        }
        Some(r) => Err(Error::BadMark(r)),
        None => Err(Error::Parse {
            pos: s.pos(),
            msg: "bad mark: EOF".into(),
        }),
    }
}

fn parse_rune(s: &mut Scanner) -> Result<SimpleAddress, Error> {
    s.bump(); // the #
    let digits = take_digits(s);
    if digits.is_empty() {
        // A bare # counts one rune.
        return Ok(rune(1));
    }
    match digits.parse::<i64>() {
        Ok(n) => Ok(rune(n)),
        Err(_) => Err(Error::Parse {
            pos: s.pos(),
            msg: "value out of range".into(),
        }),
    }
}

fn parse_line(s: &mut Scanner) -> Result<SimpleAddress, Error> {
    let digits = take_digits(s);
    match digits.parse::<i64>() {
        Ok(n) => Ok(line(n)),
        Err(_) => Err(Error::Parse {
            pos: s.pos(),
            msg: "value out of range".into(),
        }),
    }
}

pub(crate) fn take_digits(s: &mut Scanner) -> String {
    let mut out = String::new();
    while matches!(s.peek(), Some(d) if d.is_ascii_digit()) {
        out.push(s.bump().expect("digit peeked"));
    }
    out
}

/// Consumes a delimited regular expression: the delimiter, the pattern,
/// and the closing delimiter if present before a newline or the end.
pub(crate) fn parse_regex_text(s: &mut Scanner) -> String {
    let d = match s.bump() {
        Some(d) => d,
        None => return String::new(),
    };
    let mut out = String::new();
    out.push(d);
    let mut esc = false;
    while let Some(r) = s.peek() {
        if r == '\n' {
            break;
        }
        s.bump();
        out.push(r);
        if !esc && r == d {
            break;
        }
        esc = !esc && r == '\\';
    }
    out
}

// ==================== Evaluation ====================

/// Rune access for the regex engine over the locked rune buffer.
///
/// The matcher's input trait is infallible, so a read failure is parked
/// here and the text reports as ending early; the caller checks
/// [`TextRunes::take_err`] once matching is done.
pub(crate) struct TextRunes<'a> {
    text: RefCell<&'a mut RuneBuffer>,
    len: usize,
    err: RefCell<Option<sted_buffer::Error>>,
}

impl<'a> TextRunes<'a> {
    pub(crate) fn new(text: &'a mut RuneBuffer) -> Self {
        let len = text.len();
        TextRunes {
            text: RefCell::new(text),
            len,
            err: RefCell::new(None),
        }
    }

    pub(crate) fn take_err(&self) -> Result<(), Error> {
        match self.err.borrow_mut().take() {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    /// Reads a span of the underlying text.
    pub(crate) fn read(&self, at: Span) -> Result<String, sted_buffer::Error> {
        self.text.borrow_mut().read(at)
    }
}

impl Runes for TextRunes<'_> {
    fn len(&self) -> usize {
        self.len
    }

    fn rune(&self, i: usize) -> Option<char> {
        match self.text.borrow_mut().rune(i) {
            Ok(c) => Some(c),
            Err(e) => {
                self.err.borrow_mut().get_or_insert(e);
                None
            }
        }
    }
}

impl Address {
    /// Evaluates the address to a span, starting at rune offset `from`.
    pub(crate) fn resolve(
        &self,
        from: usize,
        text: &mut RuneBuffer,
        marks: &mut Marks,
    ) -> Result<Span, Error> {
        match self {
            Address::Simple(a) => a.resolve(from, text, marks),
            Address::To(a, b) => {
                let a1 = a.resolve(from, text, marks)?;
                let a2 = b.resolve(from, text, marks)?;
                Ok(Span::new(a1.from, a2.to))
            }
            Address::Then(a, b) => {
                let a1 = a.resolve(from, text, marks)?;
                let orig_dot = marks.get(&'.').copied().unwrap_or_default();
                marks.insert('.', a1);
                match b.resolve(a1.to, text, marks) {
                    Ok(a2) => Ok(Span::new(a1.from, a2.to)),
                    Err(e) => {
                        marks.insert('.', orig_dot);
                        Err(e)
                    }
                }
            }
            Address::Plus(a, b) => {
                let a1 = a.resolve(from, text, marks)?;
                b.resolve(a1.to, text, marks)
            }
            Address::Minus(a, b) => {
                let a1 = a.resolve(from, text, marks)?;
                b.reversed().resolve(a1.from, text, marks)
            }
        }
    }
}

impl SimpleAddress {
    pub(crate) fn resolve(
        &self,
        from: usize,
        text: &mut RuneBuffer,
        marks: &mut Marks,
    ) -> Result<Span, Error> {
        match self {
            SimpleAddress::Dot => {
                let a = marks.get(&'.').copied().unwrap_or_default();
                if a.from > a.to || a.to > text.len() {
                    panic!("bad dot");
                }
                Ok(a)
            }
            SimpleAddress::End => Ok(Span::point(text.len())),
            SimpleAddress::Mark(m) => {
                let a = marks.get(m).copied().unwrap_or_default();
                if a.from > a.to || a.to > text.len() {
                    panic!("bad mark");
                }
                if !is_mark_name(*m) && *m != '.' {
                    return Err(Error::BadMark(*m));
                }
                Ok(a)
            }
            SimpleAddress::Rune(n) => {
                let m = from as i64 + n;
                if m < 0 || m > text.len() as i64 {
                    return Err(Error::RuneAddressOutOfRange);
                }
                Ok(Span::point(m as usize))
            }
            SimpleAddress::Line { n, neg: false } => line_forward(*n, from, text),
            SimpleAddress::Line { n, neg: true } => line_backward(*n, from, text),
            SimpleAddress::Regex { pattern, reverse } => {
                let re = Regex::compile(
                    pattern,
                    Options {
                        delimited: true,
                        reverse: *reverse,
                        ..Options::default()
                    },
                )?;
                let rs = TextRunes::new(text);
                let len = rs.len;
                let m = if *reverse {
                    let view = Reversed(&rs);
                    re.find(&view, len - from)
                        .map(|m| Span::new(len - m[0][1], len - m[0][0]))
                } else {
                    re.find(&rs, from).map(|m| Span::new(m[0][0], m[0][1]))
                };
                rs.take_err()?;
                m.ok_or(Error::NoMatch)
            }
        }
    }
}

/// Walks forward to the `n`th full line after `from`.
///
/// Line 0 is the text from `from` through the end of its line; each
/// increment advances through the next newline. The final span covers
/// the last whole line traversed.
fn line_forward(n: usize, from: usize, text: &mut RuneBuffer) -> Result<Span, Error> {
    let len = text.len();
    let mut n = n;
    let mut a = Span::point(from);
    if a.to > 0 {
        while a.to < len {
            if text.rune(a.to - 1)? == '\n' {
                break;
            }
            a.to += 1;
        }
        if n > 0 {
            a.from = a.to;
        }
    }
    while n > 0 && a.to < len {
        let r = text.rune(a.to)?;
        a.to += 1;
        if r == '\n' {
            n -= 1;
            if n > 0 {
                a.from = a.to;
            }
        }
    }
    if n > 1 || (n == 1 && a.to < len) {
        return Err(Error::LineAddressOutOfRange);
    }
    Ok(a)
}

/// Walks backward to the `n`th full line before `from`, symmetrically to
/// [`line_forward`].
fn line_backward(n: usize, from: usize, text: &mut RuneBuffer) -> Result<Span, Error> {
    let len = text.len();
    let mut n = n;
    let mut a = Span::point(from);
    if a.from < len {
        while a.from > 0 {
            if text.rune(a.from - 1)? == '\n' {
                break;
            }
            a.from -= 1;
        }
        a.to = a.from;
    }
    while n > 0 && a.from > 0 {
        let r = text.rune(a.from - 1)?;
        a.from -= 1;
        if r == '\n' {
            n -= 1;
            a.to = a.from + 1;
        } else if a.from == 0 {
            a.to = a.from;
        }
    }
    if n > 1 {
        return Err(Error::LineAddressOutOfRange);
    }
    while a.from > 0 {
        if text.rune(a.from - 1)? == '\n' {
            break;
        }
        a.from -= 1;
    }
    Ok(a)
}
