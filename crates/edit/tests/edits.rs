// Chunk: docs/chunks/edit_language - Edit AST, grammar, and phase-one functions

//! Behavior tests for every edit verb, driven through the public API.
//!
//! Each case initialises a buffer, applies one edit, and checks the
//! resulting text, printed output, dot, and marks. Every case then
//! re-runs through the textual form: the edit is printed, re-parsed, and
//! applied again, which pins the round trip of the whole edit grammar.
//!
//! The buffer uses a tiny block size so these cases also churn the pager.

use sted_edit::{all, end, line, regex, rune, Buffer, Edit, Editor, Span};

const TEST_BLOCK: usize = 8;

#[derive(Clone)]
struct Case {
    init: &'static str,
    e: Edit,
    want: &'static str,
    print: &'static str,
    dot: (usize, usize),
    marks: &'static [(char, (usize, usize))],
    err: Option<&'static str>,
}

impl Case {
    fn new(init: &'static str, e: Edit, want: &'static str, dot: (usize, usize)) -> Case {
        Case {
            init,
            e,
            want,
            print: "",
            dot,
            marks: &[],
            err: None,
        }
    }

    fn print(mut self, print: &'static str) -> Case {
        self.print = print;
        self
    }

    fn marks(mut self, marks: &'static [(char, (usize, usize))]) -> Case {
        self.marks = marks;
        self
    }

    fn fails(init: &'static str, e: Edit, err: &'static str) -> Case {
        Case {
            init,
            e,
            want: "",
            print: "",
            dot: (0, 0),
            marks: &[],
            err: Some(err),
        }
    }

    fn run(&self) {
        self.run_edit(&self.e);

        // Print, re-parse, and pin the same behavior on the parsed form.
        let text = self.e.to_string();
        let rs: Vec<char> = text.chars().collect();
        let (parsed, rest) = Edit::parse_prefix(&rs)
            .unwrap_or_else(|err| panic!("reparse of {text:?}: {err}"));
        assert!(
            rest.is_empty(),
            "reparse of {text:?} left {:?}",
            rest.iter().collect::<String>()
        );
        self.run_edit(&parsed);
    }

    fn run_edit(&self, e: &Edit) {
        let buf = Buffer::with_block_size(TEST_BLOCK);
        let mut ed = Editor::new(&buf);
        let mut setup = Vec::new();
        ed.apply(&Edit::change(all(), self.init), &mut setup)
            .expect("init");
        ed.apply(&Edit::set_mark(rune(0), '.'), &mut setup)
            .expect("reset dot");

        let mut out = Vec::new();
        let got = ed.apply(e, &mut out);
        if let Some(want_err) = self.err {
            let err = match got {
                Err(err) => err,
                Ok(()) => panic!("apply({e:?}) succeeded, want {want_err:?}"),
            };
            assert!(
                err.to_string().contains(want_err),
                "apply({e:?}) = {err}, want {want_err:?}"
            );
            return;
        }
        got.unwrap_or_else(|err| panic!("apply({e:?}) on {:?}: {err}", self.init));

        assert_eq!(buf.contents().unwrap(), self.want, "text after {e:?}");
        assert_eq!(
            String::from_utf8(out).unwrap(),
            self.print,
            "output of {e:?}"
        );
        assert_eq!(
            ed.dot(),
            Span::new(self.dot.0, self.dot.1),
            "dot after {e:?}"
        );
        for (m, at) in self.marks {
            assert_eq!(
                ed.mark(*m),
                Span::new(at.0, at.1),
                "mark {m} after {e:?}"
            );
        }
    }
}

fn run(cases: Vec<Case>) {
    for c in cases {
        c.run();
    }
}

const HELLO: &str = "Hello, 世界!";

#[test]
fn change() {
    run(vec![
        Case::new(HELLO, Edit::change(rune(0), ""), HELLO, (0, 0)),
        Case::new(HELLO, Edit::change(all(), ""), "", (0, 0)),
        Case::new(HELLO, Edit::change(rune(0), "XYZ"), "XYZHello, 世界!", (0, 3)),
        Case::new(HELLO, Edit::change(rune(1), "XYZ"), "HXYZello, 世界!", (1, 4)),
        Case::new(HELLO, Edit::change(end(), "XYZ"), "Hello, 世界!XYZ", (10, 13)),
        Case::new(
            HELLO,
            Edit::change(rune(0).to(rune(1)), "XYZ"),
            "XYZello, 世界!",
            (0, 3),
        ),
        Case::new(
            HELLO,
            Edit::change(rune(1).to(end().minus(rune(1))), "XYZ"),
            "HXYZ!",
            (1, 4),
        ),
    ]);
}

#[test]
fn append() {
    run(vec![
        Case::new(HELLO, Edit::append(rune(0), ""), HELLO, (0, 0)),
        Case::new("Hello,", Edit::append(all(), " 世界!"), HELLO, (6, 10)),
        Case::new(" 世界!", Edit::append(rune(0), "Hello,"), HELLO, (0, 6)),
    ]);
}

#[test]
fn insert() {
    run(vec![
        Case::new(HELLO, Edit::insert(rune(0), ""), HELLO, (0, 0)),
        Case::new(" 世界!", Edit::insert(all(), "Hello,"), HELLO, (0, 6)),
        Case::new("Hello,", Edit::insert(end(), " 世界!"), HELLO, (6, 10)),
    ]);
}

#[test]
fn delete() {
    run(vec![
        Case::new("", Edit::delete(all()), "", (0, 0)),
        Case::new(HELLO, Edit::delete(all()), "", (0, 0)),
        Case::new(HELLO, Edit::delete(rune(0)), HELLO, (0, 0)),
        Case::new(
            "XYZHello, 世界!",
            Edit::delete(rune(0).to(rune(3))),
            HELLO,
            (0, 0),
        ),
        Case::new(
            "Hello,XYZ 世界!",
            Edit::delete(rune(6).to(rune(9))),
            HELLO,
            (6, 6),
        ),
        Case::new(
            "Hello, 世界!XYZ",
            Edit::delete(rune(10).to(rune(13))),
            HELLO,
            (10, 10),
        ),
    ]);
}

#[test]
fn move_text() {
    run(vec![
        Case::new("abc", Edit::move_to(regex("/abc/"), rune(0)), "abc", (0, 3)),
        Case::fails("abc", Edit::move_to(regex("/abc/"), rune(1)), "overlap"),
        Case::fails("abc", Edit::move_to(regex("/abc/"), rune(2)), "overlap"),
        Case::new("abc", Edit::move_to(regex("/abc/"), rune(3)), "abc", (0, 3)),
        Case::new(
            "abcdef",
            Edit::move_to(regex("/abc/"), end()),
            "defabc",
            (3, 6),
        ),
        Case::new(
            "abcdef",
            Edit::move_to(regex("/def/"), line(0)),
            "defabc",
            (0, 3),
        ),
        Case::new(
            "abc\ndef\nghi",
            Edit::move_to(regex("/def/"), line(3)),
            "abc\n\nghidef",
            (8, 11),
        ),
    ]);
}

#[test]
fn copy_text() {
    run(vec![
        Case::new("abc", Edit::copy_to(regex("/abc/"), end()), "abcabc", (3, 6)),
        Case::new(
            "abc",
            Edit::copy_to(regex("/abc/"), line(0)),
            "abcabc",
            (0, 3),
        ),
        Case::new(
            "abc",
            Edit::copy_to(regex("/abc/"), rune(1)),
            "aabcbc",
            (1, 4),
        ),
        Case::new(
            "abcdef",
            Edit::copy_to(regex("/abc/"), rune(4)),
            "abcdabcef",
            (4, 7),
        ),
        Case::new(
            "abc\ndef\nghi",
            Edit::copy_to(regex("/def/"), line(1)),
            "abc\ndefdef\nghi",
            (4, 7),
        ),
    ]);
}

#[test]
fn set_mark() {
    run(vec![
        Case::new("", Edit::set_mark(all(), '.'), "", (0, 0)),
        Case::new("", Edit::set_mark(all(), 'm'), "", (0, 0)).marks(&[('m', (0, 0))]),
        Case::new(HELLO, Edit::set_mark(all(), '.'), HELLO, (0, 10)),
        Case::new(HELLO, Edit::set_mark(all(), 'a'), HELLO, (0, 0)).marks(&[('a', (0, 10))]),
        Case::new(HELLO, Edit::set_mark(regex("/Hello"), 'a'), HELLO, (0, 0))
            .marks(&[('a', (0, 5))]),
        Case::new(HELLO, Edit::set_mark(line(0), 'z'), HELLO, (0, 0)).marks(&[('z', (0, 0))]),
        Case::new(HELLO, Edit::set_mark(end(), 'm'), HELLO, (0, 0)).marks(&[('m', (10, 10))]),
    ]);
}

#[test]
fn marks_follow_later_edits() {
    let buf = Buffer::with_block_size(TEST_BLOCK);
    let mut ed = Editor::new(&buf);
    let mut out = Vec::new();
    ed.apply(&Edit::change(all(), "abc def"), &mut out).unwrap();
    ed.apply(&Edit::set_mark(regex("/def/"), 'd'), &mut out)
        .unwrap();
    assert_eq!(ed.mark('d'), Span::new(4, 7));

    ed.apply(&Edit::insert(line(0), ">> "), &mut out).unwrap();
    assert_eq!(buf.contents().unwrap(), ">> abc def");
    assert_eq!(ed.mark('d'), Span::new(7, 10));

    // The mark still names "def", so editing through it works.
    ed.apply(&Edit::change(sted_edit::mark('d'), "DEF"), &mut out)
        .unwrap();
    assert_eq!(buf.contents().unwrap(), ">> abc DEF");
}

#[test]
fn print() {
    run(vec![
        Case::new("", Edit::print(all()), "", (0, 0)).print(""),
        Case::new(HELLO, Edit::print(all()), HELLO, (0, 10)).print(HELLO),
        Case::new(HELLO, Edit::print(end()), HELLO, (10, 10)).print(""),
        Case::new(HELLO, Edit::print(regex("/H/")), HELLO, (0, 1)).print("H"),
        Case::new(HELLO, Edit::print(regex("/Hello/")), HELLO, (0, 5)).print("Hello"),
        Case::new(HELLO, Edit::print(regex("/世界/")), HELLO, (7, 9)).print("世界"),
    ]);
}

#[test]
fn where_runes() {
    const S: &str = "Hello\n 世界!";
    const TALL: &str = "H\ne\nl\nl\no\n 世\n界\n!";
    run(vec![
        Case::new("", Edit::where_runes(all()), "", (0, 0)).print("#0"),
        Case::new(TALL, Edit::where_runes(all()), TALL, (0, 16)).print("#0,#16"),
        Case::new(S, Edit::where_runes(all()), S, (0, 10)).print("#0,#10"),
        Case::new(S, Edit::where_runes(end()), S, (10, 10)).print("#10"),
        Case::new(S, Edit::where_runes(line(1)), S, (0, 6)).print("#0,#6"),
        Case::new(S, Edit::where_runes(line(2)), S, (6, 10)).print("#6,#10"),
        Case::new(S, Edit::where_runes(regex("/Hello")), S, (0, 5)).print("#0,#5"),
        Case::new(S, Edit::where_runes(regex("/世界")), S, (7, 9)).print("#7,#9"),
    ]);
}

#[test]
fn where_line() {
    const S: &str = "Hello\n 世界!";
    const TALL: &str = "H\ne\nl\nl\no\n 世\n界\n!";
    run(vec![
        Case::new("", Edit::where_line(all()), "", (0, 0)).print("1"),
        Case::new(TALL, Edit::where_line(all()), TALL, (0, 16)).print("1,8"),
        Case::new(S, Edit::where_line(all()), S, (0, 10)).print("1,2"),
        Case::new(S, Edit::where_line(end()), S, (10, 10)).print("2"),
        Case::new(S, Edit::where_line(line(1)), S, (0, 6)).print("1"),
        Case::new(S, Edit::where_line(line(2)), S, (6, 10)).print("2"),
        Case::new(S, Edit::where_line(regex("/Hello")), S, (0, 5)).print("1"),
        Case::new(S, Edit::where_line(regex("/世界")), S, (7, 9)).print("2"),
    ]);
}

#[test]
fn substitute() {
    let sub_from = |nth: usize, global: bool| Edit::Substitute {
        addr: all(),
        pattern: "/abc/".into(),
        with: "def".into(),
        global,
        nth,
    };
    run(vec![
        Case::new(
            HELLO,
            Edit::substitute_global(all(), "/.*/", ""),
            "",
            (0, 0),
        ),
        Case::new(
            HELLO,
            Edit::substitute(all(), "/世界/", "World"),
            "Hello, World!",
            (0, 13),
        ),
        Case::new(
            HELLO,
            Edit::substitute_global(all(), "/(.)/", "\\1-"),
            "H-e-l-l-o-,- -世-界-!-",
            (0, 20),
        ),
        Case::new(
            "abcabc",
            Edit::substitute(all(), "/abc/", "defg"),
            "defgabc",
            (0, 7),
        ),
        Case::new(
            "abcabcabc",
            Edit::substitute_global(all(), "/abc/", "defg"),
            "defgdefgdefg",
            (0, 12),
        ),
        Case::new(
            "abcabcabc",
            Edit::substitute_global(regex("/abcabc/"), "/abc/", "defg"),
            "defgdefgabc",
            (0, 8),
        ),
        Case::new(
            "abc abc",
            Edit::substitute(all(), "/abc/", "defg"),
            "defg abc",
            (0, 8),
        ),
        Case::new(
            "abc abc",
            Edit::substitute_global(all(), "/abc/", "defg"),
            "defg defg",
            (0, 9),
        ),
        Case::new(
            "abc abc abc",
            Edit::substitute_global(regex("/abc abc/"), "/abc/", "defg"),
            "defg defg abc",
            (0, 9),
        ),
        Case::new(
            "abcabc",
            Edit::substitute(all(), "/abc/", "de"),
            "deabc",
            (0, 5),
        ),
        Case::new(
            "abcabcabc",
            Edit::substitute_global(all(), "/abc/", "de"),
            "dedede",
            (0, 6),
        ),
        Case::new(
            "abcabcabc",
            Edit::substitute_global(regex("/abcabc/"), "/abc/", "de"),
            "dedeabc",
            (0, 4),
        ),
        Case::new(
            "func f()",
            Edit::substitute_global(all(), r"/func (.*)\(\)/", r"func (T) \1()"),
            "func (T) f()",
            (0, 12),
        ),
        Case::new(
            "abcdefghi",
            Edit::substitute(all(), "/(abc)(def)(ghi)/", r"\0 \3 \2 \1"),
            "abcdefghi ghi def abc",
            (0, 21),
        ),
        Case::new("abc", Edit::substitute(all(), "/abc/", r"\1"), "", (0, 0)),
        Case::new("abcabcabc", sub_from(1, false), "defabcabc", (0, 9)),
        Case::new("abcabcabc", sub_from(2, false), "abcdefabc", (0, 9)),
        Case::new("abcabcabc", sub_from(2, true), "abcdefdef", (0, 9)),
        Case::new(
            "abcabcabc",
            Edit::Substitute {
                addr: all(),
                pattern: "/notpresent/".into(),
                with: "def".into(),
                global: false,
                nth: 4,
            },
            "abcabcabc",
            (0, 9),
        ),
        Case::new("abcabcabc", sub_from(4, false), "abcabcabc", (0, 9)),
    ]);
}

#[test]
fn bare_address_sets_dot() {
    let buf = Buffer::with_block_size(TEST_BLOCK);
    let mut ed = Editor::new(&buf);
    let mut out = Vec::new();
    ed.apply(&Edit::change(all(), "abc\ndef\n"), &mut out)
        .unwrap();

    let rs: Vec<char> = "2".chars().collect();
    let (e, _) = Edit::parse_prefix(&rs).unwrap();
    ed.apply(&e, &mut out).unwrap();
    assert_eq!(ed.dot(), Span::new(4, 8));
    assert_eq!(buf.contents().unwrap(), "abc\ndef\n");
}

#[test]
fn resolve_is_read_only() {
    let buf = Buffer::with_block_size(TEST_BLOCK);
    let mut ed = Editor::new(&buf);
    let mut out = Vec::new();
    ed.apply(&Edit::change(all(), "Hello\n 世界!"), &mut out)
        .unwrap();

    let tests: Vec<(sted_edit::Address, Span)> = vec![
        (all(), Span::new(0, 10)),
        (end().into(), Span::new(10, 10)),
        (line(1).into(), Span::new(0, 6)),
        (line(2).into(), Span::new(6, 10)),
        (regex("/Hello").into(), Span::new(0, 5)),
        (regex("/世界").into(), Span::new(7, 9)),
    ];
    let dot_before = ed.dot();
    for (a, want) in tests {
        assert_eq!(ed.resolve(&a).unwrap(), want, "resolve({a})");
    }
    assert_eq!(ed.dot(), dot_before);
    assert_eq!(buf.contents().unwrap(), "Hello\n 世界!");
}

#[test]
fn multiline_text_through_the_grammar() {
    let buf = Buffer::with_block_size(TEST_BLOCK);
    let mut ed = Editor::new(&buf);
    let mut out = Vec::new();

    let rs: Vec<char> = "a\nfirst\nsecond\n.\n".chars().collect();
    let (e, rest) = Edit::parse_prefix(&rs).unwrap();
    assert!(rest.is_empty());
    ed.apply(&e, &mut out).unwrap();
    assert_eq!(buf.contents().unwrap(), "first\nsecond\n");
    assert_eq!(ed.dot(), Span::new(0, 13));
}
