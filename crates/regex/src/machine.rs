// Chunk: docs/chunks/regex_machine - Thompson simulation with submatch tracking

//! The matcher: a two-set Thompson simulation over the compiled program.
//!
//! One attempt runs the automaton from a fixed start position. The `open`
//! set holds states reached at the current position whose ε-closure is
//! still pending; closing it moves states with consuming out-edges to the
//! `closed` set, recording submatch boundaries as node tags are crossed
//! and the latest acceptance seen. Advancing consumes one rune and refills
//! `open`. When the sets empty out, the most recent acceptance, which is
//! the longest match from this start, wins.
//!
//! A machine owns all the scratch this requires, so matches allocate
//! nothing once a machine exists; compiled programs keep a small pool of
//! them behind a mutex.

use crate::program::{Label, NodeId, Program};
use crate::Runes;

/// A live NFA state: a node plus the submatch boundaries on the path here.
#[derive(Debug, Clone)]
struct Thread {
    node: NodeId,
    subs: Vec<[usize; 2]>,
}

/// Reusable simulation state for one program.
#[derive(Debug)]
pub(crate) struct Machine {
    open: Vec<Thread>,
    closed: Vec<Thread>,
    seen: Vec<bool>,
    scratch: Thread,
    /// The latest acceptance recorded during the current attempt.
    found: Option<Vec<[usize; 2]>>,
}

impl Machine {
    pub(crate) fn new(prog: &Program) -> Self {
        let n = prog.nodes.len();
        let blank = || Thread {
            node: 0,
            subs: vec![[0, 0]; prog.nsub],
        };
        Machine {
            open: (0..n).map(|_| blank()).collect(),
            closed: (0..n).map(|_| blank()).collect(),
            seen: vec![false; n],
            scratch: blank(),
            found: None,
        }
    }

    /// Runs one attempt starting at `at`, returning the longest match
    /// found there.
    pub(crate) fn run<R: Runes + ?Sized>(
        &mut self,
        prog: &Program,
        first: Option<&Label>,
        rs: &R,
        at: usize,
    ) -> Option<Vec<[usize; 2]>> {
        let mut at = at;
        let (mut prev, mut cur) = runes_around(rs, at);
        if let Some(l) = first {
            // The first consuming edge can veto the whole attempt cheaply.
            if !l.ok(prev, cur) {
                return None;
            }
        }

        self.found = None;
        self.open[0].node = prog.start;
        for s in self.open[0].subs.iter_mut() {
            *s = [0, 0];
        }
        let mut nopen = 1;
        loop {
            let nclosed = self.close(prog, prev, cur, at, nopen);
            if nclosed == 0 {
                return self.found.take();
            }
            nopen = self.advance(prog, prev, cur, nclosed);
            at += 1;
            (prev, cur) = runes_around(rs, at);
        }
    }

    /// ε-closes the open set, recording tags and acceptances; returns the
    /// number of states parked in `closed` awaiting a consuming step.
    fn close(
        &mut self,
        prog: &Program,
        prev: Option<char>,
        cur: Option<char>,
        at: usize,
        mut nopen: usize,
    ) -> usize {
        for s in self.seen.iter_mut() {
            *s = false;
        }
        for t in &self.open[..nopen] {
            self.seen[t.node] = true;
        }
        let mut nclosed = 0;
        while nopen > 0 {
            nopen -= 1;
            self.scratch.node = self.open[nopen].node;
            self.scratch.subs.copy_from_slice(&self.open[nopen].subs);

            let tag = prog.nodes[self.scratch.node].sub;
            if tag > 0 {
                self.scratch.subs[tag as usize - 1][0] = at;
            } else if tag < 0 {
                self.scratch.subs[(-tag) as usize - 1][1] = at;
            }
            if self.scratch.node == prog.end && self.scratch.subs[0][0] <= self.scratch.subs[0][1]
            {
                match &mut self.found {
                    Some(es) => es.copy_from_slice(&self.scratch.subs),
                    None => self.found = Some(self.scratch.subs.clone()),
                }
                continue;
            }

            let mut consuming = false;
            for e in &prog.nodes[self.scratch.node].out {
                let to = match e.to {
                    Some(to) => to,
                    None => continue,
                };
                if !e.is_epsilon() {
                    consuming = true;
                    continue;
                }
                if self.seen[to] {
                    continue;
                }
                self.seen[to] = true;
                if e.label.is_none() || e.ok(prev, cur) {
                    self.open[nopen].node = to;
                    self.open[nopen].subs.copy_from_slice(&self.scratch.subs);
                    nopen += 1;
                }
            }
            if consuming {
                self.closed[nclosed].node = self.scratch.node;
                self.closed[nclosed].subs.copy_from_slice(&self.scratch.subs);
                nclosed += 1;
            }
        }
        nclosed
    }

    /// Consumes one rune: follows every matching consuming edge out of the
    /// closed set, refilling `open`. Returns the new open count.
    fn advance(
        &mut self,
        prog: &Program,
        prev: Option<char>,
        cur: Option<char>,
        nclosed: usize,
    ) -> usize {
        for s in self.seen.iter_mut() {
            *s = false;
        }
        let mut nopen = 0;
        for i in 0..nclosed {
            let node = self.closed[i].node;
            for e in &prog.nodes[node].out {
                let to = match e.to {
                    Some(to) => to,
                    None => continue,
                };
                if !self.seen[to] && !e.is_epsilon() && e.ok(prev, cur) {
                    self.seen[to] = true;
                    self.open[nopen].node = to;
                    self.open[nopen].subs.copy_from_slice(&self.closed[i].subs);
                    nopen += 1;
                }
            }
        }
        nopen
    }
}

/// Returns the runes just before and at position `at`, with `None` at the
/// edges of the text.
fn runes_around<R: Runes + ?Sized>(rs: &R, at: usize) -> (Option<char>, Option<char>) {
    let prev = if at > 0 && at - 1 < rs.len() {
        rs.rune(at - 1)
    } else {
        None
    };
    let cur = if at < rs.len() { rs.rune(at) } else { None };
    (prev, cur)
}
