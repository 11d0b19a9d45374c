//! Incremental matching of server output against predicted byte sequences.
//!
//! Server output arrives in arbitrary chunks, so a predicted sequence can be
//! split anywhere. [`StringReader`] consumes input piecewise and reports
//! three-way results: a definite match, a definite mismatch, or "matched so
//! far, need more bytes" ([`MatchResult::Buffer`]).

use regex::Regex;

/// Outcome of testing a prediction against buffered server output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchResult {
    /// The sequence matched fully; the reader consumed it.
    Success,
    /// The sequence cannot match; the reader's index is unchanged.
    Failure,
    /// A prefix matched but the input ran out; the reader's index is left at
    /// end-of-input so the caller can stash the unconsumed tail.
    Buffer,
}

/// A cursor over a borrowed input chunk.
#[derive(Debug)]
pub struct StringReader<'a> {
    input: &'a str,
    /// Byte offset of the next unconsumed character.
    pub index: usize,
}

impl<'a> StringReader<'a> {
    pub fn new(input: &'a str) -> Self {
        Self { input, index: 0 }
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.input.len() - self.index
    }

    pub fn eof(&self) -> bool {
        self.index == self.input.len()
    }

    /// The unconsumed tail.
    pub fn rest(&self) -> &'a str {
        &self.input[self.index..]
    }

    /// Consume everything left; used when a partial match decides to buffer.
    pub fn skip_to_end(&mut self) {
        self.index = self.input.len();
    }

    /// Consume `c` if it is the next character.
    pub fn eat_char(&mut self, c: char) -> Option<char> {
        let next = self.rest().chars().next()?;
        if next != c {
            return None;
        }
        self.index += c.len_utf8();
        Some(c)
    }

    /// Consume `s` if the input continues with it.
    pub fn eat_str(&mut self, s: &str) -> Option<&'a str> {
        if !self.rest().starts_with(s) {
            return None;
        }
        let eaten = &self.input[self.index..self.index + s.len()];
        self.index += s.len();
        Some(eaten)
    }

    /// Consume a regex match anchored at the current index. The pattern must
    /// be written to match at the start (`^...`).
    pub fn eat_re(&mut self, re: &Regex) -> Option<&'a str> {
        let m = re.find(self.rest())?;
        if m.start() != 0 || m.end() == 0 {
            return None;
        }
        let eaten = &self.input[self.index..self.index + m.end()];
        self.index += m.end();
        Some(eaten)
    }

    /// Consume `substr` allowing it to be cut short by end-of-input.
    ///
    /// On [`MatchResult::Failure`] the index is restored exactly; on
    /// [`MatchResult::Buffer`] at least one character matched and the index
    /// is left at end-of-input.
    pub fn eat_gradually(&mut self, substr: &str) -> MatchResult {
        let prev_index = self.index;
        for (i, c) in substr.chars().enumerate() {
            if i > 0 && self.eof() {
                return MatchResult::Buffer;
            }
            if self.eat_char(c).is_none() {
                self.index = prev_index;
                return MatchResult::Failure;
            }
        }
        MatchResult::Success
    }
}
