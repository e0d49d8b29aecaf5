// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Regex-like pattern combinators over a [`Cursor`].
//!
//! A [`Pattern`] wraps a predicate `(cursor) -> bool`. On success the
//! predicate has advanced the cursor past the matched region; on failure it
//! may still have advanced — the cursor then sits at the deepest point the
//! pattern reached, which the lexer uses to pick a precise error message.
//! Callers that must not observe a failed advance run the pattern on a
//! clone.
//!
//! The five combinators mirror the usual regular-expression operators:
//! greedy repetition (`e*`), option (`e?`), longest-match alternation
//! (`a|b`), concatenation (`ab`) and exclusion (`a` minus `b`). Recursive
//! patterns (nested block comments) are written as named functions wrapped
//! with [`Pattern::special`].

use std::rc::Rc;

use super::Cursor;

/// A composable matching predicate over a cursor.
///
/// Patterns are cheaply cloneable; the rule table clones them freely.
#[derive(Clone)]
pub struct Pattern(Rc<dyn for<'s> Fn(&mut Cursor<'s>) -> bool>);

impl std::fmt::Debug for Pattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Pattern(..)")
    }
}

impl Pattern {
    /// Wraps an arbitrary predicate.
    ///
    /// This is the escape hatch for rules that regular operators cannot
    /// express, such as the recursively nested `(* ... *)` comment body.
    pub fn special(f: impl for<'s> Fn(&mut Cursor<'s>) -> bool + 'static) -> Self {
        Self(Rc::new(f))
    }

    /// Matches any single byte.
    #[must_use]
    pub fn any() -> Self {
        Self::special(|cursor| {
            if cursor.at_end() {
                false
            } else {
                cursor.advance();
                true
            }
        })
    }

    /// Matches exactly the byte `b`.
    #[must_use]
    pub fn byte(b: u8) -> Self {
        Self::special(move |cursor| {
            if cursor.peek() == Some(b) {
                cursor.advance();
                true
            } else {
                false
            }
        })
    }

    /// Matches exactly the literal string `s`.
    ///
    /// On a partial match the cursor is left after the last byte that did
    /// match, like the other combinators.
    #[must_use]
    pub fn lit(s: &'static str) -> Self {
        Self::special(move |cursor| {
            for &b in s.as_bytes() {
                if cursor.peek() != Some(b) {
                    return false;
                }
                cursor.advance();
            }
            true
        })
    }

    /// Matches one byte in the inclusive range `[lo, hi]`.
    #[must_use]
    pub fn range(lo: u8, hi: u8) -> Self {
        Self::special(move |cursor| match cursor.peek() {
            Some(b) if b >= lo && b <= hi => {
                cursor.advance();
                true
            }
            _ => false,
        })
    }

    /// Runs the pattern on `cursor`.
    pub fn matches(&self, cursor: &mut Cursor<'_>) -> bool {
        (self.0)(cursor)
    }

    /// Greedy `self*`: consume as many matches as possible. Always succeeds.
    ///
    /// Stops as soon as an attempt fails or stops making progress, so a
    /// nullable inner pattern cannot loop forever.
    #[must_use]
    pub fn repeat(&self) -> Self {
        let inner = self.clone();
        Self::special(move |cursor| {
            loop {
                let mut probe = cursor.clone();
                if !inner.matches(&mut probe) || probe.offset() == cursor.offset() {
                    break;
                }
                *cursor = probe;
            }
            true
        })
    }

    /// `self?`: try once, restore on failure. Always succeeds.
    #[must_use]
    pub fn opt(&self) -> Self {
        let inner = self.clone();
        Self::special(move |cursor| {
            let mut probe = cursor.clone();
            if inner.matches(&mut probe) {
                *cursor = probe;
            }
            true
        })
    }

    /// Longest-match alternation `self|other`.
    ///
    /// Both branches run on independent clones and the one that advanced
    /// further wins; on a tie the left branch wins. When both fail the
    /// cursor is committed to the deeper failure point.
    #[must_use]
    pub fn or(&self, other: &Pattern) -> Self {
        let a = self.clone();
        let b = other.clone();
        Self::special(move |cursor| {
            let mut left = cursor.clone();
            let mut right = cursor.clone();
            let left_ok = a.matches(&mut left);
            let right_ok = b.matches(&mut right);

            if left_ok {
                *cursor = if right_ok && left < right { right } else { left };
                true
            } else if right_ok {
                *cursor = right;
                true
            } else {
                *cursor = if left < right { right } else { left };
                false
            }
        })
    }

    /// Concatenation `self other`, both sharing the advancing cursor.
    #[must_use]
    pub fn then(&self, other: &Pattern) -> Self {
        let a = self.clone();
        let b = other.clone();
        Self::special(move |cursor| a.matches(cursor) && b.matches(cursor))
    }

    /// Exclusion: `self` matches and `other` does not produce the same match.
    ///
    /// `other` is tried from the same starting position; the exclusion only
    /// fires when it succeeds with the same end position as `self`.
    #[must_use]
    pub fn but_not(&self, other: &Pattern) -> Self {
        let a = self.clone();
        let b = other.clone();
        Self::special(move |cursor| {
            let mut matched = cursor.clone();
            if a.matches(&mut matched) {
                let mut excluded = cursor.clone();
                if b.matches(&mut excluded) && matched == excluded {
                    return false;
                }
                *cursor = matched;
                true
            } else {
                *cursor = matched;
                false
            }
        })
    }
}
