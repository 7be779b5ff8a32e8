// SPDX-License-Identifier: MIT

//! Event name matching: colon-namespaced names against glob patterns.
//!
//! Event names are `:`-separated segments (`agent:task:started`).
//! Patterns compile once into a small segment AST so that matching never
//! re-parses the pattern string:
//!
//! - a literal segment matches itself exactly
//! - a segment containing `*` or `?` is matched char-by-char, `*` for
//!   zero or more characters and `?` for exactly one
//! - a bare `**` segment matches one or more whole segments, greedily
//!
//! `**` may appear at most once and only as a standalone segment; it is
//! rejected anywhere else by [`Pattern::compile`].

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Glob(String),
    Multi,
}

/// A compiled event-name pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    source: String,
    segments: Vec<Segment>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PatternError {
    #[error("pattern is empty")]
    Empty,
    #[error("'**' may only appear as a standalone segment")]
    MultiNotStandalone,
    #[error("'**' may only appear once in a pattern")]
    MultiRepeated,
}

impl Pattern {
    /// Compile a pattern string into its matcher form.
    pub fn compile(pattern: &str) -> Result<Self, PatternError> {
        if pattern.is_empty() {
            return Err(PatternError::Empty);
        }
        let mut segments = Vec::new();
        let mut seen_multi = false;
        for raw in pattern.split(':') {
            if raw.contains("**") {
                if raw != "**" {
                    return Err(PatternError::MultiNotStandalone);
                }
                if seen_multi {
                    return Err(PatternError::MultiRepeated);
                }
                seen_multi = true;
                segments.push(Segment::Multi);
            } else if raw.contains('*') || raw.contains('?') {
                segments.push(Segment::Glob(raw.to_string()));
            } else {
                segments.push(Segment::Literal(raw.to_string()));
            }
        }
        Ok(Self { source: pattern.to_string(), segments })
    }

    /// True when the pattern contains no wildcard of any kind, making it
    /// eligible for the registry's exact-match index.
    pub fn is_exact(&self) -> bool {
        self.segments.iter().all(|s| matches!(s, Segment::Literal(_)))
    }

    /// The original pattern text.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Whether `name` matches this pattern.
    pub fn matches(&self, name: &str) -> bool {
        let name_segs: Vec<&str> = name.split(':').collect();
        match_segments(&self.segments, &name_segs)
    }
}

fn match_segments(pattern: &[Segment], name: &[&str]) -> bool {
    match pattern.first() {
        None => name.is_empty(),
        Some(Segment::Literal(lit)) => match name.first() {
            Some(seg) if seg == lit => match_segments(&pattern[1..], &name[1..]),
            _ => false,
        },
        Some(Segment::Glob(glob)) => match name.first() {
            Some(seg) if glob_match(glob, seg) => match_segments(&pattern[1..], &name[1..]),
            _ => false,
        },
        Some(Segment::Multi) => {
            // '**' must consume at least one segment; try every possible
            // split point, longest first (greedy), and recurse on the
            // remaining pattern tail (which, by construction, contains
            // no further Multi segment).
            if name.is_empty() {
                return false;
            }
            for take in (1..=name.len()).rev() {
                if match_segments(&pattern[1..], &name[take..]) {
                    return true;
                }
            }
            false
        }
    }
}

/// `*` = zero or more chars, `?` = exactly one char, within a single
/// colon-delimited segment.
fn glob_match(glob: &str, text: &str) -> bool {
    let g: Vec<char> = glob.chars().collect();
    let t: Vec<char> = text.chars().collect();
    let mut dp = vec![vec![false; t.len() + 1]; g.len() + 1];
    dp[0][0] = true;
    for gi in 1..=g.len() {
        if g[gi - 1] == '*' {
            dp[gi][0] = dp[gi - 1][0];
        }
    }
    for gi in 1..=g.len() {
        for ti in 1..=t.len() {
            dp[gi][ti] = match g[gi - 1] {
                '*' => dp[gi - 1][ti] || dp[gi][ti - 1],
                '?' => dp[gi - 1][ti - 1],
                c => dp[gi - 1][ti - 1] && c == t[ti - 1],
            };
        }
    }
    dp[g.len()][t.len()]
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

#[cfg(test)]
#[path = "pattern_tests.rs"]
mod tests;
