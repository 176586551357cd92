//! Search pattern matching.
//!
//! A pattern is either a glob (`*` matches any run of characters, `?`
//! exactly one) or, when it has no wildcard or the glob does not compile, a
//! plain substring. Patterns are matched against a whole name: `*` crosses
//! `/` and `\` like any other character.

use globset::{Glob, GlobBuilder, GlobMatcher};

/// A compiled search pattern.
#[derive(Debug, Clone)]
pub struct Matcher {
    pattern: String,
    case_insensitive: bool,
    kind: MatchKind,
}

#[derive(Debug, Clone)]
enum MatchKind {
    Glob(GlobMatcher),
    Contains(String),
}

impl Matcher {
    /// Compile a case-sensitive pattern.
    ///
    /// Only `*` and `?` are wildcards. Brackets and braces in a glob match
    /// themselves, so `weapon[1]*` matches `weapon[1]_a` and not `weapon1_a`.
    /// A pattern the glob parser rejects outright, such as `[oops*`, is
    /// matched as a substring instead.
    pub fn compile(pattern: &str) -> Self {
        Self::build(pattern, false)
    }

    /// Compile a pattern that ignores ASCII and Unicode case, the way the file
    /// device server matches names.
    pub fn compile_case_insensitive(pattern: &str) -> Self {
        Self::build(pattern, true)
    }

    fn build(pattern: &str, case_insensitive: bool) -> Self {
        let kind = match compile_glob(pattern, case_insensitive) {
            Some(glob) => MatchKind::Glob(glob),
            None if case_insensitive => MatchKind::Contains(pattern.to_lowercase()),
            None => MatchKind::Contains(pattern.to_string()),
        };
        Self {
            pattern: pattern.to_string(),
            case_insensitive,
            kind,
        }
    }

    /// Test a name against the pattern.
    pub fn matches(&self, name: &str) -> bool {
        match &self.kind {
            MatchKind::Glob(glob) => glob.is_match(name),
            MatchKind::Contains(needle) if self.case_insensitive => {
                name.to_lowercase().contains(needle.as_str())
            }
            MatchKind::Contains(needle) => name.contains(needle.as_str()),
        }
    }

    /// True if the pattern compiled as a glob rather than a substring.
    pub fn is_glob(&self) -> bool {
        matches!(self.kind, MatchKind::Glob(_))
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }
}

/// True if `pattern` carries a wildcard.
pub fn has_wildcard(pattern: &str) -> bool {
    pattern.contains(['*', '?'])
}

fn compile_glob(pattern: &str, case_insensitive: bool) -> Option<GlobMatcher> {
    if !has_wildcard(pattern) {
        return None;
    }
    // A pattern the glob parser rejects stays a substring.
    build_glob(pattern, case_insensitive)?;
    let glob = build_glob(&literal_brackets(pattern), case_insensitive)?;
    Some(glob.compile_matcher())
}

fn build_glob(pattern: &str, case_insensitive: bool) -> Option<Glob> {
    GlobBuilder::new(pattern)
        .case_insensitive(case_insensitive)
        .literal_separator(false)
        .backslash_escape(false)
        .build()
        .ok()
}

/// Wrap `[`, `]`, `{` and `}` in one-character classes so only `*` and `?`
/// keep a special meaning.
fn literal_brackets(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    for ch in pattern.chars() {
        match ch {
            '[' | ']' | '{' | '}' => {
                out.push('[');
                out.push(ch);
                out.push(']');
            }
            _ => out.push(ch),
        }
    }
    out
}
