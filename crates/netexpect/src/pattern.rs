//! Pattern types for output matching.
//!
//! This module defines the pattern types matched against cleaned session
//! output: literal strings and regular expressions, grouped into sets for
//! multi-pattern waits, plus the ordered answer table used by the command
//! engine to handle non-standard prompts (confirmations, wizards).

use std::fmt;

use regex::Regex;

/// A pattern that can be matched against cleaned terminal output.
#[derive(Clone)]
pub enum Pattern {
    /// Match an exact string.
    Literal(String),

    /// Match a regular expression.
    Regex(CompiledRegex),
}

impl Pattern {
    /// Create a literal pattern.
    #[must_use]
    pub fn literal(s: impl Into<String>) -> Self {
        Self::Literal(s.into())
    }

    /// Create a regex pattern.
    ///
    /// # Errors
    ///
    /// Returns an error if the regex pattern is invalid.
    pub fn regex(pattern: &str) -> Result<Self, regex::Error> {
        let regex = Regex::new(pattern)?;
        Ok(Self::Regex(CompiledRegex::new(pattern.to_string(), regex)))
    }

    /// Get the pattern as a string for display purposes.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Literal(s) => s,
            Self::Regex(r) => r.pattern(),
        }
    }

    /// Check if this pattern matches the given text.
    ///
    /// Returns the match position if successful.
    #[must_use]
    pub fn matches(&self, text: &str) -> Option<PatternMatch> {
        match self {
            Self::Literal(s) => text.find(s).map(|pos| PatternMatch {
                start: pos,
                end: pos + s.len(),
            }),
            Self::Regex(r) => r.find(text).map(|m| PatternMatch {
                start: m.start(),
                end: m.end(),
            }),
        }
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(s) => write!(f, "Literal({s:?})"),
            Self::Regex(r) => write!(f, "Regex({:?})", r.pattern()),
        }
    }
}

impl From<&str> for Pattern {
    fn from(s: &str) -> Self {
        Self::Literal(s.to_string())
    }
}

impl From<String> for Pattern {
    fn from(s: String) -> Self {
        Self::Literal(s)
    }
}

/// A compiled regular expression with its source pattern.
#[derive(Clone)]
pub struct CompiledRegex {
    pattern: String,
    regex: Regex,
}

impl CompiledRegex {
    /// Create a new compiled regex.
    #[must_use]
    pub const fn new(pattern: String, regex: Regex) -> Self {
        Self { pattern, regex }
    }

    /// Get the source pattern.
    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Find the first match in the text.
    #[must_use]
    pub fn find<'a>(&self, text: &'a str) -> Option<regex::Match<'a>> {
        self.regex.find(text)
    }
}

/// Result of a successful pattern match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatternMatch {
    /// Start position of the match in the text.
    pub start: usize,
    /// End position of the match in the text.
    pub end: usize,
}

impl PatternMatch {
    /// Get the matched text from the original input.
    #[must_use]
    pub fn as_str<'a>(&self, text: &'a str) -> &'a str {
        &text[self.start..self.end]
    }

    /// Get the length of the match.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.end - self.start
    }

    /// Check if the match is empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// A set of patterns for multi-pattern waits (login phase dispatch).
///
/// When several patterns match, the one matching earliest in the text wins;
/// ties go to the earlier pattern in the set.
#[derive(Debug, Clone, Default)]
pub struct PatternSet {
    patterns: Vec<Pattern>,
}

impl PatternSet {
    /// Create a new empty pattern set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a pattern set from a vector of patterns.
    #[must_use]
    pub fn from_patterns(patterns: Vec<Pattern>) -> Self {
        Self { patterns }
    }

    /// Add a pattern to the set.
    pub fn add(&mut self, pattern: Pattern) -> &mut Self {
        self.patterns.push(pattern);
        self
    }

    /// Get the number of patterns in the set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// Check if the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Find the first matching pattern in the text.
    ///
    /// Returns the pattern index and match details for the match whose start
    /// position is earliest.
    #[must_use]
    pub fn find_match(&self, text: &str) -> Option<(usize, PatternMatch)> {
        let mut best: Option<(usize, PatternMatch)> = None;

        for (idx, pattern) in self.patterns.iter().enumerate() {
            if let Some(m) = pattern.matches(text) {
                match &best {
                    None => best = Some((idx, m)),
                    Some((_, current)) if m.start < current.start => best = Some((idx, m)),
                    _ => {}
                }
            }
        }

        best
    }
}

/// Action taken when an answer-table pattern matches during a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerAction {
    /// Send the given text (no line terminator is appended) and keep
    /// collecting output.
    Respond(String),

    /// Return the accumulated output immediately. This is a success, not an
    /// error: the caller asked to stop at this prompt.
    ReturnImmediately,

    /// Consume the match and keep collecting output without responding.
    Continue,
}

/// Ordered mapping from match pattern to response action.
///
/// Supplied per command invocation to handle non-standard prompts. Entries
/// are evaluated strictly in insertion order and the first entry whose
/// pattern matches anywhere in the pending output wins.
#[derive(Debug, Clone, Default)]
pub struct AnswerTable {
    entries: Vec<(Pattern, AnswerAction)>,
}

impl AnswerTable {
    /// Create an empty answer table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry. Order is significant: first match wins.
    #[must_use]
    pub fn on(mut self, pattern: impl Into<Pattern>, action: AnswerAction) -> Self {
        self.entries.push((pattern.into(), action));
        self
    }

    /// Append a respond entry.
    #[must_use]
    pub fn respond(self, pattern: impl Into<Pattern>, response: impl Into<String>) -> Self {
        self.on(pattern, AnswerAction::Respond(response.into()))
    }

    /// Append a return-immediately entry.
    #[must_use]
    pub fn stop_at(self, pattern: impl Into<Pattern>) -> Self {
        self.on(pattern, AnswerAction::ReturnImmediately)
    }

    /// Check if the table has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Find the first entry (in insertion order) whose pattern matches.
    #[must_use]
    pub fn find_match(&self, text: &str) -> Option<(PatternMatch, &AnswerAction)> {
        for (pattern, action) in &self.entries {
            if let Some(m) = pattern.matches(text) {
                return Some((m, action));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_pattern_matches() {
        let pattern = Pattern::literal("Password:");
        let m = pattern.matches("User Access Verification\nPassword:").unwrap();
        assert_eq!(m.as_str("User Access Verification\nPassword:"), "Password:");
    }

    #[test]
    fn regex_pattern_matches() {
        let pattern = Pattern::regex(r"(?i)username\s*:").unwrap();
        let m = pattern.matches("Username: ").unwrap();
        assert_eq!(m.start, 0);
    }

    #[test]
    fn pattern_set_prefers_earliest_position() {
        let mut set = PatternSet::new();
        set.add(Pattern::literal("Password:"))
            .add(Pattern::literal("Username:"));

        let (idx, _) = set.find_match("Username: admin\nPassword:").unwrap();
        // "Username:" appears first in the text even though it is second in
        // the set
        assert_eq!(idx, 1);
    }

    #[test]
    fn pattern_set_tie_goes_to_earlier_entry() {
        let mut set = PatternSet::new();
        set.add(Pattern::literal("rout"))
            .add(Pattern::literal("router"));

        let (idx, _) = set.find_match("router1#").unwrap();
        assert_eq!(idx, 0);
    }

    #[test]
    fn answer_table_first_entry_wins() {
        let table = AnswerTable::new()
            .respond(Pattern::literal("[confirm]"), "y")
            .on(Pattern::literal("confirm"), AnswerAction::Continue);

        let (_, action) = table.find_match("Proceed? [confirm]").unwrap();
        assert_eq!(*action, AnswerAction::Respond("y".into()));
    }

    #[test]
    fn answer_table_insertion_order_not_text_order() {
        // Unlike PatternSet, the answer table dispatches on entry order even
        // when a later entry matches earlier in the text.
        let table = AnswerTable::new()
            .stop_at(Pattern::literal("late"))
            .respond(Pattern::literal("early"), "x");

        let (_, action) = table.find_match("early ... late").unwrap();
        assert_eq!(*action, AnswerAction::ReturnImmediately);
    }

    #[test]
    fn answer_table_no_match() {
        let table = AnswerTable::new().respond("yes/no", "yes\n");
        assert!(table.find_match("router1#").is_none());
    }
}
