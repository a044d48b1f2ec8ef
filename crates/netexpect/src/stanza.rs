//! Device configuration stanzas.
//!
//! A stanza is one unindented header line plus the indented lines that
//! follow it, the unit device configurations are compared and rebuilt in
//! (e.g. an `interface Ethernet0` block). Parsing is a plain line scan with
//! two explicit states: between stanzas, and inside a stanza body.

/// One configuration block: a header line and its indented children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stanza {
    /// The unindented top-level line that keys this stanza.
    pub header: String,
    /// Indented child lines, original indentation preserved.
    pub body: Vec<String>,
}

impl Stanza {
    /// Create a stanza with an empty body.
    #[must_use]
    pub fn new(header: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            body: Vec::new(),
        }
    }

    /// Append a body line (builder style).
    #[must_use]
    pub fn line(mut self, line: impl Into<String>) -> Self {
        self.body.push(line.into());
        self
    }

    /// Render the stanza back to configuration text.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::with_capacity(self.header.len() + 1);
        out.push_str(&self.header);
        out.push('\n');
        for line in &self.body {
            out.push_str(line);
            out.push('\n');
        }
        out
    }
}

/// A difference between two stanza sets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StanzaChange {
    /// Present in the desired set but not the current one.
    Added(Stanza),
    /// Present in the current set but not the desired one; carries the
    /// header.
    Removed(String),
    /// Present in both with differing bodies; carries the desired stanza.
    Changed(Stanza),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    BetweenStanzas,
    InBody,
}

/// Whether a line separates stanzas rather than belonging to one.
fn is_separator(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.is_empty() || trimmed == "!"
}

/// Parse configuration text into stanzas.
///
/// An unindented line opens a stanza; indented lines extend the open one.
/// Indented lines with no open stanza (leading banner junk) are skipped, as
/// are blank and bare `!` separator lines.
#[must_use]
pub fn parse(text: &str) -> Vec<Stanza> {
    let mut stanzas: Vec<Stanza> = Vec::new();
    let mut state = ScanState::BetweenStanzas;

    for line in text.lines() {
        if is_separator(line) {
            state = ScanState::BetweenStanzas;
            continue;
        }

        let indented = line.starts_with([' ', '\t']);
        if indented {
            if state == ScanState::InBody {
                if let Some(current) = stanzas.last_mut() {
                    current.body.push(line.to_string());
                }
            }
        } else {
            stanzas.push(Stanza::new(line));
            state = ScanState::InBody;
        }
    }

    stanzas
}

/// Find a stanza by its header line.
#[must_use]
pub fn find<'a>(stanzas: &'a [Stanza], header: &str) -> Option<&'a Stanza> {
    stanzas.iter().find(|s| s.header == header)
}

/// Render a stanza set back to configuration text, separated by `!` lines.
#[must_use]
pub fn render_all(stanzas: &[Stanza]) -> String {
    let mut out = String::new();
    for stanza in stanzas {
        out.push_str(&stanza.render());
        out.push_str("!\n");
    }
    out
}

/// Replace the stanza with a matching header, or append if absent.
pub fn update(stanzas: &mut Vec<Stanza>, replacement: Stanza) {
    match stanzas.iter_mut().find(|s| s.header == replacement.header) {
        Some(existing) => *existing = replacement,
        None => stanzas.push(replacement),
    }
}

/// Compute the changes needed to turn `current` into `desired`.
///
/// Order: changes and additions in `desired` order, then removals in
/// `current` order.
#[must_use]
pub fn diff(current: &[Stanza], desired: &[Stanza]) -> Vec<StanzaChange> {
    let mut changes = Vec::new();

    for want in desired {
        match find(current, &want.header) {
            None => changes.push(StanzaChange::Added(want.clone())),
            Some(have) if have.body != want.body => {
                changes.push(StanzaChange::Changed(want.clone()));
            }
            Some(_) => {}
        }
    }

    for have in current {
        if find(desired, &have.header).is_none() {
            changes.push(StanzaChange::Removed(have.header.clone()));
        }
    }

    changes
}
