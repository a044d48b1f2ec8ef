//! Transcript wire format.
//!
//! A transcript is a sequence of flat-text blocks:
//!
//! ```text
//! COMMAND:<text>
//! <delimiter>
//! <escaped-output>
//! <delimiter>
//! ```
//!
//! Output is escaped with reversible sentinel tokens so multi-line output
//! round-trips exactly and the delimiter can never appear literally inside a
//! recorded block.

/// Prefix of the command line in each block.
pub const COMMAND_PREFIX: &str = "COMMAND:";

/// Block delimiter. Escaping guarantees no recorded output line equals this.
pub const DELIMITER: &str = "--8<--cut--8<--";

/// Escape recorded output into a single transcript line.
///
/// Backslashes, newlines, and carriage returns become two-character
/// sentinels; a literal occurrence of the delimiter text becomes `\d`.
#[must_use]
pub fn escape(output: &str) -> String {
    output
        .replace('\\', "\\\\")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
        .replace(DELIMITER, "\\d")
}

/// Reverse [`escape`].
///
/// Unknown escape sequences and a trailing lone backslash are preserved
/// literally; a transcript is trusted input and a parse error here would
/// lose data without helping anyone.
#[must_use]
pub fn unescape(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut chars = line.chars();

    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('d') => out.push_str(DELIMITER),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }

    out
}

/// Render one transcript block.
#[must_use]
pub fn render_entry(command: &str, output: &str) -> String {
    format!("{COMMAND_PREFIX}{command}\n{DELIMITER}\n{}\n{DELIMITER}\n", escape(output))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_round_trip() {
        let original = "line one\r\nline two\nback\\slash\n";
        assert_eq!(unescape(&escape(original)), original);
    }

    #[test]
    fn escaped_output_is_single_line() {
        let escaped = escape("a\nb\nc");
        assert!(!escaped.contains('\n'));
    }

    #[test]
    fn delimiter_cannot_appear_literally() {
        let hostile = format!("before\n{DELIMITER}\nafter");
        let escaped = escape(&hostile);
        assert!(!escaped.contains(DELIMITER));
        assert_eq!(unescape(&escaped), hostile);
    }

    #[test]
    fn render_entry_shape() {
        let block = render_entry("show clock", "12:00:00 UTC\n");
        let lines: Vec<&str> = block.lines().collect();
        assert_eq!(lines[0], "COMMAND:show clock");
        assert_eq!(lines[1], DELIMITER);
        assert_eq!(lines[2], "12:00:00 UTC\\n");
        assert_eq!(lines[3], DELIMITER);
    }

    #[test]
    fn empty_output_round_trips() {
        assert_eq!(unescape(&escape("")), "");
    }
}
