//! Terminal output cleaning.
//!
//! Raw bytes read from a spawned ssh/telnet process carry terminal noise:
//! high-bit telnet negotiation bytes, backspace-erasure runs emitted while a
//! device redraws a line, and carriage returns. Pattern matching runs against
//! cleaned text only; raw bytes are never matched directly.

/// Clean a raw chunk read from a live process into display text.
///
/// Removes non-ASCII (high-bit) bytes, collapses backspace-erasure runs, and
/// strips carriage returns. Pure function, no state.
#[must_use]
pub fn clean(raw: &[u8]) -> String {
    let mut out = String::with_capacity(raw.len());

    for &byte in raw {
        match byte {
            // High-bit bytes (telnet option negotiation and similar)
            0x80..=0xFF => {}
            // Backspace erases the previously kept character, if any
            0x08 => {
                // Devices pad pagination redraws with backspaces past the
                // line start; those extras are dropped on the floor.
                if !out.is_empty() && !out.ends_with('\n') {
                    out.pop();
                }
            }
            b'\r' => {}
            _ => out.push(byte as char),
        }
    }

    out
}
