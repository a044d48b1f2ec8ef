//! Session log formatting helpers.
//!
//! Every line transmitted to or received from a device is forwarded to the
//! logging sink with non-printable bytes hex-escaped, and with configured
//! secret values replaced by a fixed mask token before they can reach any log
//! output.

/// The token substituted for secret material in log text.
pub const REDACTION_MASK: &str = "<redacted>";

/// Hex-escape non-printable characters for logging.
///
/// Printable ASCII and newlines pass through; everything else is rendered as
/// `\x{NN}` so control sequences are visible in session logs.
#[must_use]
pub fn escape_nonprintable(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            c if (' '..='~').contains(&c) => out.push(c),
            c => {
                for byte in c.to_string().as_bytes() {
                    out.push_str(&format!("\\x{byte:02x}"));
                }
            }
        }
    }
    out
}

/// Replace every occurrence of each secret with [`REDACTION_MASK`].
///
/// Empty secrets are skipped; replacing an empty string would corrupt the
/// text rather than protect anything.
#[must_use]
pub fn redact(text: &str, secrets: &[String]) -> String {
    let mut out = text.to_string();
    for secret in secrets {
        if !secret.is_empty() {
            out = out.replace(secret.as_str(), REDACTION_MASK);
        }
    }
    out
}
