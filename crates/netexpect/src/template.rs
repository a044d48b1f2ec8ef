//! Spawn-command template rendering.
//!
//! Spawn commands are configured as strings with `{placeholder}` tokens
//! (e.g. `ssh -l {username} -p {port} {address}`) substituted from session
//! configuration. The key set is closed: an unknown placeholder, or a known
//! placeholder with no configured value, is a hard error rather than being
//! left literal in the command line.

use std::collections::HashMap;

use crate::error::TemplateError;

/// Values available for substitution into a spawn-command template.
#[derive(Debug, Clone, Default)]
pub struct TemplateVars {
    values: HashMap<&'static str, String>,
}

impl TemplateVars {
    /// Create an empty variable set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the `{address}` value.
    #[must_use]
    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.values.insert("address", address.into());
        self
    }

    /// Set the `{username}` value.
    #[must_use]
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.values.insert("username", username.into());
        self
    }

    /// Set the `{port}` value.
    #[must_use]
    pub fn port(mut self, port: impl Into<String>) -> Self {
        self.values.insert("port", port.into());
        self
    }

    fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }
}

/// The closed set of placeholder names a template may reference.
const KNOWN_KEYS: &[&str] = &["address", "username", "port"];

/// Render a spawn-command template.
///
/// # Errors
///
/// Returns [`TemplateError::UnknownKey`] for a placeholder outside the closed
/// key set, [`TemplateError::Unresolved`] for a known placeholder with no
/// value, and [`TemplateError::Unterminated`] for a `{` with no closing `}`.
pub fn render(template: &str, vars: &TemplateVars) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    let mut offset = 0;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);

        let after_open = &rest[open + 1..];
        let Some(close) = after_open.find('}') else {
            return Err(TemplateError::Unterminated {
                position: offset + open,
            });
        };

        let key = &after_open[..close];
        if !KNOWN_KEYS.contains(&key) {
            return Err(TemplateError::UnknownKey { key: key.into() });
        }

        match vars.get(key) {
            Some(value) if !value.is_empty() => out.push_str(value),
            _ => return Err(TemplateError::Unresolved { key: key.into() }),
        }

        offset += open + 1 + close + 1;
        rest = &after_open[close + 1..];
    }

    out.push_str(rest);
    Ok(out)
}

/// Split a rendered command line into program and arguments.
///
/// Spawn commands are simple whitespace-separated argv lists; no shell
/// quoting is interpreted.
#[must_use]
pub fn split_command(rendered: &str) -> Vec<String> {
    rendered.split_whitespace().map(ToString::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars() -> TemplateVars {
        TemplateVars::new()
            .address("r1.example.net")
            .username("admin")
            .port("22")
    }

    #[test]
    fn renders_all_placeholders() {
        let cmd = render("ssh -x -l {username} -p {port} {address}", &vars()).unwrap();
        assert_eq!(cmd, "ssh -x -l admin -p 22 r1.example.net");
    }

    #[test]
    fn no_placeholders_passes_through() {
        assert_eq!(render("telnet 10.0.0.1", &vars()).unwrap(), "telnet 10.0.0.1");
    }

    #[test]
    fn unknown_key_is_hard_error() {
        let err = render("ssh {hostname}", &vars()).unwrap_err();
        assert_eq!(err, TemplateError::UnknownKey { key: "hostname".into() });
    }

    #[test]
    fn missing_value_is_hard_error() {
        let vars = TemplateVars::new().address("r1");
        let err = render("ssh -l {username} {address}", &vars).unwrap_err();
        assert_eq!(err, TemplateError::Unresolved { key: "username".into() });
    }

    #[test]
    fn empty_value_is_unresolved() {
        let vars = TemplateVars::new().address("r1").username("");
        let err = render("ssh -l {username} {address}", &vars).unwrap_err();
        assert_eq!(err, TemplateError::Unresolved { key: "username".into() });
    }

    #[test]
    fn unterminated_placeholder() {
        let err = render("ssh {address", &vars()).unwrap_err();
        assert!(matches!(err, TemplateError::Unterminated { position: 4 }));
    }

    #[test]
    fn split_command_whitespace() {
        let argv = split_command("ssh  -x -l admin r1");
        assert_eq!(argv, vec!["ssh", "-x", "-l", "admin", "r1"]);
    }
}
