//! Fixed container markup around embedded output.

const DEFAULT_PREFIX: &str = "inlay";

/// Escape text for use in HTML content or a quoted attribute.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Wraps embedded HTML in `<prefix>-inline` and messages in `<prefix>-error`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    prefix: String,
}

impl Envelope {
    /// Characters outside `[A-Za-z0-9_-]` are dropped from the prefix.
    pub fn new(prefix: &str) -> Self {
        let prefix: String = prefix
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
            .collect();
        if prefix.is_empty() {
            return Self::default();
        }
        Self { prefix }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Wrap already-safe HTML.
    pub fn success(&self, html: &str) -> String {
        format!(r#"<div class="{}-inline">{html}</div>"#, self.prefix)
    }

    /// Wrap a plain-text message, escaping it.
    pub fn error(&self, message: &str) -> String {
        format!(
            r#"<div class="{}-error">{}</div>"#,
            self.prefix,
            escape_html(message)
        )
    }
}

impl Default for Envelope {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_PREFIX.to_string(),
        }
    }
}
