//! Asset discovery and URL rewriting.
//!
//! The target's markup was authored for its own origin. Stylesheet links and
//! scripts are pulled out of the captured output, their URLs made absolute
//! against the target origin, and handed to the host's asset registry.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};
use serde::Serialize;

static SCHEME: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)^[a-z][a-z0-9+.\-]*://").ok());

/// Resolve an asset URL against the target origin.
///
/// In priority order: URLs with an explicit scheme are returned unchanged,
/// protocol-relative URLs get the hosting request's scheme, anything else
/// becomes `origin/<url without leading slashes>`. Blank input yields an
/// empty string.
pub fn resolve_url(url: &str, origin: &str, secure: bool) -> String {
    let url = url.trim();
    if url.is_empty() {
        return String::new();
    }
    if SCHEME.as_ref().is_some_and(|re| re.is_match(url)) {
        return url.to_string();
    }
    if url.starts_with("//") {
        let scheme = if secure { "https:" } else { "http:" };
        return format!("{scheme}{url}");
    }
    format!(
        "{}/{}",
        origin.trim_end_matches('/'),
        url.trim_start_matches('/')
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Style,
    Script,
}

/// Loading attributes replayed on an emitted script tag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScriptFlags {
    #[serde(rename = "async")]
    pub is_async: bool,
    pub defer: bool,
}

/// A discovered stylesheet or script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssetReference {
    pub original_url: String,
    pub resolved_url: String,
    pub kind: AssetKind,
    pub flags: ScriptFlags,
}

/// Everything the collector pulled out of one captured output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CollectedAssets {
    /// Unique assets in document order.
    pub assets: Vec<AssetReference>,
    /// Inline script bodies in document order.
    pub inline_scripts: Vec<String>,
    /// The body fragment with the collected elements removed.
    pub body_html: String,
}

impl CollectedAssets {
    pub fn styles(&self) -> impl Iterator<Item = &AssetReference> {
        self.assets.iter().filter(|a| a.kind == AssetKind::Style)
    }

    pub fn scripts(&self) -> impl Iterator<Item = &AssetReference> {
        self.assets.iter().filter(|a| a.kind == AssetKind::Script)
    }
}

/// Parse captured output, extract assets and the body fragment.
///
/// Parsing is permissive; malformed markup yields whatever the parser
/// recovers, never an error.
pub fn collect_assets(html: &str, origin: &str, secure: bool) -> CollectedAssets {
    let mut document = Html::parse_document(html);
    let mut collected = CollectedAssets::default();
    let mut seen = HashSet::new();
    let mut detached = Vec::new();

    if let Ok(selector) = Selector::parse("link[rel], script") {
        for element in document.select(&selector) {
            let node = element.value();
            match node.name() {
                "link" => {
                    if !is_stylesheet(node.attr("rel")) {
                        continue;
                    }
                    detached.push(element.id());
                    if let Some(href) = node.attr("href") {
                        collected.push_asset(
                            &mut seen,
                            href,
                            AssetKind::Style,
                            ScriptFlags::default(),
                            origin,
                            secure,
                        );
                    }
                }
                _ => {
                    detached.push(element.id());
                    match node.attr("src").filter(|s| !s.trim().is_empty()) {
                        Some(src) => {
                            let flags = ScriptFlags {
                                is_async: node.attr("async").is_some(),
                                defer: node.attr("defer").is_some(),
                            };
                            collected.push_asset(
                                &mut seen,
                                src,
                                AssetKind::Script,
                                flags,
                                origin,
                                secure,
                            );
                        }
                        None => {
                            let code: String = element.text().collect();
                            if !code.trim().is_empty() {
                                collected.inline_scripts.push(code);
                            }
                        }
                    }
                }
            }
        }
    }

    for id in detached {
        if let Some(mut node) = document.tree.get_mut(id) {
            node.detach();
        }
    }

    collected.body_html = match Selector::parse("body") {
        Ok(selector) => document
            .select(&selector)
            .next()
            .map(|body| body.inner_html())
            .unwrap_or_else(|| document.root_element().html()),
        Err(_) => document.root_element().html(),
    };

    tracing::debug!(
        assets = collected.assets.len(),
        inline_scripts = collected.inline_scripts.len(),
        "collected target assets"
    );

    collected
}

impl CollectedAssets {
    fn push_asset(
        &mut self,
        seen: &mut HashSet<(AssetKind, String)>,
        original: &str,
        kind: AssetKind,
        flags: ScriptFlags,
        origin: &str,
        secure: bool,
    ) {
        let resolved = resolve_url(original, origin, secure);
        // Dedup within a kind; a script may share a stylesheet's URL
        if resolved.is_empty() || !seen.insert((kind, resolved.clone())) {
            return;
        }
        self.assets.push(AssetReference {
            original_url: original.to_string(),
            resolved_url: resolved,
            kind,
            flags,
        });
    }
}

fn is_stylesheet(rel: Option<&str>) -> bool {
    rel.is_some_and(|rel| {
        rel.split_ascii_whitespace()
            .any(|token| token.eq_ignore_ascii_case("stylesheet"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORIGIN: &str = "https://target.example";

    #[test]
    fn test_resolve_url_rules() {
        assert_eq!(resolve_url("/app.js", ORIGIN, true), "https://target.example/app.js");
        assert_eq!(resolve_url("css/a.css", ORIGIN, true), "https://target.example/css/a.css");
        assert_eq!(resolve_url("///a.css", ORIGIN, true), "https://target.example/a.css");
        assert_eq!(resolve_url("//cdn.example/x.js", ORIGIN, true), "https://cdn.example/x.js");
        assert_eq!(resolve_url("//cdn.example/x.js", ORIGIN, false), "http://cdn.example/x.js");
        assert_eq!(resolve_url("HTTP://cdn.example/x.js", ORIGIN, true), "HTTP://cdn.example/x.js");
        assert_eq!(resolve_url("  /a.css ", ORIGIN, true), "https://target.example/a.css");
        assert_eq!(resolve_url("   ", ORIGIN, true), "");
        assert_eq!(resolve_url("/a.css", "https://target.example/", true), "https://target.example/a.css");
    }

    #[test]
    fn test_body_and_script_after_body() {
        let html = r#"<html><body><p>Hi</p></body><script src="/app.js"></script></html>"#;
        let collected = collect_assets(html, ORIGIN, true);

        assert_eq!(collected.body_html, "<p>Hi</p>");
        assert_eq!(collected.assets.len(), 1);
        let script = &collected.assets[0];
        assert_eq!(script.kind, AssetKind::Script);
        assert_eq!(script.original_url, "/app.js");
        assert_eq!(script.resolved_url, "https://target.example/app.js");
    }

    #[test]
    fn test_duplicate_stylesheets_collapse() {
        let html = r#"<head>
            <link rel="stylesheet" href="/a.css">
            <link rel="stylesheet" href="/a.css">
            <link rel="stylesheet" href="https://target.example/a.css">
            <link rel="icon" href="/favicon.ico">
        </head><body>x</body>"#;
        let collected = collect_assets(html, ORIGIN, true);

        assert_eq!(collected.styles().count(), 1);
        assert_eq!(collected.scripts().count(), 0);
        assert_eq!(collected.assets[0].resolved_url, "https://target.example/a.css");
    }

    #[test]
    fn test_style_and_script_sharing_a_url_are_both_kept() {
        let html = r#"<link rel="stylesheet" href="/x"><body><p>y</p><script src="/x"></script></body>"#;
        let collected = collect_assets(html, ORIGIN, true);

        assert_eq!(collected.styles().count(), 1);
        assert_eq!(collected.scripts().count(), 1);
        let script = collected.scripts().next().unwrap();
        assert_eq!(script.resolved_url, "https://target.example/x");
        assert_eq!(collected.body_html, "<p>y</p>");
    }

    #[test]
    fn test_stylesheet_rel_tokens() {
        let html = r#"<link rel="Alternate STYLESHEET" href="alt.css"><body></body>"#;
        let collected = collect_assets(html, ORIGIN, true);
        assert_eq!(collected.styles().count(), 1);
    }

    #[test]
    fn test_script_flags_carried() {
        let html = r#"<body>
            <script src="/a.js" async></script>
            <script src="/b.js" defer></script>
            <script src="/c.js"></script>
        </body>"#;
        let collected = collect_assets(html, ORIGIN, true);
        let flags: Vec<_> = collected.scripts().map(|s| s.flags).collect();

        assert_eq!(
            flags,
            vec![
                ScriptFlags { is_async: true, defer: false },
                ScriptFlags { is_async: false, defer: true },
                ScriptFlags::default(),
            ]
        );
    }

    #[test]
    fn test_inline_scripts_in_document_order() {
        let html = r#"<body>
            <script>var a = 1;</script>
            <p>between</p>
            <script>   </script>
            <script>var b = a + 1;</script>
        </body>"#;
        let collected = collect_assets(html, ORIGIN, true);

        assert_eq!(collected.inline_scripts, vec!["var a = 1;", "var b = a + 1;"]);
        assert!(collected.body_html.contains("<p>between</p>"));
        assert!(!collected.body_html.contains("<script"));
    }

    #[test]
    fn test_body_keeps_other_content() {
        let html = r#"<body><div class="c"><link rel="stylesheet" href="in-body.css"><em>kept</em></div></body>"#;
        let collected = collect_assets(html, ORIGIN, true);

        assert_eq!(collected.body_html, r#"<div class="c"><em>kept</em></div>"#);
        assert_eq!(collected.assets[0].resolved_url, "https://target.example/in-body.css");
    }

    #[test]
    fn test_malformed_markup_is_tolerated() {
        let html = "<div><p>unclosed <b>bold <script src='x.js'>";
        let collected = collect_assets(html, ORIGIN, true);

        assert!(collected.body_html.contains("unclosed"));
        assert_eq!(collected.scripts().count(), 1);
    }

    #[test]
    fn test_empty_urls_skipped() {
        let html = r#"<link rel="stylesheet" href=""><script src=" "></script><body></body>"#;
        let collected = collect_assets(html, ORIGIN, true);
        assert!(collected.assets.is_empty());
        assert!(collected.inline_scripts.is_empty());
    }
}
