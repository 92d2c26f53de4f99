//! Hand-off to the host's asset-loading registry.
//!
//! The registry guarantees each asset is emitted once per page. Hosts plug in
//! their own [`AssetRegistry`]; [`PageAssets`] is an in-memory one that
//! renders the head and footer markup itself.

use std::sync::Arc;

use sha2::{Digest, Sha256};

use crate::assets::{AssetKind, CollectedAssets, ScriptFlags};
use crate::envelope::escape_html;

/// The host registry an embed registers assets with.
pub trait AssetRegistry: Send {
    /// Register a stylesheet. Repeated handles are ignored.
    fn register_style(&mut self, handle: &str, url: &str);

    /// Register a script with loading flags. Repeated handles are ignored.
    fn register_script(&mut self, handle: &str, url: &str, flags: ScriptFlags);

    /// Append an inline script block under `handle`.
    fn add_inline_script(&mut self, handle: &str, code: &str);
}

/// Tag-rewrite hook: `(tag, handle, src) -> tag`.
pub type ScriptTagFilter = dyn Fn(&str, &str, &str) -> String + Send + Sync;

/// Stable registry handle for a resolved URL.
///
/// `<prefix>-style-<hex>` or `<prefix>-script-<hex>`, with the first ten hex
/// digits of the URL's SHA-256.
pub fn asset_handle(prefix: &str, kind: AssetKind, url: &str) -> String {
    let digest = Sha256::digest(url.as_bytes());
    let hex: String = digest.iter().take(5).map(|b| format!("{b:02x}")).collect();
    let kind = match kind {
        AssetKind::Style => "style",
        AssetKind::Script => "script",
    };
    format!("{prefix}-{kind}-{hex}")
}

/// Synthetic handle that inline script blocks are grouped under.
pub fn inline_handle(prefix: &str) -> String {
    format!("{prefix}-inline-js")
}

/// Register everything the collector found.
pub fn register_assets(registry: &mut dyn AssetRegistry, collected: &CollectedAssets, prefix: &str) {
    for asset in &collected.assets {
        let handle = asset_handle(prefix, asset.kind, &asset.resolved_url);
        match asset.kind {
            AssetKind::Style => registry.register_style(&handle, &asset.resolved_url),
            AssetKind::Script => {
                registry.register_script(&handle, &asset.resolved_url, asset.flags)
            }
        }
    }

    let handle = inline_handle(prefix);
    for code in &collected.inline_scripts {
        registry.add_inline_script(&handle, code);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct RegisteredScript {
    handle: String,
    url: String,
    flags: ScriptFlags,
}

/// In-memory registry for one page render.
#[derive(Clone, Default)]
pub struct PageAssets {
    styles: Vec<(String, String)>,
    scripts: Vec<RegisteredScript>,
    inline: Vec<(String, String)>,
    tag_filter: Option<Arc<ScriptTagFilter>>,
}

impl PageAssets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `filter` on every script tag after the loading flags are applied.
    pub fn with_tag_filter(
        mut self,
        filter: impl Fn(&str, &str, &str) -> String + Send + Sync + 'static,
    ) -> Self {
        self.tag_filter = Some(Arc::new(filter));
        self
    }

    /// Registered stylesheet URLs in registration order.
    pub fn style_urls(&self) -> Vec<&str> {
        self.styles.iter().map(|(_, url)| url.as_str()).collect()
    }

    /// Registered script URLs in registration order.
    pub fn script_urls(&self) -> Vec<&str> {
        self.scripts.iter().map(|s| s.url.as_str()).collect()
    }

    /// Inline blocks registered under `handle`, in order.
    pub fn inline_scripts(&self, handle: &str) -> Vec<&str> {
        self.inline
            .iter()
            .filter(|(h, _)| h == handle)
            .map(|(_, code)| code.as_str())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.styles.is_empty() && self.scripts.is_empty() && self.inline.is_empty()
    }

    /// Stylesheet links for the page head.
    pub fn head_html(&self) -> String {
        self.styles
            .iter()
            .map(|(handle, url)| {
                format!(
                    r#"<link rel="stylesheet" id="{}-css" href="{}" media="all" />"#,
                    escape_html(handle),
                    escape_html(url)
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Script tags, then inline blocks grouped by handle.
    pub fn footer_html(&self) -> String {
        let mut lines = Vec::new();

        for script in &self.scripts {
            let tag = format!(
                r#"<script src="{}" id="{}-js"></script>"#,
                escape_html(&script.url),
                escape_html(&script.handle)
            );
            let tag = apply_loading_flags(tag, script.flags);
            let tag = match &self.tag_filter {
                Some(filter) => filter(&tag, &script.handle, &script.url),
                None => tag,
            };
            lines.push(tag);
        }

        let mut handles: Vec<&str> = Vec::new();
        for (handle, _) in &self.inline {
            if !handles.contains(&handle.as_str()) {
                handles.push(handle);
            }
        }
        for handle in handles {
            let code = self.inline_scripts(handle).join("\n").replace("</", r"<\/");
            lines.push(format!(
                "<script id=\"{}-js-after\">\n{code}\n</script>",
                escape_html(handle)
            ));
        }

        lines.join("\n")
    }
}

impl AssetRegistry for PageAssets {
    fn register_style(&mut self, handle: &str, url: &str) {
        if self.styles.iter().any(|(h, _)| h == handle) {
            return;
        }
        self.styles.push((handle.to_string(), url.to_string()));
    }

    fn register_script(&mut self, handle: &str, url: &str, flags: ScriptFlags) {
        if self.scripts.iter().any(|s| s.handle == handle) {
            return;
        }
        self.scripts.push(RegisteredScript {
            handle: handle.to_string(),
            url: url.to_string(),
            flags,
        });
    }

    fn add_inline_script(&mut self, handle: &str, code: &str) {
        self.inline.push((handle.to_string(), code.to_string()));
    }
}

impl std::fmt::Debug for PageAssets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageAssets")
            .field("styles", &self.styles)
            .field("scripts", &self.scripts)
            .field("inline", &self.inline)
            .field("tag_filter", &self.tag_filter.is_some())
            .finish()
    }
}

fn apply_loading_flags(tag: String, flags: ScriptFlags) -> String {
    let mut attrs = String::new();
    if flags.is_async {
        attrs.push_str("async ");
    }
    if flags.defer {
        attrs.push_str("defer ");
    }
    if attrs.is_empty() {
        tag
    } else {
        tag.replacen("<script ", &format!("<script {attrs}"), 1)
    }
}
