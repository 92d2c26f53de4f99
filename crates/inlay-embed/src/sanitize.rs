//! Allow-list HTML sanitizer.
//!
//! Elements outside the policy are unwrapped (their children survive) unless
//! they carry active or opaque content, in which case the whole subtree goes.
//! Attributes outside the policy are removed and URL attributes must use an
//! allowed protocol. Comments and doctypes never survive. Attributes are
//! emitted in name order.
//!
//! Output is re-serialized from the parsed tree and re-sanitized until it
//! stops changing, so `sanitize(sanitize(x)) == sanitize(x)`.

use std::collections::{BTreeMap, BTreeSet};

use inlay_config::SanitizeConfig;
use scraper::{ElementRef, Html, Node};

use crate::envelope::escape_html;

/// Nesting beyond this depth is dropped.
pub const MAX_DEPTH: usize = 256;

const MAX_PASSES: usize = 8;

/// Disallowed elements whose content is removed with them.
const DROP_CONTENT: &[&str] = &[
    "script", "style", "iframe", "object", "embed", "template", "noscript", "textarea", "title",
    "svg", "math",
];

/// Elements whose text is emitted verbatim.
const RAW_TEXT: &[&str] = &[
    "script", "style", "xmp", "iframe", "noembed", "noframes", "plaintext", "noscript",
];

const VOID: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

const URL_ATTRIBUTES: &[&str] = &["href", "src", "cite"];

const DEFAULT_PROTOCOLS: &[&str] = &["http", "https", "mailto", "tel"];

const GLOBAL_ATTRIBUTES: &[&str] = &[
    "class", "id", "title", "lang", "dir", "role", "aria-*", "data-*",
];

const DEFAULT_TAGS: &[(&str, &[&str])] = &[
    ("a", &["href", "rel", "target", "hreflang", "name"]),
    ("abbr", &[]),
    ("address", &[]),
    ("article", &[]),
    ("aside", &[]),
    ("b", &[]),
    ("bdi", &[]),
    ("bdo", &[]),
    ("blockquote", &["cite"]),
    ("br", &[]),
    ("caption", &[]),
    ("cite", &[]),
    ("code", &[]),
    ("col", &["span"]),
    ("colgroup", &["span"]),
    ("dd", &[]),
    ("del", &["cite", "datetime"]),
    ("details", &["open"]),
    ("dfn", &[]),
    ("div", &[]),
    ("dl", &[]),
    ("dt", &[]),
    ("em", &[]),
    ("figcaption", &[]),
    ("figure", &[]),
    ("footer", &[]),
    ("h1", &[]),
    ("h2", &[]),
    ("h3", &[]),
    ("h4", &[]),
    ("h5", &[]),
    ("h6", &[]),
    ("header", &[]),
    ("hr", &[]),
    ("i", &[]),
    ("img", &["src", "alt", "width", "height", "loading"]),
    ("ins", &["cite", "datetime"]),
    ("kbd", &[]),
    ("li", &["value"]),
    ("main", &[]),
    ("mark", &[]),
    ("nav", &[]),
    ("ol", &["start", "reversed", "type"]),
    ("p", &[]),
    ("pre", &[]),
    ("q", &["cite"]),
    ("s", &[]),
    ("samp", &[]),
    ("section", &[]),
    ("small", &[]),
    ("span", &[]),
    ("strong", &[]),
    ("sub", &[]),
    ("summary", &[]),
    ("sup", &[]),
    ("table", &[]),
    ("tbody", &[]),
    ("td", &["colspan", "rowspan", "headers"]),
    ("tfoot", &[]),
    ("th", &["colspan", "rowspan", "headers", "scope"]),
    ("thead", &[]),
    ("time", &["datetime"]),
    ("tr", &[]),
    ("u", &[]),
    ("ul", &[]),
    ("var", &[]),
];

/// Allowed tags and their attributes.
///
/// Attribute names ending in `*` match any longer name with that prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanitizationPolicy {
    tags: BTreeMap<String, BTreeSet<String>>,
    global_attributes: BTreeSet<String>,
    protocols: BTreeSet<String>,
}

impl Default for SanitizationPolicy {
    fn default() -> Self {
        let policy = Self::empty().with_protocols(DEFAULT_PROTOCOLS.iter().copied());
        let policy = GLOBAL_ATTRIBUTES
            .iter()
            .fold(policy, |p, attr| p.allow_global_attribute(attr));
        DEFAULT_TAGS
            .iter()
            .fold(policy, |p, (tag, attrs)| p.allow_tag(tag, attrs))
    }
}

impl SanitizationPolicy {
    /// A policy that allows nothing.
    pub fn empty() -> Self {
        Self {
            tags: BTreeMap::new(),
            global_attributes: BTreeSet::new(),
            protocols: BTreeSet::new(),
        }
    }

    /// The default table extended with configured tags and protocols.
    pub fn from_config(config: &SanitizeConfig) -> Self {
        let mut policy = config.allow.iter().fold(Self::default(), |p, (tag, attrs)| {
            let attrs: Vec<&str> = attrs.iter().map(String::as_str).collect();
            p.allow_tag(tag, &attrs)
        });
        if let Some(protocols) = &config.protocols {
            policy = policy.with_protocols(protocols.iter().map(String::as_str));
        }
        policy
    }

    /// Allow `tag` with `attributes`, extending any existing entry.
    pub fn allow_tag(mut self, tag: &str, attributes: &[&str]) -> Self {
        let entry = self.tags.entry(tag.to_ascii_lowercase()).or_default();
        entry.extend(attributes.iter().map(|a| a.to_ascii_lowercase()));
        self
    }

    /// Allow an attribute (or pattern) on every allowed tag.
    pub fn allow_global_attribute(mut self, attribute: &str) -> Self {
        self.global_attributes.insert(attribute.to_ascii_lowercase());
        self
    }

    /// Replace the set of protocols URL attributes may use.
    pub fn with_protocols<'a>(mut self, protocols: impl IntoIterator<Item = &'a str>) -> Self {
        self.protocols = protocols
            .into_iter()
            .map(|p| p.trim().trim_end_matches(':').to_ascii_lowercase())
            .filter(|p| !p.is_empty())
            .collect();
        self
    }

    pub fn allows_tag(&self, tag: &str) -> bool {
        self.tags.contains_key(tag)
    }

    pub fn allows_attribute(&self, tag: &str, attribute: &str) -> bool {
        let Some(tag_attributes) = self.tags.get(tag) else {
            return false;
        };
        tag_attributes
            .iter()
            .chain(self.global_attributes.iter())
            .any(|pattern| attribute_matches(pattern, attribute))
    }

    /// True if `url` is relative or uses an allowed protocol.
    pub fn allows_url(&self, url: &str) -> bool {
        let cleaned: String = url
            .chars()
            .filter(|c| !c.is_control() && !c.is_whitespace())
            .collect();
        let Some(colon) = cleaned.find(':') else {
            return true;
        };
        let scheme = &cleaned[..colon];
        if scheme.contains(['/', '?', '#']) {
            return true;
        }
        self.protocols.contains(&scheme.to_ascii_lowercase())
    }

    /// Strip everything the policy does not allow.
    pub fn sanitize(&self, html: &str) -> String {
        let mut current = self.sanitize_once(html);
        for _ in 1..MAX_PASSES {
            let next = self.sanitize_once(&current);
            if next == current {
                break;
            }
            current = next;
        }
        current
    }

    fn sanitize_once(&self, html: &str) -> String {
        let fragment = Html::parse_fragment(html);
        let mut out = String::with_capacity(html.len());
        self.write_children(fragment.root_element(), 0, false, &mut out);
        out
    }

    fn write_children(&self, parent: ElementRef<'_>, depth: usize, raw_text: bool, out: &mut String) {
        if depth >= MAX_DEPTH {
            return;
        }
        for child in parent.children() {
            match child.value() {
                Node::Text(text) => {
                    if raw_text {
                        out.push_str(text);
                    } else {
                        out.push_str(&escape_text(text));
                    }
                }
                Node::Element(_) => {
                    if let Some(element) = ElementRef::wrap(child) {
                        self.write_element(element, depth + 1, out);
                    }
                }
                _ => {}
            }
        }
    }

    fn write_element(&self, element: ElementRef<'_>, depth: usize, out: &mut String) {
        let name = element.value().name();

        if !self.allows_tag(name) {
            if !DROP_CONTENT.contains(&name) {
                self.write_children(element, depth, false, out);
            }
            return;
        }

        let mut attributes: Vec<(&str, &str)> = element
            .value()
            .attrs()
            .filter(|(attribute, value)| {
                self.allows_attribute(name, attribute)
                    && (!URL_ATTRIBUTES.contains(attribute) || self.allows_url(value))
            })
            .collect();
        attributes.sort_unstable();

        out.push('<');
        out.push_str(name);
        for (attribute, value) in attributes {
            out.push(' ');
            out.push_str(attribute);
            out.push_str("=\"");
            out.push_str(&escape_html(value));
            out.push('"');
        }
        out.push('>');

        if VOID.contains(&name) {
            return;
        }

        self.write_children(element, depth, RAW_TEXT.contains(&name), out);
        out.push_str("</");
        out.push_str(name);
        out.push('>');
    }
}

fn attribute_matches(pattern: &str, attribute: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => attribute.len() > prefix.len() && attribute.starts_with(prefix),
        None => pattern == attribute,
    }
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn text_strategy() -> impl Strategy<Value = String> {
        "[a-z <>&\"']{0,12}".prop_map(|s| escape_html(&s))
    }

    /// Well-formed fragments of inline and unknown elements.
    fn fragment_strategy() -> impl Strategy<Value = String> {
        let leaf = prop_oneof![
            text_strategy(),
            Just("<br>".to_string()),
            Just("<!-- note -->".to_string()),
            Just(r#"<img src="javascript:x()" onerror="y()">"#.to_string()),
        ];
        leaf.prop_recursive(4, 32, 4, |inner| {
            (
                prop_oneof![
                    Just(("b", "")),
                    Just(("em", r#" class="c""#)),
                    Just(("span", r#" data-x="1" style="s""#)),
                    Just(("a", r#" href="/p?a=b&amp;c=d""#)),
                    Just(("a", r#" href="javascript:alert(1)""#)),
                    Just(("code", "")),
                    Just(("x-widget", r#" onclick="z()""#)),
                    Just(("font", r#" color="red""#)),
                    Just(("script", "")),
                    Just(("style", "")),
                ],
                prop::collection::vec(inner, 0..4),
            )
                .prop_map(|((tag, attrs), children)| {
                    format!("<{tag}{attrs}>{}</{tag}>", children.concat())
                })
        })
    }

    proptest! {
        /// Property: sanitizing twice equals sanitizing once.
        #[test]
        fn sanitize_is_idempotent(parts in prop::collection::vec(fragment_strategy(), 1..4)) {
            let policy = SanitizationPolicy::default();
            let html = parts.concat();
            let once = policy.sanitize(&html);
            prop_assert_eq!(policy.sanitize(&once), once.clone());
            prop_assert!(!once.contains("<script"));
            prop_assert!(!once.contains("javascript:"));
        }
    }
}
