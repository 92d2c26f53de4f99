//! Safe embedding of a sibling application's rendered output.
//!
//! A symbolic request names a file under the target application's root. The
//! [`Embedder`] resolves it without ever leaving that root, runs it through
//! an [`IsolatedExecutor`](inlay_sandbox::IsolatedExecutor), moves the
//! stylesheets and scripts it emits to the host's [`AssetRegistry`] with
//! URLs rewritten against the target origin, sanitizes the remaining body
//! fragment and wraps the result in an [`Envelope`].
//!
//! # Example
//!
//! ```no_run
//! use inlay_config::InlayConfig;
//! use inlay_embed::{Embedder, EmbedRequest, PageAssets, RequestContext};
//!
//! # async fn render() -> Result<(), Box<dyn std::error::Error>> {
//! let config = InlayConfig::from_toml(r#"
//!     [target]
//!     root = "/srv/target"
//!     base_url = "https://target.example"
//! "#)?;
//! let embedder = Embedder::from_config(&config)?;
//!
//! let mut page = PageAssets::new();
//! let html = embedder
//!     .embed(&EmbedRequest::path("page.php"), RequestContext::secure(), &mut page)
//!     .await;
//!
//! println!("{}\n{html}\n{}", page.head_html(), page.footer_html());
//! # Ok(())
//! # }
//! ```

pub mod assets;
pub mod embedder;
pub mod envelope;
pub mod error;
pub mod hooks;
pub mod registry;
pub mod request;
pub mod resolver;
pub mod sanitize;

pub use assets::{
    AssetKind, AssetReference, CollectedAssets, ScriptFlags, collect_assets, resolve_url,
};
pub use embedder::Embedder;
pub use envelope::{Envelope, escape_html};
pub use error::{EmbedError, EmbedResult};
pub use hooks::EmbedHooks;
pub use registry::{
    AssetRegistry, PageAssets, ScriptTagFilter, asset_handle, inline_handle, register_assets,
};
pub use request::{EmbedRequest, RequestContext};
pub use resolver::{PathResolver, ResolvedTarget, is_contained, normalize_lexically};
pub use sanitize::{MAX_DEPTH, SanitizationPolicy};
