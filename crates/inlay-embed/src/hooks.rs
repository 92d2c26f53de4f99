//! Host extension points.
//!
//! Each hook is a pure function called at a fixed point of the pipeline.
//! Unset hooks leave the configured value unchanged.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::sanitize::SanitizationPolicy;

/// Final-target approval predicate.
pub type ApproveFn = dyn Fn(&Path) -> bool + Send + Sync;

/// Root-directory override. Receives the configured root, if any.
pub type RootFn = dyn Fn(Option<PathBuf>) -> Option<PathBuf> + Send + Sync;

/// Origin override. Receives the configured origin.
pub type BaseUrlFn = dyn Fn(String) -> String + Send + Sync;

/// Allowed-extension list override.
pub type ExtensionsFn = dyn Fn(Vec<String>) -> Vec<String> + Send + Sync;

/// Sanitization policy override, called once per sanitization with the raw HTML.
pub type PolicyFn = dyn Fn(SanitizationPolicy, &str) -> SanitizationPolicy + Send + Sync;

/// The set of hooks a host can inject into an [`Embedder`](crate::Embedder).
#[derive(Clone, Default)]
pub struct EmbedHooks {
    root: Option<Arc<RootFn>>,
    base_url: Option<Arc<BaseUrlFn>>,
    extensions: Option<Arc<ExtensionsFn>>,
    approve: Option<Arc<ApproveFn>>,
    policy: Option<Arc<PolicyFn>>,
}

impl EmbedHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_root(
        mut self,
        hook: impl Fn(Option<PathBuf>) -> Option<PathBuf> + Send + Sync + 'static,
    ) -> Self {
        self.root = Some(Arc::new(hook));
        self
    }

    pub fn with_base_url(mut self, hook: impl Fn(String) -> String + Send + Sync + 'static) -> Self {
        self.base_url = Some(Arc::new(hook));
        self
    }

    pub fn with_extensions(
        mut self,
        hook: impl Fn(Vec<String>) -> Vec<String> + Send + Sync + 'static,
    ) -> Self {
        self.extensions = Some(Arc::new(hook));
        self
    }

    pub fn with_approval(mut self, hook: impl Fn(&Path) -> bool + Send + Sync + 'static) -> Self {
        self.approve = Some(Arc::new(hook));
        self
    }

    pub fn with_policy(
        mut self,
        hook: impl Fn(SanitizationPolicy, &str) -> SanitizationPolicy + Send + Sync + 'static,
    ) -> Self {
        self.policy = Some(Arc::new(hook));
        self
    }

    pub(crate) fn root(&self, configured: Option<PathBuf>) -> Option<PathBuf> {
        match &self.root {
            Some(hook) => hook(configured),
            None => configured,
        }
    }

    pub(crate) fn base_url(&self, configured: String) -> String {
        match &self.base_url {
            Some(hook) => hook(configured),
            None => configured,
        }
    }

    pub(crate) fn extensions(&self, configured: Vec<String>) -> Vec<String> {
        match &self.extensions {
            Some(hook) => hook(configured),
            None => configured,
        }
    }

    pub(crate) fn approval(&self) -> Option<Arc<ApproveFn>> {
        self.approve.clone()
    }

    pub(crate) fn policy(&self, policy: SanitizationPolicy, raw_html: &str) -> SanitizationPolicy {
        match &self.policy {
            Some(hook) => hook(policy, raw_html),
            None => policy,
        }
    }
}

impl std::fmt::Debug for EmbedHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbedHooks")
            .field("root", &self.root.is_some())
            .field("base_url", &self.base_url.is_some())
            .field("extensions", &self.extensions.is_some())
            .field("approve", &self.approve.is_some())
            .field("policy", &self.policy.is_some())
            .finish()
    }
}
