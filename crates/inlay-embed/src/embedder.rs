//! The embedding pipeline.
//!
//! request → resolver → containment → executor → collector / sanitizer →
//! envelope. Every failure ends as an escaped error envelope; nothing else
//! crosses the boundary.

use std::path::PathBuf;
use std::sync::Arc;

use inlay_config::{AssetMode, FaultSeverity, InlayConfig, RunnerKind, normalize_origin};
use inlay_sandbox::{ExecConfig, IsolatedExecutor, ProcessRunner, ScriptRunner, StaticRunner};

use crate::assets::collect_assets;
use crate::envelope::Envelope;
use crate::error::{EmbedError, EmbedResult};
use crate::hooks::EmbedHooks;
use crate::registry::{AssetRegistry, register_assets};
use crate::request::{EmbedRequest, RequestContext};
use crate::resolver::{PathResolver, ResolvedTarget};
use crate::sanitize::SanitizationPolicy;

/// Embeds a sibling application's rendered output into a host page.
#[derive(Clone, Debug)]
pub struct Embedder {
    root: Option<PathBuf>,
    /// Anchor for relative roots and full paths, fixed at construction.
    base_dir: PathBuf,
    origin: Option<String>,
    entry: String,
    allowed_extensions: Vec<String>,
    executor: IsolatedExecutor,
    fault_severity: FaultSeverity,
    asset_mode: AssetMode,
    sanitize: bool,
    policy: SanitizationPolicy,
    envelope: Envelope,
    hooks: EmbedHooks,
}

impl Embedder {
    /// An embedder with default settings running targets through `executor`.
    pub fn new(root: impl Into<PathBuf>, executor: IsolatedExecutor) -> Self {
        let defaults = InlayConfig::default();
        let target = defaults.target();
        let output = defaults.output();
        Self {
            root: Some(root.into()),
            base_dir: std::env::current_dir().unwrap_or_default(),
            origin: None,
            entry: target.entry,
            allowed_extensions: target.allowed_extensions,
            executor,
            fault_severity: FaultSeverity::default(),
            asset_mode: output.assets,
            sanitize: output.sanitize,
            policy: SanitizationPolicy::default(),
            envelope: Envelope::new(&output.class_prefix),
            hooks: EmbedHooks::default(),
        }
    }

    /// Build an embedder from loaded configuration.
    ///
    /// A missing root or origin is not an error here; it surfaces as a
    /// configuration error envelope when an embed is attempted.
    pub fn from_config(config: &InlayConfig) -> EmbedResult<Self> {
        let target = config.target();
        let execution = config.execution();
        let output = config.output();

        let runner: Arc<dyn ScriptRunner> = match execution.runner {
            RunnerKind::Process => {
                let exec = execution.env.iter().fold(
                    ExecConfig::new(&execution.interpreter)
                        .with_args(execution.args.clone())
                        .with_timeout(execution.timeout()),
                    |exec, (key, value)| exec.add_env(key, value),
                );
                let runner = ProcessRunner::new(exec)
                    .map_err(|e| EmbedError::Configuration(e.to_string()))?;
                Arc::new(runner)
            }
            RunnerKind::Static => Arc::new(StaticRunner),
        };

        Ok(Self {
            root: target.effective_root(),
            base_dir: std::env::current_dir().unwrap_or_default(),
            origin: target.base_url.clone(),
            entry: target.entry.clone(),
            allowed_extensions: target.allowed_extensions.clone(),
            executor: IsolatedExecutor::new(runner),
            fault_severity: execution.fault_severity,
            asset_mode: output.assets,
            sanitize: output.sanitize,
            policy: SanitizationPolicy::from_config(&config.sanitize()),
            envelope: Envelope::new(&output.class_prefix),
            hooks: EmbedHooks::default(),
        })
    }

    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    pub fn with_entry(mut self, entry: impl Into<String>) -> Self {
        self.entry = entry.into();
        self
    }

    pub fn with_allowed_extensions(mut self, extensions: Vec<String>) -> Self {
        self.allowed_extensions = extensions;
        self
    }

    pub fn with_fault_severity(mut self, severity: FaultSeverity) -> Self {
        self.fault_severity = severity;
        self
    }

    pub fn with_asset_mode(mut self, mode: AssetMode) -> Self {
        self.asset_mode = mode;
        self
    }

    pub fn with_sanitize(mut self, sanitize: bool) -> Self {
        self.sanitize = sanitize;
        self
    }

    pub fn with_policy(mut self, policy: SanitizationPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_class_prefix(mut self, prefix: &str) -> Self {
        self.envelope = Envelope::new(prefix);
        self
    }

    pub fn with_hooks(mut self, hooks: EmbedHooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// The target root after the root hook.
    pub fn root(&self) -> Option<PathBuf> {
        self.hooks.root(self.root.clone())
    }

    /// The validated target origin after the base-URL hook.
    pub fn origin(&self) -> EmbedResult<String> {
        let configured = self.origin.clone().unwrap_or_default();
        normalize_origin(&self.hooks.base_url(configured))
            .map_err(|e| EmbedError::Configuration(e.to_string()))
    }

    pub fn executor(&self) -> &IsolatedExecutor {
        &self.executor
    }

    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    /// Run the resolver and containment guard only.
    pub fn resolve(&self, request: &EmbedRequest) -> EmbedResult<ResolvedTarget> {
        self.resolver()?.resolve(request).inspect_err(log_rejection)
    }

    /// Embed the target named by `request`.
    ///
    /// Always returns envelope-wrapped HTML. Assets found in the output are
    /// registered with `registry` when the asset mode is `register`.
    pub async fn embed(
        &self,
        request: &EmbedRequest,
        context: RequestContext,
        registry: &mut dyn AssetRegistry,
    ) -> String {
        match self.render(request, context, registry).await {
            Ok(html) => html,
            Err(err) => self.envelope.error(&err.user_message()),
        }
    }

    async fn render(
        &self,
        request: &EmbedRequest,
        context: RequestContext,
        registry: &mut dyn AssetRegistry,
    ) -> EmbedResult<String> {
        let target = self.resolve(request)?;

        // The origin is needed only to rewrite assets; check it before running.
        let origin = match self.asset_mode {
            AssetMode::Register => Some(self.origin().inspect_err(log_rejection)?),
            AssetMode::Inline => None,
        };

        tracing::info!(
            target_path = %target.relative().display(),
            runner = self.executor.runner().name(),
            "embedding target"
        );
        let result = self.executor.execute(target.path()).await;

        let Some(fault) = result.fault else {
            let html = self.shape(&result.output, origin.as_deref(), context, registry);
            return Ok(self.envelope.success(&html));
        };

        let err = EmbedError::Execution(fault);
        log_rejection(&err);
        match self.fault_severity {
            FaultSeverity::Abort => Err(err),
            FaultSeverity::Degrade => {
                let html = self.shape(&result.output, origin.as_deref(), context, registry);
                Ok(format!(
                    "{}{}",
                    self.envelope.success(&html),
                    self.envelope.error(&err.user_message())
                ))
            }
        }
    }

    /// Collect assets (register mode), then sanitize.
    fn shape(
        &self,
        output: &str,
        origin: Option<&str>,
        context: RequestContext,
        registry: &mut dyn AssetRegistry,
    ) -> String {
        let html = match origin {
            Some(origin) => {
                let collected = collect_assets(output, origin, context.secure);
                register_assets(registry, &collected, self.envelope.prefix());
                collected.body_html
            }
            None => output.to_string(),
        };

        if !self.sanitize {
            return html;
        }
        let policy = self.hooks.policy(self.policy.clone(), &html);
        policy.sanitize(&html)
    }

    fn resolver(&self) -> EmbedResult<PathResolver> {
        let root = self.root().ok_or_else(|| {
            EmbedError::Configuration("target root not configured".to_string())
        })?;

        let mut resolver = PathResolver::relative_to(root, &self.base_dir)
            .with_entry(self.entry.clone())
            .with_allowed_extensions(self.hooks.extensions(self.allowed_extensions.clone()));
        if let Some(approve) = self.hooks.approval() {
            resolver = resolver.with_approval(approve);
        }
        Ok(resolver)
    }
}

fn log_rejection(err: &EmbedError) {
    match err {
        EmbedError::Configuration(detail) => {
            tracing::warn!(detail = %detail, "embed misconfigured");
        }
        EmbedError::Traversal(detail) => {
            tracing::warn!(detail = %detail, "traversal attempt rejected");
        }
        other => tracing::warn!(kind = other.kind(), error = %other, "embed rejected"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::PageAssets;
    use inlay_sandbox::FnRunner;
    use serial_test::serial;
    use std::fs;
    use std::path::Path;

    fn static_embedder(dir: &Path) -> Embedder {
        Embedder::new(dir, IsolatedExecutor::new(Arc::new(StaticRunner)))
            .with_origin("https://target.example")
            .with_allowed_extensions(vec!["html".to_string()])
            .with_entry("index.html")
    }

    #[tokio::test]
    async fn test_static_embed_registers_assets() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("index.html"),
            r#"<link rel="stylesheet" href="/a.css"><body><p onclick="x()">Hi</p><script src="app.js" defer></script></body>"#,
        )
        .unwrap();

        let mut page = PageAssets::new();
        let html = static_embedder(dir.path())
            .embed(&EmbedRequest::default(), RequestContext::secure(), &mut page)
            .await;

        assert_eq!(html, r#"<div class="inlay-inline"><p>Hi</p></div>"#);
        assert_eq!(page.style_urls(), vec!["https://target.example/a.css"]);
        assert_eq!(page.script_urls(), vec!["https://target.example/app.js"]);
    }

    #[tokio::test]
    async fn test_inline_mode_leaves_assets() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("index.html"), r#"<p>x</p><script src="/a.js"></script>"#).unwrap();

        let mut page = PageAssets::new();
        let html = static_embedder(dir.path())
            .with_asset_mode(AssetMode::Inline)
            .with_sanitize(false)
            .embed(&EmbedRequest::default(), RequestContext::secure(), &mut page)
            .await;

        assert_eq!(
            html,
            r#"<div class="inlay-inline"><p>x</p><script src="/a.js"></script></div>"#
        );
        assert!(page.is_empty());
    }

    #[tokio::test]
    async fn test_inline_mode_does_not_need_origin() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("index.html"), "<p>x</p>").unwrap();

        let embedder = Embedder::new(dir.path(), IsolatedExecutor::new(Arc::new(StaticRunner)))
            .with_allowed_extensions(vec![])
            .with_entry("index.html");

        let mut page = PageAssets::new();
        let html = embedder
            .embed(&EmbedRequest::default(), RequestContext::secure(), &mut page)
            .await;
        assert_eq!(html, r#"<div class="inlay-error">base directory not found</div>"#);

        let html = embedder
            .with_asset_mode(AssetMode::Inline)
            .embed(&EmbedRequest::default(), RequestContext::secure(), &mut page)
            .await;
        assert_eq!(html, r#"<div class="inlay-inline"><p>x</p></div>"#);
    }

    #[tokio::test]
    async fn test_bad_origin_rejected_before_running() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("index.html"), "<p>x</p>").unwrap();
        let runs = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = runs.clone();
        let runner = FnRunner::new(move |_, _| {
            counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(())
        });

        let embedder = Embedder::new(dir.path(), IsolatedExecutor::new(Arc::new(runner)))
            .with_origin("ftp://target.example")
            .with_allowed_extensions(vec![])
            .with_entry("index.html");
        let html = embedder
            .embed(&EmbedRequest::default(), RequestContext::secure(), &mut PageAssets::new())
            .await;

        assert!(html.contains("inlay-error"));
        assert_eq!(runs.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[tokio::test]
    #[serial]
    async fn test_degrade_renders_partial_then_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("index.html"), "").unwrap();
        let runner = FnRunner::new(|_, sink| {
            sink.push_str("<p>partial</p>");
            Err("<boom>".to_string())
        });

        let embedder = Embedder::new(dir.path(), IsolatedExecutor::new(Arc::new(runner)))
            .with_origin("https://target.example")
            .with_allowed_extensions(vec![])
            .with_entry("index.html");

        let html = embedder
            .clone()
            .embed(&EmbedRequest::default(), RequestContext::secure(), &mut PageAssets::new())
            .await;
        assert_eq!(html, r#"<div class="inlay-error">execution error: &lt;boom&gt;</div>"#);

        let html = embedder
            .with_fault_severity(FaultSeverity::Degrade)
            .embed(&EmbedRequest::default(), RequestContext::secure(), &mut PageAssets::new())
            .await;
        assert_eq!(
            html,
            r#"<div class="inlay-inline"><p>partial</p></div><div class="inlay-error">execution error: &lt;boom&gt;</div>"#
        );
    }

    #[tokio::test]
    async fn test_hooks_are_applied() {
        let dir = tempfile::tempdir().unwrap();
        let other = tempfile::tempdir().unwrap();
        fs::write(other.path().join("index.html"), "<video src=\"/v.mp4\"></video><p>o</p>").unwrap();
        let other_root = other.path().to_path_buf();

        let hooks = EmbedHooks::new()
            .with_root(move |_| Some(other_root.clone()))
            .with_base_url(|_| "https://cdn.example".to_string())
            .with_policy(|policy, _| policy.allow_tag("video", &["src"]));

        let embedder = static_embedder(dir.path()).with_hooks(hooks);
        let html = embedder
            .embed(&EmbedRequest::default(), RequestContext::secure(), &mut PageAssets::new())
            .await;

        assert_eq!(
            html,
            r#"<div class="inlay-inline"><video src="/v.mp4"></video><p>o</p></div>"#
        );
        assert_eq!(embedder.origin().unwrap(), "https://cdn.example");
    }

    #[tokio::test]
    async fn test_approval_hook_denies() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("index.html"), "<p>x</p>").unwrap();

        let embedder = static_embedder(dir.path())
            .with_hooks(EmbedHooks::new().with_approval(|_| false))
            .with_class_prefix("site");
        let html = embedder
            .embed(&EmbedRequest::default(), RequestContext::secure(), &mut PageAssets::new())
            .await;

        assert_eq!(html, r#"<div class="site-error">access to target denied</div>"#);
    }

    #[test]
    fn test_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let toml = format!(
            r#"
[target]
root = "{}"
base_url = "https://target.example/"
allowed_extensions = ["html"]

[execution]
runner = "static"
fault_severity = "degrade"

[output]
class_prefix = "site"
"#,
            dir.path().display()
        );
        let config = InlayConfig::from_toml(&toml).unwrap();
        let embedder = Embedder::from_config(&config).unwrap();

        assert_eq!(embedder.root(), Some(dir.path().to_path_buf()));
        assert_eq!(embedder.origin().unwrap(), "https://target.example");
        assert_eq!(embedder.envelope().prefix(), "site");
        assert_eq!(embedder.executor().runner().name(), "static");
    }

    #[test]
    fn test_from_config_rejects_empty_interpreter() {
        let config = InlayConfig::from_toml("[execution]\ninterpreter = \"\"\n").unwrap();
        assert!(matches!(
            Embedder::from_config(&config),
            Err(EmbedError::Configuration(_))
        ));
    }

    #[test]
    #[serial]
    fn test_relative_root_fixed_when_built() {
        let anchor_dir = tempfile::tempdir().unwrap();
        fs::create_dir(anchor_dir.path().join("site")).unwrap();
        fs::write(anchor_dir.path().join("site/page.php"), "").unwrap();
        let elsewhere = tempfile::tempdir().unwrap();

        let before = std::env::current_dir().unwrap();
        std::env::set_current_dir(anchor_dir.path()).unwrap();
        let embedder = Embedder::new("site", IsolatedExecutor::new(Arc::new(StaticRunner)));
        // An in-process target moving the cwd must not move the root
        std::env::set_current_dir(elsewhere.path()).unwrap();
        let resolved = embedder.resolve(&EmbedRequest::path("page.php"));
        std::env::set_current_dir(before).unwrap();

        let expected = anchor_dir.path().join("site/page.php").canonicalize().unwrap();
        assert_eq!(resolved.unwrap().path(), expected);
    }

    #[test]
    fn test_missing_root_is_configuration_error() {
        let embedder = Embedder::from_config(&InlayConfig::default()).unwrap();
        assert!(matches!(
            embedder.resolve(&EmbedRequest::default()),
            Err(EmbedError::Configuration(_))
        ));
    }
}
