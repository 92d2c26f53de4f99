//! Embed requests and the hosting request's context.

/// A symbolic request naming the target file to embed.
///
/// `fullpath`, when present and non-blank, takes precedence over `path`.
/// Without either, the configured entry file is used.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmbedRequest {
    path: Option<String>,
    fullpath: Option<String>,
}

impl EmbedRequest {
    /// Request a path relative to the target root.
    pub fn path(path: impl Into<String>) -> Self {
        Self {
            path: Some(path.into()),
            fullpath: None,
        }
    }

    /// Request an absolute (or cwd-relative) path.
    pub fn fullpath(fullpath: impl Into<String>) -> Self {
        Self {
            path: None,
            fullpath: Some(fullpath.into()),
        }
    }

    /// Build from the two named parameters of the dispatch interface.
    pub fn from_params(path: Option<String>, fullpath: Option<String>) -> Self {
        Self { path, fullpath }
    }

    /// The relative path, if one was given.
    pub fn relative_path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// The authoritative full path override, ignoring blank values.
    pub fn full_path(&self) -> Option<&str> {
        self.fullpath.as_deref().filter(|p| !p.trim().is_empty())
    }
}

/// Facts about the hosting request that shape the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestContext {
    /// Whether the hosting page is served over https.
    pub secure: bool,
}

impl RequestContext {
    pub fn secure() -> Self {
        Self { secure: true }
    }

    pub fn insecure() -> Self {
        Self { secure: false }
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::secure()
    }
}
