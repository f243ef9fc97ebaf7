//! Page contexts and the resolution boundary.
//!
//! A [`PageContext`] accumulates navigation/render metadata as it moves
//! through the pipeline stages; ownership is handed from stage to stage,
//! never shared concurrently. Resolution outcomes are a tagged enum rather
//! than thrown errors so the state machine can branch exhaustively.

use async_trait::async_trait;

use crate::error::{Result, RouterError};
use crate::hooks::{Hook, PageHooks};
use crate::prefetch::PrefetchMode;

/// One frame of the rewrite chain: a routing hook internally re-routed the
/// navigation to another URL.
#[derive(Debug, Clone, PartialEq)]
pub struct RewriteFrame {
    pub url: String,
}

/// Ordered prior partial page contexts produced by rewrite aborts.
///
/// Bounded by [`RouterConfig::max_rewrites`](crate::config::RouterConfig) so
/// a hook that keeps rewriting fails fast instead of hanging.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RewriteChain {
    frames: Vec<RewriteFrame>,
}

impl RewriteChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// The URL override from the most recent rewrite, if any.
    pub fn latest_url(&self) -> Option<&str> {
        self.frames.last().map(|f| f.url.as_str())
    }

    pub fn extended(&self, url: impl Into<String>) -> Self {
        let mut frames = self.frames.clone();
        frames.push(RewriteFrame { url: url.into() });
        Self { frames }
    }
}

/// Everything a resolved page exports to the router.
#[derive(Clone, Default)]
pub struct PageExports {
    /// The page's client-side render function.
    pub render: Option<Hook>,
    pub hooks: PageHooks,
    /// Page-level opt-in allowing the hydration render to be aborted by a
    /// newer navigation.
    pub hydration_can_be_aborted: bool,
    /// Page-level default prefetch trigger for links without a per-link
    /// override.
    pub prefetch_mode: Option<PrefetchMode>,
}

impl std::fmt::Debug for PageExports {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageExports")
            .field("render", &self.render.is_some())
            .field("hooks", &self.hooks)
            .field("hydration_can_be_aborted", &self.hydration_can_be_aborted)
            .field("prefetch_mode", &self.prefetch_mode)
            .finish()
    }
}

/// Accumulating navigation/render metadata for one pipeline invocation.
#[derive(Debug, Clone, Default)]
pub struct PageContext {
    /// The URL the user navigated to (before any rewrites).
    pub url: String,
    pub is_backward_navigation: Option<bool>,
    pub rewrites: RewriteChain,
    /// Whether this invocation is the very first render (hydration).
    pub is_first_render_attempt: bool,
    pub is_404: bool,
    /// Status code requested by a `RenderStatus` abort, if any.
    pub abort_status: Option<u16>,
    pub exports: PageExports,
}

impl PageContext {
    pub fn new(url: impl Into<String>, is_backward_navigation: Option<bool>) -> Self {
        Self {
            url: url.into(),
            is_backward_navigation,
            ..Self::default()
        }
    }

    /// The URL routing should resolve: the most recent rewrite override, or
    /// the original URL when no rewrite happened.
    pub fn logical_url(&self) -> &str {
        self.rewrites.latest_url().unwrap_or(&self.url)
    }
}

/// A logical abort raised by a user routing/guard hook.
///
/// Not a failure: the pipeline recovers locally by re-entering itself
/// (rewrite, internal redirect), leaving the app (external redirect), or
/// rendering an error page (`RenderStatus`).
#[derive(Debug, Clone, PartialEq)]
pub enum AbortSignal {
    /// Internally re-route to another URL, keeping the visible URL unchanged.
    Rewrite { url: String },
    /// Redirect to another URL. External (scheme-qualified) URLs leave the
    /// app; internal URLs re-enter the pipeline as a fresh navigation.
    Redirect { url: String },
    /// Render the error page with the given status code (e.g. 404).
    RenderStatus { status: u16 },
}

/// Outcome of resolving a page context.
#[derive(Debug)]
pub enum ResolveOutcome {
    /// Resolution succeeded; the enriched context is handed back.
    Resolved(PageContext),
    /// A routing/guard hook raised a logical abort.
    Abort(AbortSignal),
    /// A full server-side navigation is already in flight; this invocation
    /// must silently stand down.
    AlreadyServerRouted,
    /// A static asset could not be fetched (typically a fresh deploy).
    /// Disables client routing for the rest of the session.
    AssetFetchError,
    /// Anything else: a bug in a user hook, a network failure, ...
    Failed(RouterError),
}

/// Result of the routing-only check used before intercepting a link click
/// and before prefetching.
#[derive(Debug, Clone, PartialEq)]
pub enum Routability {
    Routable,
    /// The URL is served by the server, not this router.
    NotRoutable,
    /// The route hook raised a logical abort; the full pipeline will handle
    /// it, so the URL counts as routable.
    Aborted(AbortSignal),
}

/// The external collaborator producing page contexts.
///
/// Implemented by the meta-framework's generated client glue; core tests use
/// scripted fakes. `?Send` because the browser runtime is single-threaded.
#[async_trait(?Send)]
pub trait PageContextBuilder {
    /// Build the initial page context shape for a URL, folding in the rewrite
    /// chain accumulated so far.
    async fn create(
        &self,
        url: &str,
        rewrites: &RewriteChain,
        is_backward_navigation: Option<bool>,
    ) -> Result<PageContext>;

    /// Resolve full page data (routing, data loading, export extraction).
    async fn resolve(&self, ctx: PageContext) -> ResolveOutcome;

    /// Resolve the error page for a context whose normal resolution failed.
    async fn resolve_error_page(&self, ctx: PageContext) -> ResolveOutcome;

    /// Routing-only check: does this URL route client-side?
    /// `Err` means the route hook itself has a bug and must propagate.
    async fn routability(&self, url: &str) -> Result<Routability>;

    /// Load the static assets/data for a URL without rendering (prefetch).
    async fn load_page_assets(&self, url: &str) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logical_url_prefers_latest_rewrite() {
        let mut ctx = PageContext::new("/original", None);
        assert_eq!(ctx.logical_url(), "/original");
        ctx.rewrites = ctx.rewrites.extended("/first").extended("/second");
        assert_eq!(ctx.logical_url(), "/second");
        assert_eq!(ctx.url, "/original");
    }

    #[test]
    fn rewrite_chain_extension_preserves_order() {
        let chain = RewriteChain::new().extended("/a").extended("/b");
        assert_eq!(chain.len(), 2);
        assert_eq!(chain.latest_url(), Some("/b"));
    }
}
