//! Speculative prefetching.
//!
//! Prefetching warms a destination page's static assets/data without
//! rendering it. It shares the page-context resolution path with the router
//! but stops before the render step, and it is deduplicated per normalized
//! URL so hover + viewport triggers (or two concurrent calls) load at most
//! once.

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::context::{PageContextBuilder, Routability};
use crate::error::{Result, RouterError};
use crate::history::strip_hash;
use crate::link::is_external_url;

/// When a link's assets are prefetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrefetchMode {
    /// On `mouseover` / `touchstart`.
    Hover,
    /// When the link scrolls into the viewport.
    Viewport,
    /// Never.
    Disabled,
}

impl PrefetchMode {
    /// Resolve the trigger for one link: per-link attribute, then the page's
    /// exported default, then the router config default.
    pub fn resolve(
        link_attr: Option<&str>,
        page_default: Option<PrefetchMode>,
        config_default: PrefetchMode,
    ) -> PrefetchMode {
        let fallback = page_default.unwrap_or(config_default);
        match link_attr {
            None => fallback,
            Some("hover") => PrefetchMode::Hover,
            Some("viewport") => PrefetchMode::Viewport,
            Some("false") => PrefetchMode::Disabled,
            Some(other) => {
                warn!(value = other, "unknown prefetch mode attribute, using default");
                fallback
            }
        }
    }
}

/// URLs already prefetched or with a prefetch in flight.
#[derive(Debug, Default)]
pub struct PrefetchRegistry {
    urls: RefCell<HashSet<String>>,
}

impl PrefetchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `url` as prefetched. Returns `false` when it already was.
    pub fn mark(&self, url: &str) -> bool {
        self.urls.borrow_mut().insert(normalize(url))
    }

    pub fn contains(&self, url: &str) -> bool {
        self.urls.borrow().contains(&normalize(url))
    }
}

/// Prefetch keys ignore the fragment: `/a#x` and `/a#y` load the same page.
fn normalize(url: &str) -> String {
    strip_hash(url).to_string()
}

/// Warms page assets through the shared page-context resolution path.
pub struct Prefetcher {
    builder: Rc<dyn PageContextBuilder>,
    registry: PrefetchRegistry,
}

impl Prefetcher {
    pub fn new(builder: Rc<dyn PageContextBuilder>) -> Self {
        Self {
            builder,
            registry: PrefetchRegistry::new(),
        }
    }

    pub fn registry(&self) -> &PrefetchRegistry {
        &self.registry
    }

    /// Prefetch the assets for `url`.
    ///
    /// Idempotent per normalized URL; the URL is marked before the first
    /// suspension point so a concurrent call for the same URL backs off.
    /// Cross-origin URLs are an error: they can never be client-routed.
    pub async fn prefetch(&self, url: &str) -> Result<()> {
        if is_external_url(url) {
            return Err(RouterError::CrossOriginPrefetch {
                url: url.to_string(),
            });
        }
        if !self.registry.mark(url) {
            return Ok(());
        }
        match self.builder.routability(url).await? {
            Routability::Routable => {
                debug!(url, "prefetching page assets");
                self.builder.load_page_assets(url).await
            }
            // A routing hook aborting here is the hook's business; the full
            // pipeline will deal with it if the user actually navigates.
            Routability::Aborted(_) | Routability::NotRoutable => Ok(()),
        }
    }

    /// Trigger-path prefetch: any routing failure (a hook bug or an
    /// intentional abort) is swallowed, since triggers fire speculatively.
    /// Asset-fetch failures still propagate so the session can fall back to
    /// server routing.
    pub async fn prefetch_if_routable(&self, url: &str) -> Result<()> {
        match self.prefetch(url).await {
            Err(err @ RouterError::AssetFetch { .. }) => Err(err),
            Err(_) | Ok(()) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{PageContext, ResolveOutcome, RewriteChain};
    use async_trait::async_trait;
    use std::cell::Cell;

    struct CountingBuilder {
        routable: Routability,
        routability_error: Option<RouterError>,
        load_error: Option<RouterError>,
        loads: Cell<u32>,
        gate: RefCell<Option<futures::channel::oneshot::Receiver<()>>>,
    }

    impl CountingBuilder {
        fn routable() -> Self {
            Self {
                routable: Routability::Routable,
                routability_error: None,
                load_error: None,
                loads: Cell::new(0),
                gate: RefCell::new(None),
            }
        }
    }

    #[async_trait(?Send)]
    impl PageContextBuilder for CountingBuilder {
        async fn create(
            &self,
            url: &str,
            _rewrites: &RewriteChain,
            _is_backward_navigation: Option<bool>,
        ) -> Result<PageContext> {
            Ok(PageContext::new(url, None))
        }

        async fn resolve(&self, ctx: PageContext) -> ResolveOutcome {
            ResolveOutcome::Resolved(ctx)
        }

        async fn resolve_error_page(&self, ctx: PageContext) -> ResolveOutcome {
            ResolveOutcome::Resolved(ctx)
        }

        async fn routability(&self, _url: &str) -> Result<Routability> {
            match &self.routability_error {
                Some(err) => Err(err.clone()),
                None => Ok(self.routable.clone()),
            }
        }

        async fn load_page_assets(&self, _url: &str) -> Result<()> {
            let gate = self.gate.borrow_mut().take();
            if let Some(gate) = gate {
                let _ = gate.await;
            }
            self.loads.set(self.loads.get() + 1);
            match &self.load_error {
                Some(err) => Err(err.clone()),
                None => Ok(()),
            }
        }
    }

    #[tokio::test]
    async fn prefetch_loads_routable_urls_once() {
        let builder = Rc::new(CountingBuilder::routable());
        let prefetcher = Prefetcher::new(builder.clone());
        prefetcher.prefetch("/docs").await.unwrap();
        prefetcher.prefetch("/docs").await.unwrap();
        prefetcher.prefetch("/docs#install").await.unwrap();
        assert_eq!(builder.loads.get(), 1);
    }

    #[tokio::test]
    async fn concurrent_prefetches_load_at_most_once() {
        let builder = Rc::new(CountingBuilder::routable());
        let (tx, rx) = futures::channel::oneshot::channel();
        *builder.gate.borrow_mut() = Some(rx);
        let prefetcher = Prefetcher::new(builder.clone());

        let first = prefetcher.prefetch("/docs");
        let second = prefetcher.prefetch("/docs");
        let release = async {
            let _ = tx.send(());
            Ok(())
        };
        let (a, b, c): (Result<()>, Result<()>, Result<()>) =
            futures::join!(first, second, release);
        a.unwrap();
        b.unwrap();
        c.unwrap();
        assert_eq!(builder.loads.get(), 1);
    }

    #[tokio::test]
    async fn cross_origin_prefetch_is_an_error() {
        let builder = Rc::new(CountingBuilder::routable());
        let prefetcher = Prefetcher::new(builder.clone());
        let err = prefetcher
            .prefetch("https://external.example/docs")
            .await
            .unwrap_err();
        assert!(matches!(err, RouterError::CrossOriginPrefetch { .. }));
        assert_eq!(builder.loads.get(), 0);
    }

    #[tokio::test]
    async fn non_routable_urls_are_skipped_silently() {
        let mut builder = CountingBuilder::routable();
        builder.routable = Routability::NotRoutable;
        let builder = Rc::new(builder);
        let prefetcher = Prefetcher::new(builder.clone());
        prefetcher.prefetch("/server-page").await.unwrap();
        assert_eq!(builder.loads.get(), 0);
    }

    #[tokio::test]
    async fn trigger_path_swallows_routing_failures() {
        let mut builder = CountingBuilder::routable();
        builder.routability_error = Some(RouterError::Resolution("route() bug".into()));
        let prefetcher = Prefetcher::new(Rc::new(builder));
        prefetcher.prefetch_if_routable("/flaky").await.unwrap();
    }

    #[tokio::test]
    async fn trigger_path_propagates_asset_fetch_failures() {
        let mut builder = CountingBuilder::routable();
        builder.load_error = Some(RouterError::AssetFetch {
            url: "/deployed".into(),
        });
        let prefetcher = Prefetcher::new(Rc::new(builder));
        let err = prefetcher
            .prefetch_if_routable("/deployed")
            .await
            .unwrap_err();
        assert!(matches!(err, RouterError::AssetFetch { .. }));
    }

    #[test]
    fn prefetch_mode_resolution_order() {
        use PrefetchMode::*;
        assert_eq!(PrefetchMode::resolve(Some("viewport"), Some(Hover), Hover), Viewport);
        assert_eq!(PrefetchMode::resolve(Some("false"), Some(Viewport), Hover), Disabled);
        assert_eq!(PrefetchMode::resolve(None, Some(Viewport), Hover), Viewport);
        assert_eq!(PrefetchMode::resolve(None, None, Hover), Hover);
        assert_eq!(PrefetchMode::resolve(Some("bogus"), None, Viewport), Viewport);
    }
}
