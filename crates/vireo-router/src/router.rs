//! The client-side render pipeline.
//!
//! [`Router::render_page_client_side`] is the single entry point for every
//! navigation: the initial hydration, intercepted link clicks, back-/forward
//! traversal, and internal redirects. The pipeline is a cooperative state
//! machine: each invocation gets a monotonically increasing generation
//! number, and after every suspension point it re-checks whether a newer
//! generation has superseded it. A superseded invocation returns early
//! without committing any visible side effect; it is never forcibly
//! interrupted.
//!
//! Concurrency invariant: generation N may commit DOM/history changes only
//! if, at the moment of commit, N is still the highest generation created and
//! no earlier generation's commit is still in flight. The second half is
//! enforced by the single in-flight render slot every commit waits on.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use futures::FutureExt;
use futures::future::{LocalBoxFuture, Shared};
use tracing::{debug, error, info, trace};

use crate::config::RouterConfig;
use crate::context::{
    AbortSignal, PageContext, PageContextBuilder, ResolveOutcome, Routability, RewriteChain,
};
use crate::error::{Result, RouterError};
use crate::history::{
    HistoryDriver, HistoryEntry, LogicalState, PopStateAction, Timestamper, classify_popstate,
};
use crate::hooks::{Hook, execute_hook};
use crate::intent::{NavigationIntent, ScrollTarget};
use crate::link::is_external_url;
use crate::prefetch::Prefetcher;
use crate::scroll::{ScrollController, ScrollHost, Throttle};

/// The render committed by a generation: render hook plus prefetch-handler
/// attachment, stored as one unit for the next generation to wait on.
type InFlightRender = Shared<LocalBoxFuture<'static, std::result::Result<(), RouterError>>>;

/// Work to run right after the page's render hook, inside the committed
/// render unit. The browser runtime uses this to attach link prefetch
/// handlers to the freshly rendered DOM.
pub type AfterRender = Rc<dyn Fn(Rc<PageContext>) -> LocalBoxFuture<'static, ()>>;

struct RouterState {
    /// Generation counter; one increment per pipeline invocation.
    generation: u64,
    /// The committed render currently in flight, if any.
    in_flight_render: Option<InFlightRender>,
    is_transitioning: bool,
    /// Set once a static-asset fetch fails; every later navigation falls back
    /// to a full browser navigation. Irreversible for the session.
    routing_disabled: bool,
    initial_render_done: bool,
    /// Whether the user has navigated away from the initially loaded page.
    has_navigated: bool,
    /// Last observed logical history state, for popstate classification.
    previous_state: LogicalState,
    /// `onPageTransitionStart` exported by the currently rendered page; runs
    /// at the start of the *next* navigation.
    transition_start: Option<Hook>,
}

struct RouterInner {
    config: RouterConfig,
    builder: Rc<dyn PageContextBuilder>,
    history: Rc<dyn HistoryDriver>,
    scroll: ScrollController,
    prefetcher: Prefetcher,
    after_render: RefCell<Option<AfterRender>>,
    timestamper: Timestamper,
    scroll_save_throttle: Throttle,
    state: RefCell<RouterState>,
}

/// Parameters of one pipeline invocation; the recursion state (rewrite chain,
/// redirect count) rides along with the original intent.
#[derive(Clone)]
struct RenderParams {
    url: String,
    scroll_target: ScrollTarget,
    overwrite_last_history_entry: bool,
    is_backward_navigation: Option<bool>,
    check_client_routable: bool,
    rewrites: RewriteChain,
    redirect_count: usize,
}

/// Re-evaluated at every suspension point; deciding to abort means returning
/// early without performing any of the remaining side effects.
struct AbortGuard {
    inner: Rc<RouterInner>,
    generation: u64,
    hydration_can_be_aborted: Rc<Cell<bool>>,
}

impl AbortGuard {
    fn should_abort(&self) -> bool {
        // The hydration render must complete unless the page opts in:
        // aborting it would leave the app without any rendered fallback.
        if self.generation == 1 && !self.hydration_can_be_aborted.get() {
            return false;
        }
        self.generation != self.inner.state.borrow().generation
    }
}

/// Outcome of the error-page resolution path.
enum ErrorPageOutcome {
    /// The error page resolved; the pipeline continues with it.
    Resolved(PageContext),
    /// This invocation must stand down without surfacing anything.
    Interrupt,
}

/// The client-side router: owns all navigation coordination state for the
/// lifetime of the installed router. Cheap to clone.
#[derive(Clone)]
pub struct Router {
    inner: Rc<RouterInner>,
}

impl Router {
    pub fn new(
        config: RouterConfig,
        builder: Rc<dyn PageContextBuilder>,
        history: Rc<dyn HistoryDriver>,
        scroll_host: Rc<dyn ScrollHost>,
    ) -> Self {
        let previous_state = LogicalState::new(&history.current_url(), history.state());
        let scroll = ScrollController::new(scroll_host, &config);
        let prefetcher = Prefetcher::new(builder.clone());
        let scroll_save_throttle = Throttle::new(config.scroll_save_min_interval_ms);
        Self {
            inner: Rc::new(RouterInner {
                config,
                builder,
                history,
                scroll,
                prefetcher,
                after_render: RefCell::new(None),
                timestamper: Timestamper::new(),
                scroll_save_throttle,
                state: RefCell::new(RouterState {
                    generation: 0,
                    in_flight_render: None,
                    is_transitioning: false,
                    routing_disabled: false,
                    initial_render_done: false,
                    has_navigated: false,
                    previous_state,
                    transition_start: None,
                }),
            }),
        }
    }

    /// Install work to run inside every committed render, right after the
    /// page's render hook.
    pub fn set_after_render(&self, after_render: AfterRender) {
        *self.inner.after_render.borrow_mut() = Some(after_render);
    }

    /// Record a URL as already prefetched (e.g. the currently rendered page).
    pub fn mark_prefetched(&self, url: &str) {
        self.inner.prefetcher.registry().mark(url);
    }

    /// Prefetch trigger for links without a per-link or per-page override.
    pub fn default_prefetch_mode(&self) -> crate::prefetch::PrefetchMode {
        self.inner.config.default_prefetch_mode
    }

    /// Whether the user has navigated away from the initially loaded page.
    pub fn has_navigated(&self) -> bool {
        self.inner.state.borrow().has_navigated
    }

    pub fn is_routing_disabled(&self) -> bool {
        self.inner.state.borrow().routing_disabled
    }

    /// Seed the current history entry with a fresh timestamp and the current
    /// scroll position. Called at install time and when a native hash jump
    /// leaves `history.state` uninitialized.
    pub fn seed_history_state(&self) {
        let entry = HistoryEntry {
            timestamp: self.next_timestamp(),
            scroll_position: Some(self.inner.scroll.host().scroll_position()),
        };
        let url = self.inner.history.current_url();
        self.inner.history.replace(&url, entry);
        self.inner.state.borrow_mut().previous_state = LogicalState::new(&url, Some(entry));
    }

    /// Run the initial hydration render for the current URL.
    pub async fn initial_render(&self) -> Result<()> {
        self.seed_history_state();
        self.render_page_client_side(NavigationIntent::initial(self.inner.history.current_url()))
            .await
    }

    /// Entry point for every navigation.
    pub async fn render_page_client_side(&self, intent: NavigationIntent) -> Result<()> {
        let params = RenderParams {
            url: intent.url,
            scroll_target: intent.scroll_target,
            overwrite_last_history_entry: intent.overwrite_last_history_entry,
            is_backward_navigation: intent.is_backward_navigation,
            check_client_routable: intent.check_client_routable,
            rewrites: RewriteChain::new(),
            redirect_count: 0,
        };
        self.render(params).await
    }

    /// Boxed so the rewrite/redirect branches can recurse.
    fn render(&self, params: RenderParams) -> LocalBoxFuture<'static, Result<()>> {
        let this = self.clone();
        Box::pin(async move { this.render_inner(params).await })
    }

    async fn render_inner(&self, params: RenderParams) -> Result<()> {
        let inner = &self.inner;
        if params.rewrites.len() > inner.config.max_rewrites
            || params.redirect_count > inner.config.max_redirects
        {
            return Err(RouterError::InfiniteAbortLoop {
                rewrites: params.rewrites.len(),
                redirects: params.redirect_count,
            });
        }

        if inner.state.borrow().routing_disabled {
            inner.history.navigate_full(&params.url);
            return Ok(());
        }

        let generation = {
            let mut state = inner.state.borrow_mut();
            state.generation += 1;
            state.generation
        };
        let is_first_render_attempt = generation == 1;
        let hydration_can_be_aborted = Rc::new(Cell::new(inner.config.hydration_can_be_aborted));
        let guard = AbortGuard {
            inner: inner.clone(),
            generation,
            hydration_can_be_aborted: hydration_can_be_aborted.clone(),
        };
        trace!(generation, url = %params.url, "navigation started");

        let mut base = PageContext::new(&params.url, params.is_backward_navigation);
        base.rewrites = params.rewrites.clone();
        base.is_first_render_attempt = is_first_render_attempt;

        // Start the transition before the first suspension point so the page
        // can show a loading state immediately.
        if generation > 1 && !inner.state.borrow().is_transitioning {
            let hook = inner.state.borrow().transition_start.clone();
            execute_hook(hook.as_ref(), "onPageTransitionStart", Rc::new(base)).await?;
            inner.state.borrow_mut().is_transitioning = true;
        }
        if guard.should_abort() {
            return Ok(());
        }

        if params.check_client_routable {
            let logical_url = params
                .rewrites
                .latest_url()
                .unwrap_or(&params.url)
                .to_string();
            // A route hook raising a logical abort still counts as routable:
            // the full resolution below runs the hook again and branches on
            // the abort. A genuine hook bug propagates.
            match inner.builder.routability(&logical_url).await? {
                Routability::NotRoutable => {
                    inner.history.navigate_full(&params.url);
                    return Ok(());
                }
                Routability::Routable | Routability::Aborted(_) => {}
            }
            if guard.should_abort() {
                return Ok(());
            }
        }

        let mut ctx = inner
            .builder
            .create(&params.url, &params.rewrites, params.is_backward_navigation)
            .await?;
        if guard.should_abort() {
            return Ok(());
        }
        ctx.is_first_render_attempt = is_first_render_attempt;

        let ctx_for_error = ctx.clone();
        let resolved = match inner.builder.resolve(ctx).await {
            ResolveOutcome::Resolved(resolved) => resolved,
            ResolveOutcome::AlreadyServerRouted => return Ok(()),
            ResolveOutcome::AssetFetchError => {
                return self.handle_asset_fetch_failure(&params.url, is_first_render_attempt);
            }
            ResolveOutcome::Abort(AbortSignal::Rewrite { url }) => {
                debug!(generation, from = %params.url, to = %url, "rewrite abort");
                let mut next = params.clone();
                next.rewrites = params.rewrites.extended(url);
                next.check_client_routable = false;
                return self.render(next).await;
            }
            ResolveOutcome::Abort(AbortSignal::Redirect { url }) => {
                if is_external_url(&url) {
                    debug!(generation, to = %url, "external redirect");
                    inner.history.navigate_full(&url);
                    return Ok(());
                }
                debug!(generation, from = %params.url, to = %url, "internal redirect");
                return self
                    .render(RenderParams {
                        url,
                        scroll_target: ScrollTarget::ScrollToTopOrHash,
                        overwrite_last_history_entry: false,
                        is_backward_navigation: Some(false),
                        check_client_routable: true,
                        rewrites: params.rewrites.clone(),
                        redirect_count: params.redirect_count + 1,
                    })
                    .await;
            }
            ResolveOutcome::Abort(AbortSignal::RenderStatus { status }) => {
                // Expected condition (e.g. a 404); deliberately not logged as
                // an error to keep error trackers quiet.
                debug!(generation, status, "render-with-status abort");
                let mut ctx_err = ctx_for_error;
                ctx_err.abort_status = Some(status);
                ctx_err.is_404 = status == 404;
                match self
                    .resolve_error_page(ctx_err, None, is_first_render_attempt, &params.url)
                    .await?
                {
                    ErrorPageOutcome::Resolved(resolved) => resolved,
                    ErrorPageOutcome::Interrupt => return Ok(()),
                }
            }
            ResolveOutcome::Failed(err) => {
                // A 404 reached through the client router means the UI has a
                // broken link; unexpected failures surface through normal
                // error reporting. Neither is swallowed here.
                error!(generation, url = %params.url, %err, "page context resolution failed");
                match self
                    .resolve_error_page(
                        ctx_for_error,
                        Some(err),
                        is_first_render_attempt,
                        &params.url,
                    )
                    .await?
                {
                    ErrorPageOutcome::Resolved(resolved) => resolved,
                    ErrorPageOutcome::Interrupt => return Ok(()),
                }
            }
        };

        // Capture the page's exports that outlive this render.
        inner.state.borrow_mut().transition_start =
            resolved.exports.hooks.on_page_transition_start.clone();
        if resolved.exports.hydration_can_be_aborted {
            hydration_can_be_aborted.set(true);
        }
        if guard.should_abort() {
            return Ok(());
        }

        // Strict ordering: a previous committed render must finish before this
        // one commits, otherwise it could finish after us and clobber the DOM.
        let pending = inner.state.borrow().in_flight_render.clone();
        if let Some(pending) = pending {
            let _ = pending.await;
            if guard.should_abort() {
                return Ok(());
            }
        }

        self.commit(resolved, &params, generation).await
    }

    /// The committing half of the pipeline: history update, render unit,
    /// terminal hook, scroll. Runs only for the live generation.
    async fn commit(
        &self,
        resolved: PageContext,
        params: &RenderParams,
        generation: u64,
    ) -> Result<()> {
        let inner = &self.inner;
        self.change_url(&params.url, params.overwrite_last_history_entry);
        if generation > 1 {
            inner.state.borrow_mut().has_navigated = true;
        }

        let ctx = Rc::new(resolved);
        let render_unit: InFlightRender = {
            let ctx = ctx.clone();
            let after_render = inner.after_render.borrow().clone();
            let fut: LocalBoxFuture<'static, std::result::Result<(), RouterError>> =
                Box::pin(async move {
                    execute_hook(ctx.exports.render.as_ref(), "render", ctx.clone()).await?;
                    if let Some(after_render) = after_render {
                        after_render(ctx).await;
                    }
                    Ok(())
                });
            fut.shared()
        };
        inner.state.borrow_mut().in_flight_render = Some(render_unit.clone());
        let render_result = render_unit.clone().await;
        {
            // A waiter resumed by the same completion may already have
            // installed its own render; only clear our own.
            let mut state = inner.state.borrow_mut();
            if state
                .in_flight_render
                .as_ref()
                .is_some_and(|f| Shared::ptr_eq(f, &render_unit))
            {
                state.in_flight_render = None;
            }
        }
        render_result?;

        // Exactly one terminal hook: hydration-end on the first attempt,
        // transition-end when this is still the most current generation.
        if ctx.is_first_render_attempt {
            execute_hook(
                ctx.exports.hooks.on_hydration_end.as_ref(),
                "onHydrationEnd",
                ctx.clone(),
            )
            .await?;
        } else if generation == inner.state.borrow().generation {
            execute_hook(
                ctx.exports.hooks.on_page_transition_end.as_ref(),
                "onPageTransitionEnd",
                ctx.clone(),
            )
            .await?;
            inner.state.borrow_mut().is_transitioning = false;
        }

        inner.scroll.apply(params.scroll_target, &params.url).await;
        // From here on the router owns scroll positioning; the browser's
        // native restoration would fight with it.
        inner.scroll.host().set_native_restoration(false);
        inner.state.borrow_mut().initial_render_done = true;
        trace!(generation, url = %params.url, "navigation committed");
        Ok(())
    }

    /// Resolve the error page for a context whose normal resolution failed.
    ///
    /// An error page failing with a *different* error than the original is
    /// fatal; failing with the same error is saturated and interrupts
    /// silently. When this is not the first attempt, a full-page fallback
    /// navigation is issued so the server gets a chance to render the error.
    async fn resolve_error_page(
        &self,
        ctx: PageContext,
        original_error: Option<RouterError>,
        is_first_render_attempt: bool,
        url: &str,
    ) -> Result<ErrorPageOutcome> {
        let inner = &self.inner;
        let err2 = match inner.builder.resolve_error_page(ctx).await {
            ResolveOutcome::Resolved(resolved) => return Ok(ErrorPageOutcome::Resolved(resolved)),
            ResolveOutcome::AlreadyServerRouted => return Ok(ErrorPageOutcome::Interrupt),
            ResolveOutcome::AssetFetchError => {
                self.handle_asset_fetch_failure(url, is_first_render_attempt)?;
                return Ok(ErrorPageOutcome::Interrupt);
            }
            ResolveOutcome::Failed(err2) => err2,
            ResolveOutcome::Abort(signal) => {
                RouterError::Resolution(format!("error page raised a logical abort: {signal:?}"))
            }
        };
        if !is_first_render_attempt {
            // Let the server render the error page.
            inner.history.navigate_full(url);
        }
        match original_error {
            // Saturated: the error page fails exactly like the page it was
            // meant to replace. Nothing more to do client-side.
            Some(original) if original.is_equivalent(&err2) => Ok(ErrorPageOutcome::Interrupt),
            _ => Err(err2),
        }
    }

    fn handle_asset_fetch_failure(&self, url: &str, is_first_render_attempt: bool) -> Result<()> {
        let err = RouterError::AssetFetch {
            url: url.to_string(),
        };
        if is_first_render_attempt {
            // No fallback rendering exists yet; rethrow. Typically a new
            // frontend was deployed mid-hydration.
            self.disable_client_routing(&err, false);
            Err(err)
        } else {
            self.disable_client_routing(&err, true);
            self.inner.history.navigate_full(url);
            Ok(())
        }
    }

    /// Permanently switch this session to full browser navigations.
    pub fn disable_client_routing(&self, err: &RouterError, should_log: bool) {
        self.inner.state.borrow_mut().routing_disabled = true;
        if should_log {
            // info, not error: expected after a fresh deploy, and error
            // trackers should not be flooded with it.
            info!(%err, "client routing disabled, falling back to server routing");
        } else {
            debug!(%err, "client routing disabled");
        }
    }

    /// Programmatic prefetch. Asset-fetch failures disable client routing for
    /// the session instead of surfacing to the caller.
    pub async fn prefetch(&self, url: &str) -> Result<()> {
        match self.inner.prefetcher.prefetch(url).await {
            Err(err @ RouterError::AssetFetch { .. }) => {
                self.disable_client_routing(&err, true);
                Ok(())
            }
            other => other,
        }
    }

    /// Trigger-path prefetch (hover/viewport): routing failures are silent.
    pub async fn prefetch_if_routable(&self, url: &str) -> Result<()> {
        match self.inner.prefetcher.prefetch_if_routable(url).await {
            Err(err @ RouterError::AssetFetch { .. }) => {
                self.disable_client_routing(&err, true);
                Ok(())
            }
            other => other,
        }
    }

    /// Handle a `popstate` event.
    ///
    /// Hash-only events never invoke the render pipeline: with an
    /// uninitialized state the browser already jumped to the anchor and we
    /// only re-seed the entry; with a saved state we restore its position.
    /// Everything else is a real navigation.
    pub async fn on_popstate(&self) -> Result<()> {
        let inner = &self.inner;
        let current = LogicalState::new(&inner.history.current_url(), inner.history.state());
        let previous = {
            let mut state = inner.state.borrow_mut();
            std::mem::replace(&mut state.previous_state, current.clone())
        };
        match classify_popstate(&current, &previous) {
            PopStateAction::HashNavigation {
                state_is_uninitialized: true,
            } => {
                // The browser already scrolled to the anchor; the current
                // position is the right one, so save it into a fresh entry.
                self.seed_history_state();
                Ok(())
            }
            PopStateAction::HashNavigation {
                state_is_uninitialized: false,
            } => {
                let target = current
                    .entry
                    .and_then(|e| e.scroll_position)
                    .map(ScrollTarget::Position)
                    .unwrap_or(ScrollTarget::ScrollToTopOrHash);
                inner
                    .scroll
                    .apply(target, &inner.history.current_url())
                    .await;
                Ok(())
            }
            PopStateAction::Navigate {
                is_backward_navigation,
                scroll_position,
            } => {
                let target = scroll_position
                    .map(ScrollTarget::Position)
                    .unwrap_or(ScrollTarget::ScrollToTopOrHash);
                self.render_page_client_side(NavigationIntent::history_pop(
                    inner.history.current_url(),
                    target,
                    is_backward_navigation,
                ))
                .await
            }
        }
    }

    /// Persist the current scroll position into the current history entry.
    pub fn save_scroll_position(&self) {
        let inner = &self.inner;
        let mut entry = inner
            .history
            .state()
            .unwrap_or_else(|| HistoryEntry::new(self.next_timestamp()));
        entry.scroll_position = Some(inner.scroll.host().scroll_position());
        let url = inner.history.current_url();
        inner.history.replace(&url, entry);
        inner.state.borrow_mut().previous_state = LogicalState::new(&url, Some(entry));
    }

    /// Throttled variant for the scroll listener; history writes are rate
    /// limited because browsers reject high-frequency `replaceState` calls.
    pub fn save_scroll_position_throttled(&self) {
        if self
            .inner
            .scroll_save_throttle
            .allow(self.inner.history.now_ms())
        {
            self.save_scroll_position();
        }
    }

    /// Unthrottled save for page-hide, where a skipped write would lose the
    /// position for good.
    pub fn save_scroll_position_on_page_hide(&self) {
        self.inner.scroll_save_throttle.reset();
        self.save_scroll_position();
    }

    pub fn initial_render_done(&self) -> bool {
        self.inner.state.borrow().initial_render_done
    }

    /// Native scroll restoration handles the very first paint only; install
    /// time turns it on, the first committed render turns it off for good.
    pub fn enable_native_restoration_for_first_paint(&self) {
        self.inner.scroll.host().set_native_restoration(true);
    }

    /// Page-hide: save the position and hand scroll restoration back to the
    /// browser so a BFCache restore lands where the user left.
    pub fn on_page_hide(&self) {
        self.save_scroll_position_on_page_hide();
        self.inner.scroll.host().set_native_restoration(true);
    }

    /// Page-show: reclaim scroll restoration once we have rendered at least
    /// once.
    pub fn on_page_show(&self) {
        if self.initial_render_done() {
            self.inner.scroll.host().set_native_restoration(false);
        }
    }

    fn change_url(&self, url: &str, overwrite_last_history_entry: bool) {
        let inner = &self.inner;
        if inner.history.current_url() == url {
            return;
        }
        inner.scroll.host().set_native_restoration(false);
        let entry = HistoryEntry::new(self.next_timestamp());
        if overwrite_last_history_entry {
            inner.history.replace(url, entry);
        } else {
            inner.history.push(url, entry);
        }
        inner.state.borrow_mut().previous_state = LogicalState::new(url, Some(entry));
    }

    fn next_timestamp(&self) -> u64 {
        self.inner.timestamper.next(self.inner.history.now_ms())
    }
}
