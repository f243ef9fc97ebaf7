//! # vireo-router
//!
//! The client-side navigation core of the Vireo meta-framework: a render
//! pipeline that intercepts navigations, resolves the destination page
//! through an app-supplied [`PageContextBuilder`], and swaps the rendered
//! output in place while keeping scroll position, abort/redirect semantics,
//! and prefetching consistent with native browser behavior.
//!
//! This crate is platform-agnostic: the browser surface (DOM events, the
//! History API, scrolling, repaint timing) sits behind the [`HistoryDriver`]
//! and [`ScrollHost`] traits, implemented by `vireo-web` for
//! `wasm32-unknown-unknown` and by scripted fakes in the tests here.
//!
//! ## Overview
//!
//! - [`Router`] - the state machine. One [`render_page_client_side`] call per
//!   navigation; interleaved calls are ordered by generation counters, and
//!   superseded ones abort cooperatively at their next suspension point.
//! - [`NavigationIntent`] - what to navigate to and how to scroll afterwards.
//! - [`PageContextBuilder`] - the external collaborator producing page data;
//!   logical aborts (rewrite / redirect / render-with-status) come back as
//!   [`ResolveOutcome`] variants, never as thrown errors.
//! - [`Prefetcher`] - warms page assets on hover/viewport triggers,
//!   deduplicated per URL.
//!
//! [`render_page_client_side`]: Router::render_page_client_side

pub mod config;
pub mod context;
pub mod error;
pub mod history;
pub mod hooks;
pub mod intent;
pub mod link;
#[cfg(feature = "logging")]
pub mod logging;
pub mod prefetch;
pub mod router;
pub mod scroll;

pub use config::RouterConfig;
pub use context::{
    AbortSignal, PageContext, PageContextBuilder, PageExports, ResolveOutcome, Routability,
    RewriteChain,
};
pub use error::{Result, RouterError};
pub use history::{
    HistoryDriver, HistoryEntry, LogicalState, PopStateAction, ScrollPosition, classify_popstate,
};
pub use hooks::{Hook, PageHooks, hook};
pub use intent::{NavigationIntent, ScrollTarget};
pub use link::{ClickModifiers, InterceptedClick, LinkSnapshot, classify_click, skip_link};
pub use prefetch::{PrefetchMode, PrefetchRegistry, Prefetcher};
pub use router::{AfterRender, Router};
pub use scroll::{ScrollController, ScrollHost};
