//! Extension points fired around the checkout lock.
//!
//! `buystep` runs every before-lock hook in registration order, locks the
//! cart, then runs after-lock hooks in order. The first after-lock hook that
//! returns a response ends the chain and that response is sent as-is instead
//! of the checkout redirect.

use std::fmt;
use std::sync::Arc;

use axum::http::HeaderMap;
use axum::response::Response;

use cartflow_core::Cart;

use crate::store::CartKey;

/// What a hook sees.
pub struct HookContext<'a> {
    pub cart_key: CartKey,
    pub cart: &'a Cart,
    /// Headers of the triggering request.
    pub headers: &'a HeaderMap,
}

type BeforeLockHook = Arc<dyn Fn(&HookContext<'_>) + Send + Sync>;
type AfterLockHook = Arc<dyn Fn(&HookContext<'_>) -> Option<Response> + Send + Sync>;

/// Ordered hook lists for the checkout transition.
#[derive(Clone, Default)]
pub struct BuystepHooks {
    before_lock: Vec<BeforeLockHook>,
    after_lock: Vec<AfterLockHook>,
}

impl BuystepHooks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a hook that runs before the cart is locked.
    #[must_use]
    pub fn on_before_lock<F>(mut self, hook: F) -> Self
    where
        F: Fn(&HookContext<'_>) + Send + Sync + 'static,
    {
        self.before_lock.push(Arc::new(hook));
        self
    }

    /// Register a hook that runs after the cart is locked.
    ///
    /// Returning `Some` replaces the default redirect.
    #[must_use]
    pub fn on_after_lock<F>(mut self, hook: F) -> Self
    where
        F: Fn(&HookContext<'_>) -> Option<Response> + Send + Sync + 'static,
    {
        self.after_lock.push(Arc::new(hook));
        self
    }

    pub(crate) fn run_before_lock(&self, ctx: &HookContext<'_>) {
        for hook in &self.before_lock {
            hook(ctx);
        }
    }

    pub(crate) fn run_after_lock(&self, ctx: &HookContext<'_>) -> Option<Response> {
        self.after_lock.iter().find_map(|hook| hook(ctx))
    }
}

impl fmt::Debug for BuystepHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuystepHooks")
            .field("before_lock", &self.before_lock.len())
            .field("after_lock", &self.after_lock.len())
            .finish()
    }
}
