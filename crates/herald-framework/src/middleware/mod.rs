//! Middleware chain.
//!
//! A [`Middleware`] wraps the rest of the pipeline. It receives the request
//! and a [`Next`] handle and may:
//!
//! - call `next.run(request)` and return (or post-process) its outcome,
//! - return an [`Outcome`] without calling `next`, aborting the chain,
//! - mutate the request context before passing it on.
//!
//! The same [`MiddlewareChain`] type is used for both scopes:
//!
//! - **outer** middlewares wrap route resolution for an event category, so
//!   they see every event of that category, matched or not;
//! - **inner** middlewares wrap the handler of a matched route.
//!
//! Chains are compiled once, at dispatcher build time, into boxed tower
//! services:
//!
//! ```text
//! outer_1 ─▶ outer_2 ─▶ router ─▶ inner_1 ─▶ inner_2 ─▶ handler
//! ```

mod l10n;
mod throttling;
mod weekend;

use std::sync::Arc;
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;
use tower::util::BoxCloneSyncService;
use tower::{Layer, Service, ServiceExt};

use crate::context::DispatchRequest;
use crate::error::BoxError;
use crate::outcome::Outcome;

pub use l10n::L10nMiddleware;
pub use throttling::ThrottlingMiddleware;
pub use weekend::{WeekendMiddleware, is_weekend};

/// A compiled, cloneable pipeline segment.
pub type Endpoint = BoxCloneSyncService<DispatchRequest, Outcome, BoxError>;

/// A wrapper around the rest of the pipeline.
///
/// # Example
///
/// ```rust,ignore
/// struct Timing;
///
/// #[async_trait]
/// impl Middleware for Timing {
///     fn name(&self) -> &'static str {
///         "timing"
///     }
///
///     async fn handle(&self, request: DispatchRequest, next: Next) -> Result<Outcome, BoxError> {
///         let started = Instant::now();
///         let outcome = next.run(request).await;
///         debug!(elapsed = ?started.elapsed(), "Event processed");
///         outcome
///     }
/// }
/// ```
#[async_trait]
pub trait Middleware: Send + Sync + 'static {
    /// Name reported in [`Outcome::Rejected`] and in logs.
    fn name(&self) -> &'static str;

    /// Processes the request, usually by calling `next.run(request)`.
    async fn handle(&self, request: DispatchRequest, next: Next) -> Result<Outcome, BoxError>;
}

// =============================================================================
// Next
// =============================================================================

/// The remainder of the pipeline, handed to a [`Middleware`].
#[derive(Clone)]
pub struct Next {
    inner: Endpoint,
}

impl Next {
    pub(crate) fn new(inner: Endpoint) -> Self {
        Self { inner }
    }

    /// Runs the rest of the pipeline.
    pub async fn run(self, request: DispatchRequest) -> Result<Outcome, BoxError> {
        self.inner.oneshot(request).await
    }
}

// =============================================================================
// Layer / Service
// =============================================================================

/// A tower [`Layer`] applying one [`Middleware`].
#[derive(Clone)]
pub struct MiddlewareLayer {
    middleware: Arc<dyn Middleware>,
}

impl MiddlewareLayer {
    pub fn new(middleware: Arc<dyn Middleware>) -> Self {
        Self { middleware }
    }
}

impl<S> Layer<S> for MiddlewareLayer {
    type Service = MiddlewareService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        MiddlewareService {
            middleware: Arc::clone(&self.middleware),
            inner,
        }
    }
}

/// The service produced by [`MiddlewareLayer`].
#[derive(Clone)]
pub struct MiddlewareService<S> {
    middleware: Arc<dyn Middleware>,
    inner: S,
}

impl<S> Service<DispatchRequest> for MiddlewareService<S>
where
    S: Service<DispatchRequest, Response = Outcome, Error = BoxError>
        + Clone
        + Send
        + Sync
        + 'static,
    S::Future: Send + 'static,
{
    type Response = Outcome;
    type Error = BoxError;
    type Future = BoxFuture<'static, Result<Outcome, BoxError>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: DispatchRequest) -> Self::Future {
        let middleware = Arc::clone(&self.middleware);
        let next = Next::new(Endpoint::new(self.inner.clone()));
        async move { middleware.handle(request, next).await }.boxed()
    }
}

// =============================================================================
// MiddlewareChain
// =============================================================================

/// An ordered list of middlewares; the first one registered runs first.
#[derive(Clone, Default)]
pub struct MiddlewareChain {
    middlewares: Vec<Arc<dyn Middleware>>,
}

impl MiddlewareChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, middleware: Arc<dyn Middleware>) {
        self.middlewares.push(middleware);
    }

    /// Appends every middleware of `other`, keeping its order.
    pub fn extend(&mut self, other: &MiddlewareChain) {
        self.middlewares.extend(other.middlewares.iter().cloned());
    }

    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }

    /// Names in execution order.
    pub fn names(&self) -> Vec<&'static str> {
        self.middlewares.iter().map(|m| m.name()).collect()
    }

    /// Wraps `endpoint` so that the first middleware is the outermost one.
    pub fn wrap<S>(&self, endpoint: S) -> Endpoint
    where
        S: Service<DispatchRequest, Response = Outcome, Error = BoxError>
            + Clone
            + Send
            + Sync
            + 'static,
        S::Future: Send + 'static,
    {
        let mut service = Endpoint::new(endpoint);
        for middleware in self.middlewares.iter().rev() {
            service = Endpoint::new(MiddlewareLayer::new(Arc::clone(middleware)).layer(service));
        }
        service
    }
}

impl std::fmt::Debug for MiddlewareChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

// =============================================================================
// FnMiddleware
// =============================================================================

type MiddlewareFn =
    dyn Fn(DispatchRequest, Next) -> BoxFuture<'static, Result<Outcome, BoxError>> + Send + Sync;

/// A middleware built from a closure.
pub struct FnMiddleware {
    name: &'static str,
    f: Box<MiddlewareFn>,
}

/// Wraps a closure as a [`Middleware`].
///
/// ```rust,ignore
/// let audit = middleware_fn("audit", |request, next| {
///     async move {
///         info!(event = request.event().name(), "Incoming event");
///         next.run(request).await
///     }
///     .boxed()
/// });
/// ```
pub fn middleware_fn<F>(name: &'static str, f: F) -> FnMiddleware
where
    F: Fn(DispatchRequest, Next) -> BoxFuture<'static, Result<Outcome, BoxError>>
        + Send
        + Sync
        + 'static,
{
    FnMiddleware {
        name,
        f: Box::new(f),
    }
}

#[async_trait]
impl Middleware for FnMiddleware {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn handle(&self, request: DispatchRequest, next: Next) -> Result<Outcome, BoxError> {
        (self.f)(request, next).await
    }
}
