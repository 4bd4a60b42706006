//! Handler system for the Herald framework.
//!
//! This module defines the [`Handler`] trait. Handlers are plain async
//! functions; the trait is implemented via blanket implementations for
//! functions with different arities, similar to Axum's handler system.
//!
//! # Example
//!
//! ```rust,ignore
//! use herald_framework::{L10n, L10nError, Sender};
//!
//! // No parameters, no output
//! async fn noop() {}
//!
//! // Extractors in, text out: the text answers the event in place
//! async fn hello(l10n: L10n) -> Result<String, L10nError> {
//!     l10n.format("hello")
//! }
//!
//! // Full control over the produced actions
//! async fn cleanup(event: Arc<Event>) -> Option<Action> {
//!     event.delete()
//! }
//! ```

use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::FutureExt;
use futures::future::BoxFuture;
use tower::Service;

use crate::context::DispatchRequest;
use crate::error::BoxError;
use crate::extractor::FromRequest;
use crate::outcome::Outcome;
use herald_core::{Action, Event};

// ============================================================================
// IntoActions - Turn handler return values into actions
// ============================================================================

/// A trait for types that can be returned from handlers.
pub trait IntoActions: Send + 'static {
    /// Converts the handler output into the actions to deliver.
    ///
    /// `Err` marks the dispatch as failed.
    fn into_actions(self, event: &Event) -> Result<Vec<Action>, BoxError>;
}

/// Implementation for `()` - no response needed.
impl IntoActions for () {
    fn into_actions(self, _event: &Event) -> Result<Vec<Action>, BoxError> {
        Ok(Vec::new())
    }
}

impl IntoActions for Action {
    fn into_actions(self, _event: &Event) -> Result<Vec<Action>, BoxError> {
        Ok(vec![self])
    }
}

impl IntoActions for Vec<Action> {
    fn into_actions(self, _event: &Event) -> Result<Vec<Action>, BoxError> {
        Ok(self)
    }
}

/// Implementation for `String` - answers the event in place.
impl IntoActions for String {
    fn into_actions(self, event: &Event) -> Result<Vec<Action>, BoxError> {
        Ok(event.answer(self).into_iter().collect())
    }
}

impl IntoActions for &'static str {
    fn into_actions(self, event: &Event) -> Result<Vec<Action>, BoxError> {
        Ok(event.answer(self).into_iter().collect())
    }
}

/// On `Some`, the inner value is converted. On `None`, no action is taken.
impl<T: IntoActions> IntoActions for Option<T> {
    fn into_actions(self, event: &Event) -> Result<Vec<Action>, BoxError> {
        match self {
            Some(t) => t.into_actions(event),
            None => Ok(Vec::new()),
        }
    }
}

/// On `Ok`, the inner value is converted. On `Err`, the dispatch fails.
impl<T, E> IntoActions for Result<T, E>
where
    T: IntoActions,
    E: Into<BoxError> + Send + 'static,
{
    fn into_actions(self, event: &Event) -> Result<Vec<Action>, BoxError> {
        match self {
            Ok(t) => t.into_actions(event),
            Err(e) => Err(e.into()),
        }
    }
}

// ============================================================================
// Handler Trait
// ============================================================================

/// The core trait for event handlers.
///
/// # Blanket Implementation
///
/// This trait is automatically implemented for async functions that:
/// - Take 0-6 parameters that implement [`FromRequest`]
/// - Return a type that implements [`IntoActions`]
pub trait Handler<T>: Clone + Send + Sync + 'static {
    /// Calls the handler, extracting its arguments from `request`.
    fn call(self, request: DispatchRequest) -> BoxFuture<'static, Result<Vec<Action>, BoxError>>;
}

/// Macro to generate Handler implementations for functions with different arities.
macro_rules! impl_handler {
    (
        $($ty:ident),*
    ) => {
        #[allow(non_snake_case, unused_mut, unused_variables)]
        impl<F, Fut, Res, $($ty,)*> Handler<($($ty,)*)> for F
        where
            F: FnOnce($($ty,)*) -> Fut + Clone + Send + Sync + 'static,
            Fut: Future<Output = Res> + Send + 'static,
            Res: IntoActions,
            $( $ty: FromRequest + Send + 'static, )*
        {
            fn call(self, request: DispatchRequest) -> BoxFuture<'static, Result<Vec<Action>, BoxError>> {
                async move {
                    $(
                        let $ty = $ty::from_request(&request)?;
                    )*

                    let res = (self)($($ty,)*).await;
                    res.into_actions(request.event())
                }
                .boxed()
            }
        }
    };
}

impl_handler!();
impl_handler!(T1);
impl_handler!(T1, T2);
impl_handler!(T1, T2, T3);
impl_handler!(T1, T2, T3, T4);
impl_handler!(T1, T2, T3, T4, T5);
impl_handler!(T1, T2, T3, T4, T5, T6);

// ============================================================================
// HandlerService
// ============================================================================

/// A tower [`Service`] that calls a single generic handler.
///
/// This is the innermost service of every route; inner middlewares are
/// layered on top of it.
pub struct HandlerService<H, T> {
    handler: H,
    route: Arc<str>,
    _marker: PhantomData<fn() -> T>,
}

impl<H, T> HandlerService<H, T> {
    pub fn new(handler: H, route: impl Into<Arc<str>>) -> Self {
        Self {
            handler,
            route: route.into(),
            _marker: PhantomData,
        }
    }
}

impl<H: Clone, T> Clone for HandlerService<H, T> {
    fn clone(&self) -> Self {
        HandlerService {
            handler: self.handler.clone(),
            route: Arc::clone(&self.route),
            _marker: PhantomData,
        }
    }
}

impl<H, T> Service<DispatchRequest> for HandlerService<H, T>
where
    H: Handler<T>,
    T: 'static,
{
    type Response = Outcome;
    type Error = BoxError;
    type Future = BoxFuture<'static, Result<Outcome, BoxError>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: DispatchRequest) -> Self::Future {
        let handler = self.handler.clone();
        let route = Arc::clone(&self.route);
        async move {
            let actions = handler.call(request).await?;
            Ok(Outcome::handled(route.as_ref(), actions))
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::Sender;
    use herald_core::testing::{RecordingTransport, private_text, user};
    use tower::ServiceExt;

    fn request(event: Event) -> DispatchRequest {
        DispatchRequest::new(Arc::new(event), Arc::new(RecordingTransport::new()))
    }

    #[tokio::test]
    async fn test_string_answers_in_chat() {
        async fn hello(sender: Sender) -> String {
            format!("hi {}", sender.first_name)
        }

        let svc = HandlerService::new(hello, "hello");
        let outcome = svc.oneshot(request(private_text(user(4), "x"))).await.unwrap();

        assert_eq!(
            outcome,
            Outcome::handled("hello", vec![Action::send_text(4, "hi user4")])
        );
    }

    #[tokio::test]
    async fn test_six_extractors() {
        async fn everything(
            event: Arc<Event>,
            sender: Sender,
            _transport: herald_core::BoxedTransport,
            _context: crate::context::RequestContext,
            missing: Option<crate::extractor::Shared<u64>>,
            again: Option<Sender>,
        ) -> String {
            assert!(missing.is_none());
            assert_eq!(again.map(|s| s.id), Some(sender.id));
            format!("{} from {}", event.text().unwrap_or_default(), sender.id)
        }

        let svc = HandlerService::new(everything, "everything");
        let outcome = svc.oneshot(request(private_text(user(6), "six"))).await.unwrap();
        assert_eq!(
            outcome,
            Outcome::handled("everything", vec![Action::send_text(6, "six from 6")])
        );
    }

    #[tokio::test]
    async fn test_error_output_fails() {
        async fn broken() -> Result<(), std::io::Error> {
            Err(std::io::Error::other("disk on fire"))
        }

        let svc = HandlerService::new(broken, "broken");
        let err = svc
            .oneshot(request(private_text(user(4), "x")))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("disk on fire"));
    }

    #[tokio::test]
    async fn test_extraction_failure_skips_handler() {
        let called = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let flag = Arc::clone(&called);
        let handler = move |_: crate::extractor::Shared<u64>| {
            let flag = Arc::clone(&flag);
            async move {
                flag.store(true, std::sync::atomic::Ordering::SeqCst);
            }
        };

        let svc = HandlerService::new(handler, "needs-state");
        let result = svc.oneshot(request(private_text(user(1), "x"))).await;

        assert!(result.is_err());
        assert!(!called.load(std::sync::atomic::Ordering::SeqCst));
    }
}
