//! The dispatcher: one compiled pipeline per event category.
//!
//! ```text
//! feed(event) ─▶ outer middlewares ─▶ routers ─▶ inner middlewares ─▶ handler
//!                                                                       │
//!                      transport ◀── actions of the Outcome ◀───────────┘
//! ```
//!
//! Pipelines are compiled once by [`DispatcherBuilder::build`]. Handler
//! errors and panics are caught at the dispatch boundary and reported as
//! [`Outcome::Failed`]; they never escape [`Dispatcher::feed`].

use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tower::ServiceExt;
use tracing::{Instrument, debug, error, info_span, warn};

use crate::context::{DispatchRequest, RequestContext};
use crate::extractor::Shared;
use crate::middleware::{Endpoint, Middleware, MiddlewareChain};
use crate::outcome::Outcome;
use crate::router::{Router, RouterService};
use herald_core::{Action, BoxedTransport, Event, EventCategory};

/// Builder for [`Dispatcher`].
#[derive(Default)]
pub struct DispatcherBuilder {
    routers: Vec<Router>,
    outer: HashMap<EventCategory, MiddlewareChain>,
    inner: HashMap<EventCategory, MiddlewareChain>,
    seeds: RequestContext,
}

impl DispatcherBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a router. Routers are tried in registration order.
    pub fn include_router(mut self, router: Router) -> Self {
        self.routers.push(router);
        self
    }

    /// Adds an outer middleware, which sees every event of `category`.
    pub fn outer_middleware<M: Middleware>(mut self, category: EventCategory, middleware: M) -> Self {
        self.outer
            .entry(category)
            .or_default()
            .push(Arc::new(middleware));
        self
    }

    /// Adds an inner middleware, which wraps every matched handler of
    /// `category`.
    pub fn inner_middleware<M: Middleware>(mut self, category: EventCategory, middleware: M) -> Self {
        self.inner
            .entry(category)
            .or_default()
            .push(Arc::new(middleware));
        self
    }

    /// Seeds `value` into every request, extractable as [`Shared<T>`].
    pub fn shared<T: Send + Sync + 'static>(mut self, value: T) -> Self {
        self.seeds.insert(Shared::<T>::key(), value);
        self
    }

    /// Seeds a raw context value into every request.
    pub fn context_value<T: Send + Sync + 'static>(mut self, key: impl Into<String>, value: T) -> Self {
        self.seeds.insert(key, value);
        self
    }

    /// Compiles the pipelines.
    pub fn build(self) -> Dispatcher {
        let mut compiled = HashMap::new();
        for router in self.routers {
            router.compile(&self.inner, &mut compiled);
        }

        let mut pipelines = HashMap::new();
        for category in EventCategory::ALL {
            let routers = RouterService::new(compiled.remove(&category).unwrap_or_default());
            debug!(
                category = category.as_str(),
                routes = routers.route_count(),
                outer = ?self.outer.get(&category),
                "Compiled pipeline"
            );
            let outer = self.outer.get(&category).cloned().unwrap_or_default();
            pipelines.insert(category, outer.wrap(routers));
        }

        Dispatcher {
            pipelines: Arc::new(pipelines),
            seeds: self.seeds,
        }
    }
}

/// Routes events to handlers.
///
/// Cheap to clone; clones share the compiled pipelines.
#[derive(Clone)]
pub struct Dispatcher {
    pipelines: Arc<HashMap<EventCategory, Endpoint>>,
    seeds: RequestContext,
}

impl Dispatcher {
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::new()
    }

    /// Dispatches one event and delivers the resulting actions.
    pub async fn feed(&self, event: Event, transport: BoxedTransport) -> Outcome {
        let event = Arc::new(event);
        let span = info_span!(
            "dispatch",
            event = event.name(),
            chat_id = event.chat().map(|chat| chat.id),
            user_id = event.sender().map(|user| user.id),
        );
        self.dispatch(event, transport).instrument(span).await
    }

    async fn dispatch(&self, event: Arc<Event>, transport: BoxedTransport) -> Outcome {
        let Some(pipeline) = self.pipelines.get(&event.category()) else {
            return Outcome::Unmatched;
        };

        let request = DispatchRequest::with_context(
            Arc::clone(&event),
            Arc::clone(&transport),
            self.seeds.clone(),
        );

        let result = AssertUnwindSafe(pipeline.clone().oneshot(request))
            .catch_unwind()
            .await;

        let outcome = match result {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => {
                error!(error = %e, "Handler failed");
                Outcome::Failed {
                    error: e.to_string(),
                }
            }
            Err(panic) => {
                let message = panic_message(&*panic);
                error!(panic = %message, "Handler panicked");
                Outcome::Failed {
                    error: format!("panic: {message}"),
                }
            }
        };

        deliver(&transport, outcome.actions()).await;
        outcome
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut categories: Vec<_> = self.pipelines.keys().collect();
        categories.sort();
        f.debug_struct("Dispatcher")
            .field("categories", &categories)
            .field("seeds", &self.seeds)
            .finish()
    }
}

/// Sends actions one by one. Failures are logged and do not stop delivery.
async fn deliver(transport: &BoxedTransport, actions: &[Action]) {
    for action in actions {
        if let Err(e) = transport.execute(action).await {
            warn!(action = action.name(), error = %e, "Failed to deliver action");
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BoxError;
    use crate::filter::{
        ChatTypeFilter, CommandArgs, CommandFilter, HasUsernamesFilter, Usernames, Verdict,
        fn_filter,
    };
    use crate::middleware::{Next, WeekendMiddleware, middleware_fn};
    use crate::router::Route;
    use crate::{Filter, Sender};
    use async_trait::async_trait;
    use chrono::TimeZone;
    use herald_core::testing::{
        RecordingTransport, callback, command, group, private, private_text, text_with_entities,
        user,
    };
    use herald_core::{EntityKind, MessageEntity};
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn transport() -> Arc<RecordingTransport> {
        Arc::new(RecordingTransport::new())
    }

    fn counter() -> (Arc<AtomicUsize>, impl Fn() -> usize) {
        let count = Arc::new(AtomicUsize::new(0));
        let read = Arc::clone(&count);
        (count, move || read.load(Ordering::SeqCst))
    }

    async fn pong() -> &'static str {
        "pong"
    }

    #[tokio::test]
    async fn test_first_matching_route_wins() {
        let dispatcher = Dispatcher::builder()
            .include_router(
                Router::new("admin")
                    .filter(EventCategory::Message, fn_filter(|e| e.text() == Some("/admin")))
                    .route(Route::message().name("admin").handler(pong)),
            )
            .include_router(
                Router::new("personal")
                    .route(Route::message().name("first").handler(pong))
                    .route(Route::message().name("second").handler(pong)),
            )
            .build();

        let outcome = dispatcher.feed(private_text(user(1), "hi"), transport()).await;
        assert_eq!(outcome.route(), Some("first"));

        let outcome = dispatcher.feed(private_text(user(1), "/admin"), transport()).await;
        assert_eq!(outcome.route(), Some("admin"));
    }

    #[tokio::test]
    async fn test_actions_delivered_to_transport() {
        let transport = transport();
        let dispatcher = Dispatcher::builder()
            .include_router(Router::new("main").route(Route::message().handler(pong)))
            .build();

        dispatcher.feed(private_text(user(3), "ping"), transport.clone()).await;
        assert_eq!(transport.actions(), vec![Action::send_text(3, "pong")]);
    }

    #[tokio::test]
    async fn test_delivery_failure_keeps_outcome() {
        async fn two() -> Vec<Action> {
            vec![Action::send_text(1, "a"), Action::send_text(1, "b")]
        }

        let transport = transport();
        transport.fail_actions(true);
        let dispatcher = Dispatcher::builder()
            .include_router(Router::new("main").route(Route::message().handler(two)))
            .build();

        let outcome = dispatcher.feed(private_text(user(1), "x"), transport.clone()).await;
        assert!(outcome.is_handled());
        assert_eq!(outcome.actions().len(), 2);
    }

    #[tokio::test]
    async fn test_unmatched_event_still_seen_by_outer() {
        let (seen, seen_count) = counter();
        let dispatcher = Dispatcher::builder()
            .outer_middleware(
                EventCategory::Message,
                middleware_fn("count", move |request, next| {
                    seen.fetch_add(1, Ordering::SeqCst);
                    next.run(request).boxed()
                }),
            )
            .include_router(
                Router::new("groups")
                    .route(Route::message().filter(ChatTypeFilter::groups()).handler(pong)),
            )
            .build();

        let outcome = dispatcher.feed(private_text(user(1), "x"), transport()).await;
        assert_eq!(outcome, Outcome::Unmatched);
        assert_eq!(seen_count(), 1);
    }

    #[tokio::test]
    async fn test_handler_error_and_panic_become_failed() {
        async fn broken() -> Result<(), BoxError> {
            Err("broken".into())
        }
        async fn boom() {
            panic!("boom");
        }

        let dispatcher = Dispatcher::builder()
            .include_router(
                Router::new("main")
                    .route(Route::message().filter(CommandFilter::new("broken")).handler(broken))
                    .route(Route::message().filter(CommandFilter::new("boom")).handler(boom))
                    .route(Route::message().handler(pong)),
            )
            .build();

        let outcome = dispatcher.feed(command(private(1), user(1), "/broken"), transport()).await;
        assert_eq!(outcome, Outcome::Failed { error: "broken".to_string() });

        let outcome = dispatcher.feed(command(private(1), user(1), "/boom"), transport()).await;
        assert!(matches!(outcome, Outcome::Failed { error } if error.contains("boom")));

        // The dispatcher keeps working afterwards.
        let outcome = dispatcher.feed(private_text(user(1), "x"), transport()).await;
        assert!(outcome.is_handled());
    }

    #[tokio::test]
    async fn test_inner_middleware_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let tag = |name: &'static str| {
            let log = Arc::clone(&log);
            middleware_fn(name, move |request, next: Next| {
                log.lock().push(name);
                next.run(request).boxed()
            })
        };

        let handler_log = Arc::clone(&log);
        let handler = move || {
            let log = Arc::clone(&handler_log);
            async move {
                log.lock().push("handler");
            }
        };

        let dispatcher = Dispatcher::builder()
            .outer_middleware(EventCategory::Message, tag("outer"))
            .inner_middleware(EventCategory::Message, tag("dispatcher"))
            .include_router(
                Router::new("main")
                    .middleware(EventCategory::Message, tag("router"))
                    .route(Route::message().middleware(tag("route")).handler(handler)),
            )
            .build();

        dispatcher.feed(private_text(user(1), "x"), transport()).await;
        assert_eq!(
            *log.lock(),
            vec!["outer", "dispatcher", "router", "route", "handler"]
        );
    }

    #[tokio::test]
    async fn test_extracted_fields_reach_handler() {
        async fn mentions(Sender(user): Sender, usernames: Usernames) -> String {
            format!("{} mentioned {}", user.first_name, usernames.join(","))
        }

        let dispatcher = Dispatcher::builder()
            .include_router(
                Router::new("groups")
                    .route(Route::message().filter(HasUsernamesFilter).handler(mentions)),
            )
            .build();

        let event = text_with_entities(
            group(-5),
            Some(user(2)),
            "hi @alice @bob",
            vec![
                MessageEntity::new(EntityKind::Mention, 3, 6),
                MessageEntity::new(EntityKind::Mention, 10, 4),
            ],
        );
        let transport = transport();
        dispatcher.feed(event, transport.clone()).await;
        assert_eq!(
            transport.actions(),
            vec![Action::send_text(-5, "user2 mentioned alice,bob")]
        );
    }

    struct AlwaysTags;

    #[async_trait]
    impl Filter for AlwaysTags {
        async fn check(&self, _request: &DispatchRequest) -> Verdict {
            Verdict::extract("partial", true)
        }
    }

    #[tokio::test]
    async fn test_fields_of_failed_route_discarded() {
        async fn inspect(ctx: RequestContext) -> String {
            format!("partial={}", ctx.contains("partial"))
        }

        let dispatcher = Dispatcher::builder()
            .include_router(
                Router::new("main")
                    .route(
                        Route::message()
                            .filter(AlwaysTags)
                            .filter(fn_filter(|_| false))
                            .handler(pong),
                    )
                    .route(Route::message().handler(inspect)),
            )
            .build();

        let transport = transport();
        dispatcher.feed(private_text(user(1), "x"), transport.clone()).await;
        assert_eq!(transport.actions(), vec![Action::send_text(1, "partial=false")]);
    }

    #[tokio::test]
    async fn test_command_args_and_shared_state() {
        async fn greet(args: CommandArgs, Shared(prefix): Shared<String>) -> String {
            format!("{prefix} {}", args.args)
        }

        let dispatcher = Dispatcher::builder()
            .shared("hello".to_string())
            .include_router(
                Router::new("main")
                    .route(Route::message().filter(CommandFilter::new("greet")).handler(greet)),
            )
            .build();

        let transport = transport();
        dispatcher
            .feed(command(private(1), user(1), "/greet world"), transport.clone())
            .await;
        assert_eq!(transport.actions(), vec![Action::send_text(1, "hello world")]);
    }

    #[tokio::test]
    async fn test_weekend_short_circuits_before_handlers() {
        let (inner, inner_count) = counter();
        let saturday = chrono::Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap();
        let weekend = WeekendMiddleware::new("Closed").with_clock(move || saturday);

        let dispatcher = Dispatcher::builder()
            .outer_middleware(EventCategory::Message, weekend.clone())
            .outer_middleware(EventCategory::CallbackQuery, weekend)
            .inner_middleware(
                EventCategory::CallbackQuery,
                middleware_fn("inner", move |request, next| {
                    inner.fetch_add(1, Ordering::SeqCst);
                    next.run(request).boxed()
                }),
            )
            .include_router(
                Router::new("main")
                    .route(Route::message().handler(pong))
                    .route(Route::callback_query().handler(pong)),
            )
            .build();

        let transport = transport();
        let outcome = dispatcher.feed(private_text(user(1), "x"), transport.clone()).await;
        assert_eq!(outcome, Outcome::dropped("weekend"));
        assert!(transport.actions().is_empty());

        let outcome = dispatcher.feed(callback(user(1), None, "b"), transport.clone()).await;
        assert!(matches!(outcome, Outcome::Rejected { middleware: "weekend", .. }));
        assert!(matches!(
            transport.actions().as_slice(),
            [Action::AnswerCallback { show_alert: true, .. }]
        ));
        assert_eq!(inner_count(), 0);
    }
}
