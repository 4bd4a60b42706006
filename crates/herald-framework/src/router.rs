//! Routes and routers.
//!
//! A [`Route`] binds a handler to an event category behind an ordered list of
//! filters. Routes are grouped into named [`Router`]s, which may nest.
//! Matching is first-match-wins in registration order: a router's own routes
//! are tried first, then its children, depth first.
//!
//! Router-level filters and inner middlewares apply to the router's routes
//! and to every nested router. Ancestor filters run first and their fields
//! reach the nested routes.

use std::collections::HashMap;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::FutureExt;
use futures::future::BoxFuture;
use tower::{Service, ServiceExt};
use tracing::{debug, trace};

use crate::context::DispatchRequest;
use crate::error::BoxError;
use crate::filter::{BoxedFilter, Filter, check_all};
use crate::handler::{Handler, HandlerService};
use crate::middleware::{Endpoint, Middleware, MiddlewareChain};
use crate::outcome::Outcome;
use herald_core::EventCategory;

type EndpointFactory = Box<dyn FnOnce(Arc<str>) -> Endpoint + Send + Sync>;

// =============================================================================
// Route
// =============================================================================

/// Builder returned by [`Route::message`] and friends.
pub struct RouteBuilder {
    category: EventCategory,
    name: Option<String>,
    filters: Vec<BoxedFilter>,
    middlewares: MiddlewareChain,
}

impl RouteBuilder {
    /// Names the route; defaults to `"<router>#<index>"`.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Adds a filter. Filters are evaluated in the order they are added.
    pub fn filter<F: Filter>(mut self, filter: F) -> Self {
        self.filters.push(Arc::new(filter));
        self
    }

    /// Adds a route-level inner middleware.
    pub fn middleware<M: Middleware>(mut self, middleware: M) -> Self {
        self.middlewares.push(Arc::new(middleware));
        self
    }

    /// Binds the handler and finishes the route.
    pub fn handler<H, T>(self, handler: H) -> Route
    where
        H: Handler<T>,
        T: Send + 'static,
    {
        Route {
            category: self.category,
            name: self.name,
            filters: self.filters,
            middlewares: self.middlewares,
            endpoint: Box::new(move |name: Arc<str>| Endpoint::new(HandlerService::new(handler, name))),
        }
    }
}

/// A filter-gated handler for one event category.
pub struct Route {
    category: EventCategory,
    name: Option<String>,
    filters: Vec<BoxedFilter>,
    middlewares: MiddlewareChain,
    endpoint: EndpointFactory,
}

impl Route {
    pub fn on(category: EventCategory) -> RouteBuilder {
        RouteBuilder {
            category,
            name: None,
            filters: Vec::new(),
            middlewares: MiddlewareChain::new(),
        }
    }

    /// A route for text, media and service messages.
    pub fn message() -> RouteBuilder {
        Self::on(EventCategory::Message)
    }

    pub fn callback_query() -> RouteBuilder {
        Self::on(EventCategory::CallbackQuery)
    }

    pub fn pre_checkout_query() -> RouteBuilder {
        Self::on(EventCategory::PreCheckoutQuery)
    }

    pub fn category(&self) -> EventCategory {
        self.category
    }
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route")
            .field("category", &self.category)
            .field("name", &self.name)
            .field("filters", &self.filters.len())
            .field("middlewares", &self.middlewares)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Router
// =============================================================================

/// A named group of routes.
///
/// ```rust,ignore
/// let admin = Router::new("admin")
///     .filter(EventCategory::Message, ChatTypeFilter::private())
///     .filter(EventCategory::Message, IsOwnerFilter::owners(owners))
///     .route(Route::message().filter(CommandFilter::new("ping")).handler(ping));
/// ```
pub struct Router {
    name: String,
    filters: HashMap<EventCategory, Vec<BoxedFilter>>,
    middlewares: HashMap<EventCategory, MiddlewareChain>,
    routes: Vec<Route>,
    children: Vec<Router>,
}

impl Router {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            filters: HashMap::new(),
            middlewares: HashMap::new(),
            routes: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Adds a router-level filter, checked before each route of `category`
    /// in this router and in its nested routers.
    pub fn filter<F: Filter>(mut self, category: EventCategory, filter: F) -> Self {
        self.filters
            .entry(category)
            .or_default()
            .push(Arc::new(filter));
        self
    }

    /// Adds a router-level inner middleware for `category`.
    pub fn middleware<M: Middleware>(mut self, category: EventCategory, middleware: M) -> Self {
        self.middlewares
            .entry(category)
            .or_default()
            .push(Arc::new(middleware));
        self
    }

    pub fn route(mut self, route: Route) -> Self {
        self.routes.push(route);
        self
    }

    /// Nests `router`; it is tried after this router's own routes.
    pub fn include_router(mut self, router: Router) -> Self {
        self.children.push(router);
        self
    }

    /// Flattens the tree into per-category router lists, depth first.
    pub(crate) fn compile(
        self,
        inherited: &HashMap<EventCategory, MiddlewareChain>,
        out: &mut HashMap<EventCategory, Vec<CompiledRouter>>,
    ) {
        self.compile_nested(inherited, &HashMap::new(), out);
    }

    fn compile_nested(
        self,
        inherited: &HashMap<EventCategory, MiddlewareChain>,
        ancestor_filters: &HashMap<EventCategory, Vec<BoxedFilter>>,
        out: &mut HashMap<EventCategory, Vec<CompiledRouter>>,
    ) {
        let mut chains = inherited.clone();
        for (category, chain) in &self.middlewares {
            chains.entry(*category).or_default().extend(chain);
        }

        let mut filters = ancestor_filters.clone();
        for (category, own) in self.filters {
            filters.entry(category).or_default().extend(own);
        }

        let router_name: Arc<str> = Arc::from(self.name.as_str());
        let mut compiled: HashMap<EventCategory, CompiledRouter> = HashMap::new();

        for (index, route) in self.routes.into_iter().enumerate() {
            let name: Arc<str> = match route.name {
                Some(name) => Arc::from(name),
                None => Arc::from(format!("{}#{index}", self.name)),
            };

            let mut chain = chains.get(&route.category).cloned().unwrap_or_default();
            chain.extend(&route.middlewares);
            let endpoint = chain.wrap((route.endpoint)(Arc::clone(&name)));

            compiled
                .entry(route.category)
                .or_insert_with(|| CompiledRouter {
                    name: Arc::clone(&router_name),
                    filters: filters.get(&route.category).cloned().unwrap_or_default(),
                    routes: Vec::new(),
                })
                .routes
                .push(CompiledRoute {
                    name,
                    filters: route.filters,
                    endpoint,
                });
        }

        for (category, router) in compiled {
            out.entry(category).or_default().push(router);
        }
        for child in self.children {
            child.compile_nested(&chains, &filters, out);
        }
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("name", &self.name)
            .field("routes", &self.routes)
            .field("children", &self.children)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Compiled form
// =============================================================================

pub(crate) struct CompiledRoute {
    name: Arc<str>,
    filters: Vec<BoxedFilter>,
    endpoint: Endpoint,
}

pub(crate) struct CompiledRouter {
    name: Arc<str>,
    filters: Vec<BoxedFilter>,
    routes: Vec<CompiledRoute>,
}

/// Route resolution for one event category.
///
/// Sits between the outer middlewares and the matched route's inner chain.
#[derive(Clone)]
pub(crate) struct RouterService {
    routers: Arc<[CompiledRouter]>,
}

impl RouterService {
    pub(crate) fn new(routers: Vec<CompiledRouter>) -> Self {
        Self {
            routers: routers.into(),
        }
    }

    pub(crate) fn route_count(&self) -> usize {
        self.routers.iter().map(|r| r.routes.len()).sum()
    }

    async fn resolve(self, mut request: DispatchRequest) -> Result<Outcome, BoxError> {
        for router in self.routers.iter() {
            let Some(mut fields) = check_all(&router.filters, &request).await else {
                trace!(router = %router.name, "Router filters rejected event");
                continue;
            };

            for route in &router.routes {
                let Some(route_fields) = check_all(&route.filters, &request).await else {
                    continue;
                };
                fields.extend(route_fields);

                debug!(router = %router.name, route = %route.name, "Route matched");
                request.context_mut().extend(fields);
                return route.endpoint.clone().oneshot(request).await;
            }
        }

        debug!(event = request.event().name(), "No route matched");
        Ok(Outcome::Unmatched)
    }
}

impl Service<DispatchRequest> for RouterService {
    type Response = Outcome;
    type Error = BoxError;
    type Future = BoxFuture<'static, Result<Outcome, BoxError>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: DispatchRequest) -> Self::Future {
        self.clone().resolve(request).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{HasUsernamesFilter, IsOwnerFilter, Usernames, fn_filter};
    use herald_core::testing::{
        RecordingTransport, callback, group, private_text, text_with_entities, user,
    };
    use herald_core::{EntityKind, Event, MessageEntity};

    fn request(event: Event) -> DispatchRequest {
        DispatchRequest::new(Arc::new(event), Arc::new(RecordingTransport::new()))
    }

    fn service(routers: Vec<Router>) -> RouterService {
        let mut out = HashMap::new();
        for router in routers {
            router.compile(&HashMap::new(), &mut out);
        }
        RouterService::new(out.remove(&EventCategory::Message).unwrap_or_default())
    }

    async fn noop() {}

    #[tokio::test]
    async fn test_default_route_names() {
        let svc = service(vec![Router::new("main")
            .route(Route::message().filter(fn_filter(|_| false)).handler(noop))
            .route(Route::message().handler(noop))]);

        let outcome = svc.oneshot(request(private_text(user(1), "x"))).await.unwrap();
        assert_eq!(outcome.route(), Some("main#1"));
    }

    #[tokio::test]
    async fn test_router_filter_gates_children() {
        let svc = service(vec![
            Router::new("admin")
                .filter(EventCategory::Message, IsOwnerFilter::owners([1]))
                .route(Route::message().name("admin-route").filter(fn_filter(|_| false)).handler(noop))
                .include_router(
                    Router::new("admin-tools").route(Route::message().name("wipe").handler(noop)),
                ),
            Router::new("public").route(Route::message().name("fallback").handler(noop)),
        ]);

        let outcome = svc
            .clone()
            .oneshot(request(private_text(user(999), "x")))
            .await
            .unwrap();
        assert_eq!(outcome.route(), Some("fallback"));

        let outcome = svc.oneshot(request(private_text(user(1), "x"))).await.unwrap();
        assert_eq!(outcome.route(), Some("wipe"));
    }

    #[tokio::test]
    async fn test_ancestor_filter_fields_reach_children() {
        async fn tools(usernames: Usernames) -> String {
            usernames.join(",")
        }

        let svc = service(vec![
            Router::new("groups")
                .filter(EventCategory::Message, HasUsernamesFilter::new())
                .include_router(
                    Router::new("tools").route(Route::message().name("list").handler(tools)),
                ),
        ]);

        let event = text_with_entities(
            group(-1),
            Some(user(1)),
            "hi @alice and @bob",
            vec![
                MessageEntity::new(EntityKind::Mention, 3, 6),
                MessageEntity::new(EntityKind::Mention, 14, 4),
            ],
        );
        let outcome = svc.clone().oneshot(request(event)).await.unwrap();
        assert_eq!(outcome.route(), Some("list"));
        assert!(matches!(
            outcome.actions(),
            [herald_core::Action::SendText { text, .. }] if text == "alice,bob"
        ));

        let outcome = svc.oneshot(request(private_text(user(1), "no mentions"))).await.unwrap();
        assert_eq!(outcome, Outcome::Unmatched);
    }

    #[tokio::test]
    async fn test_own_routes_before_children() {
        let svc = service(vec![Router::new("parent")
            .include_router(Router::new("child").route(Route::message().name("child").handler(noop)))
            .route(Route::message().name("own").handler(noop))]);

        let outcome = svc.oneshot(request(private_text(user(1), "x"))).await.unwrap();
        assert_eq!(outcome.route(), Some("own"));
    }

    #[tokio::test]
    async fn test_other_category_unmatched() {
        let svc = service(vec![
            Router::new("main").route(Route::callback_query().handler(noop)),
        ]);
        assert_eq!(svc.route_count(), 0);

        let outcome = svc.oneshot(request(callback(user(1), None, "x"))).await.unwrap();
        assert_eq!(outcome, Outcome::Unmatched);
    }
}
