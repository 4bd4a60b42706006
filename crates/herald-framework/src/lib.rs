//! # Herald Framework
//!
//! The event-dispatch pipeline of the Herald bot framework.
//!
//! This layer provides:
//! - [`Dispatcher`]: routes an [`Event`](herald_core::Event) through outer
//!   middlewares, a filter-gated router tree and inner middlewares to exactly
//!   one handler
//! - [`Filter`]s for chat type, ownership, admin rights, restrict rights,
//!   mentioned usernames, commands and content kinds
//! - [`Middleware`]s for localization, throttling and weekend black-outs, all
//!   compiled into tower services at build time
//! - Axum-style [`Handler`]s with [`FromRequest`] extractors
//! - A per-user [`RateLimiter`], a Fluent-based [`Localization`] provider and
//!   the [`UserRepository`] storage abstraction
//!
//! ```rust,ignore
//! use herald_framework::{Dispatcher, Route, Router};
//! use herald_framework::filter::{ChatTypeFilter, CommandFilter};
//!
//! async fn start(l10n: L10n) -> Result<String, L10nError> {
//!     l10n.format("hello")
//! }
//!
//! let dispatcher = Dispatcher::builder()
//!     .include_router(
//!         Router::new("personal").route(
//!             Route::message()
//!                 .filter(ChatTypeFilter::private())
//!                 .filter(CommandFilter::new("start"))
//!                 .handler(start),
//!         ),
//!     )
//!     .build();
//! ```

pub mod context;
pub mod dispatcher;
pub mod error;
pub mod extractor;
pub mod filter;
pub mod handler;
pub mod l10n;
pub mod middleware;
pub mod outcome;
pub mod rate_limit;
pub mod router;
pub mod storage;

pub use context::{ContextValue, DispatchRequest, RequestContext};
pub use dispatcher::{Dispatcher, DispatcherBuilder};
pub use error::{BoxError, ExtractError, ExtractResult};
pub use extractor::{FromRequest, Sender, Shared};
pub use filter::{BoxedFilter, Filter, Verdict};
pub use handler::{Handler, HandlerService, IntoActions};
pub use l10n::{L10n, L10nError, Localization};
pub use middleware::{Middleware, MiddlewareChain, Next};
pub use outcome::Outcome;
pub use rate_limit::RateLimiter;
pub use router::{Route, RouteBuilder, Router};
pub use storage::{
    BoxedRepository, MemoryRepository, StorageError, StorageResult, UserData, UserRepository,
};

#[cfg(feature = "sqlite")]
pub use storage::SqliteRepository;
