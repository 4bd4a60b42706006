//! # Herald
//!
//! An event-dispatch framework for chat bots.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   ┌──────────────┐   ┌───────────────────┐   ┌─────────┐   ┌───────────────────┐   ┌─────────┐
//! │ Transport │──▶│ DispatchCore │──▶│ outer middlewares │──▶│ routers │──▶│ inner middlewares │──▶│ handler │
//! └───────────┘   │ (per-chat    │   │ weekend, l10n,    │   │ filters │   └───────────────────┘   └─────────┘
//!       ▲         │  ordering)   │   │ throttling        │   └─────────┘                                │
//!       │         └──────────────┘   └───────────────────┘                                              │
//!       └──────────────────────────────────── actions ◀─────────────────────────────────────────────────┘
//! ```
//!
//! - **Core** ([`core`]): the event model, outbound actions and the
//!   [`Transport`](herald_core::Transport) contract
//! - **Framework** ([`framework`]): filters, middlewares, routers, the
//!   dispatcher, localization, rate limiting and user storage
//! - **Runtime** ([`runtime`]): configuration, logging and the event loop
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use herald::prelude::*;
//!
//! async fn start(l10n: L10n) -> Result<String, L10nError> {
//!     l10n.format("start-greeting")
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = HeraldRuntime::builder().build().await?;
//!     let dispatcher = runtime
//!         .dispatcher()
//!         .include_router(
//!             Router::new("personal").route(
//!                 Route::message()
//!                     .filter(ChatTypeFilter::private())
//!                     .filter(CommandFilter::new("start"))
//!                     .handler(start),
//!             ),
//!         )
//!         .build();
//!
//!     runtime.core(dispatcher, transport).run(events).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `toml-config` (default), `yaml-config`: configuration file formats
//! - `json-log`: JSON log renderer
//! - `sqlite`: SQLite-backed user repository
//! - `testing`: recording transport and event fixtures

pub use herald_core as core;
pub use herald_framework as framework;
pub use herald_runtime as runtime;

/// Commonly used types for building bots.
///
/// ```rust,ignore
/// use herald::prelude::*;
/// ```
pub mod prelude {
    // Runtime - main entry point
    pub use herald_runtime::{DispatchCore, HeraldConfig, HeraldRuntime, RuntimeError};

    // Event model and outbound actions
    pub use herald_core::{
        Action, BoxedTransport, Chat, ChatKind, ContentKind, Event, EventCategory, ServiceAction,
        Transport, TransportError, User, UserId,
    };

    // Routing
    pub use herald_framework::{Dispatcher, Outcome, Route, Router};

    // Filters
    pub use herald_framework::filter::{
        ChatTypeFilter, CommandArgs, CommandFilter, ContentKindFilter, HasUsernamesFilter,
        IsAdminFilter, IsOwnerFilter, MemberCanRestrictFilter, Usernames,
    };

    // Middlewares
    pub use herald_framework::Middleware;
    pub use herald_framework::middleware::{
        L10nMiddleware, ThrottlingMiddleware, WeekendMiddleware,
    };

    // Extractors and handler return types
    pub use herald_framework::{
        BoxedRepository, FromRequest, IntoActions, L10n, L10nError, Sender, Shared, UserData,
        UserRepository,
    };

    // Logging macros
    pub use herald_runtime::prelude::*;
}
