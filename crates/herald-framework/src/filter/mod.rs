//! Filter predicates.
//!
//! A [`Filter`] decides whether a route applies to an event. Filters may also
//! extract fields ([`Verdict::Extract`]) which are merged into the request
//! context once the whole route matches.
//!
//! A route matches when every filter accepts. Filters run left to right and
//! evaluation stops at the first rejection, so cheap filters should come
//! first and membership lookups last.
//!
//! ```rust,ignore
//! use herald_framework::filter::{ChatTypeFilter, IsAdminFilter, fn_filter};
//!
//! Route::message()
//!     .filter(ChatTypeFilter::groups())
//!     .filter(fn_filter(|event| event.text().is_some_and(|t| t.starts_with("!ban"))))
//!     .filter(IsAdminFilter::new(true))
//!     .handler(ban);
//! ```

mod admin;
mod chat_type;
mod command;
mod content;
mod owner;
mod usernames;

use std::any::Any;
use std::sync::Arc;

use async_trait::async_trait;

use crate::context::{ContextValue, DispatchRequest};
use herald_core::Event;

pub use admin::{IsAdminFilter, MemberCanRestrictFilter};
pub use chat_type::ChatTypeFilter;
pub use command::{CommandArgs, CommandFilter};
pub use content::ContentKindFilter;
pub use owner::IsOwnerFilter;
pub use usernames::{HasUsernamesFilter, Usernames};

/// The answer of a [`Filter`].
#[derive(Clone)]
pub enum Verdict {
    /// The event does not match.
    Reject,
    /// The event matches.
    Accept,
    /// The event matches; the fields are merged into the request context
    /// if the whole route matches.
    Extract(Vec<(String, ContextValue)>),
}

impl Verdict {
    /// A match carrying a single extracted field.
    pub fn extract<T: Any + Send + Sync>(key: impl Into<String>, value: T) -> Self {
        Self::Extract(vec![(key.into(), Arc::new(value))])
    }

    pub fn is_match(&self) -> bool {
        !matches!(self, Self::Reject)
    }
}

impl From<bool> for Verdict {
    fn from(matched: bool) -> Self {
        if matched { Self::Accept } else { Self::Reject }
    }
}

impl std::fmt::Debug for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Reject => f.write_str("Reject"),
            Self::Accept => f.write_str("Accept"),
            Self::Extract(fields) => f
                .debug_tuple("Extract")
                .field(&fields.iter().map(|(k, _)| k.as_str()).collect::<Vec<_>>())
                .finish(),
        }
    }
}

/// A predicate over an incoming event.
#[async_trait]
pub trait Filter: Send + Sync + 'static {
    /// Checks the request. I/O failures must be reported as [`Verdict::Reject`].
    async fn check(&self, request: &DispatchRequest) -> Verdict;
}

/// A shared, type-erased filter.
pub type BoxedFilter = Arc<dyn Filter>;

// =============================================================================
// FnFilter
// =============================================================================

/// A filter built from a synchronous closure over the event.
#[derive(Clone)]
pub struct FnFilter<F>(F);

/// Wraps a closure as a [`Filter`].
pub fn fn_filter<F>(f: F) -> FnFilter<F>
where
    F: Fn(&Event) -> bool + Send + Sync + 'static,
{
    FnFilter(f)
}

#[async_trait]
impl<F> Filter for FnFilter<F>
where
    F: Fn(&Event) -> bool + Send + Sync + 'static,
{
    async fn check(&self, request: &DispatchRequest) -> Verdict {
        (self.0)(request.event()).into()
    }
}

// =============================================================================
// Conjunction
// =============================================================================

/// Evaluates `filters` as a conjunction.
///
/// Returns the collected extracted fields when every filter accepts, `None`
/// at the first rejection.
pub(crate) async fn check_all(
    filters: &[BoxedFilter],
    request: &DispatchRequest,
) -> Option<Vec<(String, ContextValue)>> {
    let mut fields = Vec::new();
    for filter in filters {
        match filter.check(request).await {
            Verdict::Reject => return None,
            Verdict::Accept => {}
            Verdict::Extract(extracted) => fields.extend(extracted),
        }
    }
    Some(fields)
}
