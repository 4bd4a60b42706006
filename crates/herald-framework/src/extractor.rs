//! Extractor system for the Herald framework.
//!
//! This module provides the [`FromRequest`] trait, which defines how types
//! can be extracted from a [`DispatchRequest`] for use as handler parameters.

use std::ops::Deref;
use std::sync::Arc;

use crate::context::{DispatchRequest, RequestContext};
use crate::error::{ExtractError, ExtractResult};
use herald_core::{BoxedTransport, Event, User};

/// A trait for types that can be extracted from a [`DispatchRequest`].
///
/// Types implementing this trait can be used directly as handler function
/// parameters. If extraction fails the handler is not called and the
/// dispatch is reported as failed.
///
/// # Example
///
/// ```rust,ignore
/// use herald_framework::{DispatchRequest, ExtractError, FromRequest};
///
/// struct CallbackData(String);
///
/// impl FromRequest for CallbackData {
///     fn from_request(request: &DispatchRequest) -> Result<Self, ExtractError> {
///         request
///             .event()
///             .callback_data()
///             .map(|data| CallbackData(data.to_string()))
///             .ok_or_else(|| ExtractError::custom("not a callback query"))
///     }
/// }
/// ```
pub trait FromRequest: Sized {
    /// Attempts to extract this type from the given request.
    fn from_request(request: &DispatchRequest) -> ExtractResult<Self>;
}

/// The event being dispatched.
impl FromRequest for Arc<Event> {
    fn from_request(request: &DispatchRequest) -> ExtractResult<Self> {
        Ok(Arc::clone(request.event()))
    }
}

/// The transport, for handlers that talk to the platform directly.
impl FromRequest for BoxedTransport {
    fn from_request(request: &DispatchRequest) -> ExtractResult<Self> {
        Ok(Arc::clone(request.transport()))
    }
}

/// A snapshot of the request context.
impl FromRequest for RequestContext {
    fn from_request(request: &DispatchRequest) -> ExtractResult<Self> {
        Ok(request.context().clone())
    }
}

/// Optional parameters never fail.
impl<T: FromRequest> FromRequest for Option<T> {
    fn from_request(request: &DispatchRequest) -> ExtractResult<Self> {
        Ok(T::from_request(request).ok())
    }
}

// =============================================================================
// Sender
// =============================================================================

/// The user who caused the event. Fails for events without a sender.
#[derive(Debug, Clone)]
pub struct Sender(pub User);

impl Deref for Sender {
    type Target = User;

    fn deref(&self) -> &User {
        &self.0
    }
}

impl FromRequest for Sender {
    fn from_request(request: &DispatchRequest) -> ExtractResult<Self> {
        let event = request.event();
        event
            .sender()
            .cloned()
            .map(Sender)
            .ok_or(ExtractError::MissingSender {
                event: event.name(),
            })
    }
}

// =============================================================================
// Shared
// =============================================================================

/// A value registered once on the dispatcher and seeded into every request.
///
/// ```rust,ignore
/// let dispatcher = Dispatcher::builder()
///     .shared(repository.clone())
///     .build();
///
/// async fn count(Shared(repo): Shared<BoxedRepository>) -> Result<String, StorageError> {
///     Ok(repo.count_users().await?.to_string())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Shared<T>(pub T);

impl<T> Shared<T> {
    /// Context key a shared value of type `T` is stored under.
    pub fn key() -> &'static str {
        std::any::type_name::<T>()
    }
}

impl<T> Deref for Shared<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T: Clone + Send + Sync + 'static> FromRequest for Shared<T> {
    fn from_request(request: &DispatchRequest) -> ExtractResult<Self> {
        request
            .context()
            .try_get::<T>(Self::key())
            .map(|value| Shared(value.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use herald_core::testing::{RecordingTransport, group, text, user};

    fn request(event: Event) -> DispatchRequest {
        DispatchRequest::new(Arc::new(event), Arc::new(RecordingTransport::new()))
    }

    #[test]
    fn test_sender_required() {
        let with_sender = request(text(group(-1), Some(user(5)), "hi"));
        assert_eq!(Sender::from_request(&with_sender).unwrap().id, 5);

        let anonymous = request(text(group(-1), None, "hi"));
        assert!(matches!(
            Sender::from_request(&anonymous),
            Err(ExtractError::MissingSender { .. })
        ));
        assert!(Option::<Sender>::from_request(&anonymous).unwrap().is_none());
    }

    #[test]
    fn test_shared_lookup_by_type() {
        let mut req = request(text(group(-1), None, "hi"));
        req.context_mut()
            .insert(Shared::<Vec<i64>>::key(), vec![1i64, 2]);

        let Shared(owners) = Shared::<Vec<i64>>::from_request(&req).unwrap();
        assert_eq!(owners, vec![1, 2]);
        assert!(Shared::<String>::from_request(&req).is_err());
    }
}
