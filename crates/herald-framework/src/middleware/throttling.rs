use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::{Middleware, Next};
use crate::context::DispatchRequest;
use crate::error::BoxError;
use crate::outcome::Outcome;
use crate::rate_limit::RateLimiter;

/// Aborts the chain for users that were admitted less than one window ago.
///
/// Events without a sender always pass. Clones share the same limiter, so one
/// instance can be registered for several event categories.
#[derive(Debug, Clone)]
pub struct ThrottlingMiddleware {
    limiter: Arc<RateLimiter>,
    message: Option<String>,
}

impl ThrottlingMiddleware {
    pub fn new(limiter: Arc<RateLimiter>) -> Self {
        Self {
            limiter,
            message: None,
        }
    }

    /// Text sent to throttled users (as a chat message or a callback toast).
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }
}

#[async_trait]
impl Middleware for ThrottlingMiddleware {
    fn name(&self) -> &'static str {
        "throttling"
    }

    async fn handle(&self, request: DispatchRequest, next: Next) -> Result<Outcome, BoxError> {
        let Some(user_id) = request.event().sender().map(|user| user.id) else {
            return next.run(request).await;
        };

        if self.limiter.admit(user_id) {
            return next.run(request).await;
        }

        debug!(user_id, "Throttled");
        let actions = self
            .message
            .as_ref()
            .and_then(|message| request.event().answer(message.as_str()))
            .into_iter()
            .collect();
        Ok(Outcome::rejected(self.name(), actions))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::MiddlewareChain;
    use herald_core::testing::{RecordingTransport, callback, group, private_text, text, user};
    use herald_core::{Action, Event};
    use std::time::Duration;
    use tower::{ServiceExt, service_fn};

    async fn run(middleware: &ThrottlingMiddleware, event: Event) -> Outcome {
        let mut chain = MiddlewareChain::new();
        chain.push(Arc::new(middleware.clone()));
        let endpoint = service_fn(|_req: DispatchRequest| async {
            Ok::<_, BoxError>(Outcome::handled("ok", Vec::new()))
        });
        let request = DispatchRequest::new(Arc::new(event), Arc::new(RecordingTransport::new()));
        chain.wrap(endpoint).oneshot(request).await.unwrap()
    }

    fn throttle() -> ThrottlingMiddleware {
        ThrottlingMiddleware::new(Arc::new(RateLimiter::new(Duration::from_secs(1), 100)))
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_event_rejected_silently() {
        let mw = throttle();
        assert!(run(&mw, private_text(user(1), "a")).await.is_handled());
        assert_eq!(
            run(&mw, private_text(user(1), "b")).await,
            Outcome::dropped("throttling")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttle_message_emitted() {
        let mw = throttle().with_message("Slow down");
        run(&mw, private_text(user(1), "a")).await;

        let outcome = run(&mw, private_text(user(1), "b")).await;
        assert_eq!(outcome.actions(), &[Action::send_text(1, "Slow down")]);

        let outcome = run(&mw, callback(user(1), None, "x")).await;
        assert!(matches!(
            outcome.actions(),
            [Action::AnswerCallback { show_alert: false, .. }]
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_anonymous_events_pass() {
        let mw = throttle();
        assert!(run(&mw, text(group(-1), None, "a")).await.is_handled());
        assert!(run(&mw, text(group(-1), None, "b")).await.is_handled());
    }
}
