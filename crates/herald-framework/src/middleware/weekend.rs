use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Utc, Weekday};
use tracing::debug;

use super::{Middleware, Next};
use crate::context::DispatchRequest;
use crate::error::BoxError;
use crate::outcome::Outcome;
use herald_core::Event;

type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Whether `now` falls on a Saturday or Sunday (UTC).
pub fn is_weekend(now: DateTime<Utc>) -> bool {
    matches!(now.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Turns the bot off on weekends.
///
/// Messages are dropped silently, callback queries get `alert` as a modal
/// answer. Other events are dropped.
#[derive(Clone)]
pub struct WeekendMiddleware {
    alert: String,
    clock: Clock,
}

impl WeekendMiddleware {
    pub fn new(alert: impl Into<String>) -> Self {
        Self {
            alert: alert.into(),
            clock: Arc::new(Utc::now),
        }
    }

    /// Replaces the wall clock.
    pub fn with_clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> DateTime<Utc> + Send + Sync + 'static,
    {
        self.clock = Arc::new(clock);
        self
    }
}

impl std::fmt::Debug for WeekendMiddleware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeekendMiddleware")
            .field("alert", &self.alert)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Middleware for WeekendMiddleware {
    fn name(&self) -> &'static str {
        "weekend"
    }

    async fn handle(&self, request: DispatchRequest, next: Next) -> Result<Outcome, BoxError> {
        if !is_weekend((self.clock)()) {
            return next.run(request).await;
        }

        debug!(event = request.event().name(), "Weekend, event ignored");
        let actions = match request.event().as_ref() {
            Event::CallbackQuery(_) => request.event().alert(self.alert.as_str()).into_iter().collect(),
            _ => Vec::new(),
        };
        Ok(Outcome::rejected(self.name(), actions))
    }
}
