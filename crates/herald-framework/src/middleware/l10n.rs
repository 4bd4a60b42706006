use std::sync::Arc;

use async_trait::async_trait;
use tracing::trace;

use super::{Middleware, Next};
use crate::context::{DispatchRequest, L10N_KEY};
use crate::error::BoxError;
use crate::l10n::{L10n, Localization};
use crate::outcome::Outcome;

/// Picks the request locale and stores an [`L10n`] handle under [`L10N_KEY`].
///
/// The sender's `language_code` wins when a matching locale is loaded;
/// otherwise the provider's default locale is used.
#[derive(Debug, Clone)]
pub struct L10nMiddleware {
    provider: Arc<Localization>,
}

impl L10nMiddleware {
    pub fn new(provider: Arc<Localization>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl Middleware for L10nMiddleware {
    fn name(&self) -> &'static str {
        "l10n"
    }

    async fn handle(&self, mut request: DispatchRequest, next: Next) -> Result<Outcome, BoxError> {
        let requested = request
            .event()
            .sender()
            .and_then(|user| user.language_code.as_deref());
        let locale = self.provider.negotiate(requested).to_string();
        trace!(locale = %locale, "Selected request locale");

        request
            .context_mut()
            .insert(L10N_KEY, L10n::new(Arc::clone(&self.provider), locale));
        next.run(request).await
    }
}
