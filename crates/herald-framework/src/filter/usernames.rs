use std::ops::Deref;

use async_trait::async_trait;

use super::{Filter, Verdict};
use crate::context::{DispatchRequest, USERNAMES_KEY};
use crate::error::ExtractResult;
use crate::extractor::FromRequest;
use herald_core::EntityKind;

/// Usernames mentioned in a message, without the leading `@`.
///
/// Stored under [`USERNAMES_KEY`] by [`HasUsernamesFilter`] and usable as a
/// handler parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Usernames(pub Vec<String>);

impl Deref for Usernames {
    type Target = [String];

    fn deref(&self) -> &[String] {
        &self.0
    }
}

impl FromRequest for Usernames {
    fn from_request(request: &DispatchRequest) -> ExtractResult<Self> {
        request
            .context()
            .try_get::<Usernames>(USERNAMES_KEY)
            .cloned()
    }
}

/// Matches messages with at least one `@username` mention and extracts them.
#[derive(Debug, Clone, Copy, Default)]
pub struct HasUsernamesFilter;

impl HasUsernamesFilter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Filter for HasUsernamesFilter {
    async fn check(&self, request: &DispatchRequest) -> Verdict {
        let event = request.event();
        let Some(text) = event.text() else {
            return Verdict::Reject;
        };

        let found: Vec<String> = event
            .entities()
            .iter()
            .filter(|entity| entity.kind == EntityKind::Mention)
            .filter_map(|entity| entity.extract_from(text))
            .map(|mention| mention.trim_start_matches('@').to_string())
            .collect();

        if found.is_empty() {
            Verdict::Reject
        } else {
            Verdict::extract(USERNAMES_KEY, Usernames(found))
        }
    }
}
