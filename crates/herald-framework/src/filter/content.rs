use async_trait::async_trait;

use super::{Filter, Verdict};
use crate::context::DispatchRequest;
use herald_core::ContentKind;

/// Matches message-category events whose content kind is in the set.
#[derive(Debug, Clone)]
pub struct ContentKindFilter {
    kinds: Vec<ContentKind>,
}

impl ContentKindFilter {
    pub fn new(kinds: impl IntoIterator<Item = ContentKind>) -> Self {
        Self {
            kinds: kinds.into_iter().collect(),
        }
    }
}

#[async_trait]
impl Filter for ContentKindFilter {
    async fn check(&self, request: &DispatchRequest) -> Verdict {
        request
            .event()
            .content_kind()
            .is_some_and(|kind| self.kinds.contains(&kind))
            .into()
    }
}
