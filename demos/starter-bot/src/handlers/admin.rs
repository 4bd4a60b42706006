//! Owner-only commands in private chats.

use std::sync::Arc;

use herald::core::{Action, Event, EventCategory, UserId};
use herald::framework::filter::{ChatTypeFilter, CommandFilter, IsOwnerFilter};
use herald::framework::l10n::FluentArgs;
use herald::framework::{
    BoxError, BoxedRepository, L10n, L10nError, Route, Router, Sender, Shared, UserRepository,
};
use tracing::info;

pub fn router(owners: &[UserId]) -> Router {
    Router::new("admin")
        .filter(EventCategory::Message, ChatTypeFilter::private())
        .filter(
            EventCategory::Message,
            IsOwnerFilter::owners(owners.iter().copied()),
        )
        .route(
            Route::message()
                .name("admin-start")
                .filter(CommandFilter::new("start"))
                .handler(start),
        )
        .route(
            Route::message()
                .name("admin-ping")
                .filter(CommandFilter::new("ping"))
                .handler(ping),
        )
        .route(
            Route::message()
                .name("admin-stats")
                .filter(CommandFilter::new("stats"))
                .handler(stats),
        )
}

async fn start(sender: Sender, l10n: L10n) -> Result<String, L10nError> {
    info!(user_id = sender.id, "Owner started bot");
    l10n.format("hello-owner")
}

async fn ping(event: Arc<Event>, l10n: L10n) -> Result<Option<Action>, L10nError> {
    Ok(event.reply(l10n.format("ping-msg")?))
}

async fn stats(l10n: L10n, repository: Shared<BoxedRepository>) -> Result<String, BoxError> {
    let users = repository.count_users().await?;

    let mut args = FluentArgs::new();
    args.set("users", users);
    Ok(l10n.format_with("stats-msg", &args)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::testing::{OWNER, dispatcher};
    use herald::core::testing::{RecordingTransport, command, private, user};
    use herald::framework::{Outcome, UserData};

    #[tokio::test]
    async fn test_owner_commands() {
        let (dispatcher, repository) = dispatcher(router(&[OWNER]));
        repository.save_user(5, UserData::new()).await.unwrap();
        let transport = Arc::new(RecordingTransport::new());

        for body in ["/start", "/ping", "/stats"] {
            let outcome = dispatcher
                .feed(command(private(OWNER), user(OWNER), body), transport.clone())
                .await;
            assert!(outcome.is_handled(), "{body}: {outcome:?}");
        }

        let texts: Vec<_> = transport
            .actions()
            .into_iter()
            .map(|action| match action {
                Action::SendText { text, .. } => text,
                other => panic!("unexpected action {other:?}"),
            })
            .collect();
        assert_eq!(
            texts,
            vec![
                "Hello, owner! The bot is up.".to_string(),
                "Up & Running!".to_string(),
                "Known users: 1".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_strangers_fall_through() {
        let (dispatcher, _) = dispatcher(router(&[OWNER]));
        let transport = Arc::new(RecordingTransport::new());

        let outcome = dispatcher
            .feed(command(private(2), user(2), "/stats"), transport.clone())
            .await;
        assert_eq!(outcome, Outcome::Unmatched);
        assert!(transport.actions().is_empty());
    }
}
