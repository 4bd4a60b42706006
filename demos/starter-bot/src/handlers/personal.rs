//! Commands anyone can use, in any chat.

use std::sync::Arc;

use herald::core::{Action, ContentKind, Event, UserId};
use herald::framework::filter::{CommandFilter, ContentKindFilter, IsOwnerFilter};
use herald::framework::l10n::FluentArgs;
use herald::framework::{
    BoxError, BoxedRepository, L10n, L10nError, Route, Router, Sender, Shared, UserData,
    UserRepository,
};
use tracing::debug;

pub fn router(owners: &[UserId]) -> Router {
    Router::new("personal")
        .route(
            Route::message()
                .name("start")
                .filter(CommandFilter::new("start"))
                .handler(start),
        )
        .route(
            Route::message()
                .name("owner-ping")
                .filter(IsOwnerFilter::owners(owners.iter().copied()))
                .filter(CommandFilter::new("ping"))
                .handler(ping),
        )
        .route(
            Route::message()
                .name("media-reaction")
                .filter(ContentKindFilter::new([ContentKind::Photo, ContentKind::Video]))
                .handler(media_reaction),
        )
}

/// Greets the user and remembers them.
async fn start(
    event: Arc<Event>,
    sender: Sender,
    l10n: L10n,
    repository: Shared<BoxedRepository>,
) -> Result<Option<Action>, BoxError> {
    let mut data = UserData::new();
    data.insert("first_name".into(), sender.first_name.clone().into());
    if let Some(username) = &sender.username {
        data.insert("username".into(), username.clone().into());
    }
    data.insert("locale".into(), l10n.locale().into());
    repository.save_user(sender.id, data).await?;
    debug!(user_id = sender.id, "User saved");

    let mut args = FluentArgs::new();
    args.set("name", sender.full_name());
    Ok(event.answer(l10n.format_with("start-greeting", &args)?))
}

async fn ping(event: Arc<Event>, l10n: L10n) -> Result<Option<Action>, L10nError> {
    Ok(event.reply(l10n.format("ping-msg")?))
}

async fn media_reaction(event: Arc<Event>, l10n: L10n) -> Result<Option<Action>, L10nError> {
    Ok(event.reply(l10n.format("media-reaction")?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::testing::{OWNER, dispatcher};
    use herald::core::MediaKind;
    use herald::core::testing::{RecordingTransport, command, group, media, private, user};
    use herald::framework::Outcome;
    use serde_json::json;

    #[tokio::test]
    async fn test_start_upserts_user() {
        let (dispatcher, repository) = dispatcher(router(&[OWNER]));
        let transport = Arc::new(RecordingTransport::new());

        let mut sender = user(7);
        sender.language_code = Some("ru".into());
        let outcome = dispatcher
            .feed(command(private(7), sender, "/start"), transport.clone())
            .await;
        assert_eq!(outcome.route(), Some("start"));

        let stored = repository.get_user(7).await.unwrap().unwrap();
        assert_eq!(stored["user_id"], json!(7));
        assert_eq!(stored["first_name"], json!("user7"));
        assert_eq!(stored["locale"], json!("ru"));

        assert!(matches!(
            transport.actions().as_slice(),
            [Action::SendText { text, .. }] if text == "Привет, user7!"
        ));
    }

    #[tokio::test]
    async fn test_ping_is_owner_only() {
        let (dispatcher, _) = dispatcher(router(&[OWNER]));
        let transport = Arc::new(RecordingTransport::new());

        let outcome = dispatcher
            .feed(command(group(-1), user(OWNER), "/ping"), transport.clone())
            .await;
        assert_eq!(outcome.route(), Some("owner-ping"));

        let outcome = dispatcher
            .feed(command(group(-1), user(2), "/ping"), transport.clone())
            .await;
        assert_eq!(outcome, Outcome::Unmatched);
    }

    #[tokio::test]
    async fn test_media_reaction() {
        let (dispatcher, _) = dispatcher(router(&[OWNER]));
        let transport = Arc::new(RecordingTransport::new());

        let video = media(private(3), user(3), MediaKind::Video);
        assert_eq!(
            dispatcher.feed(video, transport.clone()).await.route(),
            Some("media-reaction")
        );

        let sticker = media(private(3), user(3), MediaKind::Sticker);
        assert_eq!(dispatcher.feed(sticker, transport.clone()).await, Outcome::Unmatched);
    }
}
