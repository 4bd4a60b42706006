//! Group housekeeping.
//!
//! Reading ordinary group messages requires the bot's group privacy mode to
//! be disabled on the platform side.

use std::sync::Arc;

use herald::core::{Action, ContentKind, Event, EventCategory};
use herald::framework::filter::{ChatTypeFilter, ContentKindFilter, HasUsernamesFilter, Usernames};
use herald::framework::l10n::FluentArgs;
use herald::framework::{L10n, L10nError, Route, Router};

pub fn router() -> Router {
    Router::new("groups")
        .filter(EventCategory::Message, ChatTypeFilter::groups())
        .route(
            Route::message()
                .name("remove-join-leave")
                .filter(ContentKindFilter::new([
                    ContentKind::NewChatMembers,
                    ContentKind::LeftChatMember,
                ]))
                .handler(remove_service_message),
        )
        .route(
            Route::message()
                .name("found-usernames")
                .filter(HasUsernamesFilter::new())
                .handler(found_usernames),
        )
}

/// Deletes "user joined" and "user left" notices.
async fn remove_service_message(event: Arc<Event>) -> Option<Action> {
    event.delete()
}

async fn found_usernames(
    event: Arc<Event>,
    usernames: Usernames,
    l10n: L10n,
) -> Result<Option<Action>, L10nError> {
    let mut args = FluentArgs::new();
    args.set("usernames", usernames.join(", "));
    Ok(event.reply(l10n.format_with("found-usernames", &args)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::testing::dispatcher;
    use herald::core::testing::{
        RecordingTransport, group, service, supergroup, text, text_with_entities, user,
    };
    use herald::core::{EntityKind, MessageEntity, ServiceAction};
    use herald::framework::Outcome;

    #[tokio::test]
    async fn test_join_and_leave_are_deleted() {
        let (dispatcher, _) = dispatcher(router());
        let transport = Arc::new(RecordingTransport::new());

        let joined = service(
            group(-10),
            Some(user(3)),
            ServiceAction::MembersJoined {
                members: vec![user(3)],
            },
        );
        let left = service(group(-10), None, ServiceAction::MemberLeft { member: user(4) });
        let pinned = service(
            group(-10),
            Some(user(3)),
            ServiceAction::MessagePinned { message_id: 1 },
        );

        assert!(dispatcher.feed(joined, transport.clone()).await.is_handled());
        assert!(dispatcher.feed(left, transport.clone()).await.is_handled());
        assert_eq!(dispatcher.feed(pinned, transport.clone()).await, Outcome::Unmatched);

        let actions = transport.actions();
        assert_eq!(actions.len(), 2);
        assert!(actions.iter().all(|a| matches!(a, Action::DeleteMessage { chat_id: -10, .. })));
    }

    #[tokio::test]
    async fn test_mentions_are_listed() {
        let (dispatcher, _) = dispatcher(router());
        let transport = Arc::new(RecordingTransport::new());

        let event = text_with_entities(
            supergroup(-20),
            Some(user(3)),
            "ping @alice and @bob",
            vec![
                MessageEntity::new(EntityKind::Mention, 5, 6),
                MessageEntity::new(EntityKind::Bold, 12, 3),
                MessageEntity::new(EntityKind::Mention, 16, 4),
            ],
        );
        assert!(dispatcher.feed(event, transport.clone()).await.is_handled());

        let plain = text(supergroup(-20), Some(user(3)), "no mentions");
        assert_eq!(dispatcher.feed(plain, transport.clone()).await, Outcome::Unmatched);

        assert!(matches!(
            transport.actions().as_slice(),
            [Action::SendText { text, reply_to: Some(_), .. }] if text == "Found usernames: alice, bob"
        ));
    }
}
