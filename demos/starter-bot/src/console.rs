//! A console transport: events in as JSON lines on stdin, actions out as
//! JSON lines on stdout.
//!
//! ```text
//! $ echo '{"type":"text","message_id":1,"chat":{"id":1,"kind":"private"},"from":{"id":1,"first_name":"Ann"},"text":"/start","entities":[{"type":"bot_command","offset":0,"length":6}]}' | starter-bot
//! {"method":"send_text","chat_id":1,"text":"Hello, owner! The bot is up."}
//! ```

use std::collections::HashSet;

use async_trait::async_trait;
use futures::Stream;
use herald::core::{
    Action, ChatId, ChatMember, Event, MemberStatus, MessageId, Transport, TransportError,
    TransportResult, UserId,
};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Stdout};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Prints every action as one JSON line.
///
/// Membership lookups report the configured admins as administrators and
/// everybody else as a plain member.
pub struct ConsoleTransport {
    out: Mutex<Stdout>,
    admins: HashSet<UserId>,
}

impl ConsoleTransport {
    pub fn new(admins: impl IntoIterator<Item = UserId>) -> Self {
        Self {
            out: Mutex::new(tokio::io::stdout()),
            admins: admins.into_iter().collect(),
        }
    }

    async fn print(&self, action: Action) -> TransportResult<()> {
        let mut line = serde_json::to_string(&action)
            .map_err(|e| TransportError::request_failed(action.name(), e.to_string()))?;
        line.push('\n');

        let mut out = self.out.lock().await;
        out.write_all(line.as_bytes()).await?;
        out.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl Transport for ConsoleTransport {
    async fn send_text(
        &self,
        chat_id: ChatId,
        text: &str,
        reply_to: Option<MessageId>,
    ) -> TransportResult<()> {
        self.print(Action::SendText {
            chat_id,
            text: text.to_string(),
            reply_to,
        })
        .await
    }

    async fn delete_message(&self, chat_id: ChatId, message_id: MessageId) -> TransportResult<()> {
        self.print(Action::delete_message(chat_id, message_id)).await
    }

    async fn answer_callback(
        &self,
        callback_id: &str,
        text: Option<&str>,
        show_alert: bool,
    ) -> TransportResult<()> {
        self.print(Action::AnswerCallback {
            callback_id: callback_id.to_string(),
            text: text.map(str::to_string),
            show_alert,
        })
        .await
    }

    async fn answer_pre_checkout(
        &self,
        query_id: &str,
        ok: bool,
        error_message: Option<&str>,
    ) -> TransportResult<()> {
        self.print(Action::AnswerPreCheckout {
            query_id: query_id.to_string(),
            ok,
            error_message: error_message.map(str::to_string),
        })
        .await
    }

    async fn get_chat_member(&self, chat_id: ChatId, user_id: UserId) -> TransportResult<ChatMember> {
        let status = if self.admins.contains(&user_id) {
            MemberStatus::Administrator
        } else {
            MemberStatus::Member
        };
        debug!(chat_id, user_id, ?status, "Console membership lookup");
        Ok(ChatMember::new(user_id, status).with_restrict(status == MemberStatus::Administrator))
    }
}

/// Events read from stdin, one JSON object per line, until EOF.
///
/// Blank lines are skipped; malformed lines are logged and skipped.
pub fn events() -> impl Stream<Item = Event> {
    let lines = BufReader::new(tokio::io::stdin()).lines();

    futures::stream::unfold(lines, |mut lines| async move {
        loop {
            match lines.next_line().await {
                Ok(Some(line)) if line.trim().is_empty() => continue,
                Ok(Some(line)) => match parse_event(&line) {
                    Ok(event) => return Some((event, lines)),
                    Err(e) => warn!(error = %e, "Skipping malformed event"),
                },
                Ok(None) => return None,
                Err(e) => {
                    warn!(error = %e, "Failed to read stdin");
                    return None;
                }
            }
        }
    })
}

fn parse_event(line: &str) -> serde_json::Result<Event> {
    serde_json::from_str(line.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_callback_line() {
        let event = parse_event(
            r#" {"type":"callback_query","id":"cb-1","from":{"id":9,"first_name":"Cy"},"data":"stats"} "#,
        )
        .unwrap();
        assert_eq!(event.callback_data(), Some("stats"));
    }

    #[test]
    fn test_parse_rejects_unknown_type() {
        assert!(parse_event(r#"{"type":"poll"}"#).is_err());
    }

    #[tokio::test]
    async fn test_admins_can_restrict() {
        let transport = ConsoleTransport::new([7]);
        let admin = transport.get_chat_member(-1, 7).await.unwrap();
        assert!(admin.is_admin());
        assert!(admin.can_restrict_members);

        let member = transport.get_chat_member(-1, 8).await.unwrap();
        assert!(!member.is_admin());
    }
}
