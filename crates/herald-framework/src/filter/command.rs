use async_trait::async_trait;

use super::{Filter, Verdict};
use crate::context::{COMMAND_KEY, DispatchRequest};
use crate::error::ExtractResult;
use crate::extractor::FromRequest;

/// A parsed command, e.g. `/ban@herald_bot 42 spam`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandArgs {
    /// Command name without prefix or mention (`ban`).
    pub command: String,
    /// Bot username the command was addressed to (`herald_bot`).
    pub mention: Option<String>,
    /// Everything after the command word, trimmed (`42 spam`).
    pub args: String,
}

impl CommandArgs {
    /// Whitespace-separated arguments.
    pub fn split(&self) -> impl Iterator<Item = &str> {
        self.args.split_whitespace()
    }

    fn parse(text: &str, prefix: char) -> Option<Self> {
        let rest = text.strip_prefix(prefix)?;
        let (word, args) = match rest.split_once(char::is_whitespace) {
            Some((word, args)) => (word, args.trim()),
            None => (rest, ""),
        };
        let (command, mention) = match word.split_once('@') {
            Some((command, mention)) => (command, Some(mention.to_string())),
            None => (word, None),
        };
        if command.is_empty() {
            return None;
        }
        Some(Self {
            command: command.to_string(),
            mention,
            args: args.to_string(),
        })
    }
}

impl FromRequest for CommandArgs {
    fn from_request(request: &DispatchRequest) -> ExtractResult<Self> {
        request.context().try_get::<CommandArgs>(COMMAND_KEY).cloned()
    }
}

/// Matches `/command` messages and extracts [`CommandArgs`].
#[derive(Debug, Clone)]
pub struct CommandFilter {
    commands: Vec<String>,
    prefix: char,
    ignore_case: bool,
    bot_username: Option<String>,
}

impl CommandFilter {
    pub fn new(command: impl Into<String>) -> Self {
        Self::any([command])
    }

    /// Matches any of the given command names.
    pub fn any<I, S>(commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            commands: commands.into_iter().map(Into::into).collect(),
            prefix: '/',
            ignore_case: false,
            bot_username: None,
        }
    }

    pub fn prefix(mut self, prefix: char) -> Self {
        self.prefix = prefix;
        self
    }

    pub fn ignore_case(mut self, ignore_case: bool) -> Self {
        self.ignore_case = ignore_case;
        self
    }

    /// Rejects commands addressed to another bot (`/start@other_bot`).
    pub fn bot_username(mut self, username: impl Into<String>) -> Self {
        self.bot_username = Some(username.into());
        self
    }

    fn matches_name(&self, name: &str) -> bool {
        self.commands.iter().any(|c| {
            if self.ignore_case {
                c.eq_ignore_ascii_case(name)
            } else {
                c == name
            }
        })
    }
}

#[async_trait]
impl Filter for CommandFilter {
    async fn check(&self, request: &DispatchRequest) -> Verdict {
        let Some(parsed) = request
            .event()
            .text()
            .and_then(|text| CommandArgs::parse(text, self.prefix))
        else {
            return Verdict::Reject;
        };

        if !self.matches_name(&parsed.command) {
            return Verdict::Reject;
        }
        if let (Some(expected), Some(mention)) = (&self.bot_username, &parsed.mention) {
            if !expected.eq_ignore_ascii_case(mention) {
                return Verdict::Reject;
            }
        }
        Verdict::extract(COMMAND_KEY, parsed)
    }
}
