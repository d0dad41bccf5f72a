use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use crate::answer::AnswerClient;
use crate::config::Config;
use crate::platform::{IncomingMessage, OutgoingAnswer, ReplyFormat};
use crate::typing::{with_typing, TypingNotifier};

/// Relays questions to the answer API and turns the outcome into a reply.
/// Platform-agnostic: receives an IncomingMessage, returns an OutgoingAnswer.
pub struct Relay {
    answers: AnswerClient,
    config: Config,
}

impl Relay {
    pub fn new(config: Config) -> Result<Self> {
        let answers = AnswerClient::new(config.api.clone())?;
        Ok(Self { answers, config })
    }

    /// Reply to the start command
    pub fn greeting(&self) -> OutgoingAnswer {
        OutgoingAnswer {
            text: self.config.messages.greeting.clone(),
            format: ReplyFormat::Plain,
        }
    }

    /// Ask the API while the chat shows "typing...". The indicator is
    /// stopped before this returns, whatever the API outcome.
    pub async fn answer(
        &self,
        notifier: Arc<dyn TypingNotifier>,
        incoming: &IncomingMessage,
    ) -> OutgoingAnswer {
        let answer = with_typing(
            notifier,
            incoming.chat_id,
            self.config.typing.interval(),
            self.answers.ask(&incoming.text),
        )
        .await;

        info!(
            "Question from {} on {} in chat {}: {}",
            incoming.user_name,
            incoming.platform,
            incoming.chat_id,
            answer.kind()
        );

        OutgoingAnswer {
            text: answer.into_text(&self.config.messages),
            format: ReplyFormat::Markdown,
        }
    }
}
