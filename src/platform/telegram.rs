use std::sync::Arc;

use anyhow::Result;
use futures::future::BoxFuture;
use teloxide::dispatching::UpdateHandler;
use teloxide::error_handlers::ErrorHandler;
use teloxide::prelude::*;
use teloxide::types::{Me, ParseMode};
use teloxide::{ApiError, RequestError};
use tracing::{debug, error, info, warn};

use crate::platform::{split_message, IncomingMessage, OutgoingAnswer, ReplyFormat};
use crate::relay::Relay;
use crate::typing::TypingNotifier;

/// Telegram rejects messages above 4096 chars
const MAX_MESSAGE_LEN: usize = 4000;

/// What to do with an incoming text message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Start,
    Question(String),
}

/// Classify message text. Unknown commands, and commands addressed to
/// another bot (`/start@OtherBot`), get no route.
pub fn route(text: &str, bot_name: Option<&str>) -> Option<Route> {
    if let Some(command) = text.strip_prefix('/') {
        let token = command.split_whitespace().next().unwrap_or_default();
        let (name, addressee) = match token.split_once('@') {
            Some((name, addressee)) => (name, Some(addressee)),
            None => (token, None),
        };
        if let Some(addressee) = addressee {
            let ours = bot_name.is_some_and(|own| own.eq_ignore_ascii_case(addressee));
            if !ours {
                return None;
            }
        }
        return match name {
            "start" => Some(Route::Start),
            _ => None,
        };
    }
    Some(Route::Question(text.to_string()))
}

/// A Telegram request failure, tagged with the message that caused it
#[derive(Debug, thiserror::Error)]
#[error("message {message_id} in chat {chat_id} from {sender} failed: {source}")]
pub struct HandlerError {
    chat_id: i64,
    message_id: i32,
    sender: String,
    text: Option<String>,
    #[source]
    source: RequestError,
}

impl HandlerError {
    fn new(msg: &Message, source: RequestError) -> Self {
        Self {
            chat_id: msg.chat.id.0,
            message_id: msg.id.0,
            sender: sender_name(msg),
            text: msg.text().map(str::to_string),
            source,
        }
    }
}

/// Logs handler failures. No retry, nothing is sent to the user.
pub struct ErrorReporter;

impl ErrorHandler<HandlerError> for ErrorReporter {
    fn handle_error(self: Arc<Self>, error: HandlerError) -> BoxFuture<'static, ()> {
        error!(
            "Update from {} in chat {} (message {}, text {:?}) caused error: {}",
            error.sender, error.chat_id, error.message_id, error.text, error.source
        );
        Box::pin(async {})
    }
}

fn sender_name(msg: &Message) -> String {
    msg.from
        .as_ref()
        .map(|user| user.first_name.clone())
        .unwrap_or_else(|| "unknown".to_string())
}

fn schema() -> UpdateHandler<HandlerError> {
    Update::filter_message()
        .filter_map(|msg: Message, me: Me| {
            let bot_name = me.user.username.as_deref();
            msg.text().and_then(|text| route(text, bot_name))
        })
        .branch(dptree::case![Route::Start].endpoint(handle_start))
        .branch(dptree::case![Route::Question(text)].endpoint(handle_question))
}

/// Run the Telegram bot platform
pub async fn run(relay: Arc<Relay>, bot: Bot) -> Result<()> {
    info!("Starting Telegram platform...");

    Dispatcher::builder(bot, schema())
        .dependencies(dptree::deps![relay])
        .default_handler(|upd| async move {
            debug!("Unhandled update: {:?}", upd.id);
        })
        .error_handler(Arc::new(ErrorReporter))
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}

async fn handle_start(bot: Bot, msg: Message, relay: Arc<Relay>) -> Result<(), HandlerError> {
    info!("Start command from {} in chat {}", sender_name(&msg), msg.chat.id);
    send_reply(&bot, &msg, relay.greeting()).await
}

async fn handle_question(
    bot: Bot,
    msg: Message,
    text: String,
    relay: Arc<Relay>,
) -> Result<(), HandlerError> {
    let incoming = IncomingMessage {
        platform: "telegram".to_string(),
        chat_id: msg.chat.id.0,
        user_id: msg.from.as_ref().map(|user| user.id.0),
        user_name: sender_name(&msg),
        text,
    };

    info!(
        "Telegram message from {} ({:?}): {}",
        incoming.user_name, incoming.user_id, incoming.text
    );

    let notifier: Arc<dyn TypingNotifier> = Arc::new(bot.clone());
    let reply = relay.answer(notifier, &incoming).await;
    send_reply(&bot, &msg, reply).await
}

async fn send_reply(bot: &Bot, msg: &Message, reply: OutgoingAnswer) -> Result<(), HandlerError> {
    for chunk in split_message(&reply.text, MAX_MESSAGE_LEN) {
        let mut request = bot.send_message(msg.chat.id, chunk.clone());
        if let Some(mode) = parse_mode(reply.format) {
            request = request.parse_mode(mode);
        }
        match request.await {
            Ok(_) => {}
            // Chunking can cut a *bold* span or code block in half
            Err(e) if reply.format == ReplyFormat::Markdown && is_markup_rejection(&e) => {
                warn!(
                    "Telegram rejected Markdown in chat {}, resending as plain text: {}",
                    msg.chat.id, e
                );
                bot.send_message(msg.chat.id, chunk)
                    .await
                    .map_err(|e| HandlerError::new(msg, e))?;
            }
            Err(e) => return Err(HandlerError::new(msg, e)),
        }
    }
    Ok(())
}

fn is_markup_rejection(error: &RequestError) -> bool {
    matches!(error, RequestError::Api(ApiError::CantParseEntities(_)))
}

// Answers use Telegram's legacy Markdown, which tolerates unescaped punctuation.
#[allow(deprecated)]
fn parse_mode(format: ReplyFormat) -> Option<ParseMode> {
    match format {
        ReplyFormat::Markdown => Some(ParseMode::Markdown),
        ReplyFormat::Plain => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOT: Option<&str> = Some("ShaviraBot");

    #[test]
    fn test_start_command() {
        assert_eq!(route("/start", BOT), Some(Route::Start));
        assert_eq!(route("/start@ShaviraBot", BOT), Some(Route::Start));
        assert_eq!(route("/start@shavirabot", BOT), Some(Route::Start));
        assert_eq!(route("/start now", BOT), Some(Route::Start));
        assert_eq!(route("/start", None), Some(Route::Start));
    }

    #[test]
    fn test_start_for_another_bot_is_ignored() {
        assert_eq!(route("/start@OtherBot", BOT), None);
        assert_eq!(route("/start@OtherBot hello", BOT), None);
        assert_eq!(route("/start@", BOT), None);
        assert_eq!(route("/start@ShaviraBot", None), None);
    }

    #[test]
    fn test_unknown_commands_are_ignored() {
        assert_eq!(route("/help", BOT), None);
        assert_eq!(route("/help@ShaviraBot", BOT), None);
        assert_eq!(route("/starting", BOT), None);
        assert_eq!(route("/", BOT), None);
    }

    #[test]
    fn test_free_text_is_a_question() {
        assert_eq!(
            route("What is your name?", BOT),
            Some(Route::Question("What is your name?".to_string()))
        );
        assert_eq!(
            route("start /start@OtherBot", BOT),
            Some(Route::Question("start /start@OtherBot".to_string()))
        );
        assert_eq!(route("", BOT), Some(Route::Question(String::new())));
    }

    #[test]
    fn test_only_entity_errors_trigger_plain_resend() {
        assert!(is_markup_rejection(&RequestError::Api(
            ApiError::CantParseEntities(
                "Bad Request: can't parse entities: Can't find end of the entity".to_string()
            )
        )));
        assert!(!is_markup_rejection(&RequestError::Api(ApiError::BotBlocked)));
    }

    #[test]
    fn test_parse_mode_per_format() {
        assert!(parse_mode(ReplyFormat::Plain).is_none());
        assert!(parse_mode(ReplyFormat::Markdown).is_some());
    }

    #[tokio::test]
    async fn test_error_reporter_swallows_error() {
        let error = HandlerError {
            chat_id: 42,
            message_id: 7,
            sender: "Tester".to_string(),
            text: Some("halo".to_string()),
            source: RequestError::Api(ApiError::BotBlocked),
        };
        assert!(error.to_string().contains("chat 42"));

        Arc::new(ErrorReporter).handle_error(error).await;
    }
}
