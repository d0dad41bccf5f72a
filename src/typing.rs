use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::ChatAction;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Something that can show a "typing..." status in a chat
#[async_trait]
pub trait TypingNotifier: Send + Sync + 'static {
    async fn notify_typing(&self, chat_id: i64) -> Result<()>;
}

#[async_trait]
impl TypingNotifier for Bot {
    async fn notify_typing(&self, chat_id: i64) -> Result<()> {
        self.send_chat_action(ChatId(chat_id), ChatAction::Typing)
            .await?;
        Ok(())
    }
}

/// Background task that keeps sending typing actions until stopped.
///
/// Dropping the indicator cancels the task; [`TypingIndicator::stop`] also
/// waits for it to finish, so no signal is sent after it returns.
pub struct TypingIndicator {
    chat_id: i64,
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl TypingIndicator {
    pub fn start(notifier: Arc<dyn TypingNotifier>, chat_id: i64, interval: Duration) -> Self {
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    result = notifier.notify_typing(chat_id) => {
                        if let Err(e) = result {
                            debug!("Failed to send typing action to chat {}: {}", chat_id, e);
                        }
                    }
                }

                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {}
                }
            }
            debug!("Typing indicator for chat {} stopped", chat_id);
        });

        Self {
            chat_id,
            cancel,
            handle: Some(handle),
        }
    }

    /// Cancel the task and wait for it to exit.
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                debug!("Typing task for chat {} ended abnormally: {}", self.chat_id, e);
            }
        }
    }
}

impl Drop for TypingIndicator {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Run `operation` while showing a typing indicator in `chat_id`.
pub async fn with_typing<F>(
    notifier: Arc<dyn TypingNotifier>,
    chat_id: i64,
    interval: Duration,
    operation: F,
) -> F::Output
where
    F: Future,
{
    let typing = TypingIndicator::start(notifier, chat_id, interval);
    let output = operation.await;
    typing.stop().await;
    output
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingNotifier;
    use super::*;

    const INTERVAL: Duration = Duration::from_secs(1);

    #[tokio::test(start_paused = true)]
    async fn test_emits_once_per_interval() {
        let notifier = Arc::new(RecordingNotifier::default());

        let value = with_typing(notifier.clone(), 7, INTERVAL, async {
            tokio::time::sleep(Duration::from_millis(3500)).await;
            "done"
        })
        .await;

        assert_eq!(value, "done");
        // t = 0, 1, 2, 3
        assert_eq!(notifier.count(), 4);
        assert!(notifier.calls.lock().unwrap().iter().all(|(chat, _)| *chat == 7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_signal_after_operation_completes() {
        let notifier = Arc::new(RecordingNotifier::default());

        with_typing(notifier.clone(), 1, INTERVAL, async {
            tokio::time::sleep(Duration::from_millis(2500)).await;
        })
        .await;
        let after_stop = notifier.count();

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(notifier.count(), after_stop);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_when_operation_fails() {
        let notifier = Arc::new(RecordingNotifier::default());

        let result: Result<(), &str> = with_typing(notifier.clone(), 1, INTERVAL, async {
            tokio::time::sleep(Duration::from_millis(1500)).await;
            Err("boom")
        })
        .await;
        assert!(result.is_err());
        let after_stop = notifier.count();

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(notifier.count(), after_stop);
    }

    #[tokio::test(start_paused = true)]
    async fn test_notifier_errors_do_not_stop_the_loop() {
        let notifier = Arc::new(RecordingNotifier::failing());

        with_typing(notifier.clone(), 1, INTERVAL, async {
            tokio::time::sleep(Duration::from_millis(2500)).await;
        })
        .await;

        assert_eq!(notifier.count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels_task() {
        let notifier = Arc::new(RecordingNotifier::default());

        let typing = TypingIndicator::start(notifier.clone(), 1, INTERVAL);
        tokio::time::sleep(Duration::from_millis(1500)).await;
        drop(typing);
        tokio::time::sleep(Duration::from_millis(10)).await;
        let after_drop = notifier.count();

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(notifier.count(), after_drop);
    }
}
