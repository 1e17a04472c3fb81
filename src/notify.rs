use async_trait::async_trait;
use serenity::{
    builder::EditMessage,
    http::Http,
    model::id::{ChannelId, MessageId},
};
use std::sync::Arc;
use tracing::warn;

/// Outbound chat messages. Delivery is best effort: failures are logged by
/// the implementation and never reach the caller.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Sends a message, returning its id when delivery succeeded.
    async fn say(&self, channel: ChannelId, content: &str) -> Option<MessageId>;

    /// Replaces the content of a message sent earlier.
    async fn edit(&self, channel: ChannelId, message: MessageId, content: &str);
}

pub struct SerenityNotifier {
    http: Arc<Http>,
}

impl SerenityNotifier {
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl NotificationSink for SerenityNotifier {
    async fn say(&self, channel: ChannelId, content: &str) -> Option<MessageId> {
        match channel.say(&self.http, content).await {
            Ok(message) => Some(message.id),
            Err(e) => {
                warn!("📨 Could not send message to channel {}: {:?}", channel, e);
                None
            }
        }
    }

    async fn edit(&self, channel: ChannelId, message: MessageId, content: &str) {
        if let Err(e) = channel
            .edit_message(&self.http, message, EditMessage::new().content(content))
            .await
        {
            warn!("📨 Could not edit message {} in channel {}: {:?}", message, channel, e);
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Sink that remembers every message; edits overwrite the stored text.
    #[derive(Default)]
    pub(crate) struct RecordingSink {
        messages: Mutex<Vec<(ChannelId, String)>>,
        edits: Mutex<usize>,
    }

    impl RecordingSink {
        pub(crate) fn messages(&self) -> Vec<String> {
            self.messages
                .lock()
                .unwrap()
                .iter()
                .map(|(_, text)| text.clone())
                .collect()
        }

        pub(crate) fn edit_count(&self) -> usize {
            *self.edits.lock().unwrap()
        }
    }

    #[async_trait]
    impl NotificationSink for RecordingSink {
        async fn say(&self, channel: ChannelId, content: &str) -> Option<MessageId> {
            let mut messages = self.messages.lock().unwrap();
            messages.push((channel, content.to_string()));
            Some(MessageId::new(messages.len() as u64))
        }

        async fn edit(&self, _channel: ChannelId, message: MessageId, content: &str) {
            let index = message.get() as usize - 1;
            if let Some(entry) = self.messages.lock().unwrap().get_mut(index) {
                entry.1 = content.to_string();
            }
            *self.edits.lock().unwrap() += 1;
        }
    }
}
