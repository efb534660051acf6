use tokio::sync::Mutex;

use crate::communication_channel::{CommunicationChannel, ConversationId};
use crate::error::ChannelError;

/// Delivers escalation alerts to the staff channel, resolving it by name once
/// and caching its id until the transport disconnects.
#[derive(Debug)]
pub struct StaffAlerts {
    channel_name: String,
    cached: Mutex<Option<ConversationId>>,
}

impl StaffAlerts {
    pub fn new(channel_name: impl Into<String>) -> Self {
        Self {
            channel_name: channel_name.into(),
            cached: Mutex::new(None),
        }
    }

    /// Returns the cached id, or looks the channel up by exact name.
    pub async fn resolve(
        &self,
        channel: &dyn CommunicationChannel,
    ) -> Result<Option<ConversationId>, ChannelError> {
        if let Some(id) = self.cached.lock().await.clone() {
            return Ok(Some(id));
        }

        let found = channel
            .list_conversations()
            .await?
            .into_iter()
            .find(|conversation| conversation.is_multi_party && conversation.display_name == self.channel_name)
            .map(|conversation| conversation.id);

        if let Some(id) = &found {
            *self.cached.lock().await = Some(id.clone());
        }
        Ok(found)
    }

    /// Sends an already rendered alert. Failures are logged and swallowed.
    pub async fn dispatch(&self, channel: &dyn CommunicationChannel, group_name: &str, alert: &str) {
        let id = match self.resolve(channel).await {
            Ok(Some(id)) => id,
            Ok(None) => {
                tracing::error!(staff_channel = %self.channel_name, "staff channel not found, alert skipped");
                return;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to resolve staff channel, alert skipped");
                return;
            }
        };

        let delivered = match channel.resolve_conversation(&id).await {
            Ok(staff) => channel.send_message(&staff.id, alert).await,
            Err(err) => Err(err),
        };
        match delivered {
            Ok(()) => tracing::info!(group = group_name, "sent late-reply alert to staff"),
            Err(err) => tracing::error!(group = group_name, error = %err, "failed to send staff alert"),
        }
    }

    pub async fn invalidate(&self) {
        *self.cached.lock().await = None;
    }

    #[cfg(test)]
    pub async fn cached(&self) -> Option<ConversationId> {
        self.cached.lock().await.clone()
    }
}
