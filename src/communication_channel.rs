use std::fmt;

use async_trait::async_trait;

use crate::error::ChannelError;

/// Stable identifier of a conversation on the transport.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConversationId(pub String);

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MessageId(pub String);

/// Sender identifier reduced to its digits, so `+20 111 378 0047` and
/// `201113780047@c.us` compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AgentId(String);

impl AgentId {
    pub fn normalize(raw: &str) -> Self {
        let user = raw.split('@').next().unwrap_or_default();
        AgentId(user.chars().filter(char::is_ascii_digit).collect())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationInfo {
    pub id: ConversationId,
    pub display_name: String,
    pub is_multi_party: bool,
}

#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub message_id: MessageId,
    pub sender: AgentId,
    pub conversation: ConversationInfo,
    pub text: String,
    pub is_self_sent: bool,
    pub is_status_broadcast: bool,
}

/// Everything the transport reports to the escalation engine.
#[derive(Debug, Clone)]
pub enum ChannelEvent {
    MessageCreated(InboundMessage),
    MessageObserved(InboundMessage),
    Disconnected { reason: String },
    AuthFailure,
}

#[async_trait]
pub trait CommunicationChannel: Send + Sync {
    async fn send_message(&self, conversation: &ConversationId, text: &str) -> Result<(), ChannelError>;

    async fn react(
        &self,
        conversation: &ConversationId,
        message: &MessageId,
        emoji: &str,
    ) -> Result<(), ChannelError>;

    /// Returns up to `limit` of the most recent messages' ids, newest first.
    async fn fetch_recent_messages(
        &self,
        conversation: &ConversationId,
        limit: u8,
    ) -> Result<Vec<MessageId>, ChannelError>;

    async fn list_conversations(&self) -> Result<Vec<ConversationInfo>, ChannelError>;

    async fn resolve_conversation(&self, id: &ConversationId) -> Result<ConversationInfo, ChannelError>;
}
