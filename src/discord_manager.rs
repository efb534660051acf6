use std::sync::Arc;

use async_trait::async_trait;
use serenity::cache::Cache;
use serenity::client::bridge::gateway::event::ShardStageUpdateEvent;
use serenity::gateway::ConnectionStage;
use serenity::http::Http;
use serenity::model::channel::{Channel, Message, MessageType, ReactionType};
use serenity::model::gateway::Ready;
use serenity::model::id::{ChannelId, MessageId as DiscordMessageId};
use serenity::prelude::*;
use tokio::sync::mpsc;

use crate::communication_channel::{
    AgentId, ChannelEvent, CommunicationChannel, ConversationId, ConversationInfo, InboundMessage, MessageId,
};
use crate::error::ChannelError;

/// Gateway side of the Discord transport: forwards events to the engine queue.
pub struct Handler {
    events: mpsc::UnboundedSender<ChannelEvent>,
}

impl Handler {
    pub fn new(events: mpsc::UnboundedSender<ChannelEvent>) -> Self {
        Self { events }
    }

    fn forward(&self, event: ChannelEvent) {
        if self.events.send(event).is_err() {
            tracing::warn!("escalation engine is gone, dropping event");
        }
    }
}

#[async_trait]
impl EventHandler for Handler {
    async fn message(&self, context: Context, msg: Message) {
        let conversation = match msg.channel(&context).await {
            Ok(Channel::Guild(channel)) => ConversationInfo {
                id: conversation_id(channel.id),
                display_name: channel.name,
                is_multi_party: true,
            },
            Ok(_) => ConversationInfo {
                id: conversation_id(msg.channel_id),
                display_name: String::new(),
                is_multi_party: false,
            },
            Err(why) => {
                tracing::warn!(error = %why, "failed to resolve message channel");
                return;
            }
        };

        let inbound = InboundMessage {
            message_id: MessageId(msg.id.0.to_string()),
            sender: AgentId::normalize(&msg.author.id.0.to_string()),
            conversation,
            text: msg.content.clone(),
            is_self_sent: msg.is_own(&context.cache),
            is_status_broadcast: !matches!(msg.kind, MessageType::Regular | MessageType::InlineReply),
        };

        let observed = !inbound.is_self_sent && !inbound.is_status_broadcast;
        self.forward(ChannelEvent::MessageCreated(inbound.clone()));
        if observed {
            self.forward(ChannelEvent::MessageObserved(inbound));
        }
    }

    async fn ready(&self, _: Context, ready: Ready) {
        tracing::info!(user = %ready.user.name, "connected to Discord, triage is running");
    }

    async fn shard_stage_update(&self, _: Context, event: ShardStageUpdateEvent) {
        if event.new == ConnectionStage::Disconnected {
            self.forward(ChannelEvent::Disconnected {
                reason: format!("shard {} moved from {:?}", event.shard_id.0, event.old),
            });
        }
    }
}

/// Outbound side of the Discord transport.
pub struct DiscordManager {
    http: Arc<Http>,
    cache: Arc<Cache>,
}

impl DiscordManager {
    pub fn new(http: Arc<Http>, cache: Arc<Cache>) -> Self {
        DiscordManager { http, cache }
    }
}

fn conversation_id(channel: ChannelId) -> ConversationId {
    ConversationId(channel.0.to_string())
}

fn channel_id(id: &ConversationId) -> Result<ChannelId, ChannelError> {
    id.0
        .parse::<u64>()
        .map(ChannelId)
        .map_err(|_| ChannelError::InvalidId(id.0.clone()))
}

#[async_trait]
impl CommunicationChannel for DiscordManager {
    async fn send_message(&self, conversation: &ConversationId, text: &str) -> Result<(), ChannelError> {
        channel_id(conversation)?.say(&self.http, text).await?;
        Ok(())
    }

    async fn react(
        &self,
        conversation: &ConversationId,
        message: &MessageId,
        emoji: &str,
    ) -> Result<(), ChannelError> {
        let message_id = message
            .0
            .parse::<u64>()
            .map(DiscordMessageId)
            .map_err(|_| ChannelError::InvalidId(message.0.clone()))?;
        channel_id(conversation)?
            .create_reaction(&self.http, message_id, ReactionType::Unicode(emoji.to_string()))
            .await?;
        Ok(())
    }

    async fn fetch_recent_messages(
        &self,
        conversation: &ConversationId,
        limit: u8,
    ) -> Result<Vec<MessageId>, ChannelError> {
        let messages = channel_id(conversation)?
            .messages(&self.http, |retriever| retriever.limit(u64::from(limit)))
            .await?;
        Ok(messages
            .into_iter()
            .map(|message| MessageId(message.id.0.to_string()))
            .collect())
    }

    async fn list_conversations(&self) -> Result<Vec<ConversationInfo>, ChannelError> {
        let mut conversations = Vec::new();
        for guild in self.cache.guilds() {
            let channels = guild.channels(&self.http).await?;
            conversations.extend(channels.into_values().map(|channel| ConversationInfo {
                id: conversation_id(channel.id),
                display_name: channel.name,
                is_multi_party: true,
            }));
        }
        Ok(conversations)
    }

    async fn resolve_conversation(&self, id: &ConversationId) -> Result<ConversationInfo, ChannelError> {
        match channel_id(id)?.to_channel(&*self.http).await? {
            Channel::Guild(channel) => Ok(ConversationInfo {
                id: conversation_id(channel.id),
                display_name: channel.name,
                is_multi_party: true,
            }),
            _ => Err(ChannelError::NotFound(id.0.clone())),
        }
    }
}
