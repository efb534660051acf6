use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{mpsc, Mutex};
use tokio::time::Instant;

use crate::classify::{self, Sender};
use crate::communication_channel::{ChannelEvent, CommunicationChannel, ConversationId, InboundMessage};
use crate::config::Policy;
use crate::conversation_manager::ConversationManager;
use crate::error::SupportError;
use crate::staff_alert::StaffAlerts;
use crate::template::{ResponseContext, ResponseKind};
use crate::timer::EscalationTimer;

/// Escalation engine: turns inbound chat events into auto-replies, reactions,
/// follow-ups and staff alerts.
#[derive(Clone)]
pub struct Support {
    policy: Arc<Policy>,
    communication_channel: Arc<dyn CommunicationChannel>,
    conversations: Arc<Mutex<ConversationManager>>,
    staff_alerts: Arc<StaffAlerts>,
}

// Focus on handling core logic and state of support system
impl Support {
    pub fn new(policy: Policy, communication_channel: Arc<dyn CommunicationChannel>) -> Self {
        let staff_alerts = StaffAlerts::new(policy.staff_channel_name.clone());
        Self {
            policy: Arc::new(policy),
            communication_channel,
            conversations: Arc::new(Mutex::new(ConversationManager::new())),
            staff_alerts: Arc::new(staff_alerts),
        }
    }

    #[cfg(test)]
    pub fn conversations(&self) -> &Arc<Mutex<ConversationManager>> {
        &self.conversations
    }

    #[cfg(test)]
    pub fn staff_alerts(&self) -> &StaffAlerts {
        &self.staff_alerts
    }

    /// Drains `events` one at a time until the transport drops its sender.
    pub async fn run(self, mut events: mpsc::UnboundedReceiver<ChannelEvent>) {
        while let Some(event) = events.recv().await {
            if let Err(err) = self.handle_event(event).await {
                tracing::error!(error = %err, "failed to handle chat event");
            }
        }
        tracing::info!("event stream closed, escalation engine stopping");
    }

    pub async fn handle_event(&self, event: ChannelEvent) -> Result<(), SupportError> {
        match event {
            ChannelEvent::MessageCreated(msg) => self.on_message_created(&msg).await,
            ChannelEvent::MessageObserved(msg) => {
                self.on_message_observed(&msg).await;
                Ok(())
            }
            ChannelEvent::Disconnected { reason } => {
                self.on_disconnect(&reason).await;
                Ok(())
            }
            ChannelEvent::AuthFailure => {
                tracing::error!("authentication with the chat transport failed");
                Ok(())
            }
        }
    }

    #[tracing::instrument(level = "debug", skip_all, fields(conversation = %msg.conversation.id))]
    pub async fn on_message_created(&self, msg: &InboundMessage) -> Result<(), SupportError> {
        if classify::is_ignored(msg) || !classify::should_process_conversation(&self.policy, &msg.conversation) {
            return Ok(());
        }

        let sender = classify::classify_sender(&self.policy, &msg.sender);
        let text = msg.text.trim();
        let lowered = text.to_lowercase();

        if sender == Sender::TrustedAgent && self.is_first_message(&msg.conversation.id).await {
            tracing::debug!(agent = %msg.sender, "ignoring first message from trusted agent");
            return Ok(());
        }

        if classify::is_data_correction(&self.policy, &lowered) {
            return self.reply(msg, text, ResponseKind::DataCorrection).await;
        }

        match sender {
            Sender::TrustedAgent => {
                self.record_agent_reply(msg).await;
                Ok(())
            }
            Sender::Customer => self.handle_customer_message(msg, text, &lowered).await,
        }
    }

    /// Refreshes the agent reply time and stops any pending escalation for
    /// every trusted-agent message, independent of the main handler.
    pub async fn on_message_observed(&self, msg: &InboundMessage) {
        if classify::is_ignored(msg) || !classify::should_process_conversation(&self.policy, &msg.conversation) {
            return;
        }
        if classify::classify_sender(&self.policy, &msg.sender) != Sender::TrustedAgent {
            return;
        }

        let mut conversations = self.conversations.lock().await;
        conversations.get_or_create(&msg.conversation.id).last_agent_reply_at = Some(Instant::now());
        if conversations.disarm(&msg.conversation.id) {
            tracing::info!(conversation = %msg.conversation.id, "agent replied, escalation cancelled");
        }
        debug_assert!(conversations.is_consistent());
    }

    pub async fn on_disconnect(&self, reason: &str) {
        tracing::error!(reason, "disconnected from chat transport");
        self.conversations.lock().await.reset_greetings();
        self.staff_alerts.invalidate().await;
    }

    async fn is_first_message(&self, conversation: &ConversationId) -> bool {
        match self.communication_channel.fetch_recent_messages(conversation, 2).await {
            Ok(messages) => messages.len() <= 1,
            Err(err) => {
                tracing::warn!(%conversation, error = %err, "failed to fetch recent messages");
                false
            }
        }
    }

    async fn record_agent_reply(&self, msg: &InboundMessage) {
        let id = &msg.conversation.id;
        let needs_greeting = {
            let mut conversations = self.conversations.lock().await;
            let state = conversations.get_or_create(id);
            state.last_agent_reply_at = Some(Instant::now());
            let needs_greeting = !state.greeted;
            state.greeted = true;
            if conversations.disarm(id) {
                tracing::info!(conversation = %id, "agent replied, escalation cancelled");
            }
            needs_greeting
        };

        if needs_greeting {
            if let Err(err) = self
                .communication_channel
                .react(id, &msg.message_id, &self.policy.acknowledgement_emoji)
                .await
            {
                tracing::warn!(conversation = %id, error = %err, "failed to react to agent message");
            }
        }
    }

    async fn handle_customer_message(
        &self,
        msg: &InboundMessage,
        text: &str,
        lowered: &str,
    ) -> Result<(), SupportError> {
        let id = &msg.conversation.id;

        if classify::is_completion(&self.policy, lowered) {
            let cancelled = self.conversations.lock().await.disarm(id);
            if cancelled {
                tracing::info!(conversation = %id, "customer closed the request");
                return self.reply(msg, text, ResponseKind::CompletionAck).await;
            }
            return Ok(());
        }

        let received_at = Utc::now();
        let mut conversations = self.conversations.lock().await;
        let state = conversations.get_or_create(id);
        if state.agent_replied_within(self.policy.agent_reply_window, Instant::now()) {
            tracing::debug!(conversation = %id, "agent active recently, no auto-reply");
            return Ok(());
        }
        if state.is_pending() || state.has_timer() {
            tracing::debug!(conversation = %id, "auto-reply already pending");
            return Ok(());
        }

        // The auto-reply goes out before the timer exists, so a follow-up can
        // never overtake it.
        let replied = self.reply(msg, text, ResponseKind::AutoReply).await;

        let generation = conversations.next_generation();
        let engine = self.clone();
        let conversation = msg.conversation.clone();
        let original = text.to_string();
        let timer = EscalationTimer::schedule(generation, self.policy.auto_reply_delay, move || async move {
            engine
                .escalate(&conversation.id, &conversation.display_name, &original, received_at, generation)
                .await;
        });
        conversations.arm(id, timer);
        debug_assert!(conversations.is_consistent());
        tracing::info!(conversation = %id, "auto-reply sent, escalation armed");

        replied
    }

    /// Fire callback of an escalation timer.
    async fn escalate(
        &self,
        id: &ConversationId,
        group_name: &str,
        original: &str,
        received_at: chrono::DateTime<Utc>,
        generation: u64,
    ) {
        let context = ResponseContext::new(
            group_name,
            original,
            self.policy.waited_minutes(),
            received_at,
            self.policy.timezone,
        );

        match self.policy.render(ResponseKind::FollowUp, &context) {
            Ok(follow_up) => self.send_logged(id, &follow_up).await,
            Err(err) => tracing::error!(error = %err, "failed to render follow-up"),
        }
        match self.policy.render(ResponseKind::StaffAlert, &context) {
            Ok(alert) => {
                self.staff_alerts
                    .dispatch(self.communication_channel.as_ref(), group_name, &alert)
                    .await
            }
            Err(err) => tracing::error!(error = %err, "failed to render staff alert"),
        }

        let mut conversations = self.conversations.lock().await;
        conversations.clear_fired(id, generation);
        debug_assert!(conversations.is_consistent());
    }

    async fn reply(&self, msg: &InboundMessage, text: &str, kind: ResponseKind) -> Result<(), SupportError> {
        let context = ResponseContext::new(
            &msg.conversation.display_name,
            text,
            self.policy.waited_minutes(),
            Utc::now(),
            self.policy.timezone,
        );
        let body = self
            .policy
            .render(kind, &context)
            .map_err(|source| SupportError::Render { name: kind.name(), source })?;
        self.send_logged(&msg.conversation.id, &body).await;
        Ok(())
    }

    async fn send_logged(&self, id: &ConversationId, body: &str) {
        if let Err(err) = self.communication_channel.send_message(id, body).await {
            tracing::warn!(conversation = %id, error = %err, "failed to send message");
        }
    }
}
