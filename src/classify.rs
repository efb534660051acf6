use crate::communication_channel::{AgentId, ConversationInfo, InboundMessage};
use crate::config::Policy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sender {
    TrustedAgent,
    Customer,
}

/// Self-sent messages and status broadcasts never reach the engine.
pub fn is_ignored(msg: &InboundMessage) -> bool {
    msg.is_self_sent || msg.is_status_broadcast
}

pub fn should_process_conversation(policy: &Policy, conversation: &ConversationInfo) -> bool {
    conversation.is_multi_party
        && policy.brand_pattern.is_match(&conversation.display_name)
        && conversation.display_name != policy.excluded_conversation_name
}

pub fn classify_sender(policy: &Policy, sender: &AgentId) -> Sender {
    if policy.trusted_agents.contains(sender) {
        Sender::TrustedAgent
    } else {
        Sender::Customer
    }
}

/// `text` must already be trimmed and lowercased.
pub fn is_data_correction(policy: &Policy, text: &str) -> bool {
    !policy.data_correction_prefix.is_empty() && text.starts_with(&policy.data_correction_prefix)
}

/// `text` must already be trimmed and lowercased.
pub fn is_completion(policy: &Policy, text: &str) -> bool {
    policy
        .completion_keywords
        .iter()
        .any(|keyword| text.contains(keyword.as_str()))
}
