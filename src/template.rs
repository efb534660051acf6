//! Named fields available to response templates.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Longest excerpt of a customer message quoted back in a response.
pub const MESSAGE_EXCERPT_CHARS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    DataCorrection,
    AutoReply,
    FollowUp,
    CompletionAck,
    StaffAlert,
}

impl ResponseKind {
    pub const ALL: [ResponseKind; 5] = [
        ResponseKind::DataCorrection,
        ResponseKind::AutoReply,
        ResponseKind::FollowUp,
        ResponseKind::CompletionAck,
        ResponseKind::StaffAlert,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ResponseKind::DataCorrection => "data_correction",
            ResponseKind::AutoReply => "auto_reply",
            ResponseKind::FollowUp => "follow_up",
            ResponseKind::CompletionAck => "completion_ack",
            ResponseKind::StaffAlert => "staff_alert",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ResponseContext {
    pub group_name: String,
    pub message: String,
    pub waited_minutes: u64,
    pub received_at: String,
}

impl ResponseContext {
    pub fn new(
        group_name: &str,
        message: &str,
        waited_minutes: u64,
        received_at: DateTime<Utc>,
        timezone: chrono_tz::Tz,
    ) -> Self {
        Self {
            group_name: group_name.to_string(),
            message: truncate_chars(message, MESSAGE_EXCERPT_CHARS).to_string(),
            waited_minutes,
            received_at: received_at
                .with_timezone(&timezone)
                .format("%Y-%m-%d %H:%M")
                .to_string(),
        }
    }

    /// Placeholder values used to check templates when the policy loads.
    pub(crate) fn sample() -> Self {
        Self {
            group_name: "group".to_string(),
            message: "message".to_string(),
            waited_minutes: 5,
            received_at: "2024-01-01 00:00".to_string(),
        }
    }
}

/// Cuts `text` to at most `max` characters without splitting a code point.
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}
