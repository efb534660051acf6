use std::collections::HashMap;

use tokio::time::Instant;

use crate::communication_channel::ConversationId;
use crate::timer::EscalationTimer;

/// Per-conversation escalation state.
///
/// `pending` is true exactly when `timer` holds an armed escalation.
#[derive(Debug, Default)]
pub struct ConversationState {
    pending: bool,
    timer: Option<EscalationTimer>,
    pub last_agent_reply_at: Option<Instant>,
    pub greeted: bool,
}

impl ConversationState {
    pub fn is_pending(&self) -> bool {
        self.pending
    }

    pub fn has_timer(&self) -> bool {
        self.timer.is_some()
    }

    /// True while the last agent reply is younger than `window`.
    pub fn agent_replied_within(&self, window: std::time::Duration, now: Instant) -> bool {
        self.last_agent_reply_at
            .map(|at| now.saturating_duration_since(at) < window)
            .unwrap_or(false)
    }
}

#[derive(Debug, Default)]
pub struct ConversationManager {
    conversations: HashMap<ConversationId, ConversationState>,
    next_generation: u64,
}

impl ConversationManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &ConversationId) -> Option<&ConversationState> {
        self.conversations.get(id)
    }

    pub fn get_or_create(&mut self, id: &ConversationId) -> &mut ConversationState {
        self.conversations.entry(id.clone()).or_default()
    }

    pub fn next_generation(&mut self) -> u64 {
        self.next_generation += 1;
        self.next_generation
    }

    /// Installs `timer` and marks the conversation pending. A previously armed
    /// timer is cancelled first.
    pub fn arm(&mut self, id: &ConversationId, timer: EscalationTimer) {
        let state = self.get_or_create(id);
        if let Some(previous) = state.timer.replace(timer) {
            previous.cancel();
        }
        state.pending = true;
    }

    /// Drops any timer and clears `pending`. Returns `true` only if the timer
    /// was cancelled before it fired; a timer already firing runs to the end.
    pub fn disarm(&mut self, id: &ConversationId) -> bool {
        let Some(state) = self.conversations.get_mut(id) else {
            return false;
        };
        state.pending = false;
        state.timer.take().map(|timer| timer.cancel()).unwrap_or(false)
    }

    /// Called by a timer after it fired. Only clears the record if it still
    /// belongs to that timer.
    pub fn clear_fired(&mut self, id: &ConversationId, generation: u64) -> bool {
        let Some(state) = self.conversations.get_mut(id) else {
            return false;
        };
        match &state.timer {
            Some(timer) if timer.generation() == generation => {
                state.timer = None;
                state.pending = false;
                true
            }
            _ => false,
        }
    }

    pub fn reset_greetings(&mut self) {
        for state in self.conversations.values_mut() {
            state.greeted = false;
        }
    }

    pub fn is_consistent(&self) -> bool {
        self.conversations
            .values()
            .all(|state| state.pending == state.timer.is_some())
    }
}
