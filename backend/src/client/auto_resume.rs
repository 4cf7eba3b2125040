use std::time::{Duration, Instant};

use crate::models::{Role, UiMessage};
use crate::ui_stream::UiChunk;

use super::ChatStatus;

/// Grace period between the view settling and the reattach call, so the
/// transport is initialized before it is used.
pub const RESUME_DELAY: Duration = Duration::from_millis(100);

/// One-shot reattach scheduler.
///
/// A page loaded with a conversation whose last message is from the user
/// probably missed the reply. Once the status first settles the resume is
/// scheduled; [`poll`](Self::poll) reports when it is due. It fires at most
/// once per view.
#[derive(Debug, Clone)]
pub struct AutoResume {
    enabled: bool,
    awaiting_reply: bool,
    due_at: Option<Instant>,
    fired: bool,
}

impl AutoResume {
    pub fn new(enabled: bool, initial_messages: &[UiMessage]) -> Self {
        let awaiting_reply = initial_messages.last().is_some_and(|m| m.role == Role::User);
        Self {
            enabled,
            awaiting_reply,
            due_at: None,
            fired: false,
        }
    }

    /// Feed every status change.
    pub fn on_status(&mut self, status: ChatStatus, now: Instant) {
        if !self.enabled || self.fired || !self.awaiting_reply {
            return;
        }
        if status.is_settled() {
            self.due_at.get_or_insert(now + RESUME_DELAY);
        } else {
            // The view moved on before the timer ran out.
            self.due_at = None;
        }
    }

    /// `true` exactly once, when the scheduled resume is due.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.due_at {
            Some(due) if now >= due => {
                self.due_at = None;
                self.fired = true;
                true
            }
            _ => false,
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.due_at
    }

    pub fn has_fired(&self) -> bool {
        self.fired
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// A message with the same id existed; its content was replaced in place.
    Replaced(usize),
    Appended,
}

/// Upsert by id so repeated deliveries never produce duplicate bubbles.
pub fn merge_message(messages: &mut Vec<UiMessage>, incoming: UiMessage) -> MergeOutcome {
    match messages.iter().position(|m| m.id == incoming.id) {
        Some(index) => {
            messages[index] = incoming;
            MergeOutcome::Replaced(index)
        }
        None => {
            messages.push(incoming);
            MergeOutcome::Appended
        }
    }
}

/// Apply one stream chunk to the message list. Chunks other than
/// `data-appendMessage` leave the list untouched and yield `Ok(None)`.
pub fn apply_data_part(
    messages: &mut Vec<UiMessage>,
    chunk: &UiChunk,
) -> Result<Option<MergeOutcome>, serde_json::Error> {
    let UiChunk::AppendMessage { data, .. } = chunk else {
        return Ok(None);
    };
    let incoming: UiMessage = serde_json::from_str(data)?;
    Ok(Some(merge_message(messages, incoming)))
}
