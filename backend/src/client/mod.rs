//! Front-end chat behaviour, kept free of any UI toolkit.
//!
//! These are the state machines a chat view drives: reattaching to a
//! resumable stream after a reload, merging `data-appendMessage` chunks into
//! the message list, and keeping the viewport pinned to the newest message
//! while a reply streams in. Time is always passed in, never read, so a host
//! (WASM, terminal UI, tests) owns the clock and the timers.

pub mod auto_resume;
pub mod scroll;

use serde::{Deserialize, Serialize};

pub use auto_resume::{apply_data_part, merge_message, AutoResume, MergeOutcome, RESUME_DELAY};
pub use scroll::{
    MessageScroll, ScrollBehavior, ScrollFollower, Viewport, BOTTOM_THRESHOLD_PX, SCROLL_DEBOUNCE,
    USER_SCROLL_COOLDOWN,
};

/// Request lifecycle of the chat view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatStatus {
    #[default]
    Idle,
    Submitted,
    Streaming,
    Ready,
    Error,
}

impl ChatStatus {
    /// Nothing in flight; the transport is free.
    pub fn is_settled(self) -> bool {
        matches!(self, ChatStatus::Idle | ChatStatus::Ready)
    }

    /// The assistant is thinking or answering.
    pub fn is_active(self) -> bool {
        matches!(self, ChatStatus::Submitted | ChatStatus::Streaming)
    }
}
