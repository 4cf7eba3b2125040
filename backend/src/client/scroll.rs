use std::time::{Duration, Instant};

use crate::models::{Role, UiMessage};

use super::ChatStatus;

/// Distance from the end that still counts as "at the bottom".
pub const BOTTOM_THRESHOLD_PX: f64 = 100.0;
/// Content changes are coalesced for this long before scrolling.
pub const SCROLL_DEBOUNCE: Duration = Duration::from_millis(50);
/// After a manual scroll, wheel or touch, automatic scrolling holds off
/// this long.
pub const USER_SCROLL_COOLDOWN: Duration = Duration::from_millis(1500);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub scroll_top: f64,
    pub scroll_height: f64,
    pub client_height: f64,
}

impl Viewport {
    pub fn is_at_bottom(&self) -> bool {
        self.scroll_top + self.client_height >= self.scroll_height - BOTTOM_THRESHOLD_PX
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollBehavior {
    Instant,
    Smooth,
}

/// Pins the viewport to the newest content while a reply streams, without
/// fighting a user who is scrolling back through the conversation.
#[derive(Debug, Clone)]
pub struct ScrollFollower {
    at_bottom: bool,
    streaming: bool,
    last_user_input: Option<Instant>,
    pending_until: Option<Instant>,
}

impl Default for ScrollFollower {
    fn default() -> Self {
        Self {
            at_bottom: true,
            streaming: false,
            last_user_input: None,
            pending_until: None,
        }
    }
}

impl ScrollFollower {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_at_bottom(&self) -> bool {
        self.at_bottom
    }

    pub fn set_streaming(&mut self, streaming: bool) {
        self.streaming = streaming;
        if !streaming {
            self.pending_until = None;
        }
    }

    fn cooling_down(&self, now: Instant) -> bool {
        self.last_user_input
            .is_some_and(|t| now.saturating_duration_since(t) < USER_SCROLL_COOLDOWN)
    }

    /// Scroll event from the container.
    pub fn on_user_scroll(&mut self, viewport: Viewport, now: Instant) {
        self.at_bottom = viewport.is_at_bottom();
        self.last_user_input = Some(now);
        self.pending_until = None;
    }

    /// Wheel or touch input; the position is reported by the scroll event
    /// that follows.
    pub fn on_user_gesture(&mut self, now: Instant) {
        self.last_user_input = Some(now);
        self.pending_until = None;
    }

    /// DOM mutation or resize inside the message list.
    pub fn on_content_change(&mut self, now: Instant) {
        if !self.streaming || !self.at_bottom || self.cooling_down(now) {
            return;
        }
        self.pending_until.get_or_insert(now + SCROLL_DEBOUNCE);
    }

    /// Returns a scroll to perform once the debounce window has passed.
    pub fn poll(&mut self, now: Instant) -> Option<ScrollBehavior> {
        let due = self.pending_until?;
        if now < due {
            return None;
        }
        self.pending_until = None;
        if self.cooling_down(now) {
            return None;
        }
        self.at_bottom = true;
        Some(ScrollBehavior::Instant)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.pending_until
    }

    /// The end sentinel became visible.
    pub fn on_viewport_enter(&mut self) {
        self.at_bottom = true;
    }

    pub fn on_viewport_leave(&mut self) {
        self.at_bottom = false;
    }
}

/// Scroll reactions to message-list and status changes.
///
/// - a new user message always scrolls
/// - streaming starting or a new assistant message scrolls
/// - going to `submitted` scrolls only when already at the bottom
#[derive(Debug, Clone)]
pub struct MessageScroll {
    follower: ScrollFollower,
    prev_count: usize,
    prev_last_role: Option<Role>,
    prev_status: ChatStatus,
    has_sent_message: bool,
}

impl MessageScroll {
    pub fn new(messages: &[UiMessage], status: ChatStatus) -> Self {
        let mut follower = ScrollFollower::new();
        follower.set_streaming(status.is_active());
        Self {
            follower,
            prev_count: messages.len(),
            prev_last_role: messages.last().map(|m| m.role),
            prev_status: status,
            has_sent_message: false,
        }
    }

    pub fn follower(&self) -> &ScrollFollower {
        &self.follower
    }

    pub fn follower_mut(&mut self) -> &mut ScrollFollower {
        &mut self.follower
    }

    pub fn has_sent_message(&self) -> bool {
        self.has_sent_message
    }

    pub fn on_update(&mut self, messages: &[UiMessage], status: ChatStatus) -> Option<ScrollBehavior> {
        if status == ChatStatus::Submitted {
            self.has_sent_message = true;
        }
        self.follower.set_streaming(status.is_active());

        let last_role = messages.last().map(|m| m.role);
        let new_user_message = messages.len() > self.prev_count && last_role == Some(Role::User);

        let status_changed = status != self.prev_status;
        let started_streaming = status_changed && status == ChatStatus::Streaming;
        let started_thinking = status_changed && status == ChatStatus::Submitted;
        let new_assistant_message =
            last_role == Some(Role::Assistant) && self.prev_last_role != Some(Role::Assistant);

        self.prev_count = messages.len();
        self.prev_last_role = last_role;
        self.prev_status = status;

        let scroll = new_user_message
            || started_streaming
            || new_assistant_message
            || (started_thinking && self.follower.is_at_bottom());
        scroll.then(|| {
            self.follower.on_viewport_enter();
            ScrollBehavior::Instant
        })
    }
}
