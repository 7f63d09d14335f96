//! Auto-follow decision for the transcript viewport.
//!
//! Metrics are in whatever unit the renderer scrolls in (pixels for a GUI,
//! rows for the CLI); only their differences matter.

/// Distance from the bottom under which the viewport keeps following.
pub const FOLLOW_THRESHOLD: f64 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowAction {
    /// The viewport was moved to the new bottom.
    Followed,
    /// The viewport stayed put; a jump-to-bottom control should be offered.
    Held,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Viewport {
    scroll_top: f64,
    scroll_height: f64,
    viewport_height: f64,
    auto_follow: bool,
}

impl Viewport {
    pub fn new(viewport_height: f64) -> Self {
        Self {
            scroll_top: 0.0,
            scroll_height: viewport_height.max(0.0),
            viewport_height: viewport_height.max(0.0),
            auto_follow: true,
        }
    }

    pub fn scroll_top(&self) -> f64 {
        self.scroll_top
    }

    pub fn scroll_height(&self) -> f64 {
        self.scroll_height
    }

    pub fn viewport_height(&self) -> f64 {
        self.viewport_height
    }

    pub fn auto_follow(&self) -> bool {
        self.auto_follow
    }

    pub fn show_jump_to_bottom(&self) -> bool {
        !self.auto_follow
    }

    fn max_scroll_top(&self) -> f64 {
        (self.scroll_height - self.viewport_height).max(0.0)
    }

    fn distance_from_bottom(&self) -> f64 {
        self.scroll_height - (self.scroll_top + self.viewport_height)
    }

    fn recompute_follow(&mut self) {
        self.auto_follow = self.distance_from_bottom() < FOLLOW_THRESHOLD;
    }

    /// The user moved the viewport. Never refused, even mid-stream.
    pub fn on_user_scroll(&mut self, scroll_top: f64) {
        self.scroll_top = scroll_top.clamp(0.0, self.max_scroll_top());
        self.recompute_follow();
    }

    /// The content grew to `scroll_height`.
    pub fn on_content_grow(&mut self, scroll_height: f64) -> FollowAction {
        self.scroll_height = scroll_height.max(self.viewport_height);
        if self.auto_follow {
            self.scroll_top = self.max_scroll_top();
            FollowAction::Followed
        } else {
            FollowAction::Held
        }
    }

    /// The renderer was resized; follow state is re-derived from the new
    /// geometry.
    pub fn set_viewport_height(&mut self, viewport_height: f64) {
        self.viewport_height = viewport_height.max(0.0);
        self.scroll_height = self.scroll_height.max(self.viewport_height);
        if self.auto_follow {
            self.scroll_top = self.max_scroll_top();
        } else {
            self.scroll_top = self.scroll_top.min(self.max_scroll_top());
            self.recompute_follow();
        }
    }

    pub fn jump_to_bottom(&mut self) {
        self.scroll_top = self.max_scroll_top();
        self.auto_follow = true;
    }

    /// Back to an empty, following viewport of the same height.
    pub fn reset(&mut self) {
        *self = Self::new(self.viewport_height);
    }
}
