//! Geometry and timing payloads carried alongside state changes.

use serde::{Deserialize, Serialize};

/// Time window (milliseconds, caller's clock) over which a transition animates.
///
/// A zero window means "immediately".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct AnimationWindow {
    pub start_ms: u64,
    pub finish_ms: u64,
}

impl AnimationWindow {
    pub const IMMEDIATE: Self = Self {
        start_ms: 0,
        finish_ms: 0,
    };

    pub fn new(start_ms: u64, finish_ms: u64) -> Self {
        Self {
            start_ms,
            finish_ms,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Consumer-side description of the region a category renders into.
///
/// Fields left as `None` are "not changed" when sent as an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CategoryInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub render_size: Option<Size>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_rect: Option<Rect>,

    /// Area guaranteed not to be covered by other consumer UI
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub safe_rect: Option<Rect>,
}

impl CategoryInfo {
    pub fn new(render_size: Size, category_rect: Rect) -> Self {
        Self {
            render_size: Some(render_size),
            category_rect: Some(category_rect),
            safe_rect: None,
        }
    }

    pub fn with_safe_rect(mut self, safe_rect: Rect) -> Self {
        self.safe_rect = Some(safe_rect);
        self
    }

    /// True when both render size and category rect are set and non-empty.
    pub fn is_complete(&self) -> bool {
        matches!(self.render_size, Some(size) if !size.is_empty())
            && matches!(self.category_rect, Some(rect) if !rect.is_empty())
    }

    /// Overlay the fields set in `update` onto `self`.
    pub fn apply(&mut self, update: &CategoryInfo) {
        if update.render_size.is_some() {
            self.render_size = update.render_size;
        }
        if update.category_rect.is_some() {
            self.category_rect = update.category_rect;
        }
        if update.safe_rect.is_some() {
            self.safe_rect = update.safe_rect;
        }
    }
}
