//! Typed content metadata published by providers.
//!
//! Known fields are typed; anything else rides in `extra`.
//! Updates merge field by field, so a provider only sends what changed.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Descriptive data a provider attaches to a content.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentMetadata {
    /// Human-readable preview text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_description: Option<String>,

    /// PNG-encoded preview image
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_image_png: Option<Vec<u8>>,

    /// Sort key among widgets of the same category
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub widget_order: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub widget_background_id: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub widget_hud_line_id: Option<i32>,

    /// Video stream this content wants composed beneath it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream_id: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclusive_background: Option<bool>,

    /// Anything not covered by the typed fields
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl ContentMetadata {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Merge `update` into `self`; set fields in `update` win.
    pub fn merge(&mut self, update: ContentMetadata) {
        fn take<T>(slot: &mut Option<T>, value: Option<T>) {
            if value.is_some() {
                *slot = value;
            }
        }

        take(&mut self.preview_description, update.preview_description);
        take(&mut self.preview_image_png, update.preview_image_png);
        take(&mut self.widget_order, update.widget_order);
        take(&mut self.widget_background_id, update.widget_background_id);
        take(&mut self.widget_hud_line_id, update.widget_hud_line_id);
        take(&mut self.stream_id, update.stream_id);
        take(&mut self.exclusive_background, update.exclusive_background);
        self.extra.extend(update.extra);
    }
}
