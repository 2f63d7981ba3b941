//! Messages moved between participants by a transport.

use serde::{Deserialize, Serialize};

use crate::{
    AnimationWindow, Category, CategoryInfo, ConsumerRequest, ContentId, ContentMetadata,
    ContentType, TechnicalContentDescriptor,
};

/// Layout the consumer currently presents, reported back to providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Layout {
    Drive,
    Focus,
    Gallery,
    Autonomous,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FocusState {
    Focused,
    Unfocused,
}

/// Consumer-to-provider status notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StatusMessage {
    ActiveLayout { layout: Layout },
    WidgetFocus { state: FocusState },
}

/// One protocol message. The originating participant travels alongside it
/// on the transport, not inside it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProtocolMessage {
    // provider -> consumer
    OfferContent {
        content: ContentId,
        category: Category,
        content_type: ContentType,
        friendly_name: String,
    },
    ContentDescription {
        content: ContentId,
        descriptor: TechnicalContentDescriptor,
    },
    ContentReady {
        content: ContentId,
    },
    EnableFocusRequest {
        content: ContentId,
        request: i32,
    },
    DisableFocusRequest {
        content: ContentId,
        request: i32,
    },
    StopOfferRequest {
        content: ContentId,
    },
    ForceStopOffer {
        content: ContentId,
    },
    UpdateMetadata {
        content: ContentId,
        metadata: ContentMetadata,
    },

    // consumer -> provider
    ContentStateChange {
        content: ContentId,
        request: ConsumerRequest,
        category_info: CategoryInfo,
        animation: AnimationWindow,
    },
    CanvasSizeChange {
        content: ContentId,
        category_info: CategoryInfo,
        animation: AnimationWindow,
    },
    ContentStatus {
        content: ContentId,
        status: StatusMessage,
    },
}

impl ProtocolMessage {
    pub fn content(&self) -> ContentId {
        match self {
            ProtocolMessage::OfferContent { content, .. }
            | ProtocolMessage::ContentDescription { content, .. }
            | ProtocolMessage::ContentReady { content }
            | ProtocolMessage::EnableFocusRequest { content, .. }
            | ProtocolMessage::DisableFocusRequest { content, .. }
            | ProtocolMessage::StopOfferRequest { content }
            | ProtocolMessage::ForceStopOffer { content }
            | ProtocolMessage::UpdateMetadata { content, .. }
            | ProtocolMessage::ContentStateChange { content, .. }
            | ProtocolMessage::CanvasSizeChange { content, .. }
            | ProtocolMessage::ContentStatus { content, .. } => *content,
        }
    }

    /// Short name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ProtocolMessage::OfferContent { .. } => "offer_content",
            ProtocolMessage::ContentDescription { .. } => "content_description",
            ProtocolMessage::ContentReady { .. } => "content_ready",
            ProtocolMessage::EnableFocusRequest { .. } => "enable_focus_request",
            ProtocolMessage::DisableFocusRequest { .. } => "disable_focus_request",
            ProtocolMessage::StopOfferRequest { .. } => "stop_offer_request",
            ProtocolMessage::ForceStopOffer { .. } => "force_stop_offer",
            ProtocolMessage::UpdateMetadata { .. } => "update_metadata",
            ProtocolMessage::ContentStateChange { .. } => "content_state_change",
            ProtocolMessage::CanvasSizeChange { .. } => "canvas_size_change",
            ProtocolMessage::ContentStatus { .. } => "content_status",
        }
    }

    /// True for messages only a content's provider may originate.
    pub fn is_from_provider(&self) -> bool {
        !matches!(
            self,
            ProtocolMessage::ContentStateChange { .. }
                | ProtocolMessage::CanvasSizeChange { .. }
                | ProtocolMessage::ContentStatus { .. }
        )
    }
}
