//! Conversation messages and content blocks shared by the LLM client, the
//! think/act nodes, and the synthesis tier.
//!
//! `ContentBlock` follows the tagged-block shape used by tool-use capable
//! chat APIs (text / image / tool_use / tool_result) rather than a single
//! string, because the exploration loop needs to attach screenshots and
//! prompt-cache breakpoints to individual blocks.

use serde::{Deserialize, Serialize};

/// A single conversation turn. System messages are sent once, out of band,
/// by the LLM client rather than stored in history (matches how the
/// underlying chat APIs treat the system prompt).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Message {
    User { content: Vec<ContentBlock> },
    Assistant { content: Vec<ContentBlock> },
}

impl Message {
    pub fn user_text(text: impl Into<String>) -> Self {
        Message::User {
            content: vec![ContentBlock::text(text)],
        }
    }

    pub fn assistant_text(text: impl Into<String>) -> Self {
        Message::Assistant {
            content: vec![ContentBlock::text(text)],
        }
    }

    pub fn content(&self) -> &[ContentBlock] {
        match self {
            Message::User { content } | Message::Assistant { content } => content,
        }
    }

    pub fn content_mut(&mut self) -> &mut Vec<ContentBlock> {
        match self {
            Message::User { content } | Message::Assistant { content } => content,
        }
    }
}

/// One block of a message. `cache_control` marks this block (and everything
/// before it in the request) as a prompt-cache breakpoint; at most four may
/// be set across a single request (see `core::agent::explore::budget`).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        cache_control: Option<CacheControl>,
    },
    Image {
        /// Base64-encoded image bytes (webp, per spec screenshot format).
        data: String,
        media_type: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        cache_control: Option<CacheControl>,
    },
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
        #[serde(skip_serializing_if = "Option::is_none")]
        cache_control: Option<CacheControl>,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(default)]
        is_error: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        cache_control: Option<CacheControl>,
    },
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct CacheControl {
    #[serde(rename = "type")]
    pub kind: CacheControlKind,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CacheControlKind {
    Ephemeral,
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        ContentBlock::Text {
            text: text.into(),
            cache_control: None,
        }
    }

    pub fn image_webp_base64(data: impl Into<String>) -> Self {
        ContentBlock::Image {
            data: data.into(),
            media_type: "image/webp".to_string(),
            cache_control: None,
        }
    }

    pub fn clear_cache_marker(&mut self) {
        let slot = match self {
            ContentBlock::Text { cache_control, .. }
            | ContentBlock::Image { cache_control, .. }
            | ContentBlock::ToolUse { cache_control, .. }
            | ContentBlock::ToolResult { cache_control, .. } => cache_control,
        };
        *slot = None;
    }

    pub fn set_cache_marker(&mut self) {
        let slot = match self {
            ContentBlock::Text { cache_control, .. }
            | ContentBlock::Image { cache_control, .. }
            | ContentBlock::ToolUse { cache_control, .. }
            | ContentBlock::ToolResult { cache_control, .. } => cache_control,
        };
        *slot = Some(CacheControl {
            kind: CacheControlKind::Ephemeral,
        });
    }

    pub fn has_cache_marker(&self) -> bool {
        match self {
            ContentBlock::Text { cache_control, .. }
            | ContentBlock::Image { cache_control, .. }
            | ContentBlock::ToolUse { cache_control, .. }
            | ContentBlock::ToolResult { cache_control, .. } => cache_control.is_some(),
        }
    }

    pub fn is_image(&self) -> bool {
        matches!(self, ContentBlock::Image { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_marker_round_trips() {
        let mut b = ContentBlock::text("hi");
        assert!(!b.has_cache_marker());
        b.set_cache_marker();
        assert!(b.has_cache_marker());
        b.clear_cache_marker();
        assert!(!b.has_cache_marker());
    }
}
