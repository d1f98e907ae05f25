// File: modshop-common/src/models/event.rs

use serde::{Deserialize, Serialize};

/// One inbound chat event, already flattened from the platform's webhook shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundEvent {
    pub sender_id: String,
    pub kind: InboundKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InboundKind {
    Text(String),
    Image { url: String },
}

impl InboundEvent {
    pub fn text(sender_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            sender_id: sender_id.into(),
            kind: InboundKind::Text(text.into()),
        }
    }

    pub fn image(sender_id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            sender_id: sender_id.into(),
            kind: InboundKind::Image { url: url.into() },
        }
    }
}
