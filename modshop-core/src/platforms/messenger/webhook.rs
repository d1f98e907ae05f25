// File: modshop-core/src/platforms/messenger/webhook.rs
//
// Serde shapes of the Messenger webhook and their flattening into
// `InboundEvent`s.

use serde::Deserialize;

use modshop_common::models::InboundEvent;

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookPayload {
    pub object: String,
    #[serde(default)]
    pub entry: Vec<Entry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Entry {
    #[serde(default)]
    pub messaging: Vec<MessagingEvent>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessagingEvent {
    pub sender: Option<Participant>,
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Participant {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub text: Option<String>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub is_echo: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Attachment {
    #[serde(rename = "type")]
    pub kind: String,
    pub payload: Option<AttachmentPayload>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AttachmentPayload {
    pub url: Option<String>,
}

impl WebhookPayload {
    pub fn is_page(&self) -> bool {
        self.object == "page"
    }

    /// Text messages and image attachments, in delivery order. Echoes of the
    /// page's own messages, empty texts and other attachment types are
    /// dropped.
    pub fn into_events(self) -> Vec<InboundEvent> {
        let mut events = Vec::new();
        for messaging in self.entry.into_iter().flat_map(|e| e.messaging) {
            let (Some(sender), Some(message)) = (messaging.sender, messaging.message) else {
                continue;
            };
            if message.is_echo {
                continue;
            }

            let image = message
                .attachments
                .into_iter()
                .find(|a| a.kind == "image")
                .and_then(|a| a.payload)
                .and_then(|p| p.url);

            if let Some(url) = image {
                events.push(InboundEvent::image(sender.id, url));
            } else if let Some(text) = message.text.map(|t| t.trim().to_string()) {
                if !text.is_empty() {
                    events.push(InboundEvent::text(sender.id, text));
                }
            }
        }
        events
    }
}

/// Query parameters of the subscription handshake.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VerifyParams {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

impl VerifyParams {
    /// The challenge to echo back, if the handshake is valid.
    pub fn verify(&self, expected_token: &str) -> Option<&str> {
        match (&self.mode, &self.verify_token) {
            (Some(mode), Some(token)) if mode == "subscribe" && token == expected_token => {
                Some(self.challenge.as_deref().unwrap_or_default())
            }
            _ => None,
        }
    }
}
