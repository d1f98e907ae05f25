// File: modshop-core/src/test_utils/fakes.rs
//
// Stand-ins for the outbound collaborators.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use modshop_common::models::ReceiptAnalysis;
use modshop_common::traits::messaging_traits::MessageSender;
use modshop_common::traits::receipt_traits::ReceiptAnalyzer;

use crate::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Text { to: String, text: String },
    Image { to: String, url: String },
}

/// Remembers everything "sent" instead of calling the platform.
#[derive(Default)]
pub struct RecordingSender {
    sent: Mutex<Vec<Outbound>>,
}

impl RecordingSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> Vec<Outbound> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn texts_to(&self, recipient: &str) -> Vec<String> {
        self.all()
            .into_iter()
            .filter_map(|m| match m {
                Outbound::Text { to, text } if to == recipient => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn images_to(&self, recipient: &str) -> Vec<String> {
        self.all()
            .into_iter()
            .filter_map(|m| match m {
                Outbound::Image { to, url } if to == recipient => Some(url),
                _ => None,
            })
            .collect()
    }

    pub fn last_text_to(&self, recipient: &str) -> Option<String> {
        self.texts_to(recipient).pop()
    }

    /// Whether any text to `recipient` contains `needle`.
    pub fn saw(&self, recipient: &str, needle: &str) -> bool {
        self.texts_to(recipient).iter().any(|t| t.contains(needle))
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    fn push(&self, msg: Outbound) {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).push(msg);
    }
}

#[async_trait]
impl MessageSender for RecordingSender {
    async fn send_text(&self, recipient_id: &str, text: &str) {
        self.push(Outbound::Text { to: recipient_id.to_string(), text: text.to_string() });
    }

    async fn send_image(&self, recipient_id: &str, image_url: &str) {
        self.push(Outbound::Image { to: recipient_id.to_string(), url: image_url.to_string() });
    }

    async fn user_display_name(&self, user_id: &str) -> String {
        format!("User {}", user_id)
    }
}

#[derive(Debug, Clone)]
pub enum AnalyzerReply {
    Analysis(ReceiptAnalysis),
    Fail(String),
    /// Never answers within any sane timeout.
    Hang,
}

/// Returns a fixed reply for every image.
pub struct StaticAnalyzer {
    reply: Mutex<AnalyzerReply>,
    calls: AtomicUsize,
}

impl StaticAnalyzer {
    pub fn new(reply: AnalyzerReply) -> Self {
        Self { reply: Mutex::new(reply), calls: AtomicUsize::new(0) }
    }

    pub fn returning(amount: &str, reference: &str) -> Self {
        Self::new(AnalyzerReply::Analysis(ReceiptAnalysis::with_fields(amount, reference)))
    }

    pub fn set_reply(&self, reply: AnalyzerReply) {
        *self.reply.lock().unwrap_or_else(|e| e.into_inner()) = reply;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReceiptAnalyzer for StaticAnalyzer {
    async fn analyze(&self, _image_url: &str) -> Result<ReceiptAnalysis, Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let reply = self.reply.lock().unwrap_or_else(|e| e.into_inner()).clone();
        match reply {
            AnalyzerReply::Analysis(a) => Ok(a),
            AnalyzerReply::Fail(msg) => Err(Error::Ai(msg)),
            AnalyzerReply::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(Error::Ai("hung analyzer woke up".into()))
            }
        }
    }
}
