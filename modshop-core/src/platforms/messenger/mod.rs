pub mod client;
pub mod webhook;

pub use client::{split_message, MessengerClient, MAX_MESSAGE_LEN};
pub use webhook::{VerifyParams, WebhookPayload};
