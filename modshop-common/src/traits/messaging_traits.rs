use async_trait::async_trait;

/// Outbound chat transport.
///
/// Delivery is best effort: implementations log failures and return
/// normally, so callers never branch on whether a message arrived.
#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn send_text(&self, recipient_id: &str, text: &str);
    async fn send_image(&self, recipient_id: &str, image_url: &str);

    /// Human-readable name for operator notifications. Falls back to the id.
    async fn user_display_name(&self, user_id: &str) -> String;
}
