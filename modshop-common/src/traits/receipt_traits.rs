use async_trait::async_trait;

use crate::error::Error;
use crate::models::ReceiptAnalysis;

/// Vision/AI receipt reader. Its output is untrusted and is always
/// re-validated through `ParsedReceipt::from_analysis`.
#[async_trait]
pub trait ReceiptAnalyzer: Send + Sync {
    async fn analyze(&self, image_url: &str) -> Result<ReceiptAnalysis, Error>;
}
