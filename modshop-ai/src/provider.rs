use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::{Client, StatusCode};
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use modshop_common::error::Error;
use modshop_common::models::ReceiptAnalysis;
use modshop_common::traits::receipt_traits::ReceiptAnalyzer;

use crate::extract::{candidate_text, parse_analysis};
use crate::models::VisionConfig;
use crate::prompt::RECEIPT_PROMPT;

const DEFAULT_MIME: &str = "image/jpeg";

/// Vision-model receipt reader (generateContent-style API).
pub struct VisionReceiptAnalyzer {
    config: VisionConfig,
    client: Client,
}

impl VisionReceiptAnalyzer {
    pub fn new(config: VisionConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { config, client }
    }

    /// Fetches the attachment and returns `(mime_type, base64 data)`.
    async fn fetch_image(&self, image_url: &str) -> Result<(String, String), Error> {
        let response = self.client.get(image_url).send().await?.error_for_status()?;
        let mime = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .filter(|v| v.starts_with("image/"))
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_string())
            .unwrap_or_else(|| DEFAULT_MIME.to_string());
        let bytes = response.bytes().await?;
        debug!("Downloaded receipt image ({} bytes, {})", bytes.len(), mime);
        Ok((mime, STANDARD.encode(&bytes)))
    }

    fn request_body(mime: &str, data: &str) -> Value {
        json!({
            "contents": [{
                "parts": [
                    { "text": RECEIPT_PROMPT },
                    { "inline_data": { "mime_type": mime, "data": data } }
                ]
            }]
        })
    }

    /// Posts the request, retrying while the model reports overload.
    async fn generate(&self, body: &Value) -> Result<String, Error> {
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            info!("Sending receipt to vision model (attempt {}/{})", attempt, max_attempts);
            let response = self
                .client
                .post(self.config.endpoint())
                .query(&[("key", self.config.api_key.as_str())])
                .json(body)
                .send()
                .await?;

            let status = response.status();
            let text = response.text().await?;

            if status == StatusCode::SERVICE_UNAVAILABLE && attempt < max_attempts {
                let wait = Duration::from_millis(self.config.retry_backoff_ms * u64::from(attempt));
                warn!("Vision model overloaded; retrying in {:?}", wait);
                tokio::time::sleep(wait).await;
                attempt += 1;
                continue;
            }
            if !status.is_success() {
                return Err(Error::Ai(format!("Vision API returned {}: {}", status, text)));
            }

            let data: Value = serde_json::from_str(&text)?;
            return candidate_text(&data).map(str::to_string);
        }
    }
}

#[async_trait]
impl ReceiptAnalyzer for VisionReceiptAnalyzer {
    async fn analyze(&self, image_url: &str) -> Result<ReceiptAnalysis, Error> {
        let (mime, data) = self.fetch_image(image_url).await?;
        let model_text = self.generate(&Self::request_body(&mime, &data)).await?;
        debug!("Raw model output: {}", model_text);

        let analysis = parse_analysis(&model_text)?;
        info!(
            "Receipt analysed: status {:?}, reasoning: {}",
            analysis.verification_status, analysis.reasoning
        );
        Ok(analysis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_carries_prompt_and_inline_image() {
        let body = VisionReceiptAnalyzer::request_body("image/png", "QUJD");
        let parts = &body["contents"][0]["parts"];
        assert_eq!(parts[0]["text"], RECEIPT_PROMPT);
        assert_eq!(parts[1]["inline_data"]["mime_type"], "image/png");
        assert_eq!(parts[1]["inline_data"]["data"], "QUJD");
    }

    #[tokio::test]
    async fn unreachable_image_host_is_an_error() {
        let analyzer = VisionReceiptAnalyzer::new(VisionConfig::new("k").with_api_base("http://127.0.0.1:9"));
        let res = analyzer.analyze("http://127.0.0.1:9/receipt.png").await;
        assert!(matches!(res, Err(Error::Http(_))));
    }
}
