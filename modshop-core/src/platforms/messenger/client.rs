// File: modshop-core/src/platforms/messenger/client.rs

use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use reqwest::Client as ReqwestClient;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, error, warn};

use modshop_common::error::Error;
use modshop_common::traits::messaging_traits::MessageSender;

pub const GRAPH_API_BASE: &str = "https://graph.facebook.com/v19.0";

/// Messenger rejects text messages longer than this.
pub const MAX_MESSAGE_LEN: usize = 2000;

const SEND_ATTEMPTS: u32 = 3;
const RETRY_STEP: Duration = Duration::from_millis(500);
/// Display names kept before the cache starts over.
const NAME_CACHE_LIMIT: usize = 1024;

/// Splits `text` into chunks of at most `max` characters, breaking on line
/// boundaries where possible and inside a line only when it is too long.
/// Blank lines are kept; chunks with nothing but whitespace are dropped.
pub fn split_message(text: &str, max: usize) -> Vec<String> {
    let max = max.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;
    let mut has_lines = false;

    for line in text.split('\n') {
        let line_len = line.chars().count();
        let needed = if has_lines { line_len + 1 } else { line_len };

        if current_len + needed <= max {
            if has_lines {
                current.push('\n');
            }
            current.push_str(line);
            current_len += needed;
            has_lines = true;
            continue;
        }

        if has_lines {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
            has_lines = false;
        }

        if line_len <= max {
            current.push_str(line);
            current_len = line_len;
            has_lines = true;
        } else {
            let chars: Vec<char> = line.chars().collect();
            for piece in chars.chunks(max) {
                chunks.push(piece.iter().collect());
            }
        }
    }
    if has_lines {
        chunks.push(current);
    }
    chunks.retain(|c| !c.trim().is_empty());
    chunks
}

#[derive(Debug, Deserialize)]
struct UserProfile {
    first_name: Option<String>,
    last_name: Option<String>,
}

/// Graph Send API client.
pub struct MessengerClient {
    http: ReqwestClient,
    access_token: String,
    api_base: String,
    names: DashMap<String, String>,
}

impl MessengerClient {
    pub fn new(access_token: &str) -> Self {
        Self::with_base(access_token, GRAPH_API_BASE)
    }

    pub fn with_base(access_token: &str, api_base: &str) -> Self {
        Self {
            http: ReqwestClient::new(),
            access_token: access_token.to_string(),
            api_base: api_base.trim_end_matches('/').to_string(),
            names: DashMap::new(),
        }
    }

    async fn post_message(&self, body: &Value) -> Result<(), Error> {
        let url = format!("{}/me/messages", self.api_base);
        let resp = self
            .http
            .post(&url)
            .query(&[("access_token", self.access_token.as_str())])
            .json(body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(Error::Platform(format!("Send API returned {}: {}", status, text)));
        }
        Ok(())
    }

    async fn post_with_retry(&self, recipient_id: &str, body: Value) {
        for attempt in 1..=SEND_ATTEMPTS {
            match self.post_message(&body).await {
                Ok(()) => return,
                Err(e) if attempt < SEND_ATTEMPTS => {
                    warn!("Send to {} failed (attempt {}/{}): {}", recipient_id, attempt, SEND_ATTEMPTS, e);
                    tokio::time::sleep(RETRY_STEP * attempt).await;
                }
                Err(e) => {
                    error!("Giving up sending to {}: {}", recipient_id, e);
                }
            }
        }
    }

    fn cache_name(&self, user_id: &str, name: &str) {
        if self.names.len() >= NAME_CACHE_LIMIT && !self.names.contains_key(user_id) {
            debug!("Display name cache full; clearing {} entries", self.names.len());
            self.names.clear();
        }
        self.names.insert(user_id.to_string(), name.to_string());
    }

    async fn fetch_display_name(&self, user_id: &str) -> Result<String, Error> {
        let url = format!("{}/{}", self.api_base, urlencoding::encode(user_id));
        let profile: UserProfile = self
            .http
            .get(&url)
            .query(&[
                ("fields", "first_name,last_name"),
                ("access_token", self.access_token.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let name = [profile.first_name, profile.last_name]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ");
        if name.trim().is_empty() {
            return Err(Error::Platform(format!("profile for {} has no name", user_id)));
        }
        Ok(name)
    }
}

#[async_trait]
impl MessageSender for MessengerClient {
    async fn send_text(&self, recipient_id: &str, text: &str) {
        for chunk in split_message(text, MAX_MESSAGE_LEN) {
            let body = json!({
                "recipient": { "id": recipient_id },
                "message": { "text": chunk },
                "messaging_type": "RESPONSE",
            });
            self.post_with_retry(recipient_id, body).await;
        }
    }

    async fn send_image(&self, recipient_id: &str, image_url: &str) {
        let body = json!({
            "recipient": { "id": recipient_id },
            "message": {
                "attachment": {
                    "type": "image",
                    "payload": { "url": image_url, "is_reusable": true }
                }
            },
            "messaging_type": "RESPONSE",
        });
        self.post_with_retry(recipient_id, body).await;
    }

    async fn user_display_name(&self, user_id: &str) -> String {
        if let Some(name) = self.names.get(user_id) {
            return name.clone();
        }
        match self.fetch_display_name(user_id).await {
            Ok(name) => {
                self.cache_name(user_id, &name);
                name
            }
            Err(e) => {
                warn!("Could not fetch profile for {}: {}", user_id, e);
                user_id.to_string()
            }
        }
    }
}
