use std::collections::HashSet;
use std::sync::Arc;

use tracing::{error, info, warn};

use modshop_common::error::Error;
use modshop_common::models::AdminRecord;
use modshop_common::traits::messaging_traits::MessageSender;
use modshop_common::traits::repository_traits::AdminRepository;

/// What buyers are shown about the shop's operators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorefrontStatus {
    pub online: bool,
    pub contact_number: String,
}

/// Admin identity and operator notifications.
///
/// Only senders on the configured allow-list can become admins; an
/// allow-listed sender becomes active once `setup admin` has created their
/// row.
pub struct AdminDirectory {
    allow_list: HashSet<String>,
    repo: Arc<dyn AdminRepository + Send + Sync>,
    sender: Arc<dyn MessageSender + Send + Sync>,
    fallback_contact: String,
}

impl AdminDirectory {
    pub fn new(
        allow_list: HashSet<String>,
        repo: Arc<dyn AdminRepository + Send + Sync>,
        sender: Arc<dyn MessageSender + Send + Sync>,
        fallback_contact: String,
    ) -> Self {
        if allow_list.is_empty() {
            warn!("No admin ids configured; operator alerts will go nowhere");
        }
        Self {
            allow_list,
            repo,
            sender,
            fallback_contact,
        }
    }

    pub fn is_allow_listed(&self, user_id: &str) -> bool {
        self.allow_list.contains(user_id)
    }

    pub async fn is_admin(&self, user_id: &str) -> Result<Option<AdminRecord>, Error> {
        if !self.is_allow_listed(user_id) {
            return Ok(None);
        }
        self.repo.get_admin(user_id).await
    }

    /// Returns false (and stores nothing) for senders not on the allow-list.
    pub async fn setup_admin(&self, user_id: &str) -> Result<bool, Error> {
        if !self.is_allow_listed(user_id) {
            warn!("Refused admin setup from {}", user_id);
            return Ok(false);
        }
        self.repo.upsert_admin(user_id, None).await?;
        info!("Admin {} registered", user_id);
        Ok(true)
    }

    pub async fn set_contact(&self, user_id: &str, contact_number: &str) -> Result<(), Error> {
        self.repo.upsert_admin(user_id, Some(contact_number)).await
    }

    /// Flips the admin's online flag and returns the new value.
    pub async fn toggle_online(&self, user_id: &str) -> Result<bool, Error> {
        let current = self
            .repo
            .get_admin(user_id)
            .await?
            .map(|a| a.is_online)
            .unwrap_or(false);
        self.repo.set_online(user_id, !current).await?;
        Ok(!current)
    }

    async fn registered_admins(&self) -> Result<Vec<AdminRecord>, Error> {
        let all = self.repo.list_admins().await?;
        Ok(all
            .into_iter()
            .filter(|a| self.allow_list.contains(&a.user_id))
            .collect())
    }

    pub async fn storefront(&self) -> StorefrontStatus {
        match self.registered_admins().await {
            Ok(admins) => StorefrontStatus {
                online: admins.iter().any(|a| a.is_online),
                contact_number: admins
                    .iter()
                    .find_map(|a| a.contact_number.clone())
                    .unwrap_or_else(|| self.fallback_contact.clone()),
            },
            Err(e) => {
                error!("Could not load admin records: {}", e);
                StorefrontStatus {
                    online: false,
                    contact_number: self.fallback_contact.clone(),
                }
            }
        }
    }

    /// Registered admins, or the whole allow-list if none has run setup yet.
    pub async fn operator_ids(&self) -> Vec<String> {
        let registered = match self.registered_admins().await {
            Ok(admins) => admins.into_iter().map(|a| a.user_id).collect::<Vec<_>>(),
            Err(e) => {
                error!("Could not load admin records: {}", e);
                Vec::new()
            }
        };
        if !registered.is_empty() {
            return registered;
        }
        let mut ids: Vec<String> = self.allow_list.iter().cloned().collect();
        ids.sort();
        ids
    }

    pub async fn alert(&self, text: &str) {
        for id in self.operator_ids().await {
            self.sender.send_text(&id, text).await;
        }
    }

    pub async fn alert_image(&self, image_url: &str) {
        for id in self.operator_ids().await {
            self.sender.send_image(&id, image_url).await;
        }
    }
}
