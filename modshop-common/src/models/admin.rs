use serde::{Deserialize, Serialize};

/// Settings row for one authorised operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct AdminRecord {
    pub user_id: String,
    /// Payment contact (e.g. the GCash number) shown to buyers.
    pub contact_number: Option<String>,
    pub is_online: bool,
}

impl AdminRecord {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            contact_number: None,
            is_online: false,
        }
    }
}
