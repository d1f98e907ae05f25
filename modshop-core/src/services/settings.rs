use std::collections::HashSet;
use std::time::Duration;

use rust_decimal::Decimal;

/// Behaviour knobs for the dialog layer. The server fills these from its
/// command line; tests usually start from `BotSettings::default()`.
#[derive(Debug, Clone)]
pub struct BotSettings {
    /// Sender ids allowed to run `setup admin` and reach the admin console.
    pub admin_ids: HashSet<String>,
    /// Conversations untouched for longer than this are forgotten.
    pub idle_timeout: Duration,
    pub refs_per_page: usize,
    /// Shown as the payment number when no admin has set one.
    pub fallback_contact: String,
    /// Accepted distance between a paid amount and a catalog price.
    pub price_tolerance: Decimal,
    pub ai_timeout: Duration,
    /// Ask buyers for an account password after their email.
    pub collect_password: bool,
    /// Queue creation jobs for the external worker on confirmed orders.
    pub automation_enabled: bool,
    pub recent_jobs_limit: i64,
}

impl Default for BotSettings {
    fn default() -> Self {
        Self {
            admin_ids: HashSet::new(),
            idle_timeout: Duration::from_secs(30 * 60),
            refs_per_page: 10,
            fallback_contact: "09123456789".to_string(),
            price_tolerance: Decimal::new(1, 2),
            ai_timeout: Duration::from_secs(90),
            collect_password: false,
            automation_enabled: true,
            recent_jobs_limit: 15,
        }
    }
}

impl BotSettings {
    pub fn with_admins<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.admin_ids = ids.into_iter().map(Into::into).collect();
        self
    }
}
