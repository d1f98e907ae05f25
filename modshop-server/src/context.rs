//! modshop-server/src/context.rs
//!
//! Builds the long-lived services the webhook handlers share.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use modshop_ai::{VisionConfig, VisionReceiptAnalyzer};
use modshop_core::db::Database;
use modshop_core::platforms::messenger::MessengerClient;
use modshop_core::repositories::postgres::{
    PostgresAccountRepository, PostgresAdminRepository, PostgresCreationJobRepository,
    PostgresModRepository, PostgresReferenceRepository,
};
use modshop_core::services::{
    BotContext, BotSettings, DialogRouter, InMemoryConversationStore, LedgerRepos,
};
use modshop_core::tasks::job_poller::JobPoller;
use modshop_core::Error;

use crate::Args;

pub struct ServerContext {
    pub db: Database,
    pub router: Arc<DialogRouter>,
    pub verify_token: Arc<String>,
}

impl ServerContext {
    pub async fn new(args: &Args) -> Result<Self, Error> {
        let db = Database::new(&args.db_url).await?;
        db.migrate().await?;
        info!("Database ready");

        let pool = db.pool().clone();
        let repos = LedgerRepos {
            mods: Arc::new(PostgresModRepository::new(pool.clone())),
            accounts: Arc::new(PostgresAccountRepository::new(pool.clone())),
            references: Arc::new(PostgresReferenceRepository::new(pool.clone())),
            admins: Arc::new(PostgresAdminRepository::new(pool.clone())),
            jobs: Arc::new(PostgresCreationJobRepository::new(pool)),
        };

        let mut vision = VisionConfig::new(&args.vision_api_key);
        if let Some(base) = &args.vision_api_base {
            vision = vision.with_api_base(base);
        }
        if let Some(model) = &args.vision_model {
            vision = vision.with_model(model);
        }
        info!("Receipt analysis via model '{}'", vision.model);
        let analyzer = Arc::new(VisionReceiptAnalyzer::new(vision));

        let sender = Arc::new(MessengerClient::new(&args.page_access_token));
        let settings = settings_from_args(args);
        let states = Arc::new(InMemoryConversationStore::new(settings.idle_timeout));

        let ctx = BotContext::new(settings, repos, analyzer, sender, states);

        Ok(Self {
            db,
            router: Arc::new(DialogRouter::new(ctx)),
            verify_token: Arc::new(args.verify_token.clone()),
        })
    }

    /// A poller sharing the router's ledger, sender and admin directory.
    pub fn job_poller(&self) -> JobPoller {
        let ctx = self.router.context();
        JobPoller::new(ctx.ledger.clone(), ctx.sender.clone(), ctx.admins.clone())
    }
}

fn settings_from_args(args: &Args) -> BotSettings {
    let admins = args
        .admin_ids
        .iter()
        .map(|id| id.trim())
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect::<Vec<_>>();

    let mut settings = BotSettings::default().with_admins(admins);
    settings.idle_timeout = Duration::from_secs(args.idle_timeout_secs);
    settings.ai_timeout = Duration::from_secs(args.ai_timeout_secs);
    settings.collect_password = args.collect_password;
    settings.automation_enabled = !args.no_job_poller;
    settings
}
