use std::sync::Arc;

use modshop_common::traits::messaging_traits::MessageSender;
use modshop_common::traits::receipt_traits::ReceiptAnalyzer;
use modshop_common::traits::repository_traits::{
    AccountRepository, AdminRepository, CreationJobRepository, ModRepository, ReferenceRepository,
};

use crate::services::admin_directory::AdminDirectory;
use crate::services::conversation_state::ConversationStateStore;
use crate::services::dialog_state::{AdminState, UserState};
use crate::services::ledger_service::LedgerService;
use crate::services::reconciliation::ReceiptReconciler;
use crate::services::settings::BotSettings;

/// The store handles the dialog layer is built from.
#[derive(Clone)]
pub struct LedgerRepos {
    pub mods: Arc<dyn ModRepository + Send + Sync>,
    pub accounts: Arc<dyn AccountRepository + Send + Sync>,
    pub references: Arc<dyn ReferenceRepository + Send + Sync>,
    pub admins: Arc<dyn AdminRepository + Send + Sync>,
    pub jobs: Arc<dyn CreationJobRepository + Send + Sync>,
}

/// Everything a flow handler might need, passed around as one cheap clone.
#[derive(Clone)]
pub struct BotContext {
    pub settings: Arc<BotSettings>,
    pub ledger: Arc<LedgerService>,
    pub reconciler: Arc<ReceiptReconciler>,
    pub analyzer: Arc<dyn ReceiptAnalyzer + Send + Sync>,
    pub sender: Arc<dyn MessageSender + Send + Sync>,
    pub states: Arc<dyn ConversationStateStore>,
    pub admins: Arc<AdminDirectory>,
}

impl BotContext {
    pub fn new(
        settings: BotSettings,
        repos: LedgerRepos,
        analyzer: Arc<dyn ReceiptAnalyzer + Send + Sync>,
        sender: Arc<dyn MessageSender + Send + Sync>,
        states: Arc<dyn ConversationStateStore>,
    ) -> Self {
        let ledger = Arc::new(LedgerService::new(
            repos.mods.clone(),
            repos.accounts,
            repos.references,
            repos.jobs,
        ));
        let reconciler = Arc::new(ReceiptReconciler::new(repos.mods, settings.price_tolerance));
        let admins = Arc::new(AdminDirectory::new(
            settings.admin_ids.clone(),
            repos.admins,
            sender.clone(),
            settings.fallback_contact.clone(),
        ));
        Self {
            settings: Arc::new(settings),
            ledger,
            reconciler,
            analyzer,
            sender,
            states,
            admins,
        }
    }

    pub async fn reply(&self, user_id: &str, text: &str) {
        self.sender.send_text(user_id, text).await;
    }

    pub async fn set_user_state(&self, user_id: &str, state: UserState) {
        self.states.set_state(user_id, state.into()).await;
    }

    pub async fn set_admin_state(&self, user_id: &str, state: AdminState) {
        self.states.set_state(user_id, state.into()).await;
    }

    pub async fn clear_state(&self, user_id: &str) {
        self.states.clear_state(user_id).await;
    }
}
