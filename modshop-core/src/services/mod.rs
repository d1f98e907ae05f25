pub mod admin_directory;
pub mod admin_flow;
pub mod bot_context;
pub mod conversation_state;
pub mod dialog_router;
pub mod dialog_state;
pub mod ledger_service;
pub mod reconciliation;
pub mod settings;
pub mod user_flow;
pub mod user_locks;

pub use admin_directory::{AdminDirectory, StorefrontStatus};
pub use bot_context::{BotContext, LedgerRepos};
pub use conversation_state::{Clock, ConversationStateStore, InMemoryConversationStore, SystemClock};
pub use dialog_router::DialogRouter;
pub use dialog_state::{AdminState, ConversationState, UserState};
pub use ledger_service::LedgerService;
pub use reconciliation::{PriceMatch, ReceiptReconciler};
pub use settings::BotSettings;
pub use user_locks::UserLocks;

use modshop_common::error::Error;

/// Text shown to a person for an input error, without the error-kind prefix.
pub(crate) fn validation_text(e: &Error) -> String {
    match e {
        Error::Validation(msg) => msg.clone(),
        other => other.to_string(),
    }
}
