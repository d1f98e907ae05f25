// File: modshop-core/tests/common/mod.rs
//
// Wires a DialogRouter to in-memory collaborators.

#![allow(dead_code)]

use std::sync::Arc;

use rust_decimal::Decimal;

use modshop_core::models::{InboundEvent, RefNumber};
use modshop_core::services::{
    BotContext, BotSettings, ConversationState, ConversationStateStore, DialogRouter,
    InMemoryConversationStore, LedgerRepos,
};
use modshop_core::test_utils::{mod_item, InMemoryLedger, RecordingSender, StaticAnalyzer};

pub const ADMIN: &str = "admin-1";
pub const BUYER: &str = "buyer-1";

pub fn price(s: &str) -> Decimal {
    s.parse().expect("test price")
}

pub fn rn(s: &str) -> RefNumber {
    RefNumber::parse(s).expect("test reference")
}

pub struct Harness {
    pub ledger: Arc<InMemoryLedger>,
    pub sender: Arc<RecordingSender>,
    pub analyzer: Arc<StaticAnalyzer>,
    pub states: Arc<InMemoryConversationStore>,
    pub router: DialogRouter,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_settings(BotSettings::default())
    }

    pub fn with_settings(settings: BotSettings) -> Self {
        Self::build(settings.with_admins([ADMIN]), StaticAnalyzer::returning("0", "0"))
    }

    pub fn build(settings: BotSettings, analyzer: StaticAnalyzer) -> Self {
        let ledger = Arc::new(InMemoryLedger::new());
        let sender = Arc::new(RecordingSender::new());
        let analyzer = Arc::new(analyzer);
        let states = Arc::new(InMemoryConversationStore::new(settings.idle_timeout));

        let repos = LedgerRepos {
            mods: ledger.clone(),
            accounts: ledger.clone(),
            references: ledger.clone(),
            admins: ledger.clone(),
            jobs: ledger.clone(),
        };
        let ctx = BotContext::new(settings, repos, analyzer.clone(), sender.clone(), states.clone());

        Self {
            ledger,
            sender,
            analyzer,
            states,
            router: DialogRouter::new(ctx),
        }
    }

    /// Catalog used by most scenarios: two mods share a price.
    pub fn with_catalog(self) -> Self {
        self.ledger.insert_mod(mod_item(1, "Alpha", price("100.00"), 1));
        self.ledger.insert_mod(mod_item(2, "Beta", price("250.00"), 3));
        self.ledger.insert_mod(mod_item(3, "Gamma", price("100.00"), 2));
        self
    }

    pub async fn say(&self, from: &str, text: &str) {
        self.router.handle_event(InboundEvent::text(from, text)).await;
    }

    pub async fn send_image(&self, from: &str, url: &str) {
        self.router.handle_event(InboundEvent::image(from, url)).await;
    }

    pub async fn state(&self, user_id: &str) -> Option<ConversationState> {
        self.states.get_state(user_id).await
    }

    pub fn last_reply(&self, user_id: &str) -> String {
        self.sender.last_text_to(user_id).unwrap_or_default()
    }

    /// Registers `ADMIN` through the chat command.
    pub async fn setup_admin(&self) {
        self.say(ADMIN, "setup admin").await;
        self.sender.clear();
    }
}
