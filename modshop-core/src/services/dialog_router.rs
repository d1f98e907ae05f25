// File: modshop-core/src/services/dialog_router.rs

use tracing::{debug, error, warn};

use modshop_common::error::Error;
use modshop_common::models::{InboundEvent, InboundKind};

use crate::services::admin_flow::AdminFlow;
use crate::services::bot_context::BotContext;
use crate::services::dialog_state::{ConversationState, UserState};
use crate::services::user_flow::UserFlow;
use crate::services::user_locks::UserLocks;

fn is_command(text: &str, command: &str) -> bool {
    text.trim().eq_ignore_ascii_case(command)
}

/// Entry point for every inbound event.
///
/// Order of precedence: identity commands, admin routing, attachment
/// dispatch, `menu`, the current state's handler, then the numeric menu.
pub struct DialogRouter {
    ctx: BotContext,
    users: UserFlow,
    admins: AdminFlow,
    locks: UserLocks,
}

impl DialogRouter {
    pub fn new(ctx: BotContext) -> Self {
        Self {
            users: UserFlow::new(ctx.clone()),
            admins: AdminFlow::new(ctx.clone()),
            locks: UserLocks::new(),
            ctx,
        }
    }

    pub fn context(&self) -> &BotContext {
        &self.ctx
    }

    /// Handles one event to completion. Never fails: errors are logged,
    /// the sender's state is cleared, they get an apology and the operators
    /// are alerted.
    pub async fn handle_event(&self, event: InboundEvent) {
        let sender = event.sender_id.clone();
        let _guard = self.locks.lock(&sender).await;

        if let Err(e) = self.route(event).await {
            self.ctx.clear_state(&sender).await;
            if e.is_store_failure() {
                error!("Store failure handling event from {}: {}", sender, e);
                self.ctx
                    .reply(&sender, "An unexpected error occurred. The admin has been notified.")
                    .await;
                self.ctx
                    .admins
                    .alert(&format!("Store failure while handling a message from {}: {}", sender, e))
                    .await;
            } else {
                warn!("Could not complete request from {}: {}", sender, e);
                self.ctx
                    .reply(&sender, "Sorry, we couldn't complete your request. An admin has been notified and will assist you.")
                    .await;
                self.ctx
                    .admins
                    .alert(&format!("Needs attention: request from {} failed: {}", sender, e))
                    .await;
            }
        }
    }

    async fn route(&self, event: InboundEvent) -> Result<(), Error> {
        let sender = event.sender_id.as_str();

        if let InboundKind::Text(text) = &event.kind {
            if is_command(text, "my id") {
                self.ctx.reply(sender, &format!("Your ID is: {}", sender)).await;
                return Ok(());
            }
            if is_command(text, "setup admin") {
                return self.setup_admin(sender).await;
            }
        }

        if self.ctx.admins.is_admin(sender).await?.is_some() {
            return self.route_admin(sender, &event.kind).await;
        }
        self.route_user(sender, &event.kind).await
    }

    async fn setup_admin(&self, sender: &str) -> Result<(), Error> {
        if self.ctx.admins.setup_admin(sender).await? {
            self.ctx.clear_state(sender).await;
            self.ctx.reply(sender, "You are now registered as an admin.").await;
            self.admins.show_menu(sender).await;
        } else {
            self.ctx
                .reply(sender, "You are not authorized to become an admin.")
                .await;
        }
        Ok(())
    }

    async fn route_admin(&self, sender: &str, kind: &InboundKind) -> Result<(), Error> {
        let InboundKind::Text(text) = kind else {
            debug!("Ignoring attachment from admin {}", sender);
            return Ok(());
        };

        if is_command(text, "menu") {
            self.ctx.clear_state(sender).await;
            self.admins.show_menu(sender).await;
            return Ok(());
        }

        match self.ctx.states.get_state(sender).await {
            Some(ConversationState::Admin(state)) => self.admins.handle_state(sender, state, text).await,
            Some(ConversationState::User(_)) => {
                // Left over from before this sender became an admin.
                self.ctx.clear_state(sender).await;
                self.admins.handle_menu_choice(sender, text).await
            }
            None => self.admins.handle_menu_choice(sender, text).await,
        }
    }

    async fn route_user(&self, sender: &str, kind: &InboundKind) -> Result<(), Error> {
        let state = match self.ctx.states.get_state(sender).await {
            Some(ConversationState::User(s)) => Some(s),
            Some(ConversationState::Admin(_)) => {
                self.ctx.clear_state(sender).await;
                None
            }
            None => None,
        };

        match kind {
            InboundKind::Image { url } => match state {
                Some(s) if s.expects_image() => self.users.handle_image(sender, s, url).await,
                Some(other) => {
                    debug!("Unexpected image from {} in state {}", sender, other.name());
                    self.users.reprompt(sender, &other).await;
                    Ok(())
                }
                None => {
                    debug!("Unexpected image from {} with no active state", sender);
                    self.users.show_menu(sender).await;
                    Ok(())
                }
            },
            InboundKind::Text(text) => {
                if is_command(text, "menu") {
                    self.ctx.clear_state(sender).await;
                    self.users.show_menu(sender).await;
                    return Ok(());
                }
                match state {
                    Some(s) => self.users.handle_state(sender, s, text).await,
                    None => self.users.handle_menu_choice(sender, text).await,
                }
            }
        }
    }
}
