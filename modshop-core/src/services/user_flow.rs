// File: modshop-core/src/services/user_flow.rs
//
// Buyer-facing menu and purchase / claims dialogs.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, error, info, warn};

use modshop_common::error::Error;
use modshop_common::models::{ClaimOutcome, NewCreationJob, RefNumber};

use crate::services::bot_context::BotContext;
use crate::services::dialog_state::{Answer, BuyerDetails, ModChoice, UserState};
use crate::services::reconciliation::PriceMatch;
use crate::services::validation_text;

static WANT_MOD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*(?:want\s+mod\s+)?(\d+)\s*$").unwrap());

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap());

const MIN_PASSWORD_LEN: usize = 6;

pub fn parse_want_mod(text: &str) -> Option<i32> {
    WANT_MOD_RE
        .captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

pub fn is_valid_email(text: &str) -> bool {
    EMAIL_RE.is_match(text.trim())
}

pub struct UserFlow {
    ctx: BotContext,
}

impl UserFlow {
    pub fn new(ctx: BotContext) -> Self {
        Self { ctx }
    }

    pub async fn show_menu(&self, user_id: &str) {
        let status = self.ctx.admins.storefront().await;
        let banner = if status.online {
            "Admin is ONLINE and can reply right away."
        } else {
            "Admin is currently OFFLINE. Orders are still processed automatically."
        };
        let menu = format!(
            "{banner}\n\n\
             Main menu:\n\
             1. View mods\n\
             2. Check remaining claims\n\
             3. Request a replacement account\n\
             4. Contact admin\n\n\
             Reply with a number. Type 'menu' anytime to come back here."
        );
        self.ctx.reply(user_id, &menu).await;
    }

    /// Root menu dispatch (no active state).
    pub async fn handle_menu_choice(&self, user_id: &str, text: &str) -> Result<(), Error> {
        match text.trim() {
            "1" => self.list_mods(user_id).await,
            "2" => {
                self.ask(user_id, UserState::AwaitingRefForCheck).await;
                Ok(())
            }
            "3" => {
                self.ask(user_id, UserState::AwaitingRefForReplacement).await;
                Ok(())
            }
            "4" => {
                self.ask(user_id, UserState::AwaitingAdminMessage).await;
                Ok(())
            }
            other => {
                debug!("Unrecognised menu input from {}: '{}'", user_id, other);
                self.show_menu(user_id).await;
                Ok(())
            }
        }
    }

    /// Stores `state` and sends its prompt.
    async fn ask(&self, user_id: &str, state: UserState) {
        let prompt = state.prompt();
        self.ctx.set_user_state(user_id, state).await;
        self.ctx.reply(user_id, &prompt).await;
    }

    /// Re-asks whatever the current state is waiting for.
    pub async fn reprompt(&self, user_id: &str, state: &UserState) {
        self.ctx.reply(user_id, &state.prompt()).await;
    }

    async fn list_mods(&self, user_id: &str) -> Result<(), Error> {
        let listings = self.ctx.ledger.list_mods().await?;
        if listings.is_empty() {
            self.ctx.reply(user_id, "No mods are available right now. Please check back later.").await;
            return Ok(());
        }

        for listing in &listings {
            let m = &listing.item;
            let mut text = format!("ID {}: {}\n", m.id, m.name);
            if let Some(desc) = &m.description {
                text.push_str(desc);
                text.push('\n');
            }
            text.push_str(&format!(
                "Price: ₱{}\nReplacement claims: {}\nIn stock: {}",
                m.price, m.default_claims_max, listing.stock
            ));
            self.ctx.reply(user_id, &text).await;
            if let Some(url) = &m.image_url {
                self.ctx.sender.send_image(user_id, url).await;
            }
        }
        self.ask(user_id, UserState::AwaitingWantMod).await;
        Ok(())
    }

    /// Text input while a user state is active.
    pub async fn handle_state(&self, user_id: &str, state: UserState, text: &str) -> Result<(), Error> {
        debug!("User {} in state {} sent text", user_id, state.name());
        match state {
            UserState::AwaitingWantMod => self.on_want_mod(user_id, text).await,
            UserState::AwaitingEmailForPurchase { mod_id } => self.on_email(user_id, mod_id, text).await,
            UserState::AwaitingPasswordForPurchase { mod_id, email } => {
                self.on_password(user_id, mod_id, email, text).await
            }
            s @ UserState::AwaitingReceiptForPurchase { .. } => {
                // Only an image moves this state forward.
                self.reprompt(user_id, &s).await;
                Ok(())
            }
            UserState::AwaitingManualRef { mod_id, buyer, image_url } => {
                self.on_manual_ref(user_id, mod_id, buyer, image_url, text).await
            }
            s @ UserState::AwaitingModConfirmation { .. } => self.on_confirmation(user_id, s, text).await,
            s @ UserState::AwaitingModClarification { .. } => self.on_clarification(user_id, s, text).await,
            UserState::AwaitingRefForCheck => self.on_check_claims(user_id, text).await,
            UserState::AwaitingRefForReplacement => self.on_replacement(user_id, text).await,
            UserState::AwaitingAdminMessage => self.on_admin_message(user_id, text).await,
        }
    }

    // ---------------------------------------------------------------
    // purchase
    // ---------------------------------------------------------------

    async fn on_want_mod(&self, user_id: &str, text: &str) -> Result<(), Error> {
        let Some(mod_id) = parse_want_mod(text) else {
            self.reprompt(user_id, &UserState::AwaitingWantMod).await;
            return Ok(());
        };
        let Some(item) = self.ctx.ledger.get_mod(mod_id).await? else {
            self.ctx
                .reply(user_id, &format!("Mod {} does not exist. Please type a mod ID from the list.", mod_id))
                .await;
            return Ok(());
        };

        self.ctx
            .reply(user_id, &format!("You chose {} (₱{}).", item.name, item.price))
            .await;
        self.ask(user_id, UserState::AwaitingEmailForPurchase { mod_id }).await;
        Ok(())
    }

    async fn on_email(&self, user_id: &str, mod_id: i32, text: &str) -> Result<(), Error> {
        let email = text.trim();
        if !is_valid_email(email) {
            self.ctx
                .reply(user_id, "That doesn't look like a valid email address. Please try again.")
                .await;
            return Ok(());
        }

        if self.ctx.settings.collect_password {
            self.ask(
                user_id,
                UserState::AwaitingPasswordForPurchase { mod_id, email: email.to_string() },
            )
            .await;
            return Ok(());
        }

        let buyer = BuyerDetails { email: Some(email.to_string()), password: None };
        self.ask_for_receipt(user_id, mod_id, buyer).await
    }

    async fn on_password(&self, user_id: &str, mod_id: i32, email: String, text: &str) -> Result<(), Error> {
        let password = text.trim();
        if password.chars().count() < MIN_PASSWORD_LEN || password.contains(char::is_whitespace) {
            self.ctx
                .reply(
                    user_id,
                    &format!(
                        "Password must be at least {} characters with no spaces. Please try again.",
                        MIN_PASSWORD_LEN
                    ),
                )
                .await;
            return Ok(());
        }
        let buyer = BuyerDetails { email: Some(email), password: Some(password.to_string()) };
        self.ask_for_receipt(user_id, mod_id, buyer).await
    }

    async fn ask_for_receipt(&self, user_id: &str, mod_id: i32, buyer: BuyerDetails) -> Result<(), Error> {
        let item = self.ctx.ledger.require_mod(mod_id).await?;
        let status = self.ctx.admins.storefront().await;
        self.ctx
            .reply(
                user_id,
                &format!(
                    "Please send ₱{} via GCash to {}.\nAfter paying, send a screenshot of the receipt here.",
                    item.price, status.contact_number
                ),
            )
            .await;
        self.ctx
            .set_user_state(user_id, UserState::AwaitingReceiptForPurchase { mod_id, buyer })
            .await;
        Ok(())
    }

    /// A receipt image arrived while one was expected.
    /// An image sent while `state` expects one.
    pub async fn handle_image(&self, user_id: &str, state: UserState, image_url: &str) -> Result<(), Error> {
        match state {
            UserState::AwaitingReceiptForPurchase { mod_id, buyer } => {
                info!("Receipt image from {} for mod {}", user_id, mod_id);
                self.handle_receipt(user_id, mod_id, buyer, image_url).await
            }
            other => {
                self.reprompt(user_id, &other).await;
                Ok(())
            }
        }
    }

    pub async fn handle_receipt(&self, user_id: &str, mod_id: i32, buyer: BuyerDetails, image_url: &str) -> Result<(), Error> {
        self.ctx.reply(user_id, "Thanks! Checking your receipt, please wait...").await;

        let analysis = match tokio::time::timeout(self.ctx.settings.ai_timeout, self.ctx.analyzer.analyze(image_url)).await {
            Ok(Ok(a)) => a,
            Ok(Err(e)) => {
                warn!("Receipt analysis failed for {}: {}", user_id, e);
                return self.fall_back_to_manual(user_id, mod_id, buyer, image_url).await;
            }
            Err(_) => {
                warn!("Receipt analysis timed out for {}", user_id);
                return self.fall_back_to_manual(user_id, mod_id, buyer, image_url).await;
            }
        };

        match self.ctx.reconciler.reconcile(&analysis).await {
            Ok((receipt, PriceMatch::Single(item))) => {
                self.ask(
                    user_id,
                    UserState::AwaitingModConfirmation {
                        ref_number: receipt.ref_number,
                        mod_id: item.id,
                        mod_name: item.name,
                        buyer,
                        manual_receipt: None,
                    },
                )
                .await;
                Ok(())
            }
            Ok((receipt, PriceMatch::Ambiguous(items))) => {
                let candidates = items
                    .into_iter()
                    .map(|m| ModChoice { id: m.id, name: m.name })
                    .collect();
                self.ask(
                    user_id,
                    UserState::AwaitingModClarification { ref_number: receipt.ref_number, candidates, buyer },
                )
                .await;
                Ok(())
            }
            Err(e @ (Error::UnreadableReceipt { .. } | Error::NoPriceMatch { .. })) => {
                self.escalate_receipt(user_id, &buyer, image_url, &e).await;
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn fall_back_to_manual(&self, user_id: &str, mod_id: i32, buyer: BuyerDetails, image_url: &str) -> Result<(), Error> {
        self.ctx
            .reply(user_id, "We couldn't read your receipt automatically.")
            .await;
        self.ask(
            user_id,
            UserState::AwaitingManualRef { mod_id, buyer, image_url: image_url.to_string() },
        )
        .await;
        Ok(())
    }

    async fn escalate_receipt(&self, user_id: &str, buyer: &BuyerDetails, image_url: &str, err: &Error) {
        warn!("Escalating receipt from {}: {}", user_id, err);
        self.ctx.clear_state(user_id).await;
        self.ctx
            .reply(
                user_id,
                "We couldn't match your payment automatically. An admin will review your receipt and assist you shortly.",
            )
            .await;

        let name = self.ctx.sender.user_display_name(user_id).await;
        let detail = match err {
            Error::UnreadableReceipt { amount, reference } => format!(
                "Unreadable receipt.\nExtracted amount: '{}'\nExtracted reference: '{}'",
                amount, reference
            ),
            Error::NoPriceMatch { amount } => format!("No mod is priced at ₱{}.", amount),
            other => other.to_string(),
        };
        self.ctx
            .admins
            .alert(&format!(
                "Receipt needs manual review.\nUser: {} ({})\nEmail: {}\n{}",
                name,
                user_id,
                buyer.email.as_deref().unwrap_or("-"),
                detail
            ))
            .await;
        self.ctx.admins.alert_image(image_url).await;
    }

    async fn on_manual_ref(
        &self,
        user_id: &str,
        mod_id: i32,
        buyer: BuyerDetails,
        image_url: String,
        text: &str,
    ) -> Result<(), Error> {
        let ref_number = match RefNumber::parse(text) {
            Ok(r) => r,
            Err(e) => {
                self.ctx.reply(user_id, &format!("{}. Please type the 13 digits only.", validation_text(&e))).await;
                return Ok(());
            }
        };
        let item = self.ctx.ledger.require_mod(mod_id).await?;
        self.ask(
            user_id,
            UserState::AwaitingModConfirmation {
                ref_number,
                mod_id: item.id,
                mod_name: item.name,
                buyer,
                manual_receipt: Some(image_url),
            },
        )
        .await;
        Ok(())
    }

    async fn on_confirmation(&self, user_id: &str, state: UserState, text: &str) -> Result<(), Error> {
        let UserState::AwaitingModConfirmation { ref_number, mod_id, mod_name, buyer, manual_receipt } = state else {
            return Ok(());
        };
        match Answer::parse(text) {
            Some(Answer::Yes) => {
                self.finalize_order(user_id, &ref_number, mod_id, &mod_name, &buyer, manual_receipt.as_deref())
                    .await
            }
            Some(Answer::No) => {
                info!("User {} declined order for reference {}", user_id, ref_number);
                self.ctx.clear_state(user_id).await;
                self.ctx.reply(user_id, "Okay, the order was cancelled. Type 'menu' to start again.").await;
                Ok(())
            }
            None => {
                self.ctx
                    .reply(user_id, &format!("Please reply 'yes' or 'no'. Is your purchase for '{}'?", mod_name))
                    .await;
                Ok(())
            }
        }
    }

    async fn on_clarification(&self, user_id: &str, state: UserState, text: &str) -> Result<(), Error> {
        let picked = text.trim().parse::<i32>().ok();
        let UserState::AwaitingModClarification { ref_number, candidates, buyer } = &state else {
            return Ok(());
        };
        match picked.and_then(|id| candidates.iter().find(|c| c.id == id)) {
            Some(choice) => {
                self.finalize_order(user_id, ref_number, choice.id, &choice.name, buyer, None).await
            }
            None => {
                self.reprompt(user_id, &state).await;
                Ok(())
            }
        }
    }

    async fn finalize_order(
        &self,
        user_id: &str,
        ref_number: &RefNumber,
        mod_id: i32,
        mod_name: &str,
        buyer: &BuyerDetails,
        manual_receipt: Option<&str>,
    ) -> Result<(), Error> {
        self.ctx.clear_state(user_id).await;
        let name = self.ctx.sender.user_display_name(user_id).await;

        let claims_max = match self.ctx.ledger.add_reference(ref_number, user_id, mod_id).await {
            Ok(c) => c,
            Err(Error::DuplicateReference(_)) => {
                warn!("User {} resubmitted reference {}", user_id, ref_number);
                self.ctx
                    .reply(user_id, "This reference number has already been used. If you think this is a mistake, please contact the admin.")
                    .await;
                self.ctx
                    .admins
                    .alert(&format!(
                        "Duplicate reference submitted.\nUser: {} ({})\nReference: {}\nMod: {}",
                        name, user_id, ref_number, mod_name
                    ))
                    .await;
                return Ok(());
            }
            Err(e) => {
                error!("Could not register reference {} for {}: {}", ref_number, user_id, e);
                self.ctx
                    .reply(user_id, "An unexpected error occurred while registering your payment. The admin has been notified.")
                    .await;
                self.ctx
                    .admins
                    .alert(&format!(
                        "Failed to register reference {} for {} ({}), mod {}: {}",
                        ref_number, name, user_id, mod_id, e
                    ))
                    .await;
                return Ok(());
            }
        };

        self.ctx
            .reply(
                user_id,
                &format!(
                    "Payment confirmed for {}!\nReference {} is registered with {} replacement claim(s).",
                    mod_name, ref_number, claims_max
                ),
            )
            .await;

        let job_id = self.queue_creation_job(user_id, mod_id, buyer).await;
        match job_id {
            Some(_) => {
                self.ctx
                    .reply(user_id, "Your account is being created automatically. You'll receive the details here shortly.")
                    .await;
            }
            None => {
                self.ctx
                    .reply(user_id, "An admin will create your account and send the details here.")
                    .await;
            }
        }

        let mut alert = format!(
            "New order{}.\nUser: {} ({})\nMod: {} (ID {})\nReference: {}\nClaims: {}\nEmail: {}",
            if manual_receipt.is_some() { " (manual registration)" } else { "" },
            name,
            user_id,
            mod_name,
            mod_id,
            ref_number,
            claims_max,
            buyer.email.as_deref().unwrap_or("-"),
        );
        if let Some(id) = job_id {
            alert.push_str(&format!("\nCreation job: #{}", id));
        }
        self.ctx.admins.alert(&alert).await;
        if let Some(url) = manual_receipt {
            self.ctx.admins.alert_image(url).await;
        }
        Ok(())
    }

    async fn queue_creation_job(&self, user_id: &str, mod_id: i32, buyer: &BuyerDetails) -> Option<i32> {
        if !self.ctx.settings.automation_enabled {
            return None;
        }
        let (Some(email), Some(password)) = (&buyer.email, &buyer.password) else {
            return None;
        };
        let job = NewCreationJob {
            user_id: user_id.to_string(),
            email: email.clone(),
            password: password.clone(),
            mod_id,
        };
        match self.ctx.ledger.queue_creation_job(&job).await {
            Ok(id) => Some(id),
            Err(e) => {
                error!("Could not queue creation job for {}: {}", user_id, e);
                None
            }
        }
    }

    // ---------------------------------------------------------------
    // claims
    // ---------------------------------------------------------------

    async fn on_check_claims(&self, user_id: &str, text: &str) -> Result<(), Error> {
        let ref_number = match RefNumber::parse(text) {
            Ok(r) => r,
            Err(e) => {
                self.ctx.reply(user_id, &format!("{}. Please try again.", validation_text(&e))).await;
                return Ok(());
            }
        };
        self.ctx.clear_state(user_id).await;

        match self.ctx.ledger.get_reference(&ref_number).await? {
            Some(details) => {
                let r = &details.reference;
                self.ctx
                    .reply(
                        user_id,
                        &format!(
                            "Reference {}\nMod: {} (ID {})\nRemaining claims: {} of {}",
                            ref_number,
                            details.mod_name,
                            r.mod_id,
                            r.remaining_claims(),
                            r.claims_max
                        ),
                    )
                    .await;
            }
            None => {
                self.ctx.reply(user_id, "Reference number not found.").await;
            }
        }
        Ok(())
    }

    async fn on_replacement(&self, user_id: &str, text: &str) -> Result<(), Error> {
        let ref_number = match RefNumber::parse(text) {
            Ok(r) => r,
            Err(e) => {
                self.ctx.reply(user_id, &format!("{}. Please try again.", validation_text(&e))).await;
                return Ok(());
            }
        };
        self.ctx.clear_state(user_id).await;

        match self.ctx.ledger.try_claim(&ref_number).await? {
            ClaimOutcome::Granted(grant) => {
                info!(
                    "User {} claimed replacement account {} with {}",
                    user_id, grant.account.id, ref_number
                );
                self.ctx
                    .reply(
                        user_id,
                        &format!(
                            "Here is your replacement account for {}:\nUsername: {}\nPassword: {}\n\nClaims left: {}",
                            grant.mod_name,
                            grant.account.username,
                            grant.account.password,
                            grant.claims_max - grant.claims_used
                        ),
                    )
                    .await;
            }
            ClaimOutcome::Exhausted { claims_used, claims_max } => {
                self.ctx
                    .reply(
                        user_id,
                        &format!("You have no claims left on this reference ({} of {} used).", claims_used, claims_max),
                    )
                    .await;
            }
            ClaimOutcome::OutOfStock { mod_id } => {
                self.ctx
                    .reply(user_id, "Sorry, no replacement accounts are in stock right now. Please contact the admin.")
                    .await;
                self.ctx
                    .admins
                    .alert(&format!(
                        "Out of stock: user {} requested a replacement for mod {} (reference {}).",
                        user_id, mod_id, ref_number
                    ))
                    .await;
            }
            ClaimOutcome::NotFound => {
                self.ctx.reply(user_id, "Reference number not found.").await;
            }
        }
        Ok(())
    }

    async fn on_admin_message(&self, user_id: &str, text: &str) -> Result<(), Error> {
        let message = text.trim();
        if message.is_empty() {
            self.reprompt(user_id, &UserState::AwaitingAdminMessage).await;
            return Ok(());
        }
        self.ctx.clear_state(user_id).await;
        let name = self.ctx.sender.user_display_name(user_id).await;
        self.ctx
            .admins
            .alert(&format!("Message from {} ({}):\n{}", name, user_id, message))
            .await;
        self.ctx
            .reply(user_id, "Your message has been sent to the admin. They will reply here.")
            .await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn want_mod_accepts_bare_id_and_phrase() {
        assert_eq!(parse_want_mod("2"), Some(2));
        assert_eq!(parse_want_mod("Want Mod 12"), Some(12));
        assert_eq!(parse_want_mod("want 3"), None);
        assert_eq!(parse_want_mod("two"), None);
    }

    #[test]
    fn email_check_is_basic() {
        assert!(is_valid_email("a@b.com"));
        assert!(is_valid_email(" buyer.one@mail.example.ph "));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("a b@c.com"));
        assert!(!is_valid_email("@b.com"));
    }
}
