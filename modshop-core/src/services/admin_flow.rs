// File: modshop-core/src/services/admin_flow.rs
//
// Admin console: catalog, inventory and ledger maintenance.

use std::str::FromStr;

use tracing::{debug, info, warn};

use modshop_common::error::Error;
use modshop_common::models::{parse_price, ModField, ModItem, RefNumber, ADMIN_ADDED};

use crate::services::bot_context::BotContext;
use crate::services::dialog_state::{AdminState, Answer, NewModDraft, NewModStep};
use crate::services::validation_text;

const ADMIN_MENU: &str = "Admin menu:\n\
    1. View references\n\
    2. Add bulk accounts\n\
    3. Edit mod\n\
    4. Add reference\n\
    5. Edit admin contact number\n\
    6. Edit reference's mod\n\
    7. Add new mod\n\
    8. Delete reference\n\
    9. Bulk add references\n\
    10. Toggle online/offline\n\
    11. Send account to user\n\
    12. View recent creation jobs";

fn parse_id(text: &str) -> Option<i32> {
    text.trim().parse::<i32>().ok().filter(|id| *id >= 0)
}

fn is_skip(text: &str) -> bool {
    text.trim().eq_ignore_ascii_case("skip")
}

fn is_valid_contact(text: &str) -> bool {
    let digits = text.chars().filter(|c| c.is_ascii_digit()).count();
    (7..=15).contains(&digits)
        && text.chars().all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | ' '))
}

pub struct AdminFlow {
    ctx: BotContext,
}

impl AdminFlow {
    pub fn new(ctx: BotContext) -> Self {
        Self { ctx }
    }

    pub async fn show_menu(&self, admin_id: &str) {
        let online = match self.ctx.admins.is_admin(admin_id).await {
            Ok(Some(rec)) => rec.is_online,
            _ => false,
        };
        let status = if online { "ONLINE" } else { "OFFLINE" };
        self.ctx
            .reply(admin_id, &format!("You are {}.\n\n{}", status, ADMIN_MENU))
            .await;
    }

    async fn ask(&self, admin_id: &str, state: AdminState, prompt: &str) {
        self.ctx.set_admin_state(admin_id, state).await;
        self.ctx.reply(admin_id, prompt).await;
    }

    pub async fn handle_menu_choice(&self, admin_id: &str, text: &str) -> Result<(), Error> {
        match text.trim() {
            "1" => self.show_reference_page(admin_id, 0).await,
            "2" => {
                self.ask(admin_id, AdminState::AwaitingBulkAccountsModId, "Enter the mod ID to add accounts to:")
                    .await;
                Ok(())
            }
            "3" => {
                self.ask(admin_id, AdminState::AwaitingEditModId, "Enter the ID of the mod to edit:")
                    .await;
                Ok(())
            }
            "4" => {
                self.ask(admin_id, AdminState::AwaitingAddRefNumber, "Enter the 13-digit reference number to add:")
                    .await;
                Ok(())
            }
            "5" => {
                let current = self.ctx.admins.storefront().await.contact_number;
                self.ask(
                    admin_id,
                    AdminState::AwaitingEditAdminContact,
                    &format!("Current contact number: {}\nEnter the new contact number:", current),
                )
                .await;
                Ok(())
            }
            "6" => {
                self.ask(admin_id, AdminState::AwaitingEditRefNumber, "Enter the reference number to reassign:")
                    .await;
                Ok(())
            }
            "7" => {
                let step = NewModStep::Id;
                self.ask(
                    admin_id,
                    AdminState::AwaitingNewMod { draft: NewModDraft::default(), step },
                    step.prompt(),
                )
                .await;
                Ok(())
            }
            "8" => {
                self.ask(admin_id, AdminState::AwaitingDeleteRef, "Enter the 13-digit reference number to delete:")
                    .await;
                Ok(())
            }
            "9" => {
                self.ask(admin_id, AdminState::AwaitingBulkRefsModId, "Enter the mod ID for the references:")
                    .await;
                Ok(())
            }
            "10" => {
                let online = self.ctx.admins.toggle_online(admin_id).await?;
                info!("Admin {} is now {}", admin_id, if online { "online" } else { "offline" });
                self.ctx
                    .reply(admin_id, if online { "You are now ONLINE." } else { "You are now OFFLINE." })
                    .await;
                Ok(())
            }
            "11" => {
                self.ask(admin_id, AdminState::RelayTargetUser, "Enter the recipient's user ID:")
                    .await;
                Ok(())
            }
            "12" => self.show_recent_jobs(admin_id).await,
            other => {
                debug!("Unrecognised admin input: '{}'", other);
                self.show_menu(admin_id).await;
                Ok(())
            }
        }
    }

    pub async fn handle_state(&self, admin_id: &str, state: AdminState, text: &str) -> Result<(), Error> {
        debug!("Admin {} in state {} sent text", admin_id, state.name());
        let text = text.trim();
        match state {
            AdminState::ViewingReferences { page } => match text {
                "1" => self.show_reference_page(admin_id, page + 1).await,
                "2" => self.show_reference_page(admin_id, page.saturating_sub(1)).await,
                _ => {
                    self.ctx
                        .reply(admin_id, "Reply 1 for the next page, 2 for the previous page, or 'menu' to go back.")
                        .await;
                    Ok(())
                }
            },

            AdminState::AwaitingBulkAccountsModId => {
                let Some(mod_id) = self.existing_mod_id(admin_id, text).await? else {
                    return Ok(());
                };
                self.ask(
                    admin_id,
                    AdminState::AwaitingBulkAccountsList { mod_id },
                    "Send the accounts, one 'username:password' per line:",
                )
                .await;
                Ok(())
            }
            AdminState::AwaitingBulkAccountsList { mod_id } => {
                match self.ctx.ledger.add_bulk_accounts(mod_id, text).await {
                    Ok(added) => {
                        self.ctx.clear_state(admin_id).await;
                        self.ctx
                            .reply(admin_id, &format!("Added {} account(s) to mod {}.", added, mod_id))
                            .await;
                        Ok(())
                    }
                    Err(Error::Validation(msg)) => {
                        self.ctx.reply(admin_id, &msg).await;
                        Ok(())
                    }
                    Err(e) => Err(e),
                }
            }

            AdminState::AwaitingEditModId => {
                let Some(mod_id) = self.existing_mod_id(admin_id, text).await? else {
                    return Ok(());
                };
                let item = self.ctx.ledger.require_mod(mod_id).await?;
                self.ctx.reply(admin_id, &describe_mod(&item)).await;
                self.ask_field(admin_id, mod_id).await;
                Ok(())
            }
            AdminState::AwaitingEditModField { mod_id } => match ModField::from_str(text) {
                Ok(field) => {
                    self.ask(
                        admin_id,
                        AdminState::AwaitingEditModValue { mod_id, field },
                        &format!("Enter the new {}:", field),
                    )
                    .await;
                    Ok(())
                }
                Err(_) => {
                    self.ctx
                        .reply(admin_id, &format!("Unknown field. Choose {}.", ModField::CHOICES))
                        .await;
                    Ok(())
                }
            },
            AdminState::AwaitingEditModValue { mod_id, field } => {
                let update = match field.parse_value(text) {
                    Ok(u) => u,
                    Err(e) => {
                        self.ctx.reply(admin_id, &validation_text(&e)).await;
                        return Ok(());
                    }
                };
                match self.ctx.ledger.update_mod(mod_id, update).await {
                    Ok(()) => {
                        info!("Admin {} changed {} of mod {}", admin_id, field, mod_id);
                        self.ask(
                            admin_id,
                            AdminState::AwaitingEditModContinue { mod_id },
                            &format!("Mod {} {} updated. Edit another field? (yes/no)", mod_id, field),
                        )
                        .await;
                        Ok(())
                    }
                    Err(Error::DuplicateMod(_)) => {
                        self.ctx
                            .reply(admin_id, "Another mod already has that name. Enter a different value:")
                            .await;
                        Ok(())
                    }
                    Err(Error::ModNotFound(_)) => {
                        self.ctx.clear_state(admin_id).await;
                        self.ctx.reply(admin_id, &format!("Mod {} no longer exists.", mod_id)).await;
                        Ok(())
                    }
                    Err(e) => Err(e),
                }
            }
            AdminState::AwaitingEditModContinue { mod_id } => match Answer::parse(text) {
                Some(Answer::Yes) => {
                    self.ask_field(admin_id, mod_id).await;
                    Ok(())
                }
                Some(Answer::No) => {
                    self.ctx.clear_state(admin_id).await;
                    self.ctx.reply(admin_id, "Done editing. Type 'menu' for the admin menu.").await;
                    Ok(())
                }
                None => {
                    self.ctx.reply(admin_id, "Please reply 'yes' or 'no'.").await;
                    Ok(())
                }
            },

            AdminState::AwaitingAddRefNumber => {
                let Some(ref_number) = self.parse_ref_or_reprompt(admin_id, text).await else {
                    return Ok(());
                };
                self.ask(
                    admin_id,
                    AdminState::AwaitingAddRefModId { ref_number },
                    "Enter the mod ID for this reference:",
                )
                .await;
                Ok(())
            }
            AdminState::AwaitingAddRefModId { ref_number } => {
                let Some(mod_id) = parse_id(text) else {
                    self.ctx.reply(admin_id, "Invalid mod ID. Please enter a number.").await;
                    return Ok(());
                };
                match self.ctx.ledger.add_reference(&ref_number, ADMIN_ADDED, mod_id).await {
                    Ok(claims) => {
                        self.ctx.clear_state(admin_id).await;
                        self.ctx
                            .reply(
                                admin_id,
                                &format!("Reference {} added for mod {} with {} claim(s).", ref_number, mod_id, claims),
                            )
                            .await;
                        Ok(())
                    }
                    Err(Error::ModNotFound(_)) => {
                        self.ctx
                            .reply(admin_id, &format!("Mod {} not found. Enter a valid mod ID:", mod_id))
                            .await;
                        Ok(())
                    }
                    Err(Error::DuplicateReference(_)) => {
                        self.ctx.clear_state(admin_id).await;
                        self.ctx
                            .reply(admin_id, &format!("Reference {} already exists.", ref_number))
                            .await;
                        Ok(())
                    }
                    Err(e) => Err(e),
                }
            }

            AdminState::AwaitingBulkRefsModId => {
                let Some(mod_id) = self.existing_mod_id(admin_id, text).await? else {
                    return Ok(());
                };
                self.ask(
                    admin_id,
                    AdminState::AwaitingBulkRefsList { mod_id },
                    "Send the reference numbers, one per line:",
                )
                .await;
                Ok(())
            }
            AdminState::AwaitingBulkRefsList { mod_id } => {
                let outcome = self.ctx.ledger.add_bulk_references(mod_id, ADMIN_ADDED, text).await?;
                if outcome.added.is_empty() && outcome.duplicates.is_empty() {
                    self.ctx
                        .reply(admin_id, "No valid 13-digit reference numbers found. Send one per line:")
                        .await;
                    return Ok(());
                }
                self.ctx.clear_state(admin_id).await;
                let mut msg = format!("Added {} reference(s) to mod {}.", outcome.added.len(), mod_id);
                if !outcome.duplicates.is_empty() {
                    let list: Vec<&str> = outcome.duplicates.iter().map(|r| r.as_str()).collect();
                    msg.push_str(&format!("\nAlready existed ({}): {}", list.len(), list.join(", ")));
                }
                if !outcome.invalid.is_empty() {
                    msg.push_str(&format!(
                        "\nInvalid ({}): {}",
                        outcome.invalid.len(),
                        outcome.invalid.join(", ")
                    ));
                }
                self.ctx.reply(admin_id, &msg).await;
                Ok(())
            }

            AdminState::AwaitingEditAdminContact => {
                if !is_valid_contact(text) {
                    self.ctx
                        .reply(admin_id, "Invalid contact number. Use digits only (e.g. 09171234567):")
                        .await;
                    return Ok(());
                }
                self.ctx.admins.set_contact(admin_id, text).await?;
                self.ctx.clear_state(admin_id).await;
                self.ctx
                    .reply(admin_id, &format!("Contact number updated to {}.", text))
                    .await;
                Ok(())
            }

            AdminState::AwaitingEditRefNumber => {
                let Some(ref_number) = self.parse_ref_or_reprompt(admin_id, text).await else {
                    return Ok(());
                };
                let Some(details) = self.ctx.ledger.get_reference(&ref_number).await? else {
                    self.ctx
                        .reply(admin_id, "Reference not found. Enter another reference number:")
                        .await;
                    return Ok(());
                };
                self.ask(
                    admin_id,
                    AdminState::AwaitingEditRefModId { ref_number },
                    &format!(
                        "Reference currently belongs to mod {} ({}). Enter the new mod ID:",
                        details.reference.mod_id, details.mod_name
                    ),
                )
                .await;
                Ok(())
            }
            AdminState::AwaitingEditRefModId { ref_number } => {
                let Some(mod_id) = parse_id(text) else {
                    self.ctx.reply(admin_id, "Invalid mod ID. Please enter a number.").await;
                    return Ok(());
                };
                match self.ctx.ledger.update_reference_mod(&ref_number, mod_id).await {
                    Ok(true) => {
                        info!("Admin {} moved reference {} to mod {}", admin_id, ref_number, mod_id);
                        self.ctx.clear_state(admin_id).await;
                        self.ctx
                            .reply(admin_id, &format!("Reference {} now belongs to mod {}.", ref_number, mod_id))
                            .await;
                        Ok(())
                    }
                    Ok(false) => {
                        self.ctx.clear_state(admin_id).await;
                        self.ctx.reply(admin_id, "Reference not found.").await;
                        Ok(())
                    }
                    Err(Error::ModNotFound(_)) => {
                        self.ctx
                            .reply(admin_id, &format!("Mod {} not found. Enter a valid mod ID:", mod_id))
                            .await;
                        Ok(())
                    }
                    Err(e) => Err(e),
                }
            }

            AdminState::AwaitingDeleteRef => {
                let Some(ref_number) = self.parse_ref_or_reprompt(admin_id, text).await else {
                    return Ok(());
                };
                let removed = self.ctx.ledger.delete_reference(&ref_number).await?;
                self.ctx.clear_state(admin_id).await;
                let msg = if removed {
                    format!("Reference {} deleted.", ref_number)
                } else {
                    format!("Reference {} not found.", ref_number)
                };
                self.ctx.reply(admin_id, &msg).await;
                Ok(())
            }

            AdminState::AwaitingNewMod { draft, step } => self.on_new_mod_step(admin_id, draft, step, text).await,

            AdminState::RelayTargetUser => {
                if text.is_empty() || text.contains(char::is_whitespace) {
                    self.ctx.reply(admin_id, "Enter a single user ID:").await;
                    return Ok(());
                }
                self.ask(
                    admin_id,
                    AdminState::RelayUsername { target: text.to_string() },
                    "Enter the account username:",
                )
                .await;
                Ok(())
            }
            AdminState::RelayUsername { target } => {
                if text.is_empty() {
                    self.ctx.reply(admin_id, "Username cannot be empty:").await;
                    return Ok(());
                }
                self.ask(
                    admin_id,
                    AdminState::RelayPassword { target, username: text.to_string() },
                    "Enter the account password:",
                )
                .await;
                Ok(())
            }
            AdminState::RelayPassword { target, username } => {
                if text.is_empty() {
                    self.ctx.reply(admin_id, "Password cannot be empty:").await;
                    return Ok(());
                }
                self.ctx
                    .reply(
                        &target,
                        &format!(
                            "Your account is ready!\nUsername: {}\nPassword: {}\n\nThank you for your purchase.",
                            username, text
                        ),
                    )
                    .await;
                self.ctx.clear_state(admin_id).await;
                info!("Admin {} sent account details to {}", admin_id, target);
                self.ctx
                    .reply(admin_id, &format!("Account details sent to {}.", target))
                    .await;
                Ok(())
            }
        }
    }

    async fn ask_field(&self, admin_id: &str, mod_id: i32) {
        self.ask(
            admin_id,
            AdminState::AwaitingEditModField { mod_id },
            &format!("Which field do you want to edit? ({})", ModField::CHOICES),
        )
        .await;
    }

    /// Parses a mod id and checks it exists; re-prompts (state kept) otherwise.
    async fn existing_mod_id(&self, admin_id: &str, text: &str) -> Result<Option<i32>, Error> {
        let Some(mod_id) = parse_id(text) else {
            self.ctx.reply(admin_id, "Invalid mod ID. Please enter a number.").await;
            return Ok(None);
        };
        if self.ctx.ledger.get_mod(mod_id).await?.is_none() {
            self.ctx
                .reply(admin_id, &format!("Mod {} not found. Enter a valid mod ID:", mod_id))
                .await;
            return Ok(None);
        }
        Ok(Some(mod_id))
    }

    async fn parse_ref_or_reprompt(&self, admin_id: &str, text: &str) -> Option<RefNumber> {
        match RefNumber::parse(text) {
            Ok(r) => Some(r),
            Err(e) => {
                warn!("Admin {} entered invalid reference '{}'", admin_id, text);
                self.ctx
                    .reply(admin_id, &format!("{}. Please enter exactly 13 digits:", validation_text(&e)))
                    .await;
                None
            }
        }
    }

    async fn show_reference_page(&self, admin_id: &str, page: usize) -> Result<(), Error> {
        let refs = self.ctx.ledger.list_references().await?;
        if refs.is_empty() {
            self.ctx.clear_state(admin_id).await;
            self.ctx.reply(admin_id, "No references yet.").await;
            return Ok(());
        }

        let per_page = self.ctx.settings.refs_per_page.max(1);
        let pages = refs.len().div_ceil(per_page);
        let page = page.min(pages - 1);

        let mut msg = format!("References (page {} of {}):\n", page + 1, pages);
        for d in refs.iter().skip(page * per_page).take(per_page) {
            let r = &d.reference;
            msg.push_str(&format!(
                "\n{} | mod {} ({}) | {}/{} used | {} | {}",
                r.ref_number,
                r.mod_id,
                d.mod_name,
                r.claims_used,
                r.claims_max,
                r.user_id,
                r.timestamp.format("%Y-%m-%d %H:%M")
            ));
        }
        msg.push_str("\n\nReply 1 for next, 2 for previous, or 'menu' to go back.");

        self.ctx.set_admin_state(admin_id, AdminState::ViewingReferences { page }).await;
        self.ctx.reply(admin_id, &msg).await;
        Ok(())
    }

    async fn show_recent_jobs(&self, admin_id: &str) -> Result<(), Error> {
        let jobs = self.ctx.ledger.recent_jobs(self.ctx.settings.recent_jobs_limit).await?;
        if jobs.is_empty() {
            self.ctx.reply(admin_id, "No creation jobs yet.").await;
            return Ok(());
        }
        let mut msg = String::from("Recent creation jobs:");
        for job in &jobs {
            msg.push_str(&format!(
                "\n#{} | {} | mod {} | {} | user {} | {}",
                job.job_id,
                job.status,
                job.mod_id,
                job.email,
                job.user_id,
                job.created_at.format("%Y-%m-%d %H:%M")
            ));
            if let Some(result) = &job.result_message {
                msg.push_str(&format!("\n   {}", result));
            }
        }
        self.ctx.reply(admin_id, &msg).await;
        Ok(())
    }

    async fn on_new_mod_step(
        &self,
        admin_id: &str,
        mut draft: NewModDraft,
        step: NewModStep,
        text: &str,
    ) -> Result<(), Error> {
        let next = match step {
            NewModStep::Id => {
                let Some(id) = parse_id(text) else {
                    self.ctx.reply(admin_id, "Invalid ID. Please enter a whole number:").await;
                    return Ok(());
                };
                if self.ctx.ledger.get_mod(id).await?.is_some() {
                    self.ctx
                        .reply(admin_id, &format!("Mod {} already exists. Enter a different ID:", id))
                        .await;
                    return Ok(());
                }
                draft.id = Some(id);
                NewModStep::Name
            }
            NewModStep::Name => {
                if text.is_empty() {
                    self.ctx.reply(admin_id, "Name cannot be empty:").await;
                    return Ok(());
                }
                draft.name = Some(text.to_string());
                NewModStep::Description
            }
            NewModStep::Description => {
                draft.description = (!is_skip(text) && !text.is_empty()).then(|| text.to_string());
                NewModStep::Price
            }
            NewModStep::Price => match parse_price(text) {
                Ok(p) => {
                    draft.price = Some(p);
                    NewModStep::ImageUrl
                }
                Err(e) => {
                    self.ctx.reply(admin_id, &validation_text(&e)).await;
                    return Ok(());
                }
            },
            NewModStep::ImageUrl => {
                draft.image_url = (!is_skip(text) && !text.is_empty()).then(|| text.to_string());
                NewModStep::ClaimsMax
            }
            NewModStep::ClaimsMax => {
                let Some(claims) = parse_id(text) else {
                    self.ctx.reply(admin_id, "Invalid number of claims. Please enter a whole number:").await;
                    return Ok(());
                };
                return self.create_drafted_mod(admin_id, draft, claims).await;
            }
        };

        self.ask(admin_id, AdminState::AwaitingNewMod { draft, step: next }, next.prompt())
            .await;
        Ok(())
    }

    async fn create_drafted_mod(&self, admin_id: &str, draft: NewModDraft, claims: i32) -> Result<(), Error> {
        let (Some(id), Some(name), Some(price)) = (draft.id, draft.name.clone(), draft.price) else {
            // A draft reaches the last step only with these set.
            self.ctx.clear_state(admin_id).await;
            self.ctx.reply(admin_id, "The new mod draft was incomplete. Please start again.").await;
            return Ok(());
        };
        let item = ModItem {
            id,
            name,
            description: draft.description.clone(),
            price,
            image_url: draft.image_url.clone(),
            default_claims_max: claims,
            x_coordinate: None,
            y_coordinate: None,
        };

        match self.ctx.ledger.create_mod(&item).await {
            Ok(()) => {
                self.ctx.clear_state(admin_id).await;
                self.ctx.reply(admin_id, &format!("Mod created:\n{}", describe_mod(&item))).await;
                Ok(())
            }
            Err(Error::DuplicateMod(_)) => {
                let step = NewModStep::Name;
                self.ask(
                    admin_id,
                    AdminState::AwaitingNewMod { draft, step },
                    "A mod with that ID or name already exists. Enter a different name:",
                )
                .await;
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

fn describe_mod(item: &ModItem) -> String {
    let mut s = format!(
        "ID {}: {}\nDescription: {}\nPrice: ₱{}\nImage: {}\nClaims: {}",
        item.id,
        item.name,
        item.description.as_deref().unwrap_or("-"),
        item.price,
        item.image_url.as_deref().unwrap_or("-"),
        item.default_claims_max
    );
    if let (Some(x), Some(y)) = (item.x_coordinate, item.y_coordinate) {
        s.push_str(&format!("\nCoordinates: ({}, {})", x, y));
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contact_numbers() {
        assert!(is_valid_contact("09171234567"));
        assert!(is_valid_contact("+63 917 123 4567"));
        assert!(!is_valid_contact("call me"));
        assert!(!is_valid_contact("12345"));
    }

    #[test]
    fn ids_must_be_non_negative_integers() {
        assert_eq!(parse_id(" 7 "), Some(7));
        assert_eq!(parse_id("-1"), None);
        assert_eq!(parse_id("1.5"), None);
    }
}
