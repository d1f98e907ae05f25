// File: modshop-core/src/services/dialog_state.rs
//
// Typed conversation states. Each variant carries exactly the data the
// next handler needs, so a handler can never read a field its entry state
// did not set.

use rust_decimal::Decimal;

use modshop_common::models::{ModField, RefNumber};

/// What is stored per sender.
#[derive(Debug, Clone, PartialEq)]
pub enum ConversationState {
    User(UserState),
    Admin(AdminState),
}

impl From<UserState> for ConversationState {
    fn from(s: UserState) -> Self {
        ConversationState::User(s)
    }
}

impl From<AdminState> for ConversationState {
    fn from(s: AdminState) -> Self {
        ConversationState::Admin(s)
    }
}

/// Contact details a buyer gave before paying.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuyerDetails {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModChoice {
    pub id: i32,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum UserState {
    AwaitingWantMod,
    AwaitingEmailForPurchase {
        mod_id: i32,
    },
    AwaitingPasswordForPurchase {
        mod_id: i32,
        email: String,
    },
    AwaitingReceiptForPurchase {
        mod_id: i32,
        buyer: BuyerDetails,
    },
    /// The analyzer failed; the buyer types the reference number instead.
    AwaitingManualRef {
        mod_id: i32,
        buyer: BuyerDetails,
        image_url: String,
    },
    AwaitingModConfirmation {
        ref_number: RefNumber,
        mod_id: i32,
        mod_name: String,
        buyer: BuyerDetails,
        /// Set when the reference was typed by hand.
        manual_receipt: Option<String>,
    },
    AwaitingModClarification {
        ref_number: RefNumber,
        candidates: Vec<ModChoice>,
        buyer: BuyerDetails,
    },
    AwaitingRefForCheck,
    AwaitingRefForReplacement,
    AwaitingAdminMessage,
}

impl UserState {
    pub fn expects_image(&self) -> bool {
        matches!(self, UserState::AwaitingReceiptForPurchase { .. })
    }

    pub fn name(&self) -> &'static str {
        match self {
            UserState::AwaitingWantMod => "awaiting_want_mod",
            UserState::AwaitingEmailForPurchase { .. } => "awaiting_email_for_purchase",
            UserState::AwaitingPasswordForPurchase { .. } => "awaiting_password_for_purchase",
            UserState::AwaitingReceiptForPurchase { .. } => "awaiting_receipt_for_purchase",
            UserState::AwaitingManualRef { .. } => "awaiting_manual_ref",
            UserState::AwaitingModConfirmation { .. } => "awaiting_mod_confirmation",
            UserState::AwaitingModClarification { .. } => "awaiting_mod_clarification",
            UserState::AwaitingRefForCheck => "awaiting_ref_for_check",
            UserState::AwaitingRefForReplacement => "awaiting_ref_for_replacement",
            UserState::AwaitingAdminMessage => "awaiting_admin_message",
        }
    }

    /// The question this state is waiting on, used to re-ask it.
    pub fn prompt(&self) -> String {
        match self {
            UserState::AwaitingWantMod => {
                "Type the mod ID you want to buy (e.g. 'want mod 2'), or 'menu' to go back.".into()
            }
            UserState::AwaitingEmailForPurchase { .. } => "Please enter your email address.".into(),
            UserState::AwaitingPasswordForPurchase { .. } => {
                "Please enter the password you want for the account.".into()
            }
            UserState::AwaitingReceiptForPurchase { .. } => {
                "Please send a screenshot of your GCash receipt.".into()
            }
            UserState::AwaitingManualRef { .. } => {
                "Please type the 13-digit reference number shown on your receipt.".into()
            }
            UserState::AwaitingModConfirmation { mod_name, .. } => {
                format!("Is your purchase for '{}'? Reply 'yes' or 'no'.", mod_name)
            }
            UserState::AwaitingModClarification { candidates, .. } => {
                let mut msg = String::from("Several mods have that price. Reply with the ID of the one you bought:\n");
                for c in candidates {
                    msg.push_str(&format!("ID {}: {}\n", c.id, c.name));
                }
                msg.trim_end().to_string()
            }
            UserState::AwaitingRefForCheck | UserState::AwaitingRefForReplacement => {
                "Please enter your 13-digit reference number.".into()
            }
            UserState::AwaitingAdminMessage => "Please type your message for the admin.".into(),
        }
    }
}

/// Steps of the add-mod wizard, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NewModStep {
    Id,
    Name,
    Description,
    Price,
    ImageUrl,
    ClaimsMax,
}

impl NewModStep {
    pub fn prompt(&self) -> &'static str {
        match self {
            NewModStep::Id => "Enter the new mod ID (a whole number):",
            NewModStep::Name => "Enter the mod name:",
            NewModStep::Description => "Enter the description (or 'skip'):",
            NewModStep::Price => "Enter the price (e.g. 250.00):",
            NewModStep::ImageUrl => "Enter the image URL (or 'skip'):",
            NewModStep::ClaimsMax => "Enter the number of replacement claims per purchase:",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewModDraft {
    pub id: Option<i32>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AdminState {
    ViewingReferences { page: usize },
    AwaitingBulkAccountsModId,
    AwaitingBulkAccountsList { mod_id: i32 },
    AwaitingEditModId,
    AwaitingEditModField { mod_id: i32 },
    AwaitingEditModValue { mod_id: i32, field: ModField },
    AwaitingEditModContinue { mod_id: i32 },
    AwaitingAddRefNumber,
    AwaitingAddRefModId { ref_number: RefNumber },
    AwaitingBulkRefsModId,
    AwaitingBulkRefsList { mod_id: i32 },
    AwaitingEditAdminContact,
    AwaitingEditRefNumber,
    AwaitingEditRefModId { ref_number: RefNumber },
    AwaitingDeleteRef,
    AwaitingNewMod { draft: NewModDraft, step: NewModStep },
    RelayTargetUser,
    RelayUsername { target: String },
    RelayPassword { target: String, username: String },
}

impl AdminState {
    pub fn name(&self) -> &'static str {
        match self {
            AdminState::ViewingReferences { .. } => "viewing_references",
            AdminState::AwaitingBulkAccountsModId => "awaiting_bulk_accounts_mod_id",
            AdminState::AwaitingBulkAccountsList { .. } => "awaiting_bulk_accounts_list",
            AdminState::AwaitingEditModId => "awaiting_edit_mod_id",
            AdminState::AwaitingEditModField { .. } => "awaiting_edit_mod_field",
            AdminState::AwaitingEditModValue { .. } => "awaiting_edit_mod_value",
            AdminState::AwaitingEditModContinue { .. } => "awaiting_edit_mod_continue",
            AdminState::AwaitingAddRefNumber => "awaiting_add_ref_number",
            AdminState::AwaitingAddRefModId { .. } => "awaiting_add_ref_mod_id",
            AdminState::AwaitingBulkRefsModId => "awaiting_bulk_refs_mod_id",
            AdminState::AwaitingBulkRefsList { .. } => "awaiting_bulk_refs_list",
            AdminState::AwaitingEditAdminContact => "awaiting_edit_admin_contact",
            AdminState::AwaitingEditRefNumber => "awaiting_edit_ref_number",
            AdminState::AwaitingEditRefModId { .. } => "awaiting_edit_ref_mod_id",
            AdminState::AwaitingDeleteRef => "awaiting_delete_ref",
            AdminState::AwaitingNewMod { .. } => "awaiting_new_mod",
            AdminState::RelayTargetUser => "relay_target_user",
            AdminState::RelayUsername { .. } => "relay_username",
            AdminState::RelayPassword { .. } => "relay_password",
        }
    }
}

/// Words accepted as "yes" / "no" in confirmation prompts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Answer {
    Yes,
    No,
}

impl Answer {
    pub fn parse(text: &str) -> Option<Answer> {
        match text.trim().to_lowercase().as_str() {
            "yes" | "y" | "oo" | "opo" => Some(Answer::Yes),
            "no" | "n" | "hindi" => Some(Answer::No),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn answers_accept_local_words() {
        assert_eq!(Answer::parse("Opo"), Some(Answer::Yes));
        assert_eq!(Answer::parse(" y "), Some(Answer::Yes));
        assert_eq!(Answer::parse("hindi"), Some(Answer::No));
        assert_eq!(Answer::parse("maybe"), None);
    }

    #[test]
    fn only_receipt_state_expects_an_image() {
        let receipt = UserState::AwaitingReceiptForPurchase { mod_id: 1, buyer: BuyerDetails::default() };
        assert!(receipt.expects_image());
        assert!(!UserState::AwaitingRefForCheck.expects_image());
        assert!(!UserState::AwaitingEmailForPurchase { mod_id: 1 }.expects_image());
    }
}
