// File: modshop-core/tests/dialog_scenario_tests.rs
//
// Buyer conversations driven end to end through the router.

mod common;

use std::time::Duration;

use common::{price, rn, Harness, ADMIN, BUYER};
use modshop_core::models::JobStatus;
use modshop_core::services::{BotSettings, ConversationState, ConversationStateStore, UserState};
use modshop_core::test_utils::{AnalyzerReply, StaticAnalyzer};

const REF: &str = "1234567890123";
const RECEIPT: &str = "https://cdn.example/receipt.jpg";

fn user_state(state: Option<ConversationState>) -> Option<UserState> {
    match state {
        Some(ConversationState::User(s)) => Some(s),
        _ => None,
    }
}

/// Walks a buyer from the menu up to the point where a receipt is expected.
async fn start_purchase(h: &Harness, mod_id: i32) {
    h.say(BUYER, "1").await;
    h.say(BUYER, &format!("want mod {}", mod_id)).await;
    h.say(BUYER, "buyer@example.com").await;
}

#[tokio::test]
async fn test_purchase_end_to_end_registers_reference() {
    let h = Harness::build(
        BotSettings::default().with_admins([ADMIN]),
        StaticAnalyzer::returning("250.00", REF),
    )
    .with_catalog();

    h.say(BUYER, "1").await;
    assert!(h.sender.saw(BUYER, "ID 2: Beta"));
    assert_eq!(user_state(h.state(BUYER).await), Some(UserState::AwaitingWantMod));

    h.say(BUYER, "2").await;
    assert!(h.sender.saw(BUYER, "You chose Beta"));
    h.say(BUYER, "a@b.com").await;
    assert!(h.sender.saw(BUYER, "Please send ₱250.00 via GCash to 09123456789"));

    h.send_image(BUYER, RECEIPT).await;
    assert_eq!(h.analyzer.calls(), 1);
    assert!(matches!(
        user_state(h.state(BUYER).await),
        Some(UserState::AwaitingModConfirmation { mod_id: 2, .. })
    ));
    assert!(h.last_reply(BUYER).contains("Is your purchase for 'Beta'?"));

    h.say(BUYER, "yes").await;

    let reference = h.ledger.reference(REF).expect("reference registered");
    assert_eq!(reference.mod_id, 2);
    assert_eq!(reference.user_id, BUYER);
    assert_eq!(reference.claims_used, 0);
    assert_eq!(reference.claims_max, 3);
    assert!(h.state(BUYER).await.is_none());
    assert!(h.sender.saw(BUYER, "Payment confirmed for Beta"));
    assert!(h.sender.saw(ADMIN, "New order."));
    assert!(h.sender.saw(ADMIN, REF));
}

#[tokio::test]
async fn test_ambiguous_price_asks_for_clarification() {
    let h = Harness::build(
        BotSettings::default().with_admins([ADMIN]),
        StaticAnalyzer::returning("PHP 100.00", "1234 567 890123"),
    )
    .with_catalog();

    start_purchase(&h, 1).await;
    h.send_image(BUYER, RECEIPT).await;

    match user_state(h.state(BUYER).await) {
        Some(UserState::AwaitingModClarification { candidates, ref_number, .. }) => {
            let ids: Vec<i32> = candidates.iter().map(|c| c.id).collect();
            assert_eq!(ids, vec![1, 3]);
            assert_eq!(ref_number, rn(REF));
        }
        other => panic!("expected clarification, got {:?}", other),
    }

    // Not one of the candidates: asked again, nothing stored.
    h.say(BUYER, "2").await;
    assert!(h.last_reply(BUYER).contains("Several mods have that price"));
    assert_eq!(h.ledger.reference_count(), 0);

    h.say(BUYER, "3").await;
    let reference = h.ledger.reference(REF).expect("reference registered");
    assert_eq!(reference.mod_id, 3);
    assert_eq!(reference.claims_max, 2);
    assert!(h.state(BUYER).await.is_none());
}

#[tokio::test]
async fn test_unmatched_price_is_escalated() {
    let h = Harness::build(
        BotSettings::default().with_admins([ADMIN]),
        StaticAnalyzer::returning("999.00", REF),
    )
    .with_catalog();

    start_purchase(&h, 2).await;
    h.send_image(BUYER, RECEIPT).await;

    assert!(h.state(BUYER).await.is_none());
    assert_eq!(h.ledger.reference_count(), 0);
    assert!(h.sender.saw(BUYER, "An admin will review your receipt"));
    assert!(h.sender.saw(ADMIN, "No mod is priced at ₱999.00"));
    assert_eq!(h.sender.images_to(ADMIN), vec![RECEIPT.to_string()]);
}

#[tokio::test]
async fn test_unreadable_receipt_is_escalated_with_extracted_values() {
    let h = Harness::build(
        BotSettings::default().with_admins([ADMIN]),
        StaticAnalyzer::returning("Not Found", "12345"),
    )
    .with_catalog();

    start_purchase(&h, 2).await;
    h.send_image(BUYER, RECEIPT).await;

    assert!(h.state(BUYER).await.is_none());
    assert!(h.sender.saw(ADMIN, "Unreadable receipt."));
    assert!(h.sender.saw(ADMIN, "Extracted reference: '12345'"));
    assert!(h.sender.saw(ADMIN, "buyer@example.com"));
}

#[tokio::test]
async fn test_duplicate_reference_is_refused_and_reported() {
    let h = Harness::build(
        BotSettings::default().with_admins([ADMIN]),
        StaticAnalyzer::returning("250.00", REF),
    )
    .with_catalog();
    h.router
        .context()
        .ledger
        .add_reference(&rn(REF), "someone-else", 1)
        .await
        .unwrap();

    start_purchase(&h, 2).await;
    h.send_image(BUYER, RECEIPT).await;
    h.say(BUYER, "oo").await;

    assert_eq!(h.ledger.reference_count(), 1);
    let original = h.ledger.reference(REF).unwrap();
    assert_eq!(original.user_id, "someone-else");
    assert_eq!(original.mod_id, 1);
    assert!(h.sender.saw(BUYER, "already been used"));
    assert!(h.sender.saw(ADMIN, "Duplicate reference submitted."));
    assert!(h.state(BUYER).await.is_none());
}

#[tokio::test]
async fn test_declining_confirmation_cancels_order() {
    let h = Harness::build(
        BotSettings::default().with_admins([ADMIN]),
        StaticAnalyzer::returning("250.00", REF),
    )
    .with_catalog();

    start_purchase(&h, 2).await;
    h.send_image(BUYER, RECEIPT).await;

    h.say(BUYER, "maybe").await;
    assert!(h.last_reply(BUYER).contains("Please reply 'yes' or 'no'"));
    assert!(h.state(BUYER).await.is_some());

    h.say(BUYER, "hindi").await;
    assert_eq!(h.ledger.reference_count(), 0);
    assert!(h.state(BUYER).await.is_none());
    assert!(h.sender.saw(BUYER, "order was cancelled"));
}

#[tokio::test]
async fn test_analyzer_failure_falls_back_to_typed_reference() {
    let h = Harness::build(
        BotSettings::default().with_admins([ADMIN]),
        StaticAnalyzer::new(AnalyzerReply::Fail("model unavailable".into())),
    )
    .with_catalog();

    start_purchase(&h, 2).await;
    h.send_image(BUYER, RECEIPT).await;
    assert!(matches!(
        user_state(h.state(BUYER).await),
        Some(UserState::AwaitingManualRef { mod_id: 2, .. })
    ));

    h.say(BUYER, "12345").await;
    assert!(h.last_reply(BUYER).contains("Please type the 13 digits only."));
    assert!(matches!(
        user_state(h.state(BUYER).await),
        Some(UserState::AwaitingManualRef { .. })
    ));

    h.say(BUYER, REF).await;
    assert!(h.last_reply(BUYER).contains("Is your purchase for 'Beta'?"));
    h.say(BUYER, "y").await;

    let reference = h.ledger.reference(REF).expect("reference registered");
    assert_eq!(reference.mod_id, 2);
    assert!(h.sender.saw(ADMIN, "New order (manual registration)."));
    assert_eq!(h.sender.images_to(ADMIN), vec![RECEIPT.to_string()]);
}

#[tokio::test]
async fn test_analyzer_timeout_falls_back_to_typed_reference() {
    let mut settings = BotSettings::default().with_admins([ADMIN]);
    settings.ai_timeout = Duration::from_millis(50);
    let h = Harness::build(settings, StaticAnalyzer::new(AnalyzerReply::Hang)).with_catalog();

    start_purchase(&h, 1).await;
    h.send_image(BUYER, RECEIPT).await;

    assert!(h.sender.saw(BUYER, "We couldn't read your receipt automatically."));
    assert!(matches!(
        user_state(h.state(BUYER).await),
        Some(UserState::AwaitingManualRef { mod_id: 1, .. })
    ));
}

#[tokio::test]
async fn test_password_collection_queues_creation_job() {
    let mut settings = BotSettings::default().with_admins([ADMIN]);
    settings.collect_password = true;
    let h = Harness::build(settings, StaticAnalyzer::returning("250.00", REF)).with_catalog();

    start_purchase(&h, 2).await;
    assert!(matches!(
        user_state(h.state(BUYER).await),
        Some(UserState::AwaitingPasswordForPurchase { .. })
    ));

    h.say(BUYER, "abc").await;
    assert!(h.last_reply(BUYER).contains("at least 6 characters"));

    h.say(BUYER, "hunter22").await;
    h.send_image(BUYER, RECEIPT).await;
    h.say(BUYER, "yes").await;

    let jobs = h.ledger.jobs();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].user_id, BUYER);
    assert_eq!(jobs[0].email, "buyer@example.com");
    assert_eq!(jobs[0].password, "hunter22");
    assert_eq!(jobs[0].mod_id, 2);
    assert_eq!(jobs[0].status, JobStatus::Pending);
    assert!(h.sender.saw(BUYER, "being created automatically"));
    assert!(h.sender.saw(ADMIN, "Creation job: #"));
}

#[tokio::test]
async fn test_no_job_without_password() {
    let h = Harness::build(
        BotSettings::default().with_admins([ADMIN]),
        StaticAnalyzer::returning("250.00", REF),
    )
    .with_catalog();

    start_purchase(&h, 2).await;
    h.send_image(BUYER, RECEIPT).await;
    h.say(BUYER, "yes").await;

    assert!(h.ledger.jobs().is_empty());
    assert!(h.sender.saw(BUYER, "An admin will create your account"));
}

#[tokio::test]
async fn test_unexpected_image_reprompts_without_analysis() {
    let h = Harness::new().with_catalog();

    h.say(BUYER, "2").await;
    h.send_image(BUYER, RECEIPT).await;

    assert_eq!(h.analyzer.calls(), 0);
    assert_eq!(user_state(h.state(BUYER).await), Some(UserState::AwaitingRefForCheck));
    assert!(h.last_reply(BUYER).contains("13-digit reference number"));
}

#[tokio::test]
async fn test_image_without_state_shows_menu() {
    let h = Harness::new().with_catalog();

    h.send_image(BUYER, RECEIPT).await;

    assert_eq!(h.analyzer.calls(), 0);
    assert!(h.state(BUYER).await.is_none());
    assert!(h.last_reply(BUYER).contains("Main menu:"));
}

#[tokio::test]
async fn test_text_while_waiting_for_receipt_reprompts() {
    let h = Harness::new().with_catalog();

    start_purchase(&h, 2).await;
    h.say(BUYER, "I paid already").await;

    assert!(h.last_reply(BUYER).contains("send a screenshot"));
    assert!(matches!(
        user_state(h.state(BUYER).await),
        Some(UserState::AwaitingReceiptForPurchase { mod_id: 2, .. })
    ));
}

#[tokio::test]
async fn test_menu_resets_any_state() {
    let h = Harness::new().with_catalog();

    start_purchase(&h, 2).await;
    h.say(BUYER, "  MENU ").await;

    assert!(h.state(BUYER).await.is_none());
    assert!(h.last_reply(BUYER).contains("Main menu:"));
}

#[tokio::test]
async fn test_my_id_works_in_any_state() {
    let h = Harness::new().with_catalog();

    h.say(BUYER, "3").await;
    h.say(BUYER, "my id").await;

    assert_eq!(h.last_reply(BUYER), format!("Your ID is: {}", BUYER));
    assert_eq!(user_state(h.state(BUYER).await), Some(UserState::AwaitingRefForReplacement));
}

#[tokio::test]
async fn test_unknown_mod_and_bad_email_keep_state() {
    let h = Harness::new().with_catalog();

    h.say(BUYER, "1").await;
    h.say(BUYER, "want mod 42").await;
    assert!(h.last_reply(BUYER).contains("Mod 42 does not exist"));
    assert_eq!(user_state(h.state(BUYER).await), Some(UserState::AwaitingWantMod));

    h.say(BUYER, "2").await;
    h.say(BUYER, "not-an-email").await;
    assert!(h.last_reply(BUYER).contains("valid email"));
    assert_eq!(
        user_state(h.state(BUYER).await),
        Some(UserState::AwaitingEmailForPurchase { mod_id: 2 })
    );
}

#[tokio::test]
async fn test_check_claims_reports_remaining() {
    let h = Harness::new().with_catalog();
    let ledger = &h.router.context().ledger;
    ledger.add_reference(&rn(REF), BUYER, 2).await.unwrap();
    assert!(ledger.use_claim(&rn(REF)).await.unwrap());

    h.say(BUYER, "2").await;
    h.say(BUYER, "123").await;
    assert!(h.last_reply(BUYER).contains("not a valid 13-digit reference number"));
    assert_eq!(user_state(h.state(BUYER).await), Some(UserState::AwaitingRefForCheck));

    h.say(BUYER, REF).await;
    let reply = h.last_reply(BUYER);
    assert!(reply.contains("Mod: Beta (ID 2)"));
    assert!(reply.contains("Remaining claims: 2 of 3"));
    assert!(h.state(BUYER).await.is_none());

    h.say(BUYER, "2").await;
    h.say(BUYER, "9999999999999").await;
    assert_eq!(h.last_reply(BUYER), "Reference number not found.");
}

#[tokio::test]
async fn test_replacements_stop_at_claim_budget() {
    let h = Harness::new();
    h.ledger.insert_mod(common_mod(7, "Delta", "150.00", 2));
    for i in 0..3 {
        h.ledger.add_account(7, &format!("user{}", i), "secret");
    }
    h.router.context().ledger.add_reference(&rn(REF), BUYER, 7).await.unwrap();

    for expected_left in [1, 0] {
        h.say(BUYER, "3").await;
        h.say(BUYER, REF).await;
        let reply = h.last_reply(BUYER);
        assert!(reply.contains("Here is your replacement account for Delta"), "{}", reply);
        assert!(reply.contains(&format!("Claims left: {}", expected_left)));
    }

    h.say(BUYER, "3").await;
    h.say(BUYER, REF).await;
    assert!(h.last_reply(BUYER).contains("no claims left on this reference (2 of 2 used)"));

    assert_eq!(h.ledger.available_accounts(7), 1);
    assert_eq!(h.ledger.reference(REF).unwrap().claims_used, 2);
}

#[tokio::test]
async fn test_replacement_out_of_stock_alerts_admin() {
    let h = Harness::new().with_catalog();
    h.router.context().ledger.add_reference(&rn(REF), BUYER, 2).await.unwrap();

    h.say(BUYER, "3").await;
    h.say(BUYER, REF).await;

    assert!(h.sender.saw(BUYER, "no replacement accounts are in stock"));
    assert!(h.sender.saw(ADMIN, "Out of stock"));
    assert_eq!(h.ledger.reference(REF).unwrap().claims_used, 0);
}

#[tokio::test]
async fn test_contact_admin_forwards_message() {
    let h = Harness::new();

    h.say(BUYER, "4").await;
    h.say(BUYER, "Hello, where is my account?").await;

    assert!(h.sender.saw(ADMIN, "Message from User buyer-1 (buyer-1):\nHello, where is my account?"));
    assert!(h.sender.saw(BUYER, "Your message has been sent"));
    assert!(h.state(BUYER).await.is_none());
}

#[tokio::test]
async fn test_store_failure_sends_generic_error_and_clears_state() {
    let h = Harness::new().with_catalog();

    h.say(BUYER, "2").await;
    h.ledger.set_failing(true);
    h.say(BUYER, REF).await;

    assert!(h.last_reply(BUYER).contains("An unexpected error occurred"));
    assert!(h.state(BUYER).await.is_none());
    assert!(h.sender.saw(ADMIN, "Store failure while handling a message from buyer-1"));
}

#[tokio::test]
async fn test_mod_removed_mid_purchase_escalates_without_store_failure() {
    let h = Harness::new().with_catalog();
    h.states
        .set_state(BUYER, UserState::AwaitingEmailForPurchase { mod_id: 99 }.into())
        .await;

    h.say(BUYER, "a@b.com").await;

    assert!(h.last_reply(BUYER).contains("couldn't complete your request"));
    assert!(!h.sender.saw(BUYER, "An unexpected error occurred"));
    assert!(h.sender.saw(ADMIN, "Needs attention: request from buyer-1 failed: Mod 99 not found"));
    assert!(h.state(BUYER).await.is_none());
}

#[tokio::test]
async fn test_store_failure_on_confirm_keeps_user_informed() {
    let h = Harness::build(
        BotSettings::default().with_admins([ADMIN]),
        StaticAnalyzer::returning("250.00", REF),
    )
    .with_catalog();

    start_purchase(&h, 2).await;
    h.send_image(BUYER, RECEIPT).await;
    h.ledger.set_failing(true);
    h.say(BUYER, "yes").await;

    assert!(h.sender.saw(BUYER, "An unexpected error occurred while registering your payment"));
    assert!(h.sender.saw(ADMIN, "Failed to register reference"));
    assert!(h.state(BUYER).await.is_none());
}

#[tokio::test]
async fn test_storefront_banner_and_contact_follow_admin_settings() {
    let h = Harness::new().with_catalog();
    h.setup_admin().await;
    h.say(ADMIN, "10").await;
    h.say(ADMIN, "5").await;
    h.say(ADMIN, "0917 123 4567").await;

    h.say(BUYER, "hello").await;
    assert!(h.last_reply(BUYER).contains("Admin is ONLINE"));

    start_purchase(&h, 1).await;
    assert!(h.sender.saw(BUYER, "via GCash to 0917 123 4567"));
}

fn common_mod(id: i32, name: &str, amount: &str, claims: i32) -> modshop_core::models::ModItem {
    modshop_core::test_utils::mod_item(id, name, price(amount), claims)
}
