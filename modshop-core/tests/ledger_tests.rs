// File: modshop-core/tests/ledger_tests.rs
//
// LedgerService rules on top of the in-memory repositories.

use std::sync::Arc;

use modshop_core::models::{ClaimOutcome, ModItem, ModUpdate, RefNumber};
use modshop_core::services::LedgerService;
use modshop_core::test_utils::{mod_item, InMemoryLedger};
use modshop_core::Error;

fn rn(s: &str) -> RefNumber {
    RefNumber::parse(s).unwrap()
}

fn catalog_item(id: i32, claims: i32) -> ModItem {
    mod_item(id, &format!("Mod {}", id), "100.00".parse().unwrap(), claims)
}

fn ledger_with(store: &Arc<InMemoryLedger>) -> LedgerService {
    LedgerService::new(store.clone(), store.clone(), store.clone(), store.clone())
}

#[tokio::test]
async fn test_duplicate_reference_never_overwrites() -> Result<(), Error> {
    let store = Arc::new(InMemoryLedger::new());
    store.insert_mod(catalog_item(1, 2));
    store.insert_mod(catalog_item(2, 5));
    let ledger = ledger_with(&store);

    let r = rn("1234567890123");
    assert_eq!(ledger.add_reference(&r, "first", 1).await?, 2);

    let second = ledger.add_reference(&r, "second", 2).await;
    assert!(matches!(second, Err(Error::DuplicateReference(_))));

    let stored = store.reference("1234567890123").unwrap();
    assert_eq!(stored.user_id, "first");
    assert_eq!(stored.mod_id, 1);
    assert_eq!(stored.claims_max, 2);
    Ok(())
}

#[tokio::test]
async fn test_reference_for_unknown_mod_is_rejected() -> Result<(), Error> {
    let store = Arc::new(InMemoryLedger::new());
    let ledger = ledger_with(&store);

    let res = ledger.add_reference(&rn("1234567890123"), "u", 9).await;
    assert!(matches!(res, Err(Error::ModNotFound(9))));
    assert_eq!(store.reference_count(), 0);
    Ok(())
}

#[tokio::test]
async fn test_claims_max_is_a_snapshot() -> Result<(), Error> {
    let store = Arc::new(InMemoryLedger::new());
    store.insert_mod(catalog_item(1, 3));
    let ledger = ledger_with(&store);

    ledger.add_reference(&rn("1000000000001"), "u", 1).await?;
    ledger.update_mod(1, ModUpdate::DefaultClaimsMax(7)).await?;
    ledger.add_reference(&rn("1000000000002"), "u", 1).await?;

    assert_eq!(store.reference("1000000000001").unwrap().claims_max, 3);
    assert_eq!(store.reference("1000000000002").unwrap().claims_max, 7);
    Ok(())
}

#[tokio::test]
async fn test_use_claim_stops_at_budget() -> Result<(), Error> {
    let store = Arc::new(InMemoryLedger::new());
    store.insert_mod(catalog_item(1, 2));
    let ledger = ledger_with(&store);
    let r = rn("1234567890123");
    ledger.add_reference(&r, "u", 1).await?;

    assert!(ledger.use_claim(&r).await?);
    assert!(ledger.use_claim(&r).await?);
    assert!(!ledger.use_claim(&r).await?);
    assert_eq!(store.reference("1234567890123").unwrap().claims_used, 2);

    assert!(!ledger.use_claim(&rn("9999999999999")).await?);
    Ok(())
}

#[tokio::test]
async fn test_try_claim_moves_one_account_per_claim() -> Result<(), Error> {
    let store = Arc::new(InMemoryLedger::new());
    store.insert_mod(catalog_item(1, 1));
    store.add_account(1, "alice", "pw1");
    store.add_account(1, "bob", "pw2");
    let ledger = ledger_with(&store);
    let r = rn("1234567890123");
    ledger.add_reference(&r, "u", 1).await?;

    match ledger.try_claim(&r).await? {
        ClaimOutcome::Granted(grant) => {
            assert_eq!(grant.account.username, "alice");
            assert!(!grant.account.is_available);
            assert_eq!(grant.claims_used, 1);
            assert_eq!(grant.claims_max, 1);
            assert_eq!(grant.mod_name, "Mod 1");
        }
        other => panic!("expected a grant, got {:?}", other),
    }
    assert_eq!(store.available_accounts(1), 1);

    // Exhausted: no account moves, the counter stays put.
    assert_eq!(
        ledger.try_claim(&r).await?,
        ClaimOutcome::Exhausted { claims_used: 1, claims_max: 1 }
    );
    assert_eq!(store.available_accounts(1), 1);
    assert_eq!(store.reference("1234567890123").unwrap().claims_used, 1);
    Ok(())
}

#[tokio::test]
async fn test_try_claim_out_of_stock_consumes_nothing() -> Result<(), Error> {
    let store = Arc::new(InMemoryLedger::new());
    store.insert_mod(catalog_item(1, 3));
    let ledger = ledger_with(&store);
    let r = rn("1234567890123");
    ledger.add_reference(&r, "u", 1).await?;

    assert_eq!(ledger.try_claim(&r).await?, ClaimOutcome::OutOfStock { mod_id: 1 });
    assert_eq!(store.reference("1234567890123").unwrap().claims_used, 0);
    assert_eq!(ledger.try_claim(&rn("9999999999999")).await?, ClaimOutcome::NotFound);
    Ok(())
}

#[tokio::test]
async fn test_concurrent_claims_respect_budget() -> Result<(), Error> {
    let store = Arc::new(InMemoryLedger::new());
    store.insert_mod(catalog_item(1, 3));
    for i in 0..10 {
        store.add_account(1, &format!("acc{}", i), "pw");
    }
    let ledger = Arc::new(ledger_with(&store));
    let r = rn("1234567890123");
    ledger.add_reference(&r, "u", 1).await?;

    let mut handles = Vec::new();
    for _ in 0..10 {
        let ledger = ledger.clone();
        let r = r.clone();
        handles.push(tokio::spawn(async move { ledger.try_claim(&r).await }));
    }

    let mut granted = Vec::new();
    for h in handles {
        if let ClaimOutcome::Granted(g) = h.await.unwrap()? {
            granted.push(g.account.id);
        }
    }
    granted.sort();
    granted.dedup();

    assert_eq!(granted.len(), 3);
    assert_eq!(store.available_accounts(1), 7);
    assert_eq!(store.reference("1234567890123").unwrap().claims_used, 3);
    Ok(())
}

#[tokio::test]
async fn test_bulk_references_sort_lines() -> Result<(), Error> {
    let store = Arc::new(InMemoryLedger::new());
    store.insert_mod(catalog_item(1, 2));
    let ledger = ledger_with(&store);
    ledger.add_reference(&rn("1000000000001"), "buyer", 1).await?;

    let outcome = ledger
        .add_bulk_references(
            1,
            "admin",
            "1000000000001\n 1000000000002 \n\n12345\n1000000000002\n1000000000003",
        )
        .await?;

    assert_eq!(outcome.added, vec![rn("1000000000002"), rn("1000000000003")]);
    assert_eq!(outcome.duplicates.len(), 2);
    assert!(outcome.duplicates.contains(&rn("1000000000001")));
    assert!(outcome.duplicates.contains(&rn("1000000000002")));
    assert_eq!(outcome.invalid, vec!["12345".to_string()]);
    assert_eq!(store.reference("1000000000001").unwrap().user_id, "buyer");
    assert_eq!(store.reference_count(), 3);
    Ok(())
}

#[tokio::test]
async fn test_bulk_accounts_need_one_valid_line() -> Result<(), Error> {
    let store = Arc::new(InMemoryLedger::new());
    store.insert_mod(catalog_item(1, 2));
    let ledger = ledger_with(&store);

    let err = ledger.add_bulk_accounts(1, "no colon here\n\n").await.unwrap_err();
    assert!(err.is_validation());
    assert_eq!(ledger.add_bulk_accounts(1, "a:b\nc:d:e").await?, 2);
    assert!(matches!(
        ledger.add_bulk_accounts(4, "a:b").await,
        Err(Error::ModNotFound(4))
    ));
    Ok(())
}

#[tokio::test]
async fn test_create_mod_requires_unique_id_and_name() -> Result<(), Error> {
    let store = Arc::new(InMemoryLedger::new());
    let ledger = ledger_with(&store);

    ledger.create_mod(&catalog_item(1, 2)).await?;
    assert!(matches!(
        ledger.create_mod(&catalog_item(1, 2)).await,
        Err(Error::DuplicateMod(_))
    ));

    let mut same_name = catalog_item(2, 2);
    same_name.name = "Mod 1".into();
    assert!(matches!(ledger.create_mod(&same_name).await, Err(Error::DuplicateMod(_))));

    let mut blank = catalog_item(3, 2);
    blank.name = "  ".into();
    assert!(ledger.create_mod(&blank).await.unwrap_err().is_validation());
    Ok(())
}

#[tokio::test]
async fn test_reassign_and_delete_reference() -> Result<(), Error> {
    let store = Arc::new(InMemoryLedger::new());
    store.insert_mod(catalog_item(1, 2));
    store.insert_mod(catalog_item(2, 2));
    let ledger = ledger_with(&store);
    let r = rn("1234567890123");
    ledger.add_reference(&r, "u", 1).await?;

    assert!(matches!(ledger.update_reference_mod(&r, 5).await, Err(Error::ModNotFound(5))));
    assert!(ledger.update_reference_mod(&r, 2).await?);
    assert!(!ledger.update_reference_mod(&rn("9999999999999"), 2).await?);
    assert_eq!(ledger.get_reference(&r).await?.unwrap().mod_name, "Mod 2");

    assert!(ledger.delete_reference(&r).await?);
    assert!(!ledger.delete_reference(&r).await?);
    assert!(ledger.get_reference(&r).await?.is_none());
    Ok(())
}
