// File: modshop-core/src/services/reconciliation.rs

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{debug, warn};

use modshop_common::error::Error;
use modshop_common::models::{ModItem, ParsedReceipt, ReceiptAnalysis};
use modshop_common::traits::repository_traits::ModRepository;

/// Which catalog entries a paid amount could be for.
#[derive(Debug, Clone, PartialEq)]
pub enum PriceMatch {
    Single(ModItem),
    /// Two or more mods share the price; the buyer has to pick.
    Ambiguous(Vec<ModItem>),
}

/// Turns an untrusted receipt analysis into a validated receipt plus the
/// mod(s) it pays for.
pub struct ReceiptReconciler {
    mods: Arc<dyn ModRepository + Send + Sync>,
    tolerance: Decimal,
}

impl ReceiptReconciler {
    pub fn new(mods: Arc<dyn ModRepository + Send + Sync>, tolerance: Decimal) -> Self {
        Self { mods, tolerance }
    }

    /// Fails with `UnreadableReceipt` if the fields do not validate and
    /// with `NoPriceMatch` if no mod costs the paid amount.
    pub async fn reconcile(&self, analysis: &ReceiptAnalysis) -> Result<(ParsedReceipt, PriceMatch), Error> {
        let receipt = ParsedReceipt::from_analysis(analysis)?;
        debug!(
            "Receipt parsed: amount={} ref={} (status {:?})",
            receipt.amount, receipt.ref_number, analysis.verification_status
        );
        let matched = self.match_price(receipt.amount).await?;
        Ok((receipt, matched))
    }

    pub async fn match_price(&self, amount: Decimal) -> Result<PriceMatch, Error> {
        let mut candidates = self.mods.find_mods_by_price(amount, self.tolerance).await?;
        match candidates.len() {
            0 => {
                warn!("No mod priced at {}", amount);
                Err(Error::NoPriceMatch { amount })
            }
            1 => Ok(PriceMatch::Single(candidates.remove(0))),
            _ => Ok(PriceMatch::Ambiguous(candidates)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::memory::InMemoryLedger;
    use crate::test_utils::helpers::mod_item;

    async fn reconciler_with(prices: &[(i32, &str, Decimal)]) -> ReceiptReconciler {
        let ledger = Arc::new(InMemoryLedger::new());
        for (id, name, price) in prices {
            ledger.insert_mod(mod_item(*id, name, *price, 3));
        }
        ReceiptReconciler::new(ledger, Decimal::new(1, 2))
    }

    #[tokio::test]
    async fn shared_price_needs_clarification() {
        let r = reconciler_with(&[
            (1, "Alpha", Decimal::new(10000, 2)),
            (2, "Beta", Decimal::new(10000, 2)),
            (3, "Gamma", Decimal::new(25000, 2)),
        ])
        .await;

        let analysis = ReceiptAnalysis::with_fields("100.00", "1234567890123");
        let (_, matched) = r.reconcile(&analysis).await.unwrap();
        match matched {
            PriceMatch::Ambiguous(mods) => {
                let ids: Vec<i32> = mods.iter().map(|m| m.id).collect();
                assert_eq!(ids, vec![1, 2]);
            }
            other => panic!("expected ambiguous match, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn rounding_noise_is_tolerated() {
        let r = reconciler_with(&[(1, "Alpha", Decimal::new(10000, 2)), (3, "Gamma", Decimal::new(25000, 2))]).await;
        let matched = r.match_price(Decimal::new(100004, 3)).await.unwrap();
        assert!(matches!(matched, PriceMatch::Single(m) if m.id == 1));
    }

    #[tokio::test]
    async fn two_cents_off_does_not_match() {
        let r = reconciler_with(&[(1, "Alpha", Decimal::new(10000, 2))]).await;
        let err = r.match_price(Decimal::new(9998, 2)).await.unwrap_err();
        assert!(matches!(err, Error::NoPriceMatch { .. }));
    }

    #[tokio::test]
    async fn bad_reference_is_unreadable() {
        let r = reconciler_with(&[(1, "Alpha", Decimal::new(10000, 2))]).await;
        let analysis = ReceiptAnalysis::with_fields("100.00", "12345");
        let err = r.reconcile(&analysis).await.unwrap_err();
        match err {
            Error::UnreadableReceipt { amount, reference } => {
                assert_eq!(amount, "100.00");
                assert_eq!(reference, "12345");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }
}
