// File: modshop-core/src/services/ledger_service.rs

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use modshop_common::error::Error;
use modshop_common::models::{
    Account, BulkReferenceOutcome, ClaimOutcome, CreationJob, JobStatus, ModItem, ModListing,
    ModUpdate, NewAccount, NewCreationJob, NewReference, RefNumber, ReferenceDetails,
};
use modshop_common::traits::repository_traits::{
    AccountRepository, CreationJobRepository, ModRepository, ReferenceRepository,
};

/// The catalog, inventory and claims ledger behind one façade.
///
/// Holds the rules the store alone cannot express: a reference's budget is
/// a snapshot of the mod's `default_claims_max` taken at registration.
pub struct LedgerService {
    mods: Arc<dyn ModRepository + Send + Sync>,
    accounts: Arc<dyn AccountRepository + Send + Sync>,
    references: Arc<dyn ReferenceRepository + Send + Sync>,
    jobs: Arc<dyn CreationJobRepository + Send + Sync>,
}

impl LedgerService {
    pub fn new(
        mods: Arc<dyn ModRepository + Send + Sync>,
        accounts: Arc<dyn AccountRepository + Send + Sync>,
        references: Arc<dyn ReferenceRepository + Send + Sync>,
        jobs: Arc<dyn CreationJobRepository + Send + Sync>,
    ) -> Self {
        Self {
            mods,
            accounts,
            references,
            jobs,
        }
    }

    // ---------------------------------------------------------------
    // references
    // ---------------------------------------------------------------

    /// Registers a payment. Returns the granted claims budget.
    pub async fn add_reference(&self, ref_number: &RefNumber, user_id: &str, mod_id: i32) -> Result<i32, Error> {
        let item = self.require_mod(mod_id).await?;
        let new_ref = NewReference {
            ref_number: ref_number.clone(),
            user_id: user_id.to_string(),
            mod_id,
            claims_max: item.default_claims_max,
        };
        self.references.insert_reference(&new_ref).await?;
        Ok(item.default_claims_max)
    }

    /// One reference per line, all for the same mod. Lines that are not
    /// 13-digit numbers are reported back rather than failing the batch.
    pub async fn add_bulk_references(&self, mod_id: i32, user_id: &str, text: &str) -> Result<BulkReferenceOutcome, Error> {
        let item = self.require_mod(mod_id).await?;

        let mut outcome = BulkReferenceOutcome::default();
        let mut batch = Vec::new();
        let mut seen = HashSet::new();
        for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
            match RefNumber::parse(line) {
                Ok(ref_number) if !seen.insert(ref_number.clone()) => {
                    outcome.duplicates.push(ref_number);
                }
                Ok(ref_number) => batch.push(NewReference {
                    ref_number,
                    user_id: user_id.to_string(),
                    mod_id,
                    claims_max: item.default_claims_max,
                }),
                Err(_) => outcome.invalid.push(line.to_string()),
            }
        }

        let existing = if batch.is_empty() {
            Vec::new()
        } else {
            self.references.insert_bulk_references(&batch).await?
        };
        outcome.added = batch
            .into_iter()
            .map(|r| r.ref_number)
            .filter(|r| !existing.contains(r))
            .collect();
        outcome.duplicates.extend(existing);
        Ok(outcome)
    }

    pub async fn get_reference(&self, ref_number: &RefNumber) -> Result<Option<ReferenceDetails>, Error> {
        self.references.get_reference(ref_number).await
    }

    pub async fn list_references(&self) -> Result<Vec<ReferenceDetails>, Error> {
        self.references.list_references().await
    }

    pub async fn use_claim(&self, ref_number: &RefNumber) -> Result<bool, Error> {
        self.references.use_claim(ref_number).await
    }

    /// Budget check, account hand-out and claim consumption in one step.
    pub async fn try_claim(&self, ref_number: &RefNumber) -> Result<ClaimOutcome, Error> {
        self.references.try_claim(ref_number).await
    }

    /// Returns false if the reference does not exist.
    pub async fn update_reference_mod(&self, ref_number: &RefNumber, mod_id: i32) -> Result<bool, Error> {
        self.require_mod(mod_id).await?;
        self.references.update_reference_mod(ref_number, mod_id).await
    }

    pub async fn delete_reference(&self, ref_number: &RefNumber) -> Result<bool, Error> {
        let removed = self.references.delete_reference(ref_number).await?;
        if removed > 0 {
            info!("Deleted reference {}", ref_number);
        }
        Ok(removed > 0)
    }

    // ---------------------------------------------------------------
    // catalog / inventory
    // ---------------------------------------------------------------

    pub async fn list_mods(&self) -> Result<Vec<ModListing>, Error> {
        self.mods.list_mods().await
    }

    pub async fn get_mod(&self, mod_id: i32) -> Result<Option<ModItem>, Error> {
        self.mods.get_mod(mod_id).await
    }

    pub async fn require_mod(&self, mod_id: i32) -> Result<ModItem, Error> {
        self.mods.get_mod(mod_id).await?.ok_or(Error::ModNotFound(mod_id))
    }

    pub async fn create_mod(&self, item: &ModItem) -> Result<(), Error> {
        if item.name.trim().is_empty() {
            return Err(Error::Validation("Mod name cannot be empty.".into()));
        }
        self.mods.create_mod(item).await
    }

    pub async fn update_mod(&self, mod_id: i32, update: ModUpdate) -> Result<(), Error> {
        self.mods.update_mod_details(mod_id, std::slice::from_ref(&update)).await
    }

    /// Parses `username:password` lines and stores them for the mod.
    pub async fn add_bulk_accounts(&self, mod_id: i32, text: &str) -> Result<u64, Error> {
        self.require_mod(mod_id).await?;
        let accounts = NewAccount::parse_bulk(text);
        if accounts.is_empty() {
            return Err(Error::Validation(
                "No valid accounts found. Use one 'username:password' per line.".into(),
            ));
        }
        self.accounts.add_bulk_accounts(mod_id, &accounts).await
    }

    pub async fn get_available_account(&self, mod_id: i32) -> Result<Option<Account>, Error> {
        self.accounts.get_available_account(mod_id).await
    }

    pub async fn claim_account(&self, account_id: i32) -> Result<bool, Error> {
        let claimed = self.accounts.claim_account(account_id).await?;
        if !claimed {
            warn!("Account {} was already claimed", account_id);
        }
        Ok(claimed)
    }

    // ---------------------------------------------------------------
    // creation jobs
    // ---------------------------------------------------------------

    pub async fn queue_creation_job(&self, job: &NewCreationJob) -> Result<i32, Error> {
        let id = self.jobs.create_job(job).await?;
        info!("Creation job {} queued for {} (mod {})", id, job.user_id, job.mod_id);
        Ok(id)
    }

    pub async fn recent_jobs(&self, limit: i64) -> Result<Vec<CreationJob>, Error> {
        self.jobs.list_recent_jobs(limit).await
    }

    pub async fn actionable_jobs(&self) -> Result<Vec<CreationJob>, Error> {
        self.jobs.actionable_jobs().await
    }

    pub async fn mark_job(&self, job_id: i32, status: JobStatus) -> Result<(), Error> {
        self.jobs.update_job_status(job_id, status).await
    }

    pub async fn stale_pending_jobs(&self, created_before: DateTime<Utc>) -> Result<Vec<i32>, Error> {
        self.jobs.stale_pending_jobs(created_before).await
    }
}
