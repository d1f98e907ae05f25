// File: modshop-core/src/test_utils/memory.rs
//
// An in-process stand-in for the Postgres repositories. It keeps the same
// observable contracts (duplicate detection, conditional claims, ordering)
// so dialog scenarios can run without a database.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use modshop_common::models::{
    Account, AdminRecord, ClaimGrant, ClaimOutcome, CreationJob, JobStatus, ModItem, ModListing,
    ModUpdate, NewAccount, NewCreationJob, NewReference, RefNumber, Reference, ReferenceDetails,
};
use modshop_common::traits::repository_traits::{
    AccountRepository, AdminRepository, CreationJobRepository, ModRepository, ReferenceRepository,
};

use crate::Error;

#[derive(Default)]
struct LedgerData {
    mods: BTreeMap<i32, ModItem>,
    accounts: Vec<Account>,
    /// Insertion order.
    references: Vec<Reference>,
    admins: BTreeMap<String, AdminRecord>,
    jobs: Vec<CreationJob>,
}

impl LedgerData {
    fn mod_name(&self, mod_id: i32) -> String {
        self.mods.get(&mod_id).map(|m| m.name.clone()).unwrap_or_default()
    }

    fn details(&self, r: &Reference) -> ReferenceDetails {
        ReferenceDetails {
            reference: r.clone(),
            mod_name: self.mod_name(r.mod_id),
        }
    }

    fn insert_reference(&mut self, reference: &NewReference) -> bool {
        if self.references.iter().any(|r| r.ref_number == reference.ref_number.as_str()) {
            return false;
        }
        self.references.push(Reference {
            ref_number: reference.ref_number.to_string(),
            user_id: reference.user_id.clone(),
            mod_id: reference.mod_id,
            timestamp: Utc::now(),
            claims_used: 0,
            claims_max: reference.claims_max,
        });
        true
    }
}

#[derive(Default)]
pub struct InMemoryLedger {
    data: Mutex<LedgerData>,
    failing: AtomicBool,
    failing_job_updates: AtomicBool,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn data(&self) -> MutexGuard<'_, LedgerData> {
        self.data.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// While set, every repository call fails like a lost connection.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// While set, only creation-job status updates fail.
    pub fn set_failing_job_updates(&self, failing: bool) {
        self.failing_job_updates.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), Error> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }

    // ---- seeding / inspection, bypassing the trait contracts ----

    pub fn insert_mod(&self, item: ModItem) {
        self.data().mods.insert(item.id, item);
    }

    pub fn add_account(&self, mod_id: i32, username: &str, password: &str) -> i32 {
        let mut data = self.data();
        let id = data.accounts.len() as i32 + 1;
        data.accounts.push(Account {
            id,
            mod_id,
            username: username.to_string(),
            password: password.to_string(),
            is_available: true,
        });
        id
    }

    pub fn reference(&self, ref_number: &str) -> Option<Reference> {
        self.data().references.iter().find(|r| r.ref_number == ref_number).cloned()
    }

    pub fn reference_count(&self) -> usize {
        self.data().references.len()
    }

    pub fn available_accounts(&self, mod_id: i32) -> usize {
        self.data()
            .accounts
            .iter()
            .filter(|a| a.mod_id == mod_id && a.is_available)
            .count()
    }

    pub fn mod_by_id(&self, mod_id: i32) -> Option<ModItem> {
        self.data().mods.get(&mod_id).cloned()
    }

    pub fn jobs(&self) -> Vec<CreationJob> {
        self.data().jobs.clone()
    }

    /// Inserts a job as-is, e.g. one the worker already finished.
    pub fn push_job(&self, job: CreationJob) {
        self.data().jobs.push(job);
    }

    pub fn admin(&self, user_id: &str) -> Option<AdminRecord> {
        self.data().admins.get(user_id).cloned()
    }
}

#[async_trait]
impl ModRepository for InMemoryLedger {
    async fn create_mod(&self, item: &ModItem) -> Result<(), Error> {
        self.check()?;
        let mut data = self.data();
        if data.mods.contains_key(&item.id) || data.mods.values().any(|m| m.name == item.name) {
            return Err(Error::DuplicateMod(format!("id {} or name '{}'", item.id, item.name)));
        }
        data.mods.insert(item.id, item.clone());
        Ok(())
    }

    async fn get_mod(&self, mod_id: i32) -> Result<Option<ModItem>, Error> {
        self.check()?;
        Ok(self.data().mods.get(&mod_id).cloned())
    }

    async fn list_mods(&self) -> Result<Vec<ModListing>, Error> {
        self.check()?;
        let data = self.data();
        Ok(data
            .mods
            .values()
            .map(|m| ModListing {
                item: m.clone(),
                stock: data
                    .accounts
                    .iter()
                    .filter(|a| a.mod_id == m.id && a.is_available)
                    .count() as i64,
            })
            .collect())
    }

    async fn find_mods_by_price(&self, amount: Decimal, tolerance: Decimal) -> Result<Vec<ModItem>, Error> {
        self.check()?;
        Ok(self
            .data()
            .mods
            .values()
            .filter(|m| (m.price - amount).abs() <= tolerance)
            .cloned()
            .collect())
    }

    async fn update_mod_details(&self, mod_id: i32, updates: &[ModUpdate]) -> Result<(), Error> {
        self.check()?;
        let mut data = self.data();
        for update in updates {
            if let ModUpdate::Name(name) = update {
                if data.mods.values().any(|m| m.id != mod_id && &m.name == name) {
                    return Err(Error::DuplicateMod("a mod with that name already exists".into()));
                }
            }
        }
        let item = data.mods.get_mut(&mod_id).ok_or(Error::ModNotFound(mod_id))?;
        for update in updates {
            update.apply(item);
        }
        Ok(())
    }
}

#[async_trait]
impl AccountRepository for InMemoryLedger {
    async fn add_bulk_accounts(&self, mod_id: i32, accounts: &[NewAccount]) -> Result<u64, Error> {
        self.check()?;
        let mut data = self.data();
        for acc in accounts {
            let id = data.accounts.len() as i32 + 1;
            data.accounts.push(Account {
                id,
                mod_id,
                username: acc.username.clone(),
                password: acc.password.clone(),
                is_available: true,
            });
        }
        Ok(accounts.len() as u64)
    }

    async fn get_available_account(&self, mod_id: i32) -> Result<Option<Account>, Error> {
        self.check()?;
        Ok(self
            .data()
            .accounts
            .iter()
            .find(|a| a.mod_id == mod_id && a.is_available)
            .cloned())
    }

    async fn claim_account(&self, account_id: i32) -> Result<bool, Error> {
        self.check()?;
        let mut data = self.data();
        match data.accounts.iter_mut().find(|a| a.id == account_id && a.is_available) {
            Some(acc) => {
                acc.is_available = false;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl ReferenceRepository for InMemoryLedger {
    async fn insert_reference(&self, reference: &NewReference) -> Result<(), Error> {
        self.check()?;
        if self.data().insert_reference(reference) {
            Ok(())
        } else {
            Err(Error::DuplicateReference(reference.ref_number.to_string()))
        }
    }

    async fn insert_bulk_references(&self, references: &[NewReference]) -> Result<Vec<RefNumber>, Error> {
        self.check()?;
        let mut data = self.data();
        Ok(references
            .iter()
            .filter(|r| !data.insert_reference(r))
            .map(|r| r.ref_number.clone())
            .collect())
    }

    async fn get_reference(&self, ref_number: &RefNumber) -> Result<Option<ReferenceDetails>, Error> {
        self.check()?;
        let data = self.data();
        Ok(data
            .references
            .iter()
            .find(|r| r.ref_number == ref_number.as_str())
            .map(|r| data.details(r)))
    }

    async fn list_references(&self) -> Result<Vec<ReferenceDetails>, Error> {
        self.check()?;
        let data = self.data();
        let mut list: Vec<ReferenceDetails> = data.references.iter().rev().map(|r| data.details(r)).collect();
        list.sort_by(|a, b| b.reference.timestamp.cmp(&a.reference.timestamp));
        Ok(list)
    }

    async fn use_claim(&self, ref_number: &RefNumber) -> Result<bool, Error> {
        self.check()?;
        let mut data = self.data();
        match data
            .references
            .iter_mut()
            .find(|r| r.ref_number == ref_number.as_str() && r.claims_used < r.claims_max)
        {
            Some(r) => {
                r.claims_used += 1;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn try_claim(&self, ref_number: &RefNumber) -> Result<ClaimOutcome, Error> {
        self.check()?;
        let mut data = self.data();

        let Some(idx) = data.references.iter().position(|r| r.ref_number == ref_number.as_str()) else {
            return Ok(ClaimOutcome::NotFound);
        };
        let (mod_id, claims_used, claims_max) = {
            let r = &data.references[idx];
            (r.mod_id, r.claims_used, r.claims_max)
        };
        if claims_used >= claims_max {
            return Ok(ClaimOutcome::Exhausted { claims_used, claims_max });
        }

        let Some(account) = data
            .accounts
            .iter_mut()
            .find(|a| a.mod_id == mod_id && a.is_available)
        else {
            return Ok(ClaimOutcome::OutOfStock { mod_id });
        };
        account.is_available = false;
        let account = account.clone();

        data.references[idx].claims_used += 1;
        Ok(ClaimOutcome::Granted(ClaimGrant {
            account,
            ref_number: ref_number.clone(),
            mod_id,
            mod_name: data.mod_name(mod_id),
            claims_used: claims_used + 1,
            claims_max,
        }))
    }

    async fn update_reference_mod(&self, ref_number: &RefNumber, mod_id: i32) -> Result<bool, Error> {
        self.check()?;
        let mut data = self.data();
        match data.references.iter_mut().find(|r| r.ref_number == ref_number.as_str()) {
            Some(r) => {
                r.mod_id = mod_id;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_reference(&self, ref_number: &RefNumber) -> Result<u64, Error> {
        self.check()?;
        let mut data = self.data();
        let before = data.references.len();
        data.references.retain(|r| r.ref_number != ref_number.as_str());
        Ok((before - data.references.len()) as u64)
    }
}

#[async_trait]
impl AdminRepository for InMemoryLedger {
    async fn get_admin(&self, user_id: &str) -> Result<Option<AdminRecord>, Error> {
        self.check()?;
        Ok(self.data().admins.get(user_id).cloned())
    }

    async fn list_admins(&self) -> Result<Vec<AdminRecord>, Error> {
        self.check()?;
        Ok(self.data().admins.values().cloned().collect())
    }

    async fn upsert_admin(&self, user_id: &str, contact_number: Option<&str>) -> Result<(), Error> {
        self.check()?;
        let mut data = self.data();
        let rec = data
            .admins
            .entry(user_id.to_string())
            .or_insert_with(|| AdminRecord::new(user_id));
        if let Some(contact) = contact_number {
            rec.contact_number = Some(contact.to_string());
        }
        Ok(())
    }

    async fn set_online(&self, user_id: &str, is_online: bool) -> Result<(), Error> {
        self.check()?;
        let mut data = self.data();
        data.admins
            .entry(user_id.to_string())
            .or_insert_with(|| AdminRecord::new(user_id))
            .is_online = is_online;
        Ok(())
    }
}

#[async_trait]
impl CreationJobRepository for InMemoryLedger {
    async fn create_job(&self, job: &NewCreationJob) -> Result<i32, Error> {
        self.check()?;
        let mut data = self.data();
        let job_id = data.jobs.iter().map(|j| j.job_id).max().unwrap_or(0) + 1;
        let now = Utc::now();
        data.jobs.push(CreationJob {
            job_id,
            user_id: job.user_id.clone(),
            email: job.email.clone(),
            password: job.password.clone(),
            mod_id: job.mod_id,
            status: JobStatus::Pending,
            result_message: None,
            created_at: now,
            updated_at: now,
        });
        Ok(job_id)
    }

    async fn list_recent_jobs(&self, limit: i64) -> Result<Vec<CreationJob>, Error> {
        self.check()?;
        let mut jobs = self.data().jobs.clone();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.job_id.cmp(&a.job_id)));
        jobs.truncate(limit.max(0) as usize);
        Ok(jobs)
    }

    async fn actionable_jobs(&self) -> Result<Vec<CreationJob>, Error> {
        self.check()?;
        Ok(self
            .data()
            .jobs
            .iter()
            .filter(|j| matches!(j.status, JobStatus::Completed | JobStatus::Failed))
            .cloned()
            .collect())
    }

    async fn update_job_status(&self, job_id: i32, status: JobStatus) -> Result<(), Error> {
        self.check()?;
        if self.failing_job_updates.load(Ordering::SeqCst) {
            return Err(Error::Database(sqlx::Error::PoolTimedOut));
        }
        let mut data = self.data();
        let job = data
            .jobs
            .iter_mut()
            .find(|j| j.job_id == job_id)
            .ok_or_else(|| Error::NotFound(format!("creation job {job_id}")))?;
        job.status = status;
        job.updated_at = Utc::now();
        Ok(())
    }

    async fn stale_pending_jobs(&self, created_before: DateTime<Utc>) -> Result<Vec<i32>, Error> {
        self.check()?;
        Ok(self
            .data()
            .jobs
            .iter()
            .filter(|j| j.status == JobStatus::Pending && j.created_at < created_before)
            .map(|j| j.job_id)
            .collect())
    }
}
