use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::error::Error;
use crate::models::{
    Account, AdminRecord, ClaimOutcome, CreationJob, JobStatus, ModItem, ModListing, ModUpdate,
    NewAccount, NewCreationJob, NewReference, RefNumber, ReferenceDetails,
};

#[async_trait]
pub trait ModRepository: Send + Sync {
    /// Fails with `DuplicateMod` if the id or the name is taken.
    async fn create_mod(&self, item: &ModItem) -> Result<(), Error>;
    async fn get_mod(&self, mod_id: i32) -> Result<Option<ModItem>, Error>;
    /// All mods ordered by id, with their available-account counts.
    async fn list_mods(&self) -> Result<Vec<ModListing>, Error>;
    /// Mods priced within `amount ± tolerance` (inclusive), ordered by id.
    async fn find_mods_by_price(&self, amount: Decimal, tolerance: Decimal) -> Result<Vec<ModItem>, Error>;
    /// Applies a partial update. Fails with `ModNotFound` if no row matched.
    async fn update_mod_details(&self, mod_id: i32, updates: &[ModUpdate]) -> Result<(), Error>;
}

#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// Inserts all accounts in one transaction; returns how many were added.
    async fn add_bulk_accounts(&self, mod_id: i32, accounts: &[NewAccount]) -> Result<u64, Error>;
    async fn get_available_account(&self, mod_id: i32) -> Result<Option<Account>, Error>;
    /// Flips one account to unavailable. Returns false if it was already claimed.
    async fn claim_account(&self, account_id: i32) -> Result<bool, Error>;
}

#[async_trait]
pub trait ReferenceRepository: Send + Sync {
    /// Conditional insert. Fails with `DuplicateReference` if the number exists;
    /// never overwrites.
    async fn insert_reference(&self, reference: &NewReference) -> Result<(), Error>;

    /// Inserts in one transaction and returns the numbers that already existed.
    async fn insert_bulk_references(&self, references: &[NewReference]) -> Result<Vec<RefNumber>, Error>;

    async fn get_reference(&self, ref_number: &RefNumber) -> Result<Option<ReferenceDetails>, Error>;

    /// Newest first.
    async fn list_references(&self) -> Result<Vec<ReferenceDetails>, Error>;

    /// Increments `claims_used` only while it is below `claims_max`.
    /// Returns whether a claim was consumed.
    async fn use_claim(&self, ref_number: &RefNumber) -> Result<bool, Error>;

    /// Checks the budget, takes one available account of the reference's mod,
    /// marks it claimed and consumes one claim, all as a single atomic step.
    async fn try_claim(&self, ref_number: &RefNumber) -> Result<ClaimOutcome, Error>;

    /// Returns false if the reference does not exist.
    async fn update_reference_mod(&self, ref_number: &RefNumber, mod_id: i32) -> Result<bool, Error>;

    /// Returns the number of rows removed (0 or 1).
    async fn delete_reference(&self, ref_number: &RefNumber) -> Result<u64, Error>;
}

#[async_trait]
pub trait AdminRepository: Send + Sync {
    async fn get_admin(&self, user_id: &str) -> Result<Option<AdminRecord>, Error>;
    async fn list_admins(&self) -> Result<Vec<AdminRecord>, Error>;
    /// Creates the row if missing. An existing contact number is kept when
    /// `contact_number` is `None`.
    async fn upsert_admin(&self, user_id: &str, contact_number: Option<&str>) -> Result<(), Error>;
    async fn set_online(&self, user_id: &str, is_online: bool) -> Result<(), Error>;
}

#[async_trait]
pub trait CreationJobRepository: Send + Sync {
    async fn create_job(&self, job: &NewCreationJob) -> Result<i32, Error>;
    async fn list_recent_jobs(&self, limit: i64) -> Result<Vec<CreationJob>, Error>;
    /// Jobs the worker finished (`completed` or `failed`) that nobody has been told about yet.
    async fn actionable_jobs(&self) -> Result<Vec<CreationJob>, Error>;
    async fn update_job_status(&self, job_id: i32, status: JobStatus) -> Result<(), Error>;
    /// Ids of `pending` jobs created before `created_before`.
    async fn stale_pending_jobs(&self, created_before: DateTime<Utc>) -> Result<Vec<i32>, Error>;
}
