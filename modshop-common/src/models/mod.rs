// File: modshop-common/src/models/mod.rs
pub mod account;
pub mod admin;
pub mod catalog;
pub mod creation_job;
pub mod event;
pub mod receipt;
pub mod reference;

pub use account::{Account, NewAccount};
pub use admin::AdminRecord;
pub use catalog::{parse_price, ModField, ModItem, ModListing, ModUpdate, MAX_PRICE};
pub use creation_job::{CreationJob, JobStatus, NewCreationJob};
pub use event::{InboundEvent, InboundKind};
pub use receipt::{ParsedReceipt, ReceiptAnalysis, VerificationStatus};
pub use reference::{
    BulkReferenceOutcome, ClaimGrant, ClaimOutcome, NewReference, RefNumber, Reference,
    ReferenceDetails, ADMIN_ADDED,
};
