// File: modshop-common/src/models/reference.rs

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::models::account::Account;

/// `user_id` recorded for references registered by an admin rather than a buyer.
pub const ADMIN_ADDED: &str = "ADMIN_ADDED";

/// A payment reference number: exactly 13 ASCII digits, no separators.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RefNumber(String);

impl RefNumber {
    pub const LEN: usize = 13;

    /// Validates typed input. Surrounding whitespace is ignored, inner
    /// whitespace is not.
    pub fn parse(raw: &str) -> Result<Self, Error> {
        let candidate = raw.trim();
        if candidate.len() == Self::LEN && candidate.bytes().all(|b| b.is_ascii_digit()) {
            Ok(Self(candidate.to_string()))
        } else {
            Err(Error::Validation(format!(
                "'{}' is not a valid {}-digit reference number",
                candidate,
                Self::LEN
            )))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RefNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for RefNumber {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for RefNumber {
    type Error = Error;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<RefNumber> for String {
    fn from(value: RefNumber) -> Self {
        value.0
    }
}

impl AsRef<str> for RefNumber {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// One row of the claims ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Reference {
    pub ref_number: String,
    pub user_id: String,
    pub mod_id: i32,
    pub timestamp: DateTime<Utc>,
    pub claims_used: i32,
    pub claims_max: i32,
}

impl Reference {
    pub fn remaining_claims(&self) -> i32 {
        (self.claims_max - self.claims_used).max(0)
    }

    pub fn is_exhausted(&self) -> bool {
        self.claims_used >= self.claims_max
    }
}

/// A reference joined with the owning mod's name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceDetails {
    #[serde(flatten)]
    pub reference: Reference,
    pub mod_name: String,
}

/// Insert payload. `claims_max` is already the snapshot of the mod's default.
#[derive(Debug, Clone, PartialEq)]
pub struct NewReference {
    pub ref_number: RefNumber,
    pub user_id: String,
    pub mod_id: i32,
    pub claims_max: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClaimGrant {
    pub account: Account,
    pub ref_number: RefNumber,
    pub mod_id: i32,
    pub mod_name: String,
    /// Counter value after this claim.
    pub claims_used: i32,
    pub claims_max: i32,
}

/// Result of the atomic "consume one claim and hand out one account" operation.
#[derive(Debug, Clone, PartialEq)]
pub enum ClaimOutcome {
    Granted(ClaimGrant),
    Exhausted { claims_used: i32, claims_max: i32 },
    OutOfStock { mod_id: i32 },
    NotFound,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BulkReferenceOutcome {
    pub added: Vec<RefNumber>,
    pub duplicates: Vec<RefNumber>,
    pub invalid: Vec<String>,
}
