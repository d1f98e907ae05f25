// File: modshop-common/src/models/receipt.rs
//
// Raw vision-model output and the validated form the rest of the bot consumes.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::Error;
use crate::models::reference::RefNumber;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VerificationStatus {
    Approved,
    Flagged,
    Rejected,
    #[serde(other)]
    Unknown,
}

impl Default for VerificationStatus {
    fn default() -> Self {
        VerificationStatus::Unknown
    }
}

/// Fields the model claims to have read off the receipt. Untrusted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedInfo {
    #[serde(default, deserialize_with = "lenient_string")]
    pub amount: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub reference_number: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub date: Option<String>,
}

/// Whatever the receipt analyzer returned.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReceiptAnalysis {
    #[serde(default)]
    pub extracted_info: ExtractedInfo,
    #[serde(default)]
    pub verification_status: VerificationStatus,
    #[serde(default)]
    pub reasoning: String,
}

impl ReceiptAnalysis {
    pub fn with_fields(amount: &str, reference_number: &str) -> Self {
        Self {
            extracted_info: ExtractedInfo {
                amount: Some(amount.to_string()),
                reference_number: Some(reference_number.to_string()),
                date: None,
            },
            verification_status: VerificationStatus::Unknown,
            reasoning: String::new(),
        }
    }
}

/// Models sometimes emit numbers where strings were asked for.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// A receipt whose amount and reference number passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedReceipt {
    pub amount: Decimal,
    pub ref_number: RefNumber,
}

impl ParsedReceipt {
    /// Amount: keep only digits and `.`. Reference: drop all whitespace.
    pub fn normalize(analysis: &ReceiptAnalysis) -> (String, String) {
        let info = &analysis.extracted_info;
        let amount: String = info
            .amount
            .as_deref()
            .unwrap_or_default()
            .chars()
            .filter(|c| c.is_ascii_digit() || *c == '.')
            .collect();
        let reference: String = info
            .reference_number
            .as_deref()
            .unwrap_or_default()
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        (amount, reference)
    }

    pub fn from_analysis(analysis: &ReceiptAnalysis) -> Result<Self, Error> {
        let (amount_str, reference) = Self::normalize(analysis);
        let unreadable = || Error::UnreadableReceipt {
            amount: amount_str.clone(),
            reference: reference.clone(),
        };

        let amount = Decimal::from_str(&amount_str).map_err(|_| unreadable())?;
        let ref_number = RefNumber::parse(&reference).map_err(|_| unreadable())?;
        Ok(Self { amount, ref_number })
    }
}
