//! Card and ledger entry types
//!
//! Cards carry the authoritative running balance. Operations (debits) and
//! recharges (credits) are the two kinds of ledger entries attached to a card.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Card identifier
pub type CardId = u64;

/// Operation identifier
pub type OperationId = u64;

/// Recharge (load) identifier
pub type LoadId = u64;

/// Brand a card belongs to
///
/// The API sends a free-form tag; the two brands the business issues are
/// recognized case-insensitively and anything else is kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CardType {
    Afriquia,
    Attijari,
    Other(String),
}

impl From<String> for CardType {
    fn from(tag: String) -> Self {
        match tag.trim().to_lowercase().as_str() {
            "afriquia" => CardType::Afriquia,
            "attijari" => CardType::Attijari,
            _ => CardType::Other(tag),
        }
    }
}

impl From<CardType> for String {
    fn from(card_type: CardType) -> Self {
        card_type.to_string()
    }
}

impl fmt::Display for CardType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CardType::Afriquia => f.write_str("Afriquia"),
            CardType::Attijari => f.write_str("Attijari"),
            CardType::Other(tag) => f.write_str(tag),
        }
    }
}

/// Prepaid card with its running balance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub id: CardId,

    #[serde(rename = "type")]
    pub card_type: CardType,

    /// Display-only card number, absent for some cards
    #[serde(default)]
    pub number: Option<String>,

    /// Authoritative balance as last reported by the API
    ///
    /// Only diverges from the server while an optimistic prediction is
    /// in flight.
    pub balance: Decimal,
}

/// Debit against a card
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub id: OperationId,
    pub card_id: CardId,
    #[serde(default)]
    pub designation: String,
    pub debit: Decimal,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Credit against a card
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recharge {
    pub id: LoadId,
    pub card_id: CardId,
    pub amount: Decimal,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Body of `POST /operations/:cardId` and `PUT /operations/:operationId`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationRequest {
    pub designation: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub debit: Decimal,
}

/// Body of `POST /cards/load/:cardId` and `PUT /cards/load/:loadId`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RechargeRequest {
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
}
