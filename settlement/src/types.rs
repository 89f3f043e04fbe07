//! Core types for the settlement engine

use crate::money::format_amount;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// External payment identifier (e.g. `@alice`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PaymentHandle(String);

impl PaymentHandle {
    /// Parse a handle; it must start with `@`, name someone, and contain no whitespace
    pub fn parse(raw: impl Into<String>) -> crate::Result<Self> {
        let raw = raw.into();
        let rest = raw
            .strip_prefix('@')
            .ok_or_else(|| crate::Error::InvalidHandle(format!("{raw:?} must start with '@'")))?;

        if rest.is_empty() {
            return Err(crate::Error::InvalidHandle("handle is empty".to_string()));
        }
        if rest.chars().any(char::is_whitespace) {
            return Err(crate::Error::InvalidHandle(format!(
                "{raw:?} contains whitespace"
            )));
        }

        Ok(Self(raw))
    }

    /// Get as string, including the leading `@`
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Handle without the leading `@`, as payment apps expect for recipients
    pub fn recipient(&self) -> &str {
        &self.0[1..]
    }
}

impl TryFrom<String> for PaymentHandle {
    type Error = crate::Error;

    fn try_from(value: String) -> crate::Result<Self> {
        Self::parse(value)
    }
}

impl From<PaymentHandle> for String {
    fn from(handle: PaymentHandle) -> Self {
        handle.0
    }
}

impl fmt::Display for PaymentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Someone who took part in the event
///
/// The engine assumes the record is well formed; validating names and
/// amounts is the job of whoever stores participants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    /// Display name, unique within an event
    pub name: String,

    /// Amount contributed at the start
    pub buy_in_amount: Decimal,

    /// Amount held at the end, `None` until submitted
    pub final_amount: Option<Decimal>,

    /// Where money is requested from or sent to
    pub payment_handle: Option<PaymentHandle>,
}

impl Participant {
    /// Create a participant with no final amount and no handle
    pub fn new(name: impl Into<String>, buy_in_amount: Decimal) -> Self {
        Self {
            name: name.into(),
            buy_in_amount,
            final_amount: None,
            payment_handle: None,
        }
    }

    /// Set the final amount
    pub fn with_final(mut self, final_amount: Decimal) -> Self {
        self.final_amount = Some(final_amount);
        self
    }

    /// Set the payment handle
    pub fn with_handle(mut self, handle: PaymentHandle) -> Self {
        self.payment_handle = Some(handle);
        self
    }

    /// `final - buy_in` with an absent final amount counted as zero, unrounded
    pub fn raw_net(&self) -> Decimal {
        self.final_amount.unwrap_or(Decimal::ZERO) - self.buy_in_amount
    }
}

/// Net position of one participant after margin distribution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Balance {
    /// Participant name
    pub name: String,

    /// Participant handle, if any
    pub payment_handle: Option<PaymentHandle>,

    /// Signed net amount: negative owes, positive is owed
    pub net: Decimal,
}

/// One settlement instruction with a single known side
///
/// Requests know who pays (`payer`), payouts know who is paid (`payee`). The
/// other side is whoever acts on the instruction and is filled in with
/// [`Transaction::resolve`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "TransactionRecord")]
pub struct Transaction {
    payer: Option<PaymentHandle>,
    payee: Option<PaymentHandle>,
    amount: Decimal,
    label: String,
    is_request: bool,
}

impl Transaction {
    /// Money requested from a debtor
    pub fn request(payer: PaymentHandle, amount: Decimal, label: impl Into<String>) -> Self {
        Self {
            payer: Some(payer),
            payee: None,
            amount,
            label: label.into(),
            is_request: true,
        }
    }

    /// Money sent to a creditor
    pub fn payout(payee: PaymentHandle, amount: Decimal, label: impl Into<String>) -> Self {
        Self {
            payer: None,
            payee: Some(payee),
            amount,
            label: label.into(),
            is_request: false,
        }
    }

    /// Debtor handle (requests only)
    pub fn payer(&self) -> Option<&PaymentHandle> {
        self.payer.as_ref()
    }

    /// Creditor handle (payouts only)
    pub fn payee(&self) -> Option<&PaymentHandle> {
        self.payee.as_ref()
    }

    /// Positive amount
    pub fn amount(&self) -> Decimal {
        self.amount
    }

    /// Human readable description
    pub fn label(&self) -> &str {
        &self.label
    }

    /// True for requests from debtors
    pub fn is_request(&self) -> bool {
        self.is_request
    }

    /// Fill in the unknown side with the acting identity
    pub fn resolve(&self, actor: &PaymentHandle) -> ResolvedTransaction {
        let (from, to) = match (&self.payer, &self.payee) {
            (Some(payer), _) => (payer.clone(), actor.clone()),
            (None, Some(payee)) => (actor.clone(), payee.clone()),
            // Constructors and deserialization never produce a record with no side.
            (None, None) => (actor.clone(), actor.clone()),
        };

        ResolvedTransaction {
            from,
            to,
            amount: self.amount,
            label: self.label.clone(),
            is_request: self.is_request,
        }
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.payer, &self.payee) {
            (Some(payer), _) => write!(f, "request {} from {}", format_amount(self.amount), payer),
            (None, Some(payee)) => write!(f, "pay {} to {}", format_amount(self.amount), payee),
            (None, None) => write!(f, "unaddressed {}", format_amount(self.amount)),
        }
    }
}

/// Wire shape of a [`Transaction`] before the one-side rule is checked
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransactionRecord {
    #[serde(default)]
    payer: Option<PaymentHandle>,
    #[serde(default)]
    payee: Option<PaymentHandle>,
    amount: Decimal,
    label: String,
    is_request: bool,
}

impl TryFrom<TransactionRecord> for Transaction {
    type Error = crate::Error;

    fn try_from(record: TransactionRecord) -> crate::Result<Self> {
        match (&record.payer, &record.payee, record.is_request) {
            (Some(_), None, true) | (None, Some(_), false) => {}
            _ => {
                return Err(crate::Error::InvalidTransaction(
                    "exactly one of payer/payee must be set, matching isRequest".to_string(),
                ))
            }
        }
        if record.amount <= Decimal::ZERO {
            return Err(crate::Error::InvalidTransaction(format!(
                "amount must be positive, got {}",
                record.amount
            )));
        }

        Ok(Self {
            payer: record.payer,
            payee: record.payee,
            amount: record.amount,
            label: record.label,
            is_request: record.is_request,
        })
    }
}

/// A transaction with both sides known, ready for link building
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedTransaction {
    /// Who sends money
    pub from: PaymentHandle,

    /// Who receives money
    pub to: PaymentHandle,

    /// Positive amount
    pub amount: Decimal,

    /// Human readable description
    pub label: String,

    /// True when this originated as a request from a debtor
    pub is_request: bool,
}
