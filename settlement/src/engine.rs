//! Settlement generator
//!
//! Two ordered passes over the participants:
//!
//! 1. every debtor (net ≤ -0.01) with a handle gets a request *from* them
//! 2. every creditor (net ≥ +0.01) with a handle gets a payout *to* them
//!
//! This is not a netting algorithm. Each qualifying participant gets exactly
//! one transaction and the acting identity (the organizer) sits on the other
//! side of all of them.
//!
//! # Example
//!
//! ```text
//! a: buy-in 100, final 150  → +50  → pay $50.00 to @a
//! b: buy-in 100, final  50  → -50  → request $50.00 from @b
//!
//! Output order: request from @b, payout to @a
//! ```

use crate::{
    balance::calculate_balances,
    money::{format_amount, round2, TOLERANCE},
    types::{Balance, Participant, Transaction},
    validator::SettlementValidator,
    Result,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Settlement engine
#[derive(Debug, Clone, Default)]
pub struct SettlementEngine {
    validator: SettlementValidator,
}

/// Totals of one generated transaction set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementSummary {
    /// Sum of request amounts
    pub total_requested: Decimal,

    /// Sum of payout amounts
    pub total_paid_out: Decimal,

    /// Names with a non-trivial balance but no payment handle
    pub unsettled: Vec<String>,
}

impl SettlementSummary {
    /// Requests and payouts agree within tolerance
    pub fn is_balanced(&self) -> bool {
        (self.total_requested - self.total_paid_out).abs() <= TOLERANCE
    }
}

impl SettlementEngine {
    /// Create new settlement engine
    pub fn new() -> Self {
        Self::default()
    }

    /// Produce the transaction set for `participants`
    ///
    /// Fewer than two participants yield no transactions.
    pub fn generate(&self, participants: &[Participant], margin_of_error: Decimal) -> Vec<Transaction> {
        if participants.len() < 2 {
            return Vec::new();
        }

        let balances = calculate_balances(participants, margin_of_error);
        tracing::debug!(
            participants = participants.len(),
            margin_of_error = %margin_of_error,
            "Computed balances"
        );

        let mut transactions = Vec::with_capacity(balances.len());

        for balance in &balances {
            let Some(handle) = &balance.payment_handle else {
                continue;
            };
            if balance.net > -TOLERANCE {
                continue;
            }

            let amount = round2(balance.net.abs());
            let tx = Transaction::request(
                handle.clone(),
                amount,
                format!("{} owes ${}", balance.name, format_amount(amount)),
            );
            tracing::debug!(name = %balance.name, transaction = %tx, "Created debtor transaction");
            transactions.push(tx);
        }

        for balance in &balances {
            let Some(handle) = &balance.payment_handle else {
                continue;
            };
            if balance.net < TOLERANCE {
                continue;
            }

            let amount = round2(balance.net);
            let tx = Transaction::payout(
                handle.clone(),
                amount,
                format!("{} won ${}", balance.name, format_amount(amount)),
            );
            tracing::debug!(name = %balance.name, transaction = %tx, "Created creditor transaction");
            transactions.push(tx);
        }

        tracing::info!(
            participants = participants.len(),
            transactions = transactions.len(),
            "Settlement generated"
        );

        transactions
    }

    /// Generate and independently validate; unverified sets never escape
    pub fn settle(&self, participants: &[Participant], margin_of_error: Decimal) -> Result<Vec<Transaction>> {
        let transactions = self.generate(participants, margin_of_error);
        self.validator.check(participants, &transactions, margin_of_error)?;

        let summary = summarize(participants, &transactions, margin_of_error);
        if !summary.is_balanced() {
            tracing::warn!(
                total_requested = %summary.total_requested,
                total_paid_out = %summary.total_paid_out,
                unsettled = ?summary.unsettled,
                "Requests and payouts differ"
            );
        }

        Ok(transactions)
    }
}

/// Totals of `transactions` plus who was left out for lack of a handle
pub fn summarize(
    participants: &[Participant],
    transactions: &[Transaction],
    margin_of_error: Decimal,
) -> SettlementSummary {
    let (requests, payouts): (Vec<&Transaction>, Vec<&Transaction>) =
        transactions.iter().partition(|t| t.is_request());

    let unsettled = if participants.len() < 2 {
        Vec::new()
    } else {
        calculate_balances(participants, margin_of_error)
            .into_iter()
            .filter(|b| b.payment_handle.is_none() && b.net.abs() > TOLERANCE)
            .map(|b: Balance| b.name)
            .collect()
    };

    SettlementSummary {
        total_requested: requests.iter().map(|t| t.amount()).sum(),
        total_paid_out: payouts.iter().map(|t| t.amount()).sum(),
        unsettled,
    }
}
