//! Settlement validation
//!
//! Recomputes balances straight from the participants and checks a candidate
//! transaction set against them. Checks run in order and stop at the first
//! failure:
//!
//! 1. the pre-distribution pot imbalance equals the declared margin of error
//! 2. every handle holder with |net| > 0.01 has a matching transaction
//!
//! Extra transactions that match nobody are not an error.

use crate::{
    balance::{margin_share, net_balance, total_raw_net},
    money::{round2, within_tolerance, TOLERANCE},
    types::{Participant, Transaction},
};
use rust_decimal::Decimal;
use thiserror::Error;

/// Why a transaction set was rejected
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationFailure {
    /// Pot imbalance differs from the declared margin of error
    #[error("total net {total_net} does not match margin of error {margin_of_error}")]
    MarginMismatch {
        /// `round2(Σ(final - buy_in))`
        total_net: Decimal,
        /// Declared margin
        margin_of_error: Decimal,
    },

    /// A participant who must settle has no matching transaction
    #[error("missing transaction for {name} (balance {balance})")]
    MissingTransaction {
        /// Participant name
        name: String,
        /// Expected signed balance
        balance: Decimal,
    },
}

/// Settlement validator
#[derive(Debug, Clone, Default)]
pub struct SettlementValidator;

impl SettlementValidator {
    /// Create new validator
    pub fn new() -> Self {
        Self
    }

    /// Boolean verdict; failures are logged, never raised
    pub fn validate(
        &self,
        participants: &[Participant],
        transactions: &[Transaction],
        margin_of_error: Decimal,
    ) -> bool {
        match self.check(participants, transactions, margin_of_error) {
            Ok(()) => true,
            Err(failure) => {
                tracing::error!(
                    %failure,
                    participants = participants.len(),
                    transactions = transactions.len(),
                    "Settlement validation failed"
                );
                false
            }
        }
    }

    /// Run the checks and report the first failure
    pub fn check(
        &self,
        participants: &[Participant],
        transactions: &[Transaction],
        margin_of_error: Decimal,
    ) -> Result<(), ValidationFailure> {
        if participants.len() < 2 {
            return Ok(());
        }

        let total_net = total_raw_net(participants);
        if !within_tolerance(total_net, margin_of_error) {
            return Err(ValidationFailure::MarginMismatch {
                total_net,
                margin_of_error,
            });
        }

        let share = margin_share(margin_of_error, participants.len());

        for participant in participants {
            let Some(handle) = &participant.payment_handle else {
                continue;
            };

            let balance = net_balance(participant, share);
            if balance.abs() <= TOLERANCE {
                continue;
            }

            let found = transactions.iter().any(|t| {
                let amount = round2(t.amount());
                if balance < Decimal::ZERO {
                    t.payer() == Some(handle)
                        && t.is_request()
                        && within_tolerance(amount, balance.abs())
                } else {
                    t.payee() == Some(handle)
                        && !t.is_request()
                        && within_tolerance(amount, balance)
                }
            });

            if !found {
                return Err(ValidationFailure::MissingTransaction {
                    name: participant.name.clone(),
                    balance,
                });
            }
        }

        Ok(())
    }
}
