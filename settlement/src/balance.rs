//! Balance calculation
//!
//! `net = round2(round2(final - buy_in) + round2(margin / count))`
//!
//! The margin share is computed once and applied to every participant,
//! whatever the sign of their own result.

use crate::{
    money::round2,
    types::{Balance, Participant},
};
use rust_decimal::Decimal;

/// Equal share of the margin of error, rounded to cents
///
/// Zero participants yield a zero share.
pub fn margin_share(margin_of_error: Decimal, participant_count: usize) -> Decimal {
    if participant_count == 0 {
        return Decimal::ZERO;
    }
    round2(margin_of_error / Decimal::from(participant_count))
}

/// Net balance of one participant given a precomputed margin share
pub fn net_balance(participant: &Participant, share: Decimal) -> Decimal {
    let base = round2(participant.raw_net());
    round2(base + share)
}

/// One balance per participant, in input order
pub fn calculate_balances(participants: &[Participant], margin_of_error: Decimal) -> Vec<Balance> {
    let share = margin_share(margin_of_error, participants.len());

    participants
        .iter()
        .map(|p| Balance {
            name: p.name.clone(),
            payment_handle: p.payment_handle.clone(),
            net: net_balance(p, share),
        })
        .collect()
}

/// Pot surplus/deficit before margin distribution, rounded to cents
pub fn total_raw_net(participants: &[Participant]) -> Decimal {
    round2(participants.iter().map(Participant::raw_net).sum())
}
