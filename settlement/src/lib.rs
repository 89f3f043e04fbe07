//! Pot Settlement Engine
//!
//! Decides who owes whom after a shared-expense event such as a poker night.
//!
//! # Architecture
//!
//! 1. **Balances**: `final - buy_in` per participant plus an equal share of
//!    the margin of error, rounded to cents at every step
//! 2. **Generation**: one request per debtor, then one payout per creditor,
//!    in participant order
//! 3. **Validation**: balances are recomputed from scratch and every
//!    participant who must settle needs a matching transaction
//!
//! Payment links are built separately from a transaction whose open side has
//! been filled in with the organizer's handle.
//!
//! # Example
//!
//! ```
//! use potsplit_settlement::{Participant, PaymentHandle, SettlementEngine};
//! use rust_decimal::Decimal;
//!
//! # fn main() -> potsplit_settlement::Result<()> {
//! let participants = vec![
//!     Participant::new("a", Decimal::new(100, 0))
//!         .with_final(Decimal::new(150, 0))
//!         .with_handle(PaymentHandle::parse("@a")?),
//!     Participant::new("b", Decimal::new(100, 0))
//!         .with_final(Decimal::new(50, 0))
//!         .with_handle(PaymentHandle::parse("@b")?),
//! ];
//!
//! let transactions = SettlementEngine::new().settle(&participants, Decimal::ZERO)?;
//! assert_eq!(transactions.len(), 2);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod balance;
pub mod config;
pub mod engine;
pub mod error;
pub mod links;
pub mod money;
pub mod types;
pub mod validator;

// Re-exports
pub use config::{Config, LinkConfig};
pub use engine::{summarize, SettlementEngine, SettlementSummary};
pub use error::{Error, Result};
pub use links::{LinkBuilder, PaymentLinks};
pub use types::*;
pub use validator::{SettlementValidator, ValidationFailure};
