//! Core types for the session store
//!
//! Records are validated on every load and every save:
//! - names are non-empty after trimming and unique within a session
//! - amounts are non-negative and at most `MAX_AMOUNT`
//! - a submitted player has a final amount

use crate::{Error, Result};
use chrono::{DateTime, Duration, Utc};
use potsplit_settlement::{
    money::{in_range, MAX_AMOUNT},
    Participant, PaymentHandle, Transaction,
};
use rand::{distributions::Alphanumeric, Rng};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Length of generated session IDs
const SESSION_ID_LEN: usize = 13;

/// Session identifier, safe to use as a file name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SessionId(String);

impl SessionId {
    /// Random lowercase alphanumeric ID
    pub fn generate() -> Self {
        let id = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(SESSION_ID_LEN)
            .map(|b| char::from(b).to_ascii_lowercase())
            .collect();
        Self(id)
    }

    /// Parse an ID received from outside
    pub fn parse(raw: impl Into<String>) -> Result<Self> {
        let raw = raw.into();
        if raw.is_empty() || raw.len() > 64 {
            return Err(Error::InvalidRecord(format!("bad session id length: {raw:?}")));
        }
        if !raw
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(Error::InvalidRecord(format!("bad session id: {raw:?}")));
        }
        Ok(Self(raw))
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for SessionId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(value)
    }
}

impl From<SessionId> for String {
    fn from(id: SessionId) -> Self {
        id.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Player submission state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerStatus {
    /// Final amount not yet submitted
    Pending,
    /// Final amount submitted
    Submitted,
}

/// Session lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Players joining and submitting
    Active,
    /// Verified transactions produced, waiting on payments
    PendingSettlement,
    /// Completed and exported
    Settled,
}

/// Player record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    /// Display name
    pub name: String,

    /// Amount bought in for
    pub buy_in_amount: Decimal,

    /// Amount held at the end
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_amount: Option<Decimal>,

    /// Payment handle
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_handle: Option<PaymentHandle>,

    /// Submission state
    pub status: PlayerStatus,
}

impl Player {
    /// Check a single player record
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::InvalidRecord("player name is empty".to_string()));
        }
        if self.buy_in_amount < Decimal::ZERO {
            return Err(Error::InvalidRecord(format!(
                "{}: buy-in {} is negative",
                self.name, self.buy_in_amount
            )));
        }
        if !in_range(self.buy_in_amount) {
            return Err(Error::InvalidRecord(format!(
                "{}: buy-in {} exceeds {}",
                self.name, self.buy_in_amount, MAX_AMOUNT
            )));
        }
        match self.final_amount {
            Some(amount) if amount < Decimal::ZERO => {
                return Err(Error::InvalidRecord(format!(
                    "{}: final amount {} is negative",
                    self.name, amount
                )));
            }
            Some(amount) if !in_range(amount) => {
                return Err(Error::InvalidRecord(format!(
                    "{}: final amount {} exceeds {}",
                    self.name, amount, MAX_AMOUNT
                )));
            }
            None if self.status == PlayerStatus::Submitted => {
                return Err(Error::InvalidRecord(format!(
                    "{}: submitted without a final amount",
                    self.name
                )));
            }
            _ => {}
        }
        Ok(())
    }
}

impl From<&Player> for Participant {
    fn from(player: &Player) -> Self {
        Participant {
            name: player.name.clone(),
            buy_in_amount: player.buy_in_amount,
            final_amount: player.final_amount,
            payment_handle: player.payment_handle.clone(),
        }
    }
}

/// One event (poker night)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Session ID
    pub id: SessionId,

    /// Creation time, drives expiry
    pub created_at: DateTime<Utc>,

    /// Lifecycle state
    pub status: SessionStatus,

    /// Players in join order; the first is the host
    pub players: Vec<Player>,

    /// Margin of error used for the stored transactions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub margin_of_error: Option<Decimal>,

    /// Last verified transaction set
    #[serde(default)]
    pub transactions: Vec<Transaction>,
}

impl Session {
    /// Empty active session
    pub fn new(id: SessionId, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            created_at,
            status: SessionStatus::Active,
            players: Vec::new(),
            margin_of_error: None,
            transactions: Vec::new(),
        }
    }

    /// The organizer
    pub fn host(&self) -> Option<&Player> {
        self.players.first()
    }

    /// Host payment handle, required before settling
    pub fn host_handle(&self) -> Result<&PaymentHandle> {
        self.host()
            .and_then(|p| p.payment_handle.as_ref())
            .ok_or(Error::HostHandleMissing)
    }

    /// Players as settlement participants
    pub fn participants(&self) -> Vec<Participant> {
        self.players.iter().map(Participant::from).collect()
    }

    /// No player left pending
    pub fn all_submitted(&self) -> bool {
        self.players
            .iter()
            .all(|p| p.status == PlayerStatus::Submitted)
    }

    /// Find a player by name
    pub fn player_mut(&mut self, name: &str) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.name == name)
    }

    /// Drop any produced transaction set after the inputs change
    pub fn invalidate_settlement(&mut self) {
        if !self.transactions.is_empty() || self.status == SessionStatus::PendingSettlement {
            tracing::info!(session_id = %self.id, "Discarding previous settlement");
        }
        self.transactions.clear();
        self.margin_of_error = None;
        self.status = SessionStatus::Active;
    }

    /// Older than `retention` at `now`
    pub fn is_expired(&self, now: DateTime<Utc>, retention: Duration) -> bool {
        now - self.created_at > retention
    }

    /// Check the whole record
    pub fn validate(&self) -> Result<()> {
        let mut names = HashSet::with_capacity(self.players.len());
        for player in &self.players {
            player.validate()?;
            if !names.insert(player.name.as_str()) {
                return Err(Error::DuplicatePlayer(player.name.clone()));
            }
        }
        if self.status != SessionStatus::Active && !self.all_submitted() {
            return Err(Error::InvalidRecord(format!(
                "session {} is {:?} with pending players",
                self.id, self.status
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn player(name: &str) -> Player {
        Player {
            name: name.to_string(),
            buy_in_amount: dec!(20),
            final_amount: Some(dec!(25)),
            payment_handle: Some(PaymentHandle::parse(format!("@{name}")).unwrap()),
            status: PlayerStatus::Submitted,
        }
    }

    #[test]
    fn test_generated_ids_are_file_safe() {
        let id = SessionId::generate();
        assert_eq!(id.as_str().len(), SESSION_ID_LEN);
        assert!(SessionId::parse(id.as_str()).is_ok());
        assert!(SessionId::parse("../etc").is_err());
        assert!(SessionId::parse("").is_err());
    }

    #[test]
    fn test_player_validation() {
        assert!(player("a").validate().is_ok());

        let mut blank = player("a");
        blank.name = "   ".to_string();
        assert!(blank.validate().is_err());

        let mut negative = player("a");
        negative.buy_in_amount = dec!(-1);
        assert!(negative.validate().is_err());

        let mut huge_final = player("a");
        huge_final.final_amount = Some(Decimal::MAX);
        assert!(matches!(huge_final.validate(), Err(Error::InvalidRecord(_))));

        let mut huge_buy_in = player("a");
        huge_buy_in.buy_in_amount = MAX_AMOUNT + dec!(1);
        assert!(matches!(huge_buy_in.validate(), Err(Error::InvalidRecord(_))));

        let mut at_limit = player("a");
        at_limit.buy_in_amount = MAX_AMOUNT;
        at_limit.final_amount = Some(MAX_AMOUNT);
        assert!(at_limit.validate().is_ok());

        let mut no_final = player("a");
        no_final.final_amount = None;
        assert!(no_final.validate().is_err());
        no_final.status = PlayerStatus::Pending;
        assert!(no_final.validate().is_ok());
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let mut session = Session::new(SessionId::generate(), Utc::now());
        session.players = vec![player("a"), player("a")];
        assert!(matches!(session.validate(), Err(Error::DuplicatePlayer(_))));
    }

    #[test]
    fn test_expiry_window() {
        let created = Utc::now();
        let session = Session::new(SessionId::generate(), created);
        let day = Duration::hours(24);

        assert!(!session.is_expired(created + day, day));
        assert!(session.is_expired(created + day + Duration::seconds(1), day));
    }

    #[test]
    fn test_json_shape_round_trips() {
        let mut session = Session::new(SessionId::parse("abc123").unwrap(), Utc::now());
        session.players.push(player("a"));

        let json = serde_json::to_value(&session).unwrap();
        assert_eq!(json["status"], "active");
        assert_eq!(json["players"][0]["paymentHandle"], "@a");
        assert_eq!(json["players"][0]["status"], "submitted");

        let back: Session = serde_json::from_value(json).unwrap();
        assert_eq!(back, session);
    }

    #[test]
    fn test_host_handle_required() {
        let mut session = Session::new(SessionId::generate(), Utc::now());
        assert!(matches!(session.host_handle(), Err(Error::HostHandleMissing)));

        session.players.push(player("host"));
        assert_eq!(session.host_handle().unwrap().as_str(), "@host");
    }
}
