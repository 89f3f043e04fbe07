//! Session service
//!
//! The caller side of the settlement engine. It owns the preconditions the
//! engine does not check:
//!
//! - every player has submitted a final amount
//! - the host (first player) has a payment handle
//! - the declared margin of error matches the pot imbalance
//!
//! Writes to one session are serialized through a per-session lock, and any
//! change to a player discards the stored transaction set.

use crate::{
    clock::{Clock, SystemClock},
    config::Config,
    error::{Error, Result},
    export::{ExportRow, ExportSink, SheetFileSink},
    file_store::FileStore,
    storage::SessionStore,
    types::{Player, PlayerStatus, Session, SessionId, SessionStatus},
};
use chrono::NaiveDate;
use dashmap::DashMap;
use parking_lot::Mutex;
use potsplit_settlement::{
    balance::total_raw_net,
    money::{in_range, within_tolerance, MAX_AMOUNT},
    summarize, LinkBuilder, PaymentHandle, PaymentLinks, ResolvedTransaction, SettlementEngine,
    Transaction,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Player joining a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPlayer {
    /// Display name
    pub name: String,

    /// Buy-in
    pub buy_in_amount: Decimal,

    /// Final amount, if already known
    #[serde(default)]
    pub final_amount: Option<Decimal>,

    /// Payment handle
    #[serde(default)]
    pub payment_handle: Option<PaymentHandle>,
}

/// Correction to an existing player
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerUpdate {
    /// New buy-in
    #[serde(default)]
    pub buy_in_amount: Option<Decimal>,

    /// New final amount; also marks the player submitted
    #[serde(default)]
    pub final_amount: Option<Decimal>,
}

/// Session service
#[derive(Debug)]
pub struct SessionService {
    store: Arc<dyn SessionStore>,
    clock: Arc<dyn Clock>,
    engine: SettlementEngine,
    links: LinkBuilder,
    export: Option<Arc<dyn ExportSink>>,
    retention: chrono::Duration,
    locks: DashMap<SessionId, Arc<Mutex<()>>>,
}

impl SessionService {
    /// Create service over an existing store and clock
    pub fn new(store: Arc<dyn SessionStore>, clock: Arc<dyn Clock>, config: &Config) -> Self {
        Self {
            store,
            clock,
            engine: SettlementEngine::new(),
            links: LinkBuilder::new(config.settlement.links.clone()),
            export: None,
            retention: config.retention(),
            locks: DashMap::new(),
        }
    }

    /// File-backed service on the wall clock, exporting when configured
    pub fn open(config: &Config) -> Result<Self> {
        let store = Arc::new(FileStore::open(&config.data_dir)?);
        let mut service = Self::new(store, Arc::new(SystemClock), config);

        if let Some(path) = &config.export_path {
            service = service.with_export(Arc::new(SheetFileSink::new(path)));
        }

        Ok(service)
    }

    /// Attach an export sink
    pub fn with_export(mut self, sink: Arc<dyn ExportSink>) -> Self {
        self.export = Some(sink);
        self
    }

    /// Start a new empty session
    pub fn create_session(&self) -> Result<Session> {
        let session = Session::new(SessionId::generate(), self.clock.now());
        self.store.put(&session)?;

        tracing::info!(session_id = %session.id, "Session created");
        Ok(session)
    }

    /// Load a live session
    pub fn get_session(&self, id: &SessionId) -> Result<Session> {
        let session = self
            .store
            .get(id)?
            .ok_or_else(|| Error::SessionNotFound(id.to_string()))?;

        if session.is_expired(self.clock.now(), self.retention) {
            return Err(Error::SessionNotFound(id.to_string()));
        }
        Ok(session)
    }

    /// Players in join order
    pub fn list_players(&self, id: &SessionId) -> Result<Vec<Player>> {
        Ok(self.get_session(id)?.players)
    }

    /// Add a player; they are submitted when a final amount is included
    pub fn add_player(&self, id: &SessionId, new_player: NewPlayer) -> Result<Player> {
        self.update(id, |session| {
            if session.players.iter().any(|p| p.name == new_player.name) {
                return Err(Error::DuplicatePlayer(new_player.name.clone()));
            }

            let status = if new_player.final_amount.is_some() {
                PlayerStatus::Submitted
            } else {
                PlayerStatus::Pending
            };
            let player = Player {
                name: new_player.name,
                buy_in_amount: new_player.buy_in_amount,
                final_amount: new_player.final_amount,
                payment_handle: new_player.payment_handle,
                status,
            };
            player.validate()?;

            session.invalidate_settlement();
            session.players.push(player.clone());

            tracing::info!(
                session_id = %session.id,
                player = %player.name,
                status = ?player.status,
                "Player joined"
            );
            Ok(player)
        })
    }

    /// Record a player's final amount
    pub fn submit_final_amount(&self, id: &SessionId, name: &str, final_amount: Decimal) -> Result<Player> {
        self.update(id, |session| {
            let player = session
                .player_mut(name)
                .ok_or_else(|| Error::PlayerNotFound(name.to_string()))?;
            player.final_amount = Some(final_amount);
            player.status = PlayerStatus::Submitted;
            let player = player.clone();

            session.invalidate_settlement();
            tracing::info!(session_id = %session.id, player = %player.name, "Final amount submitted");
            Ok(player)
        })
    }

    /// Correct a player's amounts by join position
    pub fn update_player(&self, id: &SessionId, index: usize, update: PlayerUpdate) -> Result<Player> {
        self.update(id, |session| {
            let player = session
                .players
                .get_mut(index)
                .ok_or(Error::InvalidPlayerIndex(index))?;

            if let Some(buy_in) = update.buy_in_amount {
                player.buy_in_amount = buy_in;
            }
            if let Some(final_amount) = update.final_amount {
                player.final_amount = Some(final_amount);
                player.status = PlayerStatus::Submitted;
            }
            let player = player.clone();

            session.invalidate_settlement();
            tracing::info!(session_id = %session.id, player = %player.name, "Player updated");
            Ok(player)
        })
    }

    /// Compute, verify and store the transaction set
    ///
    /// A previous set is replaced. Nothing is stored when verification fails.
    pub fn settle(&self, id: &SessionId, margin_of_error: Decimal) -> Result<Vec<Transaction>> {
        self.update(id, |session| {
            if session.status == SessionStatus::Settled {
                return Err(Error::AlreadySettled);
            }
            if !session.all_submitted() {
                return Err(Error::NotAllSubmitted);
            }
            session.host_handle()?;
            if !in_range(margin_of_error) {
                return Err(Error::InvalidRecord(format!(
                    "margin of error {} exceeds {}",
                    margin_of_error, MAX_AMOUNT
                )));
            }

            let participants = session.participants();
            let total_net = total_raw_net(&participants);
            if !within_tolerance(total_net, margin_of_error) {
                return Err(Error::MarginMismatch {
                    total_net,
                    margin_of_error,
                });
            }

            let transactions = self
                .engine
                .settle(&participants, margin_of_error)
                .map_err(|e| {
                    tracing::error!(session_id = %session.id, error = %e, "Settlement failed validation");
                    e
                })?;

            let summary = summarize(&participants, &transactions, margin_of_error);
            if !summary.unsettled.is_empty() {
                tracing::warn!(
                    session_id = %session.id,
                    unsettled = ?summary.unsettled,
                    "Players without a payment handle left unsettled"
                );
            }

            session.transactions = transactions.clone();
            session.margin_of_error = Some(margin_of_error);
            session.status = SessionStatus::PendingSettlement;

            tracing::info!(
                session_id = %session.id,
                transactions = transactions.len(),
                margin_of_error = %margin_of_error,
                "Session settled"
            );
            Ok(transactions)
        })
    }

    /// Stored transactions with the host filled in as the acting side
    pub fn resolved_transactions(&self, id: &SessionId) -> Result<Vec<ResolvedTransaction>> {
        let session = self.get_session(id)?;
        if session.status == SessionStatus::Active {
            return Err(Error::NotSettled);
        }
        let host = session.host_handle()?;

        Ok(session.transactions.iter().map(|t| t.resolve(host)).collect())
    }

    /// Resolve `transaction` against the host and build its payment links
    pub fn payment_links(
        &self,
        id: &SessionId,
        transaction: &Transaction,
    ) -> Result<(ResolvedTransaction, PaymentLinks)> {
        let session = self.get_session(id)?;
        let host = session.host_handle()?;

        let resolved = transaction.resolve(host);
        let links = self.links.build(&resolved, host)?;
        Ok((resolved, links))
    }

    /// Mark the session settled and export its results
    ///
    /// The settled status is stored before exporting, so an event is exported
    /// at most once. A failed export puts the session back to
    /// `PendingSettlement` for a retry.
    pub fn complete(&self, id: &SessionId, date: NaiveDate) -> Result<Session> {
        self.with_session(id, |session| {
            match session.status {
                SessionStatus::Active => return Err(Error::NotSettled),
                SessionStatus::Settled => return Err(Error::AlreadySettled),
                SessionStatus::PendingSettlement => {}
            }

            session.status = SessionStatus::Settled;
            self.store.put(session)?;

            if let Some(sink) = &self.export {
                if let Err(e) = sink.append(date, &ExportRow::from_session(session)) {
                    tracing::error!(session_id = %session.id, error = %e, "Export failed, session reopened");
                    session.status = SessionStatus::PendingSettlement;
                    self.store.put(session)?;
                    return Err(e);
                }
            }

            tracing::info!(session_id = %session.id, date = %date, "Session completed");
            Ok(session.clone())
        })
    }

    /// Delete sessions older than the retention window
    pub fn sweep_expired(&self) -> Result<usize> {
        let cutoff = self.clock.now() - self.retention;
        let expired = self.store.list_expired(cutoff)?;

        let mut removed = 0;
        for id in expired {
            let lock = self.lock_for(&id);
            let _guard = lock.lock();

            if self.store.delete(&id)? {
                removed += 1;
                tracing::info!(session_id = %id, "Expired session removed");
            }
            self.locks.remove(&id);
        }

        if removed > 0 {
            tracing::info!(removed, "Expiry sweep complete");
        }
        Ok(removed)
    }

    fn lock_for(&self, id: &SessionId) -> Arc<Mutex<()>> {
        self.locks.entry(id.clone()).or_default().clone()
    }

    /// Load one session under its lock and hand it to `f`
    ///
    /// Unknown IDs are rejected before a lock entry is created.
    fn with_session<T>(&self, id: &SessionId, f: impl FnOnce(&mut Session) -> Result<T>) -> Result<T> {
        self.get_session(id)?;

        let lock = self.lock_for(id);
        let _guard = lock.lock();

        let mut session = match self.get_session(id) {
            Ok(session) => session,
            Err(e) => {
                // Swept or expired while waiting for the lock
                self.locks.remove(id);
                return Err(e);
            }
        };
        f(&mut session)
    }

    /// Load, mutate and store one session under its lock
    fn update<T>(&self, id: &SessionId, f: impl FnOnce(&mut Session) -> Result<T>) -> Result<T> {
        self.with_session(id, |session| {
            let out = f(session)?;
            self.store.put(session)?;
            Ok(out)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::storage::MemoryStore;
    use chrono::{Duration, Utc};
    use rust_decimal_macros::dec;

    #[derive(Debug, Default)]
    struct RecordingSink {
        events: Mutex<Vec<(NaiveDate, Vec<ExportRow>)>>,
    }

    impl ExportSink for RecordingSink {
        fn append(&self, date: NaiveDate, rows: &[ExportRow]) -> Result<()> {
            self.events.lock().push((date, rows.to_vec()));
            Ok(())
        }
    }

    #[derive(Debug)]
    struct FailingSink;

    impl ExportSink for FailingSink {
        fn append(&self, _date: NaiveDate, _rows: &[ExportRow]) -> Result<()> {
            Err(Error::Export("sheet unavailable".to_string()))
        }
    }

    /// Memory store that refuses to save settled sessions
    #[derive(Debug, Default)]
    struct NoSettledStore {
        inner: MemoryStore,
    }

    impl SessionStore for NoSettledStore {
        fn get(&self, id: &SessionId) -> Result<Option<Session>> {
            self.inner.get(id)
        }

        fn put(&self, session: &Session) -> Result<()> {
            if session.status == SessionStatus::Settled {
                return Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "disk full",
                )));
            }
            self.inner.put(session)
        }

        fn delete(&self, id: &SessionId) -> Result<bool> {
            self.inner.delete(id)
        }

        fn list(&self) -> Result<Vec<Session>> {
            self.inner.list()
        }

        fn list_expired(&self, cutoff: chrono::DateTime<Utc>) -> Result<Vec<SessionId>> {
            self.inner.list_expired(cutoff)
        }
    }

    fn service() -> (SessionService, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let service = SessionService::new(Arc::new(MemoryStore::new()), clock.clone(), &Config::default());
        (service, clock)
    }

    fn joined(name: &str, buy_in: Decimal, final_amount: Option<Decimal>) -> NewPlayer {
        NewPlayer {
            name: name.to_string(),
            buy_in_amount: buy_in,
            final_amount,
            payment_handle: Some(PaymentHandle::parse(format!("@{name}")).unwrap()),
        }
    }

    fn two_player_session(service: &SessionService) -> SessionId {
        let id = service.create_session().unwrap().id;
        service.add_player(&id, joined("host", dec!(100), Some(dec!(150)))).unwrap();
        service.add_player(&id, joined("bob", dec!(100), Some(dec!(50)))).unwrap();
        id
    }

    #[test]
    fn test_settle_happy_path() {
        let (service, _) = service();
        let id = two_player_session(&service);

        let txs = service.settle(&id, Decimal::ZERO).unwrap();
        assert_eq!(txs.len(), 2);

        let session = service.get_session(&id).unwrap();
        assert_eq!(session.status, SessionStatus::PendingSettlement);
        assert_eq!(session.transactions, txs);
        assert_eq!(session.margin_of_error, Some(Decimal::ZERO));
    }

    #[test]
    fn test_duplicate_player_rejected() {
        let (service, _) = service();
        let id = two_player_session(&service);

        let result = service.add_player(&id, joined("bob", dec!(10), None));
        assert!(matches!(result, Err(Error::DuplicatePlayer(_))));
    }

    #[test]
    fn test_settle_requires_all_submitted() {
        let (service, _) = service();
        let id = two_player_session(&service);
        service.add_player(&id, joined("late", dec!(20), None)).unwrap();

        assert!(matches!(service.settle(&id, Decimal::ZERO), Err(Error::NotAllSubmitted)));

        service.submit_final_amount(&id, "late", dec!(20)).unwrap();
        assert!(service.settle(&id, Decimal::ZERO).is_ok());
    }

    #[test]
    fn test_settle_requires_host_handle() {
        let (service, _) = service();
        let id = service.create_session().unwrap().id;
        let mut host = joined("host", dec!(10), Some(dec!(10)));
        host.payment_handle = None;
        service.add_player(&id, host).unwrap();
        service.add_player(&id, joined("bob", dec!(10), Some(dec!(10)))).unwrap();

        assert!(matches!(service.settle(&id, Decimal::ZERO), Err(Error::HostHandleMissing)));
    }

    #[test]
    fn test_settle_rejects_margin_mismatch() {
        let (service, _) = service();
        let id = service.create_session().unwrap().id;
        service.add_player(&id, joined("a", dec!(100), Some(dec!(90)))).unwrap();
        service.add_player(&id, joined("b", dec!(100), Some(dec!(95)))).unwrap();
        service.add_player(&id, joined("c", dec!(100), Some(dec!(100)))).unwrap();

        let result = service.settle(&id, dec!(15));
        assert!(matches!(result, Err(Error::MarginMismatch { .. })));
        assert!(service.get_session(&id).unwrap().transactions.is_empty());

        let txs = service.settle(&id, dec!(-15)).unwrap();
        assert_eq!(txs.len(), 3);
    }

    #[test]
    fn test_player_update_invalidates_settlement() {
        let (service, _) = service();
        let id = two_player_session(&service);
        service.settle(&id, Decimal::ZERO).unwrap();

        let update = PlayerUpdate {
            final_amount: Some(dec!(60)),
            ..Default::default()
        };
        service.update_player(&id, 1, update.clone()).unwrap();

        let session = service.get_session(&id).unwrap();
        assert_eq!(session.status, SessionStatus::Active);
        assert!(session.transactions.is_empty());

        assert!(matches!(
            service.update_player(&id, 9, update),
            Err(Error::InvalidPlayerIndex(9))
        ));
    }

    #[test]
    fn test_resolved_transactions_and_links() {
        let (service, _) = service();
        let id = two_player_session(&service);
        assert!(matches!(service.resolved_transactions(&id), Err(Error::NotSettled)));

        let txs = service.settle(&id, Decimal::ZERO).unwrap();
        let resolved = service.resolved_transactions(&id).unwrap();

        // bob's request resolves to bob -> host; host's own payout resolves to host -> host
        assert_eq!(resolved[0].from.as_str(), "@bob");
        assert_eq!(resolved[0].to.as_str(), "@host");

        let (resolved_request, links) = service.payment_links(&id, &txs[0]).unwrap();
        assert_eq!(resolved_request, resolved[0]);
        assert!(links.is_request);
        assert!(links.web_link.starts_with("https://venmo.com/charge/bob"));

        assert!(service.payment_links(&id, &txs[1]).is_err());
    }

    #[test]
    fn test_complete_exports_rows() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let sink = Arc::new(RecordingSink::default());
        let service = SessionService::new(Arc::new(MemoryStore::new()), clock, &Config::default())
            .with_export(sink.clone());
        let id = two_player_session(&service);
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();

        assert!(matches!(service.complete(&id, date), Err(Error::NotSettled)));

        service.settle(&id, Decimal::ZERO).unwrap();
        let session = service.complete(&id, date).unwrap();
        assert_eq!(session.status, SessionStatus::Settled);

        let events = sink.events.lock();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].1[1].name, "bob");
        assert_eq!(events[0].1[1].net(), dec!(-50));
        drop(events);

        assert!(matches!(service.settle(&id, Decimal::ZERO), Err(Error::AlreadySettled)));
    }

    #[test]
    fn test_expired_sessions_are_swept() {
        let (service, clock) = service();
        let old = service.create_session().unwrap().id;
        clock.advance(Duration::hours(20));
        let fresh = service.create_session().unwrap().id;

        clock.advance(Duration::hours(5));
        assert!(matches!(service.get_session(&old), Err(Error::SessionNotFound(_))));
        assert_eq!(service.sweep_expired().unwrap(), 1);
        assert!(service.get_session(&fresh).is_ok());
    }

    #[test]
    fn test_oversized_amounts_never_reach_settlement() {
        let (service, _) = service();
        let id = service.create_session().unwrap().id;

        let result = service.add_player(&id, joined("a", Decimal::ZERO, Some(Decimal::MAX)));
        assert!(matches!(result, Err(Error::InvalidRecord(_))));
        assert!(service.list_players(&id).unwrap().is_empty());

        service.add_player(&id, joined("a", dec!(10), Some(dec!(10)))).unwrap();
        service.add_player(&id, joined("b", dec!(10), Some(dec!(10)))).unwrap();

        let update = PlayerUpdate {
            final_amount: Some(Decimal::MAX),
            ..Default::default()
        };
        assert!(matches!(
            service.update_player(&id, 1, update),
            Err(Error::InvalidRecord(_))
        ));
        assert_eq!(service.list_players(&id).unwrap()[1].final_amount, Some(dec!(10)));

        assert!(matches!(
            service.settle(&id, Decimal::MIN),
            Err(Error::InvalidRecord(_))
        ));
        assert!(service.settle(&id, Decimal::ZERO).is_ok());
    }

    #[test]
    fn test_unknown_ids_leave_no_lock_entries() {
        let (service, clock) = service();

        for _ in 0..100 {
            let unknown = SessionId::generate();
            let result = service.add_player(&unknown, joined("a", dec!(1), None));
            assert!(matches!(result, Err(Error::SessionNotFound(_))));
            assert!(service.settle(&unknown, Decimal::ZERO).is_err());
        }
        assert_eq!(service.locks.len(), 0);

        let id = two_player_session(&service);
        assert_eq!(service.locks.len(), 1);

        clock.advance(Duration::hours(25));
        assert!(service.add_player(&id, joined("late", dec!(1), None)).is_err());
        assert_eq!(service.sweep_expired().unwrap(), 1);
        assert_eq!(service.locks.len(), 0);
    }

    #[test]
    fn test_complete_does_not_export_unsaved_status() {
        let sink = Arc::new(RecordingSink::default());
        let service = SessionService::new(
            Arc::new(NoSettledStore::default()),
            Arc::new(ManualClock::new(Utc::now())),
            &Config::default(),
        )
        .with_export(sink.clone());
        let id = two_player_session(&service);
        service.settle(&id, Decimal::ZERO).unwrap();

        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert!(matches!(service.complete(&id, date), Err(Error::Io(_))));
        assert!(sink.events.lock().is_empty());
        assert_eq!(
            service.get_session(&id).unwrap().status,
            SessionStatus::PendingSettlement
        );
    }

    #[test]
    fn test_failed_export_reopens_session() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let service = SessionService::new(Arc::new(MemoryStore::new()), clock, &Config::default())
            .with_export(Arc::new(FailingSink));
        let id = two_player_session(&service);
        service.settle(&id, Decimal::ZERO).unwrap();

        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert!(matches!(service.complete(&id, date), Err(Error::Export(_))));

        let session = service.get_session(&id).unwrap();
        assert_eq!(session.status, SessionStatus::PendingSettlement);
        assert_eq!(session.transactions.len(), 2);

        // still retryable
        assert!(matches!(service.complete(&id, date), Err(Error::Export(_))));
    }
}
