//! Transaction ledger: an append-only log of economic events kept as a
//! single JSON array on the world owner.
//!
//! Load → append → save is not guarded against interleaved writers. Every
//! caller completes within one tick, so two `record` calls never overlap.

use crate::{
    clock::WallClock,
    config::{LedgerConfig, SyncConfig},
    error::{LedgerError, LedgerResult},
    event::LedgerEvent,
    session::SessionRegistry,
    store::{AttributeOwner, WorldAttributes},
    types::{AccountId, Millis},
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::rc::Rc;

/// World attribute holding the whole log.
pub const TRANSACTION_LOGS_KEY: &str = "transaction_logs";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Buy,
    Sell,
    Transfer,
    Gift,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Buy      => "buy",
            Self::Sell     => "sell",
            Self::Transfer => "transfer",
            Self::Gift     => "gift",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "buy"      => Some(Self::Buy),
            "sell"     => Some(Self::Sell),
            "transfer" => Some(Self::Transfer),
            "gift"     => Some(Self::Gift),
            _ => None,
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    pub account_id: AccountId,
    pub item_id:    String,
    pub price:      f64,
    pub kind:       TransactionKind,
    pub timestamp:  Millis,
}

/// Conjunctive history filter. `None` fields impose no constraint.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoryFilter {
    pub account_id: Option<AccountId>,
    pub kind:       Option<TransactionKind>,
    pub min_price:  Option<f64>,
    pub max_price:  Option<f64>,
    pub start_time: Option<Millis>,
    pub end_time:   Option<Millis>,
}

impl HistoryFilter {
    pub fn matches(&self, tx: &TransactionRecord) -> bool {
        self.account_id.as_ref().map_or(true, |id| &tx.account_id == id)
            && self.kind.map_or(true, |k| tx.kind == k)
            && self.min_price.map_or(true, |min| tx.price >= min)
            && self.max_price.map_or(true, |max| tx.price <= max)
            && self.start_time.map_or(true, |start| tx.timestamp >= start)
            && self.end_time.map_or(true, |end| tx.timestamp <= end)
    }
}

pub struct LedgerSubsystem {
    config:   LedgerConfig,
    sync:     SyncConfig,
    world:    WorldAttributes,
    sessions: Rc<dyn SessionRegistry>,
    clock:    Rc<dyn WallClock>,
    /// Anomalies raised since the last `drain_events`.
    pending:  Vec<LedgerEvent>,
}

impl LedgerSubsystem {
    pub fn new(
        config: LedgerConfig,
        sync: SyncConfig,
        world: WorldAttributes,
        sessions: Rc<dyn SessionRegistry>,
        clock: Rc<dyn WallClock>,
    ) -> Self {
        Self {
            config,
            sync,
            world,
            sessions,
            clock,
            pending: Vec::new(),
        }
    }

    /// Decode the stored log. A missing blob is an empty log; one that no
    /// longer decodes is an error, so nothing gets saved over it.
    fn load(&self) -> LedgerResult<Vec<TransactionRecord>> {
        Ok(self
            .world
            .get_as::<Vec<TransactionRecord>>(TRANSACTION_LOGS_KEY)?
            .unwrap_or_default())
    }

    /// `load` for read-only callers: an undecodable log reads as empty.
    fn load_or_empty(&self) -> Vec<TransactionRecord> {
        self.load().unwrap_or_else(|e| {
            log::error!("transaction log is not decodable: {e}");
            Vec::new()
        })
    }

    fn save(&self, logs: &[TransactionRecord]) -> LedgerResult<()> {
        self.world.set_as(TRANSACTION_LOGS_KEY, &logs).map_err(|e| {
            log::error!("saving transaction log ({} records) failed: {e}", logs.len());
            e
        })
    }

    /// Append a record stamped with the current time, then check it for anomalies.
    ///
    /// Non-finite prices are rejected, as is appending to a stored log that
    /// cannot be decoded. The stored log is unchanged in both cases.
    pub fn record(
        &mut self,
        account_id: &str,
        item_id: &str,
        price: f64,
        kind: TransactionKind,
    ) -> LedgerResult<TransactionRecord> {
        if !price.is_finite() {
            log::warn!("{account_id}: rejected {kind} of {item_id} at non-finite price {price}");
            return Err(LedgerError::InvalidPrice { price });
        }
        let mut logs = self.load().map_err(|e| {
            log::error!("{account_id}: not recording {item_id}, stored log is unreadable: {e}");
            e
        })?;
        let tx = TransactionRecord {
            account_id: account_id.to_string(),
            item_id:    item_id.to_string(),
            price,
            kind,
            timestamp:  self.clock.now_millis(),
        };
        logs.push(tx.clone());
        self.save(&logs)?;
        self.check_anomaly(&tx);
        Ok(tx)
    }

    fn check_anomaly(&mut self, tx: &TransactionRecord) {
        if tx.price < self.config.anomaly_threshold {
            return;
        }
        let message = format!(
            "[alert] suspicious transaction: {} {} {} for {} coins",
            tx.account_id, tx.kind, tx.item_id, tx.price
        );
        let privileged: Vec<_> = self
            .sessions
            .connected()
            .into_iter()
            .filter(|s| s.has_tag(&self.sync.privileged_tag))
            .collect();
        for admin in &privileged {
            self.sessions.send_message(&admin.name, &message);
        }
        log::warn!("{message} (notified {})", privileged.len());
        self.pending.push(LedgerEvent::AnomalyFlagged {
            account:  tx.account_id.clone(),
            item_id:  tx.item_id.clone(),
            price:    tx.price,
            notified: privileged.len(),
        });
    }

    /// Drop records older than the retention window. Writes only when
    /// something was removed. Returns the number of records removed.
    /// An undecodable log is left alone.
    pub fn purge_expired(&self) -> usize {
        let logs = match self.load() {
            Ok(logs) => logs,
            Err(e) => {
                log::error!("skipping purge, transaction log is not decodable: {e}");
                return 0;
            }
        };
        let now = self.clock.now_millis();
        let before = logs.len();
        let kept: Vec<TransactionRecord> = logs
            .into_iter()
            .filter(|tx| now - tx.timestamp <= self.config.retention_ms)
            .collect();
        let removed = before - kept.len();
        if removed > 0 && self.save(&kept).is_err() {
            return 0;
        }
        removed
    }

    /// Scheduled purge; emits an event only when records were removed.
    pub fn purge_pass(&self) -> Vec<LedgerEvent> {
        let removed = self.purge_expired();
        if removed == 0 {
            return Vec::new();
        }
        let remaining = self.load_or_empty().len();
        log::info!("purged {removed} expired transaction records ({remaining} remain)");
        vec![LedgerEvent::LogsPurged {
            removed,
            remaining,
            at: self.clock.now_millis(),
        }]
    }

    pub fn history_for(&self, account_id: &str) -> Vec<TransactionRecord> {
        self.load_or_empty()
            .into_iter()
            .filter(|tx| tx.account_id == account_id)
            .collect()
    }

    pub fn all_history(&self) -> Vec<TransactionRecord> {
        self.load_or_empty()
    }

    pub fn filtered_history(&self, criteria: &HistoryFilter) -> Vec<TransactionRecord> {
        self.load_or_empty()
            .into_iter()
            .filter(|tx| criteria.matches(tx))
            .collect()
    }

    /// Anomaly events raised since the previous call.
    pub fn drain_events(&mut self) -> Vec<LedgerEvent> {
        std::mem::take(&mut self.pending)
    }

    pub fn retention_ms(&self) -> Millis {
        self.config.retention_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx(account: &str, kind: TransactionKind, price: f64, ts: Millis) -> TransactionRecord {
        TransactionRecord {
            account_id: account.into(),
            item_id:    "minecraft:apple".into(),
            price,
            kind,
            timestamp:  ts,
        }
    }

    #[test]
    fn empty_filter_matches_everything() {
        assert!(HistoryFilter::default().matches(&tx("a", TransactionKind::Gift, 0.0, 0)));
    }

    #[test]
    fn price_and_time_bounds_are_inclusive() {
        let filter = HistoryFilter {
            min_price: Some(50.0),
            max_price: Some(100.0),
            start_time: Some(10),
            end_time: Some(20),
            ..Default::default()
        };
        assert!(filter.matches(&tx("a", TransactionKind::Buy, 50.0, 10)));
        assert!(filter.matches(&tx("a", TransactionKind::Buy, 100.0, 20)));
        assert!(!filter.matches(&tx("a", TransactionKind::Buy, 49.9, 15)));
        assert!(!filter.matches(&tx("a", TransactionKind::Buy, 75.0, 21)));
    }

    #[test]
    fn record_serializes_with_camel_case_fields() {
        let json = serde_json::to_value(tx("Steve", TransactionKind::Sell, 12.5, 7)).unwrap();
        assert_eq!(json["accountId"], "Steve");
        assert_eq!(json["itemId"], "minecraft:apple");
        assert_eq!(json["kind"], "sell");
    }

    #[test]
    fn kind_parse_is_case_insensitive() {
        assert_eq!(TransactionKind::parse("BUY"), Some(TransactionKind::Buy));
        assert_eq!(TransactionKind::parse("loan"), None);
    }
}
