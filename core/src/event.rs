//! Events emitted by the engine each tick.
//!
//! The tick loop returns them to the caller and appends each one to the
//! `event_log` table. Variants are appended over time, never reordered.

use crate::types::{AccountId, Millis, RunId, Tick};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerEvent {
    // ── Reconciliation ─────────────────────────────
    /// No live identity yet; the live value was reset by command.
    LiveIdentityReset {
        account: AccountId,
    },
    /// First observation of a privileged account.
    SyncSeeded {
        account: AccountId,
        balance: i64,
    },
    /// Standard account: live value reverted to the durable balance.
    LiveOverridden {
        account: AccountId,
        live:    i64,
        durable: i64,
    },
    /// Privileged account: durable change copied to the live board.
    DurablePushed {
        account: AccountId,
        from:    i64,
        to:      i64,
    },
    /// Privileged account: live change copied to durable storage.
    LivePulled {
        account: AccountId,
        from:    i64,
        to:      i64,
    },
    ReconcileFailed {
        account: AccountId,
        reason:  String,
    },

    // ── Ledger ─────────────────────────────────────
    AnomalyFlagged {
        account:  AccountId,
        item_id:  String,
        price:    f64,
        notified: usize,
    },
    LogsPurged {
        removed:   usize,
        remaining: usize,
        at:        Millis,
    },
}

impl LedgerEvent {
    /// Stable name for the `event_type` column.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::LiveIdentityReset { .. } => "live_identity_reset",
            Self::SyncSeeded { .. }        => "sync_seeded",
            Self::LiveOverridden { .. }    => "live_overridden",
            Self::DurablePushed { .. }     => "durable_pushed",
            Self::LivePulled { .. }        => "live_pulled",
            Self::ReconcileFailed { .. }   => "reconcile_failed",
            Self::AnomalyFlagged { .. }    => "anomaly_flagged",
            Self::LogsPurged { .. }        => "logs_purged",
        }
    }
}

/// The event log entry as persisted to SQLite.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventLogEntry {
    pub id:         Option<i64>,
    pub run_id:     RunId,
    pub tick:       Tick,
    pub component:  String,
    pub event_type: String,
    pub payload:    String, // JSON-serialized LedgerEvent
    pub created_at: Millis,
}
