//! Shared primitive types used across the ledger.

/// A scheduler tick. The host drives one tick per server update.
pub type Tick = u64;

/// Stable account identity (the player name).
pub type AccountId = String;

/// Milliseconds since the Unix epoch, as stamped on ledger records.
pub type Millis = i64;

/// The canonical run identifier used to partition the event log.
pub type RunId = String;
