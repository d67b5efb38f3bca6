//! SQLite persistence layer.
//!
//! RULE: Only the store module talks to the database.
//! Components read and write through the attribute owners in
//! `attributes.rs`; they never execute SQL directly.

use crate::{error::LedgerResult, event::EventLogEntry, types::Tick};
use rusqlite::{params, Connection, OptionalExtension};

mod attributes;
mod chunking;

pub use attributes::{AccountAttributes, AttributeOwner, WorldAttributes};
pub use chunking::{byte_size, chunk_by_byte_size, DEFAULT_CHUNK_BYTES};

/// Which kind of object an attribute hangs off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnerKind {
    World,
    Account,
}

impl OwnerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::World   => "world",
            Self::Account => "account",
        }
    }
}

/// Physical encoding of an attribute value.
///
/// Structured values are kept as JSON text and tagged so that plain strings
/// are never mistaken for an encoding on the way back out.
#[derive(Debug, Clone, PartialEq)]
pub enum StoredValue {
    String(String),
    Number(String),
    Boolean(bool),
    Json(String),
}

impl StoredValue {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::String(_)  => "string",
            Self::Number(_)  => "number",
            Self::Boolean(_) => "boolean",
            Self::Json(_)    => "json",
        }
    }

    pub fn text(&self) -> String {
        match self {
            Self::String(s) | Self::Number(s) | Self::Json(s) => s.clone(),
            Self::Boolean(b) => b.to_string(),
        }
    }

    fn from_row(kind: &str, text: String) -> Option<Self> {
        match kind {
            "string"  => Some(Self::String(text)),
            "number"  => Some(Self::Number(text)),
            "boolean" => Some(Self::Boolean(text == "true")),
            "json"    => Some(Self::Json(text)),
            _ => None,
        }
    }
}

/// A raw attribute row: key plus its stored kind and text.
#[derive(Debug, Clone)]
pub struct AttributeRow {
    pub key:   String,
    pub kind:  String,
    pub value: String,
}

pub struct AttributeStore {
    conn: Connection,
    path: Option<String>, // None for :memory:, Some(path) for file
}

impl AttributeStore {
    pub fn open(path: &str) -> LedgerResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        // WAL mode only for real files (shared-memory and :memory: ignore it).
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        Ok(Self {
            conn,
            path: Some(path.to_string()),
        })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> LedgerResult<Self> {
        let conn = Connection::open(":memory:")?;
        Ok(Self { conn, path: None })
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> LedgerResult<()> {
        self.conn
            .execute_batch(include_str!("../../../migrations/001_attributes.sql"))?;
        Ok(())
    }

    // ── Attributes ─────────────────────────────────────────────

    pub fn read_attribute(
        &self,
        owner: OwnerKind,
        owner_id: &str,
        key: &str,
    ) -> LedgerResult<Option<AttributeRow>> {
        let row = self
            .conn
            .query_row(
                "SELECT key, value_kind, value FROM attribute
                 WHERE owner_kind = ?1 AND owner_id = ?2 AND key = ?3",
                params![owner.as_str(), owner_id, key],
                |row| {
                    Ok(AttributeRow {
                        key:   row.get(0)?,
                        kind:  row.get(1)?,
                        value: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    pub fn write_attribute(
        &self,
        owner: OwnerKind,
        owner_id: &str,
        key: &str,
        value: &StoredValue,
    ) -> LedgerResult<()> {
        self.conn.execute(
            "INSERT INTO attribute (owner_kind, owner_id, key, value_kind, value)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT (owner_kind, owner_id, key)
             DO UPDATE SET value_kind = excluded.value_kind, value = excluded.value",
            params![owner.as_str(), owner_id, key, value.kind(), value.text()],
        )?;
        Ok(())
    }

    pub fn delete_attribute(&self, owner: OwnerKind, owner_id: &str, key: &str) -> LedgerResult<()> {
        self.conn.execute(
            "DELETE FROM attribute WHERE owner_kind = ?1 AND owner_id = ?2 AND key = ?3",
            params![owner.as_str(), owner_id, key],
        )?;
        Ok(())
    }

    pub fn attribute_rows(&self, owner: OwnerKind, owner_id: &str) -> LedgerResult<Vec<AttributeRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT key, value_kind, value FROM attribute
             WHERE owner_kind = ?1 AND owner_id = ?2
             ORDER BY key ASC",
        )?;
        let rows = stmt
            .query_map(params![owner.as_str(), owner_id], |row| {
                Ok(AttributeRow {
                    key:   row.get(0)?,
                    kind:  row.get(1)?,
                    value: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // ── Event log ──────────────────────────────────────────────

    pub fn append_event(&self, entry: &EventLogEntry) -> LedgerResult<()> {
        self.conn.execute(
            "INSERT INTO event_log (run_id, tick, component, event_type, payload, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                entry.run_id,
                entry.tick as i64,
                entry.component,
                entry.event_type,
                entry.payload,
                entry.created_at,
            ],
        )?;
        Ok(())
    }

    pub fn events_for_tick(&self, run_id: &str, tick: Tick) -> LedgerResult<Vec<EventLogEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, run_id, tick, component, event_type, payload, created_at
             FROM event_log WHERE run_id = ?1 AND tick = ?2
             ORDER BY id ASC",
        )?;
        let entries = stmt
            .query_map(params![run_id, tick as i64], |row| {
                Ok(EventLogEntry {
                    id:         Some(row.get(0)?),
                    run_id:     row.get(1)?,
                    tick:       row.get::<_, i64>(2)? as u64,
                    component:  row.get(3)?,
                    event_type: row.get(4)?,
                    payload:    row.get(5)?,
                    created_at: row.get(6)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    /// Number of logged events of one type for this run (for tests and summaries).
    pub fn event_count(&self, run_id: &str, event_type: &str) -> LedgerResult<i64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM event_log WHERE run_id = ?1 AND event_type = ?2",
            params![run_id, event_type],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}
