//! Typed key/value façade over an owning object.
//!
//! `AttributeOwner` is the capability every owner kind offers; the world and
//! each account get their own adapter over the shared `AttributeStore`.

use super::{byte_size, AttributeStore, OwnerKind, StoredValue};
use crate::error::{LedgerError, LedgerResult};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::rc::Rc;

pub trait AttributeOwner {
    /// Short label used in log lines ("world", "account:Steve").
    fn label(&self) -> String;

    fn read_raw(&self, key: &str) -> LedgerResult<Option<StoredValue>>;
    fn write_raw(&self, key: &str, value: &StoredValue) -> LedgerResult<()>;
    fn remove(&self, key: &str) -> LedgerResult<()>;
    fn list_keys(&self) -> LedgerResult<Vec<String>>;
    fn total_byte_size(&self) -> LedgerResult<usize>;

    /// Store `value`, encoding arrays and objects as JSON text.
    fn try_set(&self, key: &str, value: &Value) -> LedgerResult<()> {
        validate_key(key)?;
        let stored = match value {
            Value::Null => {
                return Err(LedgerError::MissingValue { key: key.to_string() });
            }
            Value::String(s) => StoredValue::String(s.clone()),
            Value::Number(n) => StoredValue::Number(n.to_string()),
            Value::Bool(b) => StoredValue::Boolean(*b),
            structured => StoredValue::Json(serde_json::to_string(structured)?),
        };
        self.write_raw(key, &stored)
    }

    /// Like `try_set`, but failures are logged and reported as `false`.
    fn set(&self, key: &str, value: &Value) -> bool {
        match self.try_set(key, value) {
            Ok(()) => true,
            Err(e) => {
                log::error!("{}: set '{key}' failed: {e}", self.label());
                false
            }
        }
    }

    /// Read `key`, decoding structured values. An encoding that no longer
    /// parses is returned as the raw string.
    fn try_get(&self, key: &str) -> LedgerResult<Option<Value>> {
        validate_key(key)?;
        let Some(stored) = self.read_raw(key)? else {
            return Ok(None);
        };
        let value = match stored {
            StoredValue::String(s) => Value::String(s),
            StoredValue::Boolean(b) => Value::Bool(b),
            StoredValue::Number(text) => serde_json::from_str::<serde_json::Number>(&text)
                .map(Value::Number)
                .unwrap_or(Value::String(text)),
            StoredValue::Json(text) => serde_json::from_str(&text).unwrap_or(Value::String(text)),
        };
        Ok(Some(value))
    }

    /// Like `try_get`, but read failures are logged and treated as unset.
    fn get(&self, key: &str) -> Option<Value> {
        self.try_get(key).unwrap_or_else(|e| {
            log::error!("{}: get '{key}' failed: {e}", self.label());
            None
        })
    }

    fn has_key(&self, key: &str) -> LedgerResult<bool> {
        validate_key(key)?;
        Ok(self.list_keys()?.iter().any(|k| k == key))
    }

    fn set_as<T: Serialize>(&self, key: &str, value: &T) -> LedgerResult<()>
    where
        Self: Sized,
    {
        self.try_set(key, &serde_json::to_value(value)?)
    }

    fn get_as<T: DeserializeOwned>(&self, key: &str) -> LedgerResult<Option<T>>
    where
        Self: Sized,
    {
        match self.try_get(key)? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }
}

fn validate_key(key: &str) -> LedgerResult<()> {
    if key.trim().is_empty() {
        return Err(LedgerError::InvalidKey { key: key.to_string() });
    }
    Ok(())
}

fn decode_row(key: &str, kind: &str, text: String) -> LedgerResult<StoredValue> {
    StoredValue::from_row(kind, text).ok_or_else(|| LedgerError::CorruptValue {
        key:  key.to_string(),
        kind: kind.to_string(),
    })
}

fn owner_byte_size(store: &AttributeStore, owner: OwnerKind, owner_id: &str) -> LedgerResult<usize> {
    Ok(store
        .attribute_rows(owner, owner_id)?
        .iter()
        .map(|row| byte_size(&row.key) + byte_size(&row.value))
        .sum())
}

// ── World owner ────────────────────────────────────────────────────

/// Attributes scoped to the whole server (ledger blob, global config).
#[derive(Clone)]
pub struct WorldAttributes {
    store: Rc<AttributeStore>,
}

impl WorldAttributes {
    pub fn new(store: Rc<AttributeStore>) -> Self {
        Self { store }
    }
}

impl AttributeOwner for WorldAttributes {
    fn label(&self) -> String {
        "world".into()
    }

    fn read_raw(&self, key: &str) -> LedgerResult<Option<StoredValue>> {
        self.store
            .read_attribute(OwnerKind::World, "", key)?
            .map(|row| decode_row(&row.key, &row.kind, row.value))
            .transpose()
    }

    fn write_raw(&self, key: &str, value: &StoredValue) -> LedgerResult<()> {
        self.store.write_attribute(OwnerKind::World, "", key, value)
    }

    fn remove(&self, key: &str) -> LedgerResult<()> {
        validate_key(key)?;
        self.store.delete_attribute(OwnerKind::World, "", key)
    }

    fn list_keys(&self) -> LedgerResult<Vec<String>> {
        Ok(self
            .store
            .attribute_rows(OwnerKind::World, "")?
            .into_iter()
            .map(|row| row.key)
            .collect())
    }

    fn total_byte_size(&self) -> LedgerResult<usize> {
        owner_byte_size(&self.store, OwnerKind::World, "")
    }
}

// ── Account owner ──────────────────────────────────────────────────

/// Attributes attached to one account (balance, bonus marker).
#[derive(Clone)]
pub struct AccountAttributes {
    store:   Rc<AttributeStore>,
    account: String,
}

impl AccountAttributes {
    pub fn new(store: Rc<AttributeStore>, account: &str) -> Self {
        Self {
            store,
            account: account.to_string(),
        }
    }

    pub fn account(&self) -> &str {
        &self.account
    }
}

impl AttributeOwner for AccountAttributes {
    fn label(&self) -> String {
        format!("account:{}", self.account)
    }

    fn read_raw(&self, key: &str) -> LedgerResult<Option<StoredValue>> {
        self.store
            .read_attribute(OwnerKind::Account, &self.account, key)?
            .map(|row| decode_row(&row.key, &row.kind, row.value))
            .transpose()
    }

    fn write_raw(&self, key: &str, value: &StoredValue) -> LedgerResult<()> {
        self.store
            .write_attribute(OwnerKind::Account, &self.account, key, value)
    }

    fn remove(&self, key: &str) -> LedgerResult<()> {
        validate_key(key)?;
        self.store
            .delete_attribute(OwnerKind::Account, &self.account, key)
    }

    fn list_keys(&self) -> LedgerResult<Vec<String>> {
        Ok(self
            .store
            .attribute_rows(OwnerKind::Account, &self.account)?
            .into_iter()
            .map(|row| row.key)
            .collect())
    }

    fn total_byte_size(&self) -> LedgerResult<usize> {
        owner_byte_size(&self.store, OwnerKind::Account, &self.account)
    }
}
