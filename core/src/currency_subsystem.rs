//! Currency subsystem: authoritative balances and the per-tick sync
//! against the live board.
//!
//! Design:
//!   - The durable store is the source of truth for every balance mutator.
//!   - The live board is only written by the reconciliation pass.
//!   - Standard accounts: one-way trust, durable → live, every pass.
//!   - Privileged accounts: two-way sync against the last agreed value.
//!     When both sides moved in the same tick, durable wins.
//!   - A failing account is logged and skipped; the pass continues.

use crate::{
    clock::WallClock,
    config::{CurrencyConfig, SyncConfig},
    error::{LedgerError, LedgerResult},
    event::LedgerEvent,
    live_board::LiveBoard,
    session::{Session, SessionRegistry},
    store::{AccountAttributes, AttributeOwner, AttributeStore},
    types::AccountId,
};
use serde_json::Value;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Account attribute holding the durable balance.
pub const CURRENCY_KEY: &str = "player_currency";
/// Account attribute holding the last daily-bonus date (`YYYY-MM-DD`, UTC).
pub const BONUS_DATE_KEY: &str = "last_bonus_date";

/// Why a transfer did not happen. No balance was changed in any case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferRejection {
    SenderNotConnected,
    ReceiverNotConnected,
    NonPositiveAmount,
    InsufficientFunds { balance: i64 },
    WriteFailed,
}

pub struct CurrencySubsystem {
    currency: CurrencyConfig,
    sync:     SyncConfig,
    store:    Rc<AttributeStore>,
    board:    Rc<dyn LiveBoard>,
    sessions: Rc<dyn SessionRegistry>,
    clock:    Rc<dyn WallClock>,
    /// Last value both stores agreed on, per account. Process lifetime only.
    last_synced: HashMap<AccountId, i64>,
}

impl CurrencySubsystem {
    pub fn new(
        currency: CurrencyConfig,
        sync: SyncConfig,
        store: Rc<AttributeStore>,
        board: Rc<dyn LiveBoard>,
        sessions: Rc<dyn SessionRegistry>,
        clock: Rc<dyn WallClock>,
    ) -> Self {
        Self {
            currency,
            sync,
            store,
            board,
            sessions,
            clock,
            last_synced: HashMap::new(),
        }
    }

    pub fn starting_balance(&self) -> i64 {
        self.currency.starting_balance
    }

    fn attributes(&self, account: &str) -> AccountAttributes {
        AccountAttributes::new(self.store.clone(), account)
    }

    // ── Balances ───────────────────────────────────────────────────

    /// Durable balance, creating it at the starting balance on first read.
    pub fn try_get_balance(&self, account: &str) -> LedgerResult<i64> {
        let attrs = self.attributes(account);
        let stored = attrs.try_get(CURRENCY_KEY)?;
        if let Some(balance) = stored.as_ref().and_then(Value::as_i64) {
            return Ok(balance);
        }
        if let Some(other) = stored {
            log::warn!("{account}: stored balance {other} is not an integer, resetting");
        }
        self.init_balance(&attrs)
    }

    /// Stored balance without creating one. A non-integer value reads as absent.
    fn stored_balance(&self, account: &str) -> LedgerResult<Option<i64>> {
        let stored = self.attributes(account).try_get(CURRENCY_KEY)?;
        Ok(stored.as_ref().and_then(Value::as_i64))
    }

    fn init_balance(&self, attrs: &AccountAttributes) -> LedgerResult<i64> {
        let start = self.currency.starting_balance;
        attrs.try_set(CURRENCY_KEY, &Value::from(start))?;
        Ok(start)
    }

    /// Durable balance. Store failures are logged and read as the starting balance.
    pub fn get_balance(&self, account: &str) -> i64 {
        self.try_get_balance(account).unwrap_or_else(|e| {
            log::error!("{account}: balance read failed: {e}");
            self.currency.starting_balance
        })
    }

    /// Overwrite the durable balance. The live board catches up on the next pass.
    pub fn set_balance(&self, account: &str, amount: i64) -> bool {
        self.attributes(account).set(CURRENCY_KEY, &Value::from(amount))
    }

    /// Returns `false` without writing unless `amount` is positive.
    pub fn deposit(&self, account: &str, amount: i64) -> bool {
        if amount <= 0 {
            log::warn!("{account}: rejected deposit of {amount}");
            return false;
        }
        let current = self.get_balance(account);
        self.set_balance(account, current.saturating_add(amount))
    }

    /// Returns `false` without writing unless `amount` is positive and
    /// covered by the balance.
    pub fn withdraw(&self, account: &str, amount: i64) -> bool {
        if amount <= 0 {
            log::warn!("{account}: rejected withdrawal of {amount}");
            return false;
        }
        let current = self.get_balance(account);
        match current.checked_sub(amount) {
            Some(remaining) if remaining >= 0 => self.set_balance(account, remaining),
            _ => false,
        }
    }

    /// Move `amount` between two connected accounts.
    ///
    /// Withdraw and deposit are two separate writes. Nothing yields between
    /// them, but a crash in between loses the amount.
    pub fn try_transfer(&self, from: &str, to: &str, amount: i64) -> Result<(), TransferRejection> {
        if self.sessions.find(from).is_none() {
            return Err(TransferRejection::SenderNotConnected);
        }
        if self.sessions.find(to).is_none() {
            return Err(TransferRejection::ReceiverNotConnected);
        }
        if amount <= 0 {
            return Err(TransferRejection::NonPositiveAmount);
        }
        let balance = self.get_balance(from);
        if balance < amount {
            return Err(TransferRejection::InsufficientFunds { balance });
        }
        if !self.withdraw(from, amount) {
            return Err(TransferRejection::WriteFailed);
        }
        if !self.deposit(to, amount) {
            log::error!("transfer {from} -> {to} of {amount}: deposit failed after withdraw");
            return Err(TransferRejection::WriteFailed);
        }
        log::info!("transfer {from} -> {to}: {amount}");
        Ok(())
    }

    pub fn transfer(&self, from: &str, to: &str, amount: i64) -> bool {
        self.try_transfer(from, to, amount).is_ok()
    }

    /// Grant `bonus` once per UTC calendar day.
    pub fn claim_daily_bonus(&self, account: &str, bonus: i64) -> bool {
        let attrs = self.attributes(account);
        let today = self.clock.today_utc().format("%Y-%m-%d").to_string();
        if let Some(Value::String(last)) = attrs.get(BONUS_DATE_KEY) {
            if last == today {
                return false;
            }
        }
        if !self.deposit(account, bonus) {
            return false;
        }
        if !attrs.set(BONUS_DATE_KEY, &Value::String(today)) {
            log::error!("{account}: bonus paid but date marker not saved");
        }
        true
    }

    /// Connected accounts ordered by durable balance, highest first.
    pub fn rich_ranking(&self, limit: usize) -> Vec<(AccountId, i64)> {
        let mut ranks: Vec<(AccountId, i64)> = self
            .sessions
            .connected()
            .into_iter()
            .map(|s| {
                let balance = self.get_balance(&s.name);
                (s.name, balance)
            })
            .collect();
        ranks.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranks.truncate(limit);
        ranks
    }

    pub fn is_privileged(&self, session: &Session) -> bool {
        session.has_tag(&self.sync.privileged_tag)
    }

    /// Last agreed value for `account`, if it has been observed this process.
    pub fn last_synced(&self, account: &str) -> Option<i64> {
        self.last_synced.get(account).copied()
    }

    // ── Reconciliation ─────────────────────────────────────────────

    /// One pass over every connected account.
    pub fn reconcile_pass(&mut self) -> Vec<LedgerEvent> {
        let started = Instant::now();
        let mut events = Vec::new();

        for session in self.sessions.connected() {
            match self.reconcile_account(&session) {
                Ok(Some(event)) => events.push(event),
                Ok(None) => {}
                Err(e) => {
                    log::error!("{}: reconciliation failed: {e}", session.name);
                    events.push(LedgerEvent::ReconcileFailed {
                        account: session.name.clone(),
                        reason:  e.to_string(),
                    });
                }
            }
        }

        let elapsed = started.elapsed();
        if elapsed > Duration::from_millis(self.sync.slow_pass_warn_ms) {
            log::warn!("reconciliation pass is slow: {elapsed:?}");
        }
        events
    }

    fn reconcile_account(&mut self, session: &Session) -> LedgerResult<Option<LedgerEvent>> {
        let account = session.name.as_str();

        let Some(identity) = self.board.identity_of(account) else {
            log::warn!("{account}: no live identity yet, resetting live value to 0");
            self.board.run_set_command(account, 0)?;
            return Ok(Some(LedgerEvent::LiveIdentityReset {
                account: account.to_string(),
            }));
        };

        // The starting balance stands in for a missing durable value; only
        // the balance mutators create one.
        let durable = self
            .stored_balance(account)?
            .unwrap_or(self.currency.starting_balance);
        let live = self.board.score(identity)?.unwrap_or(0);

        if !self.is_privileged(session) {
            let event = if live != durable {
                self.board.set_score(identity, durable)?;
                log::info!("{account}: live {live} overridden by durable {durable}");
                Some(LedgerEvent::LiveOverridden {
                    account: account.to_string(),
                    live,
                    durable,
                })
            } else {
                None
            };
            self.last_synced.insert(account.to_string(), durable);
            return Ok(event);
        }

        let Some(last) = self.last_synced(account) else {
            if live != durable {
                self.board.set_score(identity, durable)?;
            }
            self.last_synced.insert(account.to_string(), durable);
            log::info!("{account}: sync seeded at {durable}");
            return Ok(Some(LedgerEvent::SyncSeeded {
                account: account.to_string(),
                balance: durable,
            }));
        };

        // Durable is checked first, so it wins when both sides moved.
        let (agreed, event) = if durable != last && durable != live {
            self.board.set_score(identity, durable)?;
            log::info!("{account}: durable change {last} -> {durable} pushed to live");
            (
                durable,
                Some(LedgerEvent::DurablePushed {
                    account: account.to_string(),
                    from:    last,
                    to:      durable,
                }),
            )
        } else if live != last && live != durable {
            self.attributes(account)
                .try_set(CURRENCY_KEY, &Value::from(live))?;
            log::info!("{account}: live change {last} -> {live} pulled to durable");
            (
                live,
                Some(LedgerEvent::LivePulled {
                    account: account.to_string(),
                    from:    last,
                    to:      live,
                }),
            )
        } else {
            (durable, None)
        };

        self.last_synced.insert(account.to_string(), agreed);
        Ok(event)
    }

    /// Resolve an account name to a connected session.
    pub fn session(&self, account: &str) -> LedgerResult<Session> {
        self.sessions
            .find(account)
            .ok_or_else(|| LedgerError::AccountNotConnected {
                account: account.to_string(),
            })
    }
}
