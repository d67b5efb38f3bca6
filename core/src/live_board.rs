//! The live board: a second, externally writable numeric registry.
//!
//! The host runtime owns it; anything outside this crate may change a score
//! at any time. `Scoreboard` is the in-process implementation used by the
//! runner and the tests.

use crate::error::{LedgerError, LedgerResult};
use std::cell::RefCell;
use std::collections::HashMap;

/// Handle to an account's row on the board, once the runtime has assigned one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BoardIdentity(pub u64);

pub trait LiveBoard {
    /// Row for `account`, if the runtime has established one.
    fn identity_of(&self, account: &str) -> Option<BoardIdentity>;

    /// Current score; an identity with no score reads as `None`.
    fn score(&self, identity: BoardIdentity) -> LedgerResult<Option<i64>>;

    fn set_score(&self, identity: BoardIdentity, value: i64) -> LedgerResult<()>;

    /// Command-style write by account name: `scoreboard players set <name> <obj> <value>`.
    fn run_set_command(&self, account: &str, value: i64) -> LedgerResult<()>;
}

#[derive(Debug, Default)]
struct BoardState {
    next_identity: u64,
    identities:    HashMap<String, BoardIdentity>,
    scores:        HashMap<BoardIdentity, i64>,
    /// Identities whose writes fail, to model a rejecting runtime.
    locked:        Vec<BoardIdentity>,
}

#[derive(Debug, Default)]
pub struct Scoreboard {
    objective_id: String,
    state:        RefCell<BoardState>,
}

impl Scoreboard {
    pub fn new(objective_id: &str) -> Self {
        Self {
            objective_id: objective_id.to_string(),
            state:        RefCell::new(BoardState::default()),
        }
    }

    pub fn objective_id(&self) -> &str {
        &self.objective_id
    }

    /// Assign a row to `account` without touching its score.
    pub fn register(&self, account: &str) -> BoardIdentity {
        let mut state = self.state.borrow_mut();
        if let Some(id) = state.identities.get(account) {
            return *id;
        }
        state.next_identity += 1;
        let id = BoardIdentity(state.next_identity);
        state.identities.insert(account.to_string(), id);
        id
    }

    /// External write by account name, as another runtime mechanism would do it.
    /// Registers the row if needed.
    pub fn external_set(&self, account: &str, value: i64) {
        let id = self.register(account);
        self.state.borrow_mut().scores.insert(id, value);
    }

    /// Read by account name; `None` if the account has no row or no score.
    pub fn score_of(&self, account: &str) -> Option<i64> {
        let state = self.state.borrow();
        state
            .identities
            .get(account)
            .and_then(|id| state.scores.get(id).copied())
    }

    /// Make every write to `account`'s row fail until unlocked.
    pub fn lock(&self, account: &str) {
        let id = self.register(account);
        self.state.borrow_mut().locked.push(id);
    }

    pub fn unlock(&self, account: &str) {
        let id = self.register(account);
        self.state.borrow_mut().locked.retain(|l| *l != id);
    }

    fn check_writable(&self, account: &str, id: BoardIdentity) -> LedgerResult<()> {
        if self.state.borrow().locked.contains(&id) {
            return Err(LedgerError::LiveBoard {
                account: account.to_string(),
                reason:  format!("objective '{}' row is locked", self.objective_id),
            });
        }
        Ok(())
    }
}

impl LiveBoard for Scoreboard {
    fn identity_of(&self, account: &str) -> Option<BoardIdentity> {
        self.state.borrow().identities.get(account).copied()
    }

    fn score(&self, identity: BoardIdentity) -> LedgerResult<Option<i64>> {
        Ok(self.state.borrow().scores.get(&identity).copied())
    }

    fn set_score(&self, identity: BoardIdentity, value: i64) -> LedgerResult<()> {
        self.check_writable(&format!("#{}", identity.0), identity)?;
        self.state.borrow_mut().scores.insert(identity, value);
        Ok(())
    }

    fn run_set_command(&self, account: &str, value: i64) -> LedgerResult<()> {
        let id = self.register(account);
        self.check_writable(account, id)?;
        self.state.borrow_mut().scores.insert(id, value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_command_establishes_identity() {
        let board = Scoreboard::new("col");
        assert!(board.identity_of("Alex").is_none());
        board.run_set_command("Alex", 0).unwrap();
        let id = board.identity_of("Alex").expect("identity assigned");
        assert_eq!(board.score(id).unwrap(), Some(0));
    }

    #[test]
    fn locked_rows_reject_writes() {
        let board = Scoreboard::new("col");
        board.external_set("Alex", 5);
        board.lock("Alex");
        let id = board.identity_of("Alex").unwrap();
        assert!(board.set_score(id, 9).is_err());
        board.unlock("Alex");
        board.set_score(id, 9).unwrap();
        assert_eq!(board.score_of("Alex"), Some(9));
    }
}
