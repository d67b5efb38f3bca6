#![allow(dead_code)]

use coin_ledger_core::{
    clock::ManualClock,
    config::GlobalConfig,
    engine::LedgerEngine,
    live_board::Scoreboard,
    session::LocalSessions,
    store::AttributeStore,
};
use std::rc::Rc;

/// 2026-10-17T12:00:00Z
pub const START_MS: i64 = 1_792_238_400_000;
pub const DAY_MS: i64 = 24 * 60 * 60 * 1000;

pub struct Harness {
    pub engine:   LedgerEngine,
    pub board:    Rc<Scoreboard>,
    pub sessions: Rc<LocalSessions>,
    pub clock:    Rc<ManualClock>,
}

impl Harness {
    /// Connect `name` with an established live-board row.
    pub fn join(&self, name: &str) {
        self.sessions.connect(name);
        self.board.register(name);
    }

    pub fn join_admin(&self, name: &str) {
        self.join(name);
        self.sessions.add_tag(name, "admin");
    }

    pub fn tick(&mut self) {
        self.engine.run_ticks(1).expect("tick");
    }
}

pub fn store() -> Rc<AttributeStore> {
    let store = AttributeStore::in_memory().expect("in-memory store");
    store.migrate().expect("migration");
    Rc::new(store)
}

pub fn build(run_id: &str) -> Harness {
    build_with(run_id, GlobalConfig::default_test())
}

pub fn build_with(run_id: &str, config: GlobalConfig) -> Harness {
    let board = Rc::new(Scoreboard::new(&config.sync.objective_id));
    let sessions = Rc::new(LocalSessions::new());
    let clock = Rc::new(ManualClock::new(START_MS));
    let engine = LedgerEngine::new(
        run_id.to_string(),
        config,
        store(),
        board.clone(),
        sessions.clone(),
        clock.clone(),
    );
    Harness { engine, board, sessions, clock }
}
