//! The ledger engine wires the components together and drives them.
//!
//! EXECUTION ORDER per tick (fixed):
//!   1. Currency subsystem: reconciliation pass over connected accounts
//!   2. Ledger subsystem:   anomaly events raised since the last tick
//!   3. Ledger subsystem:   retention purge, once every `purge_interval_ms`
//!
//! RULES:
//!   - Everything runs on the caller's thread; a tick runs to completion.
//!   - Only the currency subsystem writes the live board.
//!   - Only the ledger subsystem writes the transaction log.
//!   - Every emitted event is appended to the event log.

use crate::{
    clock::{TickClock, WallClock},
    config::GlobalConfig,
    currency_subsystem::CurrencySubsystem,
    error::LedgerResult,
    event::{EventLogEntry, LedgerEvent},
    ledger_subsystem::{LedgerSubsystem, TransactionKind, TransactionRecord},
    live_board::LiveBoard,
    session::SessionRegistry,
    store::{AttributeStore, WorldAttributes},
    types::{Millis, RunId, Tick},
};
use std::rc::Rc;

pub struct LedgerEngine {
    pub run_id:   RunId,
    pub clock:    TickClock,
    pub config:   GlobalConfig,
    pub store:    Rc<AttributeStore>,
    pub currency: CurrencySubsystem,
    pub ledger:   LedgerSubsystem,
    sessions:     Rc<dyn SessionRegistry>,
    wall:         Rc<dyn WallClock>,
    last_purge_at: Millis,
}

impl LedgerEngine {
    pub fn new(
        run_id: RunId,
        config: GlobalConfig,
        store: Rc<AttributeStore>,
        board: Rc<dyn LiveBoard>,
        sessions: Rc<dyn SessionRegistry>,
        wall: Rc<dyn WallClock>,
    ) -> Self {
        let currency = CurrencySubsystem::new(
            config.currency.clone(),
            config.sync.clone(),
            store.clone(),
            board,
            sessions.clone(),
            wall.clone(),
        );
        let ledger = LedgerSubsystem::new(
            config.ledger.clone(),
            config.sync.clone(),
            WorldAttributes::new(store.clone()),
            sessions.clone(),
            wall.clone(),
        );
        let last_purge_at = wall.now_millis();
        Self {
            clock: TickClock::new(run_id.clone()),
            run_id,
            config,
            store,
            currency,
            ledger,
            sessions,
            wall,
            last_purge_at,
        }
    }

    /// Build an engine whose configuration is read from (or seeded into)
    /// the world store. The store must already be migrated.
    pub fn build(
        run_id: RunId,
        store: Rc<AttributeStore>,
        board: Rc<dyn LiveBoard>,
        sessions: Rc<dyn SessionRegistry>,
        wall: Rc<dyn WallClock>,
    ) -> Self {
        let config = GlobalConfig::load_or_init(&WorldAttributes::new(store.clone()));
        Self::new(run_id, config, store, board, sessions, wall)
    }

    pub fn world(&self) -> WorldAttributes {
        WorldAttributes::new(self.store.clone())
    }

    pub fn sessions(&self) -> &Rc<dyn SessionRegistry> {
        &self.sessions
    }

    pub fn now_millis(&self) -> Millis {
        self.wall.now_millis()
    }

    /// Record a transaction through the ledger.
    pub fn record(
        &mut self,
        account_id: &str,
        item_id: &str,
        price: f64,
        kind: TransactionKind,
    ) -> LedgerResult<TransactionRecord> {
        self.ledger.record(account_id, item_id, price, kind)
    }

    /// The every-tick callback.
    pub fn tick(&mut self) -> LedgerResult<Vec<LedgerEvent>> {
        assert!(!self.clock.paused, "tick() called on paused engine");
        let tick = self.clock.advance();

        let mut events = self.currency.reconcile_pass();
        events.extend(self.ledger.drain_events());

        if self.wall.now_millis() - self.last_purge_at >= self.config.ledger.purge_interval_ms {
            events.extend(self.run_purge());
        }

        self.persist(tick, &events)?;
        log::debug!("tick={tick}: {} events", events.len());
        Ok(events)
    }

    /// The every-N-milliseconds callback.
    pub fn run_purge(&mut self) -> Vec<LedgerEvent> {
        self.last_purge_at = self.wall.now_millis();
        self.ledger.purge_pass()
    }

    /// Run n ticks in a loop. Used for tests and the runner.
    pub fn run_ticks(&mut self, n: u64) -> LedgerResult<Vec<LedgerEvent>> {
        self.clock.resume();
        let mut all = Vec::new();
        for _ in 0..n {
            all.extend(self.tick()?);
        }
        self.clock.pause();
        Ok(all)
    }

    pub fn events_for_tick(&self, tick: Tick) -> LedgerResult<Vec<EventLogEntry>> {
        self.store.events_for_tick(&self.run_id, tick)
    }

    fn persist(&self, tick: Tick, events: &[LedgerEvent]) -> LedgerResult<()> {
        let now = self.wall.now_millis();
        for event in events {
            let entry = EventLogEntry {
                id:         None,
                run_id:     self.run_id.clone(),
                tick,
                component:  component_name(event).to_string(),
                event_type: event.type_name().to_string(),
                payload:    serde_json::to_string(event)?,
                created_at: now,
            };
            self.store.append_event(&entry)?;
        }
        Ok(())
    }
}

fn component_name(event: &LedgerEvent) -> &'static str {
    match event {
        LedgerEvent::AnomalyFlagged { .. } | LedgerEvent::LogsPurged { .. } => "ledger",
        _ => "currency",
    }
}
