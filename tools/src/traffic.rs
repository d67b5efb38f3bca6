//! Seeded synthetic traffic for headless runs.
//!
//! Every randomized action flows from one `Pcg64Mcg` stream derived from the
//! run seed, so two runs with the same seed and tick count produce the same
//! ledger. Actions go through the same entry points a host would use:
//! balance mutators, `record`, chat command lines, and direct writes to the
//! live board from "outside".

use coin_ledger_core::{
    command::CommandRegistry,
    engine::LedgerEngine,
    ledger_subsystem::TransactionKind,
    live_board::Scoreboard,
    session::{LocalSessions, SessionRegistry},
};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64Mcg;

const ACCOUNTS: &[&str] = &["Steve", "Alex", "Notch", "Jeb", "Dinnerbone", "Grumm", "Ezra", "Kai"];

const ITEMS: &[(&str, f64)] = &[
    ("minecraft:apple", 5.0),
    ("minecraft:bread", 8.0),
    ("minecraft:iron_ingot", 40.0),
    ("minecraft:diamond", 250.0),
    ("minecraft:elytra", 1_200.0),
    ("minecraft:beacon", 3_000.0),
];

const CHAT_LINES: &[&str] = &[".balance", ".dailybonus", ".history", ".stats", ".rich", ".audit"];

/// Stable stream index for the traffic generator.
const TRAFFIC_STREAM: u64 = 1;

#[derive(Debug, Default, Clone, Copy)]
pub struct TrafficStats {
    pub joins:           u64,
    pub leaves:          u64,
    pub deposits:        u64,
    pub purchases:       u64,
    pub transfers:       u64,
    pub chat_lines:      u64,
    pub external_writes: u64,
}

pub struct Traffic {
    rng:      Pcg64Mcg,
    commands: CommandRegistry,
    pub stats: TrafficStats,
}

impl Traffic {
    pub fn new(seed: u64) -> Self {
        let derived = seed ^ TRAFFIC_STREAM.wrapping_mul(0x9e37_79b9_7f4a_7c15);
        Self {
            rng:      Pcg64Mcg::seed_from_u64(derived),
            commands: CommandRegistry::builtin(),
            stats:    TrafficStats::default(),
        }
    }

    /// Connect the opening population. The first account is privileged.
    pub fn populate(&mut self, sessions: &LocalSessions, board: &Scoreboard, admin_tag: &str) {
        for (i, name) in ACCOUNTS.iter().take(ACCOUNTS.len() / 2).enumerate() {
            sessions.connect(name);
            board.register(name);
            if i == 0 {
                sessions.add_tag(name, admin_tag);
            }
            self.stats.joins += 1;
        }
    }

    /// Perform a handful of random actions between two ticks.
    pub fn step(&mut self, engine: &mut LedgerEngine, sessions: &LocalSessions, board: &Scoreboard) {
        let actions = self.rng.gen_range(1..=4);
        for _ in 0..actions {
            let name = ACCOUNTS[self.rng.gen_range(0..ACCOUNTS.len())];
            let online = is_online(sessions, name);
            match self.rng.gen_range(0..100) {
                0..=4 => self.toggle_presence(sessions, board, name),
                _ if !online => {}
                5..=24 => {
                    let amount = self.rng.gen_range(1..=50);
                    engine.currency.deposit(name, amount);
                    self.stats.deposits += 1;
                }
                25..=54 => self.purchase(engine, name),
                55..=64 => {
                    let to = ACCOUNTS[self.rng.gen_range(0..ACCOUNTS.len())];
                    let amount = self.rng.gen_range(1..=250);
                    let line = format!(".transfer {to} {amount}");
                    self.commands.dispatch(engine, name, &line);
                    self.stats.transfers += 1;
                }
                65..=89 => {
                    let line = CHAT_LINES[self.rng.gen_range(0..CHAT_LINES.len())];
                    self.commands.dispatch(engine, name, line);
                    self.stats.chat_lines += 1;
                }
                _ => {
                    // Someone edits the live board behind the ledger's back.
                    let value = self.rng.gen_range(0..10_000);
                    board.external_set(name, value);
                    self.stats.external_writes += 1;
                }
            }
        }
    }

    fn toggle_presence(&mut self, sessions: &LocalSessions, board: &Scoreboard, name: &str) {
        if is_online(sessions, name) {
            sessions.disconnect(name);
            self.stats.leaves += 1;
        } else {
            sessions.connect(name);
            // Half of the arrivals have no live row yet.
            if self.rng.gen_bool(0.5) {
                board.register(name);
            }
            self.stats.joins += 1;
        }
    }

    fn purchase(&mut self, engine: &mut LedgerEngine, name: &str) {
        let (item, base) = ITEMS[self.rng.gen_range(0..ITEMS.len())];
        let price = (base * self.rng.gen_range(0.8..1.2) * 100.0).round() / 100.0;
        let kind = if self.rng.gen_bool(0.7) {
            TransactionKind::Buy
        } else {
            TransactionKind::Sell
        };
        let settled = match kind {
            TransactionKind::Buy => engine.currency.withdraw(name, price.ceil() as i64),
            _ => engine.currency.deposit(name, price.floor() as i64),
        };
        if settled && engine.record(name, item, price, kind).is_ok() {
            self.stats.purchases += 1;
        }
    }
}

fn is_online(sessions: &LocalSessions, name: &str) -> bool {
    sessions.find(name).is_some()
}
