//! Chat commands.
//!
//! All commands are registered statically in `CommandRegistry::builtin()`.
//! A command returns the reply text; the registry delivers it to the caller.

use crate::{
    currency_subsystem::TransferRejection,
    engine::LedgerEngine,
    error::LedgerResult,
    ledger_subsystem::{HistoryFilter, TransactionKind, TransactionRecord},
    session::Session,
    types::Millis,
};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

pub trait Command {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    fn usage(&self) -> &'static str;

    /// Only callers carrying the privileged tag may run it.
    fn privileged_only(&self) -> bool {
        false
    }

    fn execute(&self, engine: &mut LedgerEngine, caller: &Session, args: &[&str])
        -> LedgerResult<String>;
}

pub struct CommandRegistry {
    commands: BTreeMap<&'static str, Box<dyn Command>>,
}

impl CommandRegistry {
    pub fn empty() -> Self {
        Self { commands: BTreeMap::new() }
    }

    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        registry.register(Box::new(Help));
        registry.register(Box::new(Balance));
        registry.register(Box::new(DailyBonus));
        registry.register(Box::new(Transfer));
        registry.register(Box::new(History));
        registry.register(Box::new(Search));
        registry.register(Box::new(Audit));
        registry.register(Box::new(Stats));
        registry.register(Box::new(Rich));
        registry.register(Box::new(ResetBalance));
        registry
    }

    pub fn register(&mut self, command: Box<dyn Command>) {
        log::debug!("registered command '{}'", command.name());
        self.commands.insert(command.name(), command);
    }

    pub fn get(&self, name: &str) -> Option<&dyn Command> {
        self.commands.get(name).map(|c| c.as_ref())
    }

    /// Handle one chat line from `caller`.
    ///
    /// Returns `None` when the line is not a command (no prefix) or the caller
    /// is not connected; otherwise the reply that was sent to the caller.
    pub fn dispatch(&self, engine: &mut LedgerEngine, caller: &str, line: &str) -> Option<String> {
        let prefix = engine.config.commands.prefix.clone();
        let body = line.trim().strip_prefix(prefix.as_str())?;
        let session = match engine.currency.session(caller) {
            Ok(s) => s,
            Err(e) => {
                log::warn!("dropping command from {caller}: {e}");
                return None;
            }
        };

        let mut parts = body.split_whitespace();
        let reply = match parts.next().map(str::to_lowercase) {
            None => "No command given.".to_string(),
            Some(name) => {
                let args: Vec<&str> = parts.collect();
                self.run(engine, &session, &name, &args)
            }
        };
        engine.sessions().send_message(caller, &reply);
        Some(reply)
    }

    fn run(&self, engine: &mut LedgerEngine, caller: &Session, name: &str, args: &[&str]) -> String {
        let enabled = engine.config.commands.enabled.iter().any(|c| c == name);
        let Some(command) = self.get(name).filter(|_| enabled) else {
            return format!("Unknown command '{name}'. {}", engine.config.commands.usage);
        };
        if command.privileged_only() && !engine.currency.is_privileged(caller) {
            return "This command is for administrators only.".to_string();
        }
        log::info!("executing '{name}' for {} with args {args:?}", caller.name);
        command.execute(engine, caller, args).unwrap_or_else(|e| {
            log::error!("command '{name}' failed for {}: {e}", caller.name);
            format!("Command failed: {e}")
        })
    }
}

fn format_time(millis: Millis) -> String {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| millis.to_string())
}

fn format_records(title: &str, records: &[TransactionRecord]) -> String {
    let mut msg = format!("[{title}]\n");
    for (i, tx) in records.iter().enumerate() {
        msg.push_str(&format!(
            "{}. {} - {} - {} - {} coins - {}\n",
            i + 1,
            tx.account_id,
            tx.kind,
            tx.item_id,
            tx.price,
            format_time(tx.timestamp)
        ));
    }
    msg
}

// ── Built-ins ──────────────────────────────────────────────────────

struct Help;

impl Command for Help {
    fn name(&self) -> &'static str { "help" }
    fn description(&self) -> &'static str { "List available commands." }
    fn usage(&self) -> &'static str { "help" }

    fn execute(&self, engine: &mut LedgerEngine, _caller: &Session, _args: &[&str]) -> LedgerResult<String> {
        let prefix = &engine.config.commands.prefix;
        let mut msg = String::from("[Commands]\n");
        let registry = CommandRegistry::builtin();
        for name in &engine.config.commands.enabled {
            if let Some(cmd) = registry.get(name) {
                msg.push_str(&format!("{prefix}{} - {}\n", cmd.usage(), cmd.description()));
            }
        }
        Ok(msg)
    }
}

struct Balance;

impl Command for Balance {
    fn name(&self) -> &'static str { "balance" }
    fn description(&self) -> &'static str { "Show your current balance." }
    fn usage(&self) -> &'static str { "balance" }

    fn execute(&self, engine: &mut LedgerEngine, caller: &Session, _args: &[&str]) -> LedgerResult<String> {
        let balance = engine.currency.try_get_balance(&caller.name)?;
        Ok(format!("{} balance: {balance} coins", caller.name))
    }
}

struct DailyBonus;

impl Command for DailyBonus {
    fn name(&self) -> &'static str { "dailybonus" }
    fn description(&self) -> &'static str { "Claim today's bonus." }
    fn usage(&self) -> &'static str { "dailybonus" }

    fn execute(&self, engine: &mut LedgerEngine, caller: &Session, _args: &[&str]) -> LedgerResult<String> {
        let bonus = engine.config.bonus.daily_bonus;
        Ok(if engine.currency.claim_daily_bonus(&caller.name, bonus) {
            format!("You received a bonus of {bonus} coins!")
        } else {
            "You have already claimed today's bonus.".to_string()
        })
    }
}

struct Transfer;

impl Command for Transfer {
    fn name(&self) -> &'static str { "transfer" }
    fn description(&self) -> &'static str { "Send coins to another player." }
    fn usage(&self) -> &'static str { "transfer <player> <amount>" }

    fn execute(&self, engine: &mut LedgerEngine, caller: &Session, args: &[&str]) -> LedgerResult<String> {
        let [receiver, amount] = args else {
            return Ok(format!("Usage: {}{}", engine.config.commands.prefix, self.usage()));
        };
        let Ok(amount) = amount.parse::<i64>() else {
            return Ok("Amount must be a whole number.".to_string());
        };
        let max = engine.config.transfer.max_transfer;
        if amount > max {
            return Ok(format!("You can transfer at most {max} coins at once."));
        }
        Ok(match engine.currency.try_transfer(&caller.name, receiver, amount) {
            Ok(()) => {
                engine.sessions().send_message(
                    receiver,
                    &format!("{} sent you {amount} coins.", caller.name),
                );
                format!("Sent {amount} coins to {receiver}.")
            }
            Err(TransferRejection::ReceiverNotConnected) => {
                format!("Receiver \"{receiver}\" was not found.")
            }
            Err(TransferRejection::SenderNotConnected) => "You are not connected.".to_string(),
            Err(TransferRejection::NonPositiveAmount) => "Amount must be positive.".to_string(),
            Err(TransferRejection::InsufficientFunds { balance }) => {
                format!("Transfer failed: insufficient funds (balance {balance}).")
            }
            Err(TransferRejection::WriteFailed) => "Transfer failed; try again later.".to_string(),
        })
    }
}

struct History;

impl Command for History {
    fn name(&self) -> &'static str { "history" }
    fn description(&self) -> &'static str { "Show your transaction history." }
    fn usage(&self) -> &'static str { "history" }

    fn execute(&self, engine: &mut LedgerEngine, caller: &Session, _args: &[&str]) -> LedgerResult<String> {
        let history = engine.ledger.history_for(&caller.name);
        if history.is_empty() {
            return Ok("No transactions yet.".to_string());
        }
        Ok(format_records("History", &history))
    }
}

struct Search;

impl Command for Search {
    fn name(&self) -> &'static str { "search" }
    fn description(&self) -> &'static str {
        "Search transactions. Use * to skip a criterion."
    }
    fn usage(&self) -> &'static str { "search [player] [kind] [minPrice] [maxPrice]" }

    fn execute(&self, engine: &mut LedgerEngine, _caller: &Session, args: &[&str]) -> LedgerResult<String> {
        let arg = |i: usize| args.get(i).copied().filter(|a| *a != "*");
        let parse_price = |i: usize| arg(i).and_then(|a| a.parse::<f64>().ok());

        let kind = match arg(1) {
            Some(k) => match TransactionKind::parse(k) {
                Some(kind) => Some(kind),
                None => return Ok(format!("Unknown kind '{k}' (buy, sell, transfer, gift).")),
            },
            None => None,
        };
        let filter = HistoryFilter {
            account_id: arg(0).map(String::from),
            kind,
            min_price: parse_price(2),
            max_price: parse_price(3),
            ..Default::default()
        };
        let results = engine.ledger.filtered_history(&filter);
        if results.is_empty() {
            return Ok("No matching transactions.".to_string());
        }
        Ok(format_records("Search results", &results))
    }
}

struct Audit;

const AUDIT_RECENT: usize = 10;

impl Command for Audit {
    fn name(&self) -> &'static str { "audit" }
    fn description(&self) -> &'static str { "Show the most recent transactions." }
    fn usage(&self) -> &'static str { "audit" }

    fn execute(&self, engine: &mut LedgerEngine, _caller: &Session, _args: &[&str]) -> LedgerResult<String> {
        let all = engine.ledger.all_history();
        if all.is_empty() {
            return Ok("No transactions yet.".to_string());
        }
        let recent = &all[all.len().saturating_sub(AUDIT_RECENT)..];
        Ok(format_records("Recent transactions", recent))
    }
}

struct Stats;

impl Command for Stats {
    fn name(&self) -> &'static str { "stats" }
    fn description(&self) -> &'static str { "Show your balance and transaction count." }
    fn usage(&self) -> &'static str { "stats" }

    fn execute(&self, engine: &mut LedgerEngine, caller: &Session, _args: &[&str]) -> LedgerResult<String> {
        let balance = engine.currency.try_get_balance(&caller.name)?;
        let count = engine.ledger.history_for(&caller.name).len();
        Ok(format!("[Stats]\nBalance: {balance} coins\nTransactions: {count}"))
    }
}

struct Rich;

const RICH_TOP: usize = 5;

impl Command for Rich {
    fn name(&self) -> &'static str { "rich" }
    fn description(&self) -> &'static str { "Show the richest online players." }
    fn usage(&self) -> &'static str { "rich" }

    fn execute(&self, engine: &mut LedgerEngine, _caller: &Session, _args: &[&str]) -> LedgerResult<String> {
        let mut msg = String::from("[Rich ranking]\n");
        for (i, (name, balance)) in engine.currency.rich_ranking(RICH_TOP).iter().enumerate() {
            msg.push_str(&format!("{}. {name} - {balance} coins\n", i + 1));
        }
        Ok(msg)
    }
}

struct ResetBalance;

impl Command for ResetBalance {
    fn name(&self) -> &'static str { "resetbalance" }
    fn description(&self) -> &'static str { "Reset a player's balance to the starting amount." }
    fn usage(&self) -> &'static str { "resetbalance <player>" }
    fn privileged_only(&self) -> bool { true }

    fn execute(&self, engine: &mut LedgerEngine, _caller: &Session, args: &[&str]) -> LedgerResult<String> {
        let [target] = args else {
            return Ok(format!("Usage: {}{}", engine.config.commands.prefix, self.usage()));
        };
        if engine.currency.session(target).is_err() {
            return Ok(format!("Player \"{target}\" was not found."));
        }
        let start = engine.currency.starting_balance();
        if !engine.currency.set_balance(target, start) {
            return Ok(format!("Could not reset {target}'s balance."));
        }
        engine
            .sessions()
            .send_message(target, "Your balance was reset by an administrator.");
        Ok(format!("{target}'s balance was reset to {start}."))
    }
}
