//! Chat command dispatch through the builtin registry.

use coin_ledger_core::{
    command::CommandRegistry,
    config::GlobalConfig,
    ledger_subsystem::TransactionKind,
};

mod common;
use common::{build, build_with, Harness};

fn say(h: &mut Harness, caller: &str, line: &str) -> Option<String> {
    CommandRegistry::builtin().dispatch(&mut h.engine, caller, line)
}

#[test]
fn lines_without_prefix_are_ignored() {
    let mut h = build("cmd-prefix");
    h.join("Alex");
    assert_eq!(say(&mut h, "Alex", "balance"), None);
    assert!(h.sessions.messages_for("Alex").is_empty());
}

#[test]
fn disconnected_callers_are_ignored() {
    let mut h = build("cmd-offline");
    assert_eq!(say(&mut h, "Ghost", ".balance"), None);
}

#[test]
fn balance_reply_is_sent_to_caller() {
    let mut h = build("cmd-balance");
    h.join("Alex");
    let reply = say(&mut h, "Alex", ".BALANCE").unwrap();
    assert_eq!(reply, "Alex balance: 500 coins");
    assert_eq!(h.sessions.messages_for("Alex"), vec![reply]);
}

#[test]
fn unknown_and_disabled_commands_get_usage() {
    let mut config = GlobalConfig::default_test();
    config.commands.enabled.retain(|c| c != "rich");
    let mut h = build_with("cmd-unknown", config);
    h.join("Alex");

    let reply = say(&mut h, "Alex", ".loan 100").unwrap();
    assert!(reply.starts_with("Unknown command 'loan'"));
    let reply = say(&mut h, "Alex", ".rich").unwrap();
    assert!(reply.starts_with("Unknown command 'rich'"));
}

#[test]
fn custom_prefix() {
    let mut config = GlobalConfig::default_test();
    config.commands.prefix = "!".into();
    let mut h = build_with("cmd-custom-prefix", config);
    h.join("Alex");
    assert_eq!(say(&mut h, "Alex", ".balance"), None);
    assert!(say(&mut h, "Alex", "!balance").is_some());
}

#[test]
fn dailybonus_once_per_day() {
    let mut h = build("cmd-bonus");
    h.join("Alex");
    let first = say(&mut h, "Alex", ".dailybonus").unwrap();
    assert!(first.contains("100 coins"));
    let second = say(&mut h, "Alex", ".dailybonus").unwrap();
    assert!(second.contains("already claimed"));
    assert_eq!(h.engine.currency.get_balance("Alex"), 600);
}

#[test]
fn transfer_moves_coins_and_notifies_receiver() {
    let mut h = build("cmd-transfer");
    h.join("Alex");
    h.join("Sam");

    let reply = say(&mut h, "Alex", ".transfer Sam 75").unwrap();
    assert_eq!(reply, "Sent 75 coins to Sam.");
    assert_eq!(h.engine.currency.get_balance("Alex"), 425);
    assert_eq!(h.engine.currency.get_balance("Sam"), 575);
    assert_eq!(h.sessions.messages_for("Sam"), vec!["Alex sent you 75 coins.".to_string()]);
}

#[test]
fn transfer_argument_checks() {
    let mut h = build("cmd-transfer-args");
    h.join("Alex");
    h.join("Sam");

    assert!(say(&mut h, "Alex", ".transfer Sam").unwrap().starts_with("Usage:"));
    assert!(say(&mut h, "Alex", ".transfer Sam lots").unwrap().contains("whole number"));
    assert!(say(&mut h, "Alex", ".transfer Sam 201").unwrap().contains("at most 200"));
    assert!(say(&mut h, "Alex", ".transfer Sam -5").unwrap().contains("positive"));
    assert!(say(&mut h, "Alex", ".transfer Nobody 5").unwrap().contains("not found"));

    h.engine.currency.set_balance("Alex", 10);
    assert!(say(&mut h, "Alex", ".transfer Sam 20").unwrap().contains("insufficient funds"));

    assert_eq!(h.engine.currency.get_balance("Alex"), 10);
    assert_eq!(h.engine.currency.get_balance("Sam"), 500);
}

#[test]
fn history_and_stats_use_the_callers_records() {
    let mut h = build("cmd-history");
    h.join("Alex");
    assert_eq!(say(&mut h, "Alex", ".history").unwrap(), "No transactions yet.");

    h.engine.record("Alex", "minecraft:apple", 3.0, TransactionKind::Buy).unwrap();
    h.engine.record("Sam", "minecraft:bread", 4.0, TransactionKind::Sell).unwrap();

    let history = say(&mut h, "Alex", ".history").unwrap();
    assert!(history.contains("minecraft:apple"));
    assert!(!history.contains("minecraft:bread"));

    let stats = say(&mut h, "Alex", ".stats").unwrap();
    assert!(stats.contains("Balance: 500 coins"));
    assert!(stats.contains("Transactions: 1"));
}

#[test]
fn search_skips_starred_criteria() {
    let mut h = build("cmd-search");
    h.join("Alex");
    h.engine.record("Alex", "cheap", 5.0, TransactionKind::Buy).unwrap();
    h.engine.record("Sam", "pricey", 90.0, TransactionKind::Buy).unwrap();
    h.engine.record("Sam", "sold", 95.0, TransactionKind::Sell).unwrap();

    let reply = say(&mut h, "Alex", ".search * buy 50").unwrap();
    assert!(reply.contains("pricey"));
    assert!(!reply.contains("cheap"));
    assert!(!reply.contains("sold"));

    let reply = say(&mut h, "Alex", ".search Sam * * 92").unwrap();
    assert!(reply.contains("pricey"));
    assert!(!reply.contains("sold"));

    assert!(say(&mut h, "Alex", ".search * loan").unwrap().starts_with("Unknown kind"));
    assert_eq!(say(&mut h, "Alex", ".search Nobody").unwrap(), "No matching transactions.");
}

#[test]
fn audit_shows_last_ten() {
    let mut h = build("cmd-audit");
    h.join("Alex");
    for i in 0..12 {
        h.engine.record("Alex", &format!("item-{i:02}"), 1.0, TransactionKind::Gift).unwrap();
    }
    let reply = say(&mut h, "Alex", ".audit").unwrap();
    assert!(!reply.contains("item-01"));
    assert!(reply.contains("item-02"));
    assert!(reply.contains("item-11"));
}

#[test]
fn rich_lists_top_five() {
    let mut h = build("cmd-rich");
    for (name, balance) in [("a", 1), ("b", 2), ("c", 3), ("d", 4), ("e", 5), ("f", 6)] {
        h.join(name);
        h.engine.currency.set_balance(name, balance);
    }
    let reply = say(&mut h, "a", ".rich").unwrap();
    assert!(reply.contains("1. f - 6 coins"));
    assert!(reply.contains("5. b - 2 coins"));
    assert!(!reply.contains("a - 1 coins"));
}

#[test]
fn resetbalance_requires_privilege() {
    let mut h = build("cmd-reset");
    h.join("Alex");
    h.join_admin("Root");
    h.engine.currency.set_balance("Alex", 9_000);

    let reply = say(&mut h, "Alex", ".resetbalance Alex").unwrap();
    assert!(reply.contains("administrators only"));
    assert_eq!(h.engine.currency.get_balance("Alex"), 9_000);

    let reply = say(&mut h, "Root", ".resetbalance Alex").unwrap();
    assert_eq!(reply, "Alex's balance was reset to 500.");
    assert_eq!(h.engine.currency.get_balance("Alex"), 500);
    assert!(h
        .sessions
        .messages_for("Alex")
        .iter()
        .any(|m| m.contains("reset by an administrator")));

    assert!(say(&mut h, "Root", ".resetbalance Ghost").unwrap().contains("not found"));
}

#[test]
fn help_lists_enabled_commands() {
    let mut h = build("cmd-help");
    h.join("Alex");
    let reply = say(&mut h, "Alex", ".help").unwrap();
    assert!(reply.contains(".transfer <player> <amount>"));
    assert!(reply.contains(".resetbalance <player>"));
}
