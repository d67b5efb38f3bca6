//! Balance mutators: lazy creation, deposit/withdraw, transfer, daily bonus.

use coin_ledger_core::{
    currency_subsystem::{TransferRejection, BONUS_DATE_KEY, CURRENCY_KEY},
    store::{AccountAttributes, AttributeOwner},
};
use serde_json::json;

mod common;
use common::{build, DAY_MS};

#[test]
fn first_read_creates_starting_balance() {
    let h = build("bal-start");
    let attrs = AccountAttributes::new(h.engine.store.clone(), "Alex");
    assert_eq!(attrs.get(CURRENCY_KEY), None);

    assert_eq!(h.engine.currency.get_balance("Alex"), 500);
    assert_eq!(attrs.get(CURRENCY_KEY), Some(json!(500)));
}

#[test]
fn set_then_get_round_trips() {
    let h = build("bal-roundtrip");
    for amount in [0, 1, 499, 500, 123_456_789, i64::MAX] {
        assert!(h.engine.currency.set_balance("Alex", amount));
        assert_eq!(h.engine.currency.get_balance("Alex"), amount);
    }
}

#[test]
fn set_balance_does_not_touch_live_board() {
    let h = build("bal-live");
    h.join("Alex");
    h.board.external_set("Alex", 77);
    h.engine.currency.set_balance("Alex", 900);
    assert_eq!(h.board.score_of("Alex"), Some(77));
}

#[test]
fn non_integer_balance_is_reset_to_start() {
    let h = build("bal-corrupt");
    let attrs = AccountAttributes::new(h.engine.store.clone(), "Alex");
    attrs.set(CURRENCY_KEY, &json!("lots"));
    assert_eq!(h.engine.currency.get_balance("Alex"), 500);
    assert_eq!(attrs.get(CURRENCY_KEY), Some(json!(500)));
}

#[test]
fn deposit_and_withdraw() {
    let h = build("bal-dw");
    let currency = &h.engine.currency;

    assert!(currency.deposit("Alex", 100));
    assert_eq!(currency.get_balance("Alex"), 600);

    assert!(!currency.withdraw("Alex", 700));
    assert_eq!(currency.get_balance("Alex"), 600);

    assert!(currency.withdraw("Alex", 600));
    assert_eq!(currency.get_balance("Alex"), 0);
}

#[test]
fn transfer_moves_funds_between_connected_accounts() {
    let h = build("bal-transfer");
    h.join("Alex");
    h.join("Sam");

    assert!(h.engine.currency.transfer("Alex", "Sam", 50));
    assert_eq!(h.engine.currency.get_balance("Alex"), 450);
    assert_eq!(h.engine.currency.get_balance("Sam"), 550);
}

#[test]
fn failed_transfer_leaves_both_balances_unchanged() {
    let h = build("bal-transfer-fail");
    h.join("Alex");
    h.join("Sam");
    h.engine.currency.set_balance("Alex", 30);

    assert_eq!(
        h.engine.currency.try_transfer("Alex", "Sam", 31),
        Err(TransferRejection::InsufficientFunds { balance: 30 })
    );
    assert_eq!(h.engine.currency.get_balance("Alex"), 30);
    assert_eq!(h.engine.currency.get_balance("Sam"), 500);
}

#[test]
fn transfer_requires_both_accounts_connected() {
    let h = build("bal-transfer-offline");
    h.join("Alex");
    h.engine.currency.set_balance("Ghost", 1_000);

    assert_eq!(
        h.engine.currency.try_transfer("Alex", "Ghost", 10),
        Err(TransferRejection::ReceiverNotConnected)
    );
    assert_eq!(
        h.engine.currency.try_transfer("Ghost", "Alex", 10),
        Err(TransferRejection::SenderNotConnected)
    );
    assert_eq!(h.engine.currency.get_balance("Alex"), 500);
    assert_eq!(h.engine.currency.get_balance("Ghost"), 1_000);
}

#[test]
fn transfer_rejects_non_positive_amounts() {
    let h = build("bal-transfer-neg");
    h.join("Alex");
    h.join("Sam");
    assert!(!h.engine.currency.transfer("Alex", "Sam", -100));
    assert!(!h.engine.currency.transfer("Alex", "Sam", 0));
    assert_eq!(h.engine.currency.get_balance("Sam"), 500);
}

#[test]
fn daily_bonus_once_per_calendar_day() {
    let h = build("bal-bonus");
    let currency = &h.engine.currency;

    assert!(currency.claim_daily_bonus("Alex", 100));
    assert_eq!(currency.get_balance("Alex"), 600);
    assert!(!currency.claim_daily_bonus("Alex", 100));
    assert_eq!(currency.get_balance("Alex"), 600);

    let attrs = AccountAttributes::new(h.engine.store.clone(), "Alex");
    assert_eq!(attrs.get(BONUS_DATE_KEY), Some(json!("2026-10-17")));

    // Clock starts at noon: 11h59m later is still the same UTC day.
    h.clock.advance(DAY_MS / 2 - 60_000);
    assert!(!currency.claim_daily_bonus("Alex", 100));

    // Two minutes later it is the next day, well under 24h since the claim.
    h.clock.advance(120_000);
    assert!(currency.claim_daily_bonus("Alex", 100));
    assert_eq!(currency.get_balance("Alex"), 700);
}

#[test]
fn rich_ranking_orders_connected_accounts() {
    let h = build("bal-rich");
    for (name, balance) in [("a", 10), ("b", 900), ("c", 300), ("d", 300), ("e", 1), ("f", 50)] {
        h.join(name);
        h.engine.currency.set_balance(name, balance);
    }
    let ranks = h.engine.currency.rich_ranking(5);
    let names: Vec<&str> = ranks.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, vec!["b", "c", "d", "f", "a"]);
}

#[test]
fn deposit_and_withdraw_reject_non_positive_amounts() {
    let h = build("bal-sign");
    let currency = &h.engine.currency;

    assert!(!currency.withdraw("Alex", -1_000));
    assert!(!currency.withdraw("Alex", 0));
    assert!(!currency.deposit("Alex", -1_000));
    assert!(!currency.deposit("Alex", 0));
    assert_eq!(currency.get_balance("Alex"), 500);
}

#[test]
fn withdraw_extreme_amounts_without_overflow() {
    let h = build("bal-extreme");
    let currency = &h.engine.currency;

    assert!(!currency.withdraw("Alex", i64::MIN));
    assert!(!currency.withdraw("Alex", i64::MAX));
    assert_eq!(currency.get_balance("Alex"), 500);

    currency.set_balance("Alex", -10);
    assert!(!currency.withdraw("Alex", i64::MAX));
    assert_eq!(currency.get_balance("Alex"), -10);
}
