//! Virtual-currency ledger core: durable balances reconciled against a live
//! board, an append-only transaction log, and the attribute store beneath them.

pub mod clock;
pub mod command;
pub mod config;
pub mod currency_subsystem;
pub mod engine;
pub mod error;
pub mod event;
pub mod ledger_subsystem;
pub mod live_board;
pub mod session;
pub mod store;
pub mod types;
