// File: cmdgate-core/src/repositories/mod.rs

pub mod ledger;

pub use ledger::InMemoryLedger;
