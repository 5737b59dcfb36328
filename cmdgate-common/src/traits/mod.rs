// File: cmdgate-common/src/traits/mod.rs

pub mod gate_traits;

pub use gate_traits::{
    CancelHandle, Clock, CommandBody, ConfigSource, Ledger, Messenger, PermissionOracle,
    Scheduler, Task,
};
