// File: cmdgate-core/src/tasks/mod.rs

pub mod scheduler;

pub use scheduler::TokioScheduler;
