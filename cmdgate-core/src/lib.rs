// File: cmdgate-core/src/lib.rs

pub mod auth;
pub mod config;
pub mod repositories;
pub mod services;
pub mod tasks;
pub mod test_utils;
pub mod utils;

pub use cmdgate_common::error::Error;
pub use services::{CommandPipeline, RegisteredCommand};
