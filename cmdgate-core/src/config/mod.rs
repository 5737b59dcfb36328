// File: cmdgate-core/src/config/mod.rs

pub mod command_config;

pub use command_config::{ConfigDocument, JsonCommandConfig};
