// File: cmdgate-core/src/utils/mod.rs

pub mod time;
