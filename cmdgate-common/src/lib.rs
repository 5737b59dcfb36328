// File: cmdgate-common/src/lib.rs
//! Shared data model and collaborator traits for the command gate.

pub mod error;
pub mod models;
pub mod traits;

pub use error::Error;
