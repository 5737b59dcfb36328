// File: cmdgate-core/src/auth/mod.rs

pub mod permissions;

pub use permissions::StaticPermissions;
