// File: cmdgate-core/src/services/mod.rs

pub mod actor_locks;
pub mod command_pipeline;
pub mod cooldown_store;
pub mod cost_policy;
pub mod message_sender;
pub mod messages;
pub mod warmup_events;
pub mod warmup_registry;

pub use actor_locks::{ActorGuard, ActorLocks};
pub use command_pipeline::{Collaborators, CommandPipeline, RegisteredCommand};
pub use cooldown_store::CooldownStore;
pub use cost_policy::{Charge, CostPolicy};
pub use message_sender::LogMessenger;
pub use warmup_events::{spawn_warmup_event_task, ActorEvent, WarmupCanceller};
pub use warmup_registry::{PendingWarmup, WarmupRegistry, WarmupState};
