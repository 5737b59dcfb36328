// File: cmdgate-common/src/models/mod.rs
pub mod actor;
pub mod command;
pub mod invocation;
pub mod outcome;
pub mod settings;

pub use actor::{Actor, ActorKind, Position};
pub use command::{ActorConstraint, CommandDescriptor, CommandDescriptorBuilder, ExemptionKind};
pub use invocation::{CommandArgs, Invocation, NO_COST_FLAG};
pub use outcome::{BodyResult, CommandError, CommandFailure, Dispatched, ExecutionOutcome};
pub use settings::{CommandSettings, GateSettings};
