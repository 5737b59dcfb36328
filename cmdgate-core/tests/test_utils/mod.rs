// File: cmdgate-core/tests/test_utils/mod.rs
#![allow(dead_code)]

use std::sync::Arc;

use uuid::Uuid;

use cmdgate_common::models::{Actor, CommandDescriptor, GateSettings};
use cmdgate_common::traits::{ConfigSource, Ledger, PermissionOracle};
use cmdgate_core::auth::StaticPermissions;
use cmdgate_core::services::{Collaborators, CommandPipeline, RegisteredCommand};
use cmdgate_core::test_utils::helpers::{
    FixedConfig, ManualClock, ManualScheduler, RecordingLedger, RecordingMessenger, ScriptedBody,
};

/// A pipeline wired entirely to deterministic collaborators.
pub struct Harness {
    pub clock: Arc<ManualClock>,
    pub scheduler: Arc<ManualScheduler>,
    pub messenger: Arc<RecordingMessenger>,
    pub ledger: Arc<RecordingLedger>,
    pub permissions: Arc<StaticPermissions>,
    pub pipeline: CommandPipeline,
}

impl Harness {
    pub fn new(config: FixedConfig) -> Self {
        Self::with_settings(config, GateSettings::default())
    }

    pub fn with_settings(config: FixedConfig, settings: GateSettings) -> Self {
        let clock = Arc::new(ManualClock::new());
        let scheduler = Arc::new(ManualScheduler::new(clock.clone()));
        let messenger = Arc::new(RecordingMessenger::new());
        let ledger = Arc::new(RecordingLedger::new());
        let permissions = Arc::new(StaticPermissions::new());

        let pipeline = CommandPipeline::new(
            Collaborators {
                permissions: permissions.clone(),
                config: Arc::new(config),
                ledger: ledger.clone(),
                messenger: messenger.clone(),
                scheduler: scheduler.clone(),
                clock: clock.clone(),
            },
            settings,
        );

        Self {
            clock,
            scheduler,
            messenger,
            ledger,
            permissions,
            pipeline,
        }
    }

    /// A player holding exactly the given permission nodes.
    pub fn player(&self, name: &str, nodes: &[&str]) -> Actor {
        let actor = Actor::player(Uuid::new_v4(), name);
        for node in nodes {
            self.permissions.grant(actor.id, node);
        }
        actor
    }
}

/// Pipeline over caller-supplied ledger and permissions, for mock-based tests.
pub fn pipeline_with(
    ledger: Arc<dyn Ledger>,
    permissions: Arc<dyn PermissionOracle>,
    config: Arc<dyn ConfigSource>,
) -> (CommandPipeline, Arc<ManualScheduler>, Arc<RecordingMessenger>) {
    let clock = Arc::new(ManualClock::new());
    let scheduler = Arc::new(ManualScheduler::new(clock.clone()));
    let messenger = Arc::new(RecordingMessenger::new());
    let pipeline = CommandPipeline::new(
        Collaborators {
            permissions,
            config,
            ledger,
            messenger: messenger.clone(),
            scheduler: scheduler.clone(),
            clock,
        },
        GateSettings::default(),
    );
    (pipeline, scheduler, messenger)
}

pub fn command(descriptor: CommandDescriptor, body: Arc<ScriptedBody>) -> RegisteredCommand {
    RegisteredCommand::from_parts(Arc::new(descriptor), body)
}

pub fn descriptor(name: &str) -> CommandDescriptor {
    CommandDescriptor::builder(name).build().unwrap()
}
