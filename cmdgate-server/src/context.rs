// File: cmdgate-server/src/context.rs
//! Everything the console loop needs, wired once at startup.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info};

use cmdgate_common::models::{Actor, CommandDescriptor, GateSettings};
use cmdgate_common::traits::Messenger;
use cmdgate_common::Error;
use cmdgate_core::auth::StaticPermissions;
use cmdgate_core::config::JsonCommandConfig;
use cmdgate_core::repositories::InMemoryLedger;
use cmdgate_core::services::{
    spawn_warmup_event_task, ActorEvent, Collaborators, CommandPipeline, LogMessenger,
    RegisteredCommand, WarmupCanceller,
};
use cmdgate_core::tasks::TokioScheduler;
use cmdgate_core::utils::time::SystemClock;

use crate::demo_commands::build_commands;
use crate::players::PlayerDirectory;
use crate::Args;

/// Balance a player starts with the first time they show up.
pub const STARTING_BALANCE: f64 = 50.0;

pub struct ServerContext {
    pub pipeline: CommandPipeline,
    pub canceller: WarmupCanceller,
    pub config: Arc<JsonCommandConfig>,
    pub ledger: Arc<InMemoryLedger>,
    pub permissions: Arc<StaticPermissions>,
    pub players: Arc<PlayerDirectory>,
    pub commands: Vec<RegisteredCommand>,
    pub events: mpsc::Sender<ActorEvent>,
    pub event_task: JoinHandle<()>,
    debug_override: bool,
}

impl ServerContext {
    pub fn new(args: &Args) -> Result<Self, Error> {
        let config = Arc::new(JsonCommandConfig::load(&args.config)?);
        let ledger = Arc::new(InMemoryLedger::new());
        let permissions = Arc::new(StaticPermissions::new());
        let messenger: Arc<dyn Messenger> = Arc::new(LogMessenger::new());
        let players = Arc::new(PlayerDirectory::new());

        let commands = build_commands(players.clone(), messenger.clone())?;
        let descriptors: Vec<Arc<CommandDescriptor>> =
            commands.iter().map(|c| c.descriptor.clone()).collect();
        if config.ensure_defaults(&descriptors) {
            config.save(&args.config)?;
            info!("Wrote default command entries to {}", args.config.display());
        }

        let settings = apply_overrides(config.gate_settings(), args.debug);
        let pipeline = CommandPipeline::new(
            Collaborators {
                permissions: permissions.clone(),
                config: config.clone(),
                ledger: ledger.clone(),
                messenger,
                scheduler: Arc::new(TokioScheduler::start()),
                clock: Arc::new(SystemClock),
            },
            settings,
        );

        let canceller = pipeline.canceller();
        let (events, rx) = mpsc::channel(64);
        let event_task = spawn_warmup_event_task(rx, canceller.clone());

        Ok(Self {
            pipeline,
            canceller,
            config,
            ledger,
            permissions,
            players,
            commands,
            events,
            event_task,
            debug_override: args.debug,
        })
    }

    pub fn find_command(&self, alias: &str) -> Option<&RegisteredCommand> {
        self.commands.iter().find(|c| c.descriptor.matches(alias))
    }

    /// Looks the player up, or brings them online with base permissions for every
    /// demo command and a starting balance.
    pub fn player(&self, name: &str) -> Actor {
        let (actor, created) = self.players.join(name);
        if created {
            for command in &self.commands {
                self.permissions.grant(actor.id, &command.descriptor.permission);
            }
            self.ledger.deposit(actor.id, STARTING_BALANCE);
            info!("{} joined with {:.2}", actor.name, STARTING_BALANCE);
        }
        actor
    }

    pub fn reload(&self) -> Result<(), Error> {
        let settings = self.config.reload()?;
        self.pipeline
            .set_settings(apply_overrides(settings, self.debug_override));
        Ok(())
    }

    pub async fn shutdown(self) {
        self.pipeline.shutdown().await;
        drop(self.events);
        if let Err(e) = self.event_task.await {
            error!("Warmup event task ended abnormally: {:?}", e);
        }
    }
}

fn apply_overrides(mut settings: GateSettings, debug: bool) -> GateSettings {
    settings.debug |= debug;
    settings
}
