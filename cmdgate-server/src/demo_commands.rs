// File: cmdgate-server/src/demo_commands.rs
//! A handful of commands to drive the pipeline by hand.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use tracing::info;

use cmdgate_common::models::{
    ActorConstraint, BodyResult, CommandDescriptor, CommandFailure, Invocation, Position,
};
use cmdgate_common::traits::{CommandBody, Messenger};
use cmdgate_common::Error;
use cmdgate_core::services::RegisteredCommand;

use crate::players::PlayerDirectory;

pub const SPAWN: Position = Position {
    x: 0.0,
    y: 64.0,
    z: 0.0,
};

/// Teleports the player back to spawn. Meant to be configured with a warmup and a cost.
pub struct HomeCommand {
    players: Arc<PlayerDirectory>,
    messenger: Arc<dyn Messenger>,
}

#[async_trait]
impl CommandBody for HomeCommand {
    async fn pre_check(&self, invocation: &Invocation) -> Result<(), String> {
        match self.players.position(invocation.actor.id) {
            Some(pos) if pos == SPAWN => Err("You are already home.".into()),
            Some(_) => Ok(()),
            None => Err("You are not online.".into()),
        }
    }

    async fn execute(&self, invocation: &Invocation) -> BodyResult {
        if !self.players.teleport(invocation.actor.id, SPAWN) {
            return Err(CommandFailure::message("You went offline before teleporting."));
        }
        self.messenger
            .send(&invocation.actor, "Welcome home.")
            .await;
        Ok(())
    }
}

pub struct HealCommand {
    messenger: Arc<dyn Messenger>,
}

#[async_trait]
impl CommandBody for HealCommand {
    async fn execute(&self, invocation: &Invocation) -> BodyResult {
        self.messenger
            .send(&invocation.actor, "You have been healed.")
            .await;
        Ok(())
    }
}

/// Sends a line to every online player, off the serial worker.
pub struct BroadcastCommand {
    players: Arc<PlayerDirectory>,
    messenger: Arc<dyn Messenger>,
}

#[async_trait]
impl CommandBody for BroadcastCommand {
    async fn pre_check(&self, invocation: &Invocation) -> Result<(), String> {
        if invocation.args.positional().is_empty() {
            return Err("Usage: /broadcast <message>".into());
        }
        Ok(())
    }

    async fn execute(&self, invocation: &Invocation) -> BodyResult {
        let recipients = self.players.online();
        if recipients.is_empty() {
            return Err(CommandFailure::message("Nobody is online to hear you."));
        }
        // Simulates a slow fan-out.
        tokio::time::sleep(Duration::from_millis(250)).await;
        let text = format!("[{}] {}", invocation.actor.name, invocation.args.joined());
        for player in &recipients {
            self.messenger.send(player, &text).await;
        }
        info!("Broadcast by {} reached {} player(s)", invocation.actor.name, recipients.len());
        Ok(())
    }
}

pub struct FailCommand;

#[async_trait]
impl CommandBody for FailCommand {
    async fn execute(&self, _invocation: &Invocation) -> BodyResult {
        Err(CommandFailure::message("This command always fails."))
    }
}

/// `crash` returns an unexpected error, `crash panic` panics.
pub struct CrashCommand;

#[async_trait]
impl CommandBody for CrashCommand {
    async fn execute(&self, invocation: &Invocation) -> BodyResult {
        let arg = invocation.args.get(0).unwrap_or("");
        if arg.eq_ignore_ascii_case("panic") {
            panic!("crash command asked to panic");
        }
        let _count: u32 = arg
            .parse()
            .with_context(|| format!("'{}' is not a count", arg))?;
        Err(anyhow::anyhow!("crash command reached its deliberate failure").into())
    }
}

pub fn build_commands(
    players: Arc<PlayerDirectory>,
    messenger: Arc<dyn Messenger>,
) -> Result<Vec<RegisteredCommand>, Error> {
    let home = CommandDescriptor::builder("home")
        .alias("h")
        .no_cooldown()
        .actors(ActorConstraint::PlayerOnly)
        .description("Teleport to spawn")
        .build()?;
    let heal = CommandDescriptor::builder("heal")
        .no_warmup()
        .no_cost()
        .description("Restore your health")
        .build()?;
    let broadcast = CommandDescriptor::builder("broadcast")
        .alias("bc")
        .no_warmup()
        .run_async()
        .description("Message every online player")
        .build()?;
    let fail = CommandDescriptor::builder("fail")
        .no_warmup()
        .description("Always fails with a message")
        .build()?;
    let crash = CommandDescriptor::builder("crash")
        .no_warmup()
        .description("Fails unexpectedly")
        .build()?;

    Ok(vec![
        RegisteredCommand::new(
            home,
            HomeCommand {
                players: players.clone(),
                messenger: messenger.clone(),
            },
        ),
        RegisteredCommand::new(
            heal,
            HealCommand {
                messenger: messenger.clone(),
            },
        ),
        RegisteredCommand::new(broadcast, BroadcastCommand { players, messenger }),
        RegisteredCommand::new(fail, FailCommand),
        RegisteredCommand::new(crash, CrashCommand),
    ])
}
