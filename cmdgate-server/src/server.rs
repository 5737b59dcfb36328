// File: cmdgate-server/src/server.rs
//! Line-oriented console that feeds the pipeline.

use tokio::io::{self, AsyncBufReadExt, BufReader};
use tracing::{debug, error, info, warn};

use cmdgate_common::models::{Actor, CommandArgs, Dispatched, Position};
use cmdgate_common::Error;
use cmdgate_core::services::ActorEvent;

use crate::context::ServerContext;
use crate::Args;

const HELP: &str = "\
commands:
  as <player> <command> [args...]   run a command as a player
  console <command> [args...]       run a command as the console
  move <player> <x> <y> <z>         move a player
  quit <player>                     disconnect a player
  balance <player>                  show a player's balance
  give <player> <amount>            deposit into a player's account
  reload                            re-read the config file
  exit                              cancel pending warmups and stop";

/// One parsed console line.
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleLine {
    As {
        player: String,
        command: String,
        args: CommandArgs,
    },
    Console {
        command: String,
        args: CommandArgs,
    },
    Move {
        player: String,
        to: Position,
    },
    Quit(String),
    Balance(String),
    Give {
        player: String,
        amount: f64,
    },
    Reload,
    Help,
    Exit,
}

impl ConsoleLine {
    pub fn parse(line: &str) -> Result<Option<Self>, Error> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Ok(None);
        };
        let rest: Vec<&str> = words.collect();
        let need = |n: usize, usage: &str| -> Result<(), Error> {
            if rest.len() < n {
                Err(Error::Parse(format!("usage: {}", usage)))
            } else {
                Ok(())
            }
        };

        let parsed = match verb.to_lowercase().as_str() {
            "as" => {
                need(2, "as <player> <command> [args...]")?;
                ConsoleLine::As {
                    player: rest[0].to_string(),
                    command: rest[1].to_string(),
                    args: CommandArgs::new(rest[2..].iter().map(|s| s.to_string()).collect()),
                }
            }
            "console" => {
                need(1, "console <command> [args...]")?;
                ConsoleLine::Console {
                    command: rest[0].to_string(),
                    args: CommandArgs::new(rest[1..].iter().map(|s| s.to_string()).collect()),
                }
            }
            "move" => {
                need(4, "move <player> <x> <y> <z>")?;
                ConsoleLine::Move {
                    player: rest[0].to_string(),
                    to: Position::new(rest[1].parse()?, rest[2].parse()?, rest[3].parse()?),
                }
            }
            "quit" => {
                need(1, "quit <player>")?;
                ConsoleLine::Quit(rest[0].to_string())
            }
            "balance" => {
                need(1, "balance <player>")?;
                ConsoleLine::Balance(rest[0].to_string())
            }
            "give" => {
                need(2, "give <player> <amount>")?;
                ConsoleLine::Give {
                    player: rest[0].to_string(),
                    amount: rest[1].parse()?,
                }
            }
            "reload" => ConsoleLine::Reload,
            "help" | "?" => ConsoleLine::Help,
            "exit" | "stop" => ConsoleLine::Exit,
            other => return Err(Error::Parse(format!("unknown console command '{}'", other))),
        };
        Ok(Some(parsed))
    }
}

pub async fn run_server(args: Args) -> Result<(), Error> {
    let ctx = ServerContext::new(&args)?;
    info!(
        "cmdgate ready: {} command(s), config at {}",
        ctx.commands.len(),
        args.config.display()
    );
    println!("{}", HELP);

    let mut lines = BufReader::new(io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match ConsoleLine::parse(&line) {
            Ok(Some(ConsoleLine::Exit)) => break,
            Ok(Some(parsed)) => handle_line(&ctx, parsed).await,
            Ok(None) => {}
            Err(e) => println!("{}", e),
        }
    }

    info!("Shutting down");
    ctx.shutdown().await;
    Ok(())
}

async fn handle_line(ctx: &ServerContext, line: ConsoleLine) {
    match line {
        ConsoleLine::As {
            player,
            command,
            args,
        } => {
            let actor = ctx.player(&player);
            run_command(ctx, actor, &command, args).await;
        }
        ConsoleLine::Console { command, args } => {
            run_command(ctx, Actor::console(), &command, args).await;
        }
        ConsoleLine::Move { player, to } => match ctx.players.move_to(&player, to) {
            Some((actor, from)) => {
                send_event(
                    ctx,
                    ActorEvent::Moved {
                        actor_id: actor.id,
                        from,
                        to,
                    },
                )
                .await
            }
            None => println!("{} is not online", player),
        },
        ConsoleLine::Quit(player) => match ctx.players.disconnect(&player) {
            Some(actor) => {
                info!("{} left", actor.name);
                send_event(ctx, ActorEvent::Disconnected { actor_id: actor.id }).await;
            }
            None => println!("{} is not known", player),
        },
        ConsoleLine::Balance(player) => {
            match ctx.players.find(&player).and_then(|a| ctx.ledger.balance(a.id)) {
                Some(balance) => println!("{}: {:.2}", player, balance),
                None => println!("{} has no account", player),
            }
        }
        ConsoleLine::Give { player, amount } => {
            if !amount.is_finite() || amount <= 0.0 {
                println!("amount must be positive");
                return;
            }
            let actor = ctx.player(&player);
            ctx.ledger.deposit(actor.id, amount);
            println!("gave {:.2} to {}", amount, actor.name);
        }
        ConsoleLine::Reload => match ctx.reload() {
            Ok(()) => println!("config reloaded"),
            Err(e) => error!("Reload failed, keeping current config: {}", e),
        },
        ConsoleLine::Help => println!("{}", HELP),
        ConsoleLine::Exit => {}
    }
}

async fn run_command(ctx: &ServerContext, actor: Actor, alias: &str, args: CommandArgs) {
    let Some(command) = ctx.find_command(alias) else {
        println!("unknown command /{}", alias);
        return;
    };

    // Issuing a command voids whatever the actor was warming up.
    if actor.is_gated() {
        ctx.canceller.on_command(actor.id).await;
    }

    match ctx.pipeline.execute(command, actor.clone(), args).await {
        Ok(Dispatched::Completed) => debug!("/{} completed for {}", alias, actor.name),
        Ok(Dispatched::Accepted) => debug!("/{} accepted for {}", alias, actor.name),
        Ok(Dispatched::WarmupPending { fire_at, .. }) => {
            debug!("/{} for {} fires at {}", alias, actor.name, fire_at)
        }
        Err(e) => debug!("/{} for {} stopped: {}", alias, actor.name, e),
    }
}

async fn send_event(ctx: &ServerContext, event: ActorEvent) {
    if ctx.events.send(event).await.is_err() {
        warn!("Warmup event task is gone; event dropped");
    }
}
