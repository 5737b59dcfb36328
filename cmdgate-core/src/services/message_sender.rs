// File: cmdgate-core/src/services/message_sender.rs

use async_trait::async_trait;
use tracing::info;

use cmdgate_common::models::{Actor, ActorKind};
use cmdgate_common::traits::Messenger;

/// Writes console replies to stdout and logs everything addressed to players
/// or automation.
#[derive(Debug, Default, Clone)]
pub struct LogMessenger;

impl LogMessenger {
    pub fn new() -> Self {
        Self
    }

    fn format(actor: &Actor, text: &str) -> String {
        format!("[{} -> {}] {}", actor.kind.as_str(), actor.name, text)
    }
}

#[async_trait]
impl Messenger for LogMessenger {
    async fn send(&self, actor: &Actor, text: &str) {
        match actor.kind {
            ActorKind::Console => println!("{}", text),
            _ => info!("{}", Self::format(actor, text)),
        }
    }
}
