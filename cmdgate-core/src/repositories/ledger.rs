// File: cmdgate-core/src/repositories/ledger.rs

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::debug;
use uuid::Uuid;

use cmdgate_common::traits::Ledger;
use cmdgate_common::Error;

/// Balance storage kept in memory. Each charge/refund runs under the account's
/// shard lock, so a charge either debits the full amount or nothing.
#[derive(Default)]
pub struct InMemoryLedger {
    balances: DashMap<Uuid, f64>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens the account if needed and adds `amount`.
    pub fn deposit(&self, actor_id: Uuid, amount: f64) {
        *self.balances.entry(actor_id).or_insert(0.0) += amount;
    }

    pub fn balance(&self, actor_id: Uuid) -> Option<f64> {
        self.balances.get(&actor_id).map(|b| *b)
    }
}

#[async_trait]
impl Ledger for InMemoryLedger {
    async fn charge(&self, actor_id: Uuid, amount: f64) -> Result<bool, Error> {
        if !amount.is_finite() || amount < 0.0 {
            return Err(Error::Ledger(format!("invalid charge amount {}", amount)));
        }
        let Some(mut balance) = self.balances.get_mut(&actor_id) else {
            debug!("Charge refused: no account for {}", actor_id);
            return Ok(false);
        };
        if *balance < amount {
            debug!(
                "Charge refused: {} has {:.2}, needs {:.2}",
                actor_id, *balance, amount
            );
            return Ok(false);
        }
        *balance -= amount;
        Ok(true)
    }

    async fn refund(&self, actor_id: Uuid, amount: f64) -> Result<bool, Error> {
        if !amount.is_finite() || amount < 0.0 {
            return Err(Error::Ledger(format!("invalid refund amount {}", amount)));
        }
        match self.balances.get_mut(&actor_id) {
            Some(mut balance) => {
                *balance += amount;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
