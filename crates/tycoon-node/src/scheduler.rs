//! Periodic monthly settlement.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info};
use tycoon_ledger::{SettlementProcessor, SettlementReport};

/// Runs monthly settlement on a fixed period, in addition to the admin
/// trigger.
pub struct SettlementScheduler {
    settlement: Arc<SettlementProcessor>,
    period: Duration,
}

impl SettlementScheduler {
    pub fn new(settlement: Arc<SettlementProcessor>, period: Duration) -> Self {
        Self { settlement, period }
    }

    /// Start the loop on the runtime.
    pub fn spawn(self) -> JoinHandle<()> {
        let scheduler = Arc::new(self);
        tokio::spawn(async move { scheduler.run().await })
    }

    /// Settle once per period, forever. The first run happens one full
    /// period after start.
    pub async fn run(self: Arc<Self>) {
        info!(period_secs = self.period.as_secs(), "Settlement scheduler started");

        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            ticker.tick().await;
            self.run_once().await;
        }
    }

    /// One settlement run. Failures are logged; the next period tries again.
    pub async fn run_once(&self) -> Option<SettlementReport> {
        match self.settlement.run_monthly_settlement().await {
            Ok(report) => {
                info!(
                    total = report.total,
                    settled = report.settled,
                    failed = report.failed,
                    errors = report.errors,
                    "Scheduled settlement finished"
                );
                Some(report)
            }
            Err(e) => {
                error!("Scheduled settlement failed: {}", e);
                None
            }
        }
    }
}
