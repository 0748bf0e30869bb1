//! Recovery Worker
//!
//! Background worker that scans for and resumes stuck transfers.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::coordinator::TransferCoordinator;
use super::error::TransferError;
use super::state::TransferState;

/// Retries after which a stuck in-flight intent is reported as critical
const CRITICAL_RETRY_COUNT: i32 = 10;

/// Configuration for the recovery worker
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// How often to scan for stale transfers
    pub scan_interval: Duration,
    /// How long a transfer must be stuck to be considered stale
    pub stale_threshold: Duration,
    /// Maximum transfers to process per scan
    pub batch_size: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            scan_interval: Duration::from_secs(30),
            stale_threshold: Duration::from_secs(60),
            batch_size: 100,
        }
    }
}

/// Recovery Worker
///
/// Periodically scans for transfers stuck in non-terminal states
/// and resumes their processing. Funds debited by an interrupted request
/// end up either credited or refunded.
pub struct RecoveryWorker {
    coordinator: Arc<TransferCoordinator>,
    config: WorkerConfig,
}

impl RecoveryWorker {
    pub fn new(coordinator: Arc<TransferCoordinator>, config: WorkerConfig) -> Self {
        Self {
            coordinator,
            config,
        }
    }

    /// Run the recovery worker loop
    ///
    /// This method runs forever, periodically scanning for and resuming stale transfers.
    pub async fn run(&self) -> ! {
        info!(
            scan_interval_secs = self.config.scan_interval.as_secs(),
            stale_threshold_secs = self.config.stale_threshold.as_secs(),
            "Starting recovery worker"
        );

        loop {
            if let Err(e) = self.scan_and_recover().await {
                error!(error = %e, "Recovery scan failed");
            }

            tokio::time::sleep(self.config.scan_interval).await;
        }
    }

    /// Run a single scan and recovery cycle
    ///
    /// Returns how many transfers changed state.
    pub async fn scan_and_recover(&self) -> Result<usize, TransferError> {
        let stale_transfers = self
            .coordinator
            .intents()
            .find_stale(self.config.stale_threshold, self.config.batch_size)
            .await?;

        if stale_transfers.is_empty() {
            debug!("No stale transfers found");
            return Ok(0);
        }

        info!(
            count = stale_transfers.len(),
            "Found stale transfers to recover"
        );

        let mut recovered = 0;

        for transfer in &stale_transfers {
            debug!(
                transfer_id = %transfer.transfer_id,
                state = %transfer.state,
                retry_count = transfer.retry_count,
                "Recovering transfer"
            );

            if matches!(
                transfer.state,
                TransferState::CreditPending | TransferState::Compensating
            ) && transfer.retry_count > CRITICAL_RETRY_COUNT
            {
                warn!(
                    transfer_id = %transfer.transfer_id,
                    state = %transfer.state,
                    retry_count = transfer.retry_count,
                    amount = %transfer.amount,
                    "CRITICAL: Funds in flight, transfer stuck with many retries!"
                );
            }

            match self.coordinator.resume(transfer.transfer_id).await {
                Ok(new_state) => {
                    if new_state != transfer.state {
                        info!(
                            transfer_id = %transfer.transfer_id,
                            old_state = %transfer.state,
                            new_state = %new_state,
                            "Transfer state advanced"
                        );
                        recovered += 1;
                    }
                }
                Err(e) => {
                    error!(
                        transfer_id = %transfer.transfer_id,
                        error = %e,
                        "Failed to recover transfer"
                    );
                }
            }
        }

        if recovered > 0 {
            info!(count = recovered, "Recovered transfers this scan");
        }

        Ok(recovered)
    }
}
