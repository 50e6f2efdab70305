//! Polling of the multisig relay until a submitted transaction reaches a
//! terminal relay status.
//!
//! The loop is an explicit scheduled retry with a fixed interval and a
//! bounded attempt budget; exhausting the budget surfaces as a distinct,
//! re-enterable error instead of stalling silently.

use {
    crate::{
        error::CreationError,
        interfaces::{RelayClient, RelayStatus},
    },
    ethereum_types::H256,
    std::{sync::Arc, time::Duration},
    tokio::task::JoinHandle,
};

/// Retry schedule of the relay poll.
#[derive(Clone, Copy, Debug)]
pub struct PollSchedule {
    pub interval: Duration,
    /// `None` polls until the relay goes terminal.
    pub max_attempts: Option<u32>,
}

impl Default for PollSchedule {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3),
            // 30 minutes at the default interval.
            max_attempts: Some(600),
        }
    }
}

/// Polls the relay for the execution of a safe transaction.
#[derive(Clone)]
pub struct RelayPoller {
    relay: Arc<dyn RelayClient>,
    schedule: PollSchedule,
}

impl RelayPoller {
    pub fn new(relay: Arc<dyn RelayClient>, schedule: PollSchedule) -> Self {
        Self { relay, schedule }
    }

    /// Polls until the relay reports the transaction executed, failed or
    /// cancelled. Transient status-query errors count against the attempt
    /// budget and are retried.
    pub async fn wait_for_execution(&self, safe_hash: H256) -> Result<H256, CreationError> {
        let mut attempts: u32 = 0;
        loop {
            match self.relay.status(safe_hash).await {
                Ok(RelayStatus::Executed { tx_hash }) => {
                    tracing::info!(?safe_hash, ?tx_hash, "relay executed safe transaction");
                    return Ok(tx_hash);
                }
                Ok(RelayStatus::Failed) => return Err(CreationError::RelayFailed(safe_hash)),
                Ok(RelayStatus::Cancelled) => return Err(CreationError::RelayCancelled(safe_hash)),
                Ok(RelayStatus::Pending) => {
                    tracing::debug!(?safe_hash, attempts, "safe transaction still pending");
                }
                Err(err) => {
                    tracing::warn!(?safe_hash, ?err, "relay status query failed; will retry");
                }
            }
            attempts += 1;
            if let Some(max_attempts) = self.schedule.max_attempts {
                if attempts >= max_attempts {
                    return Err(CreationError::RelayTimedOut(safe_hash));
                }
            }
            tokio::time::sleep(self.schedule.interval).await;
        }
    }

    /// Runs the poll on a background task, returning a cancellable handle.
    pub fn spawn_wait(&self, safe_hash: H256) -> PollHandle {
        let poller = self.clone();
        PollHandle {
            safe_hash,
            task: tokio::spawn(async move { poller.wait_for_execution(safe_hash).await }),
        }
    }
}

/// Handle of a background relay poll. Dropping the handle detaches the
/// poll; [`PollHandle::cancel`] aborts it.
pub struct PollHandle {
    safe_hash: H256,
    task: JoinHandle<Result<H256, CreationError>>,
}

impl PollHandle {
    pub fn cancel(&self) {
        self.task.abort();
    }

    /// Waits for the poll's outcome; a cancelled poll reports as such.
    pub async fn wait(self) -> Result<H256, CreationError> {
        match self.task.await {
            Ok(result) => result,
            Err(_) => Err(CreationError::RelayCancelled(self.safe_hash)),
        }
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::interfaces::MockRelayClient,
        std::sync::atomic::{AtomicU32, Ordering},
    };

    fn hash(byte: u8) -> H256 {
        H256::repeat_byte(byte)
    }

    fn schedule(max_attempts: Option<u32>) -> PollSchedule {
        PollSchedule {
            interval: Duration::from_secs(3),
            max_attempts,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn resolves_after_pending_polls() {
        let mut relay = MockRelayClient::new();
        let polls = Arc::new(AtomicU32::new(0));
        let counter = polls.clone();
        relay.expect_status().returning(move |_| {
            Ok(match counter.fetch_add(1, Ordering::SeqCst) {
                0 | 1 => RelayStatus::Pending,
                _ => RelayStatus::Executed { tx_hash: hash(9) },
            })
        });

        let poller = RelayPoller::new(Arc::new(relay), schedule(None));
        let tx_hash = poller.wait_for_execution(hash(1)).await.unwrap();
        assert_eq!(tx_hash, hash(9));
        assert_eq!(polls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_relay_is_terminal() {
        let mut relay = MockRelayClient::new();
        relay
            .expect_status()
            .returning(|_| Ok(RelayStatus::Failed));
        let poller = RelayPoller::new(Arc::new(relay), schedule(None));
        assert!(matches!(
            poller.wait_for_execution(hash(1)).await,
            Err(CreationError::RelayFailed(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_relay_is_terminal() {
        let mut relay = MockRelayClient::new();
        relay
            .expect_status()
            .returning(|_| Ok(RelayStatus::Cancelled));
        let poller = RelayPoller::new(Arc::new(relay), schedule(None));
        assert!(matches!(
            poller.wait_for_execution(hash(1)).await,
            Err(CreationError::RelayCancelled(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_attempt_budget_times_out() {
        let mut relay = MockRelayClient::new();
        relay
            .expect_status()
            .times(5)
            .returning(|_| Ok(RelayStatus::Pending));
        let poller = RelayPoller::new(Arc::new(relay), schedule(Some(5)));
        assert!(matches!(
            poller.wait_for_execution(hash(1)).await,
            Err(CreationError::RelayTimedOut(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn transient_query_errors_are_retried() {
        let mut relay = MockRelayClient::new();
        let polls = Arc::new(AtomicU32::new(0));
        let counter = polls.clone();
        relay.expect_status().returning(move |_| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(anyhow::anyhow!("relay unreachable"))
            } else {
                Ok(RelayStatus::Executed { tx_hash: hash(9) })
            }
        });
        let poller = RelayPoller::new(Arc::new(relay), schedule(None));
        assert_eq!(poller.wait_for_execution(hash(1)).await.unwrap(), hash(9));
    }

    #[tokio::test(start_paused = true)]
    async fn cancelling_a_spawned_poll_reports_cancellation() {
        let mut relay = MockRelayClient::new();
        relay
            .expect_status()
            .returning(|_| Ok(RelayStatus::Pending));
        let poller = RelayPoller::new(Arc::new(relay), schedule(None));
        let handle = poller.spawn_wait(hash(1));
        handle.cancel();
        assert!(matches!(
            handle.wait().await,
            Err(CreationError::RelayCancelled(_))
        ));
    }
}
