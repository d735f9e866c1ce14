//! Polling for manual payment approval with a bounded, backing-off budget.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::domain::GlorySettings;
use crate::error::RemoteError;

/// What the payment backend currently says about an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApprovalState {
    Pending,
    Approved,
    Rejected(String),
}

#[async_trait]
pub trait PaymentStatusSource: Send + Sync {
    async fn approval_state(&self, order_id: &str) -> Result<ApprovalState, RemoteError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApprovalStatus {
    Pending { attempt: u32 },
    Approved,
    Rejected(String),
    TimedOut,
    Cancelled,
}

impl ApprovalStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ApprovalStatus::Pending { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApprovalPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for ApprovalPolicy {
    fn default() -> Self {
        Self {
            max_attempts: glory_config::APPROVAL_MAX_ATTEMPTS,
            initial_delay: Duration::from_millis(glory_config::APPROVAL_INITIAL_DELAY_MS),
            max_delay: Duration::from_millis(glory_config::APPROVAL_MAX_DELAY_MS),
        }
    }
}

impl ApprovalPolicy {
    /// Delay before poll number `attempt` (0-based): doubles each time, capped.
    pub fn delay_before(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.initial_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

pub struct ApprovalPoller {
    source: Arc<dyn PaymentStatusSource>,
    policy: ApprovalPolicy,
}

impl ApprovalPoller {
    pub fn new(source: Arc<dyn PaymentStatusSource>, policy: ApprovalPolicy) -> Self {
        Self { source, policy }
    }

    pub fn from_settings(source: Arc<dyn PaymentStatusSource>, settings: &GlorySettings) -> Self {
        Self::new(source, settings.approval_policy())
    }

    pub fn start(&self, order_id: impl Into<String>) -> PendingApproval {
        let order_id = order_id.into();
        let (tx, rx) = watch::channel(ApprovalStatus::Pending { attempt: 0 });
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let source = self.source.clone();
        let policy = self.policy;

        let task = tokio::spawn(async move {
            let fin = poll(source, policy, &order_id, &tx, &token).await;
            info!("payment approval for order {}: {:?}", order_id, fin);
            tx.send_replace(fin);
        });

        PendingApproval {
            status: rx,
            cancel,
            task: Some(task),
        }
    }
}

async fn poll(
    source: Arc<dyn PaymentStatusSource>,
    policy: ApprovalPolicy,
    order_id: &str,
    tx: &watch::Sender<ApprovalStatus>,
    token: &CancellationToken,
) -> ApprovalStatus {
    for attempt in 0..policy.max_attempts {
        tokio::select! {
            _ = token.cancelled() => return ApprovalStatus::Cancelled,
            _ = tokio::time::sleep(policy.delay_before(attempt)) => {}
        }
        tx.send_replace(ApprovalStatus::Pending {
            attempt: attempt + 1,
        });
        match source.approval_state(order_id).await {
            Ok(ApprovalState::Approved) => return ApprovalStatus::Approved,
            Ok(ApprovalState::Rejected(reason)) => return ApprovalStatus::Rejected(reason),
            Ok(ApprovalState::Pending) => debug!("order {} still pending", order_id),
            Err(e) => warn!("approval poll for order {} failed: {}", order_id, e),
        }
    }
    ApprovalStatus::TimedOut
}

/// A running approval poll. Dropping it cancels the poll.
pub struct PendingApproval {
    status: watch::Receiver<ApprovalStatus>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl PendingApproval {
    pub fn status(&self) -> ApprovalStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ApprovalStatus> {
        self.status.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for a terminal status.
    pub async fn wait(mut self) -> ApprovalStatus {
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
        self.status.borrow().clone()
    }
}

impl Drop for PendingApproval {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
