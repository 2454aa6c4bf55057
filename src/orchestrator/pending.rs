use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::cancel::CancelToken;
use super::lock;
use crate::error::{Result, WalletError};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ApprovalKind {
    Connect,
    SignMessage,
    SignBlock,
    SendTransaction,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PendingApprovalRequest {
    pub id: String,
    pub origin: String,
    #[serde(rename = "type")]
    pub kind: ApprovalKind,
    /// Payload shown to the user.
    pub data: Value,
    /// Unix millis.
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ApprovalDecision {
    /// `accounts` is only meaningful for connect requests.
    Approved { accounts: Option<Vec<String>> },
    Rejected,
}

struct PendingEntry {
    request: PendingApprovalRequest,
    responder: oneshot::Sender<ApprovalDecision>,
    seq: u64,
}

/// Withdraws a request if its waiter goes away before a terminal transition.
struct WaitGuard<'a> {
    pending: &'a PendingApprovals,
    id: &'a str,
}

impl Drop for WaitGuard<'_> {
    fn drop(&mut self) {
        if self.pending.take(self.id) {
            debug!("Approval {} abandoned by its caller", self.id);
        }
    }
}

/// Outstanding approvals keyed by id. Removing an entry is the one and only
/// terminal transition for a request, whoever does it.
#[derive(Default)]
pub struct PendingApprovals {
    entries: Mutex<HashMap<String, PendingEntry>>,
    seq: AtomicU64,
}

impl PendingApprovals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &self,
        origin: &str,
        kind: ApprovalKind,
        data: Value,
    ) -> (PendingApprovalRequest, oneshot::Receiver<ApprovalDecision>) {
        let (responder, receiver) = oneshot::channel();
        let request = PendingApprovalRequest {
            id: Uuid::new_v4().to_string(),
            origin: origin.to_string(),
            kind,
            data,
            created_at: chrono::Utc::now().timestamp_millis(),
        };
        let seq = self.seq.fetch_add(1, Ordering::SeqCst);
        lock(&self.entries).insert(
            request.id.clone(),
            PendingEntry {
                request: request.clone(),
                responder,
                seq,
            },
        );
        info!("Approval {} ({:?}) requested by {}", request.id, kind, origin);
        (request, receiver)
    }

    /// The most recently created request still outstanding.
    pub fn latest(&self) -> Option<PendingApprovalRequest> {
        lock(&self.entries)
            .values()
            .max_by_key(|e| e.seq)
            .map(|e| e.request.clone())
    }

    pub fn contains(&self, id: &str) -> bool {
        lock(&self.entries).contains_key(id)
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deliver the user's decision. A second call for the same id fails.
    pub fn resolve(&self, id: &str, decision: ApprovalDecision) -> Result<()> {
        let entry = lock(&self.entries).remove(id).ok_or(WalletError::RequestNotFound)?;
        info!("Approval {} resolved: {:?}", id, decision);
        // the waiter may already be gone; the decision is still final
        let _ = entry.responder.send(decision);
        Ok(())
    }

    fn take(&self, id: &str) -> bool {
        lock(&self.entries).remove(id).is_some()
    }

    /// Drop every outstanding request; their waiters observe cancellation.
    pub fn cancel_all(&self) -> usize {
        let drained: Vec<_> = lock(&self.entries).drain().collect();
        if !drained.is_empty() {
            warn!("Cancelled {} pending approval(s)", drained.len());
        }
        drained.len()
    }

    /// Wait for the decision on `id`, its timeout, or cancellation, whichever
    /// comes first. A timeout or cancel only counts if it removes the entry;
    /// otherwise a decision already won and is read from the channel.
    /// Dropping the returned future withdraws the request.
    pub async fn wait(
        &self,
        id: &str,
        mut receiver: oneshot::Receiver<ApprovalDecision>,
        timeout: Duration,
        cancel: &CancelToken,
    ) -> Result<ApprovalDecision> {
        let _guard = WaitGuard { pending: self, id };
        tokio::select! {
            decision = &mut receiver => decision.map_err(|_| WalletError::Cancelled),
            _ = tokio::time::sleep(timeout) => {
                if self.take(id) {
                    warn!("Approval {} timed out after {:?}", id, timeout);
                    Err(WalletError::ApprovalTimeout)
                } else {
                    receiver.await.map_err(|_| WalletError::Cancelled)
                }
            }
            _ = cancel.cancelled() => {
                if self.take(id) {
                    Err(WalletError::Cancelled)
                } else {
                    receiver.await.map_err(|_| WalletError::Cancelled)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_decision_is_delivered_once() {
        let pending = PendingApprovals::new();
        let (request, rx) = pending.register("https://a.example", ApprovalKind::Connect, json!({}));
        pending.resolve(&request.id, ApprovalDecision::Rejected).unwrap();
        assert_eq!(
            pending.resolve(&request.id, ApprovalDecision::Rejected).unwrap_err(),
            WalletError::RequestNotFound
        );

        let decision = pending
            .wait(&request.id, rx, Duration::from_secs(300), &CancelToken::new())
            .await
            .unwrap();
        assert_eq!(decision, ApprovalDecision::Rejected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_fires_once_and_leaves_nothing() {
        let pending = PendingApprovals::new();
        let (request, rx) = pending.register("https://a.example", ApprovalKind::SignMessage, json!({}));

        let result = pending
            .wait(&request.id, rx, Duration::from_secs(300), &CancelToken::new())
            .await;
        assert_eq!(result.unwrap_err(), WalletError::ApprovalTimeout);
        assert!(pending.is_empty());
        assert_eq!(
            pending
                .resolve(&request.id, ApprovalDecision::Approved { accounts: None })
                .unwrap_err(),
            WalletError::RequestNotFound
        );
    }

    #[tokio::test]
    async fn test_latest_is_most_recent() {
        let pending = PendingApprovals::new();
        let (first, _rx1) = pending.register("https://a.example", ApprovalKind::Connect, json!({}));
        let (second, _rx2) = pending.register("https://b.example", ApprovalKind::Connect, json!({}));
        assert_ne!(first.id, second.id);
        assert_eq!(pending.latest().unwrap().id, second.id);

        pending.resolve(&second.id, ApprovalDecision::Rejected).unwrap();
        assert_eq!(pending.latest().unwrap().id, first.id);
    }

    #[tokio::test]
    async fn test_cancel_all_releases_waiters() {
        let pending = PendingApprovals::new();
        let (request, rx) = pending.register("https://a.example", ApprovalKind::Connect, json!({}));
        assert_eq!(pending.cancel_all(), 1);
        let result = pending
            .wait(&request.id, rx, Duration::from_secs(300), &CancelToken::new())
            .await;
        assert_eq!(result.unwrap_err(), WalletError::Cancelled);
    }

    #[tokio::test]
    async fn test_dropped_waiter_withdraws_request() {
        let pending = Arc::new(PendingApprovals::new());
        let (request, rx) = pending.register("https://a.example", ApprovalKind::SignMessage, json!({}));
        let (started_tx, started_rx) = oneshot::channel();
        let task = {
            let pending = pending.clone();
            let id = request.id.clone();
            tokio::spawn(async move {
                let _ = started_tx.send(());
                pending
                    .wait(&id, rx, Duration::from_secs(300), &CancelToken::new())
                    .await
            })
        };
        started_rx.await.unwrap();
        task.abort();
        assert!(task.await.unwrap_err().is_cancelled());

        assert!(pending.latest().is_none());
        assert_eq!(
            pending.resolve(&request.id, ApprovalDecision::Rejected).unwrap_err(),
            WalletError::RequestNotFound
        );
    }

    #[tokio::test]
    async fn test_cancel_token_ends_wait() {
        let pending = PendingApprovals::new();
        let token = CancelToken::new();
        let (request, rx) = pending.register("https://a.example", ApprovalKind::Connect, json!({}));
        token.cancel();
        let result = pending.wait(&request.id, rx, Duration::from_secs(300), &token).await;
        assert_eq!(result.unwrap_err(), WalletError::Cancelled);
        assert!(!pending.contains(&request.id));
    }
}
