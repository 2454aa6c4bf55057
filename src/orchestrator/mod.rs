//! Approval orchestrator.
//!
//! Sits between untrusted pages and the user. Every page request is checked
//! against the permission ledger, and anything that needs consent becomes a
//! pending approval the user resolves (or that times out). The orchestrator
//! is the only writer of the account store and the permission ledger; each
//! touches them in short synchronous sections and never across an await.

pub mod autolock;
pub mod cancel;
pub mod events;
pub mod messages;
pub mod pending;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::account::ledger::{auto_receive_pending, send_banano};
use crate::account::{AccountStore, AccountSummary, ReceiveReceipt, SendReceipt};
use crate::amount::raw_to_display;
use crate::block::StateBlock;
use crate::bns::BnsResolver;
use crate::client::RpcClient;
use crate::config::WalletConfig;
use crate::encoding::address_to_public_key_hex;
use crate::error::{Result, WalletError};
use crate::permissions::{OriginPermission, PermissionLedger};
use crate::storage::KeyValueStore;

pub use autolock::AutoLock;
pub use cancel::CancelToken;
pub use events::{EventBus, EventScope, ProviderEvent, ScopedEvent};
pub use messages::{parse_envelope, ProviderRequest, ProviderResponse, RequestEnvelope, ResponseEnvelope};
pub use pending::{ApprovalDecision, ApprovalKind, PendingApprovalRequest, PendingApprovals};

pub const SETTINGS_KEY: &str = "settings";
const EVENT_CAPACITY: usize = 64;

/// Poisoning only means another section panicked mid-update; the data is
/// still the last consistent write.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub kdf_iterations: u32,
    pub unlocked_timeout: Duration,
    pub locked_timeout: Duration,
    pub auto_lock_minutes: u64,
    pub default_representative: Option<String>,
    /// Pending blocks received per `receive_pending` call.
    pub receive_batch: u32,
}

impl From<&WalletConfig> for OrchestratorConfig {
    fn from(config: &WalletConfig) -> Self {
        Self {
            kdf_iterations: config.wallet.kdf_iterations,
            unlocked_timeout: Duration::from_secs(config.approvals.unlocked_timeout_secs),
            locked_timeout: Duration::from_secs(config.approvals.locked_timeout_secs),
            auto_lock_minutes: config.wallet.auto_lock_minutes,
            default_representative: config.wallet.default_representative.clone(),
            receive_batch: 20,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
struct WalletSettings {
    auto_lock_minutes: u64,
}

/// Outcome of an approved (or refused) send, queryable by request id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum TransactionResult {
    Pending,
    Submitted { hash: String, balance: String },
    Failed { error: String },
    Rejected,
    TimedOut,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConnectResult {
    pub public_key: String,
    pub accounts: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SignedMessage {
    pub account: String,
    pub public_key: String,
    pub signature: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BalanceView {
    pub address: String,
    pub balance: String,
    pub pending: String,
    pub display: String,
}

fn locked_as_authorization(err: WalletError) -> WalletError {
    match err {
        WalletError::Locked => WalletError::Authorization("wallet is locked".to_string()),
        other => other,
    }
}

fn connect_result(permission: &OriginPermission) -> Result<ConnectResult> {
    let primary = permission
        .default_account()
        .ok_or_else(|| WalletError::Authorization("permission has no accounts".to_string()))?;
    Ok(ConnectResult {
        public_key: address_to_public_key_hex(primary)?,
        accounts: permission.approved_accounts.clone(),
    })
}

pub struct ApprovalOrchestrator {
    store: Arc<Mutex<AccountStore>>,
    permissions: Mutex<PermissionLedger>,
    pending: PendingApprovals,
    results: Mutex<HashMap<String, TransactionResult>>,
    events: EventBus,
    rpc: Arc<RpcClient>,
    bns: BnsResolver,
    storage: Arc<dyn KeyValueStore>,
    autolock: AutoLock,
    shutdown: CancelToken,
    config: OrchestratorConfig,
}

impl ApprovalOrchestrator {
    pub fn new(
        storage: Arc<dyn KeyValueStore>,
        rpc: Arc<RpcClient>,
        bns: BnsResolver,
        config: OrchestratorConfig,
    ) -> Result<Self> {
        let store = AccountStore::open(storage.clone(), config.kdf_iterations)?;
        let permissions = PermissionLedger::open(storage.clone())?;
        let auto_lock_minutes = storage
            .get::<WalletSettings>(SETTINGS_KEY)?
            .map(|s| s.auto_lock_minutes)
            .unwrap_or(config.auto_lock_minutes);
        Ok(Self {
            store: Arc::new(Mutex::new(store)),
            permissions: Mutex::new(permissions),
            pending: PendingApprovals::new(),
            results: Mutex::new(HashMap::new()),
            events: EventBus::new(EVENT_CAPACITY),
            rpc,
            bns,
            storage,
            autolock: AutoLock::new(auto_lock_minutes),
            shutdown: CancelToken::new(),
            config,
        })
    }

    /// Start the inactivity timer. On expiry the store is locked and, if it
    /// was unlocked, a disconnect goes to every tab regardless of origin.
    pub fn spawn_auto_lock(&self) -> JoinHandle<()> {
        let store = self.store.clone();
        let events = self.events.clone();
        self.autolock.spawn(self.shutdown.clone(), move || {
            if lock(&store).lock() {
                info!("Auto-lock after inactivity");
                events.emit(EventScope::Global, ProviderEvent::Disconnect);
            }
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ScopedEvent> {
        self.events.subscribe()
    }

    fn touch(&self) {
        self.autolock.touch();
    }

    fn store(&self) -> MutexGuard<'_, AccountStore> {
        lock(&self.store)
    }

    fn approval_timeout(&self) -> Duration {
        if self.store().is_unlocked() {
            self.config.unlocked_timeout
        } else {
            self.config.locked_timeout
        }
    }

    fn require_initialized(&self) -> Result<()> {
        if self.store().is_initialized() {
            Ok(())
        } else {
            Err(WalletError::Authorization("wallet not initialized".to_string()))
        }
    }

    /// Resolve which account `origin` is acting for and check it holds a
    /// grant for it. Records the use on success.
    fn authorize(&self, origin: &str, account: Option<&str>) -> Result<String> {
        self.require_initialized()?;
        let mut permissions = lock(&self.permissions);
        let permission = permissions
            .get(origin)
            .ok_or_else(|| WalletError::Authorization(format!("{} is not connected", origin)))?;
        let account = match account {
            Some(a) => a.to_string(),
            None => permission
                .default_account()
                .ok_or_else(|| WalletError::Authorization("no approved account".to_string()))?
                .to_string(),
        };
        if !permission.includes(&account) {
            return Err(WalletError::Authorization(format!(
                "account {} is not authorized for {}",
                account, origin
            )));
        }
        permissions.touch(origin)?;
        Ok(account)
    }

    async fn request_approval(&self, origin: &str, kind: ApprovalKind, data: Value) -> Result<ApprovalDecision> {
        let timeout = self.approval_timeout();
        let (request, receiver) = self.pending.register(origin, kind, data);
        self.pending.wait(&request.id, receiver, timeout, &self.shutdown).await
    }

    // ---- page-facing operations ----

    pub async fn connect(&self, origin: &str, only_if_trusted: bool) -> Result<ConnectResult> {
        self.touch();
        let existing = lock(&self.permissions).touch(origin)?;
        if let Some(permission) = existing {
            return connect_result(&permission);
        }
        if only_if_trusted {
            return Err(WalletError::Authorization(format!("{} is not connected", origin)));
        }
        self.require_initialized()?;

        let data = json!({ "origin": origin, "accounts": self.store().account_addresses() });
        let decision = self.request_approval(origin, ApprovalKind::Connect, data).await?;
        let selected = match decision {
            ApprovalDecision::Rejected => return Err(WalletError::UserRejected),
            ApprovalDecision::Approved { accounts } => accounts,
        };

        let accounts = {
            let store = self.store();
            let accounts = match selected {
                Some(accounts) if !accounts.is_empty() => accounts,
                _ => store.primary_address().map(|a| vec![a.to_string()]).unwrap_or_default(),
            };
            if let Some(unknown) = accounts.iter().find(|a| !store.contains_address(a)) {
                return Err(WalletError::Validation(format!("unknown account {}", unknown)));
            }
            accounts
        };
        let permission = lock(&self.permissions).grant(origin, accounts)?;
        let result = connect_result(&permission)?;
        self.events.emit(
            EventScope::Origin(origin.to_string()),
            ProviderEvent::Connect {
                public_key: result.public_key.clone(),
                accounts: result.accounts.clone(),
            },
        );
        Ok(result)
    }

    /// Page-initiated disconnect; same as the user revoking the origin.
    pub fn disconnect(&self, origin: &str) -> Result<bool> {
        self.touch();
        self.revoke(origin)
    }

    pub fn get_accounts(&self, origin: &str) -> Result<Vec<String>> {
        self.touch();
        Ok(lock(&self.permissions)
            .touch(origin)?
            .map(|p| p.approved_accounts)
            .unwrap_or_default())
    }

    pub async fn get_balance(&self, origin: &str, address: Option<&str>) -> Result<BalanceView> {
        self.touch();
        let address = self.authorize(origin, address)?;
        let balances = self
            .rpc
            .get_accounts_balances(std::slice::from_ref(&address))
            .await
            .into_result()?;
        let entry = balances
            .get(&address)
            .ok_or_else(|| WalletError::Protocol(format!("no balance returned for {}", address)))?;
        {
            let mut store = self.store();
            if store.is_unlocked() {
                store.set_balance(&address, &entry.balance)?;
            }
        }
        Ok(BalanceView {
            display: raw_to_display(&entry.balance)?,
            address,
            balance: entry.balance.clone(),
            pending: entry.pending.clone(),
        })
    }

    pub async fn sign_message(&self, origin: &str, message: &str, account: Option<&str>) -> Result<SignedMessage> {
        self.touch();
        let address = self.authorize(origin, account)?;
        let data = json!({ "account": address, "message": message });
        match self.request_approval(origin, ApprovalKind::SignMessage, data).await? {
            ApprovalDecision::Rejected => Err(WalletError::UserRejected),
            ApprovalDecision::Approved { .. } => {
                let store = self.store();
                let signature = store
                    .sign_message(&address, message, origin)
                    .map_err(locked_as_authorization)?;
                let public_key = store.account(&address).map_err(locked_as_authorization)?.public_key.clone();
                Ok(SignedMessage {
                    account: address,
                    public_key,
                    signature,
                })
            }
        }
    }

    pub async fn sign_block(&self, origin: &str, block: StateBlock, account: Option<&str>) -> Result<StateBlock> {
        self.touch();
        let address = self.authorize(origin, Some(account.unwrap_or(&block.account)))?;
        if address != block.account {
            return Err(WalletError::Validation("block account does not match account".to_string()));
        }
        let data = json!({ "account": address, "hash": block.hash_hex()?, "block": block });
        match self.request_approval(origin, ApprovalKind::SignBlock, data).await? {
            ApprovalDecision::Rejected => Err(WalletError::UserRejected),
            ApprovalDecision::Approved { .. } => self.store().sign_block(&block).map_err(locked_as_authorization),
        }
    }

    pub async fn send_transaction(
        &self,
        origin: &str,
        to: &str,
        amount_raw: &str,
        account: Option<&str>,
    ) -> Result<SendReceipt> {
        self.touch();
        let address = self.authorize(origin, account)?;
        let timeout = self.approval_timeout();
        let data = json!({
            "account": address,
            "to": to,
            "amount": amount_raw,
            "display": raw_to_display(amount_raw)?,
        });
        let (request, receiver) = self.pending.register(origin, ApprovalKind::SendTransaction, data);
        self.record_result(&request.id, TransactionResult::Pending);

        let decision = match self.pending.wait(&request.id, receiver, timeout, &self.shutdown).await {
            Ok(decision) => decision,
            Err(e) => {
                let outcome = match e {
                    WalletError::ApprovalTimeout => TransactionResult::TimedOut,
                    ref other => TransactionResult::Failed { error: other.to_string() },
                };
                self.record_result(&request.id, outcome);
                return Err(e);
            }
        };
        if decision == ApprovalDecision::Rejected {
            self.record_result(&request.id, TransactionResult::Rejected);
            return Err(WalletError::UserRejected);
        }

        let outcome = self.submit_send(&address, to, amount_raw).await;
        match &outcome {
            Ok(receipt) => self.record_result(
                &request.id,
                TransactionResult::Submitted {
                    hash: receipt.hash.clone(),
                    balance: receipt.balance.clone(),
                },
            ),
            Err(e) => self.record_result(&request.id, TransactionResult::Failed { error: e.to_string() }),
        }
        outcome
    }

    async fn submit_send(&self, address: &str, to: &str, amount_raw: &str) -> Result<SendReceipt> {
        let signer = self.store().account(address).map_err(locked_as_authorization)?.clone();
        let receipt = send_banano(&self.rpc, &signer, to, amount_raw).await?;
        if let Err(e) = self.store().set_balance(address, &receipt.balance) {
            warn!("Could not record balance for {}: {}", address, e);
        }
        Ok(receipt)
    }

    fn record_result(&self, id: &str, result: TransactionResult) {
        lock(&self.results).insert(id.to_string(), result);
    }

    pub async fn resolve_bns(&self, name: &str) -> Result<String> {
        self.touch();
        self.bns.resolve(name).await
    }

    pub async fn reverse_resolve_bns(&self, address: &str) -> Result<Vec<String>> {
        self.touch();
        self.bns.reverse_resolve(address).await
    }

    /// Dispatch one page message sent from `origin`. Messages that are not
    /// addressed to the wallet get no reply.
    pub async fn handle_message(&self, origin: &str, raw: &Value) -> Option<ResponseEnvelope> {
        let envelope = match parse_envelope(raw) {
            Ok(Some(envelope)) => envelope,
            Ok(None) => return None,
            Err((id, e)) => return Some(ResponseEnvelope::new(id, ProviderResponse::err(&e))),
        };
        let result = self.dispatch(origin, envelope.request).await;
        if let Err(e) = &result {
            info!("{} request {} failed: {}", origin, envelope.id, e);
        }
        Some(ResponseEnvelope::new(envelope.id, result.into()))
    }

    async fn dispatch(&self, origin: &str, request: ProviderRequest) -> Result<Value> {
        match request {
            ProviderRequest::Connect { only_if_trusted } => {
                Ok(serde_json::to_value(self.connect(origin, only_if_trusted).await?)?)
            }
            ProviderRequest::Disconnect => {
                self.disconnect(origin)?;
                Ok(Value::Null)
            }
            ProviderRequest::GetAccounts => Ok(json!(self.get_accounts(origin)?)),
            ProviderRequest::GetBalance { address } => {
                Ok(serde_json::to_value(self.get_balance(origin, address.as_deref()).await?)?)
            }
            ProviderRequest::SignMessage { message, account } => Ok(serde_json::to_value(
                self.sign_message(origin, &message, account.as_deref()).await?,
            )?),
            ProviderRequest::SignBlock { block, account } => {
                Ok(serde_json::to_value(self.sign_block(origin, block, account.as_deref()).await?)?)
            }
            ProviderRequest::SendTransaction { to, amount, account } => Ok(serde_json::to_value(
                self.send_transaction(origin, &to, &amount, account.as_deref()).await?,
            )?),
            ProviderRequest::ResolveBns { name } => Ok(json!({ "address": self.resolve_bns(&name).await? })),
            ProviderRequest::ReverseResolveBns { address } => {
                Ok(json!({ "names": self.reverse_resolve_bns(&address).await? }))
            }
        }
    }

    // ---- approval UI ----

    pub fn get_pending_approval(&self) -> Option<PendingApprovalRequest> {
        self.pending.latest()
    }

    pub fn approve(&self, request_id: &str, accounts: Option<Vec<String>>) -> Result<()> {
        self.touch();
        self.pending.resolve(request_id, ApprovalDecision::Approved { accounts })
    }

    pub fn reject(&self, request_id: &str) -> Result<()> {
        self.touch();
        self.pending.resolve(request_id, ApprovalDecision::Rejected)
    }

    pub fn get_transaction_result(&self, request_id: &str) -> Option<TransactionResult> {
        lock(&self.results).get(request_id).cloned()
    }

    // ---- wallet-side operations ----

    pub fn is_initialized(&self) -> bool {
        self.store().is_initialized()
    }

    pub fn is_unlocked(&self) -> bool {
        self.store().is_unlocked()
    }

    pub fn create_wallet(&self, password: &str) -> Result<String> {
        self.touch();
        self.store().create_wallet(password)
    }

    pub fn import_wallet(&self, mnemonic: &str, password: &str) -> Result<AccountSummary> {
        self.touch();
        self.store().import_wallet(mnemonic, password)
    }

    pub fn import_seed(&self, seed_hex: &str, password: &str) -> Result<AccountSummary> {
        self.touch();
        self.store().import_seed(seed_hex, password)
    }

    pub fn unlock(&self, password: &str) -> Result<()> {
        self.touch();
        self.store().unlock(password)
    }

    pub fn lock(&self) -> bool {
        self.store().lock()
    }

    pub fn accounts(&self) -> Result<Vec<AccountSummary>> {
        self.touch();
        self.store().accounts()
    }

    pub fn add_account(&self, password: &str) -> Result<AccountSummary> {
        self.touch();
        self.store().add_account(password)
    }

    /// Remove an account and withdraw it from every origin's grant. Origins
    /// left with nothing are disconnected; origins whose default account
    /// changed are told so.
    pub fn remove_account(&self, index: u32, password: &str) -> Result<AccountSummary> {
        self.touch();
        let removed = self.store().remove_account(index, password)?;
        let mut permissions = lock(&self.permissions);
        let defaults_before: Vec<(String, Option<String>)> = permissions
            .list()
            .into_iter()
            .map(|p| (p.origin.clone(), p.default_account().map(str::to_string)))
            .collect();
        let emptied = permissions.remove_account_everywhere(&removed.address)?;
        for origin in emptied {
            self.events.emit(EventScope::Origin(origin), ProviderEvent::Disconnect);
        }
        for (origin, before) in defaults_before {
            let Some(permission) = permissions.get(&origin) else { continue };
            let Some(now) = permission.default_account() else { continue };
            if before.as_deref() != Some(now) {
                self.events.emit(
                    EventScope::Origin(origin.clone()),
                    ProviderEvent::AccountChanged {
                        public_key: address_to_public_key_hex(now)?,
                    },
                );
            }
        }
        Ok(removed)
    }

    pub fn rename_account(&self, index: u32, name: &str, password: &str) -> Result<()> {
        self.touch();
        self.store().rename_account(index, name, password)
    }

    pub fn export_mnemonic(&self, password: &str) -> Result<String> {
        self.touch();
        self.store().export_mnemonic(password)
    }

    pub fn change_password(&self, old_password: &str, new_password: &str) -> Result<()> {
        self.touch();
        self.store().change_password(old_password, new_password)
    }

    /// Fetch balances for every account and record them locally.
    pub async fn refresh_balances(&self) -> Result<Vec<AccountSummary>> {
        self.touch();
        let addresses = {
            let store = self.store();
            store.accounts()?.into_iter().map(|a| a.address).collect::<Vec<_>>()
        };
        let balances = self.rpc.get_accounts_balances(&addresses).await.into_result()?;
        let mut store = self.store();
        for (address, balance) in &balances {
            if store.contains_address(address) {
                store.set_balance(address, &balance.balance)?;
            }
        }
        store.accounts()
    }

    pub async fn receive_pending(&self, address: &str) -> Result<ReceiveReceipt> {
        self.touch();
        let account = self.store().account(address)?.clone();
        let receipt = auto_receive_pending(
            &self.rpc,
            &account,
            self.config.default_representative.as_deref(),
            self.config.receive_batch,
        )
        .await?;
        if let Err(e) = self.store().set_balance(address, &receipt.balance) {
            warn!("Could not record balance for {}: {}", address, e);
        }
        Ok(receipt)
    }

    pub fn list_permissions(&self) -> Vec<OriginPermission> {
        lock(&self.permissions).list()
    }

    /// User-initiated revoke: drop the grant and tell that origin's tabs.
    pub fn revoke(&self, origin: &str) -> Result<bool> {
        let existed = lock(&self.permissions).revoke(origin)?;
        if existed {
            self.events.emit(EventScope::Origin(origin.to_string()), ProviderEvent::Disconnect);
        }
        Ok(existed)
    }

    pub fn auto_lock_minutes(&self) -> u64 {
        self.autolock.minutes()
    }

    pub fn set_auto_lock_minutes(&self, minutes: u64) -> Result<()> {
        if minutes < autolock::MIN_AUTO_LOCK_MINUTES {
            return Err(WalletError::Validation(format!(
                "auto-lock must be at least {} minute",
                autolock::MIN_AUTO_LOCK_MINUTES
            )));
        }
        self.storage.put(SETTINGS_KEY, &WalletSettings { auto_lock_minutes: minutes })?;
        self.autolock.set_minutes(minutes);
        self.touch();
        info!("Auto-lock set to {} minute(s)", minutes);
        Ok(())
    }

    /// Cancel every outstanding approval and stop background tasks. Waiting
    /// requests fail as provider-disconnected.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
        self.pending.cancel_all();
    }
}
