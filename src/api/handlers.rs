//! REST API handlers for ledger operations

use crate::api::websocket::{WsBroadcaster, WsEvent};
use crate::core::{Account, ErrorKind, LedgerError, Transaction};
use crate::dapp::Dapp;
use crate::multisig::{MultisigRegistration, QuorumError};
use crate::node::{Node, TransactionView};
use crate::pool::{BlockSummary, PoolEntry, PoolStats, TransactionStatus};
use crate::storage::Storage;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Shared application state for API handlers
#[derive(Clone)]
pub struct ApiState {
    pub node: Arc<RwLock<Node>>,
    pub storage: Arc<Storage>,
    pub ws_broadcaster: Arc<WsBroadcaster>,
}

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub id: String,
    pub status: TransactionStatus,
}

#[derive(Debug, Serialize)]
pub struct SignatureResponse {
    pub id: String,
    pub status: TransactionStatus,
}

#[derive(Clone, Debug, Serialize)]
pub struct PoolEntryInfo {
    pub id: String,
    #[serde(rename = "type")]
    pub tx_type: u8,
    pub sender_id: String,
    pub status: TransactionStatus,
    pub signatures: usize,
    pub signatures_required: usize,
    pub signed_by: Vec<String>,
    pub received_at: DateTime<Utc>,
}

impl From<&PoolEntry> for PoolEntryInfo {
    fn from(entry: &PoolEntry) -> Self {
        Self {
            id: entry.tx.id.clone(),
            tx_type: entry.tx.tx_type.code(),
            sender_id: entry.tx.sender_id.clone(),
            status: entry.status,
            signatures: entry.tx.signature_count(),
            signatures_required: entry.signatures_required(),
            signed_by: entry.tx.signed_by().into_iter().map(String::from).collect(),
            received_at: entry.received_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PoolResponse {
    pub stats: PoolStats,
    pub transactions: Vec<PoolEntryInfo>,
}

#[derive(Debug, Serialize)]
pub struct MultisigInfo {
    pub account: String,
    pub min: u8,
    pub lifetime: u8,
    pub keysgroup: Vec<String>,
    pub description: String,
    pub transaction_id: String,
    pub registered_at_height: u64,
    /// Transactions from this account still collecting signatures
    pub pending: Vec<PoolEntryInfo>,
}

impl MultisigInfo {
    fn new(registration: &MultisigRegistration, pending: Vec<PoolEntryInfo>) -> Self {
        Self {
            account: registration.account.clone(),
            min: registration.policy.min,
            lifetime: registration.policy.lifetime,
            keysgroup: registration.policy.keysgroup.clone(),
            description: registration.policy.description(),
            transaction_id: registration.transaction_id.clone(),
            registered_at_height: registration.registered_at_height,
            pending,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AccountResponse {
    #[serde(flatten)]
    pub account: Account,
    pub is_multisig: bool,
    /// Multisig accounts this account's key may sign for
    pub member_of: Vec<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct DappInfo {
    pub id: String,
    pub name: String,
    pub owner: String,
    pub link: String,
    pub category: u8,
    pub registered_at_height: u64,
    pub total_in: u64,
    pub total_out: u64,
    pub balance: u64,
}

impl From<&Dapp> for DappInfo {
    fn from(dapp: &Dapp) -> Self {
        Self {
            id: dapp.id.clone(),
            name: dapp.name().to_string(),
            owner: dapp.owner.clone(),
            link: dapp.asset.link.clone(),
            category: dapp.asset.category,
            registered_at_height: dapp.registered_at_height,
            total_in: dapp.total_in,
            total_out: dapp.total_out,
            balance: dapp.available_balance(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<ErrorKind>,
}

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ApiError>)>;

fn not_found(what: &str, id: &str) -> (StatusCode, Json<ApiError>) {
    (
        StatusCode::NOT_FOUND,
        Json(ApiError {
            error: format!("{} not found: {}", what, id),
            kind: None,
        }),
    )
}

/// HTTP status for a ledger error
pub fn status_for(error: &LedgerError) -> StatusCode {
    if let LedgerError::Quorum(QuorumError::UnknownTransaction(_)) = error {
        return StatusCode::NOT_FOUND;
    }
    match error.kind() {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::DependencyNotReady => StatusCode::FAILED_DEPENDENCY,
        ErrorKind::InsufficientBalance => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::Expired => StatusCode::GONE,
    }
}

impl From<LedgerError> for ApiError {
    fn from(e: LedgerError) -> Self {
        Self {
            error: e.to_string(),
            kind: Some(e.kind()),
        }
    }
}

fn ledger_error(e: LedgerError) -> (StatusCode, Json<ApiError>) {
    (status_for(&e), Json(ApiError::from(e)))
}

// ============================================================================
// Request Types
// ============================================================================

#[derive(Deserialize)]
pub struct SignatureRequest {
    pub transaction_id: String,
    pub public_key: String,
    pub signature: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /health - Health check
pub async fn health_check() -> &'static str {
    "OK"
}

/// POST /api/transactions - Submit a signed transaction
pub async fn submit_transaction(
    State(state): State<ApiState>,
    Json(tx): Json<Transaction>,
) -> ApiResult<SubmitResponse> {
    let mut node = state.node.write().await;
    let id = node.submit_transaction(tx).map_err(ledger_error)?;
    let status = node
        .get_transaction(&id)
        .state
        .unwrap_or(TransactionStatus::Created);
    drop(node);

    state.ws_broadcaster.broadcast(WsEvent::TransactionAdded {
        id: id.clone(),
        status,
    });

    Ok(Json(SubmitResponse { id, status }))
}

/// GET /api/transactions/{id} - Look a transaction up
pub async fn get_transaction(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> ApiResult<TransactionView> {
    let node = state.node.read().await;
    let view = node.get_transaction(&id);
    if view.is_unknown() {
        return Err(not_found("Transaction", &id));
    }
    Ok(Json(view))
}

/// GET /api/transactions/pool - Pending transactions with signature progress
pub async fn get_pool(State(state): State<ApiState>) -> Json<PoolResponse> {
    let node = state.node.read().await;
    Json(PoolResponse {
        stats: node.pool_stats(),
        transactions: node
            .pool_entries()
            .into_iter()
            .map(PoolEntryInfo::from)
            .collect(),
    })
}

/// POST /api/signatures - Add a keysgroup member's signature
pub async fn submit_signature(
    State(state): State<ApiState>,
    Json(req): Json<SignatureRequest>,
) -> ApiResult<SignatureResponse> {
    let status = {
        let mut node = state.node.write().await;
        node.submit_signature(&req.transaction_id, &req.public_key, &req.signature)
            .map_err(ledger_error)?
    };

    state.ws_broadcaster.broadcast(WsEvent::SignatureAdded {
        transaction_id: req.transaction_id.clone(),
        signer: req.public_key,
        status,
    });

    Ok(Json(SignatureResponse {
        id: req.transaction_id,
        status,
    }))
}

/// Run one confirmation tick, persist the result and notify subscribers
pub async fn produce_and_publish(state: &ApiState) -> BlockSummary {
    let mut node = state.node.write().await;
    let summary = node.on_block_produced();

    if let Err(e) = state.storage.save(node.state()) {
        log::error!("Failed to save ledger: {}", e);
    }
    drop(node);

    state.ws_broadcaster.broadcast(WsEvent::BlockProduced {
        summary: summary.clone(),
    });
    summary
}

/// POST /api/blocks - Produce a block now
pub async fn produce_block(State(state): State<ApiState>) -> Json<BlockSummary> {
    Json(produce_and_publish(&state).await)
}

/// GET /api/accounts/{address} - Account details
pub async fn get_account(
    State(state): State<ApiState>,
    Path(address): Path<String>,
) -> ApiResult<AccountResponse> {
    let node = state.node.read().await;
    let account = node
        .account(&address)
        .ok_or_else(|| not_found("Account", &address))?;

    let member_of = account
        .public_key
        .as_deref()
        .map(|pk| {
            node.memberships(pk)
                .into_iter()
                .map(|r| r.account.clone())
                .collect()
        })
        .unwrap_or_default();

    Ok(Json(AccountResponse {
        account: account.clone(),
        is_multisig: node.multisig(&address).is_some(),
        member_of,
    }))
}

/// GET /api/multisig/{address} - Registered signer policy
pub async fn get_multisig(
    State(state): State<ApiState>,
    Path(address): Path<String>,
) -> ApiResult<MultisigInfo> {
    let node = state.node.read().await;
    let registration = node
        .multisig(&address)
        .ok_or_else(|| not_found("Multisig account", &address))?;

    let pending = node
        .pending_from(&address)
        .into_iter()
        .filter(|e| e.status == TransactionStatus::PendingSignatures)
        .map(PoolEntryInfo::from)
        .collect();

    Ok(Json(MultisigInfo::new(registration, pending)))
}

/// GET /api/dapps - List confirmed dapps
pub async fn list_dapps(State(state): State<ApiState>) -> Json<Vec<DappInfo>> {
    let node = state.node.read().await;
    Json(node.dapps().into_iter().map(DappInfo::from).collect())
}

/// GET /api/dapps/{id} - Dapp details
pub async fn get_dapp(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> ApiResult<DappInfo> {
    let node = state.node.read().await;
    node.dapp(&id)
        .map(|d| Json(DappInfo::from(d)))
        .ok_or_else(|| not_found("Dapp", &id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Genesis, GenesisAccount, NodeConfig};
    use crate::core::{LedgerState, ManualClock, TransactionBuilder, COIN};
    use crate::crypto::{KeyPair, Secp256k1Verifier};
    use crate::multisig::sign_transaction;
    use crate::storage::StorageConfig;

    fn api_state(funded: &KeyPair, dir: &std::path::Path) -> ApiState {
        let genesis = Genesis {
            accounts: vec![GenesisAccount {
                address: funded.address(),
                balance: 100 * COIN,
            }],
            delegates: vec![],
        };
        let node = Node::new(
            NodeConfig::default(),
            LedgerState::from_genesis(&genesis).unwrap(),
            Arc::new(Secp256k1Verifier),
            Arc::new(ManualClock::new()),
        );
        let storage = Storage::new(StorageConfig {
            data_dir: dir.to_path_buf(),
            ..Default::default()
        })
        .unwrap();

        ApiState {
            node: Arc::new(RwLock::new(node)),
            storage: Arc::new(storage),
            ws_broadcaster: Arc::new(WsBroadcaster::new()),
        }
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            status_for(&LedgerError::InvalidSignature),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&LedgerError::AlreadyRejected("x".into())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_for(&LedgerError::DependencyNotReady("x".into())),
            StatusCode::FAILED_DEPENDENCY
        );
        assert_eq!(
            status_for(&LedgerError::InsufficientBalance { have: 0, need: 1 }),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_for(&LedgerError::Expired("x".into())),
            StatusCode::GONE
        );
        assert_eq!(
            status_for(&QuorumError::UnknownTransaction("x".into()).into()),
            StatusCode::NOT_FOUND
        );
    }

    #[tokio::test]
    async fn test_submit_and_produce_block() {
        let dir = tempfile::tempdir().unwrap();
        let alice = KeyPair::generate();
        let bob = KeyPair::generate();
        let state = api_state(&alice, dir.path());
        let mut events = state.ws_broadcaster.subscribe();

        let tx = TransactionBuilder::transfer(&bob.address(), COIN)
            .sign(&alice)
            .unwrap();
        let Json(submitted) = submit_transaction(State(state.clone()), Json(tx))
            .await
            .unwrap();
        assert_eq!(submitted.status, TransactionStatus::Ready);
        assert!(matches!(
            events.try_recv().unwrap(),
            WsEvent::TransactionAdded { .. }
        ));

        let Json(summary) = produce_block(State(state.clone())).await;
        assert_eq!(summary.confirmed, vec![submitted.id.clone()]);
        assert!(state.storage.exists());

        let Json(view) = get_transaction(State(state.clone()), Path(submitted.id))
            .await
            .unwrap();
        assert_eq!(view.status, "confirmed");

        let Json(account) = get_account(State(state), Path(bob.address()))
            .await
            .unwrap();
        assert_eq!(account.account.balance, COIN);
    }

    #[tokio::test]
    async fn test_unknown_ids_are_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let state = api_state(&KeyPair::generate(), dir.path());

        let (code, _) = get_transaction(State(state.clone()), Path("missing".into()))
            .await
            .unwrap_err();
        assert_eq!(code, StatusCode::NOT_FOUND);

        let (code, _) = submit_signature(
            State(state.clone()),
            Json(SignatureRequest {
                transaction_id: "missing".into(),
                public_key: "02".repeat(33),
                signature: "00".into(),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(code, StatusCode::NOT_FOUND);

        let (code, _) = get_dapp(State(state), Path("missing".into()))
            .await
            .unwrap_err();
        assert_eq!(code, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_multisig_signature_flow() {
        let dir = tempfile::tempdir().unwrap();
        let owner = KeyPair::generate();
        let member = KeyPair::generate();
        let state = api_state(&owner, dir.path());

        let registration =
            TransactionBuilder::multisignature(1, 24, vec![format!("+{}", member.public_key_hex())])
                .sign(&owner)
                .unwrap();
        let Json(submitted) = submit_transaction(State(state.clone()), Json(registration.clone()))
            .await
            .unwrap();
        assert_eq!(submitted.status, TransactionStatus::PendingSignatures);

        let Json(pool) = get_pool(State(state.clone())).await;
        assert_eq!(pool.transactions[0].signatures_required, 1);

        let sig = sign_transaction(&registration, &member).unwrap();
        let Json(signed) = submit_signature(
            State(state.clone()),
            Json(SignatureRequest {
                transaction_id: submitted.id.clone(),
                public_key: sig.signer_pubkey.clone(),
                signature: sig.signature.clone(),
            }),
        )
        .await
        .unwrap();
        assert_eq!(signed.status, TransactionStatus::Ready);

        // Same member again
        let (code, Json(err)) = submit_signature(
            State(state.clone()),
            Json(SignatureRequest {
                transaction_id: submitted.id,
                public_key: sig.signer_pubkey,
                signature: sig.signature,
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(code, StatusCode::CONFLICT);
        assert_eq!(err.kind, Some(ErrorKind::Conflict));

        produce_and_publish(&state).await;
        let Json(info) = get_multisig(State(state), Path(owner.address()))
            .await
            .unwrap();
        assert_eq!(info.description, "1-of-1");
        assert!(info.pending.is_empty());
    }
}
