//! REST API module
//!
//! Provides HTTP access to a running ledger node.
//!
//! # Endpoints
//!
//! ## Transactions
//! - `POST /api/transactions` - Submit a signed transaction
//! - `GET /api/transactions/pool` - Pending transactions and signature progress
//! - `GET /api/transactions/{id}` - Transaction status lookup
//! - `POST /api/signatures` - Add a keysgroup member signature
//!
//! ## Blocks
//! - `POST /api/blocks` - Produce a block now
//!
//! ## Accounts
//! - `GET /api/accounts/{address}` - Balance, keys, delegate name and votes
//! - `GET /api/multisig/{address}` - Registered signer policy
//!
//! ## Dapps
//! - `GET /api/dapps` - Confirmed dapps
//! - `GET /api/dapps/{id}` - Dapp details and balance
//!
//! ## WebSocket
//! - `GET /ws` - Real-time updates (TransactionAdded, SignatureAdded, BlockProduced)

pub mod handlers;
pub mod routes;
pub mod websocket;

pub use handlers::{produce_and_publish, ApiState};
pub use routes::create_router;
pub use websocket::{WsBroadcaster, WsEvent};
