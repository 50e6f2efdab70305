//! Contracts of the external collaborators the pipeline drives.
//!
//! The core implements none of these: wallet connection and signing, RPC
//! transport, the multisig relay and durable client storage all live on the
//! host side. Everything here is a narrow seam that can be mocked in tests.

use {
    crate::stage::Operation,
    anyhow::Result,
    ethereum_types::{H160, H256, U256},
};

/// A single emitted event log from a transaction receipt.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Log {
    pub address: H160,
    pub topics: Vec<H256>,
    pub data: Vec<u8>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ReceiptStatus {
    Success,
    Reverted,
}

/// Inclusion receipt of an executed transaction.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Receipt {
    pub tx_hash: H256,
    pub status: ReceiptStatus,
    pub logs: Vec<Log>,
}

/// What a signer submission produced: a direct wallet yields an execution
/// hash immediately; a multisig or smart-account wallet yields only a relay
/// (safe) hash, with the execution hash becoming known once the relay
/// executes.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Submission {
    Direct(H256),
    Relayed(H256),
}

/// Status of a relayed transaction as reported by the multisig relay.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RelayStatus {
    Pending,
    Executed { tx_hash: H256 },
    Failed,
    Cancelled,
}

/// Wallet abstraction; encodes and submits a stage operation. A user
/// rejection surfaces as an error and must not be retried automatically.
#[cfg_attr(any(test, feature = "test-util"), mockall::automock)]
#[async_trait::async_trait]
pub trait WalletSigner: Send + Sync {
    async fn sign_and_send(&self, operation: &Operation) -> Result<Submission>;
}

/// Read-only blockchain access.
#[cfg_attr(any(test, feature = "test-util"), mockall::automock)]
#[async_trait::async_trait]
pub trait BlockchainReader: Send + Sync {
    /// Blocks until the transaction's inclusion receipt is available.
    async fn wait_for_receipt(&self, tx_hash: H256) -> Result<Receipt>;
    /// Current ERC-20 allowance of `spender` over `owner`'s `token`.
    async fn allowance(&self, token: H160, owner: H160, spender: H160) -> Result<U256>;
}

/// Multisig relay status source.
#[cfg_attr(any(test, feature = "test-util"), mockall::automock)]
#[async_trait::async_trait]
pub trait RelayClient: Send + Sync {
    async fn status(&self, safe_hash: H256) -> Result<RelayStatus>;
}

/// Extracts typed fields from receipt logs. A missing event is a decode
/// failure, never a silent skip.
#[cfg_attr(any(test, feature = "test-util"), mockall::automock)]
pub trait EventDecoder: Send + Sync {
    /// Address of the pool deployed by the factory call, from the factory's
    /// pool-created event.
    fn pool_created(&self, logs: &[Log]) -> Result<H160>;
}

/// Durable client storage; synchronous and assumed reliable within a
/// session.
pub trait Storage: Send + Sync {
    fn get(&self, key: &str) -> Option<Vec<u8>>;
    fn set(&self, key: &str, value: Vec<u8>);
}
