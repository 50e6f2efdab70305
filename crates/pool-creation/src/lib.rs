//! Core orchestration of liquidity-pool creation: a resumable, persisted
//! pipeline of on-chain operations (deploy, approve, permit, initialize,
//! finalize) that survives page reloads, supports both directly-signed and
//! multisig-relayed transactions, and never double-submits or silently
//! stalls.
//!
//! The host (UI rendering, wallet connection, RPC transport, token-list and
//! price APIs) stays outside; it talks to the core through the collaborator
//! traits in [`interfaces`] and observes progress through the persisted
//! [`record::PoolCreationRecord`].

pub mod error;
pub mod interfaces;
pub mod machine;
pub mod record;
pub mod resolver;
pub mod stage;
pub mod store;

pub use {
    error::CreationError,
    machine::{PoolCreationMachine, Progress},
    record::{PoolCreationRecord, PoolParams, PoolType, TokenConfig, TxOutcome, TxState},
    resolver::{PollSchedule, RelayPoller},
    stage::{Operation, Stage, schedule},
    store::{MemoryStorage, PoolCreationStore, UserDataStore},
};
