use ethereum_types::H256;

/// Classified failures of the pool-creation pipeline.
///
/// Every error is recovered at the stage boundary: the worst outcome of any
/// variant is "this stage did not advance". The classification decides what
/// the caller may do next: fix input, resubmit, or retry the same stage.
#[derive(Debug, thiserror::Error)]
pub enum CreationError {
    /// Malformed user input; the record is never touched.
    #[error("invalid user input: {0}")]
    UserInput(String),
    /// The entered E-CLP base parameters fail the contract's limits.
    #[error("base ECLP parameters invalid")]
    BaseParamsInvalid(#[source] eclp_math::Error),
    /// The derived E-CLP parameters fail the contract's limits. Reported
    /// separately from the base case so the user knows which inputs to
    /// revisit.
    #[error("derived ECLP parameters invalid")]
    DerivedParamsInvalid(#[source] eclp_math::Error),
    /// The signer rejected or failed to submit; stage remains unresolved.
    #[error("transaction submission failed")]
    Submission(#[source] anyhow::Error),
    /// The multisig relay reported the transaction as failed. The stage
    /// fails permanently; the user must resubmit.
    #[error("relay reported safe transaction {0:?} as failed")]
    RelayFailed(H256),
    /// The multisig relay reported the transaction as cancelled.
    #[error("relay reported safe transaction {0:?} as cancelled")]
    RelayCancelled(H256),
    /// The relay poll exhausted its attempt budget without a terminal
    /// status. The submission is kept so resolution can be re-entered.
    #[error("gave up polling relay for safe transaction {0:?}")]
    RelayTimedOut(H256),
    /// The transaction reverted on-chain. The stage's submission is cleared
    /// so it can be retried from a clean slate.
    #[error("transaction {0:?} reverted on-chain")]
    Reverted(H256),
    /// An expected event was missing from the receipt logs. Indicates an
    /// ABI or deployment assumption mismatch rather than a business-logic
    /// failure, hence distinct from [`CreationError::Reverted`].
    #[error("failed to decode expected event from receipt logs")]
    Decode(#[source] anyhow::Error),
    /// A blockchain read (receipt, allowance) failed.
    #[error("blockchain read failed")]
    Rpc(#[source] anyhow::Error),
    /// A record mutation would have violated a persistence invariant; the
    /// mutation was discarded.
    #[error("record invariant violated: {0}")]
    InvariantViolation(&'static str),
    #[error("failed to serialize record for persistence")]
    Persistence(#[from] serde_json::Error),
}
