//! The pool-creation state machine: selects the next stage from the
//! persisted record, submits it through the wallet collaborator, and drives
//! the submission to a terminal state across both confirmation paths
//! (directly-signed and multisig-relayed).

use {
    crate::{
        error::CreationError,
        interfaces::{BlockchainReader, EventDecoder, ReceiptStatus, Submission, WalletSigner},
        record::{PoolCreationRecord, PoolParams, TokenConfig, TxOutcome, TxState},
        resolver::RelayPoller,
        stage::{InitializeEclp, Operation, Stage},
        store::PoolCreationStore,
    },
    ethereum_types::H160,
    std::sync::Arc,
};

/// What one call to [`PoolCreationMachine::advance`] or
/// [`PoolCreationMachine::resolve`] accomplished.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Progress {
    /// Nothing submitted for the stage yet; there is nothing to resolve.
    Inert(Stage),
    /// Pre-flight showed the stage unnecessary; skipped without submission.
    Skipped(Stage),
    /// The stage was already resolved; idempotent no-op.
    AlreadyResolved(Stage),
    /// The stage reached terminal success.
    Completed(Stage),
    /// Every stage is complete and the pool address is known.
    Finished,
}

pub struct PoolCreationMachine {
    store: PoolCreationStore,
    signer: Arc<dyn WalletSigner>,
    chain: Arc<dyn BlockchainReader>,
    poller: RelayPoller,
    decoder: Arc<dyn EventDecoder>,
    /// The creating account; owner side of allowance pre-flight checks.
    account: H160,
    /// The contract granted token allowances (vault or permit2).
    spender: H160,
}

impl PoolCreationMachine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: PoolCreationStore,
        signer: Arc<dyn WalletSigner>,
        chain: Arc<dyn BlockchainReader>,
        poller: RelayPoller,
        decoder: Arc<dyn EventDecoder>,
        account: H160,
        spender: H160,
    ) -> Self {
        Self {
            store,
            signer,
            chain,
            poller,
            decoder,
            account,
            spender,
        }
    }

    pub fn store(&self) -> &PoolCreationStore {
        &self.store
    }

    /// Submits the current stage if nothing is in flight for it, then
    /// drives it to a terminal state. Stage `k + 1` is structurally
    /// unreachable before stage `k` resolved: only the stage the step
    /// counter points at is ever acted on.
    pub async fn advance(&self) -> Result<Progress, CreationError> {
        let record = self.store.record();
        let Some(stage) = record.current_stage() else {
            return Ok(Progress::Finished);
        };
        if let TxState::Unsubmitted = record.tx(stage) {
            if self.preflight_skip(&record, stage).await? {
                tracing::info!(%stage, "pre-flight satisfied on-chain; skipping stage");
                self.store.update(|record| record.step += 1)?;
                return Ok(Progress::Skipped(stage));
            }
            let operation = self.operation(&record, stage)?;
            // A rejected submission returns before any record mutation.
            let submission = self
                .signer
                .sign_and_send(&operation)
                .await
                .map_err(CreationError::Submission)?;
            let tx = match submission {
                Submission::Direct(tx_hash) => {
                    tracing::info!(%stage, ?tx_hash, "submitted directly");
                    TxState::ExecutionPending { tx_hash }
                }
                Submission::Relayed(safe_hash) => {
                    tracing::info!(%stage, ?safe_hash, "submitted through relay");
                    TxState::RelayPending { safe_hash }
                }
            };
            self.store.update(|record| {
                record.stages.insert(stage, tx);
            })?;
        }
        self.resolve(stage).await
    }

    /// Drives an existing submission of `stage` to a terminal state.
    /// Idempotent: a stage already resolved is left untouched and its
    /// continuation is not re-run; a stage without a submission is inert.
    /// Safe to re-enter after a reload.
    pub async fn resolve(&self, stage: Stage) -> Result<Progress, CreationError> {
        loop {
            match self.store.record().tx(stage) {
                TxState::Resolved { .. } => return Ok(Progress::AlreadyResolved(stage)),
                TxState::Unsubmitted => return Ok(Progress::Inert(stage)),
                TxState::RelayPending { safe_hash } => {
                    match self.poller.wait_for_execution(safe_hash).await {
                        Ok(tx_hash) => {
                            // Record the execution hash before waiting on the
                            // receipt so a reload resumes past the relay.
                            self.store.update(|record| {
                                record.stages.insert(stage, TxState::ExecutionPending { tx_hash });
                            })?;
                        }
                        Err(
                            err @ (CreationError::RelayFailed(_)
                            | CreationError::RelayCancelled(_)),
                        ) => {
                            // Terminal relay failure: the stage fails
                            // permanently and must be re-initiated.
                            self.store.update(|record| {
                                record.stages.insert(stage, TxState::Unsubmitted);
                            })?;
                            return Err(err);
                        }
                        // Attempt budget exhausted: keep the submission so
                        // resolution can be re-entered later.
                        Err(err) => return Err(err),
                    }
                }
                TxState::ExecutionPending { tx_hash } => {
                    let receipt = self
                        .chain
                        .wait_for_receipt(tx_hash)
                        .await
                        .map_err(CreationError::Rpc)?;
                    match receipt.status {
                        ReceiptStatus::Success => {
                            let pool_address = match stage {
                                Stage::Deploy => Some(
                                    self.decoder
                                        .pool_created(&receipt.logs)
                                        .map_err(CreationError::Decode)?,
                                ),
                                _ => None,
                            };
                            let record = self.store.update(|record| {
                                match pool_address {
                                    Some(address) => {
                                        record.pool_address = Some(address);
                                        // Deploy exists solely to produce the
                                        // pool address; jump to the first
                                        // post-deploy stage.
                                        record.step = 2;
                                    }
                                    None => record.step += 1,
                                }
                                record.stages.insert(
                                    stage,
                                    TxState::Resolved {
                                        outcome: TxOutcome::Success { tx_hash },
                                    },
                                );
                            })?;
                            tracing::info!(%stage, ?tx_hash, step = record.step, "stage confirmed");
                            return Ok(if record.is_complete() {
                                Progress::Finished
                            } else {
                                Progress::Completed(stage)
                            });
                        }
                        ReceiptStatus::Reverted => {
                            // Clear only this stage; everything completed
                            // before it stays intact and the stage can be
                            // retried from a clean slate.
                            self.store.update(|record| {
                                record.stages.insert(stage, TxState::Unsubmitted);
                            })?;
                            tracing::warn!(%stage, ?tx_hash, "transaction reverted");
                            return Err(CreationError::Reverted(tx_hash));
                        }
                    }
                }
            }
        }
    }

    /// Whether the stage is already satisfied on-chain and needs no
    /// submission. Only approve stages have a pre-flight: an existing
    /// allowance covering the scaled deposit amount makes the approval
    /// redundant.
    async fn preflight_skip(
        &self,
        record: &PoolCreationRecord,
        stage: Stage,
    ) -> Result<bool, CreationError> {
        let Stage::Approve(index) = stage else {
            return Ok(false);
        };
        let token = sorted_token(record, index)?;
        let required = token.raw_amount()?;
        let allowance = self
            .chain
            .allowance(token.address, self.account, self.spender)
            .await
            .map_err(CreationError::Rpc)?;
        Ok(allowance >= required)
    }

    /// Builds the fully-specified operation for a stage from the record.
    fn operation(
        &self,
        record: &PoolCreationRecord,
        stage: Stage,
    ) -> Result<Operation, CreationError> {
        match stage {
            Stage::Deploy => Ok(Operation::Deploy {
                params: record.pool_params.clone(),
                tokens: record.sorted_tokens(),
            }),
            Stage::Approve(index) => {
                let token = sorted_token(record, index)?;
                Ok(Operation::Approve {
                    token: token.address,
                    spender: self.spender,
                    amount: token.raw_amount()?,
                })
            }
            Stage::Permit(index) => {
                let token = sorted_token(record, index)?;
                Ok(Operation::Permit {
                    token: token.address,
                    spender: self.spender,
                    amount: token.raw_amount()?,
                })
            }
            Stage::Bind(index) => {
                let token = sorted_token(record, index)?;
                Ok(Operation::Bind {
                    pool: pool_address(record)?,
                    token: token.address,
                    amount: token.raw_amount()?,
                })
            }
            Stage::Initialize => {
                let tokens = record.sorted_tokens();
                let amounts = tokens
                    .iter()
                    .map(TokenConfig::raw_amount)
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Operation::Initialize {
                    pool: pool_address(record)?,
                    tokens: tokens.into_iter().map(|token| token.address).collect(),
                    amounts,
                    eclp: self.eclp_payload(record)?,
                })
            }
            Stage::SetMaxSurgeFee => {
                let max_surge_fee_percentage = match &record.pool_params {
                    PoolParams::StableSurge {
                        max_surge_fee_percentage,
                        ..
                    } => *max_surge_fee_percentage,
                    _ => {
                        return Err(CreationError::InvariantViolation(
                            "max surge fee stage requires a stable surge pool",
                        ));
                    }
                };
                Ok(Operation::SetMaxSurgeFee {
                    pool: pool_address(record)?,
                    max_surge_fee_percentage,
                })
            }
            Stage::SetSwapFeeToMax => Ok(Operation::SetSwapFeeToMax {
                pool: pool_address(record)?,
            }),
            Stage::Finalize => Ok(Operation::Finalize {
                pool: pool_address(record)?,
            }),
        }
    }

    /// For elliptic pools, derives and validates the initialization
    /// parameters. Base and derived validation failures stay separately
    /// reportable.
    fn eclp_payload(
        &self,
        record: &PoolCreationRecord,
    ) -> Result<Option<InitializeEclp>, CreationError> {
        let PoolParams::GyroE { config, .. } = &record.pool_params else {
            return Ok(None);
        };
        let params = config.params()?;
        eclp_math::validate_params(&params).map_err(CreationError::BaseParamsInvalid)?;
        let derived = eclp_math::derive(&params).map_err(CreationError::BaseParamsInvalid)?;
        eclp_math::validate_derived_params(&derived)
            .map_err(CreationError::DerivedParamsInvalid)?;
        Ok(Some(InitializeEclp { params, derived }))
    }
}

fn sorted_token(record: &PoolCreationRecord, index: usize) -> Result<TokenConfig, CreationError> {
    record
        .sorted_tokens()
        .get(index)
        .cloned()
        .ok_or_else(|| CreationError::UserInput(format!("no token at index {index}")))
}

fn pool_address(record: &PoolCreationRecord) -> Result<H160, CreationError> {
    record.pool_address.ok_or(CreationError::InvariantViolation(
        "stage requires the pool address from the deploy receipt",
    ))
}
