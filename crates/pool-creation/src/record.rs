//! The persisted pool-creation record: single source of truth for all user
//! choices and all transaction-progress markers, designed to survive page
//! reloads at any point of the pipeline.

use {
    crate::{
        error::CreationError,
        stage::{Stage, schedule},
    },
    ethereum_types::{H160, H256, U256},
    num::BigInt,
    serde::{Deserialize, Serialize},
    serde_with::serde_as,
    std::collections::BTreeMap,
};

/// Version tag of the serialized record shape. Bump on layout changes so a
/// stale persisted record degrades to defaults instead of misparsing.
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize, strum::Display)]
pub enum PoolType {
    Weighted,
    Stable,
    StableSurge,
    GyroE,
    ReClamm,
    CowAmm,
}

/// One token of the pool under construction.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct TokenConfig {
    pub address: H160,
    pub decimals: u8,
    /// Normalized weight at 18 decimals; weighted pools only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<U256>,
    /// Initial deposit amount as entered, e.g. "1.5".
    pub amount: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_provider: Option<H160>,
}

impl TokenConfig {
    /// The deposit amount scaled to the token's base units. This scaled
    /// value is also what existing on-chain allowances are compared
    /// against.
    pub fn raw_amount(&self) -> Result<U256, CreationError> {
        parse_fixed(&self.amount, u32::from(self.decimals))
    }
}

/// Parses a human decimal string into an integer scaled by `10^decimals`.
fn parse_fixed(value: &str, decimals: u32) -> Result<U256, CreationError> {
    let invalid = || CreationError::UserInput(format!("invalid decimal amount {value:?}"));
    let (integer, fraction) = value.split_once('.').unwrap_or((value, ""));
    if integer.is_empty() && fraction.is_empty() {
        return Err(invalid());
    }
    if !integer.chars().all(|c| c.is_ascii_digit()) || !fraction.chars().all(|c| c.is_ascii_digit())
    {
        return Err(invalid());
    }
    if fraction.len() as u64 > u64::from(decimals) {
        return Err(CreationError::UserInput(format!(
            "amount {value:?} has more than {decimals} decimal places"
        )));
    }
    let overflow = || CreationError::UserInput(format!("amount {value:?} overflows"));
    let scale = U256::from(10)
        .checked_pow(U256::from(decimals))
        .ok_or_else(overflow)?;
    let integer = if integer.is_empty() {
        U256::zero()
    } else {
        U256::from_dec_str(integer).map_err(|_| overflow())?
    };
    let mut padded = fraction.to_string();
    padded.push_str(&"0".repeat(decimals as usize - fraction.len()));
    let fraction = if padded.is_empty() {
        U256::zero()
    } else {
        U256::from_dec_str(&padded).map_err(|_| overflow())?
    };
    integer
        .checked_mul(scale)
        .and_then(|scaled| scaled.checked_add(fraction))
        .ok_or_else(overflow)
}

/// E-CLP configuration as entered and fetched for a GyroE pool. Parameters
/// are 18-decimal fixed-point integers kept as decimal strings, the same
/// way they round-trip through storage.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct EclpConfig {
    pub alpha: String,
    pub beta: String,
    pub c: String,
    pub s: String,
    pub lambda: String,
    pub usd_per_token0: String,
    pub usd_per_token1: String,
    /// Whether the parameters are currently expressed for the flipped token
    /// order.
    pub inverted: bool,
    pub usd_per_token0_fetched: bool,
    pub usd_per_token1_fetched: bool,
}

impl EclpConfig {
    /// Parses the stored strings into math-engine parameters.
    pub fn params(&self) -> Result<eclp_math::EclpParams, CreationError> {
        Ok(eclp_math::EclpParams {
            alpha: parse_bigint(&self.alpha)?,
            beta: parse_bigint(&self.beta)?,
            c: parse_bigint(&self.c)?,
            s: parse_bigint(&self.s)?,
            lambda: parse_bigint(&self.lambda)?,
        })
    }

    /// Mirrors the configuration for the opposite token order: price bounds
    /// and rotation pass through the offset-preserving inversion transform,
    /// USD values and their fetch flags swap, and the inversion marker
    /// flips.
    pub fn invert(&self) -> Result<Self, CreationError> {
        let input = eclp_math::InversionInput {
            params: self.params()?,
            usd_per_token0: parse_bigint(&self.usd_per_token0)?,
            usd_per_token1: parse_bigint(&self.usd_per_token1)?,
        };
        let inverted = eclp_math::invert(&input).map_err(CreationError::BaseParamsInvalid)?;
        Ok(Self {
            alpha: inverted.params.alpha.to_string(),
            beta: inverted.params.beta.to_string(),
            c: inverted.params.c.to_string(),
            s: inverted.params.s.to_string(),
            lambda: inverted.params.lambda.to_string(),
            usd_per_token0: inverted.usd_per_token0.to_string(),
            usd_per_token1: inverted.usd_per_token1.to_string(),
            inverted: !self.inverted,
            usd_per_token0_fetched: self.usd_per_token1_fetched,
            usd_per_token1_fetched: self.usd_per_token0_fetched,
        })
    }
}

fn parse_bigint(value: &str) -> Result<BigInt, CreationError> {
    value
        .parse()
        .map_err(|_| CreationError::UserInput(format!("invalid fixed-point integer {value:?}")))
}

/// Pool-type-specific parameters. The variant is the pool type; fields that
/// exist for every pool live on [`PoolCreationRecord`] instead.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(tag = "pool_type")]
pub enum PoolParams {
    Weighted {
        swap_fee_percentage: U256,
    },
    Stable {
        amplification_parameter: U256,
        swap_fee_percentage: U256,
    },
    StableSurge {
        amplification_parameter: U256,
        swap_fee_percentage: U256,
        max_surge_fee_percentage: U256,
        surge_threshold_percentage: U256,
    },
    GyroE {
        swap_fee_percentage: U256,
        config: EclpConfig,
    },
    ReClamm {
        swap_fee_percentage: U256,
        initial_min_price: String,
        initial_max_price: String,
        initial_target_price: String,
        price_shift_daily_rate: String,
        centeredness_margin: String,
    },
    CowAmm,
}

impl PoolParams {
    pub fn pool_type(&self) -> PoolType {
        match self {
            Self::Weighted { .. } => PoolType::Weighted,
            Self::Stable { .. } => PoolType::Stable,
            Self::StableSurge { .. } => PoolType::StableSurge,
            Self::GyroE { .. } => PoolType::GyroE,
            Self::ReClamm { .. } => PoolType::ReClamm,
            Self::CowAmm => PoolType::CowAmm,
        }
    }
}

/// Terminal outcome of a stage's transaction.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum TxOutcome {
    Success { tx_hash: H256 },
}

/// Submission and confirmation progress of one stage, modeled explicitly
/// instead of inferring the state from which optional hash fields happen to
/// be set.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(tag = "state")]
pub enum TxState {
    /// Nothing submitted yet; also the state a stage rolls back to after a
    /// revert or a terminal relay failure.
    #[default]
    Unsubmitted,
    /// Submitted through a multisig relay; waiting for the relay to
    /// execute. Only the relay (safe) hash is known.
    RelayPending { safe_hash: H256 },
    /// An execution hash is known (directly-signed, or relay already
    /// executed); waiting for the inclusion receipt.
    ExecutionPending { tx_hash: H256 },
    /// Terminal.
    Resolved { outcome: TxOutcome },
}

impl TxState {
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            Self::Resolved {
                outcome: TxOutcome::Success { .. }
            }
        )
    }
}

/// The singleton persisted record driving pool creation. Mutated only
/// through [`crate::store::PoolCreationStore::update`].
#[serde_as]
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct PoolCreationRecord {
    pub schema_version: u32,
    pub chain_id: u64,
    /// 1-based index into [`schedule`]; monotonically non-decreasing except
    /// on reset.
    pub step: u32,
    pub token_configs: Vec<TokenConfig>,
    pub pool_params: PoolParams,
    /// Set exactly once, from the deploy receipt; immutable thereafter.
    pub pool_address: Option<H160>,
    #[serde_as(as = "Vec<(_, _)>")]
    pub stages: BTreeMap<Stage, TxState>,
}

impl Default for PoolCreationRecord {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            chain_id: 1,
            step: 1,
            token_configs: Vec::new(),
            pool_params: PoolParams::Weighted {
                swap_fee_percentage: U256::zero(),
            },
            pool_address: None,
            stages: BTreeMap::new(),
        }
    }
}

impl PoolCreationRecord {
    pub fn pool_type(&self) -> PoolType {
        self.pool_params.pool_type()
    }

    /// The stage schedule for this record's pool type and token count.
    pub fn schedule(&self) -> Vec<Stage> {
        schedule(self.pool_type(), self.token_configs.len())
    }

    /// The stage the `step` counter currently points at; `None` once the
    /// pipeline is complete. A zero step (possible through a rollback
    /// update) points at no stage rather than underflowing.
    pub fn current_stage(&self) -> Option<Stage> {
        let index = (self.step as usize).checked_sub(1)?;
        self.schedule().get(index).copied()
    }

    /// Progress of a stage; stages without an entry are unsubmitted.
    pub fn tx(&self, stage: Stage) -> TxState {
        self.stages.get(&stage).copied().unwrap_or_default()
    }

    /// Terminal state: every stage walked and the pool address known.
    pub fn is_complete(&self) -> bool {
        self.step as usize > self.schedule().len() && self.pool_address.is_some()
    }

    /// Token configs in canonical order (ascending address), as required by
    /// every order-sensitive contract operation.
    pub fn sorted_tokens(&self) -> Vec<TokenConfig> {
        let mut tokens = self.token_configs.clone();
        tokens.sort_by_key(|token| token.address);
        tokens
    }
}

/// Ancillary, non-chain user state. Kept under its own storage key so
/// resetting the creation pipeline does not wipe it (and vice versa).
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct UserDataRecord {
    pub balances: BTreeMap<H160, U256>,
    pub risk_acknowledged: bool,
}
