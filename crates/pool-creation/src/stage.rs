//! Pipeline stages and the on-chain operations they submit.

use {
    crate::record::{PoolParams, PoolType, TokenConfig},
    ethereum_types::{H160, U256},
    serde::{Deserialize, Serialize},
    std::fmt,
};

/// One discrete on-chain operation in the pool-creation pipeline. The
/// variant order matches pipeline order, which makes the derived `Ord`
/// usable for keying progress maps.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Ord, PartialEq, PartialOrd, Serialize)]
pub enum Stage {
    Deploy,
    Approve(usize),
    Permit(usize),
    Bind(usize),
    Initialize,
    SetMaxSurgeFee,
    SetSwapFeeToMax,
    Finalize,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Deploy => write!(f, "deploy"),
            Self::Approve(index) => write!(f, "approve[{index}]"),
            Self::Permit(index) => write!(f, "permit[{index}]"),
            Self::Bind(index) => write!(f, "bind[{index}]"),
            Self::Initialize => write!(f, "initialize"),
            Self::SetMaxSurgeFee => write!(f, "set-max-surge-fee"),
            Self::SetSwapFeeToMax => write!(f, "set-swap-fee-to-max"),
            Self::Finalize => write!(f, "finalize"),
        }
    }
}

/// The ordered stage schedule for a pool type. The 1-based `step` counter of
/// the persisted record indexes into this.
///
/// CoW-AMM pools bind tokens into the deployed pool directly instead of the
/// approve/permit/initialize sequence the vault-based pool types use.
pub fn schedule(pool_type: PoolType, token_count: usize) -> Vec<Stage> {
    let mut stages = vec![Stage::Deploy];
    match pool_type {
        PoolType::CowAmm => {
            stages.extend((0..token_count).map(Stage::Bind));
            stages.push(Stage::SetSwapFeeToMax);
        }
        _ => {
            stages.extend((0..token_count).map(Stage::Approve));
            stages.extend((0..token_count).map(Stage::Permit));
            stages.push(Stage::Initialize);
            if pool_type == PoolType::StableSurge {
                stages.push(Stage::SetMaxSurgeFee);
            }
        }
    }
    stages.push(Stage::Finalize);
    stages
}

/// E-CLP initialization payload: base parameters together with the derived
/// parameters the contract expects precomputed, both already validated.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct InitializeEclp {
    pub params: eclp_math::EclpParams,
    pub derived: eclp_math::DerivedEclpParams,
}

/// A fully-specified stage operation, ready for the wallet collaborator to
/// encode and submit. Token lists are always in canonical (ascending
/// address) order.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Operation {
    Deploy {
        params: PoolParams,
        tokens: Vec<TokenConfig>,
    },
    Approve {
        token: H160,
        spender: H160,
        amount: U256,
    },
    Permit {
        token: H160,
        spender: H160,
        amount: U256,
    },
    Bind {
        pool: H160,
        token: H160,
        amount: U256,
    },
    Initialize {
        pool: H160,
        tokens: Vec<H160>,
        amounts: Vec<U256>,
        eclp: Option<InitializeEclp>,
    },
    SetMaxSurgeFee {
        pool: H160,
        max_surge_fee_percentage: U256,
    },
    SetSwapFeeToMax {
        pool: H160,
    },
    Finalize {
        pool: H160,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weighted_schedule_shape() {
        let stages = schedule(PoolType::Weighted, 2);
        assert_eq!(
            stages,
            vec![
                Stage::Deploy,
                Stage::Approve(0),
                Stage::Approve(1),
                Stage::Permit(0),
                Stage::Permit(1),
                Stage::Initialize,
                Stage::Finalize,
            ]
        );
    }

    #[test]
    fn stable_surge_schedule_includes_max_surge_fee() {
        let stages = schedule(PoolType::StableSurge, 3);
        assert_eq!(stages.len(), 10);
        assert_eq!(stages[8], Stage::SetMaxSurgeFee);
        assert_eq!(stages[9], Stage::Finalize);
    }

    #[test]
    fn cow_amm_schedule_binds_tokens() {
        let stages = schedule(PoolType::CowAmm, 2);
        assert_eq!(
            stages,
            vec![
                Stage::Deploy,
                Stage::Bind(0),
                Stage::Bind(1),
                Stage::SetSwapFeeToMax,
                Stage::Finalize,
            ]
        );
    }

    #[test]
    fn eclp_schedule_matches_two_token_shape() {
        assert_eq!(schedule(PoolType::GyroE, 2).len(), 7);
    }

    #[test]
    fn stage_order_matches_pipeline_order() {
        let stages = schedule(PoolType::StableSurge, 2);
        let mut sorted = stages.clone();
        sorted.sort();
        assert_eq!(stages, sorted);
    }
}
