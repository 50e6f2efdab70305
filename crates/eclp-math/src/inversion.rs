//! Mirroring of E-CLP base parameters for the opposite token order.
//!
//! `alpha` and `beta` are price bounds, not prices, so flipping the token
//! order must not take naive reciprocals: that would place the bounds
//! asymmetrically around the new spot price. Instead the bounds (and the
//! peak price encoded by the rotation vector) are re-expressed as ratios to
//! the current spot price and those ratios are reapplied to the inverted
//! spot price.

use {
    super::{
        EclpParams,
        error::Error,
        signed_fixed_point::{SignedFixedPoint, one_hp},
    },
    num::BigInt,
};

/// Base parameters plus the token USD values they were entered against,
/// all at 18-decimal precision.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct InversionInput {
    pub params: EclpParams,
    pub usd_per_token0: BigInt,
    pub usd_per_token1: BigInt,
}

/// Computes the mirrored parameter set for the opposite token order and
/// swaps the two USD values.
///
/// Writing `spot = usd0 / usd1`, the transform maps each of `alpha`, `beta`
/// and the peak price `s / c` through `x -> (1 / spot) * (x / spot)` and
/// rebuilds the rotation unit vector from the mapped peak. Applying it twice
/// reproduces the input up to re-quantization at 18 decimals.
pub fn invert(input: &InversionInput) -> Result<InversionInput, Error> {
    if input.usd_per_token0 <= BigInt::from(0) || input.usd_per_token1 <= BigInt::from(0) {
        return Err(Error::InvalidParams("token usd values must be positive"));
    }
    if input.params.c <= BigInt::from(0) {
        return Err(Error::InvalidParams("rotation component c must be positive"));
    }

    let usd0 = SignedFixedPoint::hp_from_normal(&input.usd_per_token0);
    let usd1 = SignedFixedPoint::hp_from_normal(&input.usd_per_token1);
    let spot = SignedFixedPoint::div_hp(&usd0, &usd1)?;
    let inverted_spot = SignedFixedPoint::div_hp(&usd1, &usd0)?;

    let reapply = |bound: &BigInt| -> Result<BigInt, Error> {
        let offset = SignedFixedPoint::div_hp(&SignedFixedPoint::hp_from_normal(bound), &spot)?;
        Ok(SignedFixedPoint::mul_hp(&inverted_spot, &offset))
    };

    let alpha = reapply(&input.params.alpha)?;
    let beta = reapply(&input.params.beta)?;

    // The rotation encodes the peak price as s / c; carry the peak through
    // the same offset-preserving transform and renormalize.
    let peak = SignedFixedPoint::div_hp(
        &SignedFixedPoint::hp_from_normal(&input.params.s),
        &SignedFixedPoint::hp_from_normal(&input.params.c),
    )?;
    let peak_offset = SignedFixedPoint::div_hp(&peak, &spot)?;
    let inverted_peak = SignedFixedPoint::mul_hp(&inverted_spot, &peak_offset);

    let norm = SignedFixedPoint::sqrt_hp(
        &(one_hp() + SignedFixedPoint::mul_hp(&inverted_peak, &inverted_peak)),
    )?;
    let c = SignedFixedPoint::div_hp(one_hp(), &norm)?;
    let s = SignedFixedPoint::mul_hp(&inverted_peak, &c);

    Ok(InversionInput {
        params: EclpParams {
            alpha: SignedFixedPoint::normal_from_hp(&alpha),
            beta: SignedFixedPoint::normal_from_hp(&beta),
            c: SignedFixedPoint::normal_from_hp(&c),
            s: SignedFixedPoint::normal_from_hp(&s),
            lambda: input.params.lambda.clone(),
        },
        usd_per_token0: input.usd_per_token1.clone(),
        usd_per_token1: input.usd_per_token0.clone(),
    })
}
