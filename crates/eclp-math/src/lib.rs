//! Deterministic fixed-point mathematics for Gyroscope E-CLP (Elliptic
//! Constant Liquidity Pool) parameter derivation.
//!
//! The pool contract expects the expensive derived quantities (`tauAlpha`,
//! `tauBeta`, `u`, `v`, `w`, `z`, `dSq`) to be precomputed off-chain from the
//! base parameters (`alpha`, `beta`, `c`, `s`, `lambda`) and submitted
//! alongside them at deployment. The contract re-validates both sets, so the
//! off-chain derivation must agree with the on-chain arithmetic exactly:
//! everything here is integer fixed-point math over `num::BigInt`, carried at
//! 100 decimals internally and rescaled to the contract's 38-decimal
//! representation at the end. No floating point anywhere.
//!
//! This crate performs no I/O and holds no mutable state. Expected domain
//! errors (parameters out of range) are reported through [`Error`]; the
//! arithmetic itself never silently wraps.

mod error;
pub mod inversion;
pub mod signed_fixed_point;

pub use {
    error::Error,
    inversion::{InversionInput, invert},
};

use {
    num::BigInt,
    signed_fixed_point::{SignedFixedPoint, one, one_hp, one_xp},
    std::sync::LazyLock,
};

// Anti-overflow limits enforced by the pool contract on base parameters.
const ROTATION_VECTOR_NORM_ACCURACY: u64 = 1_000; // 1e3 (1e-15 in normal precision)
static MAX_STRETCH_FACTOR: LazyLock<BigInt> = LazyLock::new(|| BigInt::from(10).pow(26)); // 1e8 in normal precision

// Limits enforced on derived parameters (38-decimal precision).
const DERIVED_TAU_NORM_ACCURACY_XP: u128 = 100_000_000_000_000_000_000_000; // 1e23
const DERIVED_DSQ_NORM_ACCURACY_XP: u128 = 100_000_000_000_000_000_000_000; // 1e23

/// Two-dimensional vector used in E-CLP calculations.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Vector2 {
    pub x: BigInt,
    pub y: BigInt,
}

impl Vector2 {
    pub fn new(x: BigInt, y: BigInt) -> Self {
        Self { x, y }
    }
}

/// E-CLP base parameters at 18-decimal precision.
///
/// `alpha` and `beta` are the lower and upper price bounds, `(c, s)` the
/// rotation unit vector and `lambda` the stretching factor of the ellipse.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EclpParams {
    pub alpha: BigInt,
    pub beta: BigInt,
    pub c: BigInt,
    pub s: BigInt,
    pub lambda: BigInt,
}

/// Derived E-CLP parameters at 38-decimal precision, as submitted to the
/// pool factory.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DerivedEclpParams {
    pub tau_alpha: Vector2,
    pub tau_beta: Vector2,
    pub u: BigInt,
    pub v: BigInt,
    pub w: BigInt,
    pub z: BigInt,
    pub d_sq: BigInt,
}

/// Validates base parameters against the limits the pool contract enforces
/// in `GyroECLPMath.validateParams`.
pub fn validate_params(params: &EclpParams) -> Result<(), Error> {
    let zero = BigInt::from(0);
    if params.s < zero || params.s > *one() {
        return Err(Error::InvalidParams("s must be in [0, 1]"));
    }
    if params.c < zero || params.c > *one() {
        return Err(Error::InvalidParams("c must be in [0, 1]"));
    }
    let scnorm2 = SignedFixedPoint::add(
        &SignedFixedPoint::mul_down_mag(&params.s, &params.s)?,
        &SignedFixedPoint::mul_down_mag(&params.c, &params.c)?,
    )?;
    let accuracy = BigInt::from(ROTATION_VECTOR_NORM_ACCURACY);
    if scnorm2 < &*one() - &accuracy || scnorm2 > &*one() + &accuracy {
        return Err(Error::InvalidParams("rotation vector is not normalized"));
    }
    if params.lambda <= zero || params.lambda > *MAX_STRETCH_FACTOR {
        return Err(Error::InvalidParams("stretching factor out of range"));
    }
    if params.alpha <= zero || params.alpha >= params.beta {
        return Err(Error::InvalidParams("price bounds must satisfy 0 < alpha < beta"));
    }
    Ok(())
}

/// Validates derived parameters against the limits the pool contract
/// enforces in `GyroECLPMath.validateDerivedParamsLimits`.
pub fn validate_derived_params(derived: &DerivedEclpParams) -> Result<(), Error> {
    let tau_accuracy = BigInt::from(DERIVED_TAU_NORM_ACCURACY_XP);
    for (tau, name) in [
        (&derived.tau_alpha, "tauAlpha is not normalized"),
        (&derived.tau_beta, "tauBeta is not normalized"),
    ] {
        let norm2 = scalar_prod_xp(tau, tau)?;
        if norm2 < &*one_xp() - &tau_accuracy || norm2 > &*one_xp() + &tau_accuracy {
            return Err(Error::InvalidDerivedParams(name));
        }
    }
    for (value, name) in [
        (&derived.u, "u exceeds one"),
        (&derived.v, "v exceeds one"),
        (&derived.w, "w exceeds one"),
        (&derived.z, "z exceeds one"),
    ] {
        if *value > *one_xp() {
            return Err(Error::InvalidDerivedParams(name));
        }
    }
    let dsq_accuracy = BigInt::from(DERIVED_DSQ_NORM_ACCURACY_XP);
    if derived.d_sq < &*one_xp() - &dsq_accuracy || derived.d_sq > &*one_xp() + &dsq_accuracy {
        return Err(Error::InvalidDerivedParams("dSq is not normalized"));
    }
    Ok(())
}

/// Extended precision scalar product of two 38-decimal vectors.
pub fn scalar_prod_xp(t1: &Vector2, t2: &Vector2) -> Result<BigInt, Error> {
    let x_prod = SignedFixedPoint::mul_xp(&t1.x, &t2.x)?;
    let y_prod = SignedFixedPoint::mul_xp(&t1.y, &t2.y)?;
    SignedFixedPoint::add(&x_prod, &y_prod)
}

/// Computes the derived parameters from the base parameters.
///
/// Internally everything is carried at 100-decimal precision: the nested
/// square roots would otherwise compound truncation error past the
/// contract's `DERIVED_TAU_NORM_ACCURACY_XP` tolerance and initialization
/// would revert. Outputs are rescaled to 38 decimals.
///
/// For base parameters passing [`validate_params`] the result passes
/// [`validate_derived_params`]; callers are expected to check both before
/// submission so the two failure conditions stay independently reportable.
pub fn derive(params: &EclpParams) -> Result<DerivedEclpParams, Error> {
    let c = SignedFixedPoint::hp_from_normal(&params.c);
    let s = SignedFixedPoint::hp_from_normal(&params.s);
    let lambda = SignedFixedPoint::hp_from_normal(&params.lambda);
    let alpha = SignedFixedPoint::hp_from_normal(&params.alpha);
    let beta = SignedFixedPoint::hp_from_normal(&params.beta);

    if lambda == BigInt::from(0) {
        return Err(Error::InvalidParams("stretching factor out of range"));
    }

    // dSq = c^2 + s^2; exactly one for a unit rotation vector, carried
    // through because the contract tolerates (and re-checks) small drift.
    let d_sq = SignedFixedPoint::mul_hp(&c, &c) + SignedFixedPoint::mul_hp(&s, &s);
    let d = SignedFixedPoint::sqrt_hp(&d_sq)?;

    let tau_alpha = tau(&c, &s, &lambda, &d, &alpha)?;
    let tau_beta = tau(&c, &s, &lambda, &d, &beta)?;

    let s_c = SignedFixedPoint::mul_hp(&s, &c);
    let c_sq = SignedFixedPoint::mul_hp(&c, &c);
    let s_sq = SignedFixedPoint::mul_hp(&s, &s);

    let w = SignedFixedPoint::mul_hp(&s_c, &(&tau_beta.y - &tau_alpha.y));
    let z = SignedFixedPoint::mul_hp(&c_sq, &tau_beta.x) + SignedFixedPoint::mul_hp(&s_sq, &tau_alpha.x);
    let u = SignedFixedPoint::mul_hp(&s_c, &(&tau_beta.x - &tau_alpha.x));
    let v = SignedFixedPoint::mul_hp(&s_sq, &tau_beta.y) + SignedFixedPoint::mul_hp(&c_sq, &tau_alpha.y);

    Ok(DerivedEclpParams {
        tau_alpha: Vector2::new(
            SignedFixedPoint::xp_from_hp(&tau_alpha.x),
            SignedFixedPoint::xp_from_hp(&tau_alpha.y),
        ),
        tau_beta: Vector2::new(
            SignedFixedPoint::xp_from_hp(&tau_beta.x),
            SignedFixedPoint::xp_from_hp(&tau_beta.y),
        ),
        u: SignedFixedPoint::xp_from_hp(&u),
        v: SignedFixedPoint::xp_from_hp(&v),
        w: SignedFixedPoint::xp_from_hp(&w),
        z: SignedFixedPoint::xp_from_hp(&z),
        d_sq: SignedFixedPoint::xp_from_hp(&d_sq),
    })
}

/// The normalized image of price `p` under the inverse elliptical
/// transformation, at 100-decimal precision:
///
/// ```text
/// dP     = 1 / sqrt( ((p*c - s) / d)^2 / lambda^2 + ((c + p*s) / d)^2 )
/// tau(p) = ( (p*c - s) * dP / lambda , (c + p*s) * dP )
/// ```
///
/// The scalar product of the result with itself equals `dSq`, which the
/// receiving contract separately requires to sit within tolerance of one.
fn tau(c: &BigInt, s: &BigInt, lambda: &BigInt, d: &BigInt, p: &BigInt) -> Result<Vector2, Error> {
    let x_raw = SignedFixedPoint::mul_hp(p, c) - s;
    let y_raw = c + SignedFixedPoint::mul_hp(p, s);

    let x_scaled = SignedFixedPoint::div_hp(&x_raw, d)?;
    let y_scaled = SignedFixedPoint::div_hp(&y_raw, d)?;

    let lambda_sq = SignedFixedPoint::mul_hp(lambda, lambda);
    let norm_sq = SignedFixedPoint::div_hp(
        &SignedFixedPoint::mul_hp(&x_scaled, &x_scaled),
        &lambda_sq,
    )? + SignedFixedPoint::mul_hp(&y_scaled, &y_scaled);

    let d_p = SignedFixedPoint::div_hp(one_hp(), &SignedFixedPoint::sqrt_hp(&norm_sq)?)?;

    let x = SignedFixedPoint::div_hp(&SignedFixedPoint::mul_hp(&x_raw, &d_p), lambda)?;
    let y = SignedFixedPoint::mul_hp(&y_raw, &d_p);
    Ok(Vector2::new(x, y))
}
