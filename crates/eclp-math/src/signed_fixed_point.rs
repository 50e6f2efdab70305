//! Signed fixed-point arithmetic over `num::BigInt` at the three precisions
//! the E-CLP derivation moves between: 18 decimals (base parameters, the
//! pool contract's normal precision), 38 decimals (derived parameters, the
//! contract's extra precision) and 100 decimals (internal working precision
//! for the nested square roots).
//!
//! All rounding is floor division toward negative infinity, matching the
//! reference derivation; the residual error this leaves is far inside the
//! tolerances the contract enforces on the derived values.

use {super::error::Error, num::BigInt, std::sync::LazyLock};

static ONE_18: LazyLock<BigInt> = LazyLock::new(|| BigInt::from(10).pow(18));
static ONE_38: LazyLock<BigInt> = LazyLock::new(|| BigInt::from(10).pow(38));
static ONE_100: LazyLock<BigInt> = LazyLock::new(|| BigInt::from(10).pow(100));
// Scale jumps: 18 -> 100 and 100 -> 38.
static E_82: LazyLock<BigInt> = LazyLock::new(|| BigInt::from(10).pow(82));
static E_62: LazyLock<BigInt> = LazyLock::new(|| BigInt::from(10).pow(62));

/// ONE = 1e18 (normal precision).
pub fn one() -> &'static BigInt {
    &ONE_18
}

/// ONE_XP = 1e38 (extra precision).
pub fn one_xp() -> &'static BigInt {
    &ONE_38
}

/// ONE_HP = 1e100 (internal high precision).
pub fn one_hp() -> &'static BigInt {
    &ONE_100
}

pub struct SignedFixedPoint;

impl SignedFixedPoint {
    /// Floor division rounding toward negative infinity.
    fn floor_div(dividend: &BigInt, divisor: &BigInt) -> BigInt {
        let quotient = dividend / divisor;
        let remainder = dividend % divisor;
        if remainder == BigInt::from(0)
            || (dividend >= &BigInt::from(0)) == (divisor >= &BigInt::from(0))
        {
            quotient
        } else {
            quotient - 1
        }
    }

    /// Signed addition with overflow checking.
    pub fn add(a: &BigInt, b: &BigInt) -> Result<BigInt, Error> {
        let c = a + b;
        if !((b >= &BigInt::from(0) && &c >= a) || (b < &BigInt::from(0) && &c < a)) {
            return Err(Error::AddOverflow);
        }
        Ok(c)
    }

    /// Signed subtraction with overflow checking.
    pub fn sub(a: &BigInt, b: &BigInt) -> Result<BigInt, Error> {
        let c = a - b;
        if !((b <= &BigInt::from(0) && &c >= a) || (b > &BigInt::from(0) && &c < a)) {
            return Err(Error::SubOverflow);
        }
        Ok(c)
    }

    /// Multiply at normal precision with downward magnitude rounding.
    pub fn mul_down_mag(a: &BigInt, b: &BigInt) -> Result<BigInt, Error> {
        let product = a * b;
        if !(a == &BigInt::from(0) || Self::floor_div(&product, a) == *b) {
            return Err(Error::MulOverflow);
        }
        Ok(Self::floor_div(&product, &ONE_18))
    }

    /// Divide at normal precision with downward magnitude rounding.
    pub fn div_down_mag(a: &BigInt, b: &BigInt) -> Result<BigInt, Error> {
        if b == &BigInt::from(0) {
            return Err(Error::ZeroDivision);
        }
        if a == &BigInt::from(0) {
            return Ok(BigInt::from(0));
        }
        Ok(Self::floor_div(&(a * &*ONE_18), b))
    }

    /// Multiply at extra precision.
    pub fn mul_xp(a: &BigInt, b: &BigInt) -> Result<BigInt, Error> {
        let product = a * b;
        if !(a == &BigInt::from(0) || Self::floor_div(&product, a) == *b) {
            return Err(Error::MulOverflow);
        }
        Ok(Self::floor_div(&product, &ONE_38))
    }

    /// Divide at extra precision.
    pub fn div_xp(a: &BigInt, b: &BigInt) -> Result<BigInt, Error> {
        if b == &BigInt::from(0) {
            return Err(Error::ZeroDivision);
        }
        Ok(Self::floor_div(&(a * &*ONE_38), b))
    }

    /// Multiply at high precision, dividing out one factor of the
    /// 100-decimal base.
    pub fn mul_hp(a: &BigInt, b: &BigInt) -> BigInt {
        Self::floor_div(&(a * b), &ONE_100)
    }

    /// Divide at high precision.
    pub fn div_hp(a: &BigInt, b: &BigInt) -> Result<BigInt, Error> {
        if b == &BigInt::from(0) {
            return Err(Error::ZeroDivision);
        }
        Ok(Self::floor_div(&(a * &*ONE_100), b))
    }

    /// Square root at high precision via integer Newton iteration on the
    /// inflated argument: `sqrt(x / 1e100) * 1e100 == isqrt(x * 1e100)`.
    /// Exact floor result, independent of any floating point.
    pub fn sqrt_hp(x: &BigInt) -> Result<BigInt, Error> {
        if x < &BigInt::from(0) {
            return Err(Error::NegativeSqrt);
        }
        Ok(Self::isqrt(&(x * &*ONE_100)))
    }

    /// Floor integer square root.
    fn isqrt(n: &BigInt) -> BigInt {
        if n <= &BigInt::from(1) {
            return n.clone();
        }
        // Seed above the root from the bit length, then Newton iterations
        // decrease monotonically until they stabilize at the floor root.
        let mut guess: BigInt = BigInt::from(1) << (n.bits().div_ceil(2) as usize);
        loop {
            let next = (&guess + n / &guess) >> 1;
            if next >= guess {
                return guess;
            }
            guess = next;
        }
    }

    /// Rescales an 18-decimal value to the internal 100-decimal precision.
    pub fn hp_from_normal(x: &BigInt) -> BigInt {
        x * &*E_82
    }

    /// Rescales a 100-decimal value to the 38-decimal contract precision.
    pub fn xp_from_hp(x: &BigInt) -> BigInt {
        Self::floor_div(x, &E_62)
    }

    /// Rescales a 100-decimal value back to 18 decimals, rounding to
    /// nearest. Used when re-deriving base parameters (inversion), where
    /// symmetric rounding keeps the round trip inside one unit.
    pub fn normal_from_hp(x: &BigInt) -> BigInt {
        let half = &*E_82 >> 1;
        if x >= &BigInt::from(0) {
            Self::floor_div(&(x + half), &E_82)
        } else {
            -Self::floor_div(&(-x + half), &E_82)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constants() {
        assert_eq!(*one(), BigInt::from(10).pow(18));
        assert_eq!(*one_xp(), BigInt::from(10).pow(38));
        assert_eq!(*one_hp(), BigInt::from(10).pow(100));
    }

    #[test]
    fn mul_down_mag_scales_out_one_factor() {
        let a = BigInt::from(2) * &*ONE_18;
        let b = BigInt::from(3) * &*ONE_18;
        assert_eq!(
            SignedFixedPoint::mul_down_mag(&a, &b).unwrap(),
            BigInt::from(6) * &*ONE_18
        );
    }

    #[test]
    fn floor_div_rounds_toward_negative_infinity() {
        assert_eq!(
            SignedFixedPoint::floor_div(&BigInt::from(-7), &BigInt::from(2)),
            BigInt::from(-4)
        );
        assert_eq!(
            SignedFixedPoint::floor_div(&BigInt::from(7), &BigInt::from(2)),
            BigInt::from(3)
        );
    }

    #[test]
    fn div_by_zero_is_an_error() {
        assert_eq!(
            SignedFixedPoint::div_hp(one_hp(), &BigInt::from(0)),
            Err(Error::ZeroDivision)
        );
    }

    #[test]
    fn sqrt_hp_of_perfect_squares() {
        let four = BigInt::from(4) * &*ONE_100;
        assert_eq!(
            SignedFixedPoint::sqrt_hp(&four).unwrap(),
            BigInt::from(2) * &*ONE_100
        );
        assert_eq!(SignedFixedPoint::sqrt_hp(one_hp()).unwrap(), *one_hp());
        assert_eq!(
            SignedFixedPoint::sqrt_hp(&BigInt::from(0)).unwrap(),
            BigInt::from(0)
        );
    }

    #[test]
    fn sqrt_hp_matches_known_irrational_prefix() {
        // sqrt(2) = 1.41421356237309504880...
        let root = SignedFixedPoint::sqrt_hp(&(BigInt::from(2) * &*ONE_100)).unwrap();
        let prefix = SignedFixedPoint::floor_div(&root, &BigInt::from(10).pow(80));
        assert_eq!(prefix, "141421356237309504880".parse::<BigInt>().unwrap());
    }

    #[test]
    fn sqrt_hp_squares_back_within_tolerance() {
        for value in [3_u64, 5, 7, 123_456_789] {
            let x = BigInt::from(value) * &*ONE_100;
            let root = SignedFixedPoint::sqrt_hp(&x).unwrap();
            let squared = SignedFixedPoint::mul_hp(&root, &root);
            let diff = if squared > x { &squared - &x } else { &x - &squared };
            // Floor isqrt error is below one unit of the scaled root.
            assert!(diff <= BigInt::from(3) * &root / &*ONE_100 + 1_u8);
        }
    }

    #[test]
    fn sqrt_of_negative_is_rejected() {
        assert_eq!(
            SignedFixedPoint::sqrt_hp(&BigInt::from(-1)),
            Err(Error::NegativeSqrt)
        );
    }

    #[test]
    fn normal_from_hp_rounds_to_nearest() {
        let x = &*E_82 * 3 + (&*E_82 >> 1);
        assert_eq!(SignedFixedPoint::normal_from_hp(&x), BigInt::from(4));
        let y = &*E_82 * 3 + (&*E_82 >> 2);
        assert_eq!(SignedFixedPoint::normal_from_hp(&y), BigInt::from(3));
        assert_eq!(SignedFixedPoint::normal_from_hp(&-x), BigInt::from(-4));
    }
}
