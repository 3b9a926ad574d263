//! Ray fixed-point values, precise to 27 digits.

use core::fmt;

use primitive_types::U256;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::LedgerError;
use crate::math::common::{HALF_RAY, PERCENT_SCALER, RAY, SCALE};
use crate::math::{TryAdd, TryDiv, TryMul, TrySub};

/// A non-negative value scaled by 10^27.
///
/// Both accrual factors (liquidity index, liquidity rate) and scaled
/// balances are stored as rays. Multiplication and division round half-up,
/// so identical inputs always produce identical outputs regardless of host
/// hardware.
#[derive(Clone, Copy, Debug, Default, PartialEq, PartialOrd, Eq, Ord)]
pub struct Ray(pub U256);

impl Ray {
    /// One (1.0 at ray scale)
    pub fn one() -> Self {
        Self(Self::ray())
    }

    /// Zero
    pub fn zero() -> Self {
        Self(U256::zero())
    }

    fn ray() -> U256 {
        U256::from(RAY)
    }

    fn half_ray() -> U256 {
        U256::from(HALF_RAY)
    }

    /// Create a ray from a rate in basis points (500 = 5%)
    pub fn from_percent(basis_points: u32) -> Self {
        Self(U256::from(u128::from(basis_points) * PERCENT_SCALER))
    }

    /// Convert back to basis points as a plain integer.
    ///
    /// Loses sub-basis-point precision; display only.
    pub fn to_percent(&self) -> Result<u128, LedgerError> {
        let scaled = self
            .0
            .checked_mul(U256::from(10_000u64))
            .ok_or(LedgerError::MathOverflow)?
            .checked_div(Self::ray())
            .ok_or(LedgerError::MathOverflow)?;
        to_u128(scaled)
    }

    /// Create a ray from a raw scaled value
    pub fn from_scaled_val(scaled_val: u128) -> Self {
        Self(U256::from(scaled_val))
    }

    /// Return the raw scaled value, failing when it no longer fits in u128
    pub fn to_scaled_val(&self) -> Result<u128, LedgerError> {
        to_u128(self.0)
    }

    /// True when the value is exactly zero
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

fn to_u128(value: U256) -> Result<u128, LedgerError> {
    if value > U256::from(u128::MAX) {
        return Err(LedgerError::MathOverflow);
    }
    let words = value.0;
    Ok(u128::from(words[0]) | (u128::from(words[1]) << 64))
}

impl fmt::Display for Ray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut scaled_val = self.0.to_string();
        if scaled_val.len() <= SCALE {
            let padding = "0".repeat(SCALE - scaled_val.len());
            scaled_val = format!("0.{}{}", padding, scaled_val);
        } else {
            scaled_val.insert(scaled_val.len() - SCALE, '.');
        }
        f.write_str(&scaled_val)
    }
}

impl From<u64> for Ray {
    fn from(val: u64) -> Self {
        Self(Self::ray().checked_mul(U256::from(val)).unwrap_or_else(U256::zero))
    }
}

impl From<u128> for Ray {
    fn from(val: u128) -> Self {
        Self(Self::ray().checked_mul(U256::from(val)).unwrap_or_else(U256::zero))
    }
}

impl TryAdd for Ray {
    fn try_add(self, rhs: Self) -> Result<Self, LedgerError> {
        Ok(Self(self.0.checked_add(rhs.0).ok_or(LedgerError::MathOverflow)?))
    }
}

impl TrySub for Ray {
    fn try_sub(self, rhs: Self) -> Result<Self, LedgerError> {
        Ok(Self(self.0.checked_sub(rhs.0).ok_or(LedgerError::MathOverflow)?))
    }
}

impl TryMul<Ray> for Ray {
    /// Half-up ray multiplication: (a * b + RAY / 2) / RAY
    fn try_mul(self, rhs: Self) -> Result<Self, LedgerError> {
        Ok(Self(
            self.0
                .checked_mul(rhs.0)
                .ok_or(LedgerError::MathOverflow)?
                .checked_add(Self::half_ray())
                .ok_or(LedgerError::MathOverflow)?
                .checked_div(Self::ray())
                .ok_or(LedgerError::MathOverflow)?,
        ))
    }
}

impl TryDiv<Ray> for Ray {
    /// Half-up ray division: (a * RAY + b / 2) / b
    fn try_div(self, rhs: Self) -> Result<Self, LedgerError> {
        if rhs.0.is_zero() {
            return Err(LedgerError::DivisionByZero);
        }
        Ok(Self(
            self.0
                .checked_mul(Self::ray())
                .ok_or(LedgerError::MathOverflow)?
                .checked_add(rhs.0 / U256::from(2u64))
                .ok_or(LedgerError::MathOverflow)?
                .checked_div(rhs.0)
                .ok_or(LedgerError::MathOverflow)?,
        ))
    }
}

impl Serialize for Ray {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for Ray {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RayVisitor;

        impl Visitor<'_> for RayVisitor {
            type Value = Ray;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a base-10 integer string at ray scale")
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<Ray, E> {
                U256::from_dec_str(value)
                    .map(Ray)
                    .map_err(|_| E::custom(format!("invalid ray value: {value}")))
            }
        }

        deserializer.deserialize_str(RayVisitor)
    }
}

/// A signed scaled-balance delta.
///
/// Positions store non-negative rays; events carry signed deltas. Zero is
/// normalized to non-negative so equality checks (the idempotency key
/// includes the delta) never distinguish +0 from -0.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SignedRay {
    magnitude: Ray,
    negative: bool,
}

impl SignedRay {
    /// A non-negative delta
    pub fn positive(magnitude: Ray) -> Self {
        Self { magnitude, negative: false }
    }

    /// A non-positive delta
    pub fn negative(magnitude: Ray) -> Self {
        Self { magnitude, negative: !magnitude.is_zero() }
    }

    /// Signed difference `a - b`
    pub fn diff(a: Ray, b: Ray) -> Self {
        if a.0 >= b.0 {
            Self::positive(Ray(a.0 - b.0))
        } else {
            Self::negative(Ray(b.0 - a.0))
        }
    }

    /// Magnitude of the delta
    pub fn abs(&self) -> Ray {
        self.magnitude
    }

    /// True for deltas below zero
    pub fn is_negative(&self) -> bool {
        self.negative
    }

    /// Apply the delta to a non-negative balance.
    ///
    /// Returns `Ok(None)` when the result would be negative — the caller
    /// decides whether that clamps or fails.
    pub fn checked_apply(&self, balance: Ray) -> Result<Option<Ray>, LedgerError> {
        if self.negative {
            Ok(balance.0.checked_sub(self.magnitude.0).map(Ray))
        } else {
            balance.try_add(self.magnitude).map(Some)
        }
    }
}

impl fmt::Display for SignedRay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negative {
            write!(f, "-{}", self.magnitude)
        } else {
            self.magnitude.fmt(f)
        }
    }
}

impl Serialize for SignedRay {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let raw = self.magnitude.0.to_string();
        if self.negative {
            serializer.serialize_str(&format!("-{raw}"))
        } else {
            serializer.serialize_str(&raw)
        }
    }
}

impl<'de> Deserialize<'de> for SignedRay {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SignedRayVisitor;

        impl Visitor<'_> for SignedRayVisitor {
            type Value = SignedRay;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a signed base-10 integer string at ray scale")
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<SignedRay, E> {
                let (digits, negative) = match value.strip_prefix('-') {
                    Some(rest) => (rest, true),
                    None => (value, false),
                };
                let magnitude = U256::from_dec_str(digits)
                    .map(Ray)
                    .map_err(|_| E::custom(format!("invalid signed ray value: {value}")))?;
                Ok(if negative {
                    SignedRay::negative(magnitude)
                } else {
                    SignedRay::positive(magnitude)
                })
            }
        }

        deserializer.deserialize_str(SignedRayVisitor)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn one_is_identity_for_mul_and_div() {
        let value = Ray::from_scaled_val(123_456_789_000_000_000_000_000_000);
        assert_eq!(value.try_mul(Ray::one()).unwrap(), value);
        assert_eq!(value.try_div(Ray::one()).unwrap(), value);
    }

    #[test]
    fn mul_rounds_half_up() {
        // 3 * 0.5 at ray scale = 1.5 raw units, rounds up to 2
        let a = Ray::from_scaled_val(3);
        let half = Ray::from_scaled_val(HALF_RAY);
        assert_eq!(a.try_mul(half).unwrap(), Ray::from_scaled_val(2));
    }

    #[test]
    fn div_mul_round_trip_within_one_unit() {
        let a = Ray::from_scaled_val(1_000_000_000_000_000_000_000);
        let b = Ray::from_percent(733);
        let round_trip = a.try_mul(b).unwrap().try_div(b).unwrap();
        let drift = if round_trip.0 > a.0 { round_trip.0 - a.0 } else { a.0 - round_trip.0 };
        assert!(drift <= U256::one(), "drift {drift} exceeds one unit");
    }

    #[test]
    fn add_and_sub_are_checked() {
        let two = Ray::from(2u64);
        assert_eq!(two, Ray::from_scaled_val(2 * RAY));
        assert_eq!(two.try_add(Ray::one()).unwrap(), Ray::from(3u64));
        assert_eq!(two.try_sub(Ray::one()).unwrap(), Ray::one());
        assert_eq!(Ray::zero().try_sub(Ray::one()).unwrap_err(), LedgerError::MathOverflow);
    }

    #[test]
    fn percent_round_trip() {
        let five_percent = Ray::from_percent(500);
        assert_eq!(five_percent.to_scaled_val().unwrap(), 50_000_000_000_000_000_000_000_000);
        assert_eq!(five_percent.to_percent().unwrap(), 500);
    }

    #[test]
    fn div_by_zero_is_an_error() {
        let err = Ray::one().try_div(Ray::zero()).unwrap_err();
        assert_eq!(err, LedgerError::DivisionByZero);
    }

    #[test]
    fn display_inserts_decimal_point() {
        assert_eq!(Ray::one().to_string(), "1.000000000000000000000000000");
        assert_eq!(Ray::from_scaled_val(5).to_string(), "0.000000000000000000000000005");
    }

    #[test]
    fn signed_zero_normalizes() {
        assert_eq!(SignedRay::negative(Ray::zero()), SignedRay::positive(Ray::zero()));
        assert!(!SignedRay::negative(Ray::zero()).is_negative());
    }

    #[test]
    fn checked_apply_detects_negative_result() {
        let balance = Ray::from_scaled_val(100);
        let withdraw = SignedRay::negative(Ray::from_scaled_val(150));
        assert_eq!(withdraw.checked_apply(balance).unwrap(), None);

        let deposit = SignedRay::positive(Ray::from_scaled_val(50));
        assert_eq!(deposit.checked_apply(balance).unwrap(), Some(Ray::from_scaled_val(150)));
    }

    #[test]
    fn signed_serde_round_trip() {
        let delta = SignedRay::negative(Ray::from_scaled_val(42));
        let json = serde_json::to_string(&delta).unwrap();
        assert_eq!(json, "\"-42\"");
        let back: SignedRay = serde_json::from_str(&json).unwrap();
        assert_eq!(back, delta);
    }
}
