//! Fixed-width 256-bit unsigned integer used for hashes, targets and work.
//!
//! Arithmetic never wraps: addition and multiplication saturate at
//! [`FixedUint256::MAX`], subtraction clamps at zero. Division truncates.

// construct_uint! expands into code clippy has opinions about
#![allow(clippy::manual_div_ceil)]
#![allow(clippy::assign_op_pattern)]

use std::fmt;
use std::ops::{Add, Div, Mul, Sub};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use uint::construct_uint;

construct_uint! {
    struct U256(4);
}

// Headroom for `div_percent`, which scales a 256-bit value before dividing.
construct_uint! {
    struct U512(8);
}

/// Errors raised when a [`FixedUint256`] is misused.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UintError {
    #[error("byte input of {len} bytes does not fit in 256 bits")]
    OutOfRange { len: usize },
    #[error("invalid hex: {0}")]
    InvalidHex(String),
    #[error("invalid decimal: {0}")]
    InvalidDecimal(String),
    #[error("division by zero")]
    DivisionByZero,
}

/// Exact 256-bit unsigned magnitude.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FixedUint256(U256);

impl FixedUint256 {
    pub const ZERO: Self = Self(U256([0, 0, 0, 0]));
    pub const ONE: Self = Self(U256([1, 0, 0, 0]));
    pub const MAX: Self = Self(U256([u64::MAX, u64::MAX, u64::MAX, u64::MAX]));

    /// Little-endian 64-bit limbs: `limbs[0]` is the least significant word.
    pub const fn from_limbs(limbs: [u64; 4]) -> Self {
        Self(U256(limbs))
    }

    pub fn from_u64(value: u64) -> Self {
        Self(U256::from(value))
    }

    /// Build from at most 32 big-endian bytes. Shorter input is zero-extended
    /// on the most-significant side.
    pub fn from_be_bytes(bytes: &[u8]) -> Result<Self, UintError> {
        if bytes.len() > 32 {
            return Err(UintError::OutOfRange { len: bytes.len() });
        }
        let mut padded = [0u8; 32];
        padded[32 - bytes.len()..].copy_from_slice(bytes);
        Ok(Self::from_be_array(padded))
    }

    pub fn from_be_array(bytes: [u8; 32]) -> Self {
        let mut limbs = [0u64; 4];
        for (i, limb) in limbs.iter_mut().enumerate() {
            // limb 0 is least significant, i.e. the last 8 bytes
            let start = 32 - (i + 1) * 8;
            let mut word = [0u8; 8];
            word.copy_from_slice(&bytes[start..start + 8]);
            *limb = u64::from_be_bytes(word);
        }
        Self(U256(limbs))
    }

    pub fn to_be_bytes(&self) -> [u8; 32] {
        let mut bytes = [0u8; 32];
        for (i, limb) in self.0.0.iter().enumerate() {
            let start = 32 - (i + 1) * 8;
            bytes[start..start + 8].copy_from_slice(&limb.to_be_bytes());
        }
        bytes
    }

    /// Canonical form: 64 lowercase hex digits, zero padded.
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_be_bytes())
    }

    /// Parse the canonical form only: exactly 64 lowercase hex digits.
    pub fn from_hex(s: &str) -> Result<Self, UintError> {
        if s.len() != 64 {
            return Err(UintError::InvalidHex(format!(
                "expected 64 hex digits, got {}",
                s.len()
            )));
        }
        if s.bytes().any(|b| b.is_ascii_uppercase()) {
            return Err(UintError::InvalidHex(format!("not lowercase: {s}")));
        }
        let bytes = hex::decode(s).map_err(|e| UintError::InvalidHex(e.to_string()))?;
        Self::from_be_bytes(&bytes)
    }

    pub fn from_dec_str(s: &str) -> Result<Self, UintError> {
        U256::from_dec_str(s)
            .map(Self)
            .map_err(|e| UintError::InvalidDecimal(format!("{s:?}: {e:?}")))
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn saturating_add(self, rhs: Self) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }

    pub fn saturating_sub(self, rhs: Self) -> Self {
        Self(self.0.saturating_sub(rhs.0))
    }

    pub fn mul_scalar(self, k: u64) -> Self {
        Self(self.0.saturating_mul(U256::from(k)))
    }

    pub fn checked_div(self, rhs: Self) -> Result<Self, UintError> {
        if rhs.is_zero() {
            return Err(UintError::DivisionByZero);
        }
        Ok(Self(self.0 / rhs.0))
    }

    pub fn div_scalar(self, k: u64) -> Result<Self, UintError> {
        self.checked_div(Self::from_u64(k))
    }

    /// `self * 100 / other`, truncated to hundredths of a percent.
    pub fn div_percent(self, other: Self) -> Result<Percent, UintError> {
        if other.is_zero() {
            return Err(UintError::DivisionByZero);
        }
        let scaled = self.widen() * U512::from(10_000u64);
        Ok(Percent(scaled / other.widen()))
    }

    fn widen(self) -> U512 {
        let mut limbs = [0u64; 8];
        limbs[..4].copy_from_slice(&self.0.0);
        U512(limbs)
    }
}

/// Exact ratio in hundredths of a percent, rendered as `"12.34"`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Percent(U512);

impl fmt::Display for Percent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hundred = U512::from(100u64);
        write!(f, "{}.{:02}", self.0 / hundred, (self.0 % hundred).low_u64())
    }
}

impl Serialize for Percent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl Add for FixedUint256 {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        self.saturating_add(rhs)
    }
}

impl Sub for FixedUint256 {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        self.saturating_sub(rhs)
    }
}

impl Mul<u64> for FixedUint256 {
    type Output = Self;

    fn mul(self, rhs: u64) -> Self {
        self.mul_scalar(rhs)
    }
}

/// Truncating division.
///
/// # Panics
///
/// Panics if `rhs` is zero, like the primitive integer types. Use
/// [`FixedUint256::checked_div`] when the divisor is not known to be non-zero.
impl Div for FixedUint256 {
    type Output = Self;

    fn div(self, rhs: Self) -> Self {
        match self.checked_div(rhs) {
            Ok(q) => q,
            Err(e) => panic!("FixedUint256 {e}"),
        }
    }
}

/// # Panics
///
/// Panics if `rhs` is zero.
impl Div<u64> for FixedUint256 {
    type Output = Self;

    fn div(self, rhs: u64) -> Self {
        match self.div_scalar(rhs) {
            Ok(q) => q,
            Err(e) => panic!("FixedUint256 {e}"),
        }
    }
}

impl From<u64> for FixedUint256 {
    fn from(value: u64) -> Self {
        Self::from_u64(value)
    }
}

/// Decimal.
impl fmt::Display for FixedUint256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl fmt::Debug for FixedUint256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", self.to_hex())
    }
}

// Serialized as the canonical hex string; hashes and targets travel this way.
impl Serialize for FixedUint256 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for FixedUint256 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Serde adapter for fields carried as decimal strings (chain-work).
pub mod decimal {
    use serde::{Deserialize, Deserializer, Serializer};

    use super::FixedUint256;

    pub fn serialize<S: Serializer>(value: &FixedUint256, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<FixedUint256, D::Error> {
        let s = String::deserialize(deserializer)?;
        FixedUint256::from_dec_str(&s).map_err(serde::de::Error::custom)
    }
}
