//! Fixed-precision amount scaling.
//!
//! Commitments carry integer values scaled by a configured precision factor;
//! display amounts cross the engine boundary through [`to_precision`] and come
//! back through [`from_precision`]. Both directions are exact or fail —
//! floating point never enters a commitment.

use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PrecisionError {
    #[error("precision factor must be non-zero")]
    ZeroFactor,

    #[error("amount {amount} overflows at precision factor {factor}")]
    Overflow { amount: u64, factor: u64 },

    #[error("raw value {raw} is not a multiple of precision factor {factor}")]
    Remainder { raw: u64, factor: u64 },
}

/// Scale a display amount up to its raw on-chain representation.
pub fn to_precision(amount: u64, factor: u64) -> Result<u64, PrecisionError> {
    if factor == 0 {
        return Err(PrecisionError::ZeroFactor);
    }
    amount
        .checked_mul(factor)
        .ok_or(PrecisionError::Overflow { amount, factor })
}

/// Decode a raw on-chain value back to display units. Raw values produced by
/// scaling and by sums/differences of scaled values divide exactly; anything
/// else is a protocol violation, not a rounding opportunity.
pub fn from_precision(raw: u64, factor: u64) -> Result<u64, PrecisionError> {
    if factor == 0 {
        return Err(PrecisionError::ZeroFactor);
    }
    if raw % factor != 0 {
        return Err(PrecisionError::Remainder { raw, factor });
    }
    Ok(raw / factor)
}
