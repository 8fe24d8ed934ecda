//! Checked conversions and arithmetic for token counters.
//!
//! Counts arrive from JSON as doubles and are accumulated as unsigned
//! integers; every step that could lose information or wrap reports a
//! typed error instead of silently producing a wrong number.

use crate::error::StatusError;

/// Convert a JSON double to `u64`, truncating toward zero.
///
/// Rejects non-finite values, negatives, and values above `u64::MAX`.
pub fn f64_to_u64(value: f64) -> Result<u64, StatusError> {
    if !value.is_finite() || value < 0.0 {
        return Err(StatusError::InvalidConversion);
    }
    if value > u64::MAX as f64 {
        return Err(StatusError::InvalidConversion);
    }
    Ok(value as u64)
}

/// Convert a JSON double to `u32`, truncating toward zero.
pub fn f64_to_u32(value: f64) -> Result<u32, StatusError> {
    if !value.is_finite() || value < 0.0 {
        return Err(StatusError::InvalidConversion);
    }
    if value > u32::MAX as f64 {
        return Err(StatusError::InvalidConversion);
    }
    Ok(value as u32)
}

/// Convert a signed file offset to an unsigned size.
pub fn i64_to_u64(value: i64) -> Result<u64, StatusError> {
    u64::try_from(value).map_err(|_| StatusError::InvalidConversion)
}

pub fn add_u64(a: u64, b: u64) -> Result<u64, StatusError> {
    a.checked_add(b).ok_or(StatusError::Overflow)
}

pub fn add_u32(a: u32, b: u32) -> Result<u32, StatusError> {
    a.checked_add(b).ok_or(StatusError::Overflow)
}

pub fn mul_u64(a: u64, b: u64) -> Result<u64, StatusError> {
    a.checked_mul(b).ok_or(StatusError::Overflow)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn f64_to_u64_truncates_toward_zero() {
        assert_eq!(f64_to_u64(0.0).unwrap(), 0);
        assert_eq!(f64_to_u64(1.9).unwrap(), 1);
        assert_eq!(f64_to_u64(270.0).unwrap(), 270);
    }

    #[test]
    fn f64_to_u64_rejects_invalid_values() {
        assert!(matches!(
            f64_to_u64(-1.0),
            Err(StatusError::InvalidConversion)
        ));
        assert!(matches!(
            f64_to_u64(f64::NAN),
            Err(StatusError::InvalidConversion)
        ));
        assert!(matches!(
            f64_to_u64(f64::INFINITY),
            Err(StatusError::InvalidConversion)
        ));
    }

    #[test]
    fn f64_to_u32_rejects_out_of_range() {
        assert_eq!(f64_to_u32(4294967295.0).unwrap(), u32::MAX);
        assert!(matches!(
            f64_to_u32(4294967296.0),
            Err(StatusError::InvalidConversion)
        ));
        assert!(matches!(
            f64_to_u32(-0.5),
            Err(StatusError::InvalidConversion)
        ));
    }

    #[test]
    fn i64_to_u64_rejects_negative() {
        assert_eq!(i64_to_u64(0).unwrap(), 0);
        assert_eq!(i64_to_u64(i64::MAX).unwrap(), i64::MAX as u64);
        assert!(matches!(
            i64_to_u64(-1),
            Err(StatusError::InvalidConversion)
        ));
    }

    #[test]
    fn add_u64_detects_overflow() {
        assert_eq!(add_u64(1, 2).unwrap(), 3);
        assert_eq!(add_u64(u64::MAX, 0).unwrap(), u64::MAX);
        assert!(matches!(add_u64(u64::MAX, 1), Err(StatusError::Overflow)));
    }

    #[test]
    fn add_u32_detects_overflow() {
        assert_eq!(add_u32(u32::MAX - 1, 1).unwrap(), u32::MAX);
        assert!(matches!(add_u32(u32::MAX, 1), Err(StatusError::Overflow)));
    }

    #[test]
    fn mul_u64_zero_operand_is_zero() {
        assert_eq!(mul_u64(0, u64::MAX).unwrap(), 0);
        assert_eq!(mul_u64(u64::MAX, 0).unwrap(), 0);
        assert_eq!(mul_u64(7, 100).unwrap(), 700);
        assert!(matches!(
            mul_u64(u64::MAX, 2),
            Err(StatusError::Overflow)
        ));
    }
}
