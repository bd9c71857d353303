//! Fixed-width modular arithmetic helpers.
//!
//! Every scalar the engine transforms is treated as an unsigned integer of its
//! declared bit width (8, 16, 32 or 64 bits). These helpers perform wrapping
//! arithmetic, rotations and multiplicative inverses modulo `2^bits`, always
//! returning values already masked to the requested width.

/// Returns the mask selecting the low `bits` bits of a `u64`.
///
/// Widths of 64 or more produce `u64::MAX`; a width of 0 produces 0.
///
/// # Examples
///
/// ```rust,ignore
/// use obscura::utils::width_mask;
///
/// assert_eq!(width_mask(8), 0xFF);
/// assert_eq!(width_mask(64), u64::MAX);
/// ```
#[must_use]
pub const fn width_mask(bits: u32) -> u64 {
    if bits >= 64 {
        u64::MAX
    } else {
        (1u64 << bits) - 1
    }
}

/// Rotates the low `bits` bits of `value` left by `amount`.
///
/// The amount is reduced modulo `bits`. Bits above the width are ignored.
#[must_use]
pub fn rotate_left(value: u64, amount: u32, bits: u32) -> u64 {
    let mask = width_mask(bits);
    let value = value & mask;
    if bits == 0 {
        return 0;
    }
    let amount = amount % bits;
    if amount == 0 {
        return value;
    }
    ((value << amount) | (value >> (bits - amount))) & mask
}

/// Rotates the low `bits` bits of `value` right by `amount`.
///
/// The amount is reduced modulo `bits`. Bits above the width are ignored.
#[must_use]
pub fn rotate_right(value: u64, amount: u32, bits: u32) -> u64 {
    if bits == 0 {
        return 0;
    }
    rotate_left(value, bits - (amount % bits), bits)
}

/// Computes the multiplicative inverse of an odd `value` modulo `2^bits`.
///
/// Uses Newton-Raphson iteration: each step doubles the number of correct low bits,
/// so six steps cover 64-bit widths starting from the 3 bits an odd number is its
/// own inverse for.
///
/// Returns `None` if `value` is even (even numbers have no inverse modulo a power of two).
///
/// # Examples
///
/// ```rust,ignore
/// use obscura::utils::mul_inverse;
///
/// let inv = mul_inverse(3, 8).unwrap();
/// assert_eq!((3 * inv) & 0xFF, 1);
/// ```
#[must_use]
pub fn mul_inverse(value: u64, bits: u32) -> Option<u64> {
    if value & 1 == 0 {
        return None;
    }

    let mut inverse = value;
    for _ in 0..6 {
        inverse = inverse.wrapping_mul(2u64.wrapping_sub(value.wrapping_mul(inverse)));
    }

    Some(inverse & width_mask(bits))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_width_mask() {
        assert_eq!(width_mask(0), 0);
        assert_eq!(width_mask(1), 1);
        assert_eq!(width_mask(8), 0xFF);
        assert_eq!(width_mask(16), 0xFFFF);
        assert_eq!(width_mask(32), 0xFFFF_FFFF);
        assert_eq!(width_mask(64), u64::MAX);
        assert_eq!(width_mask(128), u64::MAX);
    }

    #[test]
    fn test_rotate_matches_std() {
        for amount in 0..40 {
            assert_eq!(
                rotate_left(0x1234_5678, amount, 32),
                u64::from(0x1234_5678u32.rotate_left(amount))
            );
            assert_eq!(
                rotate_right(0xA5, amount, 8),
                u64::from(0xA5u8.rotate_right(amount))
            );
            assert_eq!(
                rotate_left(0xDEAD_BEEF_0BAD_F00D, amount, 64),
                0xDEAD_BEEF_0BAD_F00Du64.rotate_left(amount)
            );
        }
    }

    #[test]
    fn test_rotate_ignores_high_bits() {
        assert_eq!(rotate_left(0xFF01, 1, 8), 0x02);
        assert_eq!(rotate_right(0xFF01, 1, 8), 0x80);
    }

    #[test]
    fn test_mul_inverse() {
        for bits in [8u32, 16, 32, 64] {
            for value in [1u64, 3, 5, 0x9E37_79B9, 0xFFFF_FFFF_FFFF_FFFF, 0x1234_5677] {
                let value = value & width_mask(bits) | 1;
                let inverse = mul_inverse(value, bits).unwrap();
                assert_eq!(value.wrapping_mul(inverse) & width_mask(bits), 1);
            }
        }
    }

    #[test]
    fn test_mul_inverse_even() {
        assert_eq!(mul_inverse(0, 32), None);
        assert_eq!(mul_inverse(2, 32), None);
        assert_eq!(mul_inverse(0x100, 8), None);
    }
}
