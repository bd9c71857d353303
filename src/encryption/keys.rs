//! Deterministic per-iteration key material.
//!
//! Keys are a pure function of `(seed, unit id, declaration name, level,
//! iteration)` hashed through SHA-256. Rebuilding an unchanged unit with the same
//! seed therefore reproduces byte-identical ciphertext and decode sequences.

use std::fmt;

use sha2::{Digest, Sha256};

use crate::{
    config::Level,
    utils::{mul_inverse, width_mask},
};

/// Multiplier applied to the element index when deriving per-element keys.
pub const KEY_STRIDE: u64 = 0x9E37_79B9_7F4A_7C15;
/// Multiplier applied to the element index when deriving per-element salts.
pub const SALT_STRIDE: u64 = 0xC2B2_AE3D_27D4_EB4F;

/// Key material of one iteration of one level.
///
/// All fields are 64 bits wide and truncated to the element width at use. Array
/// and vector elements derive distinct keys and salts from their index so equal
/// plaintext elements never produce equal ciphertext.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IterationKey {
    /// Level this key belongs to.
    pub level: Level,
    /// Zero-based iteration index within the level.
    pub iteration: u32,
    /// XOR key.
    pub key: u64,
    /// Additive salt (Deep only).
    pub salt: u64,
    /// Odd multiplier (Deep only).
    pub multiplier: u64,
    /// Raw rotation amount (Deep only).
    pub rotation: u32,
}

impl IterationKey {
    /// XOR key of element `index` at `bits` width.
    #[must_use]
    pub const fn element_key(&self, index: u64, bits: u32) -> u64 {
        (self.key ^ index.wrapping_mul(KEY_STRIDE)) & width_mask(bits)
    }

    /// Additive salt of element `index` at `bits` width.
    #[must_use]
    pub const fn element_salt(&self, index: u64, bits: u32) -> u64 {
        self.salt.wrapping_add(index.wrapping_mul(SALT_STRIDE)) & width_mask(bits)
    }

    /// Odd multiplier at `bits` width.
    #[must_use]
    pub const fn multiplier(&self, bits: u32) -> u64 {
        (self.multiplier | 1) & width_mask(bits)
    }

    /// Inverse of [`multiplier`](Self::multiplier) modulo `2^bits`.
    #[must_use]
    pub fn inverse_multiplier(&self, bits: u32) -> u64 {
        // The multiplier is odd, so the inverse always exists.
        mul_inverse(self.multiplier(bits), bits).unwrap_or(1)
    }

    /// Rotation amount at `bits` width, in `1..bits`.
    #[must_use]
    pub const fn rotation(&self, bits: u32) -> u32 {
        if bits <= 1 {
            return 0;
        }
        self.rotation % (bits - 1) + 1
    }
}

impl fmt::Display for IterationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}#{} key={:#018x} salt={:#018x} mul={:#018x} rot={}",
            self.level, self.iteration, self.key, self.salt, self.multiplier, self.rotation
        )
    }
}

/// Derives [`IterationKey`]s for the declarations of one unit.
#[derive(Debug, Clone)]
pub struct KeySchedule<'a> {
    seed: u64,
    unit_id: &'a str,
}

impl<'a> KeySchedule<'a> {
    /// Creates a schedule for a unit.
    #[must_use]
    pub const fn new(seed: u64, unit_id: &'a str) -> Self {
        Self { seed, unit_id }
    }

    /// Derives the key of one iteration of one level for a declaration.
    #[must_use]
    pub fn derive(&self, declaration: &str, level: Level, iteration: u32) -> IterationKey {
        let mut hasher = Sha256::new();
        hasher.update(b"obscura.key.v1");
        hasher.update(self.seed.to_le_bytes());
        update_field(&mut hasher, self.unit_id.as_bytes());
        update_field(&mut hasher, declaration.as_bytes());
        hasher.update([match level {
            Level::Lite => 1u8,
            Level::Deep => 2u8,
        }]);
        hasher.update(iteration.to_le_bytes());
        let digest = hasher.finalize();

        let word = |offset: usize| {
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(&digest[offset..offset + 8]);
            u64::from_le_bytes(bytes)
        };

        IterationKey {
            level,
            iteration,
            key: word(0),
            salt: word(8),
            multiplier: word(16) | 1,
            rotation: u32::from(digest[24]),
        }
    }

    /// Derives `iterations` keys of one level, in iteration order.
    #[must_use]
    pub fn derive_level(&self, declaration: &str, level: Level, iterations: u32) -> Vec<IterationKey> {
        (0..iterations)
            .map(|iteration| self.derive(declaration, level, iteration))
            .collect()
    }
}

fn update_field(hasher: &mut Sha256, bytes: &[u8]) {
    hasher.update((bytes.len() as u64).to_le_bytes());
    hasher.update(bytes);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derivation_is_deterministic() {
        let schedule = KeySchedule::new(7, "unit.c");
        assert_eq!(
            schedule.derive("secret_key", Level::Deep, 2),
            KeySchedule::new(7, "unit.c").derive("secret_key", Level::Deep, 2)
        );
    }

    #[test]
    fn test_derivation_depends_on_every_input() {
        let base = KeySchedule::new(7, "unit.c").derive("secret_key", Level::Lite, 0);
        let variants = [
            KeySchedule::new(8, "unit.c").derive("secret_key", Level::Lite, 0),
            KeySchedule::new(7, "other.c").derive("secret_key", Level::Lite, 0),
            KeySchedule::new(7, "unit.c").derive("api_token", Level::Lite, 0),
            KeySchedule::new(7, "unit.c").derive("secret_key", Level::Deep, 0),
            KeySchedule::new(7, "unit.c").derive("secret_key", Level::Lite, 1),
        ];
        for variant in variants {
            assert_ne!(base.key, variant.key);
        }
    }

    #[test]
    fn test_field_boundaries_are_unambiguous() {
        let a = KeySchedule::new(0, "ab").derive("c", Level::Lite, 0);
        let b = KeySchedule::new(0, "a").derive("bc", Level::Lite, 0);
        assert_ne!(a.key, b.key);
    }

    #[test]
    fn test_width_views() {
        let key = KeySchedule::new(1, "unit.c").derive("x", Level::Deep, 0);
        for bits in [8, 16, 32, 64] {
            let multiplier = key.multiplier(bits);
            assert_eq!(multiplier & 1, 1);
            assert_eq!(
                multiplier.wrapping_mul(key.inverse_multiplier(bits)) & width_mask(bits),
                1
            );
            let rotation = key.rotation(bits);
            assert!(rotation >= 1 && rotation < bits);
            assert!(key.element_key(3, bits) <= width_mask(bits));
            assert_ne!(key.element_key(0, bits), key.element_key(1, bits));
            assert_ne!(key.element_salt(0, bits), key.element_salt(1, bits));
        }
    }
}
