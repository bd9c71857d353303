use std::fmt;

use sha2::{Digest, Sha256};

use crate::descriptor::{Annotations, TypeCategory, ValueDescriptor};

/// Structural and value identity of a promotion candidate.
///
/// Two candidates with equal fingerprints hold the same constant and may share
/// one promoted global. The `no_encrypt` tag is part of the identity so a
/// constant excluded from encryption never shares storage with a protected one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    /// Shape and element kind.
    pub category: TypeCategory,
    /// Element width.
    pub bit_width: u32,
    /// Element count.
    pub element_count: usize,
    /// Initializer bytes.
    pub bytes: Vec<u8>,
    /// Carries the `no_encrypt` tag.
    pub no_encrypt: bool,
}

impl Fingerprint {
    /// Computes the fingerprint of a descriptor.
    #[must_use]
    pub fn of(descriptor: &ValueDescriptor) -> Self {
        Self {
            category: descriptor.category,
            bit_width: descriptor.bit_width,
            element_count: descriptor.element_count,
            bytes: descriptor.initial_value.clone(),
            no_encrypt: descriptor.annotations.contains(Annotations::NO_ENCRYPT),
        }
    }

    /// Deterministic percentage draw in `0..100` for this fingerprint.
    ///
    /// Candidates sharing a fingerprint always draw the same number, so the
    /// probability gate is applied once per distinct constant, before duplicates
    /// are collapsed.
    #[must_use]
    pub fn draw(&self, seed: u64, unit_id: &str) -> u8 {
        let mut hasher = Sha256::new();
        hasher.update(b"obscura.l2g.v1");
        hasher.update(seed.to_le_bytes());
        hasher.update((unit_id.len() as u64).to_le_bytes());
        hasher.update(unit_id.as_bytes());
        hasher.update(self.category.to_string().as_bytes());
        hasher.update(self.bit_width.to_le_bytes());
        hasher.update((self.element_count as u64).to_le_bytes());
        hasher.update([u8::from(self.no_encrypt)]);
        hasher.update(&self.bytes);
        let digest = hasher.finalize();

        let mut word = [0u8; 8];
        word.copy_from_slice(&digest[..8]);
        // Always below 100, the truncation cannot lose information.
        #[allow(clippy::cast_possible_truncation)]
        let draw = (u64::from_le_bytes(word) % 100) as u8;
        draw
    }

    /// Returns `true` if a draw succeeds against `probability` percent.
    #[must_use]
    pub fn passes(&self, probability: u8, seed: u64, unit_id: &str) -> bool {
        match probability {
            0 => false,
            100.. => true,
            p => self.draw(seed, unit_id) < p,
        }
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}x{}:", self.category, self.bit_width, self.element_count)?;
        for byte in &self.bytes {
            write!(f, "{byte:02x}")?;
        }
        if self.no_encrypt {
            f.write_str(":no_encrypt")?;
        }
        Ok(())
    }
}
