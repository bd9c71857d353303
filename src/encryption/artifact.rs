use std::fmt;

use strum::Display;

use crate::{
    config::Level,
    encryption::{transform, IterationKey},
    ir::{GlobalId, ValueType},
    Result,
};

/// How reads of a protected declaration are decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum DecryptionMode {
    /// Lite only; the XOR sequence is duplicated at every read.
    InlineLite,
    /// Deep decode duplicated at every read (after any inline Lite layers).
    InlineDeep,
    /// Deep decode in one shared routine called from every read.
    CallDeep,
}

/// The ciphertext and key material produced for one protected declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct EncryptedArtifact {
    /// The protected global.
    pub global: GlobalId,
    /// Its name, used for key derivation and routine naming.
    pub name: String,
    /// Its declared type.
    pub ty: ValueType,
    /// Replacement initializer, same size as the plaintext.
    pub cipher_bytes: Vec<u8>,
    /// Lite keys in iteration order (outer layer).
    pub lite: Vec<IterationKey>,
    /// Deep keys in iteration order (inner layer).
    pub deep: Vec<IterationKey>,
    /// Placement of the decode sequence.
    pub mode: DecryptionMode,
}

impl EncryptedArtifact {
    /// Returns the number of iterations applied for `level`.
    #[must_use]
    pub fn iterations(&self, level: Level) -> usize {
        match level {
            Level::Lite => self.lite.len(),
            Level::Deep => self.deep.len(),
        }
    }

    /// Returns every iteration key in the order the decoder consumes them.
    pub fn decode_order(&self) -> impl Iterator<Item = &IterationKey> {
        self.lite.iter().rev().chain(self.deep.iter().rev())
    }

    /// Decodes [`cipher_bytes`](Self::cipher_bytes) back to the plaintext.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if the ciphertext does not fit the type.
    pub fn decrypt(&self) -> Result<Vec<u8>> {
        transform::decode_payload(self.ty.element(), &self.cipher_bytes, &self.lite, &self.deep)
    }
}

impl fmt::Display for EncryptedArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}: lite x{}, deep x{}, {}",
            self.name,
            self.ty,
            self.lite.len(),
            self.deep.len(),
            self.mode
        )
    }
}
