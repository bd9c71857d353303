//! The Lite and Deep element transforms and their payload-level composition.
//!
//! Every element is processed as an unsigned integer of its declared width
//! (floats through their bit pattern). With `k`, `s`, `m` and `r` the element
//! key, element salt, odd multiplier and rotation of one iteration:
//!
//! ```text
//! Lite:         x ^= k                              (self-inverse)
//! Deep encode:  x ^= k; x = rotl(x, r); x += s; x *= m
//! Deep decode:  x *= m⁻¹; x -= s; x = rotr(x, r); x ^= k
//! ```
//!
//! Layering: plaintext is Deep-encoded for each Deep iteration in order, then
//! Lite-encoded for each Lite iteration in order. Decoding mirrors this exactly:
//! Lite iterations in reverse, then Deep iterations in reverse.

use crate::{
    encryption::IterationKey,
    ir::{ScalarType, Value},
    utils::{rotate_left, rotate_right, width_mask},
    Result,
};

/// Applies one Lite iteration to element `index`; its own inverse.
#[must_use]
pub fn lite(key: &IterationKey, index: u64, bits: u32, value: u64) -> u64 {
    (value ^ key.element_key(index, bits)) & width_mask(bits)
}

/// Applies one Deep encode iteration to element `index`.
#[must_use]
pub fn deep_encode(key: &IterationKey, index: u64, bits: u32, value: u64) -> u64 {
    let mask = width_mask(bits);
    let mut x = (value ^ key.element_key(index, bits)) & mask;
    x = rotate_left(x, key.rotation(bits), bits);
    x = x.wrapping_add(key.element_salt(index, bits)) & mask;
    x.wrapping_mul(key.multiplier(bits)) & mask
}

/// Applies one Deep decode iteration to element `index`, undoing [`deep_encode`].
#[must_use]
pub fn deep_decode(key: &IterationKey, index: u64, bits: u32, value: u64) -> u64 {
    let mask = width_mask(bits);
    let mut x = (value & mask).wrapping_mul(key.inverse_multiplier(bits)) & mask;
    x = x.wrapping_sub(key.element_salt(index, bits)) & mask;
    x = rotate_right(x, key.rotation(bits), bits);
    (x ^ key.element_key(index, bits)) & mask
}

/// Encodes one element: all Deep iterations, then all Lite iterations.
#[must_use]
pub fn encode_element(
    lite_keys: &[IterationKey],
    deep_keys: &[IterationKey],
    index: u64,
    bits: u32,
    value: u64,
) -> u64 {
    let value = deep_keys
        .iter()
        .fold(value, |x, key| deep_encode(key, index, bits, x));
    lite_keys
        .iter()
        .fold(value, |x, key| lite(key, index, bits, x))
}

/// Decodes one element: Lite iterations in reverse, then Deep iterations in reverse.
#[must_use]
pub fn decode_element(
    lite_keys: &[IterationKey],
    deep_keys: &[IterationKey],
    index: u64,
    bits: u32,
    value: u64,
) -> u64 {
    let value = lite_keys
        .iter()
        .rev()
        .fold(value, |x, key| lite(key, index, bits, x));
    deep_keys
        .iter()
        .rev()
        .fold(value, |x, key| deep_decode(key, index, bits, x))
}

/// Encodes an element-packed little-endian payload.
///
/// # Errors
///
/// Returns [`crate::Error::Malformed`] if the payload is not a whole number of elements.
pub fn encode_payload(
    element: ScalarType,
    payload: &[u8],
    lite_keys: &[IterationKey],
    deep_keys: &[IterationKey],
) -> Result<Vec<u8>> {
    map_elements(element, payload, |index, bits, x| {
        encode_element(lite_keys, deep_keys, index, bits, x)
    })
}

/// Decodes a payload produced by [`encode_payload`] with the same keys.
///
/// # Errors
///
/// Returns [`crate::Error::Malformed`] if the payload is not a whole number of elements.
pub fn decode_payload(
    element: ScalarType,
    payload: &[u8],
    lite_keys: &[IterationKey],
    deep_keys: &[IterationKey],
) -> Result<Vec<u8>> {
    map_elements(element, payload, |index, bits, x| {
        decode_element(lite_keys, deep_keys, index, bits, x)
    })
}

fn map_elements<F>(element: ScalarType, payload: &[u8], transform: F) -> Result<Vec<u8>>
where
    F: Fn(u64, u32, u64) -> u64,
{
    let size = element.byte_size();
    if size == 0 || size > 8 || payload.len() % size != 0 {
        return Err(malformed_error!(
            "payload of {} bytes is not a sequence of {}",
            payload.len(),
            element
        ));
    }

    let int = element.as_int();
    let bits = int.bits();
    let mut output = Vec::with_capacity(payload.len());
    for (index, chunk) in payload.chunks(size).enumerate() {
        let value = Value::from_le_bytes(int, chunk)?;
        let transformed = Value::new(int, transform(index as u64, bits, value.bits()));
        output.extend_from_slice(&transformed.to_le_bytes());
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::Level, encryption::KeySchedule, ir::pack_values};

    fn keys(level: Level, count: u32) -> Vec<IterationKey> {
        KeySchedule::new(42, "unit.c").derive_level("x", level, count)
    }

    #[test]
    fn test_lite_is_self_inverse() {
        let key = keys(Level::Lite, 1)[0];
        for bits in [8, 16, 32, 64] {
            for value in [0, 1, width_mask(bits), 0x5A5A_5A5A_5A5A_5A5A & width_mask(bits)] {
                let encoded = lite(&key, 3, bits, value);
                assert_eq!(lite(&key, 3, bits, encoded), value);
            }
        }
    }

    #[test]
    fn test_deep_is_not_self_inverse() {
        let key = keys(Level::Deep, 1)[0];
        let value = 0x1234_5678;
        let encoded = deep_encode(&key, 0, 32, value);
        assert_ne!(deep_encode(&key, 0, 32, encoded), value);
        assert_eq!(deep_decode(&key, 0, 32, encoded), value);
    }

    #[test]
    fn test_element_round_trip_exhaustive_8bit() {
        let lite_keys = keys(Level::Lite, 2);
        let deep_keys = keys(Level::Deep, 3);
        for index in 0..4u64 {
            for value in 0..=0xFFu64 {
                let encoded = encode_element(&lite_keys, &deep_keys, index, 8, value);
                assert!(encoded <= 0xFF);
                assert_eq!(decode_element(&lite_keys, &deep_keys, index, 8, encoded), value);
            }
        }
    }

    #[test]
    fn test_deep_is_a_permutation_8bit() {
        let key = keys(Level::Deep, 1)[0];
        let mut seen = [false; 256];
        for value in 0..=0xFFu64 {
            let encoded = deep_encode(&key, 0, 8, value) as usize;
            assert!(!seen[encoded]);
            seen[encoded] = true;
        }
    }

    #[test]
    fn test_layering_order_matters() {
        let lite_keys = keys(Level::Lite, 1);
        let deep_keys = keys(Level::Deep, 1);
        let value = 0xDEAD_BEEF;
        let encoded = encode_element(&lite_keys, &deep_keys, 0, 32, value);

        // Decoding Deep before Lite does not reproduce the plaintext.
        let wrong = lite(
            &lite_keys[0],
            0,
            32,
            deep_decode(&deep_keys[0], 0, 32, encoded),
        );
        assert_ne!(wrong, value);
        assert_eq!(decode_element(&lite_keys, &deep_keys, 0, 32, encoded), value);
    }

    #[test]
    fn test_payload_round_trip_and_size() -> Result<()> {
        let plain = pack_values(&[Value::f32(1.25), Value::f32(-0.0), Value::f32(f32::MAX)]);
        let lite_keys = keys(Level::Lite, 4);
        let deep_keys = keys(Level::Deep, 2);

        let cipher = encode_payload(ScalarType::F32, &plain, &lite_keys, &deep_keys)?;
        assert_eq!(cipher.len(), plain.len());
        assert_ne!(cipher, plain);
        assert_eq!(
            decode_payload(ScalarType::F32, &cipher, &lite_keys, &deep_keys)?,
            plain
        );
        Ok(())
    }

    #[test]
    fn test_equal_elements_differ() -> Result<()> {
        let plain = pack_values(&[Value::i32(0x10); 4]);
        let cipher = encode_payload(ScalarType::I32, &plain, &keys(Level::Lite, 1), &[])?;
        let chunks: Vec<_> = cipher.chunks(4).collect();
        assert_ne!(chunks[0], chunks[1]);
        assert_ne!(chunks[1], chunks[2]);
        Ok(())
    }

    #[test]
    fn test_ragged_payload_rejected() {
        assert!(encode_payload(ScalarType::I32, &[1, 2, 3], &[], &[]).is_err());
        assert!(encode_payload(ScalarType::Int(128), &[0; 16], &[], &[]).is_err());
    }
}
