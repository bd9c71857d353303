#![no_main]

use libfuzzer_sys::fuzz_target;
use obscura::{
    config::Level,
    encryption::{transform, KeySchedule},
    ir::ScalarType,
};

const TYPES: [ScalarType; 6] = [
    ScalarType::I8,
    ScalarType::I16,
    ScalarType::I32,
    ScalarType::I64,
    ScalarType::F32,
    ScalarType::F64,
];

fuzz_target!(|data: &[u8]| {
    let Some((&header, rest)) = data.split_first() else {
        return;
    };
    let ty = TYPES[usize::from(header) % TYPES.len()];
    let lite_iterations = u32::from(header >> 4) % 16;
    let deep_iterations = u32::from(header & 0x0F) % 16;

    let size = ty.byte_size();
    let payload = &rest[..rest.len() - rest.len() % size];

    let schedule = KeySchedule::new(u64::from(header), "fuzz.c");
    let lite = schedule.derive_level("value", Level::Lite, lite_iterations);
    let deep = schedule.derive_level("value", Level::Deep, deep_iterations);

    let cipher = transform::encode_payload(ty, payload, &lite, &deep).unwrap();
    assert_eq!(cipher.len(), payload.len());
    let plain = transform::decode_payload(ty, &cipher, &lite, &deep).unwrap();
    assert_eq!(plain, payload);
});
