//! Transform-level tests over the public encryption API.
//!
//! These tests exercise key schedules and payload transforms directly, without a
//! module, covering every supported element type and iteration count.

use obscura::{
    compiler::EventLog,
    config::{EffectivePolicy, FilterFacets, Level, Levels},
    descriptor::DescriptorTable,
    encryption::{transform, DecryptionMode, EncryptionEngine, KeySchedule},
    filter::FilterEngine,
    ir::{pack_values, GlobalVar, Module, ScalarType, Value},
    Result,
};

/// Boundary values of a width: zero, one, signed max, signed min, all bits set.
fn boundaries(ty: ScalarType) -> Vec<Value> {
    let bits = ty.bits();
    let all = if bits == 64 { u64::MAX } else { (1u64 << bits) - 1 };
    let signed_max = all >> 1;
    [0, 1, signed_max, signed_max + 1, all, 0xA5A5_A5A5_A5A5_A5A5 & all]
        .into_iter()
        .map(|raw| Value::new(ty, raw))
        .collect()
}

#[test]
fn test_round_trip_every_width_and_iteration_count() -> Result<()> {
    let schedule = KeySchedule::new(0xDEAD_BEEF, "roundtrip.c");
    let types = [
        ScalarType::I8,
        ScalarType::I16,
        ScalarType::I32,
        ScalarType::I64,
        ScalarType::F32,
        ScalarType::F64,
    ];

    for ty in types {
        let plain = pack_values(&boundaries(ty));
        for iterations in 1..=15 {
            let lite = schedule.derive_level("value", Level::Lite, iterations);
            let deep = schedule.derive_level("value", Level::Deep, iterations);

            for (lite, deep) in [(&lite[..], &[][..]), (&[][..], &deep[..]), (&lite[..], &deep[..])] {
                let cipher = transform::encode_payload(ty, &plain, lite, deep)?;
                assert_eq!(cipher.len(), plain.len(), "{ty} x{iterations}");
                let decoded = transform::decode_payload(ty, &cipher, lite, deep)?;
                assert_eq!(decoded, plain, "{ty} x{iterations}");
            }
        }
    }
    Ok(())
}

#[test]
fn test_special_float_bit_patterns_survive() -> Result<()> {
    let schedule = KeySchedule::new(1, "floats.c");
    let lite = schedule.derive_level("f", Level::Lite, 3);
    let deep = schedule.derive_level("f", Level::Deep, 3);

    let values = [
        f64::NAN,
        f64::INFINITY,
        f64::NEG_INFINITY,
        -0.0,
        f64::MIN_POSITIVE,
        f64::EPSILON,
    ]
    .map(Value::f64);
    let plain = pack_values(&values);
    let cipher = transform::encode_payload(ScalarType::F64, &plain, &lite, &deep)?;
    assert_eq!(
        transform::decode_payload(ScalarType::F64, &cipher, &lite, &deep)?,
        plain
    );
    Ok(())
}

#[test]
fn test_artifact_matches_policy() -> Result<()> {
    let mut module = Module::new("unit.c");
    module.add_global(GlobalVar::array(
        "table",
        ScalarType::I16,
        &[Value::i16(-2), Value::i16(0), Value::i16(i16::MAX)],
    ));
    let table = DescriptorTable::globals(&module);
    let (_, descriptor) = table.iter().next().expect("table is a candidate");

    let policy = EffectivePolicy::disabled()
        .with_levels(Levels::LITE | Levels::DEEP)
        .with_iterations(Level::Lite, 3)
        .with_iterations(Level::Deep, 2)
        .with_arrays_lite_only(true);
    let levels = FilterEngine::evaluate(descriptor, &policy).levels();
    assert_eq!(levels, Levels::LITE);

    let engine = EncryptionEngine::new(7, "unit.c");
    let artifact = engine
        .encrypt(descriptor, levels, &policy, &EventLog::new())?
        .expect("table is encrypted");

    assert_eq!(artifact.mode, DecryptionMode::InlineLite);
    assert_eq!(artifact.iterations(Level::Lite), 3);
    assert_eq!(artifact.iterations(Level::Deep), 0);
    assert_eq!(artifact.cipher_bytes.len(), descriptor.initial_value.len());
    assert_eq!(artifact.decrypt()?, descriptor.initial_value);
    Ok(())
}

#[test]
fn test_filter_is_total_and_deterministic() {
    let mut module = Module::new("unit.c");
    for (name, value) in [
        ("secret_key", Value::i32(1)),
        ("api_token", Value::i64(2)),
        ("ratio", Value::f32(0.5)),
        ("__enc_header_marker", Value::i32(1)),
    ] {
        module.add_global(GlobalVar::scalar(name, value));
    }
    let table = DescriptorTable::globals(&module);

    let policies = [
        EffectivePolicy::implicit(),
        EffectivePolicy::disabled(),
        EffectivePolicy::implicit().with_whitelist(FilterFacets::default().with_names(["secret"])),
        EffectivePolicy::implicit().with_blacklist(FilterFacets::default().with_bits([32])),
        EffectivePolicy::implicit().with_skip_arrays(true),
    ];

    for policy in &policies {
        for (_, descriptor) in table.iter() {
            let first = FilterEngine::evaluate(descriptor, policy);
            let second = FilterEngine::evaluate(descriptor, policy);
            assert_eq!(first, second);
            if descriptor.is_reserved() {
                assert!(!first.is_included());
            }
        }
    }

    let whitelist = &policies[2];
    let included: Vec<&str> = table
        .iter()
        .filter(|(_, d)| FilterEngine::included(d, whitelist))
        .map(|(_, d)| d.name.as_str())
        .collect();
    assert_eq!(included, ["secret_key"]);
}
