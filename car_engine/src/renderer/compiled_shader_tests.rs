//! Unit tests for the `.crss` codec

use crate::error::Error;
use crate::renderer::compiled_shader::{is_spirv, CompiledShader, Descriptor, DescriptorType};

fn sample() -> CompiledShader {
    CompiledShader {
        sets: vec![
            vec![
                Descriptor { binding: 0, descriptor_type: DescriptorType::UniformBuffer },
                Descriptor { binding: 1, descriptor_type: DescriptorType::Sampler2D },
            ],
            vec![],
        ],
        code: vec![0x03, 0x02, 0x23, 0x07, 0xAA, 0xBB, 0xCC, 0xDD],
    }
}

// ============================================================================
// ENCODING
// ============================================================================

#[test]
fn test_exact_byte_layout() {
    let bytes = sample().to_bytes().unwrap();
    assert_eq!(
        bytes,
        vec![
            2, // sets
            2, 0, 1, 1, 2, // set 0
            0, // set 1
            8, 0, 0, 0, // code length, little-endian
            0x03, 0x02, 0x23, 0x07, 0xAA, 0xBB, 0xCC, 0xDD,
        ]
    );
}

#[test]
fn test_round_trip() {
    let shader = sample();
    let decoded = CompiledShader::from_bytes(&shader.to_bytes().unwrap()).unwrap();
    assert_eq!(decoded, shader);
}

#[test]
fn test_empty_shader() {
    let shader = CompiledShader::default();
    let bytes = shader.to_bytes().unwrap();
    assert_eq!(bytes, vec![0, 0, 0, 0, 0]);
    assert_eq!(CompiledShader::from_bytes(&bytes).unwrap(), shader);
}

#[test]
fn test_too_many_sets_rejected() {
    let shader = CompiledShader { sets: vec![vec![]; 256], code: vec![] };
    assert!(matches!(shader.to_bytes(), Err(Error::Format(_))));
}

// ============================================================================
// DECODING ERRORS
// ============================================================================

#[test]
fn test_every_truncation_is_rejected() {
    let bytes = sample().to_bytes().unwrap();
    for len in 0..bytes.len() {
        match CompiledShader::from_bytes(&bytes[..len]) {
            Err(Error::Format(_)) => {}
            other => panic!("prefix of {} bytes decoded as {:?}", len, other),
        }
    }
}

#[test]
fn test_unknown_descriptor_type_rejected() {
    let bytes = [1u8, 1, 0, 9, 0, 0, 0, 0];
    match CompiledShader::from_bytes(&bytes) {
        Err(Error::Format(msg)) => assert!(msg.contains("descriptor type 9")),
        other => panic!("Expected Format, got {:?}", other),
    }
}

#[test]
fn test_trailing_bytes_rejected() {
    let mut bytes = sample().to_bytes().unwrap();
    bytes.push(0);
    assert!(matches!(CompiledShader::from_bytes(&bytes), Err(Error::Format(_))));
}

#[test]
fn test_huge_code_length_does_not_overflow() {
    let bytes = [0u8, 0xFF, 0xFF, 0xFF, 0xFF];
    assert!(matches!(CompiledShader::from_bytes(&bytes), Err(Error::Format(_))));
}

// ============================================================================
// HELPERS
// ============================================================================

#[test]
fn test_spirv_words_and_magic() {
    let shader = sample();
    assert!(is_spirv(&shader.code));
    let words = shader.spirv_words().unwrap();
    assert_eq!(words, vec![0x0723_0203, 0xDDCC_BBAA]);

    let odd = CompiledShader { sets: vec![], code: vec![1, 2, 3] };
    assert!(odd.spirv_words().is_err());
    assert!(!is_spirv(b"#version 450"));
}

#[test]
fn test_descriptor_lookup() {
    let shader = sample();
    assert_eq!(
        shader.descriptor(0, 1).map(|d| d.descriptor_type),
        Some(DescriptorType::Sampler2D)
    );
    assert!(shader.descriptor(0, 5).is_none());
    assert!(shader.descriptor(3, 0).is_none());
}

#[test]
fn test_save_and_load() {
    let path = std::env::temp_dir().join(format!("car_engine_crss_{}.crss", std::process::id()));
    sample().save(&path).unwrap();
    let loaded = CompiledShader::load(&path).unwrap();
    let _ = std::fs::remove_file(&path);
    assert_eq!(loaded, sample());
}
