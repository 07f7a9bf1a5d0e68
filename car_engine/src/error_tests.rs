//! Unit tests for error.rs
//!
//! Tests all Error variants, their Display output and the error macros.

use crate::error::{Error, Result};

// ============================================================================
// ERROR DISPLAY TESTS
// ============================================================================

#[test]
fn test_backend_error_display() {
    let err = Error::BackendError("vkCreateDevice failed".to_string());
    let display = format!("{}", err);
    assert!(display.contains("Backend error"));
    assert!(display.contains("vkCreateDevice failed"));
}

#[test]
fn test_out_of_memory_display() {
    assert_eq!(format!("{}", Error::OutOfMemory), "Out of GPU memory");
}

#[test]
fn test_usage_error_display() {
    let err = Error::UsageError("static buffer cannot grow".to_string());
    assert_eq!(format!("{}", err), "Usage error: static buffer cannot grow");
}

#[test]
fn test_format_and_io_display() {
    assert_eq!(format!("{}", Error::Format("truncated".to_string())), "Format error: truncated");
    assert_eq!(format!("{}", Error::Io("missing".to_string())), "I/O error: missing");
}

// ============================================================================
// CONVERSIONS AND TRAITS
// ============================================================================

#[test]
fn test_error_is_std_error() {
    let err = Error::OutOfMemory;
    let _: &dyn std::error::Error = &err;
}

#[test]
fn test_from_io_error() {
    let io = std::io::Error::new(std::io::ErrorKind::NotFound, "texture.png");
    let err: Error = io.into();
    match err {
        Error::Io(msg) => assert!(msg.contains("texture.png")),
        other => panic!("Expected Io, got {:?}", other),
    }
}

#[test]
fn test_result_question_mark() {
    fn inner() -> Result<u32> {
        Err(Error::InvalidResource("shader".to_string()))
    }
    fn outer() -> Result<u32> {
        let v = inner()?;
        Ok(v + 1)
    }
    assert_eq!(outer(), Err(Error::InvalidResource("shader".to_string())));
}

// ============================================================================
// MACROS
// ============================================================================

#[test]
fn test_engine_err_builds_backend_error() {
    let err = crate::engine_err!("car::test", "code {}", 7);
    assert_eq!(err, Error::BackendError("code 7".to_string()));
}

#[test]
fn test_engine_bail_returns_early() {
    fn fails() -> Result<()> {
        crate::engine_bail!("car::test", "stop here");
    }
    assert_eq!(fails(), Err(Error::BackendError("stop here".to_string())));
}

#[test]
fn test_engine_bail_warn_returns_usage_error() {
    fn misuse(flag: bool) -> Result<u8> {
        if flag {
            crate::engine_bail_warn!("car::test", "flag {} not allowed", flag);
        }
        Ok(1)
    }
    assert_eq!(misuse(false), Ok(1));
    assert_eq!(misuse(true), Err(Error::UsageError("flag true not allowed".to_string())));
}
