//! Unit tests for buffer descriptors and the update planning rules

use crate::error::Error;
use crate::renderer::buffer::{compose_grown, plan_update, BufferType, BufferUsage, IndexData, UpdatePlan};

// ============================================================================
// TYPE TABLE
// ============================================================================

#[test]
fn test_buffer_type_sizes() {
    assert_eq!(BufferType::Float.size(), 4);
    assert_eq!(BufferType::Double.size(), 8);
    assert_eq!(BufferType::UnsignedInt.size(), 4);
    assert_eq!(BufferType::UnsignedShort.size(), 2);
    assert_eq!(BufferType::Byte.size(), 1);
}

#[test]
fn test_index_types() {
    assert!(BufferType::UnsignedInt.is_index_type());
    assert!(BufferType::UnsignedShort.is_index_type());
    assert!(BufferType::Byte.is_index_type());
    assert!(!BufferType::Float.is_index_type());
    assert!(!BufferType::Double.is_index_type());
}

#[test]
fn test_index_data_bytes() {
    let data = [1u16, 2, 3];
    let idx = IndexData::U16(&data);
    assert_eq!(idx.len(), 3);
    assert_eq!(idx.index_type(), BufferType::UnsignedShort);
    assert_eq!(idx.as_bytes().len(), 6);
    assert_eq!(&idx.as_bytes()[..2], &1u16.to_ne_bytes());
}

// ============================================================================
// UPDATE PLANNING
// ============================================================================

#[test]
fn test_plan_in_place_when_write_fits() {
    assert_eq!(plan_update(64, 0, 64, BufferUsage::StaticDraw), Ok(UpdatePlan::InPlace));
    assert_eq!(plan_update(64, 32, 16, BufferUsage::DynamicDraw), Ok(UpdatePlan::InPlace));
}

#[test]
fn test_plan_recreate_at_offset_zero() {
    assert_eq!(
        plan_update(64, 0, 100, BufferUsage::DynamicDraw),
        Ok(UpdatePlan::Recreate { capacity: 100 })
    );
    // Static buffers may still be replaced wholesale
    assert_eq!(
        plan_update(64, 0, 100, BufferUsage::StaticDraw),
        Ok(UpdatePlan::Recreate { capacity: 100 })
    );
}

#[test]
fn test_plan_grow_preserves_prefix() {
    assert_eq!(
        plan_update(64, 48, 32, BufferUsage::DynamicDraw),
        Ok(UpdatePlan::Grow { capacity: 80, preserved: 48 })
    );
}

#[test]
fn test_plan_grow_past_capacity_preserves_everything() {
    assert_eq!(
        plan_update(64, 100, 8, BufferUsage::DynamicDraw),
        Ok(UpdatePlan::Grow { capacity: 108, preserved: 64 })
    );
}

#[test]
fn test_plan_static_growth_is_usage_error() {
    match plan_update(64, 48, 32, BufferUsage::StaticDraw) {
        Err(Error::UsageError(msg)) => assert!(msg.contains("StaticDraw")),
        other => panic!("Expected UsageError, got {:?}", other),
    }
}

// ============================================================================
// GROWTH COMPOSITION
// ============================================================================

#[test]
fn test_compose_grown_zero_fills_gap() {
    let old = [1u8, 2, 3, 4];
    let bytes = compose_grown(&old, 4, 6, &[9, 9], 8);
    assert_eq!(bytes, vec![1, 2, 3, 4, 0, 0, 9, 9]);
}

#[test]
fn test_compose_grown_overwrites_tail() {
    let old = [1u8, 2, 3, 4];
    let bytes = compose_grown(&old, 2, 2, &[7, 7, 7], 5);
    assert_eq!(bytes, vec![1, 2, 7, 7, 7]);
}
