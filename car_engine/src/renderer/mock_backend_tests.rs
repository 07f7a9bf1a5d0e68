//! Buffer contract tests run against the in-memory backend
//!
//! These pin down the update semantics every backend buffer shares:
//! in-place writes, recreate at offset 0, grow with prefix preservation.

use crate::error::Error;
use crate::renderer::buffer::{BufferType, BufferUsage, IndexData};
use crate::renderer::context::GraphicsContext;
use crate::renderer::layout::{BufferLayout, DataType, ScalarKind, VertexInput};
use crate::renderer::mock_backend::{mock_vertex_inputs, MockContext};
use crate::renderer::shader::{ShaderDesc, ShaderSource};

// ============================================================================
// VERTEX BUFFER UPDATES
// ============================================================================

#[test]
fn test_update_round_trip_in_place() {
    let ctx = MockContext::new(1, 1);
    let vb = ctx
        .create_vertex_buffer(None, 16, BufferUsage::DynamicDraw, BufferLayout::default())
        .unwrap();
    let data: Vec<u8> = (1..=12).collect();
    vb.update_data(&data, 0).unwrap();
    assert_eq!(&vb.read_data().unwrap()[..12], data.as_slice());
    assert_eq!(vb.size(), 16);
}

#[test]
fn test_update_offset_zero_recreates() {
    let ctx = MockContext::new(1, 1);
    let vb = ctx
        .create_vertex_buffer(Some(&[7; 8]), 8, BufferUsage::StaticDraw, BufferLayout::default())
        .unwrap();
    vb.update_data(&[1; 20], 0).unwrap();
    assert_eq!(vb.size(), 20);
    assert_eq!(vb.read_data().unwrap(), vec![1; 20]);
}

#[test]
fn test_grow_preserves_prefix() {
    let ctx = MockContext::new(1, 1);
    let vb = ctx
        .create_vertex_buffer(Some(&[1, 2, 3, 4, 5, 6, 7, 8]), 8, BufferUsage::DynamicDraw, BufferLayout::default())
        .unwrap();
    vb.update_data(&[9, 9, 9, 9], 6).unwrap();
    assert_eq!(vb.read_data().unwrap(), vec![1, 2, 3, 4, 5, 6, 9, 9, 9, 9]);
}

#[test]
fn test_grow_past_capacity_zero_fills_gap() {
    let ctx = MockContext::new(1, 1);
    let vb = ctx
        .create_vertex_buffer(Some(&[5; 4]), 4, BufferUsage::DynamicDraw, BufferLayout::default())
        .unwrap();
    vb.update_data(&[8, 8], 6).unwrap();
    assert_eq!(vb.read_data().unwrap(), vec![5, 5, 5, 5, 0, 0, 8, 8]);
}

#[test]
fn test_static_grow_with_offset_fails_and_keeps_contents() {
    let ctx = MockContext::new(1, 1);
    let vb = ctx
        .create_vertex_buffer(Some(&[3; 4]), 4, BufferUsage::StaticDraw, BufferLayout::default())
        .unwrap();
    assert!(matches!(vb.update_data(&[1; 4], 2), Err(Error::UsageError(_))));
    assert_eq!(vb.read_data().unwrap(), vec![3; 4]);
}

// ============================================================================
// INDEX BUFFER UPDATES
// ============================================================================

#[test]
fn test_index_buffer_rejects_non_index_type() {
    let ctx = MockContext::new(1, 1);
    let result = ctx.create_index_buffer(None, 6, BufferType::Float, BufferUsage::StaticDraw);
    assert!(matches!(result, Err(Error::InvalidResource(_))));
}

#[test]
fn test_index_buffer_offsets_are_in_elements() {
    let ctx = MockContext::new(1, 1);
    let ib = ctx
        .create_index_buffer(Some(IndexData::U16(&[0, 1, 2, 3])), 4, BufferType::UnsignedShort, BufferUsage::DynamicDraw)
        .unwrap();
    ib.update_data(IndexData::U16(&[9, 9]), 3).unwrap();
    assert_eq!(ib.count(), 5);
    let words: Vec<u16> = ib
        .read_data()
        .unwrap()
        .chunks_exact(2)
        .map(|c| u16::from_ne_bytes([c[0], c[1]]))
        .collect();
    assert_eq!(words, vec![0, 1, 2, 9, 9]);
}

#[test]
fn test_index_buffer_type_mismatch() {
    let ctx = MockContext::new(1, 1);
    let ib = ctx
        .create_index_buffer(None, 4, BufferType::UnsignedInt, BufferUsage::DynamicDraw)
        .unwrap();
    assert!(matches!(ib.update_data(IndexData::U8(&[1]), 0), Err(Error::UsageError(_))));
}

// ============================================================================
// VERTEX ARRAYS
// ============================================================================

#[test]
fn test_mock_shader_text_declares_inputs() {
    let inputs = mock_vertex_inputs(b"mock in0:f2 in3:u1 out0:f4 in9:x1");
    assert_eq!(
        inputs,
        vec![VertexInput::new(0, ScalarKind::Float, 2), VertexInput::new(3, ScalarKind::UInt, 1)]
    );
}

#[test]
fn test_vertex_array_checks_layout_against_shader() {
    let ctx = MockContext::new(1, 1);
    let layout: BufferLayout = [("aPos", DataType::Float3)].into_iter().collect();
    let ib = ctx
        .create_index_buffer(Some(IndexData::U16(&[0, 1, 2])), 3, BufferType::UnsignedShort, BufferUsage::StaticDraw)
        .unwrap();
    let shader_reading = |text: &[u8]| {
        ctx.create_shader(&ShaderDesc::new(ShaderSource::Bytes(text.to_vec()), ShaderSource::Bytes(vec![])))
            .unwrap()
    };

    let vb = ctx.create_vertex_buffer(None, 36, BufferUsage::StaticDraw, layout.clone()).unwrap();
    assert!(ctx.create_vertex_array(vb, ib.clone(), shader_reading(b"in0:f3")).is_ok());

    let vb = ctx.create_vertex_buffer(None, 36, BufferUsage::StaticDraw, layout).unwrap();
    let result = ctx.create_vertex_array(vb, ib, shader_reading(b"in0:f3 in1:f2"));
    assert!(matches!(result, Err(Error::UsageError(_))), "location 1 is not in the layout");
}

// ============================================================================
// FRAME INDEX
// ============================================================================

#[test]
fn test_frame_index_cycles_modulo_frames_in_flight() {
    let ctx = MockContext::new(1, 1);
    let n = ctx.max_frames_in_flight();
    for frame in 0..7usize {
        assert_eq!(ctx.current_frame_index(), frame % n);
        ctx.swap_buffers().unwrap();
    }
}
