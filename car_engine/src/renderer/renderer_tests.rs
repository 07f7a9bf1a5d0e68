//! Unit tests for the Renderer facade state machine, using the mock backend

use std::rc::Rc;

use crate::error::Error;
use crate::renderer::buffer::{BufferType, BufferUsage, IndexData};
use crate::renderer::color::Color;
use crate::renderer::context::GraphicsContext;
use crate::renderer::layout::{BufferLayout, DataType};
use crate::renderer::mock_backend::{MockContext, MockRendererApi};
use crate::renderer::renderer::{ClipSpace, Renderer, RendererState, Viewport};
use crate::renderer::shader::{ShaderDesc, ShaderSource, ShaderStages};
use crate::renderer::vertex_array::VertexArray;

fn setup() -> (Rc<MockContext>, Renderer, Rc<dyn VertexArray>) {
    let ctx = MockContext::new(640, 480);
    let renderer = Renderer::new(ctx.clone().create_renderer_api().unwrap());
    let layout: BufferLayout = [("aPos", DataType::Float2)].into_iter().collect();
    let vb = ctx
        .create_vertex_buffer(None, 4 * 8, BufferUsage::StaticDraw, layout)
        .unwrap();
    let ib = ctx
        .create_index_buffer(Some(IndexData::U16(&[0, 1, 2, 2, 3, 0])), 6, BufferType::UnsignedShort, BufferUsage::StaticDraw)
        .unwrap();
    let shader = ctx
        .create_shader(&ShaderDesc::new(ShaderSource::Bytes(vec![]), ShaderSource::Bytes(vec![])))
        .unwrap();
    let va = ctx.create_vertex_array(vb, ib, shader).unwrap();
    (ctx, renderer, va)
}

// ============================================================================
// COLOR CONVERSIONS
// ============================================================================

#[test]
fn test_color_overloads_normalize() {
    assert_eq!(Color::from(0xFF000080u32), Color::rgba(1.0, 0.0, 0.0, 128.0 / 255.0));
    assert_eq!(Color::from(0.5f32), Color::rgba(0.5, 0.5, 0.5, 1.0));
    assert_eq!(Color::from((0.25f32, 0.5f32)), Color::rgba(0.25, 0.25, 0.25, 0.5));
    assert_eq!(Color::from((0.1f32, 0.2f32, 0.3f32)), Color::rgba(0.1, 0.2, 0.3, 1.0));
    assert_eq!(Color::from_hex(0x00FF00FF).to_array(), [0.0, 1.0, 0.0, 1.0]);
}

// ============================================================================
// STATE MACHINE
// ============================================================================

#[test]
fn test_lifecycle() {
    let (ctx, renderer, va) = setup();
    assert_eq!(renderer.state(), RendererState::Uninitialized);
    // Only record what the renderer issues, not the resource creation
    ctx.log.borrow_mut().clear();

    renderer.init().unwrap();
    assert_eq!(renderer.state(), RendererState::Initialized);

    assert!(renderer.begin_recording().unwrap());
    assert_eq!(renderer.state(), RendererState::Recording);
    renderer.clear_color(0x336699FFu32);
    renderer.clear();
    renderer.draw_command(&va).unwrap();
    renderer.end_recording().unwrap();
    assert_eq!(renderer.state(), RendererState::Initialized);
    assert_eq!(renderer.frames_recorded(), 1);

    renderer.shutdown();
    assert_eq!(renderer.state(), RendererState::Shutdown);

    let log = ctx.log.borrow().clone();
    assert_eq!(log.first().map(String::as_str), Some("init"));
    assert!(log.contains(&"draw 6".to_string()));
    assert_eq!(log.last().map(String::as_str), Some("shutdown"));
}

#[test]
fn test_double_init_is_usage_error() {
    let (_ctx, renderer, _va) = setup();
    renderer.init().unwrap();
    assert!(matches!(renderer.init(), Err(Error::UsageError(_))));
}

#[test]
fn test_draw_outside_recording_rejected() {
    let (ctx, renderer, va) = setup();
    renderer.init().unwrap();
    assert!(matches!(renderer.draw_command(&va), Err(Error::UsageError(_))));
    assert!(ctx.entries("draw").is_empty());
}

#[test]
fn test_begin_twice_rejected() {
    let (_ctx, renderer, _va) = setup();
    renderer.init().unwrap();
    renderer.begin_recording().unwrap();
    assert!(matches!(renderer.begin_recording(), Err(Error::UsageError(_))));
}

#[test]
fn test_end_without_begin_rejected() {
    let (_ctx, renderer, _va) = setup();
    renderer.init().unwrap();
    assert!(matches!(renderer.end_recording(), Err(Error::UsageError(_))));
}

#[test]
fn test_commands_outside_recording_are_ignored() {
    let (ctx, renderer, _va) = setup();
    renderer.init().unwrap();
    renderer.clear();
    renderer.set_viewport(Viewport::new(0.0, 0.0, 10.0, 10.0));
    assert!(ctx.entries("clear").is_empty());
    assert!(ctx.entries("viewport").is_empty());
}

#[test]
fn test_draw_count_bounded_by_index_buffer() {
    let (ctx, renderer, va) = setup();
    renderer.init().unwrap();
    renderer.begin_recording().unwrap();
    assert!(matches!(renderer.draw_command_count(&va, 7), Err(Error::UsageError(_))));
    renderer.draw_command_count(&va, 3).unwrap();
    renderer.draw_command_count(&va, 0).unwrap();
    renderer.end_recording().unwrap();
    assert_eq!(ctx.entries("draw"), vec!["draw 3".to_string()]);
}

#[test]
fn test_skipped_frame_drops_draws_silently() {
    let ctx = MockContext::new(0, 0);
    let api = MockRendererApi::new(ctx.log.clone(), ClipSpace::YUp);
    api.skip_frames.set(1);
    let renderer = Renderer::new(Box::new(api));
    let (_, _, va) = setup();

    renderer.init().unwrap();
    assert!(!renderer.begin_recording().unwrap());
    assert_eq!(renderer.state(), RendererState::Skipping);
    renderer.draw_command(&va).unwrap();
    renderer
        .set_push_constant(&va, ShaderStages::VERTEX, &[0; 64], 0)
        .unwrap();
    renderer.end_recording().unwrap();
    assert_eq!(renderer.state(), RendererState::Initialized);
    assert!(ctx.entries("draw").is_empty());
    assert!(ctx.entries("end").is_empty());
    assert_eq!(renderer.frames_recorded(), 0, "skipped frames are not counted");

    // Next frame records normally
    assert!(renderer.begin_recording().unwrap());
    assert_eq!(renderer.frames_recorded(), 1);
}

#[test]
fn test_stats_track_last_frame() {
    let (_ctx, renderer, va) = setup();
    renderer.init().unwrap();
    renderer.begin_recording().unwrap();
    renderer.draw_command(&va).unwrap();
    renderer.draw_command_count(&va, 3).unwrap();
    assert_eq!(renderer.current_stats().draw_calls, 2);
    assert_eq!(renderer.stats().draw_calls, 0);
    renderer.end_recording().unwrap();

    let stats = renderer.stats();
    assert_eq!(stats.draw_calls, 2);
    assert_eq!(stats.indices, 9);
}

#[test]
fn test_toggles_forwarded() {
    let (ctx, renderer, _va) = setup();
    renderer.enable_blending();
    renderer.disable_depth_test();
    assert_eq!(ctx.entries("blending"), vec!["blending true".to_string()]);
    assert_eq!(ctx.entries("depth"), vec!["depth false".to_string()]);
    assert_eq!(renderer.clip_space(), ClipSpace::YUp);
}

#[test]
fn test_shutdown_is_idempotent() {
    let (ctx, renderer, _va) = setup();
    renderer.init().unwrap();
    renderer.shutdown();
    renderer.shutdown();
    drop(renderer);
    assert_eq!(ctx.entries("shutdown").len(), 1);
}
