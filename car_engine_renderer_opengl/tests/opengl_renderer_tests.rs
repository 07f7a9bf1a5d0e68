//! Integration tests for the OpenGL backend
//!
//! These tests create a real GL context on a hidden window. All of them
//! require a GPU and are marked with #[ignore].
//!
//! Run with: cargo test --test opengl_renderer_tests -- --ignored

use std::rc::Rc;

use car_engine::car::render::{
    BufferLayout, BufferType, BufferUsage, ContextConfig, DataType, Element, GraphicsContext, ImageData,
    IndexData, ShaderDesc, ShaderSource, ShaderStages, TextureFilter,
};
use car_engine::car::{Engine, Error};
use car_engine_renderer_opengl::{OpenGlContext, PUSH_CONSTANT_SIZE};
use serial_test::serial;
use winit::event_loop::EventLoop;
use winit::window::Window;

/// Helper to create a hidden test window
#[allow(deprecated)]
fn create_test_window() -> (Window, EventLoop<()>) {
    let event_loop = EventLoop::new().unwrap();
    let window_attrs = Window::default_attributes()
        .with_title("Car OpenGL Test")
        .with_inner_size(winit::dpi::PhysicalSize::new(800, 600))
        .with_visible(false);
    let window = event_loop.create_window(window_attrs).unwrap();
    (window, event_loop)
}

fn test_config() -> ContextConfig {
    ContextConfig {
        app_name: "Car OpenGL Test".to_string(),
        enable_validation: false,
        ..ContextConfig::default()
    }
}

fn quad_layout() -> BufferLayout {
    BufferLayout::new(vec![
        Element::new("a_position", DataType::Float2),
        Element::new("a_uv", DataType::Float2),
    ])
}

const FLAT_VERTEX: &str = r#"#version 450 core
layout(std140, binding = 15) uniform PushConstants {
    vec4 offset;
} pc;
layout(location = 0) in vec2 a_position;
layout(location = 1) in vec2 a_uv;
void main() {
    gl_Position = vec4(a_position + pc.offset.xy, 0.0, 1.0);
}
"#;

const FLAT_FRAGMENT: &str = r#"#version 450 core
layout(location = 0) out vec4 out_color;
void main() {
    out_color = vec4(1.0);
}
"#;

fn flat_shader_desc() -> ShaderDesc {
    ShaderDesc::new(
        ShaderSource::Bytes(FLAT_VERTEX.as_bytes().to_vec()),
        ShaderSource::Bytes(FLAT_FRAGMENT.as_bytes().to_vec()),
    )
}

// ============================================================================
// BUFFER TESTS
// ============================================================================

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_opengl_vertex_buffer_round_trip() {
    let (window, _event_loop) = create_test_window();
    let context = OpenGlContext::new(&window, test_config()).unwrap();

    for usage in [BufferUsage::StaticDraw, BufferUsage::DynamicDraw] {
        let data: Vec<u8> = (0..64).collect();
        let vb = context.create_vertex_buffer(Some(&data), 64, usage, quad_layout()).unwrap();
        assert_eq!(vb.size(), 64);
        assert_eq!(vb.read_data().unwrap(), data, "{:?} readback", usage);
    }
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_opengl_dynamic_buffer_grow_preserves_prefix() {
    let (window, _event_loop) = create_test_window();
    let context = OpenGlContext::new(&window, test_config()).unwrap();

    let vb = context
        .create_vertex_buffer(Some(&[1u8; 16]), 16, BufferUsage::DynamicDraw, quad_layout())
        .unwrap();
    vb.update_data(&[2u8; 16], 24).unwrap();

    let bytes = vb.read_data().unwrap();
    assert_eq!(bytes.len(), 40);
    assert_eq!(&bytes[..16], &[1u8; 16]);
    assert_eq!(&bytes[16..24], &[0u8; 8], "gap is zero-filled");
    assert_eq!(&bytes[24..40], &[2u8; 16]);
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_opengl_offset_zero_overflow_recreates() {
    let (window, _event_loop) = create_test_window();
    let context = OpenGlContext::new(&window, test_config()).unwrap();

    let vb = context
        .create_vertex_buffer(Some(&[1u8; 16]), 16, BufferUsage::StaticDraw, quad_layout())
        .unwrap();
    vb.update_data(&[5u8; 48], 0).unwrap();
    assert_eq!(vb.size(), 48);
    assert_eq!(vb.read_data().unwrap(), vec![5u8; 48]);
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_opengl_static_buffer_offset_growth_fails() {
    let (window, _event_loop) = create_test_window();
    let context = OpenGlContext::new(&window, test_config()).unwrap();

    let vb = context
        .create_vertex_buffer(None, 16, BufferUsage::StaticDraw, quad_layout())
        .unwrap();
    assert!(matches!(vb.update_data(&[0u8; 16], 8), Err(Error::UsageError(_))));
    assert_eq!(vb.size(), 16, "failed growth leaves the buffer untouched");
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_opengl_u8_indices_read_back_as_u8() {
    let (window, _event_loop) = create_test_window();
    let context = OpenGlContext::new(&window, test_config()).unwrap();

    let indices: [u8; 6] = [0, 1, 2, 2, 3, 0];
    let ib = context
        .create_index_buffer(Some(IndexData::U8(&indices)), 6, BufferType::Byte, BufferUsage::StaticDraw)
        .unwrap();
    assert_eq!(ib.count(), 6);
    assert_eq!(ib.read_data().unwrap(), indices.to_vec());

    assert!(ib.update_data(IndexData::U16(&[1, 2]), 0).is_err(), "type mismatch must fail");
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_opengl_uniform_buffer_set_and_read() {
    let (window, _event_loop) = create_test_window();
    let context = OpenGlContext::new(&window, test_config()).unwrap();

    let ub = context.create_uniform_buffer(64, 0, BufferUsage::DynamicDraw).unwrap();
    ub.set_data(&[7u8; 16], 16).unwrap();

    let bytes = ub.read_data().unwrap();
    assert_eq!(bytes.len(), 64);
    assert_eq!(&bytes[16..32], &[7u8; 16]);
    assert_eq!(&bytes[..16], &[0u8; 16]);

    assert!(ub.set_data(&[0u8; 16], 60).is_err(), "write past the end must fail");
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_opengl_ssbo_update_grows() {
    let (window, _event_loop) = create_test_window();
    let context = OpenGlContext::new(&window, test_config()).unwrap();

    let ssbo = context.create_ssbo(Some(&[1u8; 8]), 8, BufferUsage::DynamicDraw).unwrap();
    ssbo.update_buffer(&[3u8; 32]).unwrap();
    assert_eq!(ssbo.size(), 32);
    assert_eq!(ssbo.read_data().unwrap(), vec![3u8; 32]);

    ssbo.bind(2);
    ssbo.unbind();
}

// ============================================================================
// TEXTURE TESTS
// ============================================================================

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_opengl_texture_create_and_resize() {
    let (window, _event_loop) = create_test_window();
    let context = OpenGlContext::new(&window, test_config()).unwrap();

    let texture = context.create_texture(&ImageData::solid(4, 4, [255, 0, 0, 255])).unwrap();
    assert_eq!((texture.width(), texture.height()), (4, 4));
    assert_eq!(texture.bpp(), 4);

    texture.set_filters(TextureFilter::Nearest, TextureFilter::Nearest).unwrap();
    texture.set_repeat_x(true).unwrap();
    texture.set_repeat_y(true).unwrap();

    texture.update_data(&ImageData::solid(8, 2, [0, 255, 0, 255])).unwrap();
    assert_eq!((texture.width(), texture.height()), (8, 2));
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_opengl_texture_rejects_bad_pixels() {
    let (window, _event_loop) = create_test_window();
    let context = OpenGlContext::new(&window, test_config()).unwrap();

    let image = ImageData { width: 4, height: 4, pixels: vec![0; 10] };
    assert!(context.create_texture(&image).is_err());
}

// ============================================================================
// SHADER TESTS
// ============================================================================

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_opengl_shader_compile_error_is_reported() {
    let (window, _event_loop) = create_test_window();
    let context = OpenGlContext::new(&window, test_config()).unwrap();

    let desc = ShaderDesc::new(
        ShaderSource::Bytes(b"#version 450 core\nvoid main() { this is not glsl }\n".to_vec()),
        ShaderSource::Bytes(FLAT_FRAGMENT.as_bytes().to_vec()),
    );
    assert!(matches!(context.create_shader(&desc), Err(Error::InvalidResource(_))));
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_opengl_builtin_2d_shader_links() {
    let (window, _event_loop) = create_test_window();
    let context = OpenGlContext::new(&window, test_config()).unwrap();

    let desc = context.renderer2d_shader().unwrap();
    assert!(context.create_shader(&desc).is_ok());
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_opengl_vertex_array_rejects_layout_the_shader_cannot_read() {
    let (window, _event_loop) = create_test_window();
    let context = OpenGlContext::new(&window, test_config()).unwrap();

    // a_position is a vec2, the layout feeds a vec3
    let layout = BufferLayout::new(vec![Element::new("a_position", DataType::Float3)]);
    let vb = context.create_vertex_buffer(None, 36, BufferUsage::StaticDraw, layout).unwrap();
    let ib = context
        .create_index_buffer(Some(IndexData::U16(&[0, 1, 2])), 3, BufferType::UnsignedShort, BufferUsage::StaticDraw)
        .unwrap();
    let shader = context.create_shader(&flat_shader_desc()).unwrap();

    assert!(matches!(
        context.create_vertex_array(vb, ib.clone(), shader.clone()),
        Err(Error::UsageError(_))
    ));

    let vb = context.create_vertex_buffer(None, 64, BufferUsage::StaticDraw, quad_layout()).unwrap();
    assert!(context.create_vertex_array(vb, ib, shader).is_ok());
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_opengl_push_constants_and_draw() {
    let (window, _event_loop) = create_test_window();
    let context: Rc<dyn GraphicsContext> = Rc::new(OpenGlContext::new(&window, test_config()).unwrap());
    let engine = Engine::new(context.clone()).unwrap();

    let vertices: [f32; 16] = [
        -0.5, -0.5, 0.0, 0.0, //
        0.5, -0.5, 1.0, 0.0, //
        0.5, 0.5, 1.0, 1.0, //
        -0.5, 0.5, 0.0, 1.0,
    ];
    let vb = context
        .create_vertex_buffer(
            Some(bytemuck::cast_slice(&vertices)),
            64,
            BufferUsage::StaticDraw,
            quad_layout(),
        )
        .unwrap();
    let ib = context
        .create_index_buffer(
            Some(IndexData::U16(&[0, 1, 2, 2, 3, 0])),
            6,
            BufferType::UnsignedShort,
            BufferUsage::StaticDraw,
        )
        .unwrap();
    let shader = context.create_shader(&flat_shader_desc()).unwrap();
    let va = context.create_vertex_array(vb, ib, shader).unwrap();

    let renderer = engine.renderer();
    assert!(renderer.begin_recording().unwrap());
    renderer.clear();
    renderer
        .set_push_constant(&va, ShaderStages::VERTEX, &[0u8; 16], 0)
        .unwrap();
    assert!(
        renderer
            .set_push_constant(&va, ShaderStages::VERTEX, &[0u8; 16], PUSH_CONSTANT_SIZE - 8)
            .is_err(),
        "push past the range must fail"
    );
    renderer.draw_command(&va).unwrap();
    renderer.end_recording().unwrap();
    context.swap_buffers().unwrap();

    assert_eq!(renderer.stats().draw_calls, 1);
    assert_eq!(renderer.stats().indices, 6);
}

// ============================================================================
// FRAME TESTS
// ============================================================================

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_opengl_frames_cycle_slots() {
    let (window, _event_loop) = create_test_window();
    let gl_context = Rc::new(OpenGlContext::new(&window, test_config()).unwrap());
    let context: Rc<dyn GraphicsContext> = gl_context.clone();
    let engine = Engine::new(context.clone()).unwrap();

    let frames = context.max_frames_in_flight();
    for frame in 0..(frames * 2 + 1) {
        assert_eq!(context.current_frame_index(), frame % frames);
        assert!(engine.renderer().begin_recording().unwrap());
        engine.renderer().clear_color(0x202020ffu32);
        engine.renderer().clear();
        engine.renderer().end_recording().unwrap();
        context.swap_buffers().unwrap();
    }
    assert_eq!(gl_context.frames_presented(), (frames * 2 + 1) as u64);
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_opengl_zero_size_skips_frame() {
    let (window, _event_loop) = create_test_window();
    let context: Rc<dyn GraphicsContext> = Rc::new(OpenGlContext::new(&window, test_config()).unwrap());
    let engine = Engine::new(context.clone()).unwrap();

    context.resize(0, 0).unwrap();
    assert!(!engine.renderer().begin_recording().unwrap());
    engine.renderer().end_recording().unwrap();
    context.swap_buffers().unwrap();
    assert_eq!(context.current_frame_index(), 0, "skipped frames do not advance the slot");

    context.resize(800, 600).unwrap();
    assert!(engine.renderer().begin_recording().unwrap());
    engine.renderer().end_recording().unwrap();
    context.swap_buffers().unwrap();
    assert_eq!(context.current_frame_index(), 1 % context.max_frames_in_flight());
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_opengl_renderer2d_draws_quads() {
    use car_engine::car::render2d::Rect;

    let (window, _event_loop) = create_test_window();
    let context: Rc<dyn GraphicsContext> = Rc::new(OpenGlContext::new(&window, test_config()).unwrap());
    let mut engine = Engine::new(context.clone()).unwrap();
    engine.init_renderer2d().unwrap();

    assert!(engine.renderer().begin_recording().unwrap());
    engine.renderer().clear();
    {
        let renderer2d = engine.renderer2d_mut().unwrap();
        renderer2d.begin();
        renderer2d
            .draw_rect(Rect::new(10.0, 10.0, 100.0, 50.0), (1.0, 0.0, 0.0))
            .unwrap();
        renderer2d.end().unwrap();
    }
    engine.renderer().end_recording().unwrap();
    context.swap_buffers().unwrap();

    assert_eq!(engine.renderer().stats().draw_calls, 1);
}
