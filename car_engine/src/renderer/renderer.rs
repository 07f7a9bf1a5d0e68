/// Renderer facade - frame lifecycle and draw submission over a backend command API

use std::cell::Cell;
use std::rc::Rc;

use crate::error::Result;
use crate::renderer::color::Color;
use crate::renderer::shader::ShaderStages;
use crate::renderer::vertex_array::VertexArray;

// ============================================================================
// Common types
// ============================================================================

/// Vertical orientation of the backend's clip space
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipSpace {
    /// +Y points up (OpenGL)
    YUp,
    /// +Y points down (Vulkan)
    YDown,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

impl Viewport {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height, min_depth: 0.0, max_depth: 1.0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scissor {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// Per-frame counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub draw_calls: u32,
    pub indices: u64,
}

/// Lifecycle of the [`Renderer`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RendererState {
    Uninitialized,
    Initialized,
    Recording,
    /// A frame was begun but the backend has nothing to draw into (minimized window)
    Skipping,
    Shutdown,
}

// ============================================================================
// Backend command API
// ============================================================================

/// Backend command interface behind the [`Renderer`]
///
/// Implementations record (Vulkan) or issue (OpenGL) commands for the
/// current frame. Lifecycle checks happen in the facade, so
/// implementations can assume calls arrive in a valid state.
pub trait RendererApi {
    fn init(&self) -> Result<()>;

    fn shutdown(&self);

    /// Start a frame. `Ok(false)` means the frame cannot be drawn and must be skipped.
    fn begin_recording(&self) -> Result<bool>;

    fn end_recording(&self) -> Result<()>;

    fn set_clear_color(&self, color: Color);

    fn clear(&self);

    fn set_viewport(&self, viewport: Viewport);

    fn set_scissor(&self, scissor: Scissor);

    /// Bind the vertex array and draw its first `index_count` indices
    fn draw_indexed(&self, vertex_array: &Rc<dyn VertexArray>, index_count: u32) -> Result<()>;

    fn push_constant(
        &self,
        vertex_array: &Rc<dyn VertexArray>,
        stages: ShaderStages,
        data: &[u8],
        offset: u32,
    ) -> Result<()>;

    fn set_blending(&self, enabled: bool);

    fn set_depth_test(&self, enabled: bool);

    fn clip_space(&self) -> ClipSpace;
}

// ============================================================================
// Renderer facade
// ============================================================================

/// Frame lifecycle and draw submission
///
/// `Uninitialized -> Initialized -> (begin_recording -> draw* -> end_recording)* -> Shutdown`.
/// Calls made in the wrong state are usage errors: they are logged and
/// either ignored or answered with `Error::UsageError`.
pub struct Renderer {
    api: Box<dyn RendererApi>,
    state: Cell<RendererState>,
    frame_stats: Cell<FrameStats>,
    last_frame_stats: Cell<FrameStats>,
    frames_recorded: Cell<u64>,
}

impl Renderer {
    pub fn new(api: Box<dyn RendererApi>) -> Self {
        Self {
            api,
            state: Cell::new(RendererState::Uninitialized),
            frame_stats: Cell::new(FrameStats::default()),
            last_frame_stats: Cell::new(FrameStats::default()),
            frames_recorded: Cell::new(0),
        }
    }

    pub fn state(&self) -> RendererState {
        self.state.get()
    }

    pub fn init(&self) -> Result<()> {
        if self.state.get() != RendererState::Uninitialized {
            crate::engine_bail_warn!("car::Renderer", "init called in state {:?}", self.state.get());
        }
        self.api.init()?;
        self.state.set(RendererState::Initialized);
        crate::engine_debug!("car::Renderer", "Renderer initialized");
        Ok(())
    }

    /// Release backend state; safe to call more than once
    pub fn shutdown(&self) {
        match self.state.get() {
            RendererState::Shutdown | RendererState::Uninitialized => {}
            _ => {
                self.api.shutdown();
                crate::engine_debug!("car::Renderer", "Renderer shut down");
            }
        }
        self.state.set(RendererState::Shutdown);
    }

    /// Start recording a frame
    ///
    /// Returns `Ok(false)` when the backend skips this frame; draws issued
    /// until `end_recording` are then dropped silently.
    pub fn begin_recording(&self) -> Result<bool> {
        if self.state.get() != RendererState::Initialized {
            crate::engine_bail_warn!("car::Renderer", "begin_recording called in state {:?}", self.state.get());
        }
        self.frame_stats.set(FrameStats::default());
        if self.api.begin_recording()? {
            self.state.set(RendererState::Recording);
            self.frames_recorded.set(self.frames_recorded.get() + 1);
            Ok(true)
        } else {
            self.state.set(RendererState::Skipping);
            Ok(false)
        }
    }

    pub fn end_recording(&self) -> Result<()> {
        match self.state.get() {
            RendererState::Recording => {
                self.state.set(RendererState::Initialized);
                self.last_frame_stats.set(self.frame_stats.get());
                self.api.end_recording()
            }
            RendererState::Skipping => {
                self.state.set(RendererState::Initialized);
                Ok(())
            }
            state => crate::engine_bail_warn!("car::Renderer", "end_recording called in state {:?}", state),
        }
    }

    /// Number of frames that started recording; skipped frames are not counted
    pub fn frames_recorded(&self) -> u64 {
        self.frames_recorded.get()
    }

    pub fn is_recording(&self) -> bool {
        self.state.get() == RendererState::Recording
    }

    /// Set the clear color; accepts `(r, g, b, a)`, `(r, g, b)`, `(gray, a)`, `gray` or `0xRRGGBBAA`
    pub fn clear_color(&self, color: impl Into<Color>) {
        self.api.set_clear_color(color.into());
    }

    pub fn clear(&self) {
        if self.ready_for_commands("clear") {
            self.api.clear();
        }
    }

    pub fn set_viewport(&self, viewport: Viewport) {
        if self.ready_for_commands("set_viewport") {
            self.api.set_viewport(viewport);
        }
    }

    pub fn set_scissor(&self, scissor: Scissor) {
        if self.ready_for_commands("set_scissor") {
            self.api.set_scissor(scissor);
        }
    }

    /// Draw every index of the vertex array
    pub fn draw_command(&self, vertex_array: &Rc<dyn VertexArray>) -> Result<()> {
        let count = vertex_array.index_buffer().count();
        self.draw_command_count(vertex_array, count)
    }

    /// Draw the first `index_count` indices of the vertex array
    pub fn draw_command_count(&self, vertex_array: &Rc<dyn VertexArray>, index_count: u32) -> Result<()> {
        match self.state.get() {
            RendererState::Recording => {}
            RendererState::Skipping => return Ok(()),
            state => crate::engine_bail_warn!("car::Renderer", "draw issued outside recording (state {:?})", state),
        }
        let available = vertex_array.index_buffer().count();
        if index_count > available {
            crate::engine_bail_warn!(
                "car::Renderer",
                "draw of {} indices exceeds index buffer of {}",
                index_count,
                available
            );
        }
        if index_count == 0 {
            return Ok(());
        }
        self.api.draw_indexed(vertex_array, index_count)?;

        let mut stats = self.frame_stats.get();
        stats.draw_calls += 1;
        stats.indices += index_count as u64;
        self.frame_stats.set(stats);
        Ok(())
    }

    pub fn set_push_constant(
        &self,
        vertex_array: &Rc<dyn VertexArray>,
        stages: ShaderStages,
        data: &[u8],
        offset: u32,
    ) -> Result<()> {
        match self.state.get() {
            RendererState::Recording => self.api.push_constant(vertex_array, stages, data, offset),
            RendererState::Skipping => Ok(()),
            state => crate::engine_bail_warn!("car::Renderer", "push constant outside recording (state {:?})", state),
        }
    }

    pub fn enable_blending(&self) {
        self.api.set_blending(true);
    }

    pub fn disable_blending(&self) {
        self.api.set_blending(false);
    }

    pub fn enable_depth_test(&self) {
        self.api.set_depth_test(true);
    }

    pub fn disable_depth_test(&self) {
        self.api.set_depth_test(false);
    }

    pub fn clip_space(&self) -> ClipSpace {
        self.api.clip_space()
    }

    /// Counters of the last completed frame
    pub fn stats(&self) -> FrameStats {
        self.last_frame_stats.get()
    }

    /// Counters of the frame being recorded
    pub fn current_stats(&self) -> FrameStats {
        self.frame_stats.get()
    }

    fn ready_for_commands(&self, what: &str) -> bool {
        match self.state.get() {
            RendererState::Recording => true,
            RendererState::Skipping => false,
            state => {
                crate::engine_warn!("car::Renderer", "{} called outside recording (state {:?})", what, state);
                false
            }
        }
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
#[path = "renderer_tests.rs"]
mod tests;
