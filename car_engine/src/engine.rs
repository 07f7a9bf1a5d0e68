/// Car Engine - context object tying a backend to the renderers
///
/// The engine owns the graphics context, the `Renderer` built on it and,
/// once requested, a `Renderer2D`. There are no global renderer
/// singletons: whoever owns the `Engine` owns the device. The only
/// process-wide state is the logger slot.

use std::rc::Rc;
use std::sync::{OnceLock, RwLock};
use std::time::SystemTime;

use crate::error::Result;
use crate::log::{DefaultLogger, LogEntry, LogSeverity, Logger};
use crate::renderer::context::GraphicsContext;
use crate::renderer::renderer::Renderer;
use crate::renderer2d::Renderer2D;

// ===== INTERNAL STATE =====

/// Global logger (initialized with DefaultLogger)
static LOGGER: OnceLock<RwLock<Box<dyn Logger>>> = OnceLock::new();

fn logger_slot() -> &'static RwLock<Box<dyn Logger>> {
    LOGGER.get_or_init(|| RwLock::new(Box::new(DefaultLogger::default())))
}

// ===== PUBLIC API =====

/// Engine context
///
/// # Example
///
/// ```no_run
/// use std::rc::Rc;
/// use car_engine::car::Engine;
/// # fn context() -> Rc<dyn car_engine::car::render::GraphicsContext> { unimplemented!() }
///
/// let mut engine = Engine::new(context())?;
/// engine.init_renderer2d()?;
///
/// if engine.renderer().begin_recording()? {
///     engine.renderer().clear_color(0.1f32);
///     engine.renderer().clear();
///     engine.renderer().end_recording()?;
/// }
/// engine.context().swap_buffers()?;
/// engine.shutdown();
/// # Ok::<(), car_engine::car::Error>(())
/// ```
pub struct Engine {
    context: Rc<dyn GraphicsContext>,
    renderer: Rc<Renderer>,
    renderer2d: Option<Renderer2D>,
}

impl Engine {
    /// Create the renderer for `context` and initialize it
    pub fn new(context: Rc<dyn GraphicsContext>) -> Result<Self> {
        let api = context.clone().create_renderer_api()?;
        let renderer = Rc::new(Renderer::new(api));
        renderer.init()?;

        crate::engine_info!(
            "car::Engine",
            "Engine started on {:?} backend ({}x{})",
            context.backend(),
            context.framebuffer_size().0,
            context.framebuffer_size().1
        );

        Ok(Self { context, renderer, renderer2d: None })
    }

    pub fn context(&self) -> &Rc<dyn GraphicsContext> {
        &self.context
    }

    pub fn renderer(&self) -> &Rc<Renderer> {
        &self.renderer
    }

    /// Create the 2D batcher with the backend's built-in shader
    ///
    /// Calling it again keeps the existing batcher.
    pub fn init_renderer2d(&mut self) -> Result<&mut Renderer2D> {
        if self.renderer2d.is_none() {
            let renderer2d = Renderer2D::new(self.context.clone(), self.renderer.clone())?;
            self.renderer2d = Some(renderer2d);
        }
        self.renderer2d_mut()
    }

    pub fn renderer2d(&self) -> Option<&Renderer2D> {
        self.renderer2d.as_ref()
    }

    pub fn renderer2d_mut(&mut self) -> Result<&mut Renderer2D> {
        match self.renderer2d.as_mut() {
            Some(renderer2d) => Ok(renderer2d),
            None => crate::engine_bail_warn!("car::Engine", "Renderer2D not created. Call init_renderer2d() first."),
        }
    }

    /// Tear down the 2D batcher, then the renderer
    ///
    /// Resources the application still holds stay valid until dropped.
    pub fn shutdown(&mut self) {
        self.renderer2d = None;
        self.renderer.shutdown();
        crate::engine_info!("car::Engine", "Engine shut down");
    }

    // ===== LOGGING API =====

    /// Set a custom logger
    ///
    /// Replace the default logger with a custom implementation (file logger, network logger, etc.)
    ///
    /// # Example
    ///
    /// ```no_run
    /// use car_engine::car::{Engine, log::{Logger, LogEntry}};
    ///
    /// struct FileLogger;
    /// impl Logger for FileLogger {
    ///     fn log(&self, entry: &LogEntry) {
    ///         // Write to file...
    ///     }
    /// }
    ///
    /// Engine::set_logger(FileLogger);
    /// ```
    pub fn set_logger<L: Logger + 'static>(logger: L) {
        if let Ok(mut lock) = logger_slot().write() {
            *lock = Box::new(logger);
        }
    }

    /// Reset logger to default (DefaultLogger)
    pub fn reset_logger() {
        if let Ok(mut lock) = logger_slot().write() {
            *lock = Box::new(DefaultLogger::default());
        }
    }

    /// Internal logging method (for simple logs without file:line)
    ///
    /// Used by macros like engine_info!, engine_warn!, etc.
    pub fn log(severity: LogSeverity, source: &str, message: String) {
        if let Ok(lock) = logger_slot().read() {
            lock.log(&LogEntry {
                severity,
                timestamp: SystemTime::now(),
                source: source.to_string(),
                message,
                file: None,
                line: None,
            });
        }
    }

    /// Internal logging method with file:line information (for ERROR logs)
    pub fn log_detailed(
        severity: LogSeverity,
        source: &str,
        message: String,
        file: &'static str,
        line: u32,
    ) {
        if let Ok(lock) = logger_slot().read() {
            lock.log(&LogEntry {
                severity,
                timestamp: SystemTime::now(),
                source: source.to_string(),
                message,
                file: Some(file),
                line: Some(line),
            });
        }
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
