/// KHR_debug output routed into the engine logger
///
/// Installed only when the context is created with `enable_validation`
/// and the driver exposes debug output.

use car_engine::car::log::LogSeverity;
use car_engine::car::Engine;
use std::sync::atomic::{AtomicU32, Ordering};

static ERROR_COUNT: AtomicU32 = AtomicU32::new(0);
static WARNING_COUNT: AtomicU32 = AtomicU32::new(0);

/// Engine severity of a `GL_DEBUG_SEVERITY_*` value
pub fn message_severity(severity: u32) -> LogSeverity {
    match severity {
        glow::DEBUG_SEVERITY_HIGH => LogSeverity::Error,
        glow::DEBUG_SEVERITY_MEDIUM => LogSeverity::Warn,
        glow::DEBUG_SEVERITY_LOW => LogSeverity::Info,
        _ => LogSeverity::Trace,
    }
}

fn message_kind(kind: u32) -> &'static str {
    match kind {
        glow::DEBUG_TYPE_ERROR => "ERROR",
        glow::DEBUG_TYPE_DEPRECATED_BEHAVIOR => "DEPRECATED",
        glow::DEBUG_TYPE_UNDEFINED_BEHAVIOR => "UNDEFINED",
        glow::DEBUG_TYPE_PORTABILITY => "PORTABILITY",
        glow::DEBUG_TYPE_PERFORMANCE => "PERFORMANCE",
        _ => "OTHER",
    }
}

/// Debug message callback handed to the driver
pub fn log_gl_message(_source: u32, kind: u32, id: u32, severity: u32, message: &str) {
    let severity = message_severity(severity);
    match severity {
        LogSeverity::Error => {
            ERROR_COUNT.fetch_add(1, Ordering::Relaxed);
        }
        LogSeverity::Warn => {
            WARNING_COUNT.fetch_add(1, Ordering::Relaxed);
        }
        _ => {}
    }
    Engine::log(
        severity,
        "car::opengl::debug",
        format!("[{}] {}: {}", message_kind(kind), id, message.trim_end()),
    );
}

/// (errors, warnings) reported by the driver since startup
pub fn debug_message_counts() -> (u32, u32) {
    (ERROR_COUNT.load(Ordering::Relaxed), WARNING_COUNT.load(Ordering::Relaxed))
}
