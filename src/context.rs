//! Explicit rendering context
//!
//! Replaces ambient "current renderer" state: the graphics API, the
//! configuration and the capability probe travel together in one cheap
//! clonable handle that every GPU-owning object keeps.

use std::fmt;
use std::rc::Rc;

use crate::backend::{Capabilities, GraphicsApi};
use crate::RenderConfig;

/// Upper bound on errors drained per poll; some drivers never clear the queue
/// after a context loss.
const MAX_ERRORS_PER_CHECK: usize = 16;

struct ContextInner {
    api: Box<dyn GraphicsApi>,
    config: RenderConfig,
    capabilities: Capabilities,
}

/// Shared handle to a graphics API and its configuration.
///
/// Single-threaded: all calls must happen on the thread owning the GL context.
#[derive(Clone)]
pub struct RenderContext {
    inner: Rc<ContextInner>,
}

impl RenderContext {
    /// Wrap `api`, probing its capabilities once.
    pub fn new(api: impl GraphicsApi + 'static, config: RenderConfig) -> Self {
        let capabilities = api.capabilities();
        log::info!(
            "RenderContext on {}: buffer objects {}{}",
            api.name(),
            if capabilities.buffer_objects { "available" } else { "unavailable" },
            if config.force_client_arrays { " (client arrays forced)" } else { "" }
        );
        Self {
            inner: Rc::new(ContextInner {
                api: Box::new(api),
                config,
                capabilities,
            }),
        }
    }

    pub fn api(&self) -> &dyn GraphicsApi {
        self.inner.api.as_ref()
    }

    pub fn config(&self) -> &RenderConfig {
        &self.inner.config
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.inner.capabilities
    }

    /// Whether new geometry buffers should live in buffer objects
    pub fn use_buffer_objects(&self) -> bool {
        self.inner.capabilities.buffer_objects && !self.inner.config.force_client_arrays
    }

    /// Drain the error queue, logging every error against `what`.
    ///
    /// Returns `true` when no error was pending.
    pub fn check_error(&self, what: &str) -> bool {
        let mut clean = true;
        for _ in 0..MAX_ERRORS_PER_CHECK {
            match self.inner.api.check_error() {
                Some(error) => {
                    log::error!("GL error in {}: {}", what, error);
                    clean = false;
                }
                None => break,
            }
        }
        clean
    }

    /// [`Self::check_error`], only when `auto_debug_output` is set
    pub(crate) fn debug_check(&self, what: &str) {
        if self.inner.config.auto_debug_output {
            self.check_error(what);
        }
    }

    /// Whether both handles refer to the same context
    pub fn same_context(&self, other: &RenderContext) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for RenderContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderContext")
            .field("api", &self.inner.api.name())
            .field("config", &self.inner.config)
            .field("capabilities", &self.inner.capabilities)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{DummyBackend, GlErrorCode};

    #[test]
    fn test_buffer_object_selection() {
        let ctx = RenderContext::new(DummyBackend::new(), RenderConfig::default());
        assert!(ctx.use_buffer_objects());

        let forced = RenderContext::new(
            DummyBackend::new(),
            RenderConfig::default().with_client_arrays(true),
        );
        assert!(!forced.use_buffer_objects());

        let legacy = RenderContext::new(DummyBackend::without_buffer_objects(), RenderConfig::default());
        assert!(!legacy.use_buffer_objects());
    }

    #[test]
    fn test_check_error_drains_queue() {
        let backend = DummyBackend::new();
        let ctx = RenderContext::new(backend.clone(), RenderConfig::default());
        assert!(ctx.check_error("idle"));
        backend.push_error(GlErrorCode::InvalidEnum);
        backend.push_error(GlErrorCode::OutOfMemory);
        assert!(!ctx.check_error("upload"));
        assert!(ctx.check_error("upload"));
    }

    #[test]
    fn test_clones_share_context() {
        let ctx = RenderContext::new(DummyBackend::new(), RenderConfig::default());
        let other = RenderContext::new(DummyBackend::new(), RenderConfig::default());
        assert!(ctx.same_context(&ctx.clone()));
        assert!(!ctx.same_context(&other));
    }
}
