//! Explicitly constructed audio context.
//!
//! An [`AudioContext`] is a cheap, clonable handle around an [`AudioHost`].
//! Construct one per process and pass it to every sound. Browsers only allow
//! audio after a user gesture, so a context can be created empty and
//! initialized later; every clock, node or timer operation before that fails
//! with [`ContextError::NotInitialized`].
//!
//! Times are in seconds on the host's playback clock. The deferred-call
//! wrappers convert to the host's millisecond interface.

use std::cell::OnceCell;
use std::rc::Rc;

use crate::error::{ContextError, Result};
use crate::host::{AudioHost, NodeHandle, NodeKind, TimerId};

/// Shared handle to the host audio API.
#[derive(Clone, Default)]
pub struct AudioContext {
    host: Rc<OnceCell<Rc<dyn AudioHost>>>,
}

impl AudioContext {
    /// An uninitialized context. Call [`initialize`](Self::initialize) once the
    /// host is available.
    pub fn new() -> Self {
        Self::default()
    }

    /// A context that is ready immediately.
    pub fn with_host<H: AudioHost + 'static>(host: Rc<H>) -> Self {
        let context = Self::new();
        let _ = context.host.set(host);
        context
    }

    /// Attach the host. Every clone of this context sees it.
    pub fn initialize(&self, host: Rc<dyn AudioHost>) -> Result<(), ContextError> {
        self.host
            .set(host)
            .map_err(|_| ContextError::AlreadyInitialized)?;
        tracing::debug!("audio context initialized");
        Ok(())
    }

    /// Whether a host is attached.
    pub fn is_initialized(&self) -> bool {
        self.host.get().is_some()
    }

    fn host(&self) -> Result<&Rc<dyn AudioHost>, ContextError> {
        self.host.get().ok_or(ContextError::NotInitialized)
    }

    /// Current playback-clock time in seconds.
    pub fn current_time(&self) -> Result<f64, ContextError> {
        Ok(self.host()?.current_time())
    }

    /// Resume the clock if suspended. Idempotent.
    pub fn resume(&self) -> Result<(), ContextError> {
        let host = self.host()?;
        if !host.is_running() {
            tracing::debug!("resuming audio clock");
            host.resume();
        }
        Ok(())
    }

    /// Create a node of `kind`.
    pub fn create_node(&self, kind: NodeKind) -> Result<NodeHandle> {
        Ok(self.host()?.create_node(kind)?)
    }

    /// The host's final output node.
    pub fn destination(&self) -> Result<NodeHandle, ContextError> {
        Ok(self.host()?.destination())
    }

    /// Run `callback` after `delay` seconds of playback-clock time.
    /// Negative delays run at the next timer turn.
    pub fn schedule_after(
        &self,
        delay: f64,
        callback: impl FnOnce() + 'static,
    ) -> Result<TimerId, ContextError> {
        let delay_ms = delay.max(0.0) * 1000.0;
        Ok(self.host()?.schedule_after(delay_ms, Box::new(callback)))
    }

    /// Run `callback` when the playback clock reaches `time`.
    pub fn schedule_at(
        &self,
        time: f64,
        callback: impl FnOnce() + 'static,
    ) -> Result<TimerId, ContextError> {
        let now = self.current_time()?;
        self.schedule_after(time - now, callback)
    }

    /// Cancel a pending deferred call.
    pub fn cancel(&self, id: TimerId) -> Result<bool, ContextError> {
        Ok(self.host()?.cancel(id))
    }
}

impl core::fmt::Debug for AudioContext {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AudioContext")
            .field("initialized", &self.is_initialized())
            .finish_non_exhaustive()
    }
}
