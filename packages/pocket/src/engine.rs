//! Engine handle, call gate and error channel.
//!
//! The native engine keeps a single process-wide "last error" slot and makes
//! no promise that its entry points are reentrant. Both facts are handled
//! here: every call into [`NativeApi`] goes through [`Engine::call`], which
//! holds the process-wide call gate for the whole closure. A failure sentinel
//! and the read of the error slot that explains it therefore always happen
//! inside the same critical section, and no other thread's call can clear or
//! overwrite the slot in between, whichever [`Engine`] it was made through.
//!
//! The gate is shared by every engine in the process, not held per engine or
//! per model. Opening the same library twice yields the same native error
//! slot, so per-instance locking would not protect it.

use std::ffi::{CString, OsStr};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, const_mutex};

use crate::error::{EngineMessage, PocketError, Result};
use crate::handle::{NativeHandle, ResourceKind};
use crate::library::DynamicLibrary;
use crate::sys::NativeApi;
use crate::voice::VoiceState;

static NEXT_ENGINE_ID: AtomicU64 = AtomicU64::new(1);

/// Serializes every native call in the process.
static NATIVE_GATE: Mutex<()> = const_mutex(());

struct EngineInner {
    api: Arc<dyn NativeApi>,
    id: u64,
}

/// Shared handle to one native engine instance.
///
/// Cloning is cheap and yields a handle to the same engine instance.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine").field("id", &self.inner.id).finish()
    }
}

impl Engine {
    /// Wrap an existing implementation of the native function table.
    ///
    /// Calls through every engine, including several wrapping the same
    /// `api`, share one process-wide gate. Each engine still gets its own
    /// id, so voices are only accepted by models of the same `Engine` and its
    /// clones.
    pub fn from_api(api: Arc<dyn NativeApi>) -> Self {
        let id = NEXT_ENGINE_ID.fetch_add(1, Ordering::Relaxed);
        Self {
            inner: Arc::new(EngineInner { api, id }),
        }
    }

    /// Open the engine's shared library from an explicit path.
    pub fn open<P: AsRef<OsStr>>(path: P) -> Result<Self> {
        Ok(Self::from_api(Arc::new(DynamicLibrary::open(path)?)))
    }

    /// Open the engine's shared library through the loader search path.
    pub fn open_default() -> Result<Self> {
        Ok(Self::from_api(Arc::new(DynamicLibrary::open_default()?)))
    }

    /// Process-unique identifier of this engine instance.
    #[inline]
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Check whether two handles refer to the same engine instance
    #[inline]
    pub fn same_engine(&self, other: &Engine) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Read the engine's last error message without clearing it.
    pub fn last_error_message(&self) -> Option<String> {
        self.call(|_, errors| errors.last_message())
    }

    /// Clear the engine's last error message.
    pub fn clear_error(&self) {
        self.call(|_, errors| errors.clear())
    }

    /// Create the engine's built-in default voice state.
    pub fn default_voice(&self) -> Result<VoiceState> {
        let handle = self.call(|api, errors| {
            NativeHandle::from_raw(api.voice_state_default(), ResourceKind::VoiceState)
                .ok_or_else(|| PocketError::Voice(errors.take()))
        });
        match handle {
            Ok(handle) => {
                tracing::debug!(engine = self.id(), "created default voice state");
                Ok(VoiceState::from_handle(self.clone(), handle))
            }
            Err(err) => {
                tracing::warn!(error = %err, "default voice state failed");
                Err(err)
            }
        }
    }

    /// Run `f` with exclusive access to the native engine.
    pub(crate) fn call<T>(&self, f: impl FnOnce(&dyn NativeApi, ErrorChannel<'_>) -> T) -> T {
        let _guard = NATIVE_GATE.lock();
        let api = self.inner.api.as_ref();
        f(api, ErrorChannel { api })
    }
}

/// Read-and-clear view of the engine's last error slot.
///
/// Only handed out inside [`Engine::call`], so it is always read under the
/// same gate as the call that failed.
pub(crate) struct ErrorChannel<'a> {
    api: &'a dyn NativeApi,
}

impl ErrorChannel<'_> {
    /// The current message, if any.
    pub(crate) fn last_message(&self) -> Option<String> {
        self.api.last_error_message()
    }

    pub(crate) fn clear(&self) {
        self.api.clear_error();
    }

    /// Read and clear the slot. An empty or blank message becomes [`EngineMessage::Unknown`].
    pub(crate) fn take(&self) -> EngineMessage {
        let message = self.api.last_error_message();
        self.api.clear_error();
        match message {
            Some(msg) if !msg.trim().is_empty() => EngineMessage::Message(msg),
            _ => EngineMessage::Unknown,
        }
    }
}

/// Convert caller text to a C string, describing the rejection locally on interior NUL.
pub(crate) fn c_string(value: &str, what: &str) -> std::result::Result<CString, EngineMessage> {
    CString::new(value)
        .map_err(|e| EngineMessage::Message(format!("{what} contains a NUL byte at {}", e.nul_position())))
}
