//! Voice conditioning state.

use std::path::Path;
use std::ptr::NonNull;

use crate::engine::{Engine, c_string};
use crate::error::{EngineMessage, PocketError, Result};
use crate::handle::{NativeHandle, ResourceKind};
use crate::model::Model;
use crate::sys::pocket_tts_voice_state_t;

#[derive(Debug, Clone, Copy)]
enum VoiceBytes {
    Audio,
    Prompt,
}

/// Conditioning state that biases synthesis toward a target voice.
///
/// Holds no reference to the model it was derived from, but remembers the
/// [`Engine`] that produced it: handing it to a model of another engine
/// instance fails with [`PocketError::ForeignVoice`] instead of reaching the
/// native layer.
#[derive(Debug)]
pub struct VoiceState {
    engine: Engine,
    handle: NativeHandle<pocket_tts_voice_state_t>,
}

impl VoiceState {
    pub(crate) fn from_handle(engine: Engine, handle: NativeHandle<pocket_tts_voice_state_t>) -> Self {
        Self { engine, handle }
    }

    /// The engine's built-in default voice.
    pub fn default_voice(engine: &Engine) -> Result<Self> {
        engine.default_voice()
    }

    /// Derive a voice from a reference audio file.
    ///
    /// Files with a `.safetensors` extension are read by the engine as
    /// precomputed prompts instead of audio.
    pub fn from_path<P: AsRef<Path>>(model: &Model, path: P) -> Result<Self> {
        let path = path.as_ref();
        let path_str = path.to_str().ok_or_else(|| {
            PocketError::Voice(EngineMessage::Message(format!(
                "voice path is not valid UTF-8: {}",
                path.display()
            )))
        })?;
        let model_ptr = model.live_ptr()?;
        let c_path = c_string(path_str, "voice path").map_err(PocketError::Voice)?;

        tracing::debug!(path = %path.display(), "deriving voice state from file");

        let result = model.engine().call(|api, errors| {
            // SAFETY: the model handle is live for the duration of the call.
            let raw = unsafe { api.voice_state_from_path(model_ptr.as_ptr(), &c_path) };
            NativeHandle::from_raw(raw, ResourceKind::VoiceState)
                .ok_or_else(|| PocketError::Voice(errors.take()))
        });
        Self::finish(model, result)
    }

    /// Derive a voice from encoded reference audio held in memory.
    pub fn from_audio_bytes(model: &Model, bytes: &[u8]) -> Result<Self> {
        Self::from_bytes(model, bytes, VoiceBytes::Audio)
    }

    /// Derive a voice from a precomputed prompt held in memory.
    pub fn from_prompt_bytes(model: &Model, bytes: &[u8]) -> Result<Self> {
        Self::from_bytes(model, bytes, VoiceBytes::Prompt)
    }

    fn from_bytes(model: &Model, bytes: &[u8], kind: VoiceBytes) -> Result<Self> {
        let model_ptr = model.live_ptr()?;
        if bytes.is_empty() {
            let what = match kind {
                VoiceBytes::Audio => "audio bytes empty",
                VoiceBytes::Prompt => "prompt bytes empty",
            };
            return Err(PocketError::Voice(what.into()));
        }

        tracing::debug!(bytes = bytes.len(), ?kind, "deriving voice state from memory");

        let result = model.engine().call(|api, errors| {
            // SAFETY: the model handle is live for the duration of the call.
            let raw = unsafe {
                match kind {
                    VoiceBytes::Audio => api.voice_state_from_audio_bytes(model_ptr.as_ptr(), bytes),
                    VoiceBytes::Prompt => api.voice_state_from_prompt_bytes(model_ptr.as_ptr(), bytes),
                }
            };
            NativeHandle::from_raw(raw, ResourceKind::VoiceState)
                .ok_or_else(|| PocketError::Voice(errors.take()))
        });
        Self::finish(model, result)
    }

    fn finish(model: &Model, result: Result<NativeHandle<pocket_tts_voice_state_t>>) -> Result<Self> {
        match result {
            Ok(handle) => Ok(Self::from_handle(model.engine().clone(), handle)),
            Err(err) => {
                tracing::warn!(error = %err, "voice state derivation failed");
                Err(err)
            }
        }
    }

    #[inline]
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Check whether the voice state still owns its native handle
    #[inline]
    pub fn is_live(&self) -> bool {
        self.handle.is_live()
    }

    pub(crate) fn live_ptr(&self) -> Result<NonNull<pocket_tts_voice_state_t>> {
        self.handle.live()
    }

    /// Release the native voice state. Idempotent.
    pub fn release(&mut self) {
        if let Some(ptr) = self.handle.take() {
            // SAFETY: the pointer was live and `take` guarantees this is the only release.
            self.engine.call(|api, _| unsafe { api.voice_state_free(ptr.as_ptr()) });
            tracing::debug!(kind = %self.handle.kind(), "released native handle");
        }
    }
}

impl Drop for VoiceState {
    fn drop(&mut self) {
        self.release();
    }
}
