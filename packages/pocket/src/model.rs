//! Loaded synthesis model and the one-shot generation calls.

use std::path::{Path, PathBuf};
use std::ptr::{self, NonNull};

use crate::buffer::NativeBuffer;
use crate::config::GenerationParams;
use crate::engine::{Engine, c_string};
use crate::error::{EngineMessage, PocketError, Result};
use crate::handle::{NativeHandle, ResourceKind};
use crate::stream::Stream;
use crate::sys::{STATUS_OK, pocket_tts_model_t, pocket_tts_voice_state_t};
use crate::voice::VoiceState;

#[derive(Debug, Clone, Copy)]
enum Synthesis {
    Plain,
    WithPauses,
}

/// A loaded pocket-tts model.
///
/// Immutable after loading. Factory for [`VoiceState`]s and [`Stream`]s, and
/// entry point of the one-shot generation calls. All of them block the
/// calling thread for the full duration of the native work.
#[derive(Debug)]
pub struct Model {
    engine: Engine,
    handle: NativeHandle<pocket_tts_model_t>,
    sample_rate: u32,
    variant: String,
    model_dir: Option<PathBuf>,
    params: Option<GenerationParams>,
}

impl Model {
    /// Load a packaged model variant with the engine's default decoding parameters.
    pub fn load(engine: &Engine, variant: &str) -> Result<Self> {
        Self::load_inner(engine, variant, None, None)
    }

    /// Load a model variant from a local model directory.
    pub fn load_from_dir<P: AsRef<Path>>(engine: &Engine, variant: &str, model_dir: P) -> Result<Self> {
        Self::load_inner(engine, variant, Some(model_dir.as_ref()), None)
    }

    /// Load a packaged model variant with explicit decoding parameters.
    pub fn load_with_params(engine: &Engine, variant: &str, params: GenerationParams) -> Result<Self> {
        Self::load_inner(engine, variant, None, Some(params))
    }

    /// Load a model variant from a local directory with explicit decoding parameters.
    pub fn load_with_params_from_dir<P: AsRef<Path>>(
        engine: &Engine,
        variant: &str,
        model_dir: P,
        params: GenerationParams,
    ) -> Result<Self> {
        Self::load_inner(engine, variant, Some(model_dir.as_ref()), Some(params))
    }

    fn load_inner(
        engine: &Engine,
        variant: &str,
        model_dir: Option<&Path>,
        params: Option<GenerationParams>,
    ) -> Result<Self> {
        if let Some(reason) = params.as_ref().and_then(GenerationParams::invalid_reason) {
            return Err(PocketError::Load(EngineMessage::Message(reason)));
        }
        let c_variant = c_string(variant, "model variant").map_err(PocketError::Load)?;
        let c_dir = match model_dir {
            Some(dir) => {
                let dir = dir.to_str().ok_or_else(|| {
                    PocketError::Load(EngineMessage::Message(format!(
                        "model directory is not valid UTF-8: {}",
                        dir.display()
                    )))
                })?;
                Some(c_string(dir, "model directory").map_err(PocketError::Load)?)
            }
            None => None,
        };

        tracing::debug!(
            engine = engine.id(),
            variant,
            model_dir = ?model_dir,
            params = ?params,
            "loading pocket-tts model"
        );

        let loaded = engine.call(|api, errors| {
            let raw = match (&c_dir, &params) {
                (None, None) => api.model_load(&c_variant),
                (Some(dir), None) => api.model_load_from_dir(&c_variant, dir),
                (None, Some(p)) => api.model_load_with_params(
                    &c_variant,
                    p.temperature,
                    p.lsd_decode_steps,
                    p.eos_threshold,
                ),
                (Some(dir), Some(p)) => api.model_load_with_params_from_dir(
                    &c_variant,
                    dir,
                    p.temperature,
                    p.lsd_decode_steps,
                    p.eos_threshold,
                ),
            };
            let handle = NativeHandle::from_raw(raw, ResourceKind::Model)
                .ok_or_else(|| PocketError::Load(errors.take()))?;
            let ptr = handle.live()?;
            // SAFETY: freshly loaded and still owned by `handle`.
            let sample_rate = unsafe { api.model_sample_rate(ptr.as_ptr()) };
            Ok::<_, PocketError>((handle, sample_rate))
        });

        match loaded {
            Ok((handle, sample_rate)) => {
                tracing::info!(variant, sample_rate, "pocket-tts model loaded");
                Ok(Self {
                    engine: engine.clone(),
                    handle,
                    sample_rate,
                    variant: variant.to_string(),
                    model_dir: model_dir.map(Path::to_path_buf),
                    params,
                })
            }
            Err(err) => {
                tracing::warn!(variant, error = %err, "pocket-tts model load failed");
                Err(err)
            }
        }
    }

    /// Output sample rate in Hz, fixed at load time.
    pub fn sample_rate(&self) -> Result<u32> {
        self.handle.live()?;
        Ok(self.sample_rate)
    }

    /// Variant identifier the model was loaded with
    #[inline]
    pub fn variant(&self) -> &str {
        &self.variant
    }

    /// Local model directory, if the model was loaded from one
    #[inline]
    pub fn model_dir(&self) -> Option<&Path> {
        self.model_dir.as_deref()
    }

    /// Decoding parameters, `None` when the engine defaults were used
    #[inline]
    pub fn params(&self) -> Option<&GenerationParams> {
        self.params.as_ref()
    }

    #[inline]
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Check whether the model still owns its native handle
    #[inline]
    pub fn is_live(&self) -> bool {
        self.handle.is_live()
    }

    /// Derive a voice state from a reference audio file, or a `.safetensors` prompt file.
    pub fn voice_state_from_path<P: AsRef<Path>>(&self, path: P) -> Result<VoiceState> {
        VoiceState::from_path(self, path)
    }

    /// Derive a voice state from in-memory reference audio (an encoded audio file).
    pub fn voice_state_from_audio_bytes(&self, bytes: &[u8]) -> Result<VoiceState> {
        VoiceState::from_audio_bytes(self, bytes)
    }

    /// Derive a voice state from an in-memory precomputed prompt.
    pub fn voice_state_from_prompt_bytes(&self, bytes: &[u8]) -> Result<VoiceState> {
        VoiceState::from_prompt_bytes(self, bytes)
    }

    /// Synthesize `text` into one buffer.
    ///
    /// `voice` may be omitted to let the engine use its default voice.
    pub fn generate(&self, text: &str, voice: Option<&VoiceState>) -> Result<Vec<f32>> {
        self.synthesize(text, voice, Synthesis::Plain)
    }

    /// Synthesize `text` into one buffer, with the engine inserting pauses between segments.
    pub fn generate_with_pauses(&self, text: &str, voice: Option<&VoiceState>) -> Result<Vec<f32>> {
        self.synthesize(text, voice, Synthesis::WithPauses)
    }

    /// Start a chunked generation session for `text`.
    pub fn stream<'a>(&'a self, text: &str, voice: Option<&'a VoiceState>) -> Result<Stream<'a>> {
        Stream::new(self, text, voice, false)
    }

    /// Start a chunked generation session using the engine's long-text segmentation.
    pub fn stream_long<'a>(&'a self, text: &str, voice: Option<&'a VoiceState>) -> Result<Stream<'a>> {
        Stream::new(self, text, voice, true)
    }

    /// Start a chunked generation session with an explicit long-text flag.
    pub fn stream_with<'a>(
        &'a self,
        text: &str,
        voice: Option<&'a VoiceState>,
        long_text: bool,
    ) -> Result<Stream<'a>> {
        Stream::new(self, text, voice, long_text)
    }

    /// Release the native model. Idempotent.
    pub fn release(&mut self) {
        if let Some(ptr) = self.handle.take() {
            // SAFETY: the pointer was live and `take` guarantees this is the only release.
            self.engine.call(|api, _| unsafe { api.model_free(ptr.as_ptr()) });
            tracing::debug!(variant = %self.variant, "released pocket-tts model");
        }
    }

    pub(crate) fn live_ptr(&self) -> Result<NonNull<pocket_tts_model_t>> {
        self.handle.live()
    }

    /// Resolve the optional voice argument to a pointer the engine accepts.
    pub(crate) fn voice_ptr(&self, voice: Option<&VoiceState>) -> Result<*const pocket_tts_voice_state_t> {
        match voice {
            None => Ok(ptr::null()),
            Some(voice) => {
                if !voice.engine().same_engine(&self.engine) {
                    return Err(PocketError::ForeignVoice);
                }
                Ok(voice.live_ptr()?.as_ptr().cast_const())
            }
        }
    }

    fn synthesize(&self, text: &str, voice: Option<&VoiceState>, mode: Synthesis) -> Result<Vec<f32>> {
        let model = self.live_ptr()?;
        let voice_ptr = self.voice_ptr(voice)?;
        let c_text = c_string(text, "text").map_err(PocketError::Generation)?;

        tracing::debug!(chars = text.len(), ?mode, default_voice = voice.is_none(), "generating");

        let result = self.engine.call(|api, errors| {
            let mut out_ptr: *mut f32 = ptr::null_mut();
            let mut out_len: usize = 0;
            // SAFETY: model and voice handles are live for the duration of the call.
            let status = unsafe {
                match mode {
                    Synthesis::Plain => {
                        api.generate(model.as_ptr(), &c_text, voice_ptr, &mut out_ptr, &mut out_len)
                    }
                    Synthesis::WithPauses => api.generate_with_pauses(
                        model.as_ptr(),
                        &c_text,
                        voice_ptr,
                        &mut out_ptr,
                        &mut out_len,
                    ),
                }
            };
            // SAFETY: whatever the engine wrote to the out parameters is ours now.
            let buffer = unsafe { NativeBuffer::from_raw(api, out_ptr, out_len) };
            if status != STATUS_OK {
                return Err(PocketError::Generation(errors.take()));
            }
            Ok(buffer.to_vec())
        });

        match &result {
            Ok(samples) => tracing::debug!(samples = samples.len(), "generation finished"),
            Err(err) => tracing::warn!(error = %err, "generation failed"),
        }
        result
    }
}

impl Drop for Model {
    fn drop(&mut self) {
        self.release();
    }
}
