//! Raw boundary of the pocket-tts engine.
//!
//! Mirrors `pocket_tts.h`: three opaque handle types, the status conventions,
//! and [`NativeApi`], one method per exported function. Nothing in here
//! manages lifetimes; that is the job of [`crate::handle`] and the resource
//! types built on top of it.

#![allow(non_camel_case_types)]

use std::ffi::CStr;
use std::os::raw::c_int;

/// Opaque loaded model.
#[repr(C)]
pub struct pocket_tts_model_t {
    _private: [u8; 0],
}

/// Opaque voice conditioning state.
#[repr(C)]
pub struct pocket_tts_voice_state_t {
    _private: [u8; 0],
}

/// Opaque in-progress generation session.
#[repr(C)]
pub struct pocket_tts_stream_t {
    _private: [u8; 0],
}

/// Status returned by one-shot generation on success; any other value is a failure.
pub const STATUS_OK: c_int = 0;
/// Status returned by `stream_next` when a chunk was produced.
pub const STREAM_CHUNK: c_int = 1;
/// Status returned by `stream_next` once the stream is exhausted.
pub const STREAM_END: c_int = 0;

/// Function table of the native engine.
///
/// Implemented by [`crate::DynamicLibrary`] for the real shared library and by
/// test doubles. Implementations are not required to be reentrant; callers
/// reach them through [`crate::Engine`], which serializes every call.
///
/// Loader methods return null on failure, `generate*` return a nonzero status,
/// `stream_next` a negative status. After any failure the reason (if any) is
/// available from [`NativeApi::last_error_message`] until the next fallible call.
pub trait NativeApi: Send + Sync {
    /// Copy of the most recent failure message, `None` if the slot is empty.
    fn last_error_message(&self) -> Option<String>;

    fn clear_error(&self);

    fn model_load(&self, variant: &CStr) -> *mut pocket_tts_model_t;

    fn model_load_from_dir(&self, variant: &CStr, model_dir: &CStr) -> *mut pocket_tts_model_t;

    fn model_load_with_params(
        &self,
        variant: &CStr,
        temperature: f32,
        lsd_decode_steps: usize,
        eos_threshold: f32,
    ) -> *mut pocket_tts_model_t;

    fn model_load_with_params_from_dir(
        &self,
        variant: &CStr,
        model_dir: &CStr,
        temperature: f32,
        lsd_decode_steps: usize,
        eos_threshold: f32,
    ) -> *mut pocket_tts_model_t;

    /// # Safety
    /// `model` must come from one of the loaders of this instance and not be freed yet.
    unsafe fn model_free(&self, model: *mut pocket_tts_model_t);

    /// # Safety
    /// `model` must be a live model handle of this instance.
    unsafe fn model_sample_rate(&self, model: *const pocket_tts_model_t) -> u32;

    fn voice_state_default(&self) -> *mut pocket_tts_voice_state_t;

    /// # Safety
    /// `model` must be a live model handle of this instance.
    unsafe fn voice_state_from_path(
        &self,
        model: *const pocket_tts_model_t,
        path: &CStr,
    ) -> *mut pocket_tts_voice_state_t;

    /// # Safety
    /// `model` must be a live model handle of this instance.
    unsafe fn voice_state_from_audio_bytes(
        &self,
        model: *const pocket_tts_model_t,
        bytes: &[u8],
    ) -> *mut pocket_tts_voice_state_t;

    /// # Safety
    /// `model` must be a live model handle of this instance.
    unsafe fn voice_state_from_prompt_bytes(
        &self,
        model: *const pocket_tts_model_t,
        bytes: &[u8],
    ) -> *mut pocket_tts_voice_state_t;

    /// # Safety
    /// `state` must come from this instance and not be freed yet.
    unsafe fn voice_state_free(&self, state: *mut pocket_tts_voice_state_t);

    /// # Safety
    /// `model` must be live; `voice_state` must be live or null. On success the
    /// buffer written to `out_ptr`/`out_len` is owned by the caller and must be
    /// handed back through [`NativeApi::audio_free`].
    unsafe fn generate(
        &self,
        model: *const pocket_tts_model_t,
        text: &CStr,
        voice_state: *const pocket_tts_voice_state_t,
        out_ptr: &mut *mut f32,
        out_len: &mut usize,
    ) -> c_int;

    /// # Safety
    /// Same contract as [`NativeApi::generate`].
    unsafe fn generate_with_pauses(
        &self,
        model: *const pocket_tts_model_t,
        text: &CStr,
        voice_state: *const pocket_tts_voice_state_t,
        out_ptr: &mut *mut f32,
        out_len: &mut usize,
    ) -> c_int;

    /// # Safety
    /// `model` must be live; `voice_state` must be live or null. Both must
    /// outlive the returned stream.
    unsafe fn stream_new(
        &self,
        model: *const pocket_tts_model_t,
        text: &CStr,
        voice_state: *const pocket_tts_voice_state_t,
        long_text: c_int,
    ) -> *mut pocket_tts_stream_t;

    /// # Safety
    /// `stream` must be live. A [`STREAM_CHUNK`] status transfers the buffer
    /// written to `out_ptr`/`out_len` to the caller.
    unsafe fn stream_next(
        &self,
        stream: *mut pocket_tts_stream_t,
        out_ptr: &mut *mut f32,
        out_len: &mut usize,
    ) -> c_int;

    /// # Safety
    /// `stream` must come from this instance and not be freed yet.
    unsafe fn stream_free(&self, stream: *mut pocket_tts_stream_t);

    /// # Safety
    /// `ptr`/`len` must be a buffer produced by this instance and not freed yet.
    unsafe fn audio_free(&self, ptr: *mut f32, len: usize);
}
