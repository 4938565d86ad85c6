//! Runtime binding to the pocket-tts shared library.
//!
//! The library is opened with `libloading` and every `pocket_tts_*` symbol is
//! resolved up front, so a missing export is reported when the library is
//! opened rather than on first use.

use std::ffi::{CStr, OsStr};
use std::os::raw::{c_char, c_int};
use std::path::Path;

use libloading::Library;

use crate::error::{PocketError, Result};
use crate::sys::{NativeApi, pocket_tts_model_t, pocket_tts_stream_t, pocket_tts_voice_state_t};

/// Base name of the engine's shared library, without platform prefix or suffix.
pub const LIBRARY_NAME: &str = "pocket_tts_ffi";

type LastErrorFn = unsafe extern "C" fn() -> *const c_char;
type ClearErrorFn = unsafe extern "C" fn();
type ModelLoadFn = unsafe extern "C" fn(*const c_char) -> *mut pocket_tts_model_t;
type ModelLoadFromDirFn =
    unsafe extern "C" fn(*const c_char, *const c_char) -> *mut pocket_tts_model_t;
type ModelLoadWithParamsFn =
    unsafe extern "C" fn(*const c_char, f32, usize, f32) -> *mut pocket_tts_model_t;
type ModelLoadWithParamsFromDirFn =
    unsafe extern "C" fn(*const c_char, *const c_char, f32, usize, f32) -> *mut pocket_tts_model_t;
type ModelFreeFn = unsafe extern "C" fn(*mut pocket_tts_model_t);
type ModelSampleRateFn = unsafe extern "C" fn(*const pocket_tts_model_t) -> u32;
type VoiceDefaultFn = unsafe extern "C" fn() -> *mut pocket_tts_voice_state_t;
type VoiceFromPathFn =
    unsafe extern "C" fn(*const pocket_tts_model_t, *const c_char) -> *mut pocket_tts_voice_state_t;
type VoiceFromBytesFn = unsafe extern "C" fn(
    *const pocket_tts_model_t,
    *const u8,
    usize,
) -> *mut pocket_tts_voice_state_t;
type VoiceFreeFn = unsafe extern "C" fn(*mut pocket_tts_voice_state_t);
type GenerateFn = unsafe extern "C" fn(
    *const pocket_tts_model_t,
    *const c_char,
    *const pocket_tts_voice_state_t,
    *mut *mut f32,
    *mut usize,
) -> c_int;
type StreamNewFn = unsafe extern "C" fn(
    *const pocket_tts_model_t,
    *const c_char,
    *const pocket_tts_voice_state_t,
    c_int,
) -> *mut pocket_tts_stream_t;
type StreamNextFn = unsafe extern "C" fn(*mut pocket_tts_stream_t, *mut *mut f32, *mut usize) -> c_int;
type StreamFreeFn = unsafe extern "C" fn(*mut pocket_tts_stream_t);
type AudioFreeFn = unsafe extern "C" fn(*mut f32, usize);

/// The pocket-tts engine loaded from a shared library at runtime.
pub struct DynamicLibrary {
    last_error_message: LastErrorFn,
    clear_error: ClearErrorFn,
    model_load: ModelLoadFn,
    model_load_from_dir: ModelLoadFromDirFn,
    model_load_with_params: ModelLoadWithParamsFn,
    model_load_with_params_from_dir: ModelLoadWithParamsFromDirFn,
    model_free: ModelFreeFn,
    model_sample_rate: ModelSampleRateFn,
    voice_state_default: VoiceDefaultFn,
    voice_state_from_path: VoiceFromPathFn,
    voice_state_from_audio_bytes: VoiceFromBytesFn,
    voice_state_from_prompt_bytes: VoiceFromBytesFn,
    voice_state_free: VoiceFreeFn,
    generate: GenerateFn,
    generate_with_pauses: GenerateFn,
    stream_new: StreamNewFn,
    stream_next: StreamNextFn,
    stream_free: StreamFreeFn,
    audio_free: AudioFreeFn,
    // Keeps the function pointers above valid; must be dropped last.
    _library: Library,
}

impl std::fmt::Debug for DynamicLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamicLibrary").finish_non_exhaustive()
    }
}

impl DynamicLibrary {
    /// Open the engine from an explicit library path.
    pub fn open<P: AsRef<OsStr>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let path_text = Path::new(path).display().to_string();

        // SAFETY: loading runs the library's initializers; the pocket-tts
        // library has no load-time side effects beyond symbol registration.
        let library = unsafe { Library::new(path) }.map_err(|source| PocketError::Library {
            path: path_text.clone(),
            source,
        })?;

        tracing::debug!(path = %path_text, "opened pocket-tts library");

        // SAFETY: each symbol is declared with the signature from pocket_tts.h.
        unsafe {
            Ok(Self {
                last_error_message: symbol(&library, &path_text, "pocket_tts_last_error_message")?,
                clear_error: symbol(&library, &path_text, "pocket_tts_clear_error")?,
                model_load: symbol(&library, &path_text, "pocket_tts_model_load")?,
                model_load_from_dir: symbol(&library, &path_text, "pocket_tts_model_load_from_dir")?,
                model_load_with_params: symbol(
                    &library,
                    &path_text,
                    "pocket_tts_model_load_with_params",
                )?,
                model_load_with_params_from_dir: symbol(
                    &library,
                    &path_text,
                    "pocket_tts_model_load_with_params_from_dir",
                )?,
                model_free: symbol(&library, &path_text, "pocket_tts_model_free")?,
                model_sample_rate: symbol(&library, &path_text, "pocket_tts_model_sample_rate")?,
                voice_state_default: symbol(&library, &path_text, "pocket_tts_voice_state_default")?,
                voice_state_from_path: symbol(
                    &library,
                    &path_text,
                    "pocket_tts_voice_state_from_path",
                )?,
                voice_state_from_audio_bytes: symbol(
                    &library,
                    &path_text,
                    "pocket_tts_voice_state_from_audio_bytes",
                )?,
                voice_state_from_prompt_bytes: symbol(
                    &library,
                    &path_text,
                    "pocket_tts_voice_state_from_prompt_bytes",
                )?,
                voice_state_free: symbol(&library, &path_text, "pocket_tts_voice_state_free")?,
                generate: symbol(&library, &path_text, "pocket_tts_generate")?,
                generate_with_pauses: symbol(&library, &path_text, "pocket_tts_generate_with_pauses")?,
                stream_new: symbol(&library, &path_text, "pocket_tts_stream_new")?,
                stream_next: symbol(&library, &path_text, "pocket_tts_stream_next")?,
                stream_free: symbol(&library, &path_text, "pocket_tts_stream_free")?,
                audio_free: symbol(&library, &path_text, "pocket_tts_audio_free")?,
                _library: library,
            })
        }
    }

    /// Open the engine by its platform library name, resolved through the
    /// dynamic loader's search path.
    pub fn open_default() -> Result<Self> {
        Self::open(libloading::library_filename(LIBRARY_NAME))
    }
}

/// Resolve one exported function and copy the pointer out of the library.
///
/// # Safety
/// `T` must be the exact function pointer type of the symbol.
unsafe fn symbol<T: Copy>(library: &Library, path: &str, name: &'static str) -> Result<T> {
    let mut bytes = Vec::with_capacity(name.len() + 1);
    bytes.extend_from_slice(name.as_bytes());
    bytes.push(0);

    // SAFETY: forwarded from the caller.
    let resolved = unsafe { library.get::<T>(&bytes) };
    match resolved {
        Ok(sym) => Ok(*sym),
        Err(source) => Err(PocketError::MissingSymbol {
            path: path.to_string(),
            symbol: name,
            source,
        }),
    }
}

impl NativeApi for DynamicLibrary {
    fn last_error_message(&self) -> Option<String> {
        // SAFETY: the returned pointer stays valid until the next fallible call,
        // and the string is copied before returning.
        unsafe {
            let msg = (self.last_error_message)();
            if msg.is_null() {
                return None;
            }
            Some(CStr::from_ptr(msg).to_string_lossy().into_owned())
        }
    }

    fn clear_error(&self) {
        unsafe { (self.clear_error)() }
    }

    fn model_load(&self, variant: &CStr) -> *mut pocket_tts_model_t {
        unsafe { (self.model_load)(variant.as_ptr()) }
    }

    fn model_load_from_dir(&self, variant: &CStr, model_dir: &CStr) -> *mut pocket_tts_model_t {
        unsafe { (self.model_load_from_dir)(variant.as_ptr(), model_dir.as_ptr()) }
    }

    fn model_load_with_params(
        &self,
        variant: &CStr,
        temperature: f32,
        lsd_decode_steps: usize,
        eos_threshold: f32,
    ) -> *mut pocket_tts_model_t {
        unsafe {
            (self.model_load_with_params)(
                variant.as_ptr(),
                temperature,
                lsd_decode_steps,
                eos_threshold,
            )
        }
    }

    fn model_load_with_params_from_dir(
        &self,
        variant: &CStr,
        model_dir: &CStr,
        temperature: f32,
        lsd_decode_steps: usize,
        eos_threshold: f32,
    ) -> *mut pocket_tts_model_t {
        unsafe {
            (self.model_load_with_params_from_dir)(
                variant.as_ptr(),
                model_dir.as_ptr(),
                temperature,
                lsd_decode_steps,
                eos_threshold,
            )
        }
    }

    unsafe fn model_free(&self, model: *mut pocket_tts_model_t) {
        unsafe { (self.model_free)(model) }
    }

    unsafe fn model_sample_rate(&self, model: *const pocket_tts_model_t) -> u32 {
        unsafe { (self.model_sample_rate)(model) }
    }

    fn voice_state_default(&self) -> *mut pocket_tts_voice_state_t {
        unsafe { (self.voice_state_default)() }
    }

    unsafe fn voice_state_from_path(
        &self,
        model: *const pocket_tts_model_t,
        path: &CStr,
    ) -> *mut pocket_tts_voice_state_t {
        unsafe { (self.voice_state_from_path)(model, path.as_ptr()) }
    }

    unsafe fn voice_state_from_audio_bytes(
        &self,
        model: *const pocket_tts_model_t,
        bytes: &[u8],
    ) -> *mut pocket_tts_voice_state_t {
        unsafe { (self.voice_state_from_audio_bytes)(model, bytes.as_ptr(), bytes.len()) }
    }

    unsafe fn voice_state_from_prompt_bytes(
        &self,
        model: *const pocket_tts_model_t,
        bytes: &[u8],
    ) -> *mut pocket_tts_voice_state_t {
        unsafe { (self.voice_state_from_prompt_bytes)(model, bytes.as_ptr(), bytes.len()) }
    }

    unsafe fn voice_state_free(&self, state: *mut pocket_tts_voice_state_t) {
        unsafe { (self.voice_state_free)(state) }
    }

    unsafe fn generate(
        &self,
        model: *const pocket_tts_model_t,
        text: &CStr,
        voice_state: *const pocket_tts_voice_state_t,
        out_ptr: &mut *mut f32,
        out_len: &mut usize,
    ) -> c_int {
        unsafe { (self.generate)(model, text.as_ptr(), voice_state, out_ptr, out_len) }
    }

    unsafe fn generate_with_pauses(
        &self,
        model: *const pocket_tts_model_t,
        text: &CStr,
        voice_state: *const pocket_tts_voice_state_t,
        out_ptr: &mut *mut f32,
        out_len: &mut usize,
    ) -> c_int {
        unsafe { (self.generate_with_pauses)(model, text.as_ptr(), voice_state, out_ptr, out_len) }
    }

    unsafe fn stream_new(
        &self,
        model: *const pocket_tts_model_t,
        text: &CStr,
        voice_state: *const pocket_tts_voice_state_t,
        long_text: c_int,
    ) -> *mut pocket_tts_stream_t {
        unsafe { (self.stream_new)(model, text.as_ptr(), voice_state, long_text) }
    }

    unsafe fn stream_next(
        &self,
        stream: *mut pocket_tts_stream_t,
        out_ptr: &mut *mut f32,
        out_len: &mut usize,
    ) -> c_int {
        unsafe { (self.stream_next)(stream, out_ptr, out_len) }
    }

    unsafe fn stream_free(&self, stream: *mut pocket_tts_stream_t) {
        unsafe { (self.stream_free)(stream) }
    }

    unsafe fn audio_free(&self, ptr: *mut f32, len: usize) {
        unsafe { (self.audio_free)(ptr, len) }
    }
}
