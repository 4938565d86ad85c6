//! Deterministic in-process stand-in for the pocket-tts shared library.
//!
//! Synthesis is a pure function of the text: every byte of a segment becomes
//! `SAMPLES_PER_BYTE` samples of value `byte / 256`. Streams yield one chunk per
//! word (or per sentence in long-text mode); one-shot generation returns the
//! concatenation of the same chunks.
//!
//! Trigger words:
//! - variant `not-a-real-variant` fails to load with "bad variant"
//! - variant `silent-failure` fails to load without an error message
//! - text containing `FAIL` makes `generate` fail and the stream fail on that word
//! - voice paths must end in `.wav` or `.safetensors`
//!
//! Every allocation is tracked; freeing anything twice or anything unknown panics.

#![allow(dead_code)]

use std::collections::{HashSet, VecDeque};
use std::ffi::CStr;
use std::os::raw::c_int;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use fluent_voice_pocket::sys::{
    NativeApi, pocket_tts_model_t, pocket_tts_stream_t, pocket_tts_voice_state_t,
};
use fluent_voice_pocket::{Engine, Model};
use parking_lot::Mutex;

pub const SAMPLE_RATE: u32 = 24_000;
pub const SAMPLES_PER_BYTE: usize = 2;
pub const PAUSE_SAMPLES: usize = 5;
pub const FAIL_WORD: &str = "FAIL";

struct FakeModel {
    sample_rate: u32,
}

struct FakeVoice {
    gain: f32,
}

struct FakeStream {
    segments: VecDeque<String>,
    gain: f32,
}

#[derive(Default)]
pub struct Counters {
    pub native_calls: AtomicUsize,
    pub model_loads: AtomicUsize,
    pub model_frees: AtomicUsize,
    pub voice_creates: AtomicUsize,
    pub voice_frees: AtomicUsize,
    pub byte_voice_calls: AtomicUsize,
    pub generate_calls: AtomicUsize,
    pub stream_creates: AtomicUsize,
    pub stream_polls: AtomicUsize,
    pub stream_frees: AtomicUsize,
    pub buffers_returned: AtomicUsize,
    pub audio_frees: AtomicUsize,
}

impl Counters {
    pub fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
pub struct FakeEngine {
    pub counters: Counters,
    last_error: Mutex<Option<String>>,
    live: Mutex<HashSet<usize>>,
    live_buffers: Mutex<HashSet<usize>>,
    /// Return zero-length buffers from `generate`
    pub empty_output: std::sync::atomic::AtomicBool,
    /// Linger after writing a failure message, before returning the sentinel
    pub slow_failures: std::sync::atomic::AtomicBool,
}

impl FakeEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn native_calls(&self) -> usize {
        Counters::get(&self.counters.native_calls)
    }

    pub fn live_handles(&self) -> usize {
        self.live.lock().len()
    }

    pub fn live_buffers(&self) -> usize {
        self.live_buffers.lock().len()
    }

    pub fn set_error(&self, msg: &str) {
        *self.last_error.lock() = Some(msg.to_string());
    }

    fn enter(&self) {
        self.counters.native_calls.fetch_add(1, Ordering::SeqCst);
    }

    fn fail<T>(&self, msg: Option<&str>) -> *mut T {
        *self.last_error.lock() = msg.map(str::to_string);
        if self.slow_failures.load(Ordering::SeqCst) {
            std::thread::sleep(std::time::Duration::from_millis(5));
        }
        std::ptr::null_mut()
    }

    fn track<T>(&self, value: T) -> *mut T {
        let ptr = Box::into_raw(Box::new(value));
        self.live.lock().insert(ptr as usize);
        ptr
    }

    unsafe fn untrack<T>(&self, ptr: *mut T) -> Box<T> {
        assert!(
            self.live.lock().remove(&(ptr as usize)),
            "free of unknown or already freed handle {ptr:p}"
        );
        unsafe { Box::from_raw(ptr) }
    }

    fn emit(&self, samples: Vec<f32>, out_ptr: &mut *mut f32, out_len: &mut usize) {
        let mut boxed = samples.into_boxed_slice();
        let len = boxed.len();
        let ptr = boxed.as_mut_ptr();
        std::mem::forget(boxed);
        self.live_buffers.lock().insert(ptr as usize);
        self.counters.buffers_returned.fetch_add(1, Ordering::SeqCst);
        *out_ptr = ptr;
        *out_len = len;
    }

    fn voice_gain(voice: *const pocket_tts_voice_state_t) -> f32 {
        if voice.is_null() {
            1.0
        } else {
            unsafe { (*(voice as *const FakeVoice)).gain }
        }
    }
}

/// Synthesize one segment deterministically.
pub fn synth(segment: &str, gain: f32) -> Vec<f32> {
    segment
        .bytes()
        .flat_map(|b| std::iter::repeat_n(b as f32 / 256.0 * gain, SAMPLES_PER_BYTE))
        .collect()
}

pub fn segments(text: &str, long_text: bool) -> Vec<String> {
    if long_text {
        text.split_inclusive('.')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    } else {
        text.split_whitespace().map(str::to_string).collect()
    }
}

/// What one-shot `generate` returns for `text` with the default voice.
pub fn expected_samples(text: &str) -> Vec<f32> {
    segments(text, false).iter().flat_map(|s| synth(s, 1.0)).collect()
}

impl NativeApi for FakeEngine {
    fn last_error_message(&self) -> Option<String> {
        self.enter();
        self.last_error.lock().clone()
    }

    fn clear_error(&self) {
        self.enter();
        *self.last_error.lock() = None;
    }

    fn model_load(&self, variant: &CStr) -> *mut pocket_tts_model_t {
        self.enter();
        *self.last_error.lock() = None;
        match variant.to_str() {
            Ok("not-a-real-variant") => self.fail(Some("bad variant")),
            Ok("silent-failure") => self.fail(None),
            Ok(_) => {
                self.counters.model_loads.fetch_add(1, Ordering::SeqCst);
                self.track(FakeModel {
                    sample_rate: SAMPLE_RATE,
                })
                .cast()
            }
            Err(_) => self.fail(Some("variant is not UTF-8")),
        }
    }

    fn model_load_from_dir(&self, variant: &CStr, model_dir: &CStr) -> *mut pocket_tts_model_t {
        if model_dir.to_bytes().is_empty() {
            self.enter();
            return self.fail(Some("model directory not found"));
        }
        self.model_load(variant)
    }

    fn model_load_with_params(
        &self,
        variant: &CStr,
        _temperature: f32,
        _lsd_decode_steps: usize,
        _eos_threshold: f32,
    ) -> *mut pocket_tts_model_t {
        self.model_load(variant)
    }

    fn model_load_with_params_from_dir(
        &self,
        variant: &CStr,
        model_dir: &CStr,
        _temperature: f32,
        _lsd_decode_steps: usize,
        _eos_threshold: f32,
    ) -> *mut pocket_tts_model_t {
        self.model_load_from_dir(variant, model_dir)
    }

    unsafe fn model_free(&self, model: *mut pocket_tts_model_t) {
        self.enter();
        self.counters.model_frees.fetch_add(1, Ordering::SeqCst);
        drop(unsafe { self.untrack(model.cast::<FakeModel>()) });
    }

    unsafe fn model_sample_rate(&self, model: *const pocket_tts_model_t) -> u32 {
        self.enter();
        unsafe { (*(model as *const FakeModel)).sample_rate }
    }

    fn voice_state_default(&self) -> *mut pocket_tts_voice_state_t {
        self.enter();
        self.counters.voice_creates.fetch_add(1, Ordering::SeqCst);
        self.track(FakeVoice { gain: 1.0 }).cast()
    }

    unsafe fn voice_state_from_path(
        &self,
        _model: *const pocket_tts_model_t,
        path: &CStr,
    ) -> *mut pocket_tts_voice_state_t {
        self.enter();
        *self.last_error.lock() = None;
        let path = path.to_string_lossy();
        if !(path.ends_with(".wav") || path.ends_with(".safetensors")) {
            return self.fail(Some("unsupported voice file"));
        }
        self.counters.voice_creates.fetch_add(1, Ordering::SeqCst);
        self.track(FakeVoice { gain: 0.5 }).cast()
    }

    unsafe fn voice_state_from_audio_bytes(
        &self,
        _model: *const pocket_tts_model_t,
        bytes: &[u8],
    ) -> *mut pocket_tts_voice_state_t {
        self.enter();
        self.counters.byte_voice_calls.fetch_add(1, Ordering::SeqCst);
        assert!(!bytes.is_empty(), "empty audio bytes reached the engine");
        if !bytes.starts_with(b"RIFF") {
            return self.fail(Some("malformed reference audio"));
        }
        self.counters.voice_creates.fetch_add(1, Ordering::SeqCst);
        self.track(FakeVoice { gain: 0.25 }).cast()
    }

    unsafe fn voice_state_from_prompt_bytes(
        &self,
        _model: *const pocket_tts_model_t,
        bytes: &[u8],
    ) -> *mut pocket_tts_voice_state_t {
        self.enter();
        self.counters.byte_voice_calls.fetch_add(1, Ordering::SeqCst);
        assert!(!bytes.is_empty(), "empty prompt bytes reached the engine");
        self.counters.voice_creates.fetch_add(1, Ordering::SeqCst);
        self.track(FakeVoice { gain: 0.75 }).cast()
    }

    unsafe fn voice_state_free(&self, state: *mut pocket_tts_voice_state_t) {
        self.enter();
        self.counters.voice_frees.fetch_add(1, Ordering::SeqCst);
        drop(unsafe { self.untrack(state.cast::<FakeVoice>()) });
    }

    unsafe fn generate(
        &self,
        _model: *const pocket_tts_model_t,
        text: &CStr,
        voice_state: *const pocket_tts_voice_state_t,
        out_ptr: &mut *mut f32,
        out_len: &mut usize,
    ) -> c_int {
        self.enter();
        self.counters.generate_calls.fetch_add(1, Ordering::SeqCst);
        let text = text.to_string_lossy();
        if text.contains(FAIL_WORD) {
            self.set_error("synthesis failed");
            return -1;
        }
        let gain = Self::voice_gain(voice_state);
        let samples = if self.empty_output.load(Ordering::SeqCst) {
            Vec::new()
        } else {
            segments(&text, false).iter().flat_map(|s| synth(s, gain)).collect()
        };
        self.emit(samples, out_ptr, out_len);
        0
    }

    unsafe fn generate_with_pauses(
        &self,
        _model: *const pocket_tts_model_t,
        text: &CStr,
        voice_state: *const pocket_tts_voice_state_t,
        out_ptr: &mut *mut f32,
        out_len: &mut usize,
    ) -> c_int {
        self.enter();
        self.counters.generate_calls.fetch_add(1, Ordering::SeqCst);
        let text = text.to_string_lossy();
        if text.contains(FAIL_WORD) {
            // No message recorded: exercises the unknown-error fallback.
            return -1;
        }
        let gain = Self::voice_gain(voice_state);
        let mut samples = Vec::new();
        for (i, sentence) in segments(&text, true).iter().enumerate() {
            if i > 0 {
                samples.extend(std::iter::repeat_n(0.0, PAUSE_SAMPLES));
            }
            samples.extend(synth(sentence, gain));
        }
        self.emit(samples, out_ptr, out_len);
        0
    }

    unsafe fn stream_new(
        &self,
        _model: *const pocket_tts_model_t,
        text: &CStr,
        voice_state: *const pocket_tts_voice_state_t,
        long_text: c_int,
    ) -> *mut pocket_tts_stream_t {
        self.enter();
        *self.last_error.lock() = None;
        let text = text.to_string_lossy();
        if text.trim().is_empty() {
            return self.fail(Some("text is empty"));
        }
        self.counters.stream_creates.fetch_add(1, Ordering::SeqCst);
        self.track(FakeStream {
            segments: segments(&text, long_text != 0).into(),
            gain: Self::voice_gain(voice_state),
        })
        .cast()
    }

    unsafe fn stream_next(
        &self,
        stream: *mut pocket_tts_stream_t,
        out_ptr: &mut *mut f32,
        out_len: &mut usize,
    ) -> c_int {
        self.enter();
        self.counters.stream_polls.fetch_add(1, Ordering::SeqCst);
        *self.last_error.lock() = None;
        assert!(
            self.live.lock().contains(&(stream as usize)),
            "poll on a freed stream"
        );
        let stream = unsafe { &mut *(stream.cast::<FakeStream>()) };
        match stream.segments.pop_front() {
            None => 0,
            Some(segment) if segment.contains(FAIL_WORD) => {
                self.set_error("decoder failed on segment");
                -1
            }
            Some(segment) => {
                self.emit(synth(&segment, stream.gain), out_ptr, out_len);
                1
            }
        }
    }

    unsafe fn stream_free(&self, stream: *mut pocket_tts_stream_t) {
        self.enter();
        self.counters.stream_frees.fetch_add(1, Ordering::SeqCst);
        drop(unsafe { self.untrack(stream.cast::<FakeStream>()) });
    }

    unsafe fn audio_free(&self, ptr: *mut f32, len: usize) {
        self.enter();
        assert!(
            self.live_buffers.lock().remove(&(ptr as usize)),
            "free of unknown or already freed audio buffer {ptr:p}"
        );
        self.counters.audio_frees.fetch_add(1, Ordering::SeqCst);
        drop(unsafe { Box::from_raw(std::ptr::slice_from_raw_parts_mut(ptr, len)) });
    }
}

/// A fresh fake engine and an [`Engine`] wrapping it.
pub fn engine() -> (Arc<FakeEngine>, Engine) {
    let fake = FakeEngine::new();
    let engine = Engine::from_api(fake.clone());
    (fake, engine)
}

/// A fake engine with one loaded model.
pub fn loaded() -> (Arc<FakeEngine>, Engine, Model) {
    let (fake, engine) = engine();
    let model = Model::load(&engine, "b6369a24").expect("fake model loads");
    (fake, engine, model)
}
