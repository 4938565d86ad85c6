//! Ownership transfer of engine-allocated sample buffers.

use crate::sys::NativeApi;

/// A `(ptr, len)` sample buffer handed over by the engine.
///
/// Frees the buffer through [`NativeApi::audio_free`] exactly once when
/// dropped. Construct it right after the native call that filled the out
/// parameters, before looking at the status, so every exit path releases.
pub(crate) struct NativeBuffer<'a> {
    api: &'a dyn NativeApi,
    ptr: *mut f32,
    len: usize,
}

impl<'a> NativeBuffer<'a> {
    /// # Safety
    /// `ptr` must be null or a buffer of `len` samples produced by `api` and
    /// not yet freed. No other owner may free it.
    pub(crate) unsafe fn from_raw(api: &'a dyn NativeApi, ptr: *mut f32, len: usize) -> Self {
        Self { api, ptr, len }
    }

    /// Copy the samples into a caller-owned vector.
    pub(crate) fn to_vec(&self) -> Vec<f32> {
        if self.ptr.is_null() || self.len == 0 {
            return Vec::new();
        }
        // SAFETY: non-null and valid for `len` samples per `from_raw`.
        unsafe { std::slice::from_raw_parts(self.ptr, self.len) }.to_vec()
    }
}

impl Drop for NativeBuffer<'_> {
    fn drop(&mut self) {
        if self.ptr.is_null() {
            return;
        }
        // SAFETY: ownership was transferred to us in `from_raw` and this is the
        // only place the buffer is released.
        unsafe { self.api.audio_free(self.ptr, self.len) };
        tracing::trace!(samples = self.len, "released native audio buffer");
    }
}
