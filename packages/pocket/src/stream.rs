//! Incremental generation over `stream_new` / `stream_next`.
//!
//! A [`Stream`] turns the engine's polling interface into a finite,
//! forward-only sequence of chunks:
//!
//! | state       | native status | new state   | returns                     |
//! |-------------|---------------|-------------|-----------------------------|
//! | `Live`      | `1`           | `Live`      | `Ok(Some(chunk))`           |
//! | `Live`      | `0`           | `Exhausted` | `Ok(None)`                  |
//! | `Live`      | `< 0`         | `Failed`    | `Err(PocketError::Stream)`  |
//! | `Exhausted` | not called    | `Exhausted` | `Ok(None)`                  |
//! | `Failed`    | not called    | `Failed`    | `Err(PocketError::Stream)`  |
//! | `Released`  | not called    | `Released`  | `Err(ResourceNotLive)`      |
//!
//! Chunks are returned in exactly the order the engine produces them; nothing
//! is buffered ahead.

use std::os::raw::c_int;
use std::ptr;

use crate::buffer::NativeBuffer;
use crate::engine::c_string;
use crate::error::{PocketError, Result};
use crate::handle::{NativeHandle, ResourceKind};
use crate::model::Model;
use crate::sys::{STREAM_END, pocket_tts_stream_t};
use crate::voice::VoiceState;

/// Message returned by polls on a stream that already failed.
const STREAM_ALREADY_FAILED: &str = "stream already failed; create a new stream to retry";

/// Observable state of a [`Stream`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// More chunks may follow.
    Live,
    /// End of stream was observed.
    Exhausted,
    /// A poll failed; the stream will not produce further chunks.
    Failed,
    /// The native stream was released.
    Released,
}

/// An in-progress generation session for one (model, voice, text) combination.
///
/// Borrows its [`Model`] and [`VoiceState`], so neither can be released
/// while the stream exists. Dropping or releasing the stream between polls
/// abandons the remaining output.
#[derive(Debug)]
pub struct Stream<'a> {
    model: &'a Model,
    voice: Option<&'a VoiceState>,
    handle: NativeHandle<pocket_tts_stream_t>,
    state: StreamState,
    text: String,
    long_text: bool,
    chunks_received: usize,
}

impl<'a> Stream<'a> {
    pub(crate) fn new(
        model: &'a Model,
        text: &str,
        voice: Option<&'a VoiceState>,
        long_text: bool,
    ) -> Result<Self> {
        let model_ptr = model.live_ptr()?;
        let voice_ptr = model.voice_ptr(voice)?;
        let c_text = c_string(text, "text").map_err(PocketError::Stream)?;

        let created = model.engine().call(|api, errors| {
            // SAFETY: model and voice handles are live and, through the borrows
            // held by the returned stream, outlive it.
            let raw = unsafe {
                api.stream_new(model_ptr.as_ptr(), &c_text, voice_ptr, c_int::from(long_text))
            };
            NativeHandle::from_raw(raw, ResourceKind::Stream)
                .ok_or_else(|| PocketError::Stream(errors.take()))
        });

        match created {
            Ok(handle) => {
                tracing::debug!(chars = text.len(), long_text, "created stream");
                Ok(Self {
                    model,
                    voice,
                    handle,
                    state: StreamState::Live,
                    text: text.to_string(),
                    long_text,
                    chunks_received: 0,
                })
            }
            Err(err) => {
                tracing::warn!(error = %err, "stream creation failed");
                Err(err)
            }
        }
    }

    /// Poll the next chunk: `Ok(Some(samples))`, `Ok(None)` at end of stream, or an error.
    ///
    /// Blocks for the time the engine needs to synthesize the chunk.
    pub fn next_chunk(&mut self) -> Result<Option<Vec<f32>>> {
        let stream = self.handle.live()?;
        match self.state {
            StreamState::Live => {}
            StreamState::Exhausted => return Ok(None),
            StreamState::Failed => return Err(PocketError::Stream(STREAM_ALREADY_FAILED.into())),
            StreamState::Released => return Err(PocketError::ResourceNotLive(ResourceKind::Stream)),
        }

        let polled = self.model.engine().call(|api, errors| {
            let mut out_ptr: *mut f32 = ptr::null_mut();
            let mut out_len: usize = 0;
            // SAFETY: the stream handle is live.
            let status = unsafe { api.stream_next(stream.as_ptr(), &mut out_ptr, &mut out_len) };
            // SAFETY: whatever the engine wrote to the out parameters is ours now.
            let buffer = unsafe { NativeBuffer::from_raw(api, out_ptr, out_len) };
            match status {
                s if s > STREAM_END => Ok(Some(buffer.to_vec())),
                STREAM_END => Ok(None),
                _ => Err(PocketError::Stream(errors.take())),
            }
        });

        match polled {
            Ok(Some(chunk)) => {
                self.chunks_received += 1;
                tracing::trace!(index = self.chunks_received, samples = chunk.len(), "stream chunk");
                Ok(Some(chunk))
            }
            Ok(None) => {
                self.state = StreamState::Exhausted;
                tracing::debug!(chunks = self.chunks_received, "stream exhausted");
                Ok(None)
            }
            Err(err) => {
                self.state = StreamState::Failed;
                tracing::warn!(chunks = self.chunks_received, error = %err, "stream poll failed");
                Err(err)
            }
        }
    }

    /// Poll to the end and concatenate every chunk.
    pub fn collect_samples(&mut self) -> Result<Vec<f32>> {
        let mut samples = Vec::new();
        while let Some(chunk) = self.next_chunk()? {
            samples.extend_from_slice(&chunk);
        }
        Ok(samples)
    }

    #[inline]
    pub fn state(&self) -> StreamState {
        self.state
    }

    /// Text the stream was created with
    #[inline]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[inline]
    pub fn is_long_text(&self) -> bool {
        self.long_text
    }

    /// Whether the stream was created with an explicit voice state
    #[inline]
    pub fn has_voice(&self) -> bool {
        self.voice.is_some()
    }

    /// Number of chunks returned so far
    #[inline]
    pub fn chunks_received(&self) -> usize {
        self.chunks_received
    }

    #[inline]
    pub fn model(&self) -> &'a Model {
        self.model
    }

    /// Release the native stream. Idempotent, and safe between polls.
    pub fn release(&mut self) {
        if let Some(ptr) = self.handle.take() {
            // SAFETY: the pointer was live and `take` guarantees this is the only release.
            self.model.engine().call(|api, _| unsafe { api.stream_free(ptr.as_ptr()) });
            tracing::debug!(
                chunks = self.chunks_received,
                finished = self.state == StreamState::Exhausted,
                "released stream"
            );
        }
        self.state = StreamState::Released;
    }
}

impl Iterator for Stream<'_> {
    type Item = Result<Vec<f32>>;

    /// Yields chunks, at most one error, and then ends. A released stream yields nothing.
    fn next(&mut self) -> Option<Self::Item> {
        match self.state {
            StreamState::Live => self.next_chunk().transpose(),
            StreamState::Exhausted | StreamState::Failed | StreamState::Released => None,
        }
    }
}

impl Drop for Stream<'_> {
    fn drop(&mut self) {
        self.release();
    }
}
