//! Dedicated synthesis thread.
//!
//! Moves a [`Model`] (and optionally a [`VoiceState`]) onto its own thread so
//! every native call for them happens on that one thread. Callers talk to it
//! over channels, which lets blocking synthesis compose with code that must
//! not block.

use std::thread;

use crossbeam_channel::{Receiver, Sender, bounded, select, unbounded};

use crate::error::{PocketError, Result};
use crate::model::Model;
use crate::voice::VoiceState;

/// Chunks in flight between the worker and a stream receiver.
const CHUNK_CHANNEL_CAPACITY: usize = 1;

/// Receiving end of a worker stream: chunks in order, then at most one error.
pub type ChunkReceiver = Receiver<Result<Vec<f32>>>;

enum WorkerRequest {
    Generate {
        text: String,
        pauses: bool,
        reply: Sender<Result<Vec<f32>>>,
    },
    Stream {
        text: String,
        long_text: bool,
        chunks: Sender<Result<Vec<f32>>>,
    },
}

/// Owns the thread that drives one model.
///
/// Dropping the worker stops it even while a stream receiver is still held:
/// the stream in flight is released and its receiver disconnects after the
/// chunks already queued.
pub struct SynthesisWorker {
    request_tx: Option<Sender<WorkerRequest>>,
    // Never sent on; dropping it signals shutdown.
    shutdown_tx: Option<Sender<()>>,
    thread: Option<thread::JoinHandle<()>>,
    sample_rate: u32,
}

impl SynthesisWorker {
    /// Spawn the worker thread and hand it the model and voice.
    pub fn spawn(model: Model, voice: Option<VoiceState>) -> Result<Self> {
        let sample_rate = model.sample_rate()?;
        let (request_tx, request_rx) = unbounded();
        let (shutdown_tx, shutdown_rx) = bounded(0);

        let thread = thread::Builder::new()
            .name("pocket-tts-worker".to_string())
            .spawn(move || run(model, voice, request_rx, shutdown_rx))
            .map_err(|e| PocketError::Worker(format!("failed to spawn worker thread: {e}")))?;

        Ok(Self {
            request_tx: Some(request_tx),
            shutdown_tx: Some(shutdown_tx),
            thread: Some(thread),
            sample_rate,
        })
    }

    /// Output sample rate of the worker's model
    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// One-shot synthesis on the worker thread; blocks until it finishes.
    pub fn generate(&self, text: &str) -> Result<Vec<f32>> {
        self.generate_inner(text, false)
    }

    /// One-shot synthesis with pauses on the worker thread; blocks until it finishes.
    pub fn generate_with_pauses(&self, text: &str) -> Result<Vec<f32>> {
        self.generate_inner(text, true)
    }

    fn generate_inner(&self, text: &str, pauses: bool) -> Result<Vec<f32>> {
        let (reply, response) = bounded(1);
        self.send(WorkerRequest::Generate {
            text: text.to_string(),
            pauses,
            reply,
        })?;
        response
            .recv()
            .map_err(|_| PocketError::Worker("worker stopped before replying".to_string()))?
    }

    /// Start streaming `text`; chunks arrive on the returned receiver.
    ///
    /// Dropping the receiver abandons the rest of the stream.
    pub fn stream(&self, text: &str, long_text: bool) -> Result<ChunkReceiver> {
        let (chunks, receiver) = bounded(CHUNK_CHANNEL_CAPACITY);
        self.send(WorkerRequest::Stream {
            text: text.to_string(),
            long_text,
            chunks,
        })?;
        Ok(receiver)
    }

    fn send(&self, request: WorkerRequest) -> Result<()> {
        self.request_tx
            .as_ref()
            .ok_or_else(|| PocketError::Worker("worker is shut down".to_string()))?
            .send(request)
            .map_err(|_| PocketError::Worker("worker thread has exited".to_string()))
    }
}

impl Drop for SynthesisWorker {
    fn drop(&mut self) {
        // Shutdown interrupts a blocked chunk send; closing requests ends the loop.
        self.shutdown_tx.take();
        self.request_tx.take();
        if let Some(handle) = self.thread.take() {
            if handle.join().is_err() {
                tracing::error!("pocket-tts worker thread panicked");
            }
        }
    }
}

fn run(
    model: Model,
    voice: Option<VoiceState>,
    requests: Receiver<WorkerRequest>,
    shutdown: Receiver<()>,
) {
    tracing::debug!(variant = %model.variant(), "pocket-tts worker started");

    loop {
        let request = select! {
            recv(requests) -> request => match request {
                Ok(request) => request,
                Err(_) => break,
            },
            recv(shutdown) -> _ => break,
        };
        match request {
            WorkerRequest::Generate { text, pauses, reply } => {
                let result = if pauses {
                    model.generate_with_pauses(&text, voice.as_ref())
                } else {
                    model.generate(&text, voice.as_ref())
                };
                // Caller may have given up waiting.
                let _ = reply.send(result);
            }
            WorkerRequest::Stream {
                text,
                long_text,
                chunks,
            } => stream_to(&model, voice.as_ref(), &text, long_text, &chunks, &shutdown),
        }
    }

    // Stream handles never outlive this loop; voice goes before the model.
    drop(voice);
    drop(model);
    tracing::debug!("pocket-tts worker stopped");
}

fn stream_to(
    model: &Model,
    voice: Option<&VoiceState>,
    text: &str,
    long_text: bool,
    chunks: &Sender<Result<Vec<f32>>>,
    shutdown: &Receiver<()>,
) {
    let mut stream = match model.stream_with(text, voice, long_text) {
        Ok(stream) => stream,
        Err(err) => {
            deliver(chunks, shutdown, Err(err));
            return;
        }
    };

    loop {
        match stream.next_chunk() {
            Ok(Some(chunk)) => {
                if !deliver(chunks, shutdown, Ok(chunk)) {
                    tracing::debug!(
                        chunks = stream.chunks_received(),
                        "stream abandoned before end of output"
                    );
                    break;
                }
            }
            Ok(None) => break,
            Err(err) => {
                deliver(chunks, shutdown, Err(err));
                break;
            }
        }
    }
    stream.release();
}

/// Send one item unless the receiver is gone or the worker is shutting down.
fn deliver(
    chunks: &Sender<Result<Vec<f32>>>,
    shutdown: &Receiver<()>,
    item: Result<Vec<f32>>,
) -> bool {
    select! {
        send(chunks, item) -> sent => sent.is_ok(),
        recv(shutdown) -> _ => false,
    }
}
