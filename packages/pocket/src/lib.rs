//! # Fluent Voice Pocket
//!
//! Safe resource and streaming layer over the pocket-tts native speech
//! synthesis engine.
//!
//! The engine is only reachable through an opaque C ABI: it hands out raw
//! model, voice-state and stream handles, reports failures through null
//! pointers or status codes, and keeps the human readable reason in a single
//! "last error" slot. This crate turns that surface into owned Rust values:
//!
//! - [`Engine`] owns the native function table and serializes every call.
//! - [`Model`], [`VoiceState`] and [`Stream`] each own exactly one native
//!   handle, release it exactly once and fail fast once released.
//! - [`Stream`] is a forward-only iterator of audio chunks.
//! - [`SynthesisWorker`] confines a model to a dedicated thread for callers
//!   that need channel based composition.
//!
//! ```no_run
//! use fluent_voice_pocket::{Engine, Model, VoiceState};
//!
//! # fn main() -> fluent_voice_pocket::Result<()> {
//! let engine = Engine::open_default()?;
//! let model = Model::load(&engine, "b6369a24")?;
//! let voice = VoiceState::from_path(&model, "assets/ref.wav")?;
//!
//! let mut samples = Vec::new();
//! for chunk in model.stream("Hello from Rust.", Some(&voice))? {
//!     samples.extend(chunk?);
//! }
//! println!("generated {} samples at {} Hz", samples.len(), model.sample_rate()?);
//! # Ok(())
//! # }
//! ```

mod buffer;
pub mod config;
pub mod engine;
pub mod error;
mod handle;
pub mod library;
pub mod model;
pub mod stream;
pub mod sys;
pub mod voice;
pub mod worker;

pub use self::config::{GenerationParams, PocketConfig};
pub use self::engine::Engine;
pub use self::error::{EngineMessage, PocketError, Result};
pub use self::handle::ResourceKind;
pub use self::library::DynamicLibrary;
pub use self::model::Model;
pub use self::stream::{Stream, StreamState};
pub use self::sys::NativeApi;
pub use self::voice::VoiceState;
pub use self::worker::{ChunkReceiver, SynthesisWorker};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
