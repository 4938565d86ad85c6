//! Error types for the pocket-tts binding layer

use std::fmt;

use thiserror::Error;

use crate::handle::ResourceKind;

/// Message substituted when the engine signals failure but left its error slot empty.
pub const UNKNOWN_ENGINE_ERROR: &str = "unknown engine error";

/// Human readable reason attached to an engine-level failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineMessage {
    /// Reason recovered from the error channel, or detected locally before the call.
    Message(String),
    /// The engine returned its failure sentinel without recording a reason.
    Unknown,
}

impl EngineMessage {
    /// Get the message text, substituting the generic fallback for [`EngineMessage::Unknown`]
    pub fn as_str(&self) -> &str {
        match self {
            EngineMessage::Message(msg) => msg,
            EngineMessage::Unknown => UNKNOWN_ENGINE_ERROR,
        }
    }

    /// Check whether this is the unknown-error fallback
    pub fn is_unknown(&self) -> bool {
        matches!(self, EngineMessage::Unknown)
    }
}

impl fmt::Display for EngineMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for EngineMessage {
    fn from(msg: &str) -> Self {
        EngineMessage::Message(msg.to_string())
    }
}

impl From<String> for EngineMessage {
    fn from(msg: String) -> Self {
        EngineMessage::Message(msg)
    }
}

/// Main error type for pocket-tts operations
#[derive(Debug, Error)]
pub enum PocketError {
    /// Model construction failed
    #[error("model load failed: {0}")]
    Load(EngineMessage),
    /// Voice state derivation failed
    #[error("voice state derivation failed: {0}")]
    Voice(EngineMessage),
    /// One-shot synthesis failed
    #[error("generation failed: {0}")]
    Generation(EngineMessage),
    /// Stream creation or a stream poll failed
    #[error("stream failed: {0}")]
    Stream(EngineMessage),
    /// Operation attempted on a released or never constructed resource
    #[error("{0} is not live")]
    ResourceNotLive(ResourceKind),
    /// Voice state handed to a model owned by another engine instance
    #[error("voice state belongs to a different engine instance")]
    ForeignVoice,
    /// The native shared library could not be opened
    #[error("failed to open native library `{path}`: {source}")]
    Library {
        path: String,
        #[source]
        source: libloading::Error,
    },
    /// The native shared library does not export a required symbol
    #[error("native library `{path}` is missing symbol `{symbol}`: {source}")]
    MissingSymbol {
        path: String,
        symbol: &'static str,
        #[source]
        source: libloading::Error,
    },
    /// Configuration errors
    #[error("configuration: {0}")]
    Configuration(String),
    /// The synthesis worker thread is gone or could not be started
    #[error("synthesis worker: {0}")]
    Worker(String),
}

impl PocketError {
    /// Get the engine message carried by the engine-level variants
    pub fn engine_message(&self) -> Option<&EngineMessage> {
        match self {
            PocketError::Load(msg)
            | PocketError::Voice(msg)
            | PocketError::Generation(msg)
            | PocketError::Stream(msg) => Some(msg),
            _ => None,
        }
    }

    /// Check whether the engine failed without recording a reason
    pub fn is_unknown_engine_error(&self) -> bool {
        self.engine_message().is_some_and(EngineMessage::is_unknown)
    }

    /// Check whether this is a use-after-release error
    pub fn is_resource_not_live(&self) -> bool {
        matches!(self, PocketError::ResourceNotLive(_))
    }
}

/// Result type alias for pocket-tts operations
pub type Result<T> = std::result::Result<T, PocketError>;
