//! Configuration for loading the engine, a model and a reference voice.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::engine::Engine;
use crate::error::{PocketError, Result};
use crate::model::Model;
use crate::voice::VoiceState;

/// Model variant used when none is configured.
pub const DEFAULT_VARIANT: &str = "b6369a24";

pub const ENV_LIBRARY: &str = "POCKET_TTS_LIBRARY";
pub const ENV_VARIANT: &str = "POCKET_TTS_VARIANT";
pub const ENV_MODEL_DIR: &str = "POCKET_TTS_MODEL_DIR";
pub const ENV_VOICE_PATH: &str = "POCKET_TTS_VOICE_PATH";
pub const ENV_TEMPERATURE: &str = "POCKET_TTS_TEMPERATURE";
pub const ENV_LSD_DECODE_STEPS: &str = "POCKET_TTS_LSD_DECODE_STEPS";
pub const ENV_EOS_THRESHOLD: &str = "POCKET_TTS_EOS_THRESHOLD";
/// Access token for gated model downloads, consumed by the engine itself.
pub const ENV_HF_TOKEN: &str = "HF_TOKEN";

/// Decoding parameters fixed when a model is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    /// Sampling temperature
    pub temperature: f32,
    /// Number of LSD decode steps per generated frame
    pub lsd_decode_steps: usize,
    /// End-of-speech logit threshold
    pub eos_threshold: f32,
}

impl GenerationParams {
    pub fn new(temperature: f32, lsd_decode_steps: usize, eos_threshold: f32) -> Self {
        Self {
            temperature,
            lsd_decode_steps,
            eos_threshold,
        }
    }

    /// Reject non-finite values
    pub fn validate(&self) -> Result<()> {
        match self.invalid_reason() {
            Some(reason) => Err(PocketError::Configuration(reason)),
            None => Ok(()),
        }
    }

    /// Ranges are checked by the engine.
    pub(crate) fn invalid_reason(&self) -> Option<String> {
        if !self.temperature.is_finite() {
            return Some(format!("temperature must be finite, got {}", self.temperature));
        }
        if !self.eos_threshold.is_finite() {
            return Some(format!("eos_threshold must be finite, got {}", self.eos_threshold));
        }
        None
    }
}

/// Where to find the engine, which model to load and which voice to use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PocketConfig {
    /// Explicit path of the engine's shared library; the loader search path is used otherwise
    pub library_path: Option<PathBuf>,
    /// Packaged model variant
    pub variant: String,
    /// Local model directory, instead of the engine's own download cache
    pub model_dir: Option<PathBuf>,
    /// Decoding parameters; engine defaults when absent
    pub params: Option<GenerationParams>,
    /// Reference voice file; the built-in voice when absent
    pub voice_path: Option<PathBuf>,
}

impl Default for PocketConfig {
    fn default() -> Self {
        Self {
            library_path: None,
            variant: DEFAULT_VARIANT.to_string(),
            model_dir: None,
            params: None,
            voice_path: None,
        }
    }
}

impl PocketConfig {
    /// Read the configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable lookup.
    ///
    /// Empty values count as unset. The three decoding parameters must be
    /// given together or not at all.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if get(ENV_HF_TOKEN).is_none() {
            tracing::warn!("{ENV_HF_TOKEN} is not set; model download may fail for gated weights");
        }

        let params = match (
            get(ENV_TEMPERATURE),
            get(ENV_LSD_DECODE_STEPS),
            get(ENV_EOS_THRESHOLD),
        ) {
            (None, None, None) => None,
            (Some(temperature), Some(steps), Some(eos)) => {
                let params = GenerationParams::new(
                    parse_var(ENV_TEMPERATURE, &temperature)?,
                    parse_var(ENV_LSD_DECODE_STEPS, &steps)?,
                    parse_var(ENV_EOS_THRESHOLD, &eos)?,
                );
                params.validate()?;
                Some(params)
            }
            _ => {
                return Err(PocketError::Configuration(format!(
                    "{ENV_TEMPERATURE}, {ENV_LSD_DECODE_STEPS} and {ENV_EOS_THRESHOLD} must be set together"
                )));
            }
        };

        Ok(Self {
            library_path: get(ENV_LIBRARY).map(PathBuf::from),
            variant: get(ENV_VARIANT).unwrap_or_else(|| DEFAULT_VARIANT.to_string()),
            model_dir: get(ENV_MODEL_DIR).map(PathBuf::from),
            params,
            voice_path: get(ENV_VOICE_PATH).map(PathBuf::from),
        })
    }

    /// Open the engine library this configuration points at.
    pub fn open_engine(&self) -> Result<Engine> {
        match &self.library_path {
            Some(path) => Engine::open(path),
            None => Engine::open_default(),
        }
    }

    /// Load the configured model with whichever loader matches the configured fields.
    pub fn load_model(&self, engine: &Engine) -> Result<Model> {
        match (&self.model_dir, self.params) {
            (None, None) => Model::load(engine, &self.variant),
            (Some(dir), None) => Model::load_from_dir(engine, &self.variant, dir),
            (None, Some(params)) => Model::load_with_params(engine, &self.variant, params),
            (Some(dir), Some(params)) => {
                Model::load_with_params_from_dir(engine, &self.variant, dir, params)
            }
        }
    }

    /// Derive the configured voice, or the engine's default voice.
    pub fn load_voice(&self, model: &Model) -> Result<VoiceState> {
        match &self.voice_path {
            Some(path) => VoiceState::from_path(model, path),
            None => model.engine().default_voice(),
        }
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| PocketError::Configuration(format!("invalid {key} `{value}`: {e}")))
}
