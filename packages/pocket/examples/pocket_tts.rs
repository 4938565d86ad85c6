//! Stream text through pocket-tts and write the result to a WAV file.
//!
//! ```sh
//! cargo run -p fluent-voice-pocket --example pocket_tts -- \
//!     --voice assets/ref.wav --output hello.wav "Hello from Rust."
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use fluent_voice_pocket::config::{
    DEFAULT_VARIANT, ENV_HF_TOKEN, ENV_LIBRARY, ENV_MODEL_DIR, ENV_VARIANT, ENV_VOICE_PATH,
};
use fluent_voice_pocket::{GenerationParams, PocketConfig};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Synthesize speech with the pocket-tts engine", long_about = None)]
struct Args {
    /// Text to synthesize
    text: String,

    /// Path of the pocket-tts shared library
    #[arg(long, env = ENV_LIBRARY)]
    library: Option<PathBuf>,

    /// Model variant to load
    #[arg(long, env = ENV_VARIANT, default_value = DEFAULT_VARIANT)]
    variant: String,

    /// Local model directory
    #[arg(long, env = ENV_MODEL_DIR)]
    model_dir: Option<PathBuf>,

    /// Reference voice file (.wav or .safetensors prompt)
    #[arg(long, env = ENV_VOICE_PATH)]
    voice: Option<PathBuf>,

    /// Sampling temperature; requires --lsd-decode-steps and --eos-threshold
    #[arg(long, requires_all = ["lsd_decode_steps", "eos_threshold"])]
    temperature: Option<f32>,

    #[arg(long, requires = "temperature")]
    lsd_decode_steps: Option<usize>,

    #[arg(long, requires = "temperature", allow_hyphen_values = true)]
    eos_threshold: Option<f32>,

    /// Use sentence-level segmentation for long input
    #[arg(long)]
    long_text: bool,

    /// Output WAV file
    #[arg(short, long, default_value = "output.wav")]
    output: PathBuf,
}

impl Args {
    fn config(&self) -> PocketConfig {
        let params = match (self.temperature, self.lsd_decode_steps, self.eos_threshold) {
            (Some(t), Some(steps), Some(eos)) => Some(GenerationParams::new(t, steps, eos)),
            _ => None,
        };
        PocketConfig {
            library_path: self.library.clone(),
            variant: self.variant.clone(),
            model_dir: self.model_dir.clone(),
            params,
            voice_path: self.voice.clone(),
        }
    }
}

fn run(args: Args) -> Result<()> {
    if std::env::var_os(ENV_HF_TOKEN).is_none() {
        tracing::warn!("{ENV_HF_TOKEN} is not set; model download may fail for gated weights");
    }

    let config = args.config();
    let engine = config.open_engine().context("opening pocket-tts library")?;
    let model = config.load_model(&engine).context("loading model")?;
    let voice = config.load_voice(&model).context("deriving voice state")?;
    let sample_rate = model.sample_rate()?;

    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::create(&args.output, spec)
        .with_context(|| format!("creating {}", args.output.display()))?;

    let mut samples = 0usize;
    for chunk in model.stream_with(&args.text, Some(&voice), args.long_text)? {
        let chunk = chunk?;
        for &sample in &chunk {
            writer.write_sample(sample)?;
        }
        samples += chunk.len();
    }
    writer.finalize()?;

    println!("generated {samples} samples at {sample_rate} Hz");
    tracing::info!(output = %args.output.display(), "wrote audio");
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}
