mod common;

use common::{Counters, loaded};
use fluent_voice_pocket::{Model, PocketError, ResourceKind, StreamState, VoiceState};

#[test]
fn model_release_is_idempotent() {
    let (fake, _engine, mut model) = loaded();

    model.release();
    model.release();
    drop(model);

    assert_eq!(Counters::get(&fake.counters.model_frees), 1);
    assert_eq!(fake.live_handles(), 0);
}

#[test]
fn voice_release_is_idempotent() {
    let (fake, engine, model) = loaded();
    let mut voice = VoiceState::default_voice(&engine).expect("default voice");
    let mut from_file = model.voice_state_from_path("ref.wav").expect("voice from path");

    voice.release();
    voice.release();
    from_file.release();
    drop(from_file);
    drop(voice);

    assert_eq!(Counters::get(&fake.counters.voice_frees), 2);
}

#[test]
fn stream_release_is_idempotent() {
    let (fake, _engine, model) = loaded();
    let mut stream = model.stream("one two three", None).expect("stream");

    stream.release();
    stream.release();
    assert_eq!(stream.state(), StreamState::Released);
    drop(stream);

    assert_eq!(Counters::get(&fake.counters.stream_frees), 1);
}

#[test]
fn released_model_fails_fast_without_native_calls() {
    let (fake, _engine, mut model) = loaded();
    let voice = model.engine().default_voice().expect("default voice");
    model.release();

    let before = fake.native_calls();

    assert!(matches!(
        model.sample_rate(),
        Err(PocketError::ResourceNotLive(ResourceKind::Model))
    ));
    assert!(matches!(
        model.generate("hello", None),
        Err(PocketError::ResourceNotLive(ResourceKind::Model))
    ));
    assert!(matches!(
        model.generate_with_pauses("hello", Some(&voice)),
        Err(PocketError::ResourceNotLive(ResourceKind::Model))
    ));
    assert!(matches!(
        model.stream("hello", None),
        Err(PocketError::ResourceNotLive(ResourceKind::Model))
    ));
    assert!(matches!(
        model.voice_state_from_path("ref.wav"),
        Err(PocketError::ResourceNotLive(ResourceKind::Model))
    ));
    assert!(matches!(
        model.voice_state_from_audio_bytes(b"RIFF...."),
        Err(PocketError::ResourceNotLive(ResourceKind::Model))
    ));
    assert!(matches!(
        model.voice_state_from_prompt_bytes(b"prompt"),
        Err(PocketError::ResourceNotLive(ResourceKind::Model))
    ));
    assert!(!model.is_live());

    assert_eq!(fake.native_calls(), before);
}

#[test]
fn released_voice_is_rejected_before_reaching_the_engine() {
    let (fake, engine, model) = loaded();
    let mut voice = VoiceState::default_voice(&engine).expect("default voice");
    voice.release();

    let before = fake.native_calls();

    assert!(matches!(
        model.generate("hello", Some(&voice)),
        Err(PocketError::ResourceNotLive(ResourceKind::VoiceState))
    ));
    assert!(matches!(
        model.stream("hello", Some(&voice)),
        Err(PocketError::ResourceNotLive(ResourceKind::VoiceState))
    ));
    assert!(!voice.is_live());

    assert_eq!(fake.native_calls(), before);
}

#[test]
fn released_stream_fails_fast_without_native_calls() {
    let (fake, _engine, model) = loaded();
    let mut stream = model.stream("one two", None).expect("stream");
    stream.next_chunk().expect("first poll").expect("first chunk");
    stream.release();

    let before = fake.native_calls();

    assert!(matches!(
        stream.next_chunk(),
        Err(PocketError::ResourceNotLive(ResourceKind::Stream))
    ));
    assert!(stream.next().is_none());

    assert_eq!(fake.native_calls(), before);
}

#[test]
fn dropping_everything_frees_every_handle() {
    let (fake, engine, model) = loaded();
    {
        let voice = model.voice_state_from_prompt_bytes(b"prompt").expect("prompt voice");
        let default = VoiceState::default_voice(&engine).expect("default voice");
        let mut stream = model.stream("a b c", Some(&voice)).expect("stream");
        stream.next_chunk().expect("poll");
        let _second = model.stream("d e", Some(&default)).expect("second stream");
    }
    drop(model);

    assert_eq!(fake.live_handles(), 0);
    assert_eq!(fake.live_buffers(), 0);
    assert_eq!(Counters::get(&fake.counters.stream_frees), 2);
    assert_eq!(Counters::get(&fake.counters.voice_frees), 2);
    assert_eq!(Counters::get(&fake.counters.model_frees), 1);
}

#[test]
fn models_can_be_loaded_from_every_entry_point() -> anyhow::Result<()> {
    let (fake, engine) = common::engine();
    let params = fluent_voice_pocket::GenerationParams::new(0.7, 1, -4.0);

    let plain = Model::load(&engine, "b6369a24")?;
    let from_dir = Model::load_from_dir(&engine, "b6369a24", "/models/pocket")?;
    let with_params = Model::load_with_params(&engine, "b6369a24", params)?;
    let both = Model::load_with_params_from_dir(&engine, "b6369a24", "/models/pocket", params)?;

    assert_eq!(plain.sample_rate()?, common::SAMPLE_RATE);
    assert_eq!(from_dir.model_dir(), Some(std::path::Path::new("/models/pocket")));
    assert_eq!(with_params.params(), Some(&params));
    assert_eq!(both.variant(), "b6369a24");
    assert_eq!(Counters::get(&fake.counters.model_loads), 4);
    Ok(())
}
