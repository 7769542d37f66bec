use std::io::Write;

use serial_test::serial;

use super::*;

const BATCH_SIZE_ENV: &str = "TUTOR_RENDER__RENDER__DEFAULT_BATCH_SIZE";

#[test]
fn defaults_follow_documented_values() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

    assert_eq!(settings.render.default_batch_size.get(), 5);
    assert_eq!(settings.render.priority_pause, Duration::from_millis(10));
    assert_eq!(settings.render.batch_pause, Duration::from_millis(30));
    assert_eq!(settings.render.ready_timeout, Duration::from_secs(10));
    assert_eq!(settings.engine, EngineSettings::default());
    assert_eq!(settings.cache.content_cache_limit.get(), 1024);
    assert!(matches!(settings.logging.format, LogFormat::Compact));
}

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = RawSettings::default();
    raw.render.default_batch_size = Some(7);
    raw.logging.level = Some("info".to_string());

    raw.apply_render_overrides(&RenderOverrides {
        batch_size: Some(3),
        ..Default::default()
    });
    raw.apply_logging_overrides(&LoggingOverrides {
        log_level: Some("debug".to_string()),
        log_json: Some(true),
    });
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.render.default_batch_size.get(), 3);
    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
    assert!(matches!(settings.logging.format, LogFormat::Json));
}

#[test]
#[serial]
fn config_file_is_layered_under_cli() {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("temp file");
    writeln!(
        file,
        "[render]\ndefault_batch_size = 6\n\n[engine]\nfont_cache = \"local\"\n\n[cache]\ncontent_cache_limit = 64"
    )
    .expect("write config");

    let path = file.path().to_string_lossy().into_owned();
    let args = CliArgs::parse_from([
        "tutor-render",
        "--config-file",
        path.as_str(),
        "render",
        "fixture.json",
        "--cache-content-limit",
        "32",
    ]);

    let settings = load(&args).expect("settings load");

    assert_eq!(settings.render.default_batch_size.get(), 6);
    assert_eq!(settings.engine.font_cache, FontCache::Local);
    assert_eq!(settings.cache.content_cache_limit.get(), 32);
}

#[test]
#[serial]
fn environment_overrides_config_file() {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("temp file");
    writeln!(file, "[render]\ndefault_batch_size = 6").expect("write config");

    let path = file.path().to_string_lossy().into_owned();
    let args = CliArgs::parse_from([
        "tutor-render",
        "--config-file",
        path.as_str(),
        "classify",
        "x",
    ]);

    // SAFETY: serialized with every other test that reads the environment.
    unsafe { std::env::set_var(BATCH_SIZE_ENV, "9") };
    let loaded = load(&args);
    unsafe { std::env::remove_var(BATCH_SIZE_ENV) };

    assert_eq!(loaded.expect("settings load").render.default_batch_size.get(), 9);
}

#[test]
fn min_scale_must_not_exceed_scale() {
    let mut raw = RawSettings::default();
    raw.engine.scale = Some(0.8);
    raw.engine.min_scale = Some(0.9);

    let err = Settings::from_raw(raw).expect_err("min scale above scale");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "engine.min_scale",
            ..
        }
    ));
}

#[test]
fn zero_values_are_rejected() {
    let mut raw = RawSettings::default();
    raw.render.poll_interval_ms = Some(0);
    assert!(Settings::from_raw(raw).is_err());

    let mut raw = RawSettings::default();
    raw.cache.content_cache_limit = Some(0);
    let err = Settings::from_raw(raw).expect_err("zero cache limit");
    assert_eq!(
        err.to_string(),
        "invalid configuration for `cache.content_cache_limit`: must be greater than zero"
    );
}

#[test]
fn unknown_font_cache_mode_is_rejected() {
    let mut raw = RawSettings::default();
    raw.engine.font_cache = Some("disk".to_string());
    assert!(matches!(
        Settings::from_raw(raw),
        Err(LoadError::Invalid {
            key: "engine.font_cache",
            ..
        })
    ));
    assert_eq!(FontCache::from_str(" None "), Ok(FontCache::None));
}

#[test]
fn parse_classify_arguments() {
    let args = CliArgs::parse_from([
        "tutor-render",
        "classify",
        "Sonuç $x=5$",
        "--log-json",
        "yes",
    ]);

    match args.command {
        Command::Classify(classify) => assert_eq!(classify.text, "Sonuç $x=5$"),
        other => panic!("unexpected command: {other:?}"),
    }
    assert_eq!(args.logging.log_json, Some(true));
}
