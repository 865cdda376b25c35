// tests/config_loading.rs

mod common;
use crate::common::init_tracing;

use std::error::Error;
use std::fs;
use std::path::Path;
use std::time::Duration;

use clap::Parser;

use pulse::cli::CliArgs;
use pulse::config::{Config, RawConfigFile, load_and_validate, load_optional};
use pulse::errors::PulseError;
use pulse::types::StopPolicy;

type TestResult = Result<(), Box<dyn Error>>;

fn cli(args: &[&str]) -> CliArgs {
    let mut argv = vec!["pulse"];
    argv.extend_from_slice(args);
    CliArgs::try_parse_from(argv).expect("valid arguments")
}

#[test]
fn defaults_without_config_file() -> TestResult {
    init_tracing();
    let tmp = tempfile::tempdir()?;

    let cfg = load_and_validate(&cli(&[]), tmp.path())?;

    assert_eq!(cfg.package_path, tmp.path());
    assert_eq!(cfg.watch_dirs, vec![tmp.path().to_path_buf()]);
    assert_eq!(cfg.working_dir, tmp.path());
    assert_eq!(cfg.build_tool, vec!["go", "build"]);
    assert!(cfg.use_preset);
    assert!(!cfg.only_go);
    assert_eq!(cfg.prebuild, None);
    assert_eq!(cfg.debounce, Duration::from_millis(100));
    assert_eq!(cfg.grace_period, Duration::from_secs(3));
    assert_eq!(cfg.stop_policy, StopPolicy::Immediately);
    assert_eq!(cfg.preset_excludes().len(), 6);
    Ok(())
}

#[test]
fn config_file_is_merged_under_cli_flags() -> TestResult {
    init_tracing();
    let tmp = tempfile::tempdir()?;
    fs::create_dir_all(tmp.path().join("cmd/api"))?;
    fs::create_dir_all(tmp.path().join("internal"))?;
    fs::write(
        tmp.path().join("pulse.toml"),
        r#"
exclude = ["tmp"]
watch_dirs = ["internal"]
build_args = ["-race"]
prebuild = "go generate ./..."
debounce_ms = 250
grace_period_ms = 1000
stop_policy = "after-build"
"#,
    )?;

    let args = cli(&[
        "-x", "*.log",
        "-w", "cmd",
        "--build-args", "-tags=dev",
        "--debounce", "50",
        "cmd/api",
        "--", "--port", "8080",
    ]);
    let cfg = load_and_validate(&args, tmp.path())?;

    assert_eq!(cfg.package_path, tmp.path().join("cmd/api"));
    assert_eq!(cfg.excludes, vec!["tmp", "*.log"]);
    assert_eq!(
        cfg.watch_dirs,
        vec![tmp.path().join("internal"), tmp.path().join("cmd")]
    );
    assert_eq!(cfg.build_args, vec!["-race", "-tags=dev"]);
    assert_eq!(cfg.prebuild.as_deref(), Some("go generate ./..."));
    // CLI wins for scalars.
    assert_eq!(cfg.debounce, Duration::from_millis(50));
    assert_eq!(cfg.grace_period, Duration::from_millis(1000));
    assert_eq!(cfg.stop_policy, StopPolicy::AfterBuild);
    assert_eq!(cfg.run_args, vec!["--port", "8080"]);
    Ok(())
}

#[test]
fn explicit_config_path_must_exist() -> TestResult {
    let tmp = tempfile::tempdir()?;

    let err = load_optional(Some(Path::new("missing.toml")), tmp.path()).unwrap_err();

    assert!(matches!(err, PulseError::ConfigError(_)), "got {err:?}");
    Ok(())
}

#[test]
fn unknown_config_keys_are_rejected() -> TestResult {
    let tmp = tempfile::tempdir()?;
    fs::write(tmp.path().join("pulse.toml"), "exclude = []\nwatch = [\"src\"]\n")?;

    let err = load_optional(None, tmp.path()).unwrap_err();

    assert!(matches!(err, PulseError::TomlError(_)), "got {err:?}");
    Ok(())
}

#[test]
fn missing_watch_dir_is_a_config_error() -> TestResult {
    let tmp = tempfile::tempdir()?;

    let err = load_and_validate(&cli(&["-w", "nope"]), tmp.path()).unwrap_err();

    let PulseError::ConfigError(msg) = err else {
        panic!("expected config error, got {err:?}");
    };
    assert!(msg.starts_with("stat watch path"), "{msg}");
    Ok(())
}

#[test]
fn watch_path_that_is_a_file_is_rejected() -> TestResult {
    let tmp = tempfile::tempdir()?;
    fs::write(tmp.path().join("main.go"), "package main")?;

    let err = load_and_validate(&cli(&["-w", "main.go"]), tmp.path()).unwrap_err();

    let PulseError::ConfigError(msg) = err else {
        panic!("expected config error, got {err:?}");
    };
    assert!(msg.ends_with("is not a directory"), "{msg}");
    Ok(())
}

#[test]
fn zero_durations_are_rejected() -> TestResult {
    let tmp = tempfile::tempdir()?;

    let err = load_and_validate(&cli(&["--debounce", "0"]), tmp.path()).unwrap_err();
    assert!(matches!(err, PulseError::ConfigError(_)));

    let err = load_and_validate(&cli(&["--grace", "0"]), tmp.path()).unwrap_err();
    assert!(matches!(err, PulseError::ConfigError(_)));
    Ok(())
}

#[test]
fn empty_build_tool_is_rejected() -> TestResult {
    let tmp = tempfile::tempdir()?;
    fs::write(tmp.path().join("pulse.toml"), "build_tool = []\n")?;

    let err = load_and_validate(&cli(&[]), tmp.path()).unwrap_err();
    assert!(matches!(err, PulseError::ConfigError(_)));
    Ok(())
}

#[test]
fn package_path_is_normalised() {
    let root = Path::new("/work/proj");
    let args = cli(&["./cmd/./api"]);

    let cfg = Config::resolve(&args, RawConfigFile::default(), root);

    assert_eq!(cfg.package_path, Path::new("/work/proj/cmd/api"));
}

#[test]
fn blank_prebuild_is_treated_as_absent() {
    let cfg = Config::resolve(&cli(&["--pbc", "  "]), RawConfigFile::default(), Path::new("/p"));
    assert_eq!(cfg.prebuild, None);
}

#[test]
fn preset_can_be_disabled_from_cli_or_file() {
    let cfg = Config::resolve(&cli(&["--xp"]), RawConfigFile::default(), Path::new("/p"));
    assert!(cfg.preset_excludes().is_empty());

    let file = RawConfigFile {
        no_preset: Some(true),
        ..RawConfigFile::default()
    };
    let cfg = Config::resolve(&cli(&[]), file, Path::new("/p"));
    assert!(!cfg.use_preset);
}

#[test]
fn cli_aliases_match_the_long_flags() {
    let args = cli(&[
        "--buildArgs", "-v",
        "--prebuild", "make gen",
        "--no-preset",
        "--watch-dir", "src",
        "--go",
        "--stop-policy", "after_build",
        "--log-level", "debug",
    ]);

    assert_eq!(args.build_args, vec!["-v"]);
    assert_eq!(args.prebuild.as_deref(), Some("make gen"));
    assert!(args.no_preset);
    assert_eq!(args.watch_dirs, vec![Path::new("src")]);
    assert!(args.only_go);
    assert_eq!(args.stop_policy, Some(StopPolicy::AfterBuild));
    assert!(args.log_level.is_some());
}

#[test]
fn invalid_stop_policy_is_a_parse_error() {
    let res = CliArgs::try_parse_from(["pulse", "--stop-policy", "sometimes"]);
    assert!(res.is_err());
}
